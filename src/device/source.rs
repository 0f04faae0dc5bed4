// Copyright 2025 Lablup Inc. and Jeongkyu Shin
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Sources of raw `nvidia-smi -q -x` bytes. Every scrape queries the source
// afresh; nothing is cached between requests.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::common::config::ExporterConfig;
use crate::error::{Error, Result};

#[async_trait]
pub trait SmiSource: Send + Sync {
    /// Produce one raw XML document.
    async fn query(&self) -> Result<Vec<u8>>;

    /// Human readable description for log lines.
    fn describe(&self) -> String;
}

/// Runs the diagnostic command as a subprocess.
#[derive(Debug, Clone)]
pub struct CommandSource {
    command: String,
    args: Vec<String>,
    /// None waits for the command indefinitely.
    timeout: Option<Duration>,
}

impl CommandSource {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: ExporterConfig::SMI_ARGS.iter().map(|s| s.to_string()).collect(),
            timeout: Some(Duration::from_secs(ExporterConfig::DEFAULT_SMI_TIMEOUT_SECS)),
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn command_line(&self) -> String {
        format!("{} {}", self.command, self.args.join(" "))
    }
}

#[async_trait]
impl SmiSource for CommandSource {
    async fn query(&self) -> Result<Vec<u8>> {
        let child = Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, child)
                .await
                .map_err(|_| Error::Timeout {
                    command: self.command_line(),
                    timeout,
                })?,
            None => child.await,
        }
        .map_err(|source| Error::CommandSpawn {
            command: self.command.clone(),
            source,
        })?;

        if !output.status.success() {
            return Err(Error::CommandFailed {
                command: self.command_line(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output.stdout)
    }

    fn describe(&self) -> String {
        self.command_line()
    }
}

/// Serves a captured `nvidia-smi -q -x` document, re-read on every query.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SmiSource for FileSource {
    async fn query(&self) -> Result<Vec<u8>> {
        Ok(tokio::fs::read(&self.path).await?)
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_command_is_spawn_error() {
        let source = CommandSource::new("/nonexistent/nvidia-smi-for-tests");
        let err = source.query().await.unwrap_err();
        assert!(matches!(err, Error::CommandSpawn { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_zero_exit_is_command_failed() {
        let source = CommandSource::new("false");
        match source.query().await.unwrap_err() {
            Error::CommandFailed { command, code, .. } => {
                assert_eq!(command, "false -q -x");
                assert_eq!(code, Some(1));
            }
            other => panic!("Expected CommandFailed error, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stdout_is_returned() {
        // `echo -q -x` prints its arguments back.
        let bytes = CommandSource::new("echo").query().await.unwrap();
        assert_eq!(String::from_utf8_lossy(&bytes).trim(), "-q -x");
    }

    #[tokio::test]
    async fn test_file_source_reads_fresh_each_time() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.xml");
        std::fs::write(&path, "<nvidia_smi_log/>").unwrap();

        let source = FileSource::new(&path);
        assert_eq!(source.query().await.unwrap(), b"<nvidia_smi_log/>");

        std::fs::write(&path, "<nvidia_smi_log></nvidia_smi_log>").unwrap();
        assert_eq!(
            source.query().await.unwrap(),
            b"<nvidia_smi_log></nvidia_smi_log>"
        );
    }

    #[tokio::test]
    async fn test_file_source_missing_file() {
        let source = FileSource::new("/nonexistent/nvidia-smi.xml");
        assert!(matches!(source.query().await.unwrap_err(), Error::Io(_)));
    }
}
