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

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::common::config::ExporterConfig;

/// Expose `nvidia-smi` readings as Prometheus metrics.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Address to listen on for web interface and telemetry. `:port` binds all interfaces.
    #[arg(
        long = "web.listen-address",
        visible_alias = "web.listen_address",
        default_value = ExporterConfig::DEFAULT_LISTEN_ADDRESS
    )]
    pub listen_address: String,
    /// Path under which to expose metrics.
    #[arg(long = "web.telemetry-path", default_value = ExporterConfig::DEFAULT_TELEMETRY_PATH)]
    pub telemetry_path: String,
    /// Path or command to be used for the nvidia-smi executable.
    #[arg(long = "nvidia-smi-command", default_value = ExporterConfig::DEFAULT_SMI_COMMAND)]
    pub nvidia_smi_command: String,
    /// Seconds to wait for nvidia-smi before giving up on a scrape. Use 0 to wait indefinitely.
    #[arg(long = "nvidia-smi-timeout", default_value_t = ExporterConfig::DEFAULT_SMI_TIMEOUT_SECS)]
    pub nvidia_smi_timeout: u64,
    /// Serve a captured `nvidia-smi -q -x` document instead of running the command.
    #[arg(long = "nvidia-smi-xml-file", env = "NVIDIA_SMI_XML_FILE")]
    pub nvidia_smi_xml_file: Option<PathBuf>,
}

impl Cli {
    pub fn smi_timeout(&self) -> Option<Duration> {
        (self.nvidia_smi_timeout > 0).then(|| Duration::from_secs(self.nvidia_smi_timeout))
    }

    /// Telemetry path with a guaranteed leading slash.
    pub fn normalized_telemetry_path(&self) -> String {
        if self.telemetry_path.starts_with('/') {
            self.telemetry_path.clone()
        } else {
            format!("/{}", self.telemetry_path)
        }
    }
}
