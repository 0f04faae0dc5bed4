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

//! Unified error types for the exporter.
//!
//! Errors only travel as far as the HTTP handler: a failed `nvidia-smi`
//! invocation is logged and turned into an empty metrics body, and decode
//! errors are carried inside [`crate::device::Decoded`] so the emitter can
//! decide how to degrade.

use std::time::Duration;
use thiserror::Error;

/// The main error type for exporter operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The diagnostic command could not be started (missing binary, permissions).
    #[error("Failed to start '{command}': {source}")]
    CommandSpawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The diagnostic command ran but exited with a non-zero status.
    #[error("Command failed: '{command}' (code: {code:?}) stderr: {stderr}")]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    /// The diagnostic command did not finish within the configured timeout.
    #[error("Command '{command}' timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    /// The XML reader hit a syntax error.
    #[error("XML decode error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Input ended while elements were still open.
    #[error("Document truncated inside <{open}>")]
    TruncatedDocument { open: String },

    /// The document contained no root element at all.
    #[error("No XML root element found")]
    NoRootElement,

    /// The telemetry path cannot be served as a literal route.
    #[error("Invalid telemetry path '{path}': {reason}")]
    InvalidTelemetryPath { path: String, reason: &'static str },

    /// The HTTP listener could not be bound.
    #[error("Failed to bind listener on {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A specialized Result type for exporter operations.
pub type Result<T> = std::result::Result<T, Error>;
