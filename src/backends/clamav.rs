//! ClamAV daemon engine.
//!
//! This module provides an engine that streams content to clamd over its
//! Unix socket.
//!
//! # Requirements
//!
//! - ClamAV daemon (clamd) must be running
//! - Access to the clamd socket
//!
//! # Protocol
//!
//! Uses the `zINSTREAM` command: length-prefixed chunks terminated by a
//! zero-length chunk, answered with a single status line.

use crate::core::{Engine, EngineLimits, FileInput, ScanError, ScanFlags, ScanVerdict};

use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::time::Duration;

const CHUNK_SIZE: usize = 2048;

/// ClamAV daemon configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClamdConfig {
    /// Path to the clamd Unix socket.
    pub socket_path: PathBuf,

    /// Read and write timeout on the socket.
    #[serde(with = "crate::manager::options::duration_ms")]
    pub timeout: Duration,
}

impl Default for ClamdConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from("/var/run/clamav/clamd.sock"),
            timeout: Duration::from_secs(300),
        }
    }
}

impl ClamdConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses the given socket.
    pub fn with_socket(mut self, path: impl Into<PathBuf>) -> Self {
        self.socket_path = path.into();
        self
    }

    /// Sets the socket timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Engine backed by a running clamd.
#[derive(Debug)]
pub struct ClamdEngine {
    config: ClamdConfig,
}

impl ClamdEngine {
    /// Creates an engine and checks that clamd answers `PING`.
    pub fn connect(config: ClamdConfig) -> Result<Self, ScanError> {
        let engine = Self { config };
        let reply = engine.command(b"zPING\0", &[])?;
        if reply.trim_end_matches('\0').trim() != "PONG" {
            return Err(ScanError::engine_unavailable(
                "clamd",
                format!("unexpected reply to PING: {}", reply),
            ));
        }
        Ok(engine)
    }

    fn open(&self) -> Result<UnixStream, ScanError> {
        let stream = UnixStream::connect(&self.config.socket_path)
            .map_err(|e| ScanError::connection_failed("clamd", e.to_string()))?;
        stream
            .set_read_timeout(Some(self.config.timeout))
            .and_then(|_| stream.set_write_timeout(Some(self.config.timeout)))
            .map_err(|e| ScanError::connection_failed("clamd", e.to_string()))?;
        Ok(stream)
    }

    fn command(&self, command: &[u8], payload: &[u8]) -> Result<String, ScanError> {
        let io_err = |e: std::io::Error| ScanError::connection_failed("clamd", e.to_string());
        let mut stream = self.open()?;

        stream.write_all(command).map_err(io_err)?;
        if command.starts_with(b"zINSTREAM") {
            for chunk in payload.chunks(CHUNK_SIZE) {
                stream
                    .write_all(&(chunk.len() as u32).to_be_bytes())
                    .map_err(io_err)?;
                stream.write_all(chunk).map_err(io_err)?;
            }
            stream.write_all(&0u32.to_be_bytes()).map_err(io_err)?;
        }

        let mut response = String::new();
        stream.read_to_string(&mut response).map_err(io_err)?;
        Ok(response)
    }
}

/// Parses a clamd status line such as `stream: Eicar-Test-Signature FOUND`.
pub fn parse_response(response: &str) -> ScanVerdict {
    let response = response.trim_end_matches('\0').trim();
    let body = response
        .split_once(": ")
        .map(|(_, rest)| rest)
        .unwrap_or(response);

    if body == "OK" {
        ScanVerdict::Clean
    } else if let Some(signature) = body.strip_suffix(" FOUND") {
        ScanVerdict::infected(signature.trim())
    } else if let Some(reason) = body.strip_suffix(" ERROR") {
        ScanVerdict::error(reason.trim())
    } else {
        ScanVerdict::error(format!("unexpected response: {}", response))
    }
}

impl Engine for ClamdEngine {
    fn name(&self) -> &str {
        "clamd"
    }

    fn submit(
        &self,
        input: &FileInput,
        limits: &EngineLimits,
        flags: ScanFlags,
    ) -> Result<ScanVerdict, ScanError> {
        let data = input.read_all()?;
        if limits.max_file_size > 0 && data.len() as u64 > limits.max_file_size {
            tracing::debug!(size = data.len(), max = limits.max_file_size, "input over size limit, not scanned");
            return Ok(ScanVerdict::Clean);
        }

        // clamd applies its own configured scan options; flags are logged
        // for correlation only.
        tracing::trace!(flags = ?flags, "submitting to clamd");
        let response = self.command(b"zINSTREAM\0", &data)?;
        Ok(parse_response(&response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_response_clean() {
        assert!(parse_response("stream: OK\0").is_clean());
    }

    #[test]
    fn test_parse_response_infected() {
        assert_eq!(
            parse_response("stream: Eicar-Test-Signature FOUND"),
            ScanVerdict::infected("Eicar-Test-Signature")
        );
    }

    #[test]
    fn test_parse_response_error() {
        assert_eq!(
            parse_response("INSTREAM size limit exceeded. ERROR"),
            ScanVerdict::error("INSTREAM size limit exceeded.")
        );
        assert!(parse_response("garbage").is_error());
    }

    #[test]
    fn test_connect_missing_socket() {
        let err = ClamdEngine::connect(ClamdConfig::new().with_socket("/nonexistent/clamd.sock"))
            .unwrap_err();
        assert!(matches!(err, ScanError::ConnectionFailed { .. }));
    }

    #[test]
    fn test_config_builder() {
        let config = ClamdConfig::new()
            .with_socket("/custom/path.sock")
            .with_timeout(Duration::from_secs(60));
        assert_eq!(config.socket_path, PathBuf::from("/custom/path.sock"));
        assert_eq!(config.timeout, Duration::from_secs(60));
    }
}
