//! Error types for fabric-pulse.
//!
//! Errors are layered the same way the workflow is: directory resolution
//! failures are fatal, everything below that is caught at the device or
//! field level and turned into a partial result.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Main error type for fabric-pulse operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Inventory resolution errors (fatal for the whole run)
    #[error("Inventory error: {0}")]
    Directory(#[from] DirectoryError),

    /// Device session errors
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// Golden configuration errors
    #[error("Baseline error: {0}")]
    Baseline(#[from] BaselineError),

    /// Remediation step errors
    #[error("Remediation error: {0}")]
    Remediation(#[from] RemediationStepError),

    /// Console I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Inventory (device directory) errors.
#[derive(Error, Debug)]
pub enum DirectoryError {
    /// `ansible-inventory` could not be started
    #[error("Failed to run ansible-inventory: {0}")]
    Spawn(#[source] io::Error),

    /// `ansible-inventory` exited non-zero
    #[error("Failed to run ansible-inventory: {stderr}")]
    CommandFailed { status: Option<i32>, stderr: String },

    /// Inventory file could not be read
    #[error("Failed to read inventory {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Inventory output was not the expected JSON document
    #[error("Invalid inventory JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// Requested group is not in the inventory
    #[error("Group '{group}' not found in inventory")]
    GroupNotFound { group: String },
}

/// Device session errors (transport, authentication, command execution).
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// HTTP(S) transport error talking to eAPI
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// SSH handshake or protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// Authentication failed
    #[error("Authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// Server host key is not in known_hosts (strict mode)
    #[error("Host key for {host}:{port} is not known")]
    HostKeyUnknown { host: String, port: u16 },

    /// Server host key differs from known_hosts
    #[error("Host key for {host}:{port} changed (known_hosts line {line})")]
    HostKeyChanged { host: String, port: u16, line: usize },

    /// known_hosts could not be read or written
    #[error("known_hosts error: {0}")]
    KnownHosts(String),

    /// Operation timed out
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// Channel closed before the prompt was seen
    #[error("Connection closed by device")]
    Closed,

    /// The device rejected a command
    #[error("Command '{command}' failed: {message}")]
    CommandFailed { command: String, message: String },

    /// The device answered with something we could not interpret
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Invalid prompt pattern
    #[error("Invalid prompt pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// Socket level I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Per-field extraction errors. Only the affected fact degrades.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FieldParseError {
    /// The device could not be reached at all
    #[error("device unreachable")]
    Unreachable,

    /// The command backing this field failed
    #[error("command failed: {0}")]
    Command(String),

    /// The field is not present in the response
    #[error("field '{0}' missing")]
    Missing(&'static str),

    /// The field is present but has the wrong shape
    #[error("field '{0}' has an unexpected type")]
    UnexpectedType(&'static str),
}

/// Golden configuration errors.
#[derive(Error, Debug)]
pub enum BaselineError {
    /// No golden file for this device
    #[error("Golden config not found: {}", path.display())]
    Missing { path: PathBuf },

    /// Golden file exists but could not be read
    #[error("Failed to read golden config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Errors that halt a device's remediation state machine.
#[derive(Error, Debug)]
pub enum RemediationStepError {
    /// Baseline missing or unreadable at staging time
    #[error(transparent)]
    Baseline(#[from] BaselineError),

    /// Copy into the staging area failed
    #[error("Failed to stage {}: {source}", path.display())]
    Stage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// configure replace / write memory was rejected
    #[error(transparent)]
    Replace(#[from] ConnectionError),

    /// Verification still found drift or could not read the device
    #[error("{device} still diverges from golden config: {detail}")]
    StillDivergent { device: String, detail: String },
}

/// Result type alias using fabric-pulse's Error.
pub type Result<T> = std::result::Result<T, Error>;
