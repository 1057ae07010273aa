//! Device session layer.
//!
//! A [`Connector`] opens a [`Session`] to one device; a session executes an
//! ordered batch of commands and returns one [`CommandOutput`] per command.
//! Two transports are provided: Arista eAPI over HTTP(S) and the EOS CLI
//! over SSH. [`FleetConnector`] picks one from the run's [`SessionConfig`].

mod cli;
pub mod config;
mod eapi;
mod ssh;

#[cfg(test)]
pub(crate) mod mock;

pub use cli::{CliConnector, CliSession};
pub use config::{HostKeyVerification, SessionConfig, TransportKind};
pub use eapi::{EapiConnector, EapiSession};
pub use ssh::SshTransport;

use std::future::Future;
use std::sync::Arc;

use serde_json::Value;

use crate::device::Device;
use crate::error::ConnectionError;

/// Requested rendering of command output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Nested JSON fields.
    Structured,
    /// Raw CLI text.
    Text,
}

impl Encoding {
    /// The eAPI `format` parameter.
    pub fn as_eapi_format(self) -> &'static str {
        match self {
            Self::Structured => "json",
            Self::Text => "text",
        }
    }
}

/// Output of one command.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutput {
    /// JSON document.
    Structured(Value),
    /// CLI text.
    Text(String),
}

impl CommandOutput {
    /// The JSON document, if this is structured output.
    pub fn as_structured(&self) -> Option<&Value> {
        match self {
            Self::Structured(value) => Some(value),
            Self::Text(_) => None,
        }
    }

    /// The text, if this is text output.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Structured(_) => None,
        }
    }

    /// Consume into text; structured output is serialized.
    pub fn into_text(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Structured(value) => value.to_string(),
        }
    }
}

/// An open session to one device.
pub trait Session: Send {
    /// Execute an ordered batch. The first failing command fails the batch.
    fn execute(
        &mut self,
        commands: &[&str],
        encoding: Encoding,
    ) -> impl Future<Output = Result<Vec<CommandOutput>, ConnectionError>> + Send;

    /// Execute a single command.
    fn execute_one(
        &mut self,
        command: &str,
        encoding: Encoding,
    ) -> impl Future<Output = Result<CommandOutput, ConnectionError>> + Send {
        async move {
            self.execute(&[command], encoding)
                .await?
                .pop()
                .ok_or_else(|| ConnectionError::MalformedResponse(format!("no output for '{command}'")))
        }
    }

    /// Tear the session down. Errors are logged, not returned.
    fn close(self) -> impl Future<Output = ()> + Send
    where
        Self: Sized;
}

/// Opens sessions to devices.
pub trait Connector: Send + Sync {
    /// The session type produced.
    type Session: Session;

    /// Open a session to `device`.
    fn connect(
        &self,
        device: &Device,
    ) -> impl Future<Output = Result<Self::Session, ConnectionError>> + Send;
}

/// Connector chosen at runtime from the configured transport.
#[derive(Debug, Clone)]
pub enum FleetConnector {
    /// eAPI over HTTP or HTTPS.
    Eapi(EapiConnector),
    /// CLI over SSH.
    Cli(CliConnector),
}

impl FleetConnector {
    /// Build the connector for `config.transport`.
    pub fn new(config: SessionConfig) -> Result<Self, ConnectionError> {
        let transport = config.transport;
        let config = Arc::new(config);
        Ok(match transport {
            TransportKind::Http | TransportKind::Https => Self::Eapi(EapiConnector::new(config)?),
            TransportKind::Ssh => Self::Cli(CliConnector::new(config)),
        })
    }
}

/// Session produced by [`FleetConnector`].
pub enum FleetSession {
    Eapi(EapiSession),
    Cli(CliSession),
}

impl Connector for FleetConnector {
    type Session = FleetSession;

    async fn connect(&self, device: &Device) -> Result<FleetSession, ConnectionError> {
        match self {
            Self::Eapi(connector) => connector.connect(device).await.map(FleetSession::Eapi),
            Self::Cli(connector) => connector.connect(device).await.map(FleetSession::Cli),
        }
    }
}

impl Session for FleetSession {
    async fn execute(
        &mut self,
        commands: &[&str],
        encoding: Encoding,
    ) -> Result<Vec<CommandOutput>, ConnectionError> {
        match self {
            Self::Eapi(session) => session.execute(commands, encoding).await,
            Self::Cli(session) => session.execute(commands, encoding).await,
        }
    }

    async fn close(self) {
        match self {
            Self::Eapi(session) => session.close().await,
            Self::Cli(session) => session.close().await,
        }
    }
}
