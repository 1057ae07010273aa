//! EOS CLI sessions over SSH.
//!
//! Structured output is requested by piping the command through `| json`,
//! which EOS renders with the same schema eAPI returns.

use std::sync::Arc;

use log::{debug, warn};
use secrecy::ExposeSecret;

use super::config::SessionConfig;
use super::ssh::SshTransport;
use super::{CommandOutput, Connector, Encoding, Session};
use crate::channel::{PromptMode, Prompts, PtyChannel, PtyConfig, detect_failure};
use crate::device::Device;
use crate::error::ConnectionError;

/// Commands sent once the session reaches privileged exec.
const ON_OPEN_COMMANDS: &[&str] = &["terminal length 0", "terminal width 32767"];

/// Opens SSH CLI sessions.
#[derive(Debug, Clone)]
pub struct CliConnector {
    config: Arc<SessionConfig>,
    pty: PtyConfig,
}

impl CliConnector {
    /// Create a connector; PTY reads share the session timeout.
    pub fn new(config: Arc<SessionConfig>) -> Self {
        let pty = PtyConfig {
            timeout: config.timeout,
            ..PtyConfig::default()
        };
        Self { config, pty }
    }
}

impl Connector for CliConnector {
    type Session = CliSession;

    async fn connect(&self, device: &Device) -> Result<CliSession, ConnectionError> {
        let prompts = Prompts::eos()?;
        let transport = SshTransport::connect(&self.config, &device.address).await?;
        let channel = PtyChannel::new(transport.open_shell(&self.pty).await?, &self.pty);

        let mut session = CliSession {
            device: device.name.clone(),
            transport,
            channel,
            prompts,
        };
        session.prepare(&self.config).await?;
        Ok(session)
    }
}

/// An interactive EOS shell on one device.
pub struct CliSession {
    device: String,
    transport: SshTransport,
    channel: PtyChannel,
    prompts: Prompts,
}

impl CliSession {
    /// Wait for the login prompt, enter privileged exec and fix the terminal.
    async fn prepare(&mut self, config: &SessionConfig) -> Result<(), ConnectionError> {
        let banner = self.channel.read_until(self.prompts.prompt()).await?;
        let prompt = self.prompts.trailing_prompt(&banner).unwrap_or_default();

        if PromptMode::of(&prompt) == PromptMode::Exec {
            debug!("{}: escalating from exec", self.device);
            self.channel.send_line("enable").await?;
            let reply = self.channel.read_until(self.prompts.prompt_or_password()).await?;

            let reply = if self.prompts.prompt().is_match(&reply) {
                reply
            } else {
                self.channel.send_line(config.password.expose_secret()).await?;
                self.channel.read_until(self.prompts.prompt()).await?
            };

            let prompt = self.prompts.trailing_prompt(&reply).unwrap_or_default();
            if PromptMode::of(&prompt) == PromptMode::Exec {
                return Err(ConnectionError::CommandFailed {
                    command: "enable".to_string(),
                    message: "privileged exec refused".to_string(),
                });
            }
        }

        for command in ON_OPEN_COMMANDS {
            self.run(command).await?;
        }
        Ok(())
    }

    /// Run one command line and return its cleaned output.
    async fn run(&mut self, line: &str) -> Result<String, ConnectionError> {
        self.channel.send_line(line).await?;
        let raw = self.channel.read_until(self.prompts.prompt()).await?;
        let output = self.prompts.command_output(&raw);

        if let Some(marker) = detect_failure(&output) {
            return Err(ConnectionError::CommandFailed {
                command: line.to_string(),
                message: output
                    .lines()
                    .find(|l| l.contains(marker))
                    .unwrap_or(marker)
                    .trim()
                    .to_string(),
            });
        }
        Ok(output)
    }
}

impl Session for CliSession {
    async fn execute(
        &mut self,
        commands: &[&str],
        encoding: Encoding,
    ) -> Result<Vec<CommandOutput>, ConnectionError> {
        let mut outputs = Vec::with_capacity(commands.len());
        for command in commands {
            let output = match encoding {
                Encoding::Text => CommandOutput::Text(self.run(command).await?),
                Encoding::Structured => {
                    let line = format!("{command} | json");
                    let text = self.run(&line).await?;
                    let value = serde_json::from_str(&text).map_err(|e| {
                        ConnectionError::MalformedResponse(format!("'{line}': {e}"))
                    })?;
                    CommandOutput::Structured(value)
                }
            };
            outputs.push(output);
        }
        Ok(outputs)
    }

    async fn close(self) {
        self.channel.close().await;
        if let Err(e) = self.transport.close().await {
            warn!("{}: ssh disconnect failed: {}", self.device, e);
        }
    }
}
