//! SSH transport implementation using russh.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use log::{debug, warn};
use russh::Channel;
use russh::client::{self, Handle, Msg};
use russh::keys::PublicKey;
use secrecy::ExposeSecret;

use super::config::{HostKeyVerification, SessionConfig};
use crate::channel::PtyConfig;
use crate::error::ConnectionError;

/// Authenticated SSH connection to one device.
pub struct SshTransport {
    session: Handle<SshHandler>,
}

impl SshTransport {
    /// Connect to `host` and authenticate with the configured password.
    pub async fn connect(config: &SessionConfig, host: &str) -> Result<Self, ConnectionError> {
        let ssh_config = Arc::new(client::Config {
            inactivity_timeout: Some(config.timeout),
            ..Default::default()
        });

        let host_key_error: Arc<Mutex<Option<ConnectionError>>> = Arc::new(Mutex::new(None));

        let handler = SshHandler {
            host: host.to_string(),
            port: config.port,
            host_key_verification: config.host_key_verification.clone(),
            known_hosts_path: config.known_hosts_path.clone(),
            host_key_error: host_key_error.clone(),
        };

        debug!("ssh connecting to {}:{}", host, config.port);

        let mut session = tokio::time::timeout(
            config.timeout,
            client::connect(ssh_config, (host, config.port), handler),
        )
        .await
        .map_err(|_| ConnectionError::Timeout(config.timeout))?
        .map_err(|e| {
            // Prefer the detailed host key error over russh's generic one.
            host_key_error
                .lock()
                .ok()
                .and_then(|mut slot| slot.take())
                .unwrap_or(ConnectionError::Ssh(e))
        })?;

        let auth = session
            .authenticate_password(&config.username, config.password.expose_secret())
            .await?;
        if !auth.success() {
            return Err(ConnectionError::AuthenticationFailed {
                user: config.username.clone(),
            });
        }

        Ok(Self { session })
    }

    /// Open a shell channel with a PTY attached.
    pub async fn open_shell(&self, pty: &PtyConfig) -> Result<Channel<Msg>, ConnectionError> {
        let channel = self.session.channel_open_session().await?;

        channel
            .request_pty(
                true,
                "xterm",
                pty.terminal_width,
                pty.terminal_height,
                0,
                0,
                &[],
            )
            .await?;
        channel.request_shell(true).await?;

        Ok(channel)
    }

    /// Close the connection.
    pub async fn close(self) -> Result<(), ConnectionError> {
        self.session
            .disconnect(russh::Disconnect::ByApplication, "", "en")
            .await?;
        Ok(())
    }
}

/// SSH client handler for russh.
struct SshHandler {
    host: String,
    port: u16,
    host_key_verification: HostKeyVerification,
    known_hosts_path: Option<PathBuf>,
    host_key_error: Arc<Mutex<Option<ConnectionError>>>,
}

impl SshHandler {
    /// `Ok(true)` if matched, `Ok(false)` if the host is unknown.
    fn check_known_hosts(&self, pubkey: &PublicKey) -> Result<bool, ConnectionError> {
        let result = match &self.known_hosts_path {
            Some(path) => russh::keys::check_known_hosts_path(&self.host, self.port, pubkey, path),
            None => russh::keys::check_known_hosts(&self.host, self.port, pubkey),
        };

        match result {
            Ok(matched) => Ok(matched),
            Err(russh::keys::Error::KeyChanged { line }) => Err(ConnectionError::HostKeyChanged {
                host: self.host.clone(),
                port: self.port,
                line,
            }),
            Err(e) => Err(ConnectionError::KnownHosts(e.to_string())),
        }
    }

    fn learn_host_key(&self, pubkey: &PublicKey) -> Result<(), ConnectionError> {
        let result = match &self.known_hosts_path {
            Some(path) => {
                russh::keys::known_hosts::learn_known_hosts_path(&self.host, self.port, pubkey, path)
            }
            None => russh::keys::known_hosts::learn_known_hosts(&self.host, self.port, pubkey),
        };
        result.map_err(|e| ConnectionError::KnownHosts(e.to_string()))
    }

    fn reject(&self, error: ConnectionError) -> bool {
        if let Ok(mut slot) = self.host_key_error.lock() {
            *slot = Some(error);
        }
        false
    }
}

impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        let accepted = match self.host_key_verification {
            HostKeyVerification::Disabled => true,
            HostKeyVerification::AcceptNew => match self.check_known_hosts(server_public_key) {
                Ok(true) => true,
                Ok(false) => {
                    if let Err(e) = self.learn_host_key(server_public_key) {
                        warn!("Failed to save host key for {}: {}", self.host, e);
                    }
                    true
                }
                Err(e) => self.reject(e),
            },
            HostKeyVerification::Strict => match self.check_known_hosts(server_public_key) {
                Ok(true) => true,
                Ok(false) => self.reject(ConnectionError::HostKeyUnknown {
                    host: self.host.clone(),
                    port: self.port,
                }),
                Err(e) => self.reject(e),
            },
        };
        Ok(accepted)
    }
}
