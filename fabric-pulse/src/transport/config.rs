//! Device session configuration.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

/// Wire transport used to reach a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportKind {
    /// eAPI over plain HTTP.
    Http,

    /// eAPI over HTTPS (default).
    #[default]
    Https,

    /// Interactive CLI over SSH.
    Ssh,
}

impl TransportKind {
    /// Port used when none is configured.
    pub fn default_port(self) -> u16 {
        match self {
            Self::Http => 80,
            Self::Https => 443,
            Self::Ssh => 22,
        }
    }

    /// URL scheme for eAPI transports.
    pub fn scheme(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https | Self::Ssh => "https",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Http => "http",
            Self::Https => "https",
            Self::Ssh => "ssh",
        })
    }
}

impl FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Ok(Self::Http),
            "https" => Ok(Self::Https),
            "ssh" => Ok(Self::Ssh),
            other => Err(format!("unknown transport '{other}'")),
        }
    }
}

/// Host key verification mode, analogous to OpenSSH's `StrictHostKeyChecking`.
#[derive(Debug, Clone, Default)]
pub enum HostKeyVerification {
    /// Reject unknown and changed keys.
    Strict,

    /// Accept and learn unknown keys, reject changed keys.
    #[default]
    AcceptNew,

    /// Accept all keys without checking. Lab use only.
    Disabled,
}

/// Credentials and transport settings shared by every session in a run.
#[derive(Debug)]
pub struct SessionConfig {
    /// Wire transport.
    pub transport: TransportKind,

    /// Port (eAPI or SSH).
    pub port: u16,

    /// Login username.
    pub username: String,

    /// Login password (also answers the `enable` password prompt over SSH).
    pub password: SecretString,

    /// Bound on every network operation.
    pub timeout: Duration,

    /// Skip TLS certificate verification for HTTPS.
    pub insecure: bool,

    /// SSH host key verification mode.
    pub host_key_verification: HostKeyVerification,

    /// Path to known_hosts file (SSH only).
    pub known_hosts_path: Option<PathBuf>,
}

impl SessionConfig {
    /// Create a config with the transport's default port and a 30s timeout.
    pub fn new(
        transport: TransportKind,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            port: transport.default_port(),
            username: username.into(),
            password: SecretString::from(password.into()),
            timeout: Duration::from_secs(30),
            insecure: false,
            host_key_verification: HostKeyVerification::default(),
            known_hosts_path: None,
        }
    }

    /// Set the port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the network timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Disable TLS certificate verification.
    pub fn with_insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }

    /// Set the SSH host key verification mode.
    pub fn with_host_key_verification(mut self, mode: HostKeyVerification) -> Self {
        self.host_key_verification = mode;
        self
    }

    /// Use a specific known_hosts file.
    pub fn with_known_hosts(mut self, path: impl Into<PathBuf>) -> Self {
        self.known_hosts_path = Some(path.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_default_ports() {
        assert_eq!(SessionConfig::new(TransportKind::Https, "a", "b").port, 443);
        assert_eq!(SessionConfig::new(TransportKind::Http, "a", "b").port, 80);
        assert_eq!(SessionConfig::new(TransportKind::Ssh, "a", "b").port, 22);
    }

    #[test]
    fn test_transport_parse() {
        assert_eq!("HTTPS".parse::<TransportKind>(), Ok(TransportKind::Https));
        assert_eq!("ssh".parse::<TransportKind>(), Ok(TransportKind::Ssh));
        assert!("telnet".parse::<TransportKind>().is_err());
    }

    #[test]
    fn test_password_is_redacted() {
        let config = SessionConfig::new(TransportKind::Https, "admin", "hunter2");
        assert_eq!(config.password.expose_secret(), "hunter2");
        assert!(!format!("{config:?}").contains("hunter2"));
    }
}
