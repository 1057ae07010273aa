//! Scripted in-memory fleet for tests.
//!
//! Devices are keyed by address. Every executed command is recorded, and
//! `configure replace flash:<file>` loads `<flash_dir>/<file>` as the new
//! running configuration, the way the real device would.

use std::collections::{HashMap, HashSet};
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde_json::{Value, json};

use super::{CommandOutput, Connector, Encoding, Session};
use crate::device::Device;
use crate::error::ConnectionError;

#[derive(Debug, Clone, Default)]
pub(crate) struct MockDevice {
    pub running_config: String,
    pub structured: HashMap<String, Value>,
    pub text: HashMap<String, String>,
    pub failing: HashSet<String>,
    pub unreachable: bool,
    pub flash_dir: Option<PathBuf>,
}

impl MockDevice {
    /// A reachable device with a full set of healthy show outputs.
    pub fn healthy(running_config: &str) -> Self {
        let mut structured = HashMap::new();
        structured.insert(
            "show version".to_string(),
            json!({"modelName": "cEOSLab", "version": "4.32.0F", "uptime": 90061}),
        );
        structured.insert(
            "show processes top once".to_string(),
            json!({"cpuUtilization": 12.5}),
        );
        structured.insert(
            "show system environment temperature".to_string(),
            json!({"tempSensors": {"TempSensor1": {"currentTemperature": 41.0}}}),
        );
        structured.insert(
            "show ip bgp summary".to_string(),
            json!({"vrfs": {"default": {"peers": {
                "10.0.0.1": {"peerState": "Established"},
                "10.0.0.3": {"peerState": "Established"}
            }}}}),
        );
        structured.insert("show mlag".to_string(), json!({"state": "active"}));

        Self {
            running_config: running_config.to_string(),
            structured,
            ..Self::default()
        }
    }

    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::default()
        }
    }

    pub fn with_flash(mut self, dir: impl Into<PathBuf>) -> Self {
        self.flash_dir = Some(dir.into());
        self
    }

    pub fn with_structured(mut self, command: &str, value: Value) -> Self {
        self.structured.insert(command.to_string(), value);
        self
    }

    pub fn with_text(mut self, command: &str, text: &str) -> Self {
        self.text.insert(command.to_string(), text.to_string());
        self
    }

    pub fn failing(mut self, command: &str) -> Self {
        self.failing.insert(command.to_string());
        self
    }
}

#[derive(Debug, Default)]
struct FleetState {
    devices: HashMap<String, MockDevice>,
    log: Vec<(String, String)>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct MockFleet {
    state: Arc<Mutex<FleetState>>,
}

impl MockFleet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_device(self, address: &str, device: MockDevice) -> Self {
        self.state
            .lock()
            .unwrap()
            .devices
            .insert(address.to_string(), device);
        self
    }

    /// Commands executed against `address`, in order.
    pub fn commands_for(&self, address: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .log
            .iter()
            .filter(|(a, _)| a == address)
            .map(|(_, c)| c.clone())
            .collect()
    }

    pub fn running_config(&self, address: &str) -> String {
        self.state.lock().unwrap().devices[address].running_config.clone()
    }

    fn run(
        &self,
        address: &str,
        command: &str,
        encoding: Encoding,
    ) -> Result<CommandOutput, ConnectionError> {
        let mut state = self.state.lock().unwrap();
        state.log.push((address.to_string(), command.to_string()));
        let device = state
            .devices
            .get_mut(address)
            .ok_or(ConnectionError::Closed)?;

        if device.failing.contains(command) {
            return Err(ConnectionError::CommandFailed {
                command: command.to_string(),
                message: "% Error: scripted failure".to_string(),
            });
        }

        if command == "show running-config" {
            return Ok(CommandOutput::Text(device.running_config.clone()));
        }
        if let Some(file) = command.strip_prefix("configure replace flash:") {
            let path = device
                .flash_dir
                .as_ref()
                .map(|dir| dir.join(file))
                .ok_or_else(|| ConnectionError::CommandFailed {
                    command: command.to_string(),
                    message: "% Error: no flash".to_string(),
                })?;
            device.running_config = std::fs::read_to_string(&path)?;
            return Ok(CommandOutput::Text(String::new()));
        }
        if command == "write memory" {
            return Ok(CommandOutput::Text("Copy completed successfully.".to_string()));
        }

        let found = match encoding {
            Encoding::Structured => device
                .structured
                .get(command)
                .cloned()
                .map(CommandOutput::Structured),
            Encoding::Text => device.text.get(command).cloned().map(CommandOutput::Text),
        };
        found.ok_or_else(|| ConnectionError::CommandFailed {
            command: command.to_string(),
            message: "% Invalid input".to_string(),
        })
    }
}

pub(crate) struct MockSession {
    fleet: MockFleet,
    address: String,
}

impl Connector for MockFleet {
    type Session = MockSession;

    async fn connect(&self, device: &Device) -> Result<MockSession, ConnectionError> {
        let reachable = self
            .state
            .lock()
            .unwrap()
            .devices
            .get(&device.address)
            .is_some_and(|d| !d.unreachable);
        if !reachable {
            return Err(ConnectionError::Io(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "connection refused",
            )));
        }
        Ok(MockSession {
            fleet: self.clone(),
            address: device.address.clone(),
        })
    }
}

impl Session for MockSession {
    async fn execute(
        &mut self,
        commands: &[&str],
        encoding: Encoding,
    ) -> Result<Vec<CommandOutput>, ConnectionError> {
        commands
            .iter()
            .map(|command| self.fleet.run(&self.address, command, encoding))
            .collect()
    }

    async fn close(self) {}
}
