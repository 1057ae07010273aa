//! Arista eAPI (JSON-RPC over HTTP/HTTPS) sessions.
//!
//! Every batch is sent as one `runCmds` call. An `enable` command is
//! prepended so show and configure commands run privileged, and its result
//! is dropped before the outputs are handed back.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use log::{debug, trace};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::config::SessionConfig;
use super::{CommandOutput, Connector, Encoding, Session};
use crate::device::Device;
use crate::error::ConnectionError;

const COMMAND_API_PATH: &str = "/command-api";

/// JSON-RPC request body for `runCmds`.
#[derive(Debug, Serialize)]
struct RunCmdsRequest<'a> {
    jsonrpc: &'static str,
    method: &'static str,
    params: RunCmdsParams<'a>,
    id: String,
}

#[derive(Debug, Serialize)]
struct RunCmdsParams<'a> {
    version: u32,
    cmds: Vec<&'a str>,
    format: &'static str,
}

/// JSON-RPC response body.
#[derive(Debug, Deserialize)]
struct RunCmdsResponse {
    #[serde(default)]
    result: Option<Vec<Value>>,

    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,

    #[serde(default)]
    data: Vec<Value>,
}

impl RpcError {
    /// Collect the per-command `errors` arrays eAPI attaches to `data`.
    fn details(&self) -> Vec<String> {
        self.data
            .iter()
            .filter_map(|entry| entry.get("errors").and_then(Value::as_array))
            .flatten()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect()
    }

    fn into_connection_error(self, commands: &[&str]) -> ConnectionError {
        let details = self.details();
        let message = if details.is_empty() {
            format!("{} (code {})", self.message, self.code)
        } else {
            format!("{} (code {}): {}", self.message, self.code, details.join("; "))
        };
        ConnectionError::CommandFailed {
            command: commands.join(", "),
            message,
        }
    }
}

/// Opens eAPI sessions. Holds one pooled HTTP client for the whole fleet.
#[derive(Debug, Clone)]
pub struct EapiConnector {
    client: reqwest::Client,
    config: Arc<SessionConfig>,
    request_id: Arc<AtomicU64>,
}

impl EapiConnector {
    /// Build the shared HTTP client from the session config.
    pub fn new(config: Arc<SessionConfig>) -> Result<Self, ConnectionError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.timeout)
            .danger_accept_invalid_certs(config.insecure)
            .build()?;

        Ok(Self {
            client,
            config,
            request_id: Arc::new(AtomicU64::new(1)),
        })
    }

    fn endpoint(&self, address: &str) -> String {
        format!(
            "{}://{}:{}{}",
            self.config.transport.scheme(),
            address,
            self.config.port,
            COMMAND_API_PATH
        )
    }
}

impl Connector for EapiConnector {
    type Session = EapiSession;

    async fn connect(&self, device: &Device) -> Result<EapiSession, ConnectionError> {
        // eAPI is stateless; nothing touches the network until the first batch.
        Ok(EapiSession {
            connector: self.clone(),
            url: self.endpoint(&device.address),
        })
    }
}

/// A session against one device's eAPI endpoint.
#[derive(Debug)]
pub struct EapiSession {
    connector: EapiConnector,
    url: String,
}

impl EapiSession {
    /// The endpoint this session posts to.
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn run_cmds(
        &self,
        commands: &[&str],
        encoding: Encoding,
    ) -> Result<Vec<Value>, ConnectionError> {
        let mut cmds = Vec::with_capacity(commands.len() + 1);
        cmds.push("enable");
        cmds.extend_from_slice(commands);

        let id = self.connector.request_id.fetch_add(1, Ordering::Relaxed);
        let request = RunCmdsRequest {
            jsonrpc: "2.0",
            method: "runCmds",
            params: RunCmdsParams {
                version: 1,
                cmds,
                format: encoding.as_eapi_format(),
            },
            id: format!("fabric-pulse-{id}"),
        };

        debug!("eAPI {} <- {:?} ({})", self.url, commands, request.params.format);

        let config = &self.connector.config;
        let response: RunCmdsResponse = self
            .connector
            .client
            .post(&self.url)
            .basic_auth(&config.username, Some(config.password.expose_secret()))
            .json(&request)
            .send()
            .await
            .map_err(map_http_error(config.timeout))?
            .error_for_status()?
            .json()
            .await?;

        if let Some(error) = response.error {
            return Err(error.into_connection_error(commands));
        }

        let mut results = response.result.ok_or_else(|| {
            ConnectionError::MalformedResponse("neither result nor error in reply".to_string())
        })?;
        trace!("eAPI {} -> {} results", self.url, results.len());

        if results.len() != commands.len() + 1 {
            return Err(ConnectionError::MalformedResponse(format!(
                "expected {} results, got {}",
                commands.len() + 1,
                results.len()
            )));
        }
        results.remove(0);
        Ok(results)
    }
}

fn map_http_error(
    timeout: std::time::Duration,
) -> impl FnOnce(reqwest::Error) -> ConnectionError {
    move |err| {
        if err.is_timeout() {
            ConnectionError::Timeout(timeout)
        } else {
            ConnectionError::Http(err)
        }
    }
}

/// Convert one eAPI result entry into a [`CommandOutput`].
fn into_output(value: Value, encoding: Encoding) -> Result<CommandOutput, ConnectionError> {
    match encoding {
        Encoding::Structured => Ok(CommandOutput::Structured(value)),
        Encoding::Text => match value.get("output").and_then(Value::as_str) {
            Some(text) => Ok(CommandOutput::Text(text.to_string())),
            None => Err(ConnectionError::MalformedResponse(
                "text result without 'output' field".to_string(),
            )),
        },
    }
}

impl Session for EapiSession {
    async fn execute(
        &mut self,
        commands: &[&str],
        encoding: Encoding,
    ) -> Result<Vec<CommandOutput>, ConnectionError> {
        self.run_cmds(commands, encoding)
            .await?
            .into_iter()
            .map(|value| into_output(value, encoding))
            .collect()
    }

    async fn close(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::config::TransportKind;
    use httpmock::prelude::*;
    use serde_json::json;

    fn connector_for(server: &MockServer) -> (EapiConnector, Device) {
        let config = SessionConfig::new(TransportKind::Http, "admin", "admin").with_port(server.port());
        let connector = EapiConnector::new(Arc::new(config)).unwrap();
        (connector, Device::new("leaf1", server.host()))
    }

    #[test]
    fn test_endpoint_url() {
        let config = SessionConfig::new(TransportKind::Https, "admin", "admin");
        let connector = EapiConnector::new(Arc::new(config)).unwrap();
        assert_eq!(
            connector.endpoint("172.20.20.11"),
            "https://172.20.20.11:443/command-api"
        );
    }

    #[test]
    fn test_request_serialization() {
        let request = RunCmdsRequest {
            jsonrpc: "2.0",
            method: "runCmds",
            params: RunCmdsParams {
                version: 1,
                cmds: vec!["enable", "show version"],
                format: "json",
            },
            id: "fabric-pulse-1".to_string(),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["method"], "runCmds");
        assert_eq!(value["params"]["cmds"][1], "show version");
        assert_eq!(value["params"]["format"], "json");
    }

    #[test]
    fn test_rpc_error_details() {
        let error: RpcError = serde_json::from_value(json!({
            "code": 1002,
            "message": "CLI command 3 of 3 'configure replace flash:x' failed: invalid command",
            "data": [{}, {}, {"errors": ["Invalid input (at token 2: 'flash:x')"]}]
        }))
        .unwrap();

        let err = error.into_connection_error(&["configure replace flash:x", "write memory"]);
        let message = err.to_string();
        assert!(message.contains("code 1002"));
        assert!(message.contains("Invalid input"));
    }

    #[tokio::test]
    async fn test_structured_batch_drops_enable_result() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/command-api");
                then.status(200).json_body(json!({
                    "jsonrpc": "2.0",
                    "id": "fabric-pulse-1",
                    "result": [{}, {"modelName": "cEOSLab", "version": "4.32.0F"}]
                }));
            })
            .await;

        let (connector, device) = connector_for(&server);
        let mut session = connector.connect(&device).await.unwrap();
        let outputs = session
            .execute(&["show version"], Encoding::Structured)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(outputs.len(), 1);
        assert_eq!(
            outputs[0].as_structured().unwrap()["modelName"],
            json!("cEOSLab")
        );
    }

    #[tokio::test]
    async fn test_text_batch() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/command-api");
                then.status(200).json_body(json!({
                    "jsonrpc": "2.0",
                    "id": "fabric-pulse-1",
                    "result": [{"output": ""}, {"output": "hostname leaf1\n"}]
                }));
            })
            .await;

        let (connector, device) = connector_for(&server);
        let mut session = connector.connect(&device).await.unwrap();
        let output = session
            .execute_one("show running-config", Encoding::Text)
            .await
            .unwrap();
        assert_eq!(output.as_text(), Some("hostname leaf1\n"));
    }

    #[tokio::test]
    async fn test_rpc_error_fails_batch() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/command-api");
                then.status(200).json_body(json!({
                    "jsonrpc": "2.0",
                    "id": "fabric-pulse-1",
                    "error": {"code": 1002, "message": "invalid command", "data": []}
                }));
            })
            .await;

        let (connector, device) = connector_for(&server);
        let mut session = connector.connect(&device).await.unwrap();
        let err = session
            .execute(&["configure replace flash:golden-leaf1.cfg", "write memory"], Encoding::Text)
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectionError::CommandFailed { .. }));
    }

    #[tokio::test]
    async fn test_http_status_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/command-api");
                then.status(401);
            })
            .await;

        let (connector, device) = connector_for(&server);
        let mut session = connector.connect(&device).await.unwrap();
        let err = session
            .execute(&["show version"], Encoding::Structured)
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectionError::Http(_)));
    }
}
