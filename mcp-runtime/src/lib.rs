use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Args, Subcommand};
use futures::FutureExt;
use futures::future::join_all;
use serde_json::{Map, Value, json};
use statbridge_core::error::{ToolError, codes};
use thiserror::Error;

pub mod registry;
pub mod rpc;
pub mod stats;
pub mod stdio;
pub mod tool_result;
mod util;

use registry::{RegistryError, ToolRegistry};
use rpc::{Request, RpcError, error_response, success_response};
use stats::{ClientError, StatsClient, StatsClientConfig};
use tool_result::ToolCallResult;
use util::to_pretty_json;

pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";
pub const MCP_SERVER_NAME: &str = "statbridge";

/// Connection settings for the upstream statistical data API.
#[derive(Args, Clone, Debug)]
pub struct StatsArgs {
    /// Base URL of the statistical data API
    #[arg(long, env = "STATBRIDGE_API_URL", default_value = "http://localhost:8080")]
    pub api_url: String,
    /// Bearer key sent to the data API (optional)
    #[arg(long, env = "STATBRIDGE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,
    /// Timeout for each upstream request, in seconds
    #[arg(long, env = "STATBRIDGE_TIMEOUT_SECS", default_value_t = 30)]
    pub timeout_secs: u64,
}

impl StatsArgs {
    pub fn client_config(&self) -> StatsClientConfig {
        StatsClientConfig {
            base_url: self.api_url.clone(),
            api_key: self.api_key.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Build a server exposing the statistical data tools.
pub fn build_server(args: &StatsArgs) -> Result<McpServer, StartupError> {
    let client = StatsClient::new(args.client_config())?;
    let registry = stats::registry(client)?;
    Ok(McpServer::new(Arc::new(registry)).with_instructions(stats::INSTRUCTIONS))
}

#[derive(Subcommand)]
pub enum McpCommands {
    /// Run the MCP server over stdio
    Serve,
    /// Print the tools/list discovery document and exit
    Tools,
}

pub async fn run(stats_args: StatsArgs, command: McpCommands) -> i32 {
    let server = match build_server(&stats_args) {
        Ok(server) => server,
        Err(err) => {
            let payload = json!({
                "error": "mcp_startup_error",
                "message": err.to_string(),
            });
            eprintln!("{}", to_pretty_json(&payload));
            return 1;
        }
    };

    match command {
        McpCommands::Serve => {
            tracing::info!(
                event = "mcp_stdio_started",
                server = MCP_SERVER_NAME,
                version = env!("CARGO_PKG_VERSION"),
                api_url = %stats_args.api_url,
                tools = server.registry().definitions().len(),
                "statbridge MCP server listening on stdio"
            );
            match stdio::serve_stdio(&server).await {
                Ok(()) => 0,
                Err(err) => {
                    let payload = json!({
                        "error": "mcp_server_error",
                        "message": format!("stdio transport failed: {err}"),
                    });
                    eprintln!("{}", to_pretty_json(&payload));
                    1
                }
            }
        }
        McpCommands::Tools => {
            println!("{}", to_pretty_json(&server.tools_list_payload()));
            0
        }
    }
}

/// Dispatcher and protocol façade over a tool registry.
///
/// Holds no per-connection state; one instance is shared by every transport.
pub struct McpServer {
    registry: Arc<dyn ToolRegistry>,
    instructions: Option<String>,
}

impl McpServer {
    pub fn new(registry: Arc<dyn ToolRegistry>) -> Self {
        Self {
            registry,
            instructions: None,
        }
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn registry(&self) -> &dyn ToolRegistry {
        self.registry.as_ref()
    }

    /// Decode raw transport bytes and answer them.
    pub async fn handle_bytes(&self, body: &[u8]) -> Value {
        match serde_json::from_slice::<Value>(body) {
            Ok(incoming) => self.handle_message(incoming).await,
            Err(err) => error_response(Value::Null, RpcError::parse_error(err.to_string())),
        }
    }

    /// Answer a decoded single envelope or batch.
    ///
    /// A batch always yields an array with one response per element, in input
    /// order, whatever order the elements complete in.
    pub async fn handle_message(&self, incoming: Value) -> Value {
        match incoming {
            Value::Array(batch) => {
                if batch.is_empty() {
                    return error_response(
                        Value::Null,
                        RpcError::invalid_request("Batch request must not be empty"),
                    );
                }
                let responses =
                    join_all(batch.iter().map(|item| self.handle_single_message(item))).await;
                Value::Array(responses)
            }
            single => self.handle_single_message(&single).await,
        }
    }

    async fn handle_single_message(&self, incoming: &Value) -> Value {
        let request = match Request::parse(incoming) {
            Ok(request) => request,
            Err((id, err)) => return error_response(id, err),
        };

        let outcome = AssertUnwindSafe(self.handle_request(&request.method, request.params))
            .catch_unwind()
            .await;
        match outcome {
            Ok(Ok(result)) => success_response(request.id, result),
            Ok(Err(err)) => error_response(request.id, err),
            Err(panic) => {
                let detail = panic
                    .downcast_ref::<&str>()
                    .map(|message| (*message).to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::error!(
                    event = "mcp_dispatch_panic",
                    method = %request.method,
                    detail = %detail,
                    "MCP request handler panicked"
                );
                error_response(request.id, RpcError::internal("Internal error"))
            }
        }
    }

    /// Resolve one method call.
    pub async fn handle_request(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        match method {
            "initialize" => Ok(self.initialize_payload()),
            "ping" | "notifications/initialized" => Ok(json!({})),
            "tools/list" => Ok(self.tools_list_payload()),
            "tools/call" => self.handle_tools_call(params).await,
            _ => Err(RpcError::method_not_found(method)),
        }
    }

    pub fn initialize_payload(&self) -> Value {
        let mut payload = json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "capabilities": {
                "tools": {
                    "listChanged": false
                }
            },
            "serverInfo": {
                "name": MCP_SERVER_NAME,
                "version": env!("CARGO_PKG_VERSION")
            }
        });
        if let Some(instructions) = &self.instructions {
            payload["instructions"] = Value::String(instructions.clone());
        }
        payload
    }

    pub fn tools_list_payload(&self) -> Value {
        let tools: Vec<Value> = self
            .registry
            .definitions()
            .iter()
            .map(|tool| tool.discovery_entry())
            .collect();
        json!({ "tools": tools })
    }

    async fn handle_tools_call(&self, params: Value) -> Result<Value, RpcError> {
        let params = params
            .as_object()
            .ok_or_else(|| RpcError::invalid_params("tools/call params must be an object"))?;

        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| RpcError::invalid_params("tools/call requires string field 'name'"))?;

        let args = match params.get("arguments") {
            Some(Value::Object(map)) => map.clone(),
            Some(Value::Null) | None => Map::new(),
            Some(_) => {
                return Err(RpcError::invalid_params(
                    "tools/call 'arguments' must be an object",
                ));
            }
        };

        let started = Instant::now();
        let result = self.call_tool(name, args).await;
        tracing::info!(
            event = "mcp_tool_call",
            tool = %name,
            is_error = result.is_error,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "MCP tool call finished"
        );
        Ok(result.to_value())
    }

    /// Run a tool by name. Every failure comes back as an error-flagged result.
    pub async fn call_tool(&self, name: &str, args: Map<String, Value>) -> ToolCallResult {
        let Some(tool) = self.registry.get(name) else {
            let err = ToolError::new(codes::UNKNOWN_TOOL, format!("Unknown tool: {name}"))
                .with_docs_hint("Call tools/list to see the available tools.");
            return ToolCallResult::error(err.diagnostic());
        };

        let validated = match tool.input_schema.validate(&args) {
            Ok(validated) => validated,
            Err(err) => {
                let first_field = err.issues.first().map(|issue| issue.path.clone());
                let mut tool_err = ToolError::new(
                    codes::VALIDATION_FAILED,
                    format!("Invalid arguments for tool {name}:\n{err}"),
                );
                if let Some(field) = first_field {
                    tool_err = tool_err.with_field(field);
                }
                return ToolCallResult::error(tool_err.diagnostic());
            }
        };

        match tool.executor().execute(validated).await {
            Ok(payload) => ToolCallResult::success(&payload),
            Err(err) => {
                ToolCallResult::error(format!("Error executing tool {name}: {}", err.diagnostic()))
            }
        }
    }
}
