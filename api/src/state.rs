use std::sync::Arc;

use statbridge_mcp_runtime::McpServer;

use crate::session::SessionTable;

#[derive(Clone)]
pub struct AppState {
    pub server: Arc<McpServer>,
    pub sessions: Arc<SessionTable>,
}

impl AppState {
    pub fn new(server: McpServer) -> Self {
        Self {
            server: Arc::new(server),
            sessions: Arc::new(SessionTable::new()),
        }
    }
}

#[cfg(test)]
pub(crate) fn test_state() -> AppState {
    use serde_json::json;
    use statbridge_core::schema::{ArgumentSchema, FieldKind};
    use statbridge_mcp_runtime::registry::{StaticRegistry, ToolDefinition};

    let tools = vec![ToolDefinition::from_fn(
        "get_year",
        "Indicators for one year.",
        ArgumentSchema::new().required("id", FieldKind::integer(), "Reference year"),
        |args| async move { Ok(json!({ "year": args["id"] })) },
    )];
    let registry = StaticRegistry::new(tools).expect("test registry");
    AppState::new(McpServer::new(Arc::new(registry)))
}
