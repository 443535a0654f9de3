use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::ServerError;
use crate::protocol::{JSONRPC_VERSION, JsonRpcRequest, JsonRpcResponse};
use crate::tools::{InitializeResponse, ServerCapabilities, ServerInfo, Tool, ToolResponse};

pub const PROTOCOL_VERSION: &str = "2024-11-05";

#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call_tool(&self, name: &str, args: &Value) -> Result<ToolResponse, ServerError>;

    async fn on_tool_called(&self, name: &str) {
        let _ = name;
    }

    async fn on_tool_completed(&self, name: &str, success: bool) {
        let _ = (name, success);
    }
}

#[derive(Default)]
pub struct ServerBuilder {
    tools: Vec<Tool>,
    info: Option<ServerInfo>,
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tools(mut self, tools: Vec<Tool>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_info(mut self, name: &str, version: &str) -> Self {
        self.info = Some(ServerInfo {
            name: name.into(),
            version: version.into(),
        });
        self
    }

    pub fn build<H: ToolHandler>(self, handler: H) -> Result<McpServer<H>, ServerError> {
        let tools = self
            .tools
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(McpServer {
            handler,
            tools: Value::Array(tools),
            info: self.info.unwrap_or_else(|| ServerInfo {
                name: env!("CARGO_PKG_NAME").into(),
                version: env!("CARGO_PKG_VERSION").into(),
            }),
        })
    }
}

pub struct McpServer<H: ToolHandler> {
    handler: H,
    tools: Value,
    info: ServerInfo,
}

impl<H: ToolHandler> McpServer<H> {
    /// Handles one request. Notifications produce no response.
    pub async fn handle(&self, req: JsonRpcRequest) -> Option<JsonRpcResponse> {
        if req.is_notification() {
            debug!(method = %req.method, "Notification received");
            return None;
        }

        let result = if req.jsonrpc != JSONRPC_VERSION {
            Err(ServerError::InvalidJsonRpcVersion(req.jsonrpc.clone()))
        } else {
            match req.method.as_str() {
                "initialize" => self.initialize(),
                "ping" => Ok(Value::Object(Default::default())),
                "tools/list" => Ok(self.list_tools()),
                "tools/call" => self.handle_tool_call(&req).await,
                other => Err(ServerError::MethodNotFound(other.into())),
            }
        };

        Some(match result {
            Ok(value) => JsonRpcResponse::success(req.id, value),
            Err(err) => {
                warn!(method = %req.method, error = %err, "Request failed");
                JsonRpcResponse::error(req.id, err.to_json_rpc_error())
            }
        })
    }

    fn initialize(&self) -> Result<Value, ServerError> {
        let mut tools = serde_json::Map::new();
        tools.insert("listChanged".into(), Value::Bool(false));
        let response = InitializeResponse {
            protocol_version: PROTOCOL_VERSION.into(),
            capabilities: ServerCapabilities { tools },
            server_info: self.info.clone(),
        };
        Ok(serde_json::to_value(response)?)
    }

    fn list_tools(&self) -> Value {
        let mut result = serde_json::Map::new();
        result.insert("tools".into(), self.tools.clone());
        Value::Object(result)
    }

    async fn handle_tool_call(&self, req: &JsonRpcRequest) -> Result<Value, ServerError> {
        let params = req.params.as_ref().ok_or(ServerError::MissingParameters)?;
        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or(ServerError::MissingToolName)?;
        let args = params.get("arguments").unwrap_or(&Value::Null);

        self.handler.on_tool_called(name).await;
        let result = self.handler.call_tool(name, args).await;
        self.handler.on_tool_completed(name, result.is_ok()).await;

        let response = match result {
            Ok(response) => response,
            Err(err) if err.is_tool_failure() => {
                info!(tool = name, error = %err, "Tool reported an error");
                ToolResponse::error(err.to_string())
            }
            Err(err) => return Err(err),
        };
        Ok(serde_json::to_value(response)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tracking_sdk::ApiError;

    struct EchoHandler;

    #[async_trait]
    impl ToolHandler for EchoHandler {
        async fn call_tool(&self, name: &str, args: &Value) -> Result<ToolResponse, ServerError> {
            match name {
                "echo" => Ok(ToolResponse::json(args)?),
                "fail" => Err(tracking_sdk::Error::from(ApiError::NotFound {
                    message: "Container not found".into(),
                    details: None,
                })
                .into()),
                other => Err(ServerError::UnknownTool(other.into())),
            }
        }
    }

    fn server() -> McpServer<EchoHandler> {
        ServerBuilder::new().with_info("test", "0.0.1").build(EchoHandler).unwrap()
    }

    fn request(value: Value) -> JsonRpcRequest {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn answers_initialize_and_ping() {
        let server = server();
        let resp = server
            .handle(request(json!({ "jsonrpc": "2.0", "id": 1, "method": "initialize" })))
            .await
            .unwrap();
        let result = resp.result.unwrap();
        assert_eq!(result["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(result["serverInfo"]["name"], "test");

        let resp = server
            .handle(request(json!({ "jsonrpc": "2.0", "id": 2, "method": "ping" })))
            .await
            .unwrap();
        assert_eq!(resp.result, Some(json!({})));
    }

    #[tokio::test]
    async fn ignores_notifications() {
        let resp = server()
            .handle(request(json!({ "jsonrpc": "2.0", "method": "notifications/initialized" })))
            .await;
        assert!(resp.is_none());

        let resp = server()
            .handle(request(json!({ "jsonrpc": "2.0", "id": null, "method": "ping" })))
            .await
            .unwrap();
        assert_eq!(resp.id, Some(Value::Null));
        assert_eq!(resp.result, Some(json!({})));
    }

    #[tokio::test]
    async fn rejects_unknown_methods_and_versions() {
        let server = server();
        let resp = server
            .handle(request(json!({ "jsonrpc": "2.0", "id": 1, "method": "resources/list" })))
            .await
            .unwrap();
        assert_eq!(resp.error.unwrap().code, -32601);

        let resp = server
            .handle(request(json!({ "jsonrpc": "1.0", "id": 1, "method": "ping" })))
            .await
            .unwrap();
        assert_eq!(resp.error.unwrap().code, -32600);
    }

    #[tokio::test]
    async fn tool_calls_dispatch_and_report_api_failures_in_band() {
        let server = server();
        let resp = server
            .handle(request(json!({
                "jsonrpc": "2.0", "id": 1, "method": "tools/call",
                "params": { "name": "echo", "arguments": { "id": "c1" } }
            })))
            .await
            .unwrap();
        let result = resp.result.unwrap();
        assert_eq!(result["isError"], false);
        assert!(result["content"][0]["text"].as_str().unwrap().contains("\"c1\""));

        let resp = server
            .handle(request(json!({
                "jsonrpc": "2.0", "id": 2, "method": "tools/call",
                "params": { "name": "fail" }
            })))
            .await
            .unwrap();
        let result = resp.result.unwrap();
        assert_eq!(result["isError"], true);
        assert_eq!(result["content"][0]["text"], "Not found: Container not found");

        let resp = server
            .handle(request(json!({
                "jsonrpc": "2.0", "id": 3, "method": "tools/call",
                "params": { "name": "nope" }
            })))
            .await
            .unwrap();
        assert_eq!(resp.error.unwrap().code, -32602);
    }
}
