//! MCP server over newline-delimited stdio
//!
//! Each `tools/call` runs in its own task so that `ping` and `notifications/cancelled` are
//! handled while a call is blocked on the human. Responses go through a single writer task.

use crate::server::guidance;
use crate::server::protocol::{self, Request, RequestId, Response, RpcError};
use crate::server::tools::{self, ToolResult};
use crate::services::logging::log_error;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const SERVER_NAME: &str = "hitl";
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Executes tool calls. `cancel` fires when the client withdraws the call or the server stops.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, name: &str, arguments: Value, cancel: CancellationToken) -> ToolResult;
}

type InFlight = Arc<Mutex<HashMap<RequestId, CancellationToken>>>;

pub struct McpServer<H: ToolHandler + 'static> {
    handler: Arc<H>,
    in_flight: InFlight,
}

impl<H: ToolHandler + 'static> McpServer<H> {
    pub fn new(handler: H) -> Self {
        Self::with_shared(Arc::new(handler))
    }

    pub fn with_shared(handler: Arc<H>) -> Self {
        McpServer {
            handler,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Serve on the process's stdin/stdout until EOF or `shutdown`.
    pub async fn run(&self, shutdown: CancellationToken) -> anyhow::Result<()> {
        info!("Starting MCP server on stdio");
        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        self.serve(stdin, tokio::io::stdout(), shutdown).await
    }

    /// Serve one connection. In-flight calls are cancelled and answered before returning.
    pub async fn serve<R, W>(
        &self,
        reader: R,
        writer: W,
        shutdown: CancellationToken,
    ) -> anyhow::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel::<Response>();
        let writer_task = tokio::spawn(write_responses(writer, rx));
        let mut calls = JoinSet::new();
        let mut lines = reader.lines();

        loop {
            let line = tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Shutdown requested");
                    break;
                }
                line = lines.next_line() => line?,
            };
            let Some(line) = line else {
                info!("EOF received, shutting down");
                break;
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            debug!("Received: {}", line);
            self.dispatch(line, &tx, &mut calls, &shutdown);

            // Reap finished calls so the set does not grow with the session
            while let Some(joined) = calls.try_join_next() {
                if let Err(e) = joined {
                    log_error("tools/call task", &e);
                }
            }
        }

        shutdown.cancel();
        while let Some(joined) = calls.join_next().await {
            if let Err(e) = joined {
                log_error("tools/call task", &e);
            }
        }
        drop(tx);
        writer_task.await??;
        Ok(())
    }

    fn dispatch(
        &self,
        line: &str,
        tx: &mpsc::UnboundedSender<Response>,
        calls: &mut JoinSet<()>,
        shutdown: &CancellationToken,
    ) {
        let request = match protocol::parse_request_str(line) {
            Ok(request) => request,
            Err(err) => {
                warn!(error = %err, "Rejecting malformed message");
                let _ = tx.send(Response::from_error(RequestId::Null, err));
                return;
            }
        };

        let Some(id) = request.id.clone() else {
            self.handle_notification(&request);
            return;
        };

        if request.method == "tools/call" {
            let cancel = shutdown.child_token();
            if let Ok(mut in_flight) = self.in_flight.lock() {
                in_flight.insert(id.clone(), cancel.clone());
            }
            let handler = Arc::clone(&self.handler);
            let in_flight = Arc::clone(&self.in_flight);
            let tx = tx.clone();
            let params = request.params.unwrap_or(Value::Null);
            calls.spawn(async move {
                let call_id = id.clone();
                let call = tokio::spawn(async move {
                    handle_tools_call(handler.as_ref(), call_id, params, cancel).await
                });
                // A failed call still gets exactly one response
                let response = match call.await {
                    Ok(response) => response,
                    Err(e) => {
                        log_error(&format!("tools/call {}", id), &e);
                        Response::from_error(
                            id.clone(),
                            RpcError::InternalError("Tool call failed".to_string()),
                        )
                    }
                };
                if let Ok(mut in_flight) = in_flight.lock() {
                    in_flight.remove(&id);
                }
                let _ = tx.send(response);
            });
        } else {
            let _ = tx.send(self.handle_request(id, &request.method, request.params));
        }
    }

    /// Every method except `tools/call`
    fn handle_request(&self, id: RequestId, method: &str, params: Option<Value>) -> Response {
        match method {
            "initialize" => {
                info!("MCP client initialized");
                Response::success(
                    id,
                    json!({
                        "protocolVersion": PROTOCOL_VERSION,
                        "capabilities": { "tools": {}, "prompts": {} },
                        "serverInfo": {
                            "name": SERVER_NAME,
                            "version": env!("CARGO_PKG_VERSION"),
                        }
                    }),
                )
            }
            "ping" => Response::success(id, json!({})),
            "tools/list" => Response::success(id, json!({ "tools": tools::all_tools() })),
            "prompts/list" => {
                Response::success(id, json!({ "prompts": [guidance::prompt_descriptor()] }))
            }
            "prompts/get" => {
                let name = params
                    .as_ref()
                    .and_then(|p| p.get("name"))
                    .and_then(Value::as_str);
                match name {
                    Some(guidance::HUMAN_LOOP_PROMPT) => {
                        Response::success(id, guidance::prompt_messages())
                    }
                    Some(other) => Response::from_error(
                        id,
                        RpcError::InvalidParams(format!("Unknown prompt: {}", other)),
                    ),
                    None => Response::from_error(
                        id,
                        RpcError::InvalidParams("Missing 'name' field".to_string()),
                    ),
                }
            }
            _ => {
                warn!("Unknown method: {}", method);
                Response::from_error(id, RpcError::MethodNotFound(method.to_string()))
            }
        }
    }

    fn handle_notification(&self, request: &Request) {
        match request.method.as_str() {
            "notifications/initialized" => debug!("Client finished initialization"),
            "notifications/cancelled" => {
                let target = request
                    .params
                    .as_ref()
                    .and_then(|p| p.get("requestId"))
                    .cloned()
                    .and_then(|v| serde_json::from_value::<RequestId>(v).ok());
                let token = target.as_ref().and_then(|id| {
                    self.in_flight
                        .lock()
                        .ok()
                        .and_then(|in_flight| in_flight.get(id).cloned())
                });
                match (target, token) {
                    (Some(id), Some(token)) => {
                        info!(request = %id, "Client cancelled tool call");
                        token.cancel();
                    }
                    (target, _) => {
                        debug!(request = ?target, "Cancellation for unknown or finished request")
                    }
                }
            }
            other => debug!("Ignoring notification: {}", other),
        }
    }
}

async fn handle_tools_call<H: ToolHandler + ?Sized>(
    handler: &H,
    id: RequestId,
    params: Value,
    cancel: CancellationToken,
) -> Response {
    let Some(name) = params.get("name").and_then(Value::as_str) else {
        return Response::from_error(
            id,
            RpcError::InvalidParams("Missing 'name' field".to_string()),
        );
    };
    if tools::get_tool(name).is_none() {
        return Response::from_error(id, RpcError::InvalidParams(format!("Unknown tool: {}", name)));
    }
    let arguments = params
        .get("arguments")
        .cloned()
        .unwrap_or_else(|| json!({}));

    debug!("Calling tool: {}", name);
    let result = handler.call(name, arguments, cancel).await;
    match serde_json::to_value(result) {
        Ok(value) => Response::success(id, value),
        Err(e) => Response::from_error(id, RpcError::InternalError(e.to_string())),
    }
}

async fn write_responses<W>(
    mut writer: W,
    mut rx: mpsc::UnboundedReceiver<Response>,
) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(response) = rx.recv().await {
        let line = match protocol::serialize_response_string(&response) {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "Dropping unserializable response");
                continue;
            }
        };
        debug!("Sending: {}", line);
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }
    Ok(())
}
