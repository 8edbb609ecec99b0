use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use super::callbacks::VerificationCallbacks;
use super::declarations::ToolKind;
use crate::flow::{AadharDetails, PanDetails};
use crate::live::{FunctionCall, FunctionResponse, ToolResponse};

/// A named operation the remote model can invoke
///
/// Synchronous and asynchronous handlers share this contract; the dispatcher
/// awaits every call before answering.
#[async_trait::async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, args: Value) -> Result<Value>;
}

#[derive(Debug, Deserialize)]
struct VerifyArgs {
    #[serde(default)]
    action: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreateDigilockerArgs {
    pin: String,
}

fn acknowledgement() -> Value {
    json!({ "result": "ok" })
}

/// Routes one tool to the matching application callback
struct CallbackTool {
    kind: ToolKind,
    callbacks: Arc<dyn VerificationCallbacks>,
}

#[async_trait::async_trait]
impl ToolHandler for CallbackTool {
    async fn call(&self, args: Value) -> Result<Value> {
        match self.kind {
            ToolKind::SaveAadhar => {
                let details: AadharDetails =
                    serde_json::from_value(args).context("Invalid saveAadhar arguments")?;
                self.callbacks.on_save_aadhar(details)?;
                Ok(acknowledgement())
            }
            ToolKind::SavePan => {
                let details: PanDetails =
                    serde_json::from_value(args).context("Invalid savePan arguments")?;
                self.callbacks.on_save_pan(details)?;
                Ok(acknowledgement())
            }
            ToolKind::VerifyDetails => {
                let args: VerifyArgs = if args.is_null() {
                    VerifyArgs { action: None }
                } else {
                    serde_json::from_value(args).context("Invalid verifyDetails arguments")?
                };
                let action = args.action.as_deref().unwrap_or("verify");
                let outcome = self.callbacks.on_verify_details(action).await?;
                Ok(json!({ "result": outcome }))
            }
            ToolKind::CreateDigilocker => {
                let args: CreateDigilockerArgs =
                    serde_json::from_value(args).context("Invalid createDigilocker arguments")?;
                self.callbacks.on_create_digilocker(&args.pin)?;
                Ok(acknowledgement())
            }
        }
    }
}

/// Answers tool invocations from the remote model
///
/// Every invocation gets exactly one response carrying its id: handler
/// failures become `{"error": ...}` payloads and unknown tools are
/// acknowledged with `{"result": "ok"}`.
#[derive(Default)]
pub struct ToolDispatcher {
    handlers: HashMap<String, Arc<dyn ToolHandler>>,
}

impl ToolDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatcher with the four verification tools bound to `callbacks`
    pub fn with_callbacks(callbacks: Arc<dyn VerificationCallbacks>) -> Self {
        let mut dispatcher = Self::new();
        for kind in ToolKind::ALL {
            dispatcher.register(
                kind.name(),
                Arc::new(CallbackTool {
                    kind,
                    callbacks: Arc::clone(&callbacks),
                }),
            );
        }
        dispatcher
    }

    pub fn register(&mut self, name: &str, handler: Arc<dyn ToolHandler>) {
        self.handlers.insert(name.to_string(), handler);
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub async fn invoke(&self, call: &FunctionCall) -> FunctionResponse {
        let response = match self.handlers.get(&call.name) {
            Some(handler) => match handler.call(call.args.clone()).await {
                Ok(payload) => {
                    info!("Tool {} ({}) succeeded", call.name, call.id);
                    payload
                }
                Err(e) => {
                    warn!("Tool {} ({}) failed: {:#}", call.name, call.id, e);
                    json!({ "error": format!("{:#}", e) })
                }
            },
            None => {
                warn!("Unknown tool {} ({}), acknowledging", call.name, call.id);
                acknowledgement()
            }
        };

        FunctionResponse {
            id: call.id.clone(),
            name: call.name.clone(),
            response,
        }
    }

    /// Handle all invocations of one message sequentially, in array order
    pub async fn handle(&self, calls: &[FunctionCall]) -> ToolResponse {
        let mut function_responses = Vec::with_capacity(calls.len());
        for call in calls {
            function_responses.push(self.invoke(call).await);
        }
        ToolResponse { function_responses }
    }
}
