// Tests for tool invocation dispatch and response correlation

mod common;

use async_trait::async_trait;
use common::RecordingCallbacks;
use digiverifier::live::FunctionCall;
use digiverifier::tools::{function_declarations, ToolDispatcher, ToolHandler, ToolKind};
use serde_json::{json, Value};
use std::sync::Arc;

fn call(id: &str, name: &str, args: Value) -> FunctionCall {
    FunctionCall {
        id: id.to_string(),
        name: name.to_string(),
        args,
    }
}

fn aadhar_args() -> Value {
    json!({ "fullName": "Asha Verma", "number": "1234 5678 9012", "dob": "01-02-1990" })
}

fn pan_args() -> Value {
    json!({ "fullName": "Asha Verma", "number": "ABCDE1234F", "dob": "01-02-1990" })
}

#[test]
fn test_declarations_cover_every_tool() {
    let names: Vec<String> = function_declarations().into_iter().map(|d| d.name).collect();
    assert_eq!(names, vec!["saveAadhar", "savePan", "verifyDetails", "createDigilocker"]);
}

#[test]
fn test_tool_kind_lookup() {
    assert_eq!(ToolKind::from_name("verifyDetails"), Some(ToolKind::VerifyDetails));
    assert_eq!(ToolKind::from_name("deleteEverything"), None);
}

#[test]
fn test_declaration_schema_shape() {
    let declaration = serde_json::to_value(ToolKind::SaveAadhar.declaration()).unwrap();

    assert_eq!(declaration["parameters"]["type"], "OBJECT");
    assert_eq!(declaration["parameters"]["properties"]["number"]["type"], "STRING");
    assert_eq!(declaration["parameters"]["required"], json!(["fullName", "number", "dob"]));
}

#[tokio::test]
async fn test_one_response_per_call_in_order() {
    let callbacks = Arc::new(RecordingCallbacks {
        fail_save_pan: true,
        ..RecordingCallbacks::new()
    });
    let dispatcher = ToolDispatcher::with_callbacks(callbacks.clone());

    let calls = vec![
        call("c1", "saveAadhar", aadhar_args()),
        call("c2", "savePan", pan_args()),
        call("c3", "verifyDetails", json!({ "action": "verify" })),
        call("c4", "createDigilocker", json!({ "pin": "123456" })),
    ];
    let response = dispatcher.handle(&calls).await;

    let ids: Vec<&str> = response.function_responses.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["c1", "c2", "c3", "c4"]);

    let responses = &response.function_responses;
    assert_eq!(responses[0].response, json!({ "result": "ok" }));
    assert!(responses[1].response["error"]
        .as_str()
        .unwrap()
        .contains("PAN registry unavailable"));
    assert_eq!(responses[2].response, json!({ "result": "MATCH" }));
    assert_eq!(responses[3].response, json!({ "result": "ok" }));

    // The failure did not stop later calls
    assert_eq!(
        callbacks.calls(),
        vec!["aadhar:Asha Verma", "pan:ABCDE1234F", "verify:verify", "create:6"]
    );
}

#[tokio::test]
async fn test_unknown_tool_is_acknowledged() {
    let dispatcher = ToolDispatcher::with_callbacks(Arc::new(RecordingCallbacks::new()));

    let response = dispatcher.invoke(&call("x", "launchRocket", json!({}))).await;

    assert_eq!(response.id, "x");
    assert_eq!(response.name, "launchRocket");
    assert_eq!(response.response, json!({ "result": "ok" }));
}

#[tokio::test]
async fn test_bad_arguments_become_error_payload() {
    let callbacks = Arc::new(RecordingCallbacks::new());
    let dispatcher = ToolDispatcher::with_callbacks(callbacks.clone());

    let response = dispatcher
        .invoke(&call("a", "saveAadhar", json!({ "fullName": "Asha" })))
        .await;

    assert!(response.response["error"]
        .as_str()
        .unwrap()
        .contains("Invalid saveAadhar arguments"));
    assert!(callbacks.calls().is_empty());
}

#[tokio::test]
async fn test_verify_without_arguments_defaults_action() {
    let callbacks = Arc::new(RecordingCallbacks::new());
    let dispatcher = ToolDispatcher::with_callbacks(callbacks.clone());

    dispatcher.invoke(&call("v", "verifyDetails", Value::Null)).await;

    assert_eq!(callbacks.calls(), vec!["verify:verify"]);
}

struct Echo;

#[async_trait]
impl ToolHandler for Echo {
    async fn call(&self, args: Value) -> anyhow::Result<Value> {
        Ok(json!({ "echo": args }))
    }
}

#[tokio::test]
async fn test_custom_handler_registration() {
    let mut dispatcher = ToolDispatcher::new();
    assert!(!dispatcher.is_registered("echo"));

    dispatcher.register("echo", Arc::new(Echo));
    assert!(dispatcher.is_registered("echo"));

    let response = dispatcher.invoke(&call("e", "echo", json!(7))).await;
    assert_eq!(response.response, json!({ "echo": 7 }));
}
