use super::*;
use std::{
    sync::atomic::{AtomicU32, Ordering},
    time::Duration,
};

use axum::{extract::State, routing::post, Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use crate::rpc::{parse_effects, parse_object_response, JsonRpcLedgerReader};

#[derive(Clone)]
struct RpcState {
    tx_calls: Arc<AtomicU32>,
    effects_after: u32,
    object_result: Arc<Value>,
}

impl RpcState {
    fn new(effects_after: u32, object_result: Value) -> Self {
        Self {
            tx_calls: Arc::new(AtomicU32::new(0)),
            effects_after,
            object_result: Arc::new(object_result),
        }
    }
}

async fn handle_rpc(State(state): State<RpcState>, Json(request): Json<Value>) -> Json<Value> {
    let method = request
        .get("method")
        .and_then(Value::as_str)
        .unwrap_or_default();
    match method {
        "iota_getTransactionBlock" => {
            let call = state.tx_calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call < state.effects_after {
                Json(json!({
                    "jsonrpc": "2.0",
                    "id": 1,
                    "error": {
                        "code": -32602,
                        "message": "Could not find the referenced transaction"
                    }
                }))
            } else {
                Json(json!({
                    "jsonrpc": "2.0",
                    "id": 1,
                    "result": {
                        "digest": "0xabc",
                        "effects": {
                            "status": { "status": "success" },
                            "created": [
                                { "reference": { "objectId": "0xbox1" } }
                            ]
                        }
                    }
                }))
            }
        }
        "iota_getObject" => Json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": (*state.object_result).clone()
        })),
        _ => Json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": { "code": -32601, "message": "method not found" }
        })),
    }
}

async fn spawn_rpc_server(state: RpcState) -> Result<String> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = Router::new().route("/", post(handle_rpc)).with_state(state);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(format!("http://{addr}"))
}

fn fast_reader(endpoint: &str) -> JsonRpcLedgerReader {
    JsonRpcLedgerReader::new(endpoint)
        .expect("reader")
        .with_timing(Duration::from_secs(2), Duration::from_millis(10))
}

#[tokio::test]
async fn get_object_decodes_record() {
    let state = RpcState::new(
        1,
        json!({
            "data": {
                "objectId": "0xbox1",
                "content": {
                    "dataType": "moveObject",
                    "type": "0xpkg::pizza::PizzaBox",
                    "fields": { "pizza": { "fields": { "cheese": 3 } } }
                }
            }
        }),
    );
    let endpoint = spawn_rpc_server(state).await.expect("spawn server");

    let record = fast_reader(&endpoint)
        .get_object(&ObjectId::from("0xbox1"))
        .await
        .expect("get_object")
        .expect("record");
    assert_eq!(record.object_id, ObjectId::from("0xbox1"));
    assert!(record.content.expect("content").is_move_object());
}

#[tokio::test]
async fn get_object_maps_not_exists_to_none() {
    let state = RpcState::new(
        1,
        json!({ "error": { "code": "notExists", "object_id": "0xdead" } }),
    );
    let endpoint = spawn_rpc_server(state).await.expect("spawn server");

    let record = fast_reader(&endpoint)
        .get_object(&ObjectId::from("0xdead"))
        .await
        .expect("get_object");
    assert!(record.is_none());
}

#[tokio::test]
async fn wait_polls_until_effects_are_available() {
    let state = RpcState::new(3, json!({}));
    let tx_calls = Arc::clone(&state.tx_calls);
    let endpoint = spawn_rpc_server(state).await.expect("spawn server");

    let effects = fast_reader(&endpoint)
        .wait_for_transaction(&TransactionDigest::from("0xabc"))
        .await
        .expect("effects");
    assert_eq!(effects.first_created(), Some(&ObjectId::from("0xbox1")));
    assert!(tx_calls.load(Ordering::SeqCst) >= 3);
}

#[tokio::test]
async fn wait_gives_up_after_the_deadline() {
    let state = RpcState::new(u32::MAX, json!({}));
    let endpoint = spawn_rpc_server(state).await.expect("spawn server");

    let reader = JsonRpcLedgerReader::new(&endpoint)
        .expect("reader")
        .with_timing(Duration::from_millis(50), Duration::from_millis(10));
    let err = reader
        .wait_for_transaction(&TransactionDigest::from("0xabc"))
        .await
        .expect_err("must time out");
    assert!(err.to_string().contains("timed out"));
}

#[test]
fn rejects_invalid_endpoint_url() {
    assert!(JsonRpcLedgerReader::new("not a url").is_err());
}

#[test]
fn effects_absent_from_result_means_keep_polling() {
    let parsed = parse_effects(&json!({ "digest": "0xabc" })).expect("parse");
    assert!(parsed.is_none());
}

#[test]
fn object_response_without_data_or_error_is_rejected() {
    let err = parse_object_response(&json!({})).expect_err("must reject");
    assert!(err.to_string().contains("neither data nor error"));
}
