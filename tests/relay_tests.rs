//! End-to-end relay tests against a mocked upstream.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::StreamExt;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use stride_relay::config::RelayConfig;
use stride_relay::data::CoachData;
use stride_relay::error::{RelayError, Result};
use stride_relay::relay::{ChatRequest, Relay};
use stride_relay::tools::default_registry;
use stride_relay::types::{ConversationTurn, RelayEvent};
use stride_relay::upstream::UpstreamClient;

const COMPLETIONS: &str = "/v1/chat/completions";

/// Data layer that records every call and always succeeds.
#[derive(Default)]
struct CountingData {
    calls: Mutex<Vec<(String, Value)>>,
}

impl CountingData {
    fn record(&self, name: &str, args: &Value) -> Result<Value> {
        self.calls.lock().unwrap().push((name.to_string(), args.clone()));
        Ok(json!({ "success": true, "message": format!("{name} ok") }))
    }

    fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CoachData for CountingData {
    async fn save_runner_profile(&self, args: Value) -> Result<Value> {
        self.record("save_runner_profile", &args)
    }
    async fn get_running_events(&self, args: Value) -> Result<Value> {
        self.record("get_running_events", &args)
    }
    async fn create_running_event(&self, args: Value) -> Result<Value> {
        self.record("create_running_event", &args)
    }
    async fn log_weight(&self, args: Value) -> Result<Value> {
        self.record("log_weight", &args)
    }
    async fn get_weight_history(&self, args: Value) -> Result<Value> {
        self.record("get_weight_history", &args)
    }
    async fn log_meal(&self, args: Value) -> Result<Value> {
        self.record("log_meal", &args)
    }
    async fn get_nutrition_summary(&self, args: Value) -> Result<Value> {
        self.record("get_nutrition_summary", &args)
    }
    async fn set_nutrition_goals(&self, args: Value) -> Result<Value> {
        self.record("set_nutrition_goals", &args)
    }
}

fn test_relay(server: &MockServer, data: Arc<dyn CoachData>) -> Relay {
    let config = RelayConfig::new("sk-test").with_base_url(format!("{}/v1", server.uri()));
    Relay::new(UpstreamClient::new(config).unwrap(), default_registry(data))
}

fn chat_request(text: &str) -> ChatRequest {
    ChatRequest {
        messages: vec![
            ConversationTurn::system("You are a running coach."),
            ConversationTurn::user(text),
        ],
        model: Some("openai/gpt-4o".to_string()),
        temperature: Some(0.7),
    }
}

fn content_frame(text: &str) -> String {
    format!(
        "data: {}\n\n",
        json!({"choices": [{"delta": {"content": text}, "finish_reason": null}]})
    )
}

fn finish_frame(reason: &str) -> String {
    format!(
        "data: {}\n\n",
        json!({"choices": [{"delta": {}, "finish_reason": reason}]})
    )
}

/// Frames for a streamed tool call: id and name first, then the argument
/// string split into fragments.
fn tool_call_frames(id: &str, name: &str, arg_fragments: &[&str]) -> String {
    let mut body = format!(
        "data: {}\n\n",
        json!({"choices": [{"delta": {"tool_calls": [
            {"index": 0, "id": id, "function": {"name": name, "arguments": ""}}
        ]}, "finish_reason": null}]})
    );
    for fragment in arg_fragments {
        body.push_str(&format!(
            "data: {}\n\n",
            json!({"choices": [{"delta": {"tool_calls": [
                {"index": 0, "function": {"arguments": fragment}}
            ]}, "finish_reason": null}]})
        ));
    }
    body.push_str(&finish_frame("tool_calls"));
    body
}

fn sse_response(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body + "data: [DONE]\n\n", "text/event-stream")
}

async fn collect(relay: &Relay, request: ChatRequest) -> Vec<RelayEvent> {
    relay.stream(request).await.unwrap().collect().await
}

fn collected_text(events: &[RelayEvent]) -> String {
    events
        .iter()
        .filter_map(|e| match e {
            RelayEvent::Content(text) => Some(text.as_str()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn passthrough_preserves_fragments_and_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(COMPLETIONS))
        .respond_with(sse_response(
            content_frame("¡") + &content_frame("Hol") + &content_frame("a!"),
        ))
        .expect(1)
        .mount(&server)
        .await;

    let relay = test_relay(&server, Arc::new(CountingData::default()));
    let events = collect(&relay, chat_request("Hola")).await;

    assert_eq!(
        events,
        vec![
            RelayEvent::content("¡"),
            RelayEvent::content("Hol"),
            RelayEvent::content("a!"),
        ]
    );
    assert_eq!(collected_text(&events), "¡Hola!");
}

#[tokio::test]
async fn upstream_rejection_surfaces_before_streaming() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(COMPLETIONS))
        .respond_with(ResponseTemplate::new(401).set_body_string("Invalid API key"))
        .expect(1)
        .mount(&server)
        .await;

    let relay = test_relay(&server, Arc::new(CountingData::default()));
    let Err(err) = relay.stream(chat_request("Hola")).await else {
        panic!("expected the initial request to be rejected");
    };

    match err {
        RelayError::Api { status, message } => {
            assert_eq!(status, 401);
            assert_eq!(message, "Invalid API key");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn keepalives_and_garbage_lines_are_ignored() {
    let server = MockServer::start().await;
    let body = format!(
        "{}: keep-alive\n\ndata: {{not json\n\n{}",
        content_frame("Hello"),
        content_frame(" runner")
    );
    Mock::given(method("POST"))
        .and(path(COMPLETIONS))
        .respond_with(sse_response(body))
        .mount(&server)
        .await;

    let relay = test_relay(&server, Arc::new(CountingData::default()));
    let events = collect(&relay, chat_request("Hola")).await;

    assert_eq!(collected_text(&events), "Hello runner");
}

#[tokio::test]
async fn repetition_guard_cuts_the_stream_short() {
    let server = MockServer::start().await;
    // Five fragments of four 'a's reach the 20-in-a-row threshold; the
    // marker after them must never be forwarded.
    let body = content_frame("aaaa").repeat(5) + &content_frame("MARKER");
    Mock::given(method("POST"))
        .and(path(COMPLETIONS))
        .respond_with(sse_response(body))
        .mount(&server)
        .await;

    let relay = test_relay(&server, Arc::new(CountingData::default()));
    let events = collect(&relay, chat_request("Hola")).await;

    assert_eq!(events.len(), 5);
    assert_eq!(collected_text(&events), "a".repeat(20));
}

#[tokio::test]
async fn tool_round_trip_executes_once_and_extends_conversation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(COMPLETIONS))
        .and(body_partial_json(json!({"tool_choice": "auto"})))
        .respond_with(sse_response(tool_call_frames(
            "call_abc",
            "log_weight",
            &["{\"weight\"", ":75}"],
        )))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(COMPLETIONS))
        .and(body_string_contains("\"role\":\"tool\""))
        .respond_with(sse_response(
            content_frame("Logged") + &content_frame(" 75 kg!"),
        ))
        .expect(1)
        .mount(&server)
        .await;

    let data = Arc::new(CountingData::default());
    let relay = test_relay(&server, data.clone());
    let request = chat_request("Log my weight: 75");
    let original = request.messages.clone();
    let events = collect(&relay, request).await;

    // One notification, then the continuation's text.
    assert_eq!(
        events,
        vec![
            RelayEvent::tool_executed("log_weight", Some("weightLogged")),
            RelayEvent::content("Logged"),
            RelayEvent::content(" 75 kg!"),
        ]
    );

    // The data layer ran exactly once, with the parsed arguments.
    let calls = data.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "log_weight");
    assert_eq!(calls[0].1, json!({"weight": 75}));

    // The continuation request extends the original conversation with the
    // assistant tool-call turn and the tool-result turn, in that order.
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    let continuation: Value = serde_json::from_slice(&requests[1].body).unwrap();
    assert!(continuation.get("tools").is_none());

    let messages = continuation["messages"].as_array().unwrap();
    assert_eq!(messages.len(), original.len() + 2);
    for (i, turn) in original.iter().enumerate() {
        assert_eq!(messages[i], serde_json::to_value(turn).unwrap());
    }

    let assistant = &messages[original.len()];
    assert_eq!(assistant["role"], "assistant");
    assert_eq!(assistant["tool_calls"][0]["id"], "call_abc");
    assert_eq!(assistant["tool_calls"][0]["function"]["name"], "log_weight");
    assert_eq!(
        assistant["tool_calls"][0]["function"]["arguments"],
        "{\"weight\":75}"
    );

    let tool_turn = &messages[original.len() + 1];
    assert_eq!(tool_turn["role"], "tool");
    assert_eq!(tool_turn["tool_call_id"], "call_abc");
    let result: Value =
        serde_json::from_str(tool_turn["content"].as_str().unwrap()).unwrap();
    assert_eq!(result["success"], true);
}

#[tokio::test]
async fn continuation_tool_call_is_never_executed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(COMPLETIONS))
        .and(body_partial_json(json!({"tool_choice": "auto"})))
        .respond_with(sse_response(tool_call_frames(
            "call_1",
            "log_weight",
            &["{\"weight\":75}"],
        )))
        .expect(1)
        .mount(&server)
        .await;
    // The continuation asks for another tool call; the relay must ignore it
    // and must not issue a third request.
    Mock::given(method("POST"))
        .and(path(COMPLETIONS))
        .and(body_string_contains("\"role\":\"tool\""))
        .respond_with(sse_response(tool_call_frames(
            "call_2",
            "log_meal",
            &["{\"description\":\"toast\"}"],
        )))
        .expect(1)
        .mount(&server)
        .await;

    let data = Arc::new(CountingData::default());
    let relay = test_relay(&server, data.clone());
    let events = collect(&relay, chat_request("Log my weight: 75")).await;

    assert_eq!(
        events,
        vec![RelayEvent::tool_executed("log_weight", Some("weightLogged"))]
    );
    assert_eq!(data.calls().len(), 1);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn continuation_failure_is_swallowed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(COMPLETIONS))
        .and(body_partial_json(json!({"tool_choice": "auto"})))
        .respond_with(sse_response(tool_call_frames(
            "call_1",
            "log_weight",
            &["{\"weight\":75}"],
        )))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(COMPLETIONS))
        .and(body_string_contains("\"role\":\"tool\""))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
        .expect(1)
        .mount(&server)
        .await;

    let data = Arc::new(CountingData::default());
    let relay = test_relay(&server, data.clone());
    let events = collect(&relay, chat_request("Log my weight: 75")).await;

    // The tool still ran and was announced; the stream just ends.
    assert_eq!(
        events,
        vec![RelayEvent::tool_executed("log_weight", Some("weightLogged"))]
    );
    assert_eq!(data.calls().len(), 1);
}

#[tokio::test]
async fn malformed_tool_arguments_skip_tool_and_continuation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(COMPLETIONS))
        .respond_with(sse_response(tool_call_frames(
            "call_1",
            "log_weight",
            &["weight is ", "seventy-five"],
        )))
        .expect(1)
        .mount(&server)
        .await;

    let data = Arc::new(CountingData::default());
    let relay = test_relay(&server, data.clone());
    let events = collect(&relay, chat_request("Log my weight")).await;

    assert!(events.is_empty());
    assert!(data.calls().is_empty());
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn concatenated_argument_objects_use_only_the_first() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(COMPLETIONS))
        .and(body_partial_json(json!({"tool_choice": "auto"})))
        .respond_with(sse_response(tool_call_frames(
            "call_1",
            "log_weight",
            &["{\"weight\":75}", "{\"weight\":99}"],
        )))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(COMPLETIONS))
        .and(body_string_contains("\"role\":\"tool\""))
        .respond_with(sse_response(content_frame("Done")))
        .expect(1)
        .mount(&server)
        .await;

    let data = Arc::new(CountingData::default());
    let relay = test_relay(&server, data.clone());
    collect(&relay, chat_request("Log my weight")).await;

    let calls = data.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].1, json!({"weight": 75}));
}

#[tokio::test]
async fn unknown_tool_name_is_not_executed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(COMPLETIONS))
        .respond_with(sse_response(tool_call_frames(
            "call_1",
            "drop_all_tables",
            &["{}"],
        )))
        .expect(1)
        .mount(&server)
        .await;

    let data = Arc::new(CountingData::default());
    let relay = test_relay(&server, data.clone());
    let events = collect(&relay, chat_request("Hola")).await;

    assert!(events.is_empty());
    assert!(data.calls().is_empty());
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn text_before_a_tool_call_still_streams() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(COMPLETIONS))
        .and(body_partial_json(json!({"tool_choice": "auto"})))
        .respond_with(sse_response(
            content_frame("On it. ")
                + &tool_call_frames("call_1", "create_running_event", &[
                    "{\"name\":\"City 10K\",\"date\":\"2026-10-04\"}",
                ]),
        ))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(COMPLETIONS))
        .and(body_string_contains("\"role\":\"tool\""))
        .respond_with(sse_response(content_frame("Added to your calendar.")))
        .expect(1)
        .mount(&server)
        .await;

    let data = Arc::new(CountingData::default());
    let relay = test_relay(&server, data.clone());
    let events = collect(&relay, chat_request("Sign me up for the City 10K")).await;

    assert_eq!(
        events,
        vec![
            RelayEvent::content("On it. "),
            RelayEvent::tool_executed("create_running_event", Some("eventCreated")),
            RelayEvent::content("Added to your calendar."),
        ]
    );
    assert_eq!(data.calls()[0].0, "create_running_event");
}

#[tokio::test]
async fn initial_request_carries_the_full_catalog() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(COMPLETIONS))
        .respond_with(sse_response(content_frame("Hi")))
        .mount(&server)
        .await;

    let relay = test_relay(&server, Arc::new(CountingData::default()));
    collect(&relay, chat_request("Hola")).await;

    let requests = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["tools"].as_array().unwrap().len(), 8);
    assert_eq!(body["tool_choice"], "auto");
    assert_eq!(body["stream"], true);
    assert_eq!(body["model"], "openai/gpt-4o");
}
