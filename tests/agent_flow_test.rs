//! 编排流程集成测试：脚本化 LLM + 进程内工具，不访问网络

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use wayfarer::agent::{
    spawn_run, BlogGenerator, BlogRequest, FallbackStore, ResultKind, ResultSource, RunControl,
    TaskOrchestrator, TripPlanner, BLOG_TOOLS, TRIP_TOOLS,
};
use wayfarer::core::AgentError;
use wayfarer::llm::{LlmError, ScriptedLlmClient};
use wayfarer::memory::{Message, Role};
use wayfarer::react::ReactEvent;
use wayfarer::tools::{ParamType, SpecError, Tool, ToolArgs, ToolRegistry, ToolSpec};

const IMAGE_OUTPUT: &str =
    r#"{"query":"Paris","image_urls":["https://img.test/1.jpg","https://img.test/2.jpg","https://img.test/3.jpg"]}"#;

/// 以真实工具名注册的假工具：返回固定输出并计数
struct FakeTool {
    name: &'static str,
    param: &'static str,
    output: String,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Tool for FakeTool {
    fn spec(&self) -> Result<ToolSpec, SpecError> {
        ToolSpec::builder(self.name)
            .description("fake tool")
            .required(self.param, ParamType::String, "input")
            .build()
    }

    async fn execute(&self, args: ToolArgs) -> Result<String, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        args.require_str(self.param)?;
        Ok(self.output.clone())
    }
}

struct Harness {
    llm: Arc<ScriptedLlmClient>,
    trip: TripPlanner,
    blog: BlogGenerator,
    image_calls: Arc<AtomicUsize>,
}

fn fallback_store() -> FallbackStore {
    FallbackStore::from_documents(
        json!({
            "message": "fallback trip",
            "Requirement_options": [],
            "intent": "trip_planning",
            "sessionId": "",
            "timestamp": "",
            "itinerary": {"overview": {"destination_location": "Lisbon", "duration_days": 3}, "Cities": []}
        }),
        json!({
            "blog_content": {"title": "Fallback Blog", "Detail": "# Fallback"},
            "metadata": {"word_count": 1, "reading_time": "1 minute", "generated_at": ""}
        }),
    )
    .unwrap()
}

fn harness(llm: ScriptedLlmClient, max_rounds: usize) -> Harness {
    let image_calls = Arc::new(AtomicUsize::new(0));
    let mut registry = ToolRegistry::new();
    for &name in TRIP_TOOLS.iter().chain(BLOG_TOOLS.iter()) {
        let (param, output, calls) = match name {
            "get_image_search" => ("query", IMAGE_OUTPUT.to_string(), Arc::clone(&image_calls)),
            "get_hotels" | "get_activities" => ("location", "[]".to_string(), Arc::default()),
            "get_raw_website_content" => ("website", "<html></html>".to_string(), Arc::default()),
            "get_multimodal_capability" => (
                "image_url",
                r#"{"message":"A sunny harbour","status":"success","attempt":1}"#.to_string(),
                Arc::default(),
            ),
            _ => ("query", format!("{} result", name), Arc::default()),
        };
        registry
            .register(FakeTool {
                name,
                param,
                output,
                calls,
            })
            .unwrap();
    }

    let llm = Arc::new(llm);
    let orchestrator = Arc::new(TaskOrchestrator::new(
        llm.clone(),
        Arc::new(registry),
        Arc::new(fallback_store()),
    ));
    Harness {
        llm,
        trip: TripPlanner::new(Arc::clone(&orchestrator), max_rounds, 3).unwrap(),
        blog: BlogGenerator::new(orchestrator, max_rounds).unwrap(),
        image_calls,
    }
}

/// 模型给出的完整行程文档，含类型化结构之外的键
fn trip_document() -> Value {
    json!({
        "message": "Here is your Paris plan",
        "Requirement_options": ["3 days", "art"],
        "intent": "trip_planning",
        "sessionId": "ignored",
        "timestamp": "ignored",
        "itinerary": {
            "overview": {
                "destination_location": "Paris",
                "duration_days": 3,
                "image_urls": ["https://img.test/1.jpg", "https://img.test/2.jpg", "https://img.test/3.jpg"]
            },
            "Cities": []
        },
        "weather_notes": "Light rain expected on day 2",
        "travel_tips": ["Buy a Navigo pass", "Museums close on Mondays"]
    })
}

fn trip_response() -> String {
    respond_with(&trip_document())
}

fn respond_with(plan: &Value) -> String {
    format!("<thought>I have everything.</thought>\n<response>{}</response>", plan)
}

fn without_stamp(mut doc: Value) -> Value {
    let obj = doc.as_object_mut().unwrap();
    obj.remove("sessionId");
    obj.remove("timestamp");
    doc
}

fn tool_call(name: &str, params: Value) -> String {
    format!(
        "<thought>Need data.</thought>\n<tool_call>{}</tool_call>",
        json!({"tool_name": name, "parameters": params})
    )
}

fn corrective_messages(messages: &[Message]) -> usize {
    messages
        .iter()
        .filter(|m| m.role == Role::User && m.content.starts_with("Your previous reply could not be used"))
        .count()
}

#[tokio::test]
async fn test_round_limit_uses_fallback_after_exact_budget() {
    let h = harness(ScriptedLlmClient::new().repeat("I am not following the protocol."), 3);
    let outcome = h.trip.plan("3 days in Paris", Some("s-1")).await.unwrap();

    assert!(outcome.is_fallback());
    assert_eq!(outcome.rounds, 3);
    assert_eq!(h.llm.call_count(), 3);
    match &outcome.source {
        ResultSource::Fallback { reason } => assert!(reason.contains("round limit")),
        other => panic!("unexpected source {:?}", other),
    }
    assert_eq!(outcome.result.message, "fallback trip");
    assert!(outcome.result.session_id.starts_with("session_"));
}

#[tokio::test]
async fn test_malformed_rounds_get_one_correction_each() {
    let llm = ScriptedLlmClient::new()
        .reply("Sure, I will plan that.")
        .reply("<thought>Still thinking.</thought>")
        .reply(trip_response());
    let h = harness(llm, 5);
    let outcome = h.trip.plan("3 days in Paris", Some("s-42")).await.unwrap();

    assert_eq!(outcome.source, ResultSource::Agent);
    assert_eq!(outcome.rounds, 3);
    assert_eq!(outcome.result.session_id, "s-42");
    assert_eq!(outcome.result.itinerary.overview.destination_location, "Paris");

    let calls = h.llm.calls();
    assert_eq!(calls.len(), 3);
    assert_eq!(corrective_messages(&calls[2].messages), 2);
}

#[tokio::test]
async fn test_provider_failure_is_immediate() {
    let llm = ScriptedLlmClient::new()
        .fail(LlmError::Transport("connection refused".into()))
        .reply(trip_response());
    let h = harness(llm, 5);
    let outcome = h.trip.plan("3 days in Paris", None).await.unwrap();

    assert!(outcome.is_fallback());
    assert_eq!(h.llm.call_count(), 1);
    match &outcome.source {
        ResultSource::Fallback { reason } => assert!(reason.contains("connection refused")),
        other => panic!("unexpected source {:?}", other),
    }
}

#[tokio::test]
async fn test_image_search_observation_is_verbatim() {
    let llm = ScriptedLlmClient::new()
        .reply(tool_call("get_image_search", json!({"query": "Paris"})))
        .reply(trip_response());
    let h = harness(llm, 5);
    let outcome = h.trip.plan("3 days in Paris", Some("s-img")).await.unwrap();

    assert!(!outcome.is_fallback());
    assert_eq!(h.image_calls.load(Ordering::SeqCst), 1);
    let calls = h.llm.calls();
    let last = calls[1].messages.last().unwrap();
    assert_eq!(last.role, Role::Tool);
    assert_eq!(
        last.content,
        format!("Observation from get_image_search: {}", IMAGE_OUTPUT)
    );
    assert_eq!(outcome.result.itinerary.overview.image_urls.len(), 3);

    // 返回文档与模型给出的一致，只有会话 ID 与时间戳被覆盖
    assert_eq!(outcome.document["sessionId"], "s-img");
    assert_ne!(outcome.document["timestamp"], "ignored");
    assert_eq!(without_stamp(outcome.document), without_stamp(trip_document()));
}

#[tokio::test]
async fn test_null_fields_do_not_force_fallback() {
    let mut plan = trip_document();
    plan["itinerary"]["Cities"] = json!([{
        "Accomodation": {"name": "Hotel Lutetia", "geocode": {"latitude": null, "longitude": null}},
        "days": [{"title": null, "activities": []}]
    }]);
    let llm = ScriptedLlmClient::new().reply(respond_with(&plan));
    let h = harness(llm, 5);
    let outcome = h.trip.plan("3 days in Paris", None).await.unwrap();

    assert_eq!(outcome.source, ResultSource::Agent);
    assert_eq!(outcome.result.itinerary.cities[0].accommodation.name, "Hotel Lutetia");
    assert_eq!(outcome.result.itinerary.cities[0].accommodation.geocode.latitude, 0.0);
    assert!(outcome.document["itinerary"]["Cities"][0]["Accomodation"]["geocode"]["latitude"].is_null());
    assert_eq!(without_stamp(outcome.document), without_stamp(plan));
}

#[tokio::test]
async fn test_unknown_tool_becomes_error_observation() {
    let llm = ScriptedLlmClient::new()
        .reply(tool_call("get_flights", json!({"from": "NYC"})))
        .reply(trip_response());
    let h = harness(llm, 5);
    let outcome = h.trip.plan("3 days in Paris", None).await.unwrap();

    assert_eq!(outcome.source, ResultSource::Agent);
    let calls = h.llm.calls();
    let last = calls[1].messages.last().unwrap();
    assert_eq!(last.role, Role::Tool);
    assert!(last.content.starts_with("Observation from get_flights (error):"));
    assert!(last.content.contains("get_image_search"));
}

#[tokio::test]
async fn test_invalid_arguments_do_not_reach_tool() {
    let llm = ScriptedLlmClient::new()
        .reply(tool_call("get_image_search", json!({"q": "Paris"})))
        .reply(trip_response());
    let h = harness(llm, 5);
    let outcome = h.trip.plan("3 days in Paris", None).await.unwrap();

    assert!(!outcome.is_fallback());
    assert_eq!(h.image_calls.load(Ordering::SeqCst), 0);
    let last = h.llm.calls()[1].messages.last().cloned().unwrap();
    assert!(last.content.starts_with("Observation from get_image_search (error):"));
}

#[tokio::test]
async fn test_response_and_tool_call_together_is_rejected() {
    let both = format!(
        "<response>done</response>\n{}",
        tool_call("get_weather", json!({"query": "Paris"}))
    );
    let llm = ScriptedLlmClient::new().reply(both).reply(trip_response());
    let h = harness(llm, 5);
    let outcome = h.trip.plan("3 days in Paris", None).await.unwrap();

    assert_eq!(outcome.source, ResultSource::Agent);
    let calls = h.llm.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(corrective_messages(&calls[1].messages), 1);
    assert_eq!(calls[1].messages.iter().filter(|m| m.role == Role::Tool).count(), 0);
}

#[tokio::test]
async fn test_undecodable_final_answer_uses_fallback() {
    let llm = ScriptedLlmClient::new().reply("<response>Have a great trip!</response>");
    let h = harness(llm, 5);
    let outcome = h.trip.plan("3 days in Paris", None).await.unwrap();

    assert!(outcome.is_fallback());
    assert_eq!(outcome.rounds, 1);
}

#[tokio::test]
async fn test_fallback_is_stable_across_runs() {
    let h = harness(ScriptedLlmClient::new().repeat("no protocol"), 1);
    let a = h.trip.plan("trip", None).await.unwrap();
    let b = h.trip.plan("trip", None).await.unwrap();

    assert!(a.is_fallback() && b.is_fallback());
    assert_ne!(a.result.session_id, b.result.session_id);
    assert_eq!(a.result.itinerary, b.result.itinerary);
    assert_eq!(a.result.message, b.result.message);
    assert_eq!(a.document["sessionId"], a.result.session_id.as_str());
    assert_eq!(without_stamp(a.document), without_stamp(b.document));

    let store = fallback_store();
    let mut x = store.resolve(ResultKind::Trip);
    let mut y = store.resolve(ResultKind::Trip);
    for v in [&mut x, &mut y] {
        let obj = v.as_object_mut().unwrap();
        obj.remove("sessionId");
        obj.remove("timestamp");
    }
    assert_eq!(x, y);
}

#[tokio::test]
async fn test_cancelled_run_makes_no_calls() {
    let h = harness(ScriptedLlmClient::new().repeat("no protocol"), 5);
    let token = CancellationToken::new();
    token.cancel();
    let res = h
        .trip
        .plan_with("trip", None, RunControl::default().with_cancel(token))
        .await;

    assert!(matches!(res, Err(AgentError::Cancelled)));
    assert_eq!(h.llm.call_count(), 0);
}

/// get_weather 的替身：开始后等待放行，用于在工具执行中途丢弃调用方
struct GatedWeather {
    started: Arc<Notify>,
    release: Arc<Notify>,
    finished: Arc<AtomicUsize>,
}

#[async_trait]
impl Tool for GatedWeather {
    fn spec(&self) -> Result<ToolSpec, SpecError> {
        ToolSpec::builder("get_weather")
            .description("gated weather")
            .required("query", ParamType::String, "input")
            .build()
    }

    async fn execute(&self, _args: ToolArgs) -> Result<String, String> {
        self.started.notify_one();
        self.release.notified().await;
        self.finished.fetch_add(1, Ordering::SeqCst);
        Ok("sunny".to_string())
    }
}

#[tokio::test]
async fn test_dropped_caller_lets_tool_finish_then_stops() {
    let started = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let finished = Arc::new(AtomicUsize::new(0));
    let mut registry = ToolRegistry::new();
    for &name in TRIP_TOOLS.iter().filter(|&&n| n != "get_weather") {
        registry
            .register(FakeTool {
                name,
                param: "query",
                output: String::new(),
                calls: Arc::default(),
            })
            .unwrap();
    }
    registry
        .register(GatedWeather {
            started: Arc::clone(&started),
            release: Arc::clone(&release),
            finished: Arc::clone(&finished),
        })
        .unwrap();
    let llm = Arc::new(
        ScriptedLlmClient::new()
            .reply(tool_call("get_weather", json!({"query": "Paris"})))
            .repeat(trip_response()),
    );
    let orchestrator = Arc::new(TaskOrchestrator::new(
        llm.clone(),
        Arc::new(registry),
        Arc::new(fallback_store()),
    ));
    let trip = Arc::new(TripPlanner::new(orchestrator, 5, 3).unwrap());

    let token = CancellationToken::new();
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let control = RunControl::default().with_cancel(token.clone()).with_events(tx);
    // 模拟 HTTP handler：调用方 future 在工具执行中途被丢弃
    let caller = tokio::spawn(async move {
        spawn_run(control, move |c| async move {
            trip.plan_with("3 days in Paris", None, c).await
        })
        .await
    });
    started.notified().await;
    caller.abort();
    assert!(caller.await.is_err());
    assert!(token.is_cancelled());
    assert_eq!(finished.load(Ordering::SeqCst), 0);

    release.notify_one();
    let mut events = Vec::new();
    while let Some(ev) = tokio::time::timeout(std::time::Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
    {
        events.push(ev);
    }

    assert_eq!(finished.load(Ordering::SeqCst), 1);
    assert_eq!(llm.call_count(), 1);
    assert!(events.iter().any(|ev| matches!(
        ev,
        ReactEvent::Observation { tool, ok: true, .. } if tool == "get_weather"
    )));
    assert_eq!(
        events.last(),
        Some(&ReactEvent::Failed {
            reason: "cancelled".to_string()
        })
    );
}

#[tokio::test]
async fn test_empty_query_is_rejected() {
    let h = harness(ScriptedLlmClient::new(), 5);
    assert!(matches!(
        h.trip.plan("   ", None).await,
        Err(AgentError::InvalidRequest(_))
    ));
    assert_eq!(h.llm.call_count(), 0);
}

#[tokio::test]
async fn test_events_follow_round_order() {
    let llm = ScriptedLlmClient::new()
        .reply(tool_call("get_weather", json!({"query": "Paris"})))
        .reply(trip_response());
    let h = harness(llm, 5);
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    h.trip
        .plan_with("3 days in Paris", None, RunControl::default().with_events(tx))
        .await
        .unwrap();

    let mut kinds = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        kinds.push(match ev {
            ReactEvent::RoundStarted { .. } => "round",
            ReactEvent::Thought { .. } => "thought",
            ReactEvent::ToolCall { .. } => "tool_call",
            ReactEvent::Observation { .. } => "observation",
            ReactEvent::FormatRetry { .. } => "retry",
            ReactEvent::Final { .. } => "final",
            ReactEvent::Failed { .. } => "failed",
        });
    }
    assert_eq!(
        kinds,
        vec!["round", "thought", "tool_call", "observation", "round", "thought", "final"]
    );
}

#[tokio::test]
async fn test_blog_analyzes_images_then_answers() {
    let blog = json!({
        "blog_content": {"title": "Harbour Days", "Detail": "# Harbour Days\n\n![Harbour](https://img.test/h.jpg \"Morning\")"},
        "metadata": {"word_count": 3, "reading_time": "1 minute", "generated_at": ""},
        "message": "Enjoy"
    });
    let llm = ScriptedLlmClient::new()
        .reply(tool_call(
            "get_multimodal_capability",
            json!({"query": "Describe the scene", "image_url": "https://img.test/h.jpg"}),
        ))
        .reply(format!("<response>{}</response>", blog));
    let h = harness(llm, 5);
    let mut req = BlogRequest::new("A weekend by the sea");
    req.user_images = vec!["https://img.test/h.jpg".into()];
    let outcome = h.blog.generate(&req).await.unwrap();

    assert_eq!(outcome.source, ResultSource::Agent);
    assert_eq!(outcome.result.blog_content.title, "Harbour Days");
    assert!(outcome.result.session_id.starts_with("session_"));
    assert!(!outcome.result.timestamp.is_empty());
}

#[tokio::test]
async fn test_blog_tools_are_scoped() {
    let llm = ScriptedLlmClient::new()
        .reply(tool_call("get_hotels", json!({"location": "Paris"})))
        .repeat("no protocol");
    let h = harness(llm, 2);
    let outcome = h.blog.generate(&BlogRequest::new("Paris")).await.unwrap();

    assert!(outcome.is_fallback());
    assert_eq!(outcome.result.blog_content.title, "Fallback Blog");
    let last = h.llm.calls()[1].messages.last().cloned().unwrap();
    assert!(last.content.starts_with("Observation from get_hotels (error):"));
}

#[tokio::test]
async fn test_blog_request_validation_happens_before_llm() {
    let h = harness(ScriptedLlmClient::new(), 5);
    let res = h.blog.generate(&BlogRequest::default()).await;
    assert!(matches!(res, Err(AgentError::InvalidRequest(_))));
    assert_eq!(h.llm.call_count(), 0);
}
