//! End-to-end integration tests for the Addis-Sync service desk.
//!
//! These tests run the real roster, tool registry, and ticket ledger behind
//! the turn orchestrator, with scripted providers standing in for the model.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use addis_agent::{
    MAX_TURNS_REPLY, PROVIDERS_EXHAUSTED_REPLY, ROOT_ROLE, TurnOrchestrator, addis_capability_tree,
};
use addis_config::AppConfig;
use addis_core::{
    AdapterError, CallArguments, DomainEvent, EventBus, Exchange, ProviderAdapter, ProviderStep,
    RequestedCall, TurnOutcome, TurnRole,
};
use addis_providers::FallbackChain;
use addis_sessions::SessionStore;
use addis_tools::{InMemoryLedger, TicketLedger, default_registry};
use serde_json::{Value, json};

// ── Scripted Provider ────────────────────────────────────────────────────

type Script = Box<dyn Fn(usize, &Exchange) -> Result<ProviderStep, AdapterError> + Send + Sync>;

/// A provider whose next step is computed from its call index and the
/// exchange it receives. Every exchange is kept for inspection.
struct ScriptedProvider {
    name: &'static str,
    script: Script,
    call_count: AtomicUsize,
    seen: Mutex<Vec<Exchange>>,
}

impl ScriptedProvider {
    fn new(
        name: &'static str,
        script: impl Fn(usize, &Exchange) -> Result<ProviderStep, AdapterError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            name,
            script: Box::new(script),
            call_count: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn text(name: &'static str, text: &'static str) -> Arc<Self> {
        Self::new(name, move |_, _| Ok(ProviderStep::Text(text.into())))
    }

    fn calls(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    fn last_exchange(&self) -> Exchange {
        self.seen.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for ScriptedProvider {
    fn name(&self) -> &str {
        self.name
    }

    fn model(&self) -> &str {
        "scripted"
    }

    async fn converse(&self, exchange: &Exchange) -> Result<ProviderStep, AdapterError> {
        let n = self.call_count.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(exchange.clone());
        (self.script)(n, exchange)
    }
}

fn call(id: &str, name: &str, args: Value) -> RequestedCall {
    RequestedCall {
        id: id.into(),
        name: name.into(),
        arguments: CallArguments::from_value(args),
    }
}

fn tools(calls: Vec<RequestedCall>) -> Result<ProviderStep, AdapterError> {
    Ok(ProviderStep::ToolCalls(calls))
}

fn text(t: impl Into<String>) -> Result<ProviderStep, AdapterError> {
    Ok(ProviderStep::Text(t.into()))
}

/// Payload of reply `i` in the latest recorded round.
fn last_reply(exchange: &Exchange, i: usize) -> Value {
    exchange
        .rounds
        .last()
        .map(|r| r.replies[i].payload.clone())
        .unwrap_or(Value::Null)
}

struct Desk {
    orchestrator: TurnOrchestrator,
    ledger: Arc<InMemoryLedger>,
    events: Arc<EventBus>,
}

fn desk(providers: Vec<Arc<ScriptedProvider>>) -> Desk {
    let ledger = Arc::new(InMemoryLedger::new());
    let events = Arc::new(EventBus::new(256));
    let chain = providers
        .into_iter()
        .fold(FallbackChain::new().with_events(Arc::clone(&events)), |chain, p| {
            chain.add(p, Duration::from_secs(5))
        });

    let orchestrator = TurnOrchestrator::new(
        Arc::new(addis_capability_tree("root-model", "specialist-model")),
        Arc::new(default_registry(Arc::clone(&ledger) as Arc<dyn TicketLedger>)),
        Arc::new(chain),
        Arc::new(SessionStore::new(Duration::from_secs(7200))),
    )
    .with_events(Arc::clone(&events));

    Desk {
        orchestrator,
        ledger,
        events,
    }
}

// ── E2E: Session store ───────────────────────────────────────────────────

#[tokio::test]
async fn e2e_session_lookup_is_idempotent() {
    let desk = desk(vec![ScriptedProvider::text("a", "ok")]);
    let store = desk.orchestrator.store();

    let first = store.get_or_create("citizen-1");
    let second = store.get_or_create("citizen-1");
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn e2e_history_alternates_over_many_turns() {
    let desk = desk(vec![ScriptedProvider::text("a", "Noted.")]);

    for i in 0..5 {
        desk.orchestrator.run_turn("s", &format!("message {i}")).await;
    }

    let meta = desk.orchestrator.store().session_metadata("s").await.unwrap();
    assert_eq!(meta.turns, 10);

    let handle = desk.orchestrator.store().get("s").unwrap();
    let session = handle.lock().await;
    for (i, turn) in session.history.iter().enumerate() {
        let expected = if i % 2 == 0 { TurnRole::User } else { TurnRole::Model };
        assert_eq!(turn.role, expected, "history entry {i}");
    }
    assert_eq!(session.history[8].content, "message 4");
}

// ── E2E: Degraded outcomes ───────────────────────────────────────────────

#[tokio::test]
async fn e2e_turn_cap_terminates_with_degraded_text() {
    let provider = ScriptedProvider::new("a", |n, _| {
        tools(vec![call(
            &format!("c{n}"),
            "get_power_ticket_status",
            json!({"ticket_number": "POWR-00000000"}),
        )])
    });
    let desk = desk(vec![provider.clone()]);

    let reply = desk.orchestrator.run_turn("s", "check forever").await;
    assert!(!reply.is_empty());
    assert_eq!(reply, MAX_TURNS_REPLY);
    assert_eq!(provider.calls(), 10);

    let meta = desk.orchestrator.store().session_metadata("s").await.unwrap();
    assert_eq!(meta.turns, 2);
}

#[tokio::test]
async fn e2e_fallback_uses_second_provider_after_transient_failure() {
    let a = ScriptedProvider::new("a", |_, _| {
        Err(AdapterError::TransientFailure("HTTP 429".into()))
    });
    let b = ScriptedProvider::text("b", "Hello from the fallback model");
    let desk = desk(vec![a.clone(), b.clone()]);
    let mut rx = desk.events.subscribe();

    let reply = desk.orchestrator.run_turn("s", "hello").await;
    assert_eq!(reply, "Hello from the fallback model");

    // Both failed attempts on A were published before B answered
    let mut failures = 0;
    while let Ok(event) = rx.try_recv() {
        if let DomainEvent::ProviderFailed { provider, kind, .. } = event.as_ref() {
            assert_eq!(provider, "a");
            assert_eq!(kind, "transient");
            failures += 1;
        }
    }
    assert_eq!(failures, 2);
}

#[tokio::test]
async fn e2e_bad_credentials_are_skipped_on_later_turns() {
    let a = ScriptedProvider::new("a", |_, _| Err(AdapterError::AuthFailure("HTTP 401".into())));
    let b = ScriptedProvider::text("b", "ok");
    let desk = desk(vec![a.clone(), b.clone()]);

    desk.orchestrator.run_turn("s", "one").await;
    desk.orchestrator.run_turn("s", "two").await;

    assert_eq!(a.calls(), 1);
    assert_eq!(b.calls(), 2);
    assert!(desk.orchestrator.chain().status()[0].disabled);
}

#[tokio::test]
async fn e2e_all_providers_failing_still_answers() {
    let a = ScriptedProvider::new("a", |_, _| Err(AdapterError::ProtocolFailure("garbled".into())));
    let b = ScriptedProvider::new("b", |_, _| Err(AdapterError::TransientFailure("503".into())));
    let desk = desk(vec![a, b]);
    let mut rx = desk.events.subscribe();

    let reply = desk.orchestrator.run_turn("s", "hello").await;
    assert_eq!(reply, PROVIDERS_EXHAUSTED_REPLY);
    assert!(!reply.contains("garbled") && !reply.contains("503"));

    let mut outcome = None;
    while let Ok(event) = rx.try_recv() {
        if let DomainEvent::TurnCompleted { outcome: o, .. } = event.as_ref() {
            outcome = Some(*o);
        }
    }
    assert_eq!(outcome, Some(TurnOutcome::ProvidersExhausted));
}

// ── E2E: Tool errors ─────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_tool_errors_reach_the_model_not_the_user() {
    let provider = ScriptedProvider::new("a", |n, exchange| match n {
        0 => tools(vec![
            call("c1", "teleport_citizen", json!({})),
            call("c2", "create_power_ticket", json!({"woreda": "Bole"})),
        ]),
        _ => {
            let unknown = last_reply(exchange, 0);
            let invalid = last_reply(exchange, 1);
            assert!(unknown["error"].as_str().unwrap().contains("teleport_citizen"));
            assert!(invalid["error"].as_str().unwrap().contains("issue_description"));
            text("Could you describe the power problem?")
        }
    });
    let desk = desk(vec![provider.clone()]);

    let reply = desk.orchestrator.run_turn("s", "power issue").await;
    assert_eq!(reply, "Could you describe the power problem?");
    assert!(!reply.contains("Tool"));
    assert_eq!(desk.ledger.ticket_count().await.unwrap(), 0);
}

#[tokio::test]
async fn e2e_unknown_woreda_is_a_soft_error() {
    let provider = ScriptedProvider::new("a", |n, exchange| match n {
        0 => tools(vec![call(
            "c1",
            "get_sanitation_office_by_woreda",
            json!({"woreda_name": "Gotham"}),
        )]),
        _ => {
            let payload = last_reply(exchange, 0);
            assert!(payload["result"]["error"].is_string());
            text("I don't recognise that woreda. Which sub-city are you in?")
        }
    });
    let desk = desk(vec![provider]);

    desk.orchestrator.run_turn("s", "garbage everywhere").await;

    assert_eq!(desk.ledger.ticket_count().await.unwrap(), 0);
    let meta = desk.orchestrator.store().session_metadata("s").await.unwrap();
    assert!(!meta.state_keys.iter().any(|k| k == "user:woreda"));
}

// ── E2E: The Merkato pothole ─────────────────────────────────────────────

#[tokio::test]
async fn e2e_merkato_pothole_creates_infrastructure_ticket() {
    let provider = ScriptedProvider::new("gemini", |n, exchange| match n {
        // Turn 1: no woreda known yet
        0 => {
            assert!(exchange.instruction.contains("SESSION STATE:\n(empty)"));
            text("I'm sorry about the pothole. Which woreda is it in?")
        }
        // Turn 2: look up the office and file the ticket
        1 => {
            assert_eq!(exchange.history.len(), 2);
            tools(vec![
                call(
                    "c1",
                    "get_infrastructure_office_by_woreda",
                    json!({"woreda_name": "Addis Ketema"}),
                ),
                call(
                    "c2",
                    "create_infrastructure_ticket",
                    json!({
                        "woreda": "Addis Ketema",
                        "issue_description": "Large pothole near Merkato",
                    }),
                ),
            ])
        }
        _ => {
            let office = last_reply(exchange, 0);
            let ticket = last_reply(exchange, 1);
            text(format!(
                "{} ({}) has been notified. Your ticket number is {}.",
                office["result"]["name"].as_str().unwrap(),
                office["result"]["phone"].as_str().unwrap(),
                ticket["result"]["ticket_number"].as_str().unwrap(),
            ))
        }
    });
    let desk = desk(vec![provider.clone()]);
    let orch = &desk.orchestrator;

    let first = orch
        .run_turn("merkato", "There's a huge pothole near Merkato")
        .await;
    assert!(first.to_lowercase().contains("woreda"));

    let second = orch.run_turn("merkato", "Addis Ketema").await;
    assert!(second.contains("Addis Ketema Infrastructure Office"));
    assert!(second.contains("+251-11-7771234"));

    let number = second
        .split_whitespace()
        .find(|w| w.starts_with("INFR-"))
        .map(|w| w.trim_end_matches('.'))
        .unwrap()
        .to_string();
    assert_eq!(number.len(), "INFR-".len() + 8);
    assert!(number[5..].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));

    let ticket = desk.ledger.get(&number).await.unwrap().unwrap();
    assert_eq!(ticket.woreda, "Addis Ketema");

    let handle = orch.store().get("merkato").unwrap();
    let session = handle.lock().await;
    assert_eq!(session.state.user_woreda(), Some("Addis Ketema"));
    assert_eq!(
        session.state.get_str("last_ticket_number"),
        Some(number.as_str())
    );
    assert_eq!(session.history.len(), 4);
}

#[tokio::test]
async fn e2e_followup_turn_sees_last_ticket_in_state() {
    let provider = ScriptedProvider::new("a", |n, exchange| match n {
        0 => tools(vec![call(
            "c1",
            "create_power_ticket",
            json!({"woreda": "Bole", "issue_description": "Transformer sparking"}),
        )]),
        1 => text("Ticket filed."),
        2 => {
            // The next turn's instruction carries the stored ticket number
            let line = exchange
                .instruction
                .lines()
                .find(|l| l.starts_with("last_ticket_number: "))
                .unwrap();
            let number = line.trim_start_matches("last_ticket_number: ").to_string();
            tools(vec![call("c2", "get_power_ticket_status", json!({"ticket_number": number}))])
        }
        _ => {
            let status = last_reply(exchange, 0);
            text(format!("Status: {}", status["result"]["status"].as_str().unwrap()))
        }
    });
    let desk = desk(vec![provider]);

    desk.orchestrator.run_turn("s", "Power is out in Bole").await;
    let reply = desk.orchestrator.run_turn("s", "What's happening with my ticket?").await;
    assert_eq!(reply, "Status: RECEIVED");
}

// ── E2E: State scoping ───────────────────────────────────────────────────

#[tokio::test]
async fn e2e_clearing_context_keeps_only_user_keys() {
    let provider = ScriptedProvider::new("a", |n, _| match n {
        0 => tools(vec![call(
            "c1",
            "create_utility_ticket",
            json!({"woreda": "yeka", "issue_description": "No water for two days"}),
        )]),
        _ => text("Filed."),
    });
    let desk = desk(vec![provider]);
    let store = desk.orchestrator.store();

    desk.orchestrator.run_turn("s", "no water").await;
    let before = store.session_metadata("s").await.unwrap();
    assert!(before.state_keys.len() > 1);

    assert!(store.clear_ephemeral_state("s").await);
    let after = store.session_metadata("s").await.unwrap();
    assert_eq!(after.state_keys, vec!["user:woreda".to_string()]);
    assert_eq!(after.turns, 2);

    assert!(!store.clear_ephemeral_state("missing").await);
}

#[tokio::test]
async fn e2e_idle_sessions_are_swept() {
    let desk = desk(vec![ScriptedProvider::text("a", "ok")]);
    let store = desk.orchestrator.store();

    desk.orchestrator.run_turn("old", "hi").await;
    let later = chrono::Utc::now() + chrono::Duration::hours(3);

    assert_eq!(store.sweep_expired(later), 1);
    assert!(store.get("old").is_none());
}

// ── E2E: Roster ──────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_root_instruction_lists_every_specialist() {
    let provider = ScriptedProvider::text("a", "Hello!");
    let desk = desk(vec![provider.clone()]);

    desk.orchestrator.run_turn("s", "hi").await;
    let exchange = provider.last_exchange();

    assert_eq!(desk.orchestrator.tree().name, ROOT_ROLE);
    for name in [
        "EMERGENCY_AGENT",
        "POWER_AGENT",
        "SANITATION_AGENT",
        "INFRASTRUCTURE_AGENT",
        "UTILITY_AGENT",
    ] {
        assert!(exchange.instruction.contains(&format!("--- {name} ---")), "{name}");
    }
    assert_eq!(exchange.tools.len(), 16);
}

// ── E2E: Gateway ─────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_gateway_chat_roundtrip() {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    let desk = desk(vec![ScriptedProvider::text("a", "Welcome to Addis-Sync")]);
    let app = addis_gateway::build_router(Arc::new(desk.orchestrator), None);

    let req = Request::builder()
        .method("POST")
        .uri("/v1/chat")
        .header("content-type", "application/json")
        .body(Body::from(json!({"message": "hello"}).to_string()))
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let chat: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(chat["reply"], "Welcome to Addis-Sync");
    assert!(chat["session_id"].as_str().is_some_and(|s| !s.is_empty()));
}

// ── E2E: Configuration ───────────────────────────────────────────────────

#[test]
fn e2e_config_file_drives_models_and_turn_cap() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[agent]
max_turns = 4
root_model = "gemini-2.5-pro"

[providers.openrouter]
enabled = false
"#,
    )
    .unwrap();

    let config = AppConfig::load_from(&path).unwrap();
    assert_eq!(config.agent.max_turns, 4);

    let runtime = addis_agent::Runtime::from_config(&config);
    assert_eq!(runtime.orchestrator.tree().model_id, "gemini-2.5-pro");
    let status = runtime.orchestrator.chain().status();
    assert_eq!(status[0].provider, "gemini");
    assert_eq!(status[0].model, "gemini-2.5-pro");
    assert!(status.iter().all(|c| c.provider != "openrouter"));
}

#[test]
fn e2e_invalid_config_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[agent]\nmax_turns = 0\n").unwrap();

    assert!(AppConfig::load_from(&path).is_err());
}
