//! The turn orchestrator: drives one user prompt through the model, the
//! tools, and back to a reply.
//!
//! A turn moves through `ASSEMBLE → AWAIT_RESPONSE → {DISPATCH_TOOL →
//! AWAIT_RESPONSE}* → DONE | MAX_TURNS | PROVIDER_EXHAUSTED`. Every outcome
//! produces text, and every outcome appends exactly one (user, model) pair
//! to the session history.

use addis_config::AgentConfig;
use addis_core::{
    CallArguments, CapabilityNode, DomainEvent, EventBus, Exchange, OrchestrationError,
    ProviderStep, RequestedCall, Session, ToolContext, ToolError, ToolRegistry, ToolReply,
    TurnOutcome,
};
use addis_providers::FallbackChain;
use addis_sessions::SessionStore;
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::context::ContextAssembler;

pub const DEFAULT_MAX_TURNS: u32 = 10;
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

/// Reply when the model answers with no text at all.
pub const EMPTY_REPLY: &str = "I processed that, but have no text response.";

/// Reply when the tool loop hits the turn cap.
pub const MAX_TURNS_REPLY: &str = "I'm sorry, I could not finish handling your request: the maximum \
tool execution limit was reached. Please try again, or describe the issue in a single message.";

/// Reply when no provider could answer.
pub const PROVIDERS_EXHAUSTED_REPLY: &str = "I'm sorry, all of our AI service providers failed to \
respond right now. Please try again in a few minutes.";

/// Runs turns against a shared capability tree, tool registry, provider
/// chain and session store.
pub struct TurnOrchestrator {
    tree: Arc<CapabilityNode>,
    registry: Arc<ToolRegistry>,
    chain: Arc<FallbackChain>,
    store: Arc<SessionStore>,
    assembler: ContextAssembler,
    events: Option<Arc<EventBus>>,
    max_turns: u32,
    tool_timeout: Duration,
}

impl TurnOrchestrator {
    pub fn new(
        tree: Arc<CapabilityNode>,
        registry: Arc<ToolRegistry>,
        chain: Arc<FallbackChain>,
        store: Arc<SessionStore>,
    ) -> Self {
        Self {
            tree,
            registry,
            chain,
            store,
            assembler: ContextAssembler::new(),
            events: None,
            max_turns: DEFAULT_MAX_TURNS,
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    /// Apply the turn cap and tool timeout from configuration.
    pub fn with_agent_config(self, config: &AgentConfig) -> Self {
        self.with_max_turns(config.max_turns)
            .with_tool_timeout(config.tool_timeout())
    }

    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = max_turns.max(1);
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn tree(&self) -> &CapabilityNode {
        &self.tree
    }

    pub fn chain(&self) -> &FallbackChain {
        &self.chain
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Run one turn and return the reply text. Never fails.
    ///
    /// Turns on the same session are serialized by the session lock; turns
    /// on different sessions run concurrently.
    pub async fn run_turn(&self, session_id: &str, prompt: &str) -> String {
        let started = Instant::now();
        let handle = self.store.get_or_create(session_id);
        let mut session = handle.lock().await;

        let context = self
            .assembler
            .assemble(&self.tree, &session.state, &self.registry);
        let mut exchange = Exchange::new(
            context.instruction,
            context.tools,
            session.history.clone(),
            prompt,
        );

        let mut model_steps = 0u32;
        let (reply, outcome) = match self
            .drive(&mut session, &mut exchange, &mut model_steps)
            .await
        {
            Ok(text) if text.trim().is_empty() => (EMPTY_REPLY.to_string(), TurnOutcome::Done),
            Ok(text) => (text, TurnOutcome::Done),
            Err(err @ OrchestrationError::MaxTurnsExceeded { .. }) => {
                warn!(session_id = %session_id, error = %err, "Turn hit the tool loop limit");
                (MAX_TURNS_REPLY.to_string(), TurnOutcome::MaxTurns)
            }
            Err(err @ OrchestrationError::AllProvidersExhausted { .. }) => {
                warn!(session_id = %session_id, error = %err, "Turn failed on every provider");
                (
                    PROVIDERS_EXHAUSTED_REPLY.to_string(),
                    TurnOutcome::ProvidersExhausted,
                )
            }
        };

        session.record_exchange(prompt, reply.clone());
        drop(session);
        handle.touch();

        let duration_ms = started.elapsed().as_millis() as u64;
        info!(
            session_id = %session_id,
            outcome = ?outcome,
            model_steps,
            duration_ms,
            "Turn completed"
        );
        self.publish(DomainEvent::TurnCompleted {
            session_id: session_id.to_string(),
            outcome,
            model_steps,
            duration_ms,
            timestamp: Utc::now(),
        });

        reply
    }

    /// The AWAIT_RESPONSE / DISPATCH_TOOL loop.
    async fn drive(
        &self,
        session: &mut Session,
        exchange: &mut Exchange,
        model_steps: &mut u32,
    ) -> Result<String, OrchestrationError> {
        let mut cursor = 0usize;
        let mut tool_rounds = 0u32;

        loop {
            let (answered_by, step) = self.chain.complete(exchange, cursor).await?;
            cursor = answered_by;
            *model_steps += 1;

            let calls = match step {
                ProviderStep::Text(text) => return Ok(text),
                ProviderStep::ToolCalls(calls) if calls.is_empty() => return Ok(String::new()),
                ProviderStep::ToolCalls(calls) => calls,
            };

            debug!(
                session_id = %session.id,
                calls = calls.len(),
                round = tool_rounds + 1,
                "Dispatching tool calls"
            );
            let mut replies = Vec::with_capacity(calls.len());
            for call in &calls {
                let result = self.dispatch(session, call).await;
                replies.push(ToolReply::from_result(call, &result));
            }
            exchange.record_round(calls, replies);

            tool_rounds += 1;
            if tool_rounds >= self.max_turns {
                return Err(OrchestrationError::MaxTurnsExceeded {
                    turns: tool_rounds,
                });
            }
        }
    }

    /// Run one tool call in its own task, under the tool timeout.
    ///
    /// The tool works on a copy of the session state; the copy is committed
    /// back only if the task finished in time. A timed-out task is detached
    /// and left to run to completion.
    async fn dispatch(&self, session: &mut Session, call: &RequestedCall) -> Result<Value, ToolError> {
        let started = Instant::now();
        let result = match &call.arguments {
            CallArguments::Malformed { reason, .. } => Err(ToolError::execution(
                &call.name,
                format!("could not decode arguments: {reason}"),
            )),
            CallArguments::Parsed { args } => {
                let registry = Arc::clone(&self.registry);
                let name = call.name.clone();
                let args = args.clone();
                let mut ctx = ToolContext::new(session.id.clone(), session.state.clone());

                let task = tokio::spawn(async move {
                    let result = registry.invoke(&name, args, &mut ctx).await;
                    (result, ctx)
                });

                match tokio::time::timeout(self.tool_timeout, task).await {
                    Ok(Ok((result, ctx))) => {
                        session.state = ctx.state;
                        result
                    }
                    Ok(Err(join_err)) => {
                        let reason = if join_err.is_panic() {
                            "tool panicked".to_string()
                        } else {
                            format!("tool task failed: {join_err}")
                        };
                        Err(ToolError::execution(&call.name, reason))
                    }
                    Err(_) => Err(ToolError::execution(
                        &call.name,
                        format!("timed out after {}ms", self.tool_timeout.as_millis()),
                    )),
                }
            }
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => debug!(tool = %call.name, duration_ms, "Tool finished"),
            Err(e) => warn!(tool = %call.name, duration_ms, error = %e, "Tool failed"),
        }
        self.publish(DomainEvent::ToolExecuted {
            session_id: session.id.clone(),
            tool_name: call.name.clone(),
            success: result.is_ok(),
            duration_ms,
            timestamp: Utc::now(),
        });

        result
    }

    fn publish(&self, event: DomainEvent) {
        if let Some(events) = &self.events {
            events.publish(event);
        }
    }
}
