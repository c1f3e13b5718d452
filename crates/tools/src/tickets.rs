//! The desk tools: office lookup, ticket creation, ticket status, and the
//! utility interaction log.
//!
//! One struct per tool kind, parameterized by [`ServiceDomain`]. Domain
//! misses (unknown woreda, unknown ticket) are returned as `{"error": ...}`
//! values for the model to relay; only malformed input and ledger failures
//! are `ToolError`s. Ticket creation takes any woreda the citizen names and
//! only canonicalizes the known sub-cities.

use addis_core::{ParamType, ParameterSchema, Tool, ToolContext, ToolError};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::directory::{OfficeDirectory, canonical_woreda, woreda_names};
use crate::domain::ServiceDomain;
use crate::ledger::{Interaction, LedgerError, TicketLedger, TicketRecord, TicketStatus};

pub const REGISTER_INTERACTION_TOOL: &str = "register_utility_interaction";

/// Attempts at drawing an unused ticket number before giving up.
const TICKET_NUMBER_ATTEMPTS: usize = 3;

fn required_str(args: &Map<String, Value>, key: &str, tool: &str) -> Result<String, ToolError> {
    match args.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Some(Value::String(_)) => Err(ToolError::execution(tool, format!("'{key}' must not be empty"))),
        Some(other) => Err(ToolError::execution(
            tool,
            format!("'{key}' must be a string, got {other}"),
        )),
        None => Err(ToolError::execution(tool, format!("missing '{key}'"))),
    }
}

fn optional_str(args: &Map<String, Value>, key: &str) -> Option<String> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

fn unknown_woreda(woreda: &str) -> Value {
    json!({
        "error": format!(
            "Unknown woreda: {woreda}. Known woredas: {}",
            woreda_names().join(", ")
        )
    })
}

fn ledger_error(tool: &str, e: LedgerError) -> ToolError {
    ToolError::execution(tool, e.to_string())
}

fn to_json<T: serde::Serialize>(tool: &str, value: &T) -> Result<Value, ToolError> {
    serde_json::to_value(value).map_err(|e| ToolError::execution(tool, e.to_string()))
}

/// `PREFIX-` followed by eight upper-case hex characters.
pub fn generate_ticket_number(domain: ServiceDomain) -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("{}-{}", domain.prefix(), hex[..8].to_uppercase())
}

// --- Office lookup ---

pub struct OfficeLookupTool {
    domain: ServiceDomain,
    name: String,
    description: String,
    directory: Arc<OfficeDirectory>,
}

impl OfficeLookupTool {
    pub fn new(domain: ServiceDomain, directory: Arc<OfficeDirectory>) -> Self {
        Self {
            domain,
            name: domain.office_tool_name(),
            description: format!(
                "Get the {} office contact details (name, phone, email, address, coordinates) for a woreda in Addis Ababa.",
                domain.slug()
            ),
            directory,
        }
    }
}

#[async_trait]
impl Tool for OfficeLookupTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> ParameterSchema {
        ParameterSchema::new().required(
            "woreda_name",
            ParamType::String,
            "The woreda (sub-city) name, e.g. Bole or Addis Ketema",
        )
    }

    async fn execute(
        &self,
        args: Map<String, Value>,
        ctx: &mut ToolContext,
    ) -> Result<Value, ToolError> {
        let woreda = required_str(&args, "woreda_name", &self.name)?;
        ctx.state.set_current_issue_type(self.domain.label());

        match self.directory.lookup(self.domain, &woreda) {
            Some(office) => to_json(&self.name, office),
            None => Ok(unknown_woreda(&woreda)),
        }
    }
}

// --- Ticket creation ---

pub struct CreateTicketTool {
    domain: ServiceDomain,
    name: String,
    description: String,
    ledger: Arc<dyn TicketLedger>,
}

impl CreateTicketTool {
    pub fn new(domain: ServiceDomain, ledger: Arc<dyn TicketLedger>) -> Self {
        Self {
            domain,
            name: domain.create_tool_name(),
            description: format!(
                "Create a new {} issue ticket. Returns the ticket number (prefix {}-) and its status.",
                domain.slug(),
                domain.prefix()
            ),
            ledger,
        }
    }
}

#[async_trait]
impl Tool for CreateTicketTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> ParameterSchema {
        let mut schema = ParameterSchema::new().required(
            "woreda",
            ParamType::String,
            "The woreda (sub-city) where the issue is",
        );
        if self.domain == ServiceDomain::Emergency {
            schema = schema.required(
                "emergency_type",
                ParamType::String,
                "Kind of emergency, e.g. fire, medical, flood",
            );
        }
        schema = schema
            .required(
                "issue_description",
                ParamType::String,
                "What happened, in the user's words",
            )
            .optional(
                "user_contact",
                ParamType::String,
                "Phone number or other contact for follow-up",
            );
        if self.domain == ServiceDomain::Emergency {
            schema = schema.optional(
                "location_details",
                ParamType::String,
                "Landmarks or directions to the exact location",
            );
        }
        schema
    }

    async fn execute(
        &self,
        args: Map<String, Value>,
        ctx: &mut ToolContext,
    ) -> Result<Value, ToolError> {
        let raw_woreda = required_str(&args, "woreda", &self.name)?;
        let issue_description = required_str(&args, "issue_description", &self.name)?;
        let emergency_type = if self.domain == ServiceDomain::Emergency {
            Some(required_str(&args, "emergency_type", &self.name)?)
        } else {
            None
        };

        let woreda = match canonical_woreda(&raw_woreda) {
            Some(known) => known.to_string(),
            None => raw_woreda.split_whitespace().collect::<Vec<_>>().join(" "),
        };

        let now = Utc::now();
        let mut ticket = TicketRecord {
            ticket_number: generate_ticket_number(self.domain),
            service: self.domain,
            woreda: woreda.clone(),
            issue_description,
            emergency_type,
            user_contact: optional_str(&args, "user_contact"),
            location_details: optional_str(&args, "location_details"),
            status: TicketStatus::Received,
            created_at: now,
            updated_at: now,
        };

        let mut attempt = 1;
        loop {
            match self.ledger.insert(ticket.clone()).await {
                Ok(()) => break,
                Err(LedgerError::Duplicate(_)) if attempt < TICKET_NUMBER_ATTEMPTS => {
                    attempt += 1;
                    ticket.ticket_number = generate_ticket_number(self.domain);
                }
                Err(e) => return Err(ledger_error(&self.name, e)),
            }
        }

        info!(
            ticket_number = %ticket.ticket_number,
            service = self.domain.label(),
            woreda = %ticket.woreda,
            session_id = %ctx.session_id,
            "Ticket created"
        );

        ctx.state
            .set_last_ticket(&ticket.ticket_number, self.domain.label(), ticket.created_at);
        ctx.state.set_user_woreda(&woreda);
        ctx.state.set_current_issue_type(self.domain.label());

        Ok(json!({
            "ticket_number": ticket.ticket_number,
            "status": ticket.status,
            "created_at": ticket.created_at,
        }))
    }
}

// --- Ticket status ---

pub struct TicketStatusTool {
    domain: ServiceDomain,
    name: String,
    description: String,
    ledger: Arc<dyn TicketLedger>,
}

impl TicketStatusTool {
    pub fn new(domain: ServiceDomain, ledger: Arc<dyn TicketLedger>) -> Self {
        Self {
            domain,
            name: domain.status_tool_name(),
            description: format!(
                "Get the current status of a {} ticket by its ticket number.",
                domain.slug()
            ),
            ledger,
        }
    }
}

#[async_trait]
impl Tool for TicketStatusTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> ParameterSchema {
        ParameterSchema::new().required(
            "ticket_number",
            ParamType::String,
            "The ticket number, e.g. POWR-1A2B3C4D",
        )
    }

    async fn execute(
        &self,
        args: Map<String, Value>,
        _ctx: &mut ToolContext,
    ) -> Result<Value, ToolError> {
        let ticket_number = required_str(&args, "ticket_number", &self.name)?.to_uppercase();
        let not_found = || json!({ "error": format!("{} ticket not found", self.domain.label()) });

        // Each desk only sees its own tickets
        if ServiceDomain::from_ticket_number(&ticket_number) != Some(self.domain) {
            return Ok(not_found());
        }

        match self
            .ledger
            .get(&ticket_number)
            .await
            .map_err(|e| ledger_error(&self.name, e))?
        {
            Some(ticket) => to_json(&self.name, &ticket),
            None => Ok(not_found()),
        }
    }
}

// --- Utility interaction log ---

pub struct RegisterInteractionTool {
    ledger: Arc<dyn TicketLedger>,
}

impl RegisterInteractionTool {
    pub fn new(ledger: Arc<dyn TicketLedger>) -> Self {
        Self { ledger }
    }
}

#[async_trait]
impl Tool for RegisterInteractionTool {
    fn name(&self) -> &str {
        REGISTER_INTERACTION_TOOL
    }

    fn description(&self) -> &str {
        "Log a utility enquiry that does not need a ticket (billing questions, general information)."
    }

    fn parameters(&self) -> ParameterSchema {
        ParameterSchema::new()
            .required("woreda", ParamType::String, "The user's woreda")
            .required("issue_description", ParamType::String, "What the user asked about")
            .optional("user_contact", ParamType::String, "Contact for follow-up")
    }

    async fn execute(
        &self,
        args: Map<String, Value>,
        ctx: &mut ToolContext,
    ) -> Result<Value, ToolError> {
        let raw_woreda = required_str(&args, "woreda", REGISTER_INTERACTION_TOOL)?;
        let issue_description = required_str(&args, "issue_description", REGISTER_INTERACTION_TOOL)?;
        let woreda = canonical_woreda(&raw_woreda)
            .map(String::from)
            .unwrap_or(raw_woreda);

        let id = self
            .ledger
            .log_interaction(Interaction {
                woreda,
                issue_description,
                user_contact: optional_str(&args, "user_contact"),
                recorded_at: Utc::now(),
            })
            .await
            .map_err(|e| ledger_error(REGISTER_INTERACTION_TOOL, e))?;

        ctx.state.set_current_issue_type(ServiceDomain::Utility.label());

        Ok(json!({ "status": "SUCCESS", "interaction_id": id }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::InMemoryLedger;
    use addis_core::SessionState;

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn ctx() -> ToolContext {
        ToolContext::new("s1", SessionState::new())
    }

    #[test]
    fn ticket_number_format() {
        let number = generate_ticket_number(ServiceDomain::Infrastructure);
        let (prefix, suffix) = number.split_once('-').unwrap();
        assert_eq!(prefix, "INFR");
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
    }

    #[tokio::test]
    async fn office_lookup_found_and_missing() {
        let tool = OfficeLookupTool::new(ServiceDomain::Power, Arc::new(OfficeDirectory::builtin()));
        let mut ctx = ctx();

        let found = tool
            .execute(args(json!({"woreda_name": "yeka"})), &mut ctx)
            .await
            .unwrap();
        assert_eq!(found["name"], "Yeka Power Office");
        assert_eq!(ctx.state.current_issue_type(), Some("Power"));

        let missing = tool
            .execute(args(json!({"woreda_name": "Gotham"})), &mut ctx)
            .await
            .unwrap();
        let error = missing["error"].as_str().unwrap();
        assert!(error.contains("Unknown woreda: Gotham"));
        assert!(error.contains("Addis Ketema"));
    }

    #[tokio::test]
    async fn create_ticket_records_state() {
        let ledger: Arc<dyn TicketLedger> = Arc::new(InMemoryLedger::new());
        let tool = CreateTicketTool::new(ServiceDomain::Infrastructure, Arc::clone(&ledger));
        let mut ctx = ctx();

        let out = tool
            .execute(
                args(json!({
                    "woreda": "addis ketema",
                    "issue_description": "Large pothole near Merkato",
                })),
                &mut ctx,
            )
            .await
            .unwrap();

        let number = out["ticket_number"].as_str().unwrap();
        assert!(number.starts_with("INFR-"));
        assert_eq!(out["status"], "RECEIVED");

        assert_eq!(ctx.state.user_woreda(), Some("Addis Ketema"));
        let last = ctx.state.last_ticket().unwrap();
        assert_eq!(last.ticket_number, number);
        assert_eq!(last.service.as_deref(), Some("Infrastructure"));

        let stored = ledger.get(number).await.unwrap().unwrap();
        assert_eq!(stored.woreda, "Addis Ketema");
        assert!(stored.user_contact.is_none());
    }

    #[tokio::test]
    async fn create_ticket_accepts_unlisted_woreda() {
        let ledger: Arc<dyn TicketLedger> = Arc::new(InMemoryLedger::new());
        let tool = CreateTicketTool::new(ServiceDomain::Power, Arc::clone(&ledger));
        let mut ctx = ctx();

        let out = tool
            .execute(
                args(json!({"woreda": "  Woreda   03 ", "issue_description": "No power"})),
                &mut ctx,
            )
            .await
            .unwrap();
        assert!(out.get("error").is_none());
        let number = out["ticket_number"].as_str().unwrap();
        assert!(number.starts_with("POWR-"));

        let stored = ledger.get(number).await.unwrap().unwrap();
        assert_eq!(stored.woreda, "Woreda 03");
        assert_eq!(ctx.state.user_woreda(), Some("Woreda 03"));
        assert_eq!(ledger.ticket_count().await.unwrap(), 1);
    }


    #[tokio::test]
    async fn emergency_ticket_requires_type() {
        let ledger: Arc<dyn TicketLedger> = Arc::new(InMemoryLedger::new());
        let tool = CreateTicketTool::new(ServiceDomain::Emergency, ledger);

        assert_eq!(
            tool.parameters().required_names(),
            vec!["woreda", "emergency_type", "issue_description"]
        );

        let err = tool
            .execute(
                args(json!({"woreda": "Bole", "issue_description": "Fire", "emergency_type": 3})),
                &mut ctx(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed { .. }));
    }

    #[tokio::test]
    async fn status_lookup_round_trip() {
        let ledger: Arc<dyn TicketLedger> = Arc::new(InMemoryLedger::new());
        let create = CreateTicketTool::new(ServiceDomain::Sanitation, Arc::clone(&ledger));
        let status = TicketStatusTool::new(ServiceDomain::Sanitation, Arc::clone(&ledger));
        let power_status = TicketStatusTool::new(ServiceDomain::Power, Arc::clone(&ledger));
        let mut ctx = ctx();

        let created = create
            .execute(
                args(json!({"woreda": "Lideta", "issue_description": "Overflowing bins"})),
                &mut ctx,
            )
            .await
            .unwrap();
        let number = created["ticket_number"].as_str().unwrap().to_lowercase();

        let found = status
            .execute(args(json!({"ticket_number": number})), &mut ctx)
            .await
            .unwrap();
        assert_eq!(found["status"], "RECEIVED");
        assert_eq!(found["service"], "sanitation");

        let other_desk = power_status
            .execute(args(json!({"ticket_number": number})), &mut ctx)
            .await
            .unwrap();
        assert_eq!(other_desk["error"], "Power ticket not found");

        let missing = status
            .execute(args(json!({"ticket_number": "SANI-00000000"})), &mut ctx)
            .await
            .unwrap();
        assert_eq!(missing["error"], "Sanitation ticket not found");
    }

    #[tokio::test]
    async fn register_interaction_returns_id() {
        let ledger = Arc::new(InMemoryLedger::new());
        let tool = RegisterInteractionTool::new(ledger.clone());
        let mut ctx = ctx();

        let out = tool
            .execute(
                args(json!({"woreda": "kirkos", "issue_description": "How do I pay my water bill?"})),
                &mut ctx,
            )
            .await
            .unwrap();

        assert_eq!(out["status"], "SUCCESS");
        assert_eq!(out["interaction_id"], 1);
        assert_eq!(ledger.interactions().await[0].woreda, "Kirkos");
        assert_eq!(ctx.state.current_issue_type(), Some("Utility"));
    }
}
