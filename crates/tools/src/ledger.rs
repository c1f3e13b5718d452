//! Ticket ledger: where created tickets and logged interactions live.
//!
//! The trait is the seam for a persistent store; [`InMemoryLedger`] keeps
//! everything in process memory.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

use crate::domain::ServiceDomain;

/// Lifecycle of a ticket. New tickets start as `RECEIVED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStatus {
    Received,
    InProgress,
    Resolved,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketRecord {
    pub ticket_number: String,
    pub service: ServiceDomain,
    pub woreda: String,
    pub issue_description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emergency_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_contact: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_details: Option<String>,
    pub status: TicketStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A utility desk interaction that did not (yet) become a ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub woreda: String,
    pub issue_description: String,
    pub user_contact: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Ticket number already exists: {0}")]
    Duplicate(String),

    #[error("Ledger unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait TicketLedger: Send + Sync {
    /// Insert a new ticket. Fails with `Duplicate` if the number is taken.
    async fn insert(&self, ticket: TicketRecord) -> Result<(), LedgerError>;

    /// Fetch a ticket by its exact (upper-case) number.
    async fn get(&self, ticket_number: &str) -> Result<Option<TicketRecord>, LedgerError>;

    /// Record an interaction and return its id.
    async fn log_interaction(&self, interaction: Interaction) -> Result<u64, LedgerError>;

    async fn ticket_count(&self) -> Result<usize, LedgerError>;
}

/// An in-memory ledger. Useful for tests and single-process deployments.
pub struct InMemoryLedger {
    tickets: RwLock<HashMap<String, TicketRecord>>,
    interactions: RwLock<Vec<(u64, Interaction)>>,
    next_interaction_id: AtomicU64,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self {
            tickets: RwLock::new(HashMap::new()),
            interactions: RwLock::new(Vec::new()),
            next_interaction_id: AtomicU64::new(1),
        }
    }

    pub async fn interactions(&self) -> Vec<Interaction> {
        self.interactions
            .read()
            .await
            .iter()
            .map(|(_, i)| i.clone())
            .collect()
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TicketLedger for InMemoryLedger {
    async fn insert(&self, ticket: TicketRecord) -> Result<(), LedgerError> {
        let mut tickets = self.tickets.write().await;
        if tickets.contains_key(&ticket.ticket_number) {
            return Err(LedgerError::Duplicate(ticket.ticket_number));
        }
        tickets.insert(ticket.ticket_number.clone(), ticket);
        Ok(())
    }

    async fn get(&self, ticket_number: &str) -> Result<Option<TicketRecord>, LedgerError> {
        Ok(self.tickets.read().await.get(ticket_number).cloned())
    }

    async fn log_interaction(&self, interaction: Interaction) -> Result<u64, LedgerError> {
        let id = self.next_interaction_id.fetch_add(1, Ordering::Relaxed);
        self.interactions.write().await.push((id, interaction));
        Ok(id)
    }

    async fn ticket_count(&self) -> Result<usize, LedgerError> {
        Ok(self.tickets.read().await.len())
    }
}
