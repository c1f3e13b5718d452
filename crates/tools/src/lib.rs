//! Municipal ticket desk tools for Addis-Sync.
//!
//! Each service domain (emergency, power, sanitation, infrastructure,
//! utility) gets an office lookup, a ticket creator, and a ticket status
//! tool; the utility desk can also log plain interactions. Tickets go into
//! a [`TicketLedger`].

pub mod directory;
pub mod domain;
pub mod ledger;
pub mod tickets;

use addis_core::ToolRegistry;
use std::sync::Arc;

pub use directory::{OfficeDirectory, OfficeRecord, canonical_woreda, woreda_names};
pub use domain::ServiceDomain;
pub use ledger::{InMemoryLedger, Interaction, LedgerError, TicketLedger, TicketRecord, TicketStatus};

/// Create a tool registry holding every desk tool, backed by `ledger`.
pub fn default_registry(ledger: Arc<dyn TicketLedger>) -> ToolRegistry {
    let directory = Arc::new(OfficeDirectory::builtin());
    let mut registry = ToolRegistry::new();

    for domain in ServiceDomain::ALL {
        registry.register(Arc::new(tickets::OfficeLookupTool::new(
            domain,
            Arc::clone(&directory),
        )));
        registry.register(Arc::new(tickets::CreateTicketTool::new(
            domain,
            Arc::clone(&ledger),
        )));
        registry.register(Arc::new(tickets::TicketStatusTool::new(
            domain,
            Arc::clone(&ledger),
        )));
    }
    registry.register(Arc::new(tickets::RegisterInteractionTool::new(ledger)));

    registry
}
