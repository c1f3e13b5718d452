//! Service domains handled by the desk.

use serde::{Deserialize, Serialize};

/// One municipal service line. Each has its own office network, ticket
/// prefix, and set of tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceDomain {
    Emergency,
    Power,
    Sanitation,
    Infrastructure,
    Utility,
}

impl ServiceDomain {
    pub const ALL: [ServiceDomain; 5] = [
        Self::Emergency,
        Self::Power,
        Self::Sanitation,
        Self::Infrastructure,
        Self::Utility,
    ];

    /// Ticket number prefix.
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Emergency => "EMER",
            Self::Power => "POWR",
            Self::Sanitation => "SANI",
            Self::Infrastructure => "INFR",
            Self::Utility => "UTIL",
        }
    }

    /// Display label, also stored as `last_ticket_service`.
    pub fn label(self) -> &'static str {
        match self {
            Self::Emergency => "Emergency",
            Self::Power => "Power",
            Self::Sanitation => "Sanitation",
            Self::Infrastructure => "Infrastructure",
            Self::Utility => "Utility",
        }
    }

    pub fn slug(self) -> &'static str {
        match self {
            Self::Emergency => "emergency",
            Self::Power => "power",
            Self::Sanitation => "sanitation",
            Self::Infrastructure => "infrastructure",
            Self::Utility => "utility",
        }
    }

    /// The domain a ticket number belongs to, judged by its prefix.
    pub fn from_ticket_number(ticket_number: &str) -> Option<Self> {
        let prefix = ticket_number.trim().split('-').next()?;
        Self::ALL
            .into_iter()
            .find(|d| d.prefix().eq_ignore_ascii_case(prefix))
    }

    pub fn office_tool_name(self) -> String {
        match self {
            Self::Emergency => "find_closest_emergency_office".into(),
            other => format!("get_{}_office_by_woreda", other.slug()),
        }
    }

    pub fn create_tool_name(self) -> String {
        format!("create_{}_ticket", self.slug())
    }

    pub fn status_tool_name(self) -> String {
        format!("get_{}_ticket_status", self.slug())
    }

    /// Every tool this domain's specialist exposes, in declaration order.
    pub fn tool_names(self) -> Vec<String> {
        let mut names = vec![
            self.office_tool_name(),
            self.create_tool_name(),
            self.status_tool_name(),
        ];
        if self == Self::Utility {
            names.push(crate::tickets::REGISTER_INTERACTION_TOOL.to_string());
        }
        names
    }
}

impl std::fmt::Display for ServiceDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
