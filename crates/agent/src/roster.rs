//! The Addis-Sync role roster: a customer service dispatcher with one
//! specialist per service domain.

use addis_core::CapabilityNode;
use addis_tools::{ServiceDomain, woreda_names};

pub const ROOT_ROLE: &str = "customer_service";

const ROOT_INSTRUCTION: &str = "\
You are the Customer Service Agent for Addis-Sync, the urban service coordination platform of Addis Ababa.

You are the first point of contact for citizens. Greet them politely, understand what they need, decide which \
service domain the issue belongs to, and handle it with that specialist's tools. You have every specialist's \
tools available directly; the specialist sections below describe how each domain must be handled.

Service domains:
- Emergency: fire, medical emergencies, accidents, evacuations, safety incidents.
- Power: outages, transformer faults, electrical damage, streetlight power failures.
- Sanitation: missed waste collection, overflowing bins, illegal dumping, drainage.
- Infrastructure: potholes, damaged roads, bridges, sidewalks, public structures.
- Utility: water supply, pipe bursts, sewer lines, hydraulic infrastructure.

Session state:
- The SESSION STATE block below lists what is already known about this citizen.
- If user:woreda is present, do not ask for the woreda again unless the citizen says the issue is elsewhere.
- If the citizen asks about \"my ticket\" and last_ticket_number is present, check that ticket instead of asking for the number.

Rules:
- Never invent ticket numbers, phone numbers, or office details. Only report what the tools return.
- If a tool returns an error, explain the problem in plain language and ask for what is missing.
- Politely decline requests that are not about city services.";

/// Known woredas, listed in every specialist instruction.
fn woreda_list() -> String {
    woreda_names().join(", ")
}

fn specialist_instruction(domain: ServiceDomain) -> String {
    let scope = match domain {
        ServiceDomain::Emergency => {
            "fires, medical emergencies, accidents, evacuations and other immediate safety incidents"
        }
        ServiceDomain::Power => {
            "power outages, transformer failures, electrical infrastructure damage and high voltage concerns"
        }
        ServiceDomain::Sanitation => {
            "missed waste collection, overflowing bins, illegal dumping and drainage problems"
        }
        ServiceDomain::Infrastructure => {
            "potholes, road damage, bridge issues, sidewalk problems and damaged public structures"
        }
        ServiceDomain::Utility => {
            "water supply interruptions, pipe bursts, sewer line failures and hydraulic infrastructure problems"
        }
    };

    let mut text = format!(
        "You are the {label} Agent for Addis-Sync. You handle {scope}.\n\n\
NEW REPORT:\n\
1. Ask for the woreda if it is missing (use user:woreda from session state when present). Known woredas: {woredas}.\n\
2. Look up the office with {office}.\n\
3. Create a ticket with {create}, passing the woreda and a short issue description.\n\
4. Reply with the ticket number, the office name, phone, email and address, and tell the citizen the office has been notified.\n\n\
STATUS CHECK:\n\
Call {status} with the ticket number (or last_ticket_number from session state) and report the status clearly.\n",
        label = domain.label(),
        woredas = woreda_list(),
        office = domain.office_tool_name(),
        create = domain.create_tool_name(),
        status = domain.status_tool_name(),
    );

    match domain {
        ServiceDomain::Emergency => text.push_str(
            "\nEmergency tickets also need emergency_type (fire, medical, accident, ...). \
If lives are at risk, tell the citizen to call 911 or 939 immediately before anything else.\n",
        ),
        ServiceDomain::Utility => text.push_str(
            "\nFor questions that do not need a ticket, log them with register_utility_interaction.\n",
        ),
        _ => {}
    }
    text.push_str("\nNever invent ticket numbers and never change a ticket's status yourself.");
    text
}

fn specialist(domain: ServiceDomain, model: &str) -> CapabilityNode {
    CapabilityNode::new(format!("{}_agent", domain.slug()), model, specialist_instruction(domain))
        .with_description(format!("Handles {} service requests", domain.slug()))
        .with_tools(domain.tool_names())
}

/// Build the Addis-Sync capability tree.
pub fn addis_capability_tree(root_model: &str, specialist_model: &str) -> CapabilityNode {
    ServiceDomain::ALL.into_iter().fold(
        CapabilityNode::new(ROOT_ROLE, root_model, ROOT_INSTRUCTION)
            .with_description("Primary customer service agent for Addis-Sync"),
        |root, domain| root.with_child(specialist(domain, specialist_model)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use addis_tools::{InMemoryLedger, default_registry};
    use std::sync::Arc;

    #[test]
    fn tree_shape() {
        let tree = addis_capability_tree("root-model", "specialist-model");
        assert_eq!(tree.name, ROOT_ROLE);
        assert_eq!(tree.model_id, "root-model");
        assert!(tree.tool_names().is_empty());

        let children: Vec<_> = tree.children().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            children,
            vec![
                "emergency_agent",
                "power_agent",
                "sanitation_agent",
                "infrastructure_agent",
                "utility_agent"
            ]
        );
        assert!(tree.children().iter().all(|c| c.model_id == "specialist-model"));
    }

    #[test]
    fn every_tree_tool_is_registered() {
        let tree = addis_capability_tree("a", "b");
        let registry = default_registry(Arc::new(InMemoryLedger::new()));
        let names = tree.collect_tool_names();
        assert_eq!(names.len(), registry.len());
        for name in names {
            assert!(registry.resolve(name).is_some(), "{name} not registered");
        }
    }

    #[test]
    fn specialist_instructions_name_their_tools() {
        let tree = addis_capability_tree("a", "b");
        let infra = tree.find("infrastructure_agent").unwrap();
        assert!(infra.instruction.contains("get_infrastructure_office_by_woreda"));
        assert!(infra.instruction.contains("create_infrastructure_ticket"));
        assert!(infra.instruction.contains("Addis Ketema"));

        let emergency = tree.find("emergency_agent").unwrap();
        assert!(emergency.instruction.contains("emergency_type"));
    }
}
