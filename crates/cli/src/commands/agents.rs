//! `addis-sync agents`: Show the capability tree and tool wiring.

use addis_agent::Runtime;
use addis_config::AppConfig;
use addis_core::CapabilityNode;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let runtime = Runtime::from_config(&config);
    let orchestrator = &runtime.orchestrator;

    println!("Addis-Sync Agent Roster");
    println!("=======================");
    println!();
    print_node(orchestrator.tree(), 0, |name| {
        orchestrator.registry().resolve(name).is_some()
    });
    let assigned = orchestrator.tree().collect_tool_names();
    let unassigned: Vec<&str> = orchestrator
        .registry()
        .names()
        .into_iter()
        .filter(|name| !assigned.contains(name))
        .collect();
    if !unassigned.is_empty() {
        println!();
        println!("  Registered but not offered to any role: {}", unassigned.join(", "));
    }

    println!();
    println!(
        "  {} tools registered, turn cap {}",
        orchestrator.registry().len(),
        config.agent.max_turns
    );

    Ok(())
}

fn print_node(node: &CapabilityNode, depth: usize, registered: impl Fn(&str) -> bool + Copy) {
    let indent = "  ".repeat(depth + 1);
    println!("{indent}{} [{}]", node.name, node.model_id);
    if !node.description.is_empty() {
        println!("{indent}  {}", node.description);
    }
    for tool in node.tool_names() {
        let mark = if registered(tool) { "+" } else { "!" };
        println!("{indent}  {mark} {tool}");
    }
    for child in node.children() {
        print_node(child, depth + 1, registered);
    }
}
