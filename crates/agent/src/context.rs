//! Context assembly: turns the capability tree and session state into the
//! system instruction and tool list for one turn.
//!
//! The instruction has three parts, in this order:
//!
//! 1. The root role's instruction
//! 2. A `SESSION STATE:` block with one `key: value` line per entry
//! 3. A `### SPECIALIST AGENT CAPABILITIES:` block listing every descendant
//!    role depth-first
//!
//! # Determinism
//!
//! Assembly is a pure function of its inputs. State iterates in insertion
//! order and the tree is walked in declaration order, so identical inputs
//! always produce byte-identical instructions.

use addis_core::{CapabilityNode, SessionState, ToolDefinition, ToolRegistry};
use serde_json::Value;
use std::fmt::Write;
use tracing::{debug, warn};

const STATE_HEADING: &str = "SESSION STATE:\n";
const EMPTY_STATE: &str = "(empty)\n";
const SPECIALIST_HEADING: &str = "### SPECIALIST AGENT CAPABILITIES:\n";

/// Output of the assembler.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledContext {
    /// Full system instruction sent to the provider
    pub instruction: String,

    /// Tool definitions the model may call, in tree order
    pub tools: Vec<ToolDefinition>,
}

/// Builds the per-turn context from the capability tree.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextAssembler;

impl ContextAssembler {
    pub fn new() -> Self {
        Self
    }

    /// Assemble the instruction and tool list for a turn.
    ///
    /// Tool names that the registry cannot resolve are dropped with a
    /// warning; they never reach the provider.
    pub fn assemble(
        &self,
        root: &CapabilityNode,
        state: &SessionState,
        registry: &ToolRegistry,
    ) -> AssembledContext {
        let mut instruction = String::with_capacity(root.instruction.len() + 1024);
        instruction.push_str(&root.instruction);
        instruction.push_str("\n\n");
        instruction.push_str(&render_state(state));

        instruction.push_str("\n\n");
        instruction.push_str(SPECIALIST_HEADING);
        for node in root.descendants() {
            // Infallible for String
            let _ = write!(
                instruction,
                "\n--- {} ---\n{}\n",
                node.name.to_uppercase(),
                node.instruction
            );
        }

        let tools = resolve_tools(root, registry);
        debug!(
            instruction_len = instruction.len(),
            state_keys = state.len(),
            tools = tools.len(),
            "Assembled turn context"
        );

        AssembledContext { instruction, tools }
    }
}

/// Render session state as `key: value` lines.
///
/// Strings are written bare, everything else as compact JSON.
pub fn render_state(state: &SessionState) -> String {
    let mut out = String::from(STATE_HEADING);
    if state.is_empty() {
        out.push_str(EMPTY_STATE);
        return out;
    }
    for (key, value) in state.iter() {
        let rendered = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let _ = writeln!(out, "{key}: {rendered}");
    }
    out
}

fn resolve_tools(root: &CapabilityNode, registry: &ToolRegistry) -> Vec<ToolDefinition> {
    root.collect_tool_names()
        .into_iter()
        .filter_map(|name| match registry.resolve(name) {
            Some(tool) => Some(tool.to_definition()),
            None => {
                warn!(tool = %name, "Capability tree names a tool that is not registered; dropping it");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use addis_core::{ParamType, ParameterSchema, Tool, ToolContext, ToolError};
    use async_trait::async_trait;
    use serde_json::{Map, json};
    use std::sync::Arc;

    struct NamedTool(&'static str);

    #[async_trait]
    impl Tool for NamedTool {
        fn name(&self) -> &str {
            self.0
        }
        fn description(&self) -> &str {
            "test tool"
        }
        fn parameters(&self) -> ParameterSchema {
            ParameterSchema::new().required("woreda", ParamType::String, "Woreda")
        }
        async fn execute(
            &self,
            _args: Map<String, Value>,
            _ctx: &mut ToolContext,
        ) -> Result<Value, ToolError> {
            Ok(json!({}))
        }
    }

    fn tree() -> CapabilityNode {
        CapabilityNode::new("dispatcher", "m", "Route citizens.")
            .with_child(
                CapabilityNode::new("power_agent", "m", "Handle outages.")
                    .with_tools(["power_office", "ghost_tool"]),
            )
            .with_child(
                CapabilityNode::new("roads_agent", "m", "Handle potholes.")
                    .with_tools(["roads_office", "power_office"]),
            )
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(NamedTool("power_office")));
        registry.register(Arc::new(NamedTool("roads_office")));
        registry
    }

    #[test]
    fn empty_state_renders_placeholder() {
        let ctx = ContextAssembler::new().assemble(&tree(), &SessionState::new(), &registry());
        assert!(ctx.instruction.starts_with("Route citizens.\n\nSESSION STATE:\n(empty)\n"));
    }

    #[test]
    fn state_values_render_bare_or_as_json() {
        let mut state = SessionState::new();
        state.set("user:woreda", "Bole");
        state.set("attempts", 2);
        state.set("flags", json!({"urgent": true}));

        let rendered = render_state(&state);
        assert_eq!(
            rendered,
            "SESSION STATE:\nuser:woreda: Bole\nattempts: 2\nflags: {\"urgent\":true}\n"
        );
    }

    #[test]
    fn specialists_listed_depth_first_with_upper_case_names() {
        let ctx = ContextAssembler::new().assemble(&tree(), &SessionState::new(), &registry());
        let power = ctx.instruction.find("--- POWER_AGENT ---\nHandle outages.").unwrap();
        let roads = ctx.instruction.find("--- ROADS_AGENT ---\nHandle potholes.").unwrap();
        let heading = ctx.instruction.find(SPECIALIST_HEADING).unwrap();
        assert!(heading < power && power < roads);
    }

    #[test]
    fn unresolved_tools_dropped_and_duplicates_collapsed() {
        let ctx = ContextAssembler::new().assemble(&tree(), &SessionState::new(), &registry());
        let names: Vec<_> = ctx.tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["power_office", "roads_office"]);
    }

    #[test]
    fn identical_inputs_are_byte_identical() {
        let mut state = SessionState::new();
        state.set("current_issue_type", "power");
        state.set("user:woreda", "Yeka");

        let assembler = ContextAssembler::new();
        let a = assembler.assemble(&tree(), &state, &registry());
        let b = assembler.assemble(&tree(), &state.clone(), &registry());
        assert_eq!(a.instruction, b.instruction);
        assert_eq!(a, b);
    }
}
