//! Topic catalogue and outbound category mapping
//!
//! Topics are plain strings organized by namespace prefix (`agent:`, `tool:`,
//! `memory:`, `visualization:`, `session:`). The namespaces are a convention,
//! not enforced structurally; the constants here exist so bridge and agent
//! code agree on spelling.

/// Agent entered a new state
pub const AGENT_STATE_CHANGE: &str = "agent:state_change";
/// Agent run started
pub const AGENT_RUN_START: &str = "agent:run_start";
/// Agent run finished
pub const AGENT_RUN_END: &str = "agent:run_end";
/// Agent step started
pub const AGENT_STEP_START: &str = "agent:step_start";
/// Agent step finished
pub const AGENT_STEP_END: &str = "agent:step_end";
/// Agent hit an error
pub const AGENT_ERROR: &str = "agent:error";

/// Tool execution started
pub const TOOL_START: &str = "tool:start";
/// Tool execution completed
pub const TOOL_COMPLETED: &str = "tool:completed";
/// Tool execution failed
pub const TOOL_ERROR: &str = "tool:error";

/// Message appended to agent memory
pub const MEMORY_MESSAGE_ADDED: &str = "memory:message_added";
/// Agent memory cleared
pub const MEMORY_CLEARED: &str = "memory:cleared";

/// Browser view updated
pub const VISUALIZATION_BROWSER_UPDATE: &str = "visualization:browser_update";
/// Browser action performed
pub const VISUALIZATION_BROWSER_ACTION: &str = "visualization:browser_action";
/// Browser view closed
pub const VISUALIZATION_BROWSER_CLOSE: &str = "visualization:browser_close";
/// Agent thinking indicator
pub const VISUALIZATION_AGENT_THINKING: &str = "visualization:agent_thinking";

/// Human takeover / release / message from the control plane
pub const HUMAN_INTERACTION: &str = "human:interaction";
/// Control plane requested session termination
pub const SESSION_TERMINATE: &str = "session:terminate";
/// Control plane requested session pause
pub const SESSION_PAUSE: &str = "session:pause";
/// Control plane requested session resume
pub const SESSION_RESUME: &str = "session:resume";

/// The fixed set of topics every bridge connection forwards to the control
/// plane for the lifetime of its connected state.
pub const OUTBOUND_TOPICS: &[&str] = &[
    AGENT_STATE_CHANGE,
    AGENT_RUN_START,
    AGENT_RUN_END,
    AGENT_STEP_START,
    AGENT_STEP_END,
    AGENT_ERROR,
    TOOL_START,
    TOOL_COMPLETED,
    TOOL_ERROR,
    MEMORY_MESSAGE_ADDED,
    MEMORY_CLEARED,
    VISUALIZATION_BROWSER_UPDATE,
    VISUALIZATION_BROWSER_ACTION,
    VISUALIZATION_BROWSER_CLOSE,
    VISUALIZATION_AGENT_THINKING,
];

/// Map a topic to the wire message category used when forwarding it.
///
/// The category is derived from the topic's namespace prefix. Returns `None`
/// for namespaces that are not forwarded (e.g. `session:`, `human:`).
pub fn outbound_category(topic: &str) -> Option<&'static str> {
    if topic.starts_with("agent:") {
        Some("agent_event")
    } else if topic.starts_with("tool:") {
        Some("tool_event")
    } else if topic.starts_with("memory:") {
        Some("memory_event")
    } else if topic.starts_with("visualization:") {
        Some("visualization_event")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_outbound_topic_has_a_category() {
        for topic in OUTBOUND_TOPICS {
            assert!(
                outbound_category(topic).is_some(),
                "no category for {}",
                topic
            );
        }
    }

    #[test]
    fn test_category_per_namespace() {
        assert_eq!(outbound_category(AGENT_RUN_START), Some("agent_event"));
        assert_eq!(outbound_category(TOOL_COMPLETED), Some("tool_event"));
        assert_eq!(outbound_category(MEMORY_CLEARED), Some("memory_event"));
        assert_eq!(
            outbound_category(VISUALIZATION_AGENT_THINKING),
            Some("visualization_event")
        );
    }

    #[test]
    fn test_inbound_namespaces_are_not_forwarded() {
        assert_eq!(outbound_category(HUMAN_INTERACTION), None);
        assert_eq!(outbound_category(SESSION_TERMINATE), None);
        assert_eq!(outbound_category("unrelated:topic"), None);
    }
}
