//! Named operations: which inbound events settle which outbound event.
//!
//! The table mirrors the backend's socket handlers. It is plain data; the
//! broker never consults it implicitly.

/// Event names of one logical operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Operation {
    pub outbound: &'static str,
    pub success: &'static str,
    pub error: &'static str,
}

impl Operation {
    pub const fn new(outbound: &'static str, success: &'static str, error: &'static str) -> Self {
        Self {
            outbound,
            success,
            error,
        }
    }
}

pub const STATUS: Operation = Operation::new("status", "status_response", "status_error");
pub const FETCH_DATA: Operation =
    Operation::new("fetch_data", "fetch_data_response", "fetch_data_error");
pub const CREATE_PROJECT: Operation = Operation::new(
    "create_project",
    "create_project_success",
    "create_project_error",
);
pub const DELETE_PROJECT: Operation = Operation::new(
    "delete_project",
    "delete_project_success",
    "delete_project_error",
);
pub const FETCH_MESSAGES: Operation = Operation::new(
    "fetch_messages",
    "fetch_messages_response",
    "fetch_messages_error",
);
/// Execute an agent turn.
pub const USER_MESSAGE: Operation =
    Operation::new("user_message", "user_message_success", "user_message_error");
pub const IS_AGENT_ACTIVE: Operation = Operation::new(
    "is_agent_active",
    "is_agent_active_response",
    "is_agent_active_error",
);
pub const GET_AGENT_STATE: Operation = Operation::new(
    "get_agent_state",
    "get_agent_state_response",
    "get_agent_state_error",
);
pub const GET_BROWSER_SNAPSHOT: Operation = Operation::new(
    "get_browser_snapshot",
    "get_browser_snapshot_response",
    "get_browser_snapshot_error",
);
pub const GET_BROWSER_SESSION: Operation = Operation::new(
    "get_browser_session",
    "get_browser_session_response",
    "get_browser_session_error",
);
pub const GET_TERMINAL_SESSION: Operation = Operation::new(
    "get_terminal_session",
    "get_terminal_session_response",
    "get_terminal_session_error",
);
pub const RUN_CODE: Operation = Operation::new("run_code", "run_code_response", "run_code_error");
pub const CALCULATE_TOKENS: Operation = Operation::new(
    "calculate_tokens",
    "calculate_tokens_response",
    "calculate_tokens_error",
);
pub const GET_TOKEN_USAGE: Operation = Operation::new(
    "get_token_usage",
    "get_token_usage_response",
    "get_token_usage_error",
);
pub const FETCH_LOGS: Operation =
    Operation::new("fetch_logs", "fetch_logs_response", "fetch_logs_error");
pub const GET_SETTINGS: Operation =
    Operation::new("get_settings", "get_settings_response", "get_settings_error");
pub const SET_SETTINGS: Operation =
    Operation::new("set_settings", "set_settings_response", "set_settings_error");

/// Every known operation.
pub const CATALOG: &[Operation] = &[
    STATUS,
    FETCH_DATA,
    CREATE_PROJECT,
    DELETE_PROJECT,
    FETCH_MESSAGES,
    USER_MESSAGE,
    IS_AGENT_ACTIVE,
    GET_AGENT_STATE,
    GET_BROWSER_SNAPSHOT,
    GET_BROWSER_SESSION,
    GET_TERMINAL_SESSION,
    RUN_CODE,
    CALCULATE_TOKENS,
    GET_TOKEN_USAGE,
    FETCH_LOGS,
    GET_SETTINGS,
    SET_SETTINGS,
];

/// Find an operation by its outbound event name.
pub fn lookup(outbound: &str) -> Option<&'static Operation> {
    CATALOG.iter().find(|op| op.outbound == outbound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn lookup_finds_by_outbound_name() {
        assert_eq!(lookup("create_project"), Some(&CREATE_PROJECT));
        assert_eq!(lookup("no_such_operation"), None);
    }

    #[test]
    fn catalog_outbound_names_are_unique() {
        let names: HashSet<_> = CATALOG.iter().map(|op| op.outbound).collect();
        assert_eq!(names.len(), CATALOG.len());
    }

    #[test]
    fn every_operation_has_distinct_outcome_events() {
        for op in CATALOG {
            assert_ne!(op.success, op.error, "{} shares outcome events", op.outbound);
            assert!(op.error.starts_with(op.outbound), "{}", op.error);
        }
    }
}
