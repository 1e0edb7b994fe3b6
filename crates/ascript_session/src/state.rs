//! The session lifecycle states and the transition table.

/// Mirrors the six states in the data model exactly; no sub-states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Starting,
    Running,
    WaitingForTool,
    Completed,
    Cancelled,
    Failed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }

    /// Whether `self -> to` is one of the transitions the data model lists.
    /// Any state may move to any terminal state; non-terminal transitions
    /// are the narrow running/waiting_for_tool dance.
    pub fn can_transition_to(self, to: SessionState) -> bool {
        use SessionState::*;
        if self.is_terminal() {
            return false;
        }
        if to.is_terminal() {
            return true;
        }
        matches!((self, to), (Starting, Running) | (Running, WaitingForTool) | (WaitingForTool, Running))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SessionState::*;

    #[test]
    fn starting_may_only_move_to_running_or_a_terminal_state() {
        assert!(Starting.can_transition_to(Running));
        assert!(Starting.can_transition_to(Failed));
        assert!(!Starting.can_transition_to(WaitingForTool));
    }

    #[test]
    fn running_and_waiting_for_tool_form_the_tool_call_loop() {
        assert!(Running.can_transition_to(WaitingForTool));
        assert!(WaitingForTool.can_transition_to(Running));
        assert!(!Running.can_transition_to(Starting));
    }

    #[test]
    fn terminal_states_accept_no_further_transitions() {
        for terminal in [Completed, Cancelled, Failed] {
            for target in [Starting, Running, WaitingForTool, Completed, Cancelled, Failed] {
                assert!(!terminal.can_transition_to(target));
            }
        }
    }
}
