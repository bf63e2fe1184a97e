//! Actions run after a transition

/// Work the runtime performs for a `(previous_state, event)` pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Generate and publish a full system response
    Respond,
    /// Revoke everything published for the current system turn
    Retract,
    /// Publish a short acknowledgment without claiming the floor
    Backchannel,
}
