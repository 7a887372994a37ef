/// Readiness flags for one Service/Endpoints pair.
///
/// Each flag reflects only the latest relevant event; classifiers reset a
/// flag before recomputing it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadinessState {
    pub service_ready: bool,
    pub endpoints_ready: bool,
    pub endpoints_settled: bool,
}

impl ReadinessState {
    pub fn succeeded(&self) -> bool {
        self.service_ready && self.endpoints_ready && self.endpoints_settled
    }

    /// Check applied when the wait is cut short by cancellation or timeout.
    /// Settling is not required here, unlike [`ReadinessState::succeeded`].
    pub fn ready_ignoring_settle(&self) -> bool {
        self.service_ready && self.endpoints_ready
    }
}
