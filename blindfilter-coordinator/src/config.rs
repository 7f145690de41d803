/// Configuration for the matching coordinator.
#[derive(Debug, Clone, Default)]
pub struct CoordinatorConfig {
    /// Upper bound on rules sent in one match payload. `None` means no limit.
    pub max_payload_rules: Option<usize>,
}

impl CoordinatorConfig {
    /// Caps the number of rules a match payload may carry.
    pub fn with_max_payload_rules(mut self, limit: usize) -> Self {
        self.max_payload_rules = Some(limit);
        self
    }
}
