use std::time::Duration;

/// Tuning parameters fixed at store construction.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Days a sequence-number ledger entry outlives its data entry.
    pub purge_age_days: i64,
    /// Interval between expiration sweeps once bootstrapped.
    pub check_ttl_interval: Duration,
    /// Ledger size that triggers the scheduled purge.
    pub max_sequence_number_map_size_before_purge: usize,
    /// Upper bound for one wire message, shared with the transport layer.
    pub max_permitted_message_size: usize,
    /// Fraction of the message size a get-data response may use.
    pub response_size_fraction: f64,
    /// Share of the response budget given to append-only payloads.
    pub append_only_share: f64,
    /// Share of the response budget given to protected entries.
    pub protected_share: f64,
    /// Delay before re-broadcasting high-priority entries from a response.
    pub rebroadcast_delay: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            purge_age_days: 10,
            check_ttl_interval: Duration::from_secs(60),
            max_sequence_number_map_size_before_purge: 1_000,
            max_permitted_message_size: 10 * 1024 * 1024,
            response_size_fraction: 0.6,
            append_only_share: 0.25,
            protected_share: 0.75,
            rebroadcast_delay: Duration::from_secs(60),
        }
    }
}

impl StoreConfig {
    /// Starts a fluent builder for store config.
    pub fn builder() -> StoreConfigBuilder {
        StoreConfigBuilder::default()
    }

    pub fn purge_age_ms(&self) -> i64 {
        self.purge_age_days * 24 * 60 * 60 * 1_000
    }

    fn response_budget(&self) -> f64 {
        self.max_permitted_message_size as f64 * self.response_size_fraction
    }

    /// Byte budget for append-only payloads in one response.
    pub fn append_only_limit_bytes(&self) -> u64 {
        (self.response_budget() * self.append_only_share).round() as u64
    }

    /// Byte budget for protected entries in one response.
    pub fn protected_limit_bytes(&self) -> u64 {
        (self.response_budget() * self.protected_share).round() as u64
    }
}

/// Fluent builder for `StoreConfig`.
#[derive(Debug, Clone, Default)]
pub struct StoreConfigBuilder {
    cfg: StoreConfig,
}

impl StoreConfigBuilder {
    pub fn purge_age_days(mut self, value: i64) -> Self {
        self.cfg.purge_age_days = value;
        self
    }

    pub fn check_ttl_interval(mut self, value: Duration) -> Self {
        self.cfg.check_ttl_interval = value;
        self
    }

    pub fn max_sequence_number_map_size_before_purge(mut self, value: usize) -> Self {
        self.cfg.max_sequence_number_map_size_before_purge = value;
        self
    }

    pub fn max_permitted_message_size(mut self, value: usize) -> Self {
        self.cfg.max_permitted_message_size = value;
        self
    }

    pub fn rebroadcast_delay(mut self, value: Duration) -> Self {
        self.cfg.rebroadcast_delay = value;
        self
    }

    pub fn build(self) -> StoreConfig {
        self.cfg
    }
}
