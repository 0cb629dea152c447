use std::time::Duration;

/// Settings applied to every statement an [`crate::Orm`] issues.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrmConfig {
    /// Per-statement timeout. `None` leaves statements unbounded.
    pub query_timeout: Option<Duration>,
    /// Accept `0` as a single integer primary key in update, delete and
    /// refetch by default.
    pub allow_zero_primary_key: bool,
}

impl OrmConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = Some(timeout);
        self
    }

    pub fn allow_zero_primary_key(mut self, allow: bool) -> Self {
        self.allow_zero_primary_key = allow;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_setters() {
        let config = OrmConfig::new()
            .query_timeout(Duration::from_millis(250))
            .allow_zero_primary_key(true);
        assert_eq!(config.query_timeout, Some(Duration::from_millis(250)));
        assert!(config.allow_zero_primary_key);
        assert_eq!(OrmConfig::default().query_timeout, None);
    }
}
