//! Configuration types.

/// Pipeline engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Response-time SLA threshold in hours. A message older than this
    /// when it enters the pipeline counts as an SLA breach.
    pub sla_threshold_hours: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sla_threshold_hours: 2.0,
        }
    }
}

impl EngineConfig {
    /// Validate the configuration. A non-positive threshold would mark
    /// every message as breached.
    pub fn validate(&self) -> Result<(), crate::error::ConfigError> {
        if self.sla_threshold_hours <= 0.0 {
            return Err(crate::error::ConfigError::InvalidValue {
                key: "sla_threshold_hours".into(),
                message: format!("must be greater than 0, got {}", self.sla_threshold_hours),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_threshold_is_two_hours() {
        let config = EngineConfig::default();
        assert!((config.sla_threshold_hours - 2.0).abs() < f64::EPSILON);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_threshold_rejected() {
        let config = EngineConfig {
            sla_threshold_hours: 0.0,
        };
        assert!(config.validate().is_err());
    }
}
