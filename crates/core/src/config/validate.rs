use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Scheduler sizes, intervals and retry policy are usable
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Server validation
    if config.server.port == 0 {
        return Err(invalid("server.port cannot be 0"));
    }

    // Scheduler validation
    let scheduler = &config.scheduler;
    if scheduler.batch_size == 0 {
        return Err(invalid("scheduler.batch_size must be at least 1"));
    }
    if scheduler.max_concurrent_items == 0 {
        return Err(invalid("scheduler.max_concurrent_items must be at least 1"));
    }
    if scheduler.idle_poll_interval_ms == 0 {
        return Err(invalid("scheduler.idle_poll_interval_ms must be at least 1"));
    }
    if scheduler.item_timeout_ms == 0 {
        return Err(invalid("scheduler.item_timeout_ms must be at least 1"));
    }
    if scheduler.retry.max_attempts == 0 {
        return Err(invalid("scheduler.retry.max_attempts must be at least 1"));
    }
    if scheduler.retry.backoff_multiplier < 1.0 {
        return Err(invalid(
            "scheduler.retry.backoff_multiplier must be at least 1.0",
        ));
    }

    Ok(())
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::ValidationError(message.to_string())
}
