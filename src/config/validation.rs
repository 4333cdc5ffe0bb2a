use crate::config::types::{BrowserConfig, Config, CrawlerConfig, JobEntry, OutputConfig};
use crate::ConfigError;
use std::collections::HashSet;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_browser_config(&config.browser)?;
    validate_output_config(&config.output)?;
    validate_jobs(&config.jobs)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_concurrent < 1 || config.max_concurrent > 100 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent must be between 1 and 100, got {}",
            config.max_concurrent
        )));
    }

    if config.start_page < 1 {
        return Err(ConfigError::Validation(format!(
            "start_page must be >= 1, got {}",
            config.start_page
        )));
    }

    if config.limit == Some(0) {
        return Err(ConfigError::Validation(
            "limit must be >= 1 when set".to_string(),
        ));
    }

    if config.error_budget < 1 {
        return Err(ConfigError::Validation(format!(
            "error_budget must be >= 1, got {}",
            config.error_budget
        )));
    }

    if config.timeout_ms < 100 {
        return Err(ConfigError::Validation(format!(
            "timeout_ms must be >= 100ms, got {}ms",
            config.timeout_ms
        )));
    }

    if config.settle_delay_min_ms > config.settle_delay_max_ms {
        return Err(ConfigError::Validation(format!(
            "settle_delay_min_ms ({}) must not exceed settle_delay_max_ms ({})",
            config.settle_delay_min_ms, config.settle_delay_max_ms
        )));
    }

    Ok(())
}

/// Validates browser configuration
fn validate_browser_config(config: &BrowserConfig) -> Result<(), ConfigError> {
    if config.launch_timeout_ms < 1000 {
        return Err(ConfigError::Validation(format!(
            "launch_timeout_ms must be >= 1000ms, got {}ms",
            config.launch_timeout_ms
        )));
    }

    if let Some(path) = &config.chrome_path {
        if path.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "chrome_path cannot be empty".to_string(),
            ));
        }
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.root.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "output root cannot be empty".to_string(),
        ));
    }

    if config.max_parallel_jobs < 1 || config.max_parallel_jobs > 50 {
        return Err(ConfigError::Validation(format!(
            "max_parallel_jobs must be between 1 and 50, got {}",
            config.max_parallel_jobs
        )));
    }

    Ok(())
}

/// Validates job entries: keys must be unique and usable as directory names
fn validate_jobs(jobs: &[JobEntry]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();

    for job in jobs {
        validate_job_key(&job.key)?;

        if !seen.insert(job.key.as_str()) {
            return Err(ConfigError::Validation(format!(
                "Duplicate job key '{}'",
                job.key
            )));
        }
    }

    Ok(())
}

/// Validates a job key
fn validate_job_key(key: &str) -> Result<(), ConfigError> {
    if key.is_empty() {
        return Err(ConfigError::Validation(
            "Job key cannot be empty".to_string(),
        ));
    }

    if !key
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(ConfigError::Validation(format!(
            "Job key '{}' must contain only alphanumeric characters, '-', '_' or '.'",
            key
        )));
    }

    if key.starts_with('.') {
        return Err(ConfigError::Validation(format!(
            "Job key '{}' cannot start with '.'",
            key
        )));
    }

    Ok(())
}
