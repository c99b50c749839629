use crate::config::types::{
    Config, DomainEntry, EnrichmentConfig, OutputConfig, TargetEntry, UserAgentConfig,
};
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_enrichment_config(&config.enrichment)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    validate_denylist_domains(&config.denylist)?;
    validate_targets(&config.targets)?;
    Ok(())
}

/// Validates enrichment engine settings
fn validate_enrichment_config(config: &EnrichmentConfig) -> Result<(), ConfigError> {
    if !config.rate_limit_per_second.is_finite() || config.rate_limit_per_second <= 0.0 {
        return Err(ConfigError::Validation(format!(
            "rate_limit_per_second must be a positive number, got {}",
            config.rate_limit_per_second
        )));
    }

    if let Some(capacity) = config.burst_capacity {
        if !capacity.is_finite() || capacity < 1.0 {
            return Err(ConfigError::Validation(format!(
                "burst_capacity must be >= 1, got {}",
                capacity
            )));
        }
    }

    if config.worker_pool_size < 1 || config.worker_pool_size > 500 {
        return Err(ConfigError::Validation(format!(
            "worker_pool_size must be between 1 and 500, got {}",
            config.worker_pool_size
        )));
    }

    if config.per_target_concurrency < 1 {
        return Err(ConfigError::Validation(
            "per_target_concurrency must be >= 1".to_string(),
        ));
    }

    if config.stage1_timeout_seconds < 1 || config.stage2_timeout_seconds < 1 {
        return Err(ConfigError::Validation(
            "stage timeouts must be at least 1 second".to_string(),
        ));
    }

    if config.max_pages_per_target < 1 {
        return Err(ConfigError::Validation(format!(
            "max_pages_per_target must be >= 1, got {}",
            config.max_pages_per_target
        )));
    }

    if config.max_links_per_page < 1 {
        return Err(ConfigError::Validation(format!(
            "max_links_per_page must be >= 1, got {}",
            config.max_links_per_page
        )));
    }

    if config.retry_attempts > 5 {
        return Err(ConfigError::Validation(format!(
            "retry_attempts must be <= 5, got {}",
            config.retry_attempts
        )));
    }

    if config.checkpoint_every < 1 {
        return Err(ConfigError::Validation(
            "checkpoint_every must be >= 1".to_string(),
        ));
    }

    if config.run_timeout_seconds == Some(0) {
        return Err(ConfigError::Validation(
            "run_timeout_seconds must be > 0 when set".to_string(),
        ));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // Validate crawler name: non-empty, alphanumeric + hyphens only
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    if config.summary_path.is_empty() {
        return Err(ConfigError::Validation(
            "summary_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates denylist domain entries
fn validate_denylist_domains(domains: &[DomainEntry]) -> Result<(), ConfigError> {
    for entry in domains {
        validate_domain_pattern(&entry.domain)?;
    }
    Ok(())
}

/// Validates inline targets: non-empty seeds and unique explicit ids
fn validate_targets(targets: &[TargetEntry]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();

    for target in targets {
        if target.seed_url.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "Target '{}' has an empty seed-url",
                target.entity_id.as_deref().unwrap_or("<unnamed>")
            )));
        }

        if let Some(id) = &target.entity_id {
            if id.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "entity-id cannot be blank when set".to_string(),
                ));
            }
            if !seen.insert(id.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "Duplicate target entity-id '{}'",
                    id
                )));
            }
        }
    }

    Ok(())
}

/// Validates a domain pattern (supports wildcards)
fn validate_domain_pattern(pattern: &str) -> Result<(), ConfigError> {
    if pattern.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain pattern cannot be empty".to_string(),
        ));
    }

    if let Some(domain) = pattern.strip_prefix("*.") {
        validate_domain_string(domain)?;
    } else {
        validate_domain_string(pattern)?;
    }

    Ok(())
}

/// Validates a domain string (without wildcard prefix)
fn validate_domain_string(domain: &str) -> Result<(), ConfigError> {
    if domain.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain cannot be empty".to_string(),
        ));
    }

    if !domain
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' contains invalid characters",
            domain
        )));
    }

    if domain.starts_with('.')
        || domain.ends_with('.')
        || domain.starts_with('-')
        || domain.ends_with('-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' cannot start or end with '.' or '-'",
            domain
        )));
    }

    if domain.contains("..") {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' cannot contain consecutive dots",
            domain
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' must contain at least one dot (e.g., 'example.com')",
            domain
        )));
    }

    Ok(())
}

/// Basic email validation for the crawler contact address
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    let local = parts[0];
    let domain = parts[1];

    if local.is_empty() || domain.is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
