use crate::config::types::{
    Config, CrawlerConfig, SearchConfig, ServerConfig, StoreBackend, StoreConfig, UserAgentConfig,
};
use crate::url::matches_wildcard;
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_store_config(&config.store)?;
    validate_server_config(&config.server)?;
    validate_search_config(&config.search)?;
    Ok(())
}

/// Validates crawl source configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    let seed = Url::parse(&config.seed_url).map_err(|e| {
        ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", config.seed_url, e))
    })?;

    if seed.scheme() != "http" && seed.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "Seed URL '{}' must use HTTP or HTTPS",
            config.seed_url
        )));
    }

    if config.allowed_domains.is_empty() {
        return Err(ConfigError::Validation(
            "allowed_domains must list at least one domain".to_string(),
        ));
    }

    for pattern in &config.allowed_domains {
        validate_domain_pattern(pattern)?;
    }

    let host = seed
        .host_str()
        .map(str::to_lowercase)
        .ok_or_else(|| ConfigError::InvalidUrl(format!("Seed URL '{}' has no host", seed)))?;

    if !config
        .allowed_domains
        .iter()
        .any(|pattern| matches_wildcard(pattern, &host))
    {
        return Err(ConfigError::Validation(format!(
            "Seed host '{}' is not covered by allowed_domains",
            host
        )));
    }

    if config.artifact_path.is_empty() {
        return Err(ConfigError::Validation(
            "artifact_path cannot be empty".to_string(),
        ));
    }

    if config.request_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "request_timeout_secs must be >= 1".to_string(),
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

    // Validate contact URL
    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates the fields required by the selected backend
fn validate_store_config(config: &StoreConfig) -> Result<(), ConfigError> {
    match config.backend {
        StoreBackend::Sqlite => {
            if config.database_path.is_empty() {
                return Err(ConfigError::Validation(
                    "database_path cannot be empty for the sqlite backend".to_string(),
                ));
            }
        }
        StoreBackend::Meilisearch => {
            Url::parse(&config.meili_url)
                .map_err(|e| ConfigError::InvalidUrl(format!("Invalid meili_url: {}", e)))?;

            if config.meili_index.is_empty() {
                return Err(ConfigError::Validation(
                    "meili_index cannot be empty".to_string(),
                ));
            }
        }
    }

    Ok(())
}

fn validate_server_config(config: &ServerConfig) -> Result<(), ConfigError> {
    config.socket_addr().map_err(|e| {
        ConfigError::Validation(format!(
            "Invalid bind_address '{}': {}",
            config.bind_address, e
        ))
    })?;
    Ok(())
}

fn validate_search_config(config: &SearchConfig) -> Result<(), ConfigError> {
    if config.highlight_pre_tag.is_empty() || config.highlight_post_tag.is_empty() {
        return Err(ConfigError::Validation(
            "highlight tags cannot be empty".to_string(),
        ));
    }

    if config.suggestion_limit < 1 {
        return Err(ConfigError::Validation(
            "suggestion_limit must be >= 1".to_string(),
        ));
    }

    if config.progress_buffer < 1 {
        return Err(ConfigError::Validation(
            "progress_buffer must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Checks an allow-list entry: a host name, optionally behind a `*.` wildcard
fn validate_domain_pattern(pattern: &str) -> Result<(), ConfigError> {
    let host = pattern.strip_prefix("*.").unwrap_or(pattern);

    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() < 2 {
        return Err(ConfigError::InvalidPattern(format!(
            "'{}' needs at least two labels, e.g. 'caadf.org.br'",
            pattern
        )));
    }

    let bad_label = labels.iter().find(|label| {
        label.is_empty()
            || label.starts_with('-')
            || label.ends_with('-')
            || !label.chars().all(|c| c.is_alphanumeric() || c == '-')
    });
    if let Some(label) = bad_label {
        return Err(ConfigError::InvalidPattern(format!(
            "'{}' has an invalid label '{}'",
            pattern, label
        )));
    }

    Ok(())
}

/// Accepts `local@domain.tld`
fn validate_email(email: &str) -> Result<(), ConfigError> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    };

    if valid {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!(
            "contact_email '{}' is not a valid address",
            email
        )))
    }
}
