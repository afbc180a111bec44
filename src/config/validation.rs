use crate::config::types::{
    BlobConfig, BlobKind, Config, CrawlerConfig, FilterConfig, ForumConfig, UserAgentConfig,
};
use crate::ConfigError;
use regex::Regex;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_filter_config(&config.filter)?;
    validate_blob_config(&config.blob)?;

    if config.storage.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    if let Some(forum) = &config.forum {
        validate_forum_config(forum)?;
    }

    Url::parse(&config.archive.endpoint).map_err(|e| {
        ConfigError::InvalidUrl(format!(
            "Invalid archive endpoint '{}': {}",
            config.archive.endpoint, e
        ))
    })?;

    if config.archive.page_size == 0 {
        return Err(ConfigError::Validation(
            "archive page-size must be greater than 0".to_string(),
        ));
    }

    validate_seeds(&config.seeds, config.forum_scheme())?;

    for pattern in &config.blacklist {
        validate_pattern(pattern)?;
    }

    for host in &config.hosts {
        if host.name.is_empty() || host.name.contains('/') {
            return Err(ConfigError::Validation(format!(
                "host name must be a bare host, got '{}'",
                host.name
            )));
        }
        for pattern in &host.whitelist {
            validate_pattern(pattern)?;
        }
    }

    for score in &config.scores {
        for pattern in &score.patterns {
            validate_pattern(pattern)?;
        }
    }

    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.batch_size < 1 {
        return Err(ConfigError::Validation(format!(
            "batch_size must be >= 1, got {}",
            config.batch_size
        )));
    }

    if config.max_body_bytes < 1024 {
        return Err(ConfigError::Validation(format!(
            "max_body_bytes must be >= 1024, got {}",
            config.max_body_bytes
        )));
    }

    if config.request_timeout_secs < 1 || config.connect_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "request and connect timeouts must be >= 1s".to_string(),
        ));
    }

    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "max_attempts must be >= 1, got {}",
            config.max_attempts
        )));
    }

    if config.insert_chunk < 1 {
        return Err(ConfigError::Validation(format!(
            "insert_chunk must be >= 1, got {}",
            config.insert_chunk
        )));
    }

    if config.stats_interval_secs < 1 {
        return Err(ConfigError::Validation(
            "stats_interval_secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
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

    validate_email(&config.contact_email)
}

fn validate_filter_config(config: &FilterConfig) -> Result<(), ConfigError> {
    if config.capacity < 1 {
        return Err(ConfigError::Validation(
            "filter capacity must be >= 1".to_string(),
        ));
    }

    if !(config.false_positive_rate > 0.0 && config.false_positive_rate < 1.0) {
        return Err(ConfigError::Validation(format!(
            "false_positive_rate must be in (0, 1), got {}",
            config.false_positive_rate
        )));
    }

    Ok(())
}

fn validate_blob_config(config: &BlobConfig) -> Result<(), ConfigError> {
    match config.kind {
        BlobKind::Local => {
            if config.directory.as_deref().unwrap_or("").is_empty() {
                return Err(ConfigError::Validation(
                    "local blob store requires a directory".to_string(),
                ));
            }
        }
        BlobKind::Http => {
            let upload = config.upload_url.as_deref().ok_or_else(|| {
                ConfigError::Validation("http blob store requires upload-url".to_string())
            })?;
            Url::parse(upload)
                .map_err(|e| ConfigError::InvalidUrl(format!("Invalid upload-url: {}", e)))?;
        }
    }

    if let Some(public) = &config.public_base_url {
        Url::parse(public)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid public-base-url: {}", e)))?;
    }

    Ok(())
}

fn validate_forum_config(config: &ForumConfig) -> Result<(), ConfigError> {
    if config.scheme.is_empty() || matches!(config.scheme.as_str(), "http" | "https") {
        return Err(ConfigError::Validation(format!(
            "forum scheme must be a non-web scheme, got '{}'",
            config.scheme
        )));
    }

    Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid forum base-url: {}", e)))?;

    if config.token.is_none() && config.token_env.is_none() {
        return Err(ConfigError::Validation(
            "forum requires either token or token-env".to_string(),
        ));
    }

    Ok(())
}

fn validate_seeds(seeds: &[String], forum_scheme: &str) -> Result<(), ConfigError> {
    for seed in seeds {
        let url = Url::parse(seed)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed, e)))?;

        let scheme = url.scheme();
        if scheme != "http" && scheme != "https" && scheme != forum_scheme {
            return Err(ConfigError::Validation(format!(
                "Seed URL '{}' has unsupported scheme '{}'",
                seed, scheme
            )));
        }
    }

    Ok(())
}

fn validate_pattern(pattern: &str) -> Result<(), ConfigError> {
    Regex::new(pattern).map_err(|e| ConfigError::InvalidPattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })?;
    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    let (local, domain) = email.split_once('@').ok_or_else(|| {
        ConfigError::Validation(format!("Invalid email format: '{}'", email))
    })?;

    if local.is_empty() || domain.is_empty() || domain.contains('@') {
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
