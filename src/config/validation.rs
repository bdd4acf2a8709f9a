use crate::config::types::{ClientConfig, Config, CrawlerConfig, ForumConfig, OutputConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_client_config(&config.client)?;
    validate_crawler_config(&config.crawler)?;
    validate_output_config(&config.output)?;
    validate_forum_config(&config.forum)?;
    Ok(())
}

fn validate_client_config(config: &ClientConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    if config.timeout_secs == 0 || config.timeout_secs > 600 {
        return Err(ConfigError::Validation(format!(
            "timeout_secs must be between 1 and 600, got {}",
            config.timeout_secs
        )));
    }

    if config.connect_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "connect_timeout_secs must be >= 1".to_string(),
        ));
    }

    if let Some(cookie) = &config.cookie {
        if cookie.contains(['\r', '\n']) {
            return Err(ConfigError::Validation(
                "cookie must be a single header line".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_interstitial_depth < 1 || config.max_interstitial_depth > 10 {
        return Err(ConfigError::Validation(format!(
            "max_interstitial_depth must be between 1 and 10, got {}",
            config.max_interstitial_depth
        )));
    }

    if config.retry_attempts > 5 {
        return Err(ConfigError::Validation(format!(
            "retry_attempts must be <= 5, got {}",
            config.retry_attempts
        )));
    }

    if config.chunk_size < 512 {
        return Err(ConfigError::Validation(format!(
            "chunk_size must be >= 512 bytes, got {}",
            config.chunk_size
        )));
    }

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.save_root.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "save_root cannot be empty".to_string(),
        ));
    }

    if config.ledger_file.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "ledger_file cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_forum_config(config: &ForumConfig) -> Result<(), ConfigError> {
    if let Some(start_url) = &config.start_url {
        validate_listing_url(start_url)?;
    }
    Ok(())
}

/// Checks that a listing URL is an absolute HTTP(S) URL
pub fn validate_listing_url(raw: &str) -> Result<(), ConfigError> {
    let url = Url::parse(raw)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid listing URL '{}': {}", raw, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "Listing URL '{}' must use HTTP or HTTPS",
            raw
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_listing_url() {
        assert!(validate_listing_url("https://forum.example.com/forums/ecu.12/").is_ok());
        assert!(validate_listing_url("http://127.0.0.1:8080/forums/").is_ok());

        assert!(validate_listing_url("").is_err());
        assert!(validate_listing_url("/forums/ecu.12/").is_err());
        assert!(validate_listing_url("ftp://forum.example.com/").is_err());
    }

    #[test]
    fn test_crawler_bounds() {
        let mut crawler = CrawlerConfig::default();
        assert!(validate_crawler_config(&crawler).is_ok());

        crawler.max_interstitial_depth = 0;
        assert!(validate_crawler_config(&crawler).is_err());

        crawler.max_interstitial_depth = 3;
        crawler.chunk_size = 64;
        assert!(validate_crawler_config(&crawler).is_err());
    }

    #[test]
    fn test_cookie_must_be_single_line() {
        let client = ClientConfig {
            cookie: Some("xf_user=1\r\nX-Evil: 1".to_string()),
            ..ClientConfig::default()
        };
        assert!(validate_client_config(&client).is_err());
    }
}
