use super::{types::Config, ConfigError};
use crate::wanted::MediaKind;

/// Validate configuration
/// Currently validates:
/// - match_ratio is within 0..=100
/// - size bounds are non-negative and ordered when both are set
/// - configured download clients have a URL
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if !(0..=100).contains(&config.matching.match_ratio) {
        return Err(ConfigError::ValidationError(format!(
            "matching.match_ratio must be between 0 and 100, got {}",
            config.matching.match_ratio
        )));
    }

    for kind in MediaKind::ALL {
        let policy = config.policies.for_kind(kind);
        if policy.min_size_mb < 0.0 || policy.max_size_mb < 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "policies.{}: size limits cannot be negative",
                kind.label().to_lowercase()
            )));
        }
        if policy.max_size_mb > 0.0 && policy.min_size_mb > policy.max_size_mb {
            return Err(ConfigError::ValidationError(format!(
                "policies.{}: min_size_mb ({}) exceeds max_size_mb ({})",
                kind.label().to_lowercase(),
                policy.min_size_mb,
                policy.max_size_mb
            )));
        }
    }

    let clients = &config.download_clients;
    if clients.qbittorrent.as_ref().is_some_and(|q| q.url.trim().is_empty()) {
        return Err(ConfigError::ValidationError(
            "download_clients.qbittorrent.url cannot be empty".to_string(),
        ));
    }
    if clients.sabnzbd.as_ref().is_some_and(|s| s.url.trim().is_empty()) {
        return Err(ConfigError::ValidationError(
            "download_clients.sabnzbd.url cannot be empty".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{QBittorrentConfig, SabnzbdConfig};

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_match_ratio_out_of_range() {
        let mut config = Config::default();
        config.matching.match_ratio = 101;
        let result = validate_config(&config);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));

        config.matching.match_ratio = -1;
        assert!(validate_config(&config).is_err());

        config.matching.match_ratio = 0;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_min_above_max_fails() {
        let mut config = Config::default();
        config.policies.ebook.min_size_mb = 20.0;
        config.policies.ebook.max_size_mb = 10.0;
        assert!(validate_config(&config).is_err());

        // Unbounded max never conflicts
        config.policies.ebook.max_size_mb = 0.0;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_negative_size_fails() {
        let mut config = Config::default();
        config.policies.comic.min_size_mb = -1.0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_empty_client_url_fails() {
        let mut config = Config::default();
        config.download_clients.qbittorrent = Some(QBittorrentConfig {
            url: " ".to_string(),
            username: String::new(),
            password: String::new(),
            save_path: None,
            timeout_secs: 30,
        });
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.download_clients.sabnzbd = Some(SabnzbdConfig {
            url: String::new(),
            api_key: "k".to_string(),
            category: None,
            timeout_secs: 30,
        });
        assert!(validate_config(&config).is_err());
    }
}
