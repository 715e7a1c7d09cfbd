use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Load configuration from file with `BOOKHOUND_` environment overrides.
///
/// Nested keys are separated by a double underscore, so
/// `BOOKHOUND_MATCHING__MATCH_RATIO=70` sets `matching.match_ratio`.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let config: Config = Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed("BOOKHOUND_").split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    Ok(config)
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wanted::MediaKind;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_from_str_valid() {
        let toml = r#"
[matching]
match_ratio = 70

[search]
rate_limit_ms = 0
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.matching.match_ratio, 70);
        assert_eq!(config.search.rate_limit_ms, 0);
    }

    #[test]
    fn test_load_config_from_str_wrong_type() {
        let toml = r#"
[matching]
match_ratio = "high"
"#;
        let result = load_config_from_str(toml);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/bookhound.toml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[database]
path = "/var/lib/bookhound/ledger.db"
claim_timeout_secs = 600

[policies.audiobook]
min_size_mb = 10
banned_words = ["abridged"]
"#
        )
        .unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(
            config.database.path.to_string_lossy(),
            "/var/lib/bookhound/ledger.db"
        );
        assert_eq!(config.database.claim_timeout_secs, 600);
        let audio = config.policies.for_kind(MediaKind::AudioBook);
        assert_eq!(audio.min_size_mb, 10.0);
        assert_eq!(audio.banned_words, vec!["abridged"]);
    }
}
