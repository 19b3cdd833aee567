//! Parsing of `Name[option=value,...]` config values.

use std::collections::HashMap;

use crate::error::ConfigError;

/// Splits config value string into name and options string.
/// Example: `PeRebalancer[threshold=0.8]` is split into `PeRebalancer` and `threshold=0.8`.
pub fn parse_config_value(config_str: &str) -> (String, Option<String>) {
    match config_str.trim().split_once('[') {
        Some((name, rest)) => (name.trim().to_string(), Some(rest.trim_end_matches(']').to_string())),
        None => (config_str.trim().to_string(), None),
    }
}

/// Parses options string into a map of option names and values.
///
/// Empty entries are skipped, an entry without `=` is reported as [`ConfigError::BadOption`].
pub fn parse_options(options_str: &str) -> Result<HashMap<String, String>, ConfigError> {
    let mut options = HashMap::new();
    for option_str in options_str.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (name, value) = option_str.split_once('=').ok_or_else(|| ConfigError::BadOption {
            option: option_str.to_string(),
            config: options_str.to_string(),
        })?;
        options.insert(name.trim().to_string(), value.trim().to_string());
    }
    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_name_and_options() {
        assert_eq!(
            parse_config_value("PeRebalancer[threshold=0.7]"),
            ("PeRebalancer".to_string(), Some("threshold=0.7".to_string()))
        );
        assert_eq!(parse_config_value("NoOptimization"), ("NoOptimization".to_string(), None));
    }

    #[test]
    fn parses_options() {
        let options = parse_options("threshold=0.8, mode = strict").unwrap();
        assert_eq!(options.get("threshold").unwrap(), "0.8");
        assert_eq!(options.get("mode").unwrap(), "strict");
        assert_eq!(options.get("other"), None);
        assert!(parse_options("").unwrap().is_empty());
        assert!(matches!(parse_options("threshold"), Err(ConfigError::BadOption { .. })));
    }
}
