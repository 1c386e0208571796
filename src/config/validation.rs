use super::models::Config;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("excessive_multiplier must be a positive number, got {0}")]
    InvalidExcessiveMultiplier(f64),

    #[error("gap_threshold must be within (0, 1], got {0}")]
    InvalidGapThreshold(f64),

    #[error("Application variant '{0}' is not defined in [stores.variants]")]
    UnknownVariant(String),

    #[error("Invalid store name '{name}' in {section}: only [A-Za-z0-9_-] is allowed")]
    InvalidStoreName { section: String, name: String },

    #[error("Database directory name for {field} must not be empty")]
    EmptyDatabaseName { field: String },

    #[error("No pruning track selected (enable application and/or history)")]
    NoTracksSelected,
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_thresholds(config)?;
    validate_stores(config)?;
    validate_storage(config)?;
    Ok(())
}

/// `prune` needs at least one track on top of a valid configuration
pub fn validate_tracks(config: &Config) -> Result<(), ValidationError> {
    if !config.tracks.application && !config.tracks.history {
        return Err(ValidationError::NoTracksSelected);
    }
    Ok(())
}

fn validate_thresholds(config: &Config) -> Result<(), ValidationError> {
    let multiplier = config.pruning.excessive_multiplier;
    if !multiplier.is_finite() || multiplier <= 0.0 {
        return Err(ValidationError::InvalidExcessiveMultiplier(multiplier));
    }

    let threshold = config.pruning.gap_threshold;
    if !(threshold > 0.0 && threshold <= 1.0) {
        return Err(ValidationError::InvalidGapThreshold(threshold));
    }

    Ok(())
}

/// Store names end up in partition names, so restrict their alphabet
fn validate_stores(config: &Config) -> Result<(), ValidationError> {
    let stores = &config.stores;

    if let Some(app) = &stores.app {
        if !stores.variants.contains_key(app) {
            return Err(ValidationError::UnknownVariant(app.clone()));
        }
    }

    let sections = [
        ("stores.core".to_string(), &stores.core),
        ("stores.opaque".to_string(), &stores.opaque),
    ]
    .into_iter()
    .chain(
        stores
            .variants
            .iter()
            .map(|(variant, names)| (format!("stores.variants.{}", variant), names)),
    );

    for (section, names) in sections {
        if let Some(name) = names.iter().find(|name| !is_valid_store_name(name)) {
            return Err(ValidationError::InvalidStoreName {
                section,
                name: name.clone(),
            });
        }
    }

    Ok(())
}

fn validate_storage(config: &Config) -> Result<(), ValidationError> {
    let storage = &config.storage;
    for (field, value) in [
        ("application_db", &storage.application_db),
        ("blockstore_db", &storage.blockstore_db),
        ("state_db", &storage.state_db),
    ] {
        if value.trim().is_empty() {
            return Err(ValidationError::EmptyDatabaseName {
                field: field.to_string(),
            });
        }
    }
    Ok(())
}

fn is_valid_store_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_config() {
        let config = Config::default();
        assert!(validate(&config).is_ok());
        assert!(validate_tracks(&config).is_ok());
    }

    #[test]
    fn test_zero_multiplier() {
        let mut config = Config::default();
        config.pruning.excessive_multiplier = 0.0;

        let result = validate(&config);
        assert!(matches!(result, Err(ValidationError::InvalidExcessiveMultiplier(_))));
    }

    #[test]
    fn test_gap_threshold_out_of_range() {
        let mut config = Config::default();
        config.pruning.gap_threshold = 1.2;
        assert!(matches!(validate(&config), Err(ValidationError::InvalidGapThreshold(_))));

        config.pruning.gap_threshold = f64::NAN;
        assert!(matches!(validate(&config), Err(ValidationError::InvalidGapThreshold(_))));
    }

    #[test]
    fn test_unknown_variant() {
        let mut config = Config::default();
        config.stores.app = Some("juno".to_string());

        let result = validate(&config);
        assert!(matches!(result, Err(ValidationError::UnknownVariant(ref app)) if app == "juno"));
    }

    #[test]
    fn test_invalid_store_name() {
        let mut config = Config::default();
        config.stores.core.push("bad/name".to_string());

        let result = validate(&config);
        assert!(matches!(
            result,
            Err(ValidationError::InvalidStoreName { ref section, .. }) if section == "stores.core"
        ));
    }

    #[test]
    fn test_invalid_variant_store_name() {
        let mut config = Config::default();
        config
            .stores
            .variants
            .insert("custom".to_string(), vec!["".to_string()]);

        assert!(matches!(
            validate(&config),
            Err(ValidationError::InvalidStoreName { .. })
        ));
    }

    #[test]
    fn test_empty_database_name() {
        let mut config = Config::default();
        config.storage.state_db = " ".to_string();

        assert!(matches!(
            validate(&config),
            Err(ValidationError::EmptyDatabaseName { .. })
        ));
    }

    #[test]
    fn test_no_tracks() {
        let mut config = Config::default();
        config.tracks.application = false;
        config.tracks.history = false;

        assert!(matches!(
            validate_tracks(&config),
            Err(ValidationError::NoTracksSelected)
        ));
    }
}
