use super::QmConfig;
use crate::core::batch::descriptor::pattern_to_regex;
use crate::core::error::QmError;

pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate configuration rules
    pub fn validate(config: &QmConfig) -> Result<(), QmError> {
        for (field, value) in [
            ("svn.program", &config.svn.program),
            ("solver.program", &config.solver.program),
            ("solver.entry_point", &config.solver.entry_point),
            ("extraction.symbol", &config.extraction.symbol),
            ("extraction.dump_program", &config.extraction.dump_program),
            ("extraction.artifact_prefix", &config.extraction.artifact_prefix),
            ("paths.temp_subdir", &config.paths.temp_subdir),
        ] {
            if value.trim().is_empty() {
                return Err(invalid(format!("{} cannot be empty", field)));
            }
        }

        for (field, value) in [
            ("svn.timeout", config.svn.timeout.as_deref()),
            ("solver.timeout", config.solver.timeout.as_deref()),
            ("store.timeout", Some(config.store.timeout.as_str())),
            ("notification.timeout", Some(config.notification.timeout.as_str())),
        ] {
            if let Some(raw) = value {
                humantime::parse_duration(raw.trim())
                    .map_err(|e| invalid(format!("{} '{}' is not a duration: {}", field, raw, e)))?;
            }
        }

        pattern_to_regex(&config.paths.batch_pattern)?;
        for name in &config.paths.excluded_batches {
            if name.contains('/') || name.contains('\\') {
                return Err(invalid(format!(
                    "paths.excluded_batches entry '{}' must be a plain file name",
                    name
                )));
            }
        }

        let store_url = url::Url::parse(&config.store.url)
            .map_err(|e| invalid(format!("store.url '{}': {}", config.store.url, e)))?;
        if !matches!(store_url.scheme(), "http" | "https") {
            return Err(invalid("store.url must use http or https"));
        }

        if config.notification.enabled {
            Self::validate_notification(config)?;
        }

        Ok(())
    }

    fn validate_notification(config: &QmConfig) -> Result<(), QmError> {
        let notification = &config.notification;
        if notification.smtp_host.trim().is_empty() {
            return Err(invalid("notification.smtp_host cannot be empty"));
        }
        if notification.authors.is_empty() {
            return Err(invalid(
                "notification.authors is empty; copy the [[notification.authors]] table \
                 from qm.toml.example into qm.toml or pass --no-notify",
            ));
        }
        if !notification
            .authors
            .iter()
            .any(|author| author.id == notification.fallback_author)
        {
            return Err(invalid(format!(
                "notification.fallback_author '{}' must be listed in notification.authors",
                notification.fallback_author
            )));
        }
        for author in &notification.authors {
            author.email.parse::<lettre::Address>().map_err(|e| {
                invalid(format!(
                    "notification.authors '{}' has invalid email '{}': {}",
                    author.id, author.email, e
                ))
            })?;
        }
        Ok(())
    }
}

fn invalid<T: Into<String>>(message: T) -> QmError {
    QmError::Config(message.into())
}
