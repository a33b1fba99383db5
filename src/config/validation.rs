//! Configuration validation module

use crate::config::{DatabaseConfig, ObjectStoreConfig, ReportConfig};

/// Trait for validating configuration sections
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

/// Configuration validation error
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Database configuration error: {message}")]
    Database { message: String },

    #[error("Object store configuration error: {message}")]
    ObjectStore { message: String },

    #[error("Report configuration error: {message}")]
    Report { message: String },

    #[error("HTTP configuration error: {message}")]
    Http { message: String },
}

impl ValidationError {
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }

    pub fn object_store(message: impl Into<String>) -> Self {
        Self::ObjectStore {
            message: message.into(),
        }
    }

    pub fn report(message: impl Into<String>) -> Self {
        Self::Report {
            message: message.into(),
        }
    }

    pub fn http(message: impl Into<String>) -> Self {
        Self::Http {
            message: message.into(),
        }
    }
}

impl Validate for DatabaseConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.url.is_empty() {
            return Err(ValidationError::database("Database URL cannot be empty"));
        }
        if !self.url.starts_with("postgres://") && !self.url.starts_with("postgresql://") {
            return Err(ValidationError::database(
                "Database URL must start with postgres:// or postgresql://",
            ));
        }
        if self.max_connections == 0 {
            return Err(ValidationError::database(
                "Max connections must be greater than 0",
            ));
        }
        Ok(())
    }
}

impl Validate for ObjectStoreConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.report_bucket.is_empty() {
            return Err(ValidationError::object_store(
                "Report bucket cannot be empty",
            ));
        }
        if self.deployment_prefix.is_empty() {
            return Err(ValidationError::object_store(
                "Deployment prefix cannot be empty",
            ));
        }
        if self.region.is_empty() {
            return Err(ValidationError::object_store("Region cannot be empty"));
        }
        Ok(())
    }
}

impl Validate for ReportConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.top_n == 0 {
            return Err(ValidationError::report("top_n must be greater than 0"));
        }
        if self.workers.is_empty() {
            return Err(ValidationError::report(
                "At least one worker type must be configured",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_url_scheme_is_checked() {
        let config = DatabaseConfig {
            url: "mysql://nope".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_deployment_prefix_rejected() {
        let config = ObjectStoreConfig {
            deployment_prefix: String::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
