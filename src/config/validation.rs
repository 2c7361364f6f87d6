//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Compile ignore patterns so bad regexes fail at load time
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AgentConfig → Result<(), Vec<ValidationError>>

use regex::Regex;
use thiserror::Error;

use crate::config::schema::AgentConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("service_name must not be empty")]
    EmptyServiceName,

    #[error("ignore_url_patterns[{index}] is not a valid regex: {message}")]
    InvalidPattern { index: usize, message: String },

    #[error("trace_headers[{index}] must not be empty")]
    EmptyTraceHeader { index: usize },
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &AgentConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.service_name.trim().is_empty() {
        errors.push(ValidationError::EmptyServiceName);
    }

    if let Err(mut pattern_errors) = compile_patterns(&config.ignore_url_patterns) {
        errors.append(&mut pattern_errors);
    }

    for (index, name) in config.trace_headers.iter().enumerate() {
        if name.trim().is_empty() {
            errors.push(ValidationError::EmptyTraceHeader { index });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Compile ignore patterns, preserving configured order.
pub fn compile_patterns(patterns: &[String]) -> Result<Vec<Regex>, Vec<ValidationError>> {
    let mut compiled = Vec::with_capacity(patterns.len());
    let mut errors = Vec::new();

    for (index, pattern) in patterns.iter().enumerate() {
        match Regex::new(pattern) {
            Ok(re) => compiled.push(re),
            Err(e) => errors.push(ValidationError::InvalidPattern {
                index,
                message: e.to_string(),
            }),
        }
    }

    if errors.is_empty() {
        Ok(compiled)
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&AgentConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let config = AgentConfig {
            service_name: " ".into(),
            ignore_url_patterns: vec!["^/ok".into(), "(".into()],
            trace_headers: vec!["".into()],
            ..AgentConfig::default()
        };

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert_eq!(errors[0], ValidationError::EmptyServiceName);
        assert!(matches!(errors[1], ValidationError::InvalidPattern { index: 1, .. }));
        assert_eq!(errors[2], ValidationError::EmptyTraceHeader { index: 0 });
    }

    #[test]
    fn test_compile_preserves_order() {
        let compiled = compile_patterns(&["^/a".into(), "^/b".into()]).unwrap();
        assert_eq!(compiled[0].as_str(), "^/a");
        assert_eq!(compiled[1].as_str(), "^/b");
    }
}
