//! Item validation.
//!
//! Validators are opaque to the command engine: a save asks its validator for a
//! [`ValidationResult`] and aborts with [`DataError::Validation`] if any rule
//! failed. Rules are chained the same way for every item type; the batch
//! engine adds one cross-item rule, [`validate_partition_keys`].

mod rules;

pub use rules::{CompositeValidator, RuleValidator, validate_partition_keys};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::core::{DataError, Result};
use crate::item::Item;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationFailure {
    pub property_name: String,
    pub error_message: String,
}

impl ValidationFailure {
    pub fn new(property_name: impl Into<String>, error_message: impl Into<String>) -> Self {
        Self {
            property_name: property_name.into(),
            error_message: error_message.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    failures: Vec<ValidationFailure>,
}

impl ValidationResult {
    pub fn valid() -> Self {
        Self::default()
    }

    pub fn from_failures(failures: Vec<ValidationFailure>) -> Self {
        Self { failures }
    }

    pub fn is_valid(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failures(&self) -> &[ValidationFailure] {
        &self.failures
    }

    pub fn push(&mut self, failure: ValidationFailure) {
        self.failures.push(failure);
    }

    pub fn merge(mut self, other: ValidationResult) -> Self {
        self.failures.extend(other.failures);
        self
    }

    /// Converts a failed result into a [`DataError::Validation`].
    pub fn into_result(self) -> Result<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(DataError::Validation(self.failures))
        }
    }
}

/// Aggregates several results into one error carrying every failure.
pub fn validate_all(results: &[ValidationResult]) -> Result<()> {
    let failures: Vec<ValidationFailure> = results
        .iter()
        .flat_map(|result| result.failures().iter().cloned())
        .collect();

    if failures.is_empty() {
        Ok(())
    } else {
        Err(DataError::Validation(failures))
    }
}

/// Business-rule validation of one item.
#[async_trait]
pub trait ItemValidator<T: Item>: Send + Sync {
    async fn validate(&self, item: &T, token: &CancellationToken) -> Result<ValidationResult>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_result() {
        assert!(ValidationResult::valid().into_result().is_ok());

        let failed = ValidationResult::from_failures(vec![ValidationFailure::new("id", "empty")]);
        let err = failed.into_result().unwrap_err();
        assert_eq!(err.validation_failures().unwrap().len(), 1);
    }

    #[test]
    fn test_validate_all_collects_every_failure() {
        let results = vec![
            ValidationResult::valid(),
            ValidationResult::from_failures(vec![ValidationFailure::new("id", "empty")]),
            ValidationResult::from_failures(vec![ValidationFailure::new("partitionKey", "empty")]),
        ];

        let err = validate_all(&results).unwrap_err();
        let failures = err.validation_failures().unwrap();
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[1].property_name, "partitionKey");
    }
}
