use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{ItemValidator, ValidationFailure, ValidationResult};
use crate::core::{DataError, Result};
use crate::item::Item;

type RuleCheck<T> = Box<dyn Fn(&T) -> bool + Send + Sync>;

struct Rule<T> {
    property_name: String,
    error_message: String,
    check: RuleCheck<T>,
}

/// Synchronous rule chain: every rule runs, every failing rule is reported.
pub struct RuleValidator<T> {
    rules: Vec<Rule<T>>,
}

impl<T: Item> RuleValidator<T> {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Non-empty id and partition key, and the type name of `T`.
    pub fn base_item() -> Self {
        Self::new()
            .rule("id", "'id' must not be empty", |item: &T| {
                !item.base().id.trim().is_empty()
            })
            .rule(
                "partitionKey",
                "'partitionKey' must not be empty",
                |item: &T| !item.base().partition_key.trim().is_empty(),
            )
            .rule(
                "typeName",
                format!("'typeName' must be '{}'", T::TYPE_NAME),
                |item: &T| item.base().type_name == T::TYPE_NAME,
            )
    }

    /// Adds a rule that fails when `check` returns false.
    pub fn rule(
        mut self,
        property_name: impl Into<String>,
        error_message: impl Into<String>,
        check: impl Fn(&T) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.rules.push(Rule {
            property_name: property_name.into(),
            error_message: error_message.into(),
            check: Box::new(check),
        });
        self
    }

    pub fn check(&self, item: &T) -> ValidationResult {
        let failures = self
            .rules
            .iter()
            .filter(|rule| !(rule.check)(item))
            .map(|rule| ValidationFailure::new(&rule.property_name, &rule.error_message))
            .collect();
        ValidationResult::from_failures(failures)
    }
}

impl<T: Item> Default for RuleValidator<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Item> ItemValidator<T> for RuleValidator<T> {
    async fn validate(&self, item: &T, token: &CancellationToken) -> Result<ValidationResult> {
        if token.is_cancelled() {
            return Err(DataError::Cancelled);
        }
        Ok(self.check(item))
    }
}

/// Runs several validators in order and merges their failures.
pub struct CompositeValidator<T: Item> {
    validators: Vec<Arc<dyn ItemValidator<T>>>,
}

impl<T: Item> CompositeValidator<T> {
    pub fn new() -> Self {
        Self {
            validators: Vec::new(),
        }
    }

    pub fn with(mut self, validator: Arc<dyn ItemValidator<T>>) -> Self {
        self.validators.push(validator);
        self
    }
}

impl<T: Item> Default for CompositeValidator<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Item> ItemValidator<T> for CompositeValidator<T> {
    async fn validate(&self, item: &T, token: &CancellationToken) -> Result<ValidationResult> {
        let mut result = ValidationResult::valid();
        for validator in &self.validators {
            if token.is_cancelled() {
                return Err(DataError::Cancelled);
            }
            result = result.merge(validator.validate(item, token).await?);
        }
        Ok(result)
    }
}

/// Every item in a batch must share one partition key.
///
/// Returns a failure naming each distinct key, in first-seen order, when more
/// than one is present.
pub fn validate_partition_keys(partition_keys: &[String]) -> Option<ValidationFailure> {
    let mut distinct: Vec<&str> = Vec::new();
    for key in partition_keys {
        if !distinct.contains(&key.as_str()) {
            distinct.push(key);
        }
    }

    if distinct.len() <= 1 {
        return None;
    }

    let listed = distinct
        .iter()
        .map(|key| format!("'{}'", key))
        .collect::<Vec<_>>()
        .join(", ");
    Some(ValidationFailure::new(
        "partitionKey",
        format!("The partition keys {} are not all equal", listed),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestItem;

    #[tokio::test]
    async fn test_base_item_rules() {
        let validator = RuleValidator::<TestItem>::base_item();
        let token = CancellationToken::new();

        let valid = TestItem::new("id-1", "pk-1");
        assert!(validator.validate(&valid, &token).await.unwrap().is_valid());

        let mut invalid = TestItem::new("", " ");
        invalid.base.type_name = "other".into();
        let result = validator.validate(&invalid, &token).await.unwrap();
        let properties: Vec<_> = result
            .failures()
            .iter()
            .map(|failure| failure.property_name.as_str())
            .collect();
        assert_eq!(properties, vec!["id", "partitionKey", "typeName"]);
    }

    #[tokio::test]
    async fn test_composite_merges_in_order() {
        let first = RuleValidator::<TestItem>::new().rule("publicMessage", "required", |item| {
            !item.public_message.is_empty()
        });
        let second = RuleValidator::<TestItem>::new().rule("privateMessage", "required", |item| {
            !item.private_message.is_empty()
        });
        let composite = CompositeValidator::new()
            .with(Arc::new(first))
            .with(Arc::new(second));

        let result = composite
            .validate(&TestItem::new("id", "pk"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.failures().len(), 2);
        assert_eq!(result.failures()[0].property_name, "publicMessage");
    }

    #[tokio::test]
    async fn test_cancelled_validation() {
        let token = CancellationToken::new();
        token.cancel();
        let err = RuleValidator::<TestItem>::base_item()
            .validate(&TestItem::new("id", "pk"), &token)
            .await
            .unwrap_err();
        assert!(matches!(err, DataError::Cancelled));
    }

    #[test]
    fn test_partition_keys() {
        assert!(validate_partition_keys(&[]).is_none());
        assert!(validate_partition_keys(&["a".into(), "a".into()]).is_none());

        let failure = validate_partition_keys(&["a".into(), "b".into(), "a".into()]).unwrap();
        assert_eq!(failure.property_name, "partitionKey");
        assert!(failure.error_message.contains("'a'"));
        assert!(failure.error_message.contains("'b'"));
    }
}
