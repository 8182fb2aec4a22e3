use std::fmt;
use std::str::FromStr;

use crate::command::EVENT_TYPE_NAME;
use crate::core::{DataError, Result};

/// What a save records in its event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EventPolicy {
    /// No event is written.
    Disabled,
    /// An event without property changes.
    NoChanges,
    /// Changes of tracked fields only.
    #[default]
    DecoratedChanges,
    /// Changes of every domain field.
    AllChanges,
}

impl fmt::Display for EventPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disabled => "Disabled",
            Self::NoChanges => "NoChanges",
            Self::DecoratedChanges => "DecoratedChanges",
            Self::AllChanges => "AllChanges",
        };
        write!(f, "{name}")
    }
}

impl FromStr for EventPolicy {
    type Err = DataError;

    /// Case-insensitive; `-` and `_` are ignored, so `all_changes` parses.
    fn from_str(value: &str) -> Result<Self> {
        let normalized: String = value
            .trim()
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .map(|c| c.to_ascii_lowercase())
            .collect();

        match normalized.as_str() {
            "disabled" => Ok(Self::Disabled),
            "nochanges" => Ok(Self::NoChanges),
            "decoratedchanges" => Ok(Self::DecoratedChanges),
            "allchanges" => Ok(Self::AllChanges),
            _ => Err(DataError::Configuration(format!(
                "unknown event policy '{}'",
                value
            ))),
        }
    }
}

/// Data provider configuration
///
/// Builder-style; call [`DataProviderOptions::validate`] (the provider does)
/// before use.
#[derive(Debug, Clone, Default)]
pub struct DataProviderOptions {
    /// Event policy applied to every command of the provider
    pub event_policy: EventPolicy,
}

impl DataProviderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the event policy
    pub fn event_policy(mut self, policy: EventPolicy) -> Self {
        self.event_policy = policy;
        self
    }

    /// Checks the options against the item type they will serve.
    pub fn validate(&self, type_name: &str) -> Result<()> {
        validate_type_name(type_name)
    }
}

/// A type name is lowercase ASCII letters, digits and `-`, starts with a
/// letter, and is not the reserved event type name.
pub fn validate_type_name(type_name: &str) -> Result<()> {
    let starts_with_letter = type_name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_lowercase());
    let allowed = type_name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');

    if !starts_with_letter || !allowed {
        return Err(DataError::Configuration(format!(
            "type name '{}' must start with a lowercase letter and contain only lowercase letters, digits and '-'",
            type_name
        )));
    }

    if type_name == EVENT_TYPE_NAME {
        return Err(DataError::Configuration(format!(
            "type name '{}' is reserved",
            type_name
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_policy_round_trips_through_strings() {
        for policy in [
            EventPolicy::Disabled,
            EventPolicy::NoChanges,
            EventPolicy::DecoratedChanges,
            EventPolicy::AllChanges,
        ] {
            assert_eq!(policy.to_string().parse::<EventPolicy>().unwrap(), policy);
        }
        assert_eq!("all_changes".parse::<EventPolicy>().unwrap(), EventPolicy::AllChanges);
        assert!("sometimes".parse::<EventPolicy>().is_err());
    }

    #[test]
    fn test_default_options() {
        let options = DataProviderOptions::new();
        assert_eq!(options.event_policy, EventPolicy::DecoratedChanges);
        assert!(options.validate("test-item").is_ok());
    }

    #[test]
    fn test_type_name_rules() {
        assert!(validate_type_name("order-line2").is_ok());
        assert!(validate_type_name("").is_err());
        assert!(validate_type_name("2fast").is_err());
        assert!(validate_type_name("Upper").is_err());
        assert!(validate_type_name("snake_case").is_err());
        assert!(matches!(
            validate_type_name("event"),
            Err(DataError::Configuration(_))
        ));
    }
}
