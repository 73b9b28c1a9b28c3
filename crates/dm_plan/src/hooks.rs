use alloc::borrow::Cow;
use alloc::boxed::Box;

use serde_json::Value;
use thiserror::Error;

use crate::directive::ValidationRule;

/// A caster or validator rejected a field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("field `{field}`: {message}")]
pub struct HookError {
    field: Box<str>,
    message: Cow<'static, str>,
}

impl HookError {
    pub fn new(field: &str, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    #[inline]
    pub fn field(&self) -> &str {
        &self.field
    }

    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Behaviour behind `cast_with` and `rule` directives.
///
/// Both methods default to accepting the value unchanged, so an
/// implementation overrides only what it supports.
///
/// # Examples
///
/// ```
/// use dm_plan::{FieldHooks, HookError, ValidationRule};
/// use serde_json::Value;
///
/// struct Required;
///
/// impl FieldHooks for Required {
///     fn validate(&self, field: &str, rule: &ValidationRule, value: &Value) -> Result<(), HookError> {
///         match rule.name() {
///             "required" if value.is_null() => Err(HookError::new(field, "is required")),
///             _ => Ok(()),
///         }
///     }
/// }
///
/// let rule = ValidationRule::parse("required");
/// assert!(Required.validate("name", &rule, &Value::Null).is_err());
/// assert_eq!(Required.cast("name", "upper", Value::Null), Ok(Value::Null));
/// ```
pub trait FieldHooks {
    /// Converts `value` with the caster named `caster`.
    fn cast(&self, field: &str, caster: &str, value: Value) -> Result<Value, HookError> {
        let _ = (field, caster);
        Ok(value)
    }

    /// Checks `value` against `rule`. Runs after casting.
    fn validate(&self, field: &str, rule: &ValidationRule, value: &Value) -> Result<(), HookError> {
        let _ = (field, rule, value);
        Ok(())
    }
}

/// Hooks that accept everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl FieldHooks for NoHooks {}
