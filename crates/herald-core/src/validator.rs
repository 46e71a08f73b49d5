//! Post-resolution checks attached to parameters.

use crate::actor::Actor;
use crate::descriptor::ParameterDescriptor;
use crate::error::CommandError;
use crate::permission::Permission;
use crate::types::Value;

/// Check run on a resolved value before it is stored.
pub trait ParameterValidator: Send + Sync {
    /// Accepts or rejects `value`.
    ///
    /// # Errors
    ///
    /// Returns a failure from the validation family when the value is
    /// rejected.
    fn validate(
        &self,
        value: &Value,
        actor: &dyn Actor,
        parameter: &ParameterDescriptor,
    ) -> Result<(), CommandError>;

    /// Permission the actor must hold before the parameter is resolved.
    fn permission(&self) -> Option<&Permission> {
        None
    }
}

/// Restricts a numeric argument to an inclusive range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeValidator {
    min: f64,
    max: f64,
}

impl RangeValidator {
    /// Creates a validator accepting `min..=max`.
    #[must_use]
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Creates a validator with only a lower bound.
    #[must_use]
    pub const fn at_least(min: f64) -> Self {
        Self::new(min, f64::INFINITY)
    }

    /// Creates a validator with only an upper bound.
    #[must_use]
    pub const fn at_most(max: f64) -> Self {
        Self::new(f64::NEG_INFINITY, max)
    }
}

#[expect(
    clippy::cast_precision_loss,
    reason = "range bounds are compared as f64; precision loss above 2^53 is acceptable"
)]
fn as_number(value: &Value) -> Option<f64> {
    if let Some(number) = value.downcast_ref::<i64>() {
        return Some(*number as f64);
    }
    if let Some(number) = value.downcast_ref::<i32>() {
        return Some(f64::from(*number));
    }
    if let Some(number) = value.downcast_ref::<u32>() {
        return Some(f64::from(*number));
    }
    value.downcast_ref::<f64>().copied()
}

impl ParameterValidator for RangeValidator {
    fn validate(
        &self,
        value: &Value,
        _actor: &dyn Actor,
        parameter: &ParameterDescriptor,
    ) -> Result<(), CommandError> {
        let Some(number) = as_number(value) else {
            return Err(CommandError::validation(
                parameter.name(),
                "a range check requires a numeric value",
            ));
        };
        if number < self.min || number > self.max {
            return Err(CommandError::NumberNotInRange {
                parameter: parameter.name().to_owned(),
                value: number,
                min: self.min,
                max: self.max,
            });
        }
        Ok(())
    }
}

/// Restricts the character length of a string argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LengthValidator {
    min: usize,
    max: usize,
}

impl LengthValidator {
    /// Creates a validator accepting lengths in `min..=max` characters.
    #[must_use]
    pub const fn new(min: usize, max: usize) -> Self {
        Self { min, max }
    }
}

impl ParameterValidator for LengthValidator {
    fn validate(
        &self,
        value: &Value,
        _actor: &dyn Actor,
        parameter: &ParameterDescriptor,
    ) -> Result<(), CommandError> {
        let Some(text) = value.downcast_ref::<String>() else {
            return Err(CommandError::validation(
                parameter.name(),
                "a length check requires a string value",
            ));
        };
        let length = text.chars().count();
        if length < self.min || length > self.max {
            return Err(CommandError::InvalidLength {
                parameter: parameter.name().to_owned(),
                length,
                min: self.min,
                max: self.max,
            });
        }
        Ok(())
    }
}

/// Requires a permission before the parameter is resolved.
///
/// The check itself runs ahead of resolution; [`validate`](Self::validate)
/// always succeeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequirePermission(Permission);

impl RequirePermission {
    /// Wraps the permission to require.
    #[must_use]
    pub const fn new(permission: Permission) -> Self {
        Self(permission)
    }
}

impl ParameterValidator for RequirePermission {
    fn validate(
        &self,
        _value: &Value,
        _actor: &dyn Actor,
        _parameter: &ParameterDescriptor,
    ) -> Result<(), CommandError> {
        Ok(())
    }

    fn permission(&self) -> Option<&Permission> {
        Some(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::types::TypeTag;

    struct Nobody;

    impl Actor for Nobody {
        fn name(&self) -> &str {
            "nobody"
        }

        fn has_permission(&self, _permission: &str) -> bool {
            false
        }
    }

    #[rstest]
    #[case::inside(Value::new(5_i64), true)]
    #[case::lower_bound(Value::new(1_i32), true)]
    #[case::upper_bound(Value::new(10.0_f64), true)]
    #[case::below(Value::new(0_u32), false)]
    #[case::above(Value::new(11_i64), false)]
    fn range_validator_is_inclusive(#[case] value: Value, #[case] accepted: bool) {
        let parameter = ParameterDescriptor::value("level", TypeTag::INT);
        let result = RangeValidator::new(1.0, 10.0).validate(&value, &Nobody, &parameter);
        assert_eq!(result.is_ok(), accepted);
        if let Err(error) = result {
            assert!(matches!(error, CommandError::NumberNotInRange { .. }));
        }
    }

    #[test]
    fn range_validator_rejects_non_numbers() {
        let parameter = ParameterDescriptor::value("level", TypeTag::STRING);
        let error = RangeValidator::at_least(0.0)
            .validate(&Value::new(String::from("x")), &Nobody, &parameter)
            .expect_err("strings are not numbers");
        assert!(matches!(error, CommandError::Validation { .. }));
    }

    #[rstest]
    #[case::ascii("steve", true)]
    #[case::multibyte("ñandú", true)]
    #[case::too_short("ab", false)]
    #[case::too_long("abcdefghijklmnop", false)]
    fn length_validator_counts_characters(#[case] text: &str, #[case] accepted: bool) {
        let parameter = ParameterDescriptor::value("name", TypeTag::STRING);
        let result =
            LengthValidator::new(3, 12).validate(&Value::new(text.to_owned()), &Nobody, &parameter);
        assert_eq!(result.is_ok(), accepted);
    }

    #[test]
    fn require_permission_exposes_its_predicate() {
        let validator = RequirePermission::new(Permission::node("admin"));
        assert_eq!(validator.permission(), Some(&Permission::node("admin")));
    }
}
