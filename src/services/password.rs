// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Password policy applied before any credential reaches the identity provider.

use crate::error::AppError;

/// Minimum accepted password length.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Reasons a password fails the policy. Checked in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PasswordPolicyError {
    #[error("Password must be at least 8 characters")]
    TooShort,

    #[error("Password must contain an uppercase letter")]
    MissingUppercase,

    #[error("Password must contain a lowercase letter")]
    MissingLowercase,

    #[error("Password must contain a digit")]
    MissingDigit,
}

impl PasswordPolicyError {
    /// Convert to a field-level validation error on `field`.
    pub fn into_app_error(self, field: &str) -> AppError {
        AppError::validation(field, self.to_string())
    }
}

/// Check a candidate password against the policy.
pub fn check_password_policy(password: &str) -> Result<(), PasswordPolicyError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(PasswordPolicyError::TooShort);
    }
    if !password.chars().any(|c| c.is_uppercase()) {
        return Err(PasswordPolicyError::MissingUppercase);
    }
    if !password.chars().any(|c| c.is_lowercase()) {
        return Err(PasswordPolicyError::MissingLowercase);
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(PasswordPolicyError::MissingDigit);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_rule_reports_its_own_error() {
        assert_eq!(check_password_policy("Ab1"), Err(PasswordPolicyError::TooShort));
        assert_eq!(
            check_password_policy("abcdefg1"),
            Err(PasswordPolicyError::MissingUppercase)
        );
        assert_eq!(
            check_password_policy("ABCDEFG1"),
            Err(PasswordPolicyError::MissingLowercase)
        );
        assert_eq!(
            check_password_policy("Abcdefgh"),
            Err(PasswordPolicyError::MissingDigit)
        );
        assert_eq!(check_password_policy("Abcdefg1"), Ok(()));
    }

    #[test]
    fn test_length_counts_characters_not_bytes() {
        // Four multibyte letters are still four characters.
        assert_eq!(
            check_password_policy("Éé1ü"),
            Err(PasswordPolicyError::TooShort)
        );
    }

    #[test]
    fn test_into_app_error_is_field_level() {
        let err = PasswordPolicyError::MissingDigit.into_app_error("new_password");
        match err {
            AppError::Validation { field, message } => {
                assert_eq!(field, "new_password");
                assert!(message.contains("digit"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
