//! Key and dataset-name validation.

use thiserror::Error;

/// Maximum length of a record key in bytes.
pub const MAX_KEY_LENGTH: usize = 128;

/// Maximum length of a dataset name in bytes.
pub const MAX_DATASET_NAME_LENGTH: usize = 128;

/// Reserved identity bucket for records written before any identity is
/// established.
pub const UNKNOWN_IDENTITY_ID: &str = "unknown";

/// Errors produced by key and dataset-name validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The key or name is empty.
    #[error("{what} must not be empty")]
    Empty {
        /// What was being validated.
        what: &'static str,
    },

    /// The key or name exceeds the length bound.
    #[error("{what} is {len} bytes, maximum is {max}")]
    TooLong {
        /// What was being validated.
        what: &'static str,
        /// Actual length in bytes.
        len: usize,
        /// Maximum allowed length.
        max: usize,
    },

    /// The key or name contains a character outside the allowed set.
    #[error("{what} contains invalid character {ch:?}")]
    InvalidCharacter {
        /// What was being validated.
        what: &'static str,
        /// The offending character.
        ch: char,
    },
}

fn validate(value: &str, what: &'static str, max: usize) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::Empty { what });
    }
    if value.len() > max {
        return Err(ValidationError::TooLong {
            what,
            len: value.len(),
            max,
        });
    }
    for ch in value.chars() {
        if !(ch.is_ascii_alphanumeric() || matches!(ch, '_' | '.' | ':' | '-')) {
            return Err(ValidationError::InvalidCharacter { what, ch });
        }
    }
    Ok(())
}

/// Validates a record key: non-empty, at most [`MAX_KEY_LENGTH`] bytes,
/// restricted to `[A-Za-z0-9_.:-]`.
pub fn validate_record_key(key: &str) -> Result<&str, ValidationError> {
    validate(key, "record key", MAX_KEY_LENGTH)?;
    Ok(key)
}

/// Validates a dataset name under the same rules as record keys.
pub fn validate_dataset_name(name: &str) -> Result<&str, ValidationError> {
    validate(name, "dataset name", MAX_DATASET_NAME_LENGTH)?;
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn accepts_ordinary_keys() {
        assert!(validate_record_key("nickname").is_ok());
        assert!(validate_record_key("user.profile:v2-draft_1").is_ok());
    }

    #[test]
    fn rejects_empty() {
        assert_eq!(
            validate_record_key(""),
            Err(ValidationError::Empty { what: "record key" })
        );
    }

    #[test]
    fn rejects_overlong() {
        let key = "k".repeat(MAX_KEY_LENGTH + 1);
        assert!(matches!(
            validate_record_key(&key),
            Err(ValidationError::TooLong { len: 129, .. })
        ));
    }

    #[test]
    fn rejects_invalid_characters() {
        assert!(matches!(
            validate_record_key("bad key"),
            Err(ValidationError::InvalidCharacter { ch: ' ', .. })
        ));
        assert!(matches!(
            validate_dataset_name("profile/main"),
            Err(ValidationError::InvalidCharacter { ch: '/', .. })
        ));
    }

    #[test]
    fn dataset_names_share_key_rules() {
        assert!(validate_dataset_name("profile.merged:2024-01").is_ok());
        assert!(validate_dataset_name("").is_err());
    }

    proptest! {
        #[test]
        fn allowed_charset_always_accepted(key in "[A-Za-z0-9_.:-]{1,128}") {
            prop_assert!(validate_record_key(&key).is_ok());
        }

        #[test]
        fn validation_never_panics(key in "\\PC*") {
            let _ = validate_record_key(&key);
        }
    }
}
