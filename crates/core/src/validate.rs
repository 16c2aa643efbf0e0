//! Small field validators shared by the domain modules.

use crate::error::{DomainError, DomainResult};

/// Require `value` to contain at least `min` characters once trimmed.
pub fn min_chars(field: &str, value: &str, min: usize) -> DomainResult<()> {
    if value.trim().chars().count() < min {
        return Err(DomainError::validation(format!(
            "{field} must contain at least {min} characters"
        )));
    }
    Ok(())
}

/// Require `value` to contain something other than whitespace.
pub fn not_blank(field: &str, value: &str) -> DomainResult<()> {
    if value.trim().is_empty() {
        return Err(DomainError::validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn min_chars_ignores_surrounding_whitespace() {
        assert!(min_chars("name", "  ab  ", 3).is_err());
        assert!(min_chars("name", "abc", 3).is_ok());
    }

    #[test]
    fn not_blank_rejects_whitespace() {
        let err = not_blank("category name", "   ").unwrap_err();
        assert_eq!(
            err,
            DomainError::validation("category name cannot be empty")
        );
    }
}
