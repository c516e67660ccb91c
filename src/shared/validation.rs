use lazy_static::lazy_static;
use regex::Regex;
use validator::ValidationError;

lazy_static! {
    /// Person names: letters, spaces, apostrophes, dots and hyphens
    /// - Valid: "Jane", "O'Neil", "Anne-Marie", "J. R."
    /// - Invalid: "", "R2D2", "<script>"
    pub static ref PERSON_NAME_REGEX: Regex =
        Regex::new(r"^[\p{L}][\p{L} .'\-]*$").unwrap();

    static ref PASSWORD_UPPER: Regex = Regex::new(r"[A-Z]").unwrap();
    static ref PASSWORD_LOWER: Regex = Regex::new(r"[a-z]").unwrap();
    static ref PASSWORD_DIGIT: Regex = Regex::new(r"[0-9]").unwrap();
    static ref PASSWORD_SPECIAL: Regex = Regex::new(r"[@$!%*?&]").unwrap();
}

/// Password policy used by registration and password change.
///
/// At least 8 characters with one uppercase letter, one lowercase letter,
/// one digit and one of `@$!%*?&`.
pub fn validate_password_strength(password: &str) -> Result<(), ValidationError> {
    let failure = |code: &'static str, message: &'static str| {
        let mut err = ValidationError::new(code);
        err.message = Some(message.into());
        Err(err)
    };

    if password.chars().count() < 8 {
        return failure("password_length", "Password must be at least 8 characters");
    }
    if !PASSWORD_UPPER.is_match(password) {
        return failure(
            "password_uppercase",
            "Password must contain an uppercase letter",
        );
    }
    if !PASSWORD_LOWER.is_match(password) {
        return failure(
            "password_lowercase",
            "Password must contain a lowercase letter",
        );
    }
    if !PASSWORD_DIGIT.is_match(password) {
        return failure("password_digit", "Password must contain a digit");
    }
    if !PASSWORD_SPECIAL.is_match(password) {
        return failure(
            "password_special",
            "Password must contain one of @$!%*?&",
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_person_name_regex() {
        assert!(PERSON_NAME_REGEX.is_match("Jane"));
        assert!(PERSON_NAME_REGEX.is_match("O'Neil"));
        assert!(PERSON_NAME_REGEX.is_match("Anne-Marie"));
        assert!(PERSON_NAME_REGEX.is_match("J. R."));
        assert!(!PERSON_NAME_REGEX.is_match(""));
        assert!(!PERSON_NAME_REGEX.is_match("R2D2"));
        assert!(!PERSON_NAME_REGEX.is_match("<script>"));
    }

    #[test]
    fn test_password_policy_accepts_strong_password() {
        assert!(validate_password_strength("Str0ng!Pass").is_ok());
    }

    #[test]
    fn test_password_policy_rejections() {
        let code = |p: &str| validate_password_strength(p).unwrap_err().code.to_string();
        assert_eq!(code("S0!a"), "password_length");
        assert_eq!(code("weak0!pass"), "password_uppercase");
        assert_eq!(code("WEAK0!PASS"), "password_lowercase");
        assert_eq!(code("Weak!Pass"), "password_digit");
        assert_eq!(code("Weak0Pass"), "password_special");
    }
}
