//! Username and password rules for registration.

use crate::domain::forms::{FieldErrors, REQUIRED_MESSAGE, non_blank};

pub const USERNAME_MAX_CHARS: usize = 150;
pub const FULL_NAME_MAX_CHARS: usize = 300;
pub const PASSWORD_MIN_CHARS: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidSignup {
    pub username: String,
    pub full_name: String,
    pub password: String,
}

pub fn validate_username(raw: &str) -> Result<String, FieldErrors> {
    let Some(username) = non_blank(raw) else {
        return Err(FieldErrors::single("username", REQUIRED_MESSAGE));
    };

    let mut errors = FieldErrors::new();
    if username.chars().count() > USERNAME_MAX_CHARS {
        errors.add(
            "username",
            format!("Ensure this value has at most {USERNAME_MAX_CHARS} characters."),
        );
    }
    if !username
        .chars()
        .all(|ch| ch.is_alphanumeric() || matches!(ch, '@' | '.' | '+' | '-' | '_'))
    {
        errors.add(
            "username",
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        );
    }

    errors.into_result(username.to_string())
}

pub fn validate_signup(
    username: &str,
    full_name: &str,
    password: &str,
    password_confirm: &str,
) -> Result<ValidSignup, FieldErrors> {
    let mut errors = FieldErrors::new();

    let username = match validate_username(username) {
        Ok(username) => Some(username),
        Err(field_errors) => {
            errors.merge(field_errors);
            None
        }
    };

    let full_name = full_name.trim();
    if full_name.chars().count() > FULL_NAME_MAX_CHARS {
        errors.add(
            "full_name",
            format!("Ensure this value has at most {FULL_NAME_MAX_CHARS} characters."),
        );
    }

    if password.is_empty() {
        errors.add("password1", REQUIRED_MESSAGE);
    } else if password.chars().count() < PASSWORD_MIN_CHARS {
        errors.add(
            "password1",
            format!("This password is too short. It must contain at least {PASSWORD_MIN_CHARS} characters."),
        );
    }

    if password != password_confirm {
        errors.add("password2", "The two password fields didn't match.");
    }

    match username {
        Some(username) if errors.is_empty() => Ok(ValidSignup {
            username,
            full_name: full_name.to_string(),
            password: password.to_string(),
        }),
        _ => Err(errors),
    }
}
