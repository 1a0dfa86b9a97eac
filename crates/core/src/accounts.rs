//! Account registration rules.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use crate::forms::{clean_text, FieldErrors};

/// Minimum password length for new accounts.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum username length.
pub const MAX_USERNAME_LENGTH: usize = 150;

pub const USERNAME_TAKEN: &str = "A user with that username already exists.";
pub const REGISTERED_MESSAGE: &str = "Account created successfully! Please log in.";
pub const LOGGED_OUT_MESSAGE: &str = "You have been logged out successfully.";

static USERNAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[\w.@+-]+$").expect("username pattern is valid")
});

/// Untrusted registration form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistrationInput {
    pub username: Option<String>,
    pub password1: Option<String>,
    pub password2: Option<String>,
}

/// Registration that passed validation. The password is still plaintext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanRegistration {
    pub username: String,
    pub password: String,
}

/// Validate a registration form. Username uniqueness is checked by the
/// caller against the identity store.
pub fn validate_registration(input: &RegistrationInput) -> Result<CleanRegistration, FieldErrors> {
    let mut errors = FieldErrors::new();

    let username = clean_text(input.username.as_deref());
    if username.is_empty() {
        errors.required("username");
    } else if username.chars().count() > MAX_USERNAME_LENGTH {
        errors.add(
            "username",
            format!("Ensure this value has at most {MAX_USERNAME_LENGTH} characters."),
        );
    } else if !USERNAME_RE.is_match(&username) {
        errors.add(
            "username",
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        );
    }

    // Passwords are not trimmed.
    let password1 = input.password1.clone().unwrap_or_default();
    let password2 = input.password2.clone().unwrap_or_default();
    if password1.is_empty() {
        errors.required("password1");
    }
    if password2.is_empty() {
        errors.required("password2");
    }
    if !password1.is_empty() && !password2.is_empty() {
        if password1 != password2 {
            errors.add("password2", "The two password fields didn't match.");
        } else if password1.chars().count() < MIN_PASSWORD_LENGTH {
            errors.add(
                "password2",
                format!(
                    "This password is too short. It must contain at least {MIN_PASSWORD_LENGTH} characters."
                ),
            );
        } else if password1.chars().all(|c| c.is_ascii_digit()) {
            errors.add("password2", "This password is entirely numeric.");
        }
    }

    errors.into_result(CleanRegistration {
        username,
        password: password1,
    })
}

/// Greeting returned on successful login.
pub fn welcome_message(username: &str) -> String {
    format!(
        "Welcome back, {}! Cantus - UCM is here for you!",
        username.to_uppercase()
    )
}
