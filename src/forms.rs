//! HTML forms submitted by the browser, and the errors shown next to their fields.
use crate::session::Session;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use validator::{Validate, ValidationError, ValidationErrors};

pub const CSRF_FIELD: &str = "csrf_token";

/// Every form carries a CSRF token and may want its input cleaned up before validation.
pub trait Form: Validate {
    fn csrf_token(&self) -> &str;

    /// Trim whitespace and the like. Runs before validation.
    fn normalize(&mut self) {}

    /// Cross-field checks that validator's derive can't express.
    fn extra_checks(&self, _errors: &mut FormErrors) {}
}

/// Normalize, check the CSRF token, then run the field validators.
/// An empty `FormErrors` means the form is acceptable.
pub fn check<F: Form>(form: &mut F, session: &Session) -> FormErrors {
    form.normalize();
    let mut errors = FormErrors::default();
    if !session.csrf_matches(form.csrf_token()) {
        errors.add(CSRF_FIELD, "The CSRF token is missing or invalid.");
    }
    if let Err(e) = form.validate() {
        errors.extend(e);
    }
    form.extra_checks(&mut errors);
    errors
}

/// Messages per field name, in the order they were raised.
#[derive(Serialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct FormErrors(BTreeMap<String, Vec<String>>);

impl FormErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_owned())
            .or_default()
            .push(message.into())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> &[String] {
        self.0.get(field).map(|v| v.as_slice()).unwrap_or(&[])
    }

    fn extend(&mut self, errors: ValidationErrors) {
        for (field, field_errors) in errors.field_errors() {
            for error in field_errors {
                let message = match &error.message {
                    Some(message) => message.to_string(),
                    None => format!("Invalid value ({})", error.code),
                };
                self.add(field, message);
            }
        }
    }
}

fn required(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("required");
        err.message = Some(Cow::from("This field is required."));
        return Err(err);
    }
    Ok(())
}

#[derive(Deserialize, Validate, Debug, Default, Clone)]
#[serde(default)]
pub struct LoginForm {
    #[validate(custom = "required")]
    pub username: String,
    #[validate(custom = "required")]
    pub password: String,
    /// Checkboxes are only submitted when ticked.
    pub remember_me: Option<String>,
    pub csrf_token: String,
}

impl LoginForm {
    pub fn remember(&self) -> bool {
        self.remember_me.is_some()
    }
}

impl Form for LoginForm {
    fn csrf_token(&self) -> &str {
        &self.csrf_token
    }

    fn normalize(&mut self) {
        self.username = self.username.trim().to_owned();
    }
}

#[derive(Deserialize, Validate, Debug, Default, Clone)]
#[serde(default)]
pub struct RegistrationForm {
    #[validate(
        custom = "required",
        length(max = 64, message = "Field cannot be longer than 64 characters.")
    )]
    pub username: String,
    #[validate(
        custom = "required",
        length(max = 120, message = "Field cannot be longer than 120 characters."),
        email(message = "Invalid email address.")
    )]
    pub email: String,
    #[validate(custom = "required")]
    pub password: String,
    #[validate(custom = "required")]
    pub password2: String,
    pub csrf_token: String,
}

impl Form for RegistrationForm {
    fn csrf_token(&self) -> &str {
        &self.csrf_token
    }

    fn normalize(&mut self) {
        self.username = self.username.trim().to_owned();
        self.email = self.email.trim().to_owned();
    }

    fn extra_checks(&self, errors: &mut FormErrors) {
        if !self.password2.is_empty() && self.password != self.password2 {
            errors.add("password2", "Field must be equal to password.");
        }
    }
}

#[derive(Deserialize, Validate, Debug, Default, Clone)]
#[serde(default)]
pub struct EditProfileForm {
    #[validate(
        custom = "required",
        length(max = 64, message = "Field cannot be longer than 64 characters.")
    )]
    pub username: String,
    #[validate(length(max = 140, message = "Field cannot be longer than 140 characters."))]
    pub about_me: String,
    pub csrf_token: String,
}

impl EditProfileForm {
    /// A blank bio is stored as no bio.
    pub fn about_me(&self) -> Option<String> {
        if self.about_me.is_empty() {
            None
        } else {
            Some(self.about_me.clone())
        }
    }
}

impl Form for EditProfileForm {
    fn csrf_token(&self) -> &str {
        &self.csrf_token
    }

    fn normalize(&mut self) {
        self.username = self.username.trim().to_owned();
        self.about_me = self.about_me.trim().to_owned();
    }
}

#[derive(Deserialize, Validate, Debug, Default, Clone)]
#[serde(default)]
pub struct PostForm {
    #[validate(
        custom = "required",
        length(max = 140, message = "Field must be between 1 and 140 characters long.")
    )]
    pub post: String,
    pub csrf_token: String,
}

impl Form for PostForm {
    fn csrf_token(&self) -> &str {
        &self.csrf_token
    }

    fn normalize(&mut self) {
        self.post = self.post.trim().to_owned();
    }
}

/// Buttons like follow/unfollow submit nothing but the CSRF token.
#[derive(Deserialize, Validate, Debug, Default, Clone)]
#[serde(default)]
pub struct EmptyForm {
    pub csrf_token: String,
}

impl Form for EmptyForm {
    fn csrf_token(&self) -> &str {
        &self.csrf_token
    }
}
