//! Field rules shared by every form page.
//!
//! These are user-facing contracts: postcode and ABN lengths, and the phone
//! patterns, must not drift.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use validator::ValidateEmail;

use crate::domain::agreement::PostalAddress;
use crate::domain::contact::Contact;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self { field: field.into(), message: message.into() }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.push(FieldError::new(field, message));
    }

    pub fn extend(&mut self, other: ValidationErrors) {
        self.0.extend(other.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }

    pub fn contains_field(&self, field: &str) -> bool {
        self.0.iter().any(|error| error.field == field)
    }

    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<&str> = self.0.iter().map(|error| error.field.as_str()).collect();
        write!(f, "{} invalid field(s): {}", self.0.len(), fields.join(", "))
    }
}

impl std::error::Error for ValidationErrors {}

impl FromIterator<FieldError> for ValidationErrors {
    fn from_iter<T: IntoIterator<Item = FieldError>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

fn mobile_pattern() -> &'static Regex {
    static MOBILE: OnceLock<Regex> = OnceLock::new();
    MOBILE.get_or_init(|| Regex::new(r"^(\+614|04)[0-9]{8}$").expect("mobile pattern compiles"))
}

fn office_pattern() -> &'static Regex {
    static OFFICE: OnceLock<Regex> = OnceLock::new();
    OFFICE.get_or_init(|| Regex::new(r"^\+?[0-9]+$").expect("office pattern compiles"))
}

fn all_digits(value: &str, len: usize) -> bool {
    value.len() == len && value.bytes().all(|byte| byte.is_ascii_digit())
}

pub fn is_valid_postcode(value: &str) -> bool {
    all_digits(value, 4)
}

/// Eleven digits, no separators.
pub fn is_valid_abn(value: &str) -> bool {
    all_digits(value, 11)
}

pub fn is_valid_mobile(value: &str) -> bool {
    mobile_pattern().is_match(value)
}

pub fn is_valid_office_phone(value: &str) -> bool {
    office_pattern().is_match(value)
}

pub fn is_valid_email(value: &str) -> bool {
    let trimmed = value.trim();
    !trimmed.is_empty() && trimmed.validate_email()
}

pub(crate) fn require(errors: &mut ValidationErrors, field: String, value: &str, label: &str) {
    if value.trim().is_empty() {
        errors.push(field, format!("{label} is required"));
    }
}

pub(crate) fn check_address(errors: &mut ValidationErrors, prefix: &str, address: &PostalAddress) {
    require(errors, format!("{prefix}.street"), &address.street, "Street address");
    require(errors, format!("{prefix}.suburb"), &address.suburb, "Suburb");
    require(errors, format!("{prefix}.state"), &address.state, "State");
    if !is_valid_postcode(address.postcode.trim()) {
        errors.push(format!("{prefix}.postcode"), "Postcode must be exactly 4 digits");
    }
}

/// Checks a contact record. `phone_required` demands at least one of office
/// or mobile; numbers that are present are always checked.
pub(crate) fn check_contact(
    errors: &mut ValidationErrors,
    prefix: &str,
    contact: &Contact,
    phone_required: bool,
) {
    require(errors, format!("{prefix}.first_name"), &contact.first_name, "First name");
    require(errors, format!("{prefix}.last_name"), &contact.last_name, "Last name");

    if contact.email.trim().is_empty() {
        errors.push(format!("{prefix}.email"), "Email is required");
    } else if !is_valid_email(&contact.email) {
        errors.push(format!("{prefix}.email"), "Enter a valid email address");
    }

    let office = contact.office_phone.trim();
    let mobile = contact.mobile_phone.trim();
    if phone_required && office.is_empty() && mobile.is_empty() {
        errors.push(format!("{prefix}.phone"), "An office or mobile number is required");
    }
    if !office.is_empty() && !is_valid_office_phone(office) {
        errors.push(
            format!("{prefix}.office_phone"),
            "Office phone may contain digits and a leading + only",
        );
    }
    if !mobile.is_empty() && !is_valid_mobile(mobile) {
        errors.push(
            format!("{prefix}.mobile_phone"),
            "Mobile must look like 04XXXXXXXX or +614XXXXXXXX",
        );
    }
}
