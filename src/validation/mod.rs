//! Input validation module

use crate::models::{
    ComplaintRequest, ComplaintStatus, ContentChanges, Priority, RegisterRequest, Role,
    TriageChanges, TriageRequest,
};
use thiserror::Error;

const MAX_TITLE: usize = 200;
const MAX_DESCRIPTION: usize = 5000;
const MAX_NAME: usize = 100;
const MAX_NOTE: usize = 2000;
const MIN_USERNAME: usize = 3;
const MAX_USERNAME: usize = 50;
const MIN_PASSWORD: usize = 6;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Field '{field}' is required")]
    Required { field: String },

    #[error("Field '{field}' is too long (max {max} characters)")]
    TooLong { field: String, max: usize },

    #[error("Field '{field}' is too short (min {min} characters)")]
    TooShort { field: String, min: usize },

    #[error("Invalid email format")]
    InvalidEmail,

    #[error("Invalid value for '{field}': {value}")]
    InvalidChoice { field: String, value: String },
}

/// Normalized registration input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Validated complaint submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComplaintSubmission {
    pub title: String,
    pub description: String,
    pub department: String,
    pub priority: Priority,
}

/// Validate a registration request
pub fn validate_registration(input: &RegisterRequest) -> Result<Registration, ValidationError> {
    let username = validate_username(&input.username)?;
    let email = validate_email(&input.email)?;
    validate_password(&input.password)?;

    Ok(Registration {
        username,
        email,
        password: input.password.clone(),
    })
}

pub fn validate_username(username: &str) -> Result<String, ValidationError> {
    let username = username.trim();
    if username.is_empty() {
        return Err(required("username"));
    }
    if username.chars().count() < MIN_USERNAME {
        return Err(ValidationError::TooShort {
            field: "username".to_string(),
            min: MIN_USERNAME,
        });
    }
    if username.chars().count() > MAX_USERNAME {
        return Err(ValidationError::TooLong {
            field: "username".to_string(),
            max: MAX_USERNAME,
        });
    }
    Ok(username.to_string())
}

/// Returns the lower-cased address
pub fn validate_email(email: &str) -> Result<String, ValidationError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(required("email"));
    }
    if !validator::validate_email(email) {
        return Err(ValidationError::InvalidEmail);
    }
    Ok(email.to_lowercase())
}

pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(required("password"));
    }
    if password.chars().count() < MIN_PASSWORD {
        return Err(ValidationError::TooShort {
            field: "password".to_string(),
            min: MIN_PASSWORD,
        });
    }
    Ok(())
}

pub fn parse_role(role: &str) -> Result<Role, ValidationError> {
    role.trim().parse().map_err(|_| invalid_choice("role", role))
}

pub fn parse_priority(priority: &str) -> Result<Priority, ValidationError> {
    priority
        .trim()
        .parse()
        .map_err(|_| invalid_choice("priority", priority))
}

pub fn parse_status(status: &str) -> Result<ComplaintStatus, ValidationError> {
    status
        .trim()
        .parse()
        .map_err(|_| invalid_choice("status", status))
}

/// Validate a new complaint. Priority defaults to Medium when omitted.
pub fn validate_complaint(input: &ComplaintRequest) -> Result<ComplaintSubmission, ValidationError> {
    let title = required_text("title", input.title.as_deref(), MAX_TITLE)?;
    let description = required_text("description", input.description.as_deref(), MAX_DESCRIPTION)?;
    let department = required_text("department", input.department.as_deref(), MAX_NAME)?;
    let priority = match input.priority.as_deref() {
        Some(p) if !p.trim().is_empty() => parse_priority(p)?,
        _ => Priority::default(),
    };

    Ok(ComplaintSubmission {
        title,
        description,
        department,
        priority,
    })
}

/// Validate an owner edit. Omitted fields stay unchanged, supplied ones must be non-empty.
pub fn validate_content_changes(input: &ComplaintRequest) -> Result<ContentChanges, ValidationError> {
    Ok(ContentChanges {
        title: optional_text("title", input.title.as_deref(), MAX_TITLE)?,
        description: optional_text("description", input.description.as_deref(), MAX_DESCRIPTION)?,
        department: optional_text("department", input.department.as_deref(), MAX_NAME)?,
        priority: input.priority.as_deref().map(parse_priority).transpose()?,
    })
}

/// Validate an admin triage edit
pub fn validate_triage(input: &TriageRequest) -> Result<TriageChanges, ValidationError> {
    let note = match input.note.as_deref() {
        Some(n) if !n.trim().is_empty() => Some(validate_note(n)?),
        _ => None,
    };

    Ok(TriageChanges {
        status: input.status.as_deref().map(parse_status).transpose()?,
        priority: input.priority.as_deref().map(parse_priority).transpose()?,
        assigned_to: input.assigned_to,
        public_response: input.public_response.clone(),
        note,
    })
}

pub fn validate_note(note: &str) -> Result<String, ValidationError> {
    required_text("note", Some(note), MAX_NOTE)
}

/// Names of categories and departments
pub fn validate_name(name: Option<&str>) -> Result<String, ValidationError> {
    required_text("name", name, MAX_NAME)
}

fn required_text(field: &str, value: Option<&str>, max: usize) -> Result<String, ValidationError> {
    let value = value.map(str::trim).unwrap_or_default();
    if value.is_empty() {
        return Err(required(field));
    }
    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }
    Ok(value.to_string())
}

fn optional_text(
    field: &str,
    value: Option<&str>,
    max: usize,
) -> Result<Option<String>, ValidationError> {
    value.map(|v| required_text(field, Some(v), max)).transpose()
}

fn required(field: &str) -> ValidationError {
    ValidationError::Required {
        field: field.to_string(),
    }
}

fn invalid_choice(field: &str, value: &str) -> ValidationError {
    ValidationError::InvalidChoice {
        field: field.to_string(),
        value: value.to_string(),
    }
}
