//! Field-level checks for everything a user can submit.
use serde::Serialize;
use std::path::Path;
use thiserror::Error;

use crate::models::{ContactMessage, ProfileUpdate};

pub const TITLE_MAX_LEN: usize = 255;
pub const SUBJECT_MAX_LEN: usize = 255;
pub const THUMBNAIL_MAX_BYTES: usize = 5000 * 1024;
pub const THUMBNAIL_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self { field, message: message.into() }
    }
}

#[derive(Error, Serialize, Debug, Clone, Default, PartialEq, Eq)]
#[error("{} invalid field(s)", .0.len())]
#[serde(transparent)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn push(&mut self, error: FieldError) {
        self.0.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.0.iter()
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }

    pub fn merge(&mut self, other: ValidationErrors) {
        self.0.extend(other.0);
    }

    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl From<FieldError> for ValidationErrors {
    fn from(error: FieldError) -> Self {
        ValidationErrors(vec![error])
    }
}

/// Checks the text fields of a website submission.
pub fn validate_submission(title: &str, url: &str, description: &str) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();

    let title = title.trim();
    if title.is_empty() {
        errors.push(FieldError::new("title", "This field is required."));
    } else if title.chars().count() > TITLE_MAX_LEN {
        errors.push(FieldError::new("title", "The title should not exceed 255 characters."));
    }

    if let Err(e) = validate_url("url", url.trim()) {
        errors.push(e);
    }

    if description.trim().is_empty() {
        errors.push(FieldError::new("description", "This field is required."));
    }

    errors.into_result()
}

pub fn validate_url(field: &'static str, url: &str) -> Result<(), FieldError> {
    if url.is_empty() {
        return Err(FieldError::new(field, "This field is required."));
    }
    let rest = url
        .strip_prefix("http://")
        .or_else(|| url.strip_prefix("https://"))
        .ok_or_else(|| FieldError::new(field, "The URL must start with 'http://' or 'https://'"))?;

    let host = rest
        .split(|c| c == '/' || c == '?' || c == '#')
        .next()
        .unwrap_or_default();
    if host.is_empty() || host.chars().any(char::is_whitespace) {
        return Err(FieldError::new(field, "The URL must be a valid URL."));
    }
    Ok(())
}

/// Checks an uploaded thumbnail by name and size only; content is not sniffed.
pub fn validate_thumbnail(file_name: &str, size: usize) -> Result<(), ValidationErrors> {
    if size > THUMBNAIL_MAX_BYTES {
        return Err(FieldError::new("file", "File size cannot exceed 5 MB.").into());
    }
    match thumbnail_extension(file_name) {
        Some(_) => Ok(()),
        None => Err(FieldError::new("file", "Only .jpg, .jpeg, .png, .webp files are allowed.").into()),
    }
}

/// The lowercased extension of `file_name` if it is an accepted image type.
pub fn thumbnail_extension(file_name: &str) -> Option<String> {
    let ext = Path::new(file_name).extension()?.to_str()?.to_ascii_lowercase();
    THUMBNAIL_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

pub fn validate_profile(update: &ProfileUpdate) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    let links = [
        ("github", &update.github),
        ("linkedin", &update.linkedin),
        ("twitter", &update.twitter),
        ("facebook", &update.facebook),
        ("instagram", &update.instagram),
    ];
    for (field, value) in links {
        if let Some(value) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
            if let Err(e) = validate_url(field, value) {
                errors.push(e);
            }
        }
    }
    if update.profession.as_deref().is_some_and(|p| p.chars().count() > 255) {
        errors.push(FieldError::new("profession", "Ensure this value has at most 255 characters."));
    }
    if update.contact_info.as_deref().is_some_and(|c| c.chars().count() > 255) {
        errors.push(FieldError::new("contact_info", "Ensure this value has at most 255 characters."));
    }
    errors.into_result()
}

pub fn validate_contact(message: &ContactMessage) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();

    if !is_valid_email(message.email.trim()) {
        errors.push(FieldError::new("email", "Please enter a valid email address."));
    }

    let subject = message.subject.trim();
    if subject.is_empty() {
        errors.push(FieldError::new("subject", "Subject is required."));
    } else if subject.chars().count() > SUBJECT_MAX_LEN {
        errors.push(FieldError::new("subject", "Subject must not exceed 255 characters."));
    }

    if message.message.trim().is_empty() {
        errors.push(FieldError::new("message", "Message cannot be empty."));
    }

    errors.into_result()
}

fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !email.chars().any(char::is_whitespace)
        && !domain.contains('@')
        && domain.split('.').count() >= 2
        && domain.split('.').all(|label| !label.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MB: usize = 1024 * 1024;

    #[test]
    fn thumbnail_size_and_type() {
        assert!(validate_thumbnail("shot.png", 6 * MB).unwrap_err().has_field("file"));
        assert!(validate_thumbnail("anim.gif", 1024).is_err());
        assert!(validate_thumbnail("shot.png", 4 * MB).is_ok());
        assert!(validate_thumbnail("SHOT.JPEG", 10).is_ok());
        assert!(validate_thumbnail("noextension", 10).is_err());
    }

    #[test]
    fn submission_requires_scheme_and_host() {
        assert!(validate_submission("Site", "https://example.com/a", "desc").is_ok());

        let errors = validate_submission("Site", "example.com", "desc").unwrap_err();
        assert_eq!(
            errors.iter().next().unwrap().message,
            "The URL must start with 'http://' or 'https://'"
        );
        assert!(validate_submission("Site", "https:///path", "desc").unwrap_err().has_field("url"));
    }

    #[test]
    fn submission_title_limit() {
        let long = "x".repeat(256);
        let errors = validate_submission(&long, "http://a.io", "").unwrap_err();
        assert!(errors.has_field("title"));
        assert!(errors.has_field("description"));
        assert!(validate_submission(&"x".repeat(255), "http://a.io", "d").is_ok());
    }

    #[test]
    fn profile_links_must_be_urls() {
        let update = ProfileUpdate {
            github: Some("github.com/someone".into()),
            twitter: Some("".into()),
            ..Default::default()
        };
        let errors = validate_profile(&update).unwrap_err();
        assert!(errors.has_field("github"));
        assert!(!errors.has_field("twitter"));
    }

    #[test]
    fn contact_checks() {
        let ok = ContactMessage {
            email: "someone@example.com".into(),
            subject: "Hi".into(),
            message: "Hello".into(),
        };
        assert!(validate_contact(&ok).is_ok());

        let bad = ContactMessage {
            email: "someone@localhost".into(),
            subject: " ".into(),
            message: "".into(),
        };
        let errors = validate_contact(&bad).unwrap_err();
        assert!(errors.has_field("email"));
        assert!(errors.has_field("subject"));
        assert!(errors.has_field("message"));
    }
}
