//! Team member model and the validated inputs that create or change one.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// A member of the governing body as shown on the public site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamMember {
    pub id: i64,
    pub name: String,
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub term: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// An uploaded image file.
#[derive(Debug, Clone)]
pub struct PhotoUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

/// Raw fields of a create or update form, before validation.
///
/// Text values are trimmed; empty strings and empty files count as absent.
#[derive(Debug, Clone, Default)]
pub struct MemberForm {
    pub name: Option<String>,
    pub role: Option<String>,
    pub category: Option<String>,
    pub term: Option<String>,
    pub description: Option<String>,
    pub photo: Option<PhotoUpload>,
}

impl MemberForm {
    /// Store a text field by name. Unknown names are ignored.
    pub fn set_text(&mut self, field: &str, value: String) {
        let value = non_empty(value);
        match field {
            "name" => self.name = value,
            "role" => self.role = value,
            "category" => self.category = value,
            "term" => self.term = value,
            "description" => self.description = value,
            _ => tracing::debug!(field, "Ignoring unknown form field"),
        }
    }

    /// Store the photo file, dropping uploads without a name or content.
    pub fn set_photo(&mut self, file_name: Option<&str>, content_type: Option<&str>, bytes: Bytes) {
        self.photo = match file_name.map(str::trim) {
            Some(name) if !name.is_empty() && !bytes.is_empty() => Some(PhotoUpload {
                file_name: name.to_string(),
                content_type: content_type.map(str::to_string),
                bytes,
            }),
            _ => None,
        };
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Fields of a member about to be created. `name`, `role` and a photo are mandatory.
#[derive(Debug, Clone)]
pub struct NewMember {
    pub name: String,
    pub role: String,
    pub category: Option<String>,
    pub term: Option<String>,
    pub description: Option<String>,
    pub photo: PhotoUpload,
}

impl TryFrom<MemberForm> for NewMember {
    type Error = AppError;

    fn try_from(form: MemberForm) -> Result<Self, Self::Error> {
        let mut missing = Vec::new();
        if form.name.is_none() {
            missing.push("Name");
        }
        if form.role.is_none() {
            missing.push("Role");
        }
        if form.photo.is_none() {
            missing.push("Photo");
        }

        match (form.name, form.role, form.photo) {
            (Some(name), Some(role), Some(photo)) => Ok(NewMember {
                name,
                role,
                category: form.category,
                term: form.term,
                description: form.description,
                photo,
            }),
            _ => Err(AppError::Validation(format!(
                "Missing required fields: {}",
                missing.join(", ")
            ))),
        }
    }
}

/// Row values handed to the resource store on insert.
#[derive(Debug, Clone)]
pub struct MemberRecord {
    pub name: String,
    pub role: String,
    pub category: Option<String>,
    pub term: Option<String>,
    pub description: Option<String>,
    pub photo_url: Option<String>,
}

/// Partial update. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemberPatch {
    pub name: Option<String>,
    pub role: Option<String>,
    pub category: Option<String>,
    pub term: Option<String>,
    pub description: Option<String>,
    pub photo_url: Option<String>,
}

impl MemberPatch {
    pub fn is_empty(&self) -> bool {
        *self == MemberPatch::default()
    }
}

/// A validated update: changed text fields plus an optional replacement photo.
#[derive(Debug, Clone, Default)]
pub struct MemberUpdate {
    pub patch: MemberPatch,
    pub photo: Option<PhotoUpload>,
}

impl From<MemberForm> for MemberUpdate {
    fn from(form: MemberForm) -> Self {
        MemberUpdate {
            patch: MemberPatch {
                name: form.name,
                role: form.role,
                category: form.category,
                term: form.term,
                description: form.description,
                photo_url: None,
            },
            photo: form.photo,
        }
    }
}
