//! Multipart form extraction for member create and update requests.

use axum::extract::Multipart;

use crate::errors::AppError;
use crate::models::MemberForm;

/// Name of the file field carrying the photo.
const PHOTO_FIELD: &str = "photo";

/// Read every field of a multipart body into a [`MemberForm`].
pub async fn read_member_form(mut multipart: Multipart) -> Result<MemberForm, AppError> {
    let mut form = MemberForm::default();

    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if name == PHOTO_FIELD {
            let file_name = field.file_name().map(str::to_string);
            let content_type = field.content_type().map(str::to_string);
            let bytes = field.bytes().await?;
            form.set_photo(file_name.as_deref(), content_type.as_deref(), bytes);
        } else {
            let value = field.text().await?;
            form.set_text(&name, value);
        }
    }

    Ok(form)
}

/// Parse the `{id}` path segment.
pub fn parse_member_id(raw: &str) -> Result<i64, AppError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| AppError::Validation("Invalid member ID".to_string()))
}
