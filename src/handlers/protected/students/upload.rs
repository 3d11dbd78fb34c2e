use axum::{
    async_trait,
    extract::{FromRequest, Multipart, Request},
    http::header::CONTENT_TYPE,
    Form, Json,
};

use crate::error::ApiError;
use crate::services::StudentForm;
use crate::storage::UploadedFile;

/// Multipart field carrying the profile picture
pub const PICTURE_FIELD: &str = "profile_pic";

/// Student fields plus an optional picture, read from the request body.
///
/// Accepts `multipart/form-data` (the only way to send a picture), JSON and
/// URL-encoded forms. A request with no body reads as an empty form.
#[derive(Debug, Default)]
pub struct StudentUpload {
    pub form: StudentForm,
    pub file: Option<UploadedFile>,
}

#[async_trait]
impl<S> FromRequest<S> for StudentUpload
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();

        if content_type.starts_with("multipart/form-data") {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| ApiError::bad_request(e.body_text()))?;
            return read_multipart(multipart).await;
        }

        if content_type.starts_with("application/json") {
            let Json(form) = Json::<StudentForm>::from_request(req, state)
                .await
                .map_err(|e| ApiError::invalid_json(e.body_text()))?;
            return Ok(Self { form, file: None });
        }

        if content_type.starts_with("application/x-www-form-urlencoded") {
            let Form(form) = Form::<StudentForm>::from_request(req, state)
                .await
                .map_err(|e| ApiError::bad_request(e.body_text()))?;
            return Ok(Self { form, file: None });
        }

        if content_type.is_empty() {
            return Ok(Self::default());
        }

        Err(ApiError::bad_request(format!(
            "Unsupported content type '{}'; send multipart/form-data, JSON or a URL-encoded form",
            content_type
        )))
    }
}

async fn read_multipart(mut multipart: Multipart) -> Result<StudentUpload, ApiError> {
    let mut upload = StudentUpload::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            PICTURE_FIELD => {
                let original_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let data = field.bytes().await?;
                // Browsers submit an empty part for an untouched file input
                if original_name.as_deref().map_or(true, str::is_empty) && data.is_empty() {
                    continue;
                }
                upload.file = Some(UploadedFile::new(original_name, content_type, data.to_vec()));
            }
            "first_name" => upload.form.first_name = Some(field.text().await?),
            "last_name" => upload.form.last_name = Some(field.text().await?),
            "email" => upload.form.email = Some(field.text().await?),
            "phone" => upload.form.phone = Some(field.text().await?),
            "gender" => upload.form.gender = Some(field.text().await?),
            other => tracing::debug!("Ignoring unexpected multipart field '{}'", other),
        }
    }

    Ok(upload)
}
