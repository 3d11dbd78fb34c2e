use std::sync::Arc;

use axum::extract::{Extension, Path};
use serde_json::{json, Value};

use crate::database::models::Student;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::StudentService;

use super::upload::StudentUpload;

/// GET /api/students/:id - Get a single student by ID
pub async fn get(
    Path(id): Path<String>,
    Extension(service): Extension<Arc<StudentService>>,
) -> ApiResult<Student> {
    let id = StudentService::parse_id(&id)?;
    let student = service.get(id).await?;
    Ok(ApiResponse::success(student))
}

/// PUT /api/students/:id - Update named fields; a new `profile_pic` replaces the old one
pub async fn put(
    Path(id): Path<String>,
    Extension(service): Extension<Arc<StudentService>>,
    Extension(auth_user): Extension<AuthUser>,
    upload: StudentUpload,
) -> ApiResult<Student> {
    let id = StudentService::parse_id(&id)?;
    tracing::debug!(subject = %auth_user.subject, student_id = %id, has_file = upload.file.is_some(), "update student");

    let student = service
        .update(id, upload.form, upload.file)
        .await
        .map_err(ApiError::from_write_failure)?;
    Ok(ApiResponse::success(student))
}

/// DELETE /api/students/:id - Delete a student and its picture
pub async fn delete(
    Path(id): Path<String>,
    Extension(service): Extension<Arc<StudentService>>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<Value> {
    let id = StudentService::parse_id(&id)?;
    tracing::debug!(subject = %auth_user.subject, student_id = %id, "delete student");

    service.delete(id).await?;
    Ok(ApiResponse::success(json!({ "message": "Student deleted successfully" })))
}
