use std::sync::Arc;

use axum::extract::{Extension, Query};
use serde::Deserialize;

use crate::database::models::Student;
use crate::error::ApiError;
use crate::filter::{StudentFilter, StudentPage};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::StudentService;

use super::upload::StudentUpload;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Case-insensitive match against first or last name
    pub search: Option<String>,
    /// 1-indexed page number; anything unparseable reads as 1
    pub page: Option<String>,
    /// Page size; anything unparseable reads as the default (3)
    pub limit: Option<String>,
}

/// GET /api/students - List students, optionally filtered by name
pub async fn get(
    Query(query): Query<ListQuery>,
    Extension(service): Extension<Arc<StudentService>>,
) -> ApiResult<StudentPage> {
    let filter = StudentFilter::new(query.search.as_deref());
    let page = service.page_request(query.page.as_deref(), query.limit.as_deref());

    let result = service.list(&filter, page).await?;
    Ok(ApiResponse::success(result))
}

/// POST /api/students - Create a student, with an optional `profile_pic` upload
pub async fn post(
    Extension(service): Extension<Arc<StudentService>>,
    Extension(auth_user): Extension<AuthUser>,
    upload: StudentUpload,
) -> ApiResult<Student> {
    tracing::debug!(subject = %auth_user.subject, has_file = upload.file.is_some(), "create student");

    let student = service
        .create(upload.form, upload.file)
        .await
        .map_err(ApiError::from_write_failure)?;
    Ok(ApiResponse::created(student))
}
