use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::DEFAULT_PAGE_SIZE;
use crate::database::models::{NewStudent, Student, StudentChanges};
use crate::database::{DatabaseError, StudentRepository};
use crate::filter::{PageRequest, StudentFilter, StudentPage};
use crate::storage::{AttachmentError, AttachmentStore, UploadedFile};

#[derive(Debug, Error)]
pub enum StudentError {
    #[error("Student validation failed")]
    InvalidFields(HashMap<String, String>),

    #[error("Student not found")]
    NotFound,

    #[error(transparent)]
    Attachment(#[from] AttachmentError),

    #[error(transparent)]
    Database(DatabaseError),
}

impl From<DatabaseError> for StudentError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound(_) => StudentError::NotFound,
            other => StudentError::Database(other),
        }
    }
}

/// Text fields as submitted by a client. Everything is optional here;
/// what is required depends on whether we create or update.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StudentForm {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub gender: Option<String>,
}

const REQUIRED_FIELDS: [&str; 3] = ["first_name", "last_name", "email"];

impl StudentForm {
    fn required(&self) -> [(&'static str, Option<&str>); 3] {
        [
            (REQUIRED_FIELDS[0], self.first_name.as_deref()),
            (REQUIRED_FIELDS[1], self.last_name.as_deref()),
            (REQUIRED_FIELDS[2], self.email.as_deref()),
        ]
    }

    /// All required fields present and non-blank
    pub fn into_new_student(self) -> Result<NewStudent, StudentError> {
        let mut errors = HashMap::new();
        for (field, value) in self.required() {
            if value.map_or(true, |v| v.trim().is_empty()) {
                errors.insert(field.to_string(), "This field is required".to_string());
            }
        }
        if !errors.is_empty() {
            return Err(StudentError::InvalidFields(errors));
        }

        Ok(NewStudent {
            first_name: self.first_name.unwrap_or_default(),
            last_name: self.last_name.unwrap_or_default(),
            email: self.email.unwrap_or_default(),
            phone: self.phone,
            gender: self.gender,
            profile_pic: None,
        })
    }

    /// Supplied required fields must not be blank; omitted ones stay as stored
    pub fn into_changes(self) -> Result<StudentChanges, StudentError> {
        let mut errors = HashMap::new();
        for (field, value) in self.required() {
            if value.is_some_and(|v| v.trim().is_empty()) {
                errors.insert(field.to_string(), "This field cannot be blank".to_string());
            }
        }
        if !errors.is_empty() {
            return Err(StudentError::InvalidFields(errors));
        }

        Ok(StudentChanges {
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            phone: self.phone,
            gender: self.gender,
            profile_pic: None,
        })
    }
}

/// Keeps student records and their profile pictures consistent.
///
/// Files and rows are written in two separate steps with a fixed order per
/// operation; there is no transaction spanning both:
///
/// - create: save file, then insert row. A failed insert orphans the file.
/// - update: save new file, drop the old one, then update row. A failed
///   update orphans the new file and leaves a dangling reference.
/// - delete: drop file, then delete row.
///
/// Concurrent updates of one record are not serialized; the last row write
/// wins and the losing upload is orphaned.
pub struct StudentService {
    repository: Arc<dyn StudentRepository>,
    attachments: AttachmentStore,
    default_page_size: i64,
    max_page_size: Option<i64>,
}

impl StudentService {
    pub fn new(repository: Arc<dyn StudentRepository>, attachments: AttachmentStore) -> Self {
        Self {
            repository,
            attachments,
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: None,
        }
    }

    pub fn with_page_limits(mut self, default_page_size: i64, max_page_size: Option<i64>) -> Self {
        self.default_page_size = default_page_size.max(1);
        self.max_page_size = max_page_size;
        self
    }

    pub fn attachments(&self) -> &AttachmentStore {
        &self.attachments
    }

    /// Identifiers that are not UUIDs cannot name a record
    pub fn parse_id(raw: &str) -> Result<Uuid, StudentError> {
        Uuid::parse_str(raw.trim()).map_err(|_| StudentError::NotFound)
    }

    pub fn page_request(&self, page: Option<&str>, limit: Option<&str>) -> PageRequest {
        PageRequest::from_query(page, limit, self.default_page_size, self.max_page_size)
    }

    pub async fn create(&self, form: StudentForm, file: Option<UploadedFile>) -> Result<Student, StudentError> {
        let mut student = form.into_new_student()?;

        if let Some(file) = &file {
            student.profile_pic = Some(self.attachments.save(file).await?);
        }

        match self.repository.create(student.clone()).await {
            Ok(created) => {
                info!(student_id = %created.id, profile_pic = ?created.profile_pic, "student created");
                Ok(created)
            }
            Err(e) => {
                if let Some(filename) = &student.profile_pic {
                    warn!(filename = %filename, error = %e, "student insert failed, uploaded picture left orphaned");
                }
                Err(e.into())
            }
        }
    }

    pub async fn get(&self, id: Uuid) -> Result<Student, StudentError> {
        Ok(self.repository.find_by_id(id).await?)
    }

    pub async fn list(&self, filter: &StudentFilter, page: PageRequest) -> Result<StudentPage, StudentError> {
        let result = self.repository.find_page(filter, page).await?;
        Ok(StudentPage {
            total_pages: page.total_pages(result.total),
            students: result.items,
        })
    }

    pub async fn update(
        &self,
        id: Uuid,
        form: StudentForm,
        file: Option<UploadedFile>,
    ) -> Result<Student, StudentError> {
        let existing = self.repository.find_by_id(id).await?;
        let mut changes = form.into_changes()?;

        if let Some(file) = &file {
            let filename = self
                .attachments
                .replace(existing.profile_pic.as_deref(), file)
                .await?;
            changes.profile_pic = Some(filename);
        }

        let new_pic = changes.profile_pic.clone();
        match self.repository.update(id, changes).await {
            Ok(updated) => {
                info!(student_id = %id, replaced_pic = new_pic.is_some(), "student updated");
                Ok(updated)
            }
            Err(e) => {
                if let Some(filename) = &new_pic {
                    warn!(student_id = %id, filename = %filename, error = %e, "student update failed, uploaded picture left orphaned");
                }
                Err(e.into())
            }
        }
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), StudentError> {
        let existing = self.repository.find_by_id(id).await?;

        if let Some(filename) = &existing.profile_pic {
            self.attachments.delete_quietly(filename).await;
        }

        self.repository.delete(id).await?;
        info!(student_id = %id, "student deleted");
        Ok(())
    }

    pub async fn health_check(&self) -> Result<(), StudentError> {
        Ok(self.repository.health_check().await?)
    }
}
