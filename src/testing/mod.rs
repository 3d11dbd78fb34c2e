use std::sync::Arc;

use tempfile::TempDir;

use crate::database::MemoryStudentRepository;
use crate::services::{StudentForm, StudentService};
use crate::storage::{AttachmentStore, UploadedFile};

/// Service wired to an in-memory repository and a throwaway uploads directory
pub struct TestContext {
    pub service: StudentService,
    pub repository: Arc<MemoryStudentRepository>,
    uploads: TempDir,
}

impl TestContext {
    pub async fn new() -> Self {
        let uploads = TempDir::new().expect("temp dir");
        let store = AttachmentStore::open(uploads.path(), 3 * 1024 * 1024)
            .await
            .expect("attachment store");
        let repository = Arc::new(MemoryStudentRepository::new());
        let service = StudentService::new(repository.clone(), store);
        Self {
            service,
            repository,
            uploads,
        }
    }

    pub async fn file_exists(&self, filename: &str) -> bool {
        tokio::fs::try_exists(self.uploads.path().join(filename))
            .await
            .unwrap_or(false)
    }

    pub async fn read_file(&self, filename: &str) -> Vec<u8> {
        tokio::fs::read(self.uploads.path().join(filename))
            .await
            .expect("stored file")
    }

    /// Number of files currently in the uploads directory
    pub async fn stored_files(&self) -> usize {
        let mut count = 0;
        let mut entries = tokio::fs::read_dir(self.uploads.path()).await.expect("read dir");
        while let Some(_) = entries.next_entry().await.expect("dir entry") {
            count += 1;
        }
        count
    }
}

pub fn form(first: &str, last: &str) -> StudentForm {
    StudentForm {
        first_name: Some(first.to_string()),
        last_name: Some(last.to_string()),
        email: Some(format!("{}.{}@example.com", first, last).to_lowercase()),
        phone: None,
        gender: None,
    }
}

pub fn png(size: usize) -> UploadedFile {
    UploadedFile::new(Some("avatar.png".to_string()), Some("image/png".to_string()), vec![0u8; size])
}

pub fn jpeg(size: usize) -> UploadedFile {
    UploadedFile::new(Some("avatar.jpg".to_string()), Some("image/jpeg".to_string()), vec![1u8; size])
}
