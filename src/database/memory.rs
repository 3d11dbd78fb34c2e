use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::models::{NewStudent, Student, StudentChanges};
use crate::database::repository::StudentRepository;
use crate::filter::{Page, PageRequest, StudentFilter};

/// In-process [`StudentRepository`] kept in insertion order.
///
/// Used by the test suites and by `serve --memory`. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStudentRepository {
    rows: RwLock<Vec<Student>>,
}

impl MemoryStudentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }
}

fn not_found(id: Uuid) -> DatabaseError {
    DatabaseError::NotFound(format!("student {} not found", id))
}

#[async_trait]
impl StudentRepository for MemoryStudentRepository {
    async fn create(&self, student: NewStudent) -> Result<Student, DatabaseError> {
        let record = student.into_student(Uuid::new_v4(), Utc::now());
        self.rows.write().await.push(record.clone());
        Ok(record)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Student, DatabaseError> {
        self.rows
            .read()
            .await
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or_else(|| not_found(id))
    }

    async fn find_page(&self, filter: &StudentFilter, page: PageRequest) -> Result<Page<Student>, DatabaseError> {
        let rows = self.rows.read().await;
        let matching: Vec<&Student> = rows.iter().filter(|s| filter.matches(s)).collect();
        let items = matching
            .iter()
            .skip(page.offset() as usize)
            .take(page.limit as usize)
            .map(|s| (*s).clone())
            .collect();
        Ok(Page {
            items,
            total: matching.len() as i64,
        })
    }

    async fn update(&self, id: Uuid, changes: StudentChanges) -> Result<Student, DatabaseError> {
        let mut rows = self.rows.write().await;
        let record = rows.iter_mut().find(|s| s.id == id).ok_or_else(|| not_found(id))?;
        changes.apply_to(record, Utc::now());
        Ok(record.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<(), DatabaseError> {
        let mut rows = self.rows.write().await;
        let index = rows.iter().position(|s| s.id == id).ok_or_else(|| not_found(id))?;
        rows.remove(index);
        Ok(())
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        Ok(())
    }
}
