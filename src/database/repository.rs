use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use crate::database::manager::{DatabaseError, DatabaseManager};
use crate::database::models::{NewStudent, Student, StudentChanges};
use crate::filter::{Page, PageRequest, StudentFilter};

/// Durable CRUD over student records. No business rules live here.
#[async_trait]
pub trait StudentRepository: Send + Sync {
    async fn create(&self, student: NewStudent) -> Result<Student, DatabaseError>;

    /// `DatabaseError::NotFound` when no record has this id
    async fn find_by_id(&self, id: Uuid) -> Result<Student, DatabaseError>;

    async fn find_page(&self, filter: &StudentFilter, page: PageRequest) -> Result<Page<Student>, DatabaseError>;

    /// Apply a partial update and return the stored result
    async fn update(&self, id: Uuid, changes: StudentChanges) -> Result<Student, DatabaseError>;

    async fn delete(&self, id: Uuid) -> Result<(), DatabaseError>;

    async fn health_check(&self) -> Result<(), DatabaseError>;
}

fn not_found(id: Uuid) -> DatabaseError {
    DatabaseError::NotFound(format!("student {} not found", id))
}

const COLUMNS: &str =
    "id, first_name, last_name, email, phone, gender, profile_pic, created_at, updated_at";

const NAME_MATCH: &str = "($1::text IS NULL OR first_name ILIKE $1 OR last_name ILIKE $1)";

/// Postgres-backed repository over the `students` table
#[derive(Clone)]
pub struct PgStudentRepository {
    pool: PgPool,
}

impl PgStudentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StudentRepository for PgStudentRepository {
    async fn create(&self, student: NewStudent) -> Result<Student, DatabaseError> {
        let sql = format!(
            "INSERT INTO students (id, first_name, last_name, email, phone, gender, profile_pic, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
             RETURNING {}",
            COLUMNS
        );
        let row = sqlx::query_as::<_, Student>(&sql)
            .bind(Uuid::new_v4())
            .bind(&student.first_name)
            .bind(&student.last_name)
            .bind(&student.email)
            .bind(&student.phone)
            .bind(&student.gender)
            .bind(&student.profile_pic)
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await?;
        Ok(row)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Student, DatabaseError> {
        let sql = format!("SELECT {} FROM students WHERE id = $1", COLUMNS);
        sqlx::query_as::<_, Student>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| not_found(id))
    }

    async fn find_page(&self, filter: &StudentFilter, page: PageRequest) -> Result<Page<Student>, DatabaseError> {
        let pattern = filter.like_pattern();

        let sql = format!(
            "SELECT {} FROM students WHERE {} ORDER BY created_at, id LIMIT $2 OFFSET $3",
            COLUMNS, NAME_MATCH
        );
        let items = sqlx::query_as::<_, Student>(&sql)
            .bind(&pattern)
            .bind(page.limit)
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?;

        let count_sql = format!("SELECT COUNT(*) FROM students WHERE {}", NAME_MATCH);
        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(&pattern)
            .fetch_one(&self.pool)
            .await?;

        Ok(Page { items, total })
    }

    async fn update(&self, id: Uuid, changes: StudentChanges) -> Result<Student, DatabaseError> {
        let mut qb = sqlx::QueryBuilder::<Postgres>::new("UPDATE students SET updated_at = ");
        qb.push_bind(Utc::now());

        let columns = [
            ("first_name", changes.first_name),
            ("last_name", changes.last_name),
            ("email", changes.email),
            ("phone", changes.phone),
            ("gender", changes.gender),
            ("profile_pic", changes.profile_pic),
        ];
        for (column, value) in columns {
            if let Some(value) = value {
                qb.push(", ").push(column).push(" = ").push_bind(value);
            }
        }

        qb.push(" WHERE id = ").push_bind(id);
        qb.push(" RETURNING ").push(COLUMNS);

        qb.build_query_as::<Student>()
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| not_found(id))
    }

    async fn delete(&self, id: Uuid) -> Result<(), DatabaseError> {
        let result = sqlx::query("DELETE FROM students WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(not_found(id));
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        DatabaseManager::health_check(&self.pool).await
    }
}
