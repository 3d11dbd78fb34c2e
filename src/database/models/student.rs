use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Student {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub gender: Option<String>,
    /// Filename in the attachment store, if the student has a picture
    pub profile_pic: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for a record that does not exist yet
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewStudent {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub gender: Option<String>,
    pub profile_pic: Option<String>,
}

impl NewStudent {
    pub fn into_student(self, id: Uuid, now: DateTime<Utc>) -> Student {
        Student {
            id,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            phone: self.phone,
            gender: self.gender,
            profile_pic: self.profile_pic,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update. `None` leaves the stored value untouched; there is no way
/// to clear a picture reference through an update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StudentChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub gender: Option<String>,
    pub profile_pic: Option<String>,
}

impl StudentChanges {
    pub fn apply_to(self, student: &mut Student, now: DateTime<Utc>) {
        if let Some(v) = self.first_name {
            student.first_name = v;
        }
        if let Some(v) = self.last_name {
            student.last_name = v;
        }
        if let Some(v) = self.email {
            student.email = v;
        }
        if let Some(v) = self.phone {
            student.phone = Some(v);
        }
        if let Some(v) = self.gender {
            student.gender = Some(v);
        }
        if let Some(v) = self.profile_pic {
            student.profile_pic = Some(v);
        }
        student.updated_at = now;
    }
}
