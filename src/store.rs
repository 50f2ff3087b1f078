use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{GradeRow, GradeScope, ProgramRef, StudentRecord, SubjectRecord, TeacherRecord};

/// Filtered-read and row-insert primitives over the persistent store.
#[async_trait]
pub trait Store: Send + Sync {
    async fn insert_teacher(&self, teacher: &TeacherRecord) -> Result<(), StoreError>;

    async fn insert_student(&self, student: &StudentRecord) -> Result<(), StoreError>;

    async fn insert_subject(&self, subject: &SubjectRecord) -> Result<(), StoreError>;

    /// Looks a program up by code or name, case-insensitively.
    async fn find_program(&self, key: &str) -> Result<Option<ProgramRef>, StoreError>;

    async fn program_by_id(&self, id: Uuid) -> Result<Option<ProgramRef>, StoreError>;

    async fn find_teacher(&self, faculty_no: &str) -> Result<Option<TeacherRecord>, StoreError>;

    async fn fetch_teachers(
        &self,
        program_id: Option<Uuid>,
    ) -> Result<Vec<TeacherRecord>, StoreError>;

    async fn fetch_grades(&self, scope: &GradeScope) -> Result<Vec<GradeRow>, StoreError>;
}
