use std::path::Path;

use serde::Serialize;
use uuid::Uuid;

use crate::coerce::{parse_int, parse_percent};
use crate::config::AnalyticsConfig;
use crate::error::{IngestError, RowError};
use crate::models::{Period, PeriodValues, StudentRecord, SubjectRecord, TeacherRecord};
use crate::parse::{parse_csv_text, CanonicalRow};
use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum EntityKind {
    Students,
    Teachers,
    Subjects,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Students => "students",
            EntityKind::Teachers => "teachers",
            EntityKind::Subjects => "subjects",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportResponse {
    pub count: usize,
    pub errors: Vec<String>,
    pub success: bool,
}

impl ImportResponse {
    fn rejected(err: IngestError) -> Self {
        Self {
            count: 0,
            errors: vec![err.to_string()],
            success: false,
        }
    }
}

pub fn check_extension(path: &Path) -> Result<(), IngestError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    if extension.eq_ignore_ascii_case("csv") {
        Ok(())
    } else {
        Err(IngestError::UnsupportedFormat(
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        ))
    }
}

fn optional_int(row: &CanonicalRow, field: &str) -> Option<i64> {
    row.get(field).map(parse_int)
}

fn optional_text(row: &CanonicalRow, field: &str) -> Option<String> {
    row.get(field).map(str::to_string)
}

fn required(row: &CanonicalRow, field: &'static str) -> Result<String, RowError> {
    row.get(field)
        .map(str::to_string)
        .ok_or(RowError::MissingField(field))
}

pub fn teacher_from_row(
    row: &CanonicalRow,
    program_id: Option<Uuid>,
) -> Result<TeacherRecord, RowError> {
    let period_values = |period: Period| {
        let prefix = period.as_str();
        PeriodValues {
            failed: optional_int(row, &format!("{prefix}_Failed")),
            percent: row.get(&format!("{prefix}_Percent")).map(parse_percent),
            category: optional_text(row, &format!("{prefix}_Category")),
        }
    };

    Ok(TeacherRecord {
        faculty_no: required(row, "FacultyNo")?,
        full_name: required(row, "FacultyName")?,
        department: optional_text(row, "Department"),
        program_id,
        email: optional_text(row, "Email"),
        enrolled: optional_int(row, "EnrolledStudents"),
        periods: [
            period_values(Period::P1),
            period_values(Period::P2),
            period_values(Period::P3),
        ],
    })
}

pub fn student_from_row(
    row: &CanonicalRow,
    program_id: Option<Uuid>,
) -> Result<StudentRecord, RowError> {
    let full_name = match optional_text(row, "StudentName") {
        Some(name) => name,
        None => {
            let parts: Vec<&str> = ["FirstName", "LastName"]
                .iter()
                .filter_map(|field| row.get(field))
                .collect();
            if parts.is_empty() {
                return Err(RowError::MissingField("StudentName"));
            }
            parts.join(" ")
        }
    };

    Ok(StudentRecord {
        student_no: required(row, "StudentNo")?,
        full_name,
        program_id,
        year_level: optional_int(row, "YearLevel"),
        email: optional_text(row, "Email"),
        status: optional_text(row, "Status"),
    })
}

pub fn subject_from_row(row: &CanonicalRow) -> Result<SubjectRecord, RowError> {
    Ok(SubjectRecord {
        code: required(row, "SubjectCode")?,
        name: required(row, "SubjectName")?,
        units: optional_int(row, "Units"),
        department: optional_text(row, "Department"),
    })
}

/// Drives one upload from raw text to inserted rows.
pub struct IngestionOrchestrator<'a> {
    store: &'a dyn Store,
    config: &'a AnalyticsConfig,
}

impl<'a> IngestionOrchestrator<'a> {
    pub fn new(store: &'a dyn Store, config: &'a AnalyticsConfig) -> Self {
        Self { store, config }
    }

    pub async fn import_file(&self, kind: EntityKind, path: &Path) -> ImportResponse {
        let text = match check_extension(path).and_then(|_| Ok(std::fs::read(path)?)) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "upload rejected");
                return ImportResponse::rejected(err);
            }
        };
        self.import_text(kind, &text).await
    }

    pub async fn import_text(&self, kind: EntityKind, text: &str) -> ImportResponse {
        let rows = match parse_csv_text(text, &self.config.vocabulary) {
            Ok(rows) => rows,
            Err(err) => {
                tracing::warn!(kind = kind.as_str(), %err, "upload rejected");
                return ImportResponse::rejected(err);
            }
        };

        let mut count = 0usize;
        let mut errors = Vec::new();

        for row in &rows {
            match self.import_row(kind, row).await {
                Ok(()) => count += 1,
                // Numbered by rows inserted so far, not by source line.
                Err(err) => errors.push(format!("Row {}: {}", count + 1, err)),
            }
        }

        tracing::info!(
            kind = kind.as_str(),
            parsed = rows.len(),
            inserted = count,
            failed = errors.len(),
            "import finished"
        );

        ImportResponse {
            count,
            errors,
            success: true,
        }
    }

    async fn import_row(&self, kind: EntityKind, row: &CanonicalRow) -> Result<(), RowError> {
        match kind {
            EntityKind::Teachers => {
                let program_id = self.program_for(row).await?;
                let teacher = teacher_from_row(row, program_id)?;
                self.store.insert_teacher(&teacher).await?;
            }
            EntityKind::Students => {
                let program_id = self.program_for(row).await?;
                let student = student_from_row(row, program_id)?;
                self.store.insert_student(&student).await?;
            }
            EntityKind::Subjects => {
                let subject = subject_from_row(row)?;
                self.store.insert_subject(&subject).await?;
            }
        }
        Ok(())
    }

    async fn program_for(&self, row: &CanonicalRow) -> Result<Option<Uuid>, RowError> {
        let Some(key) = row.get("Program") else {
            return Ok(None);
        };
        let program = self.store.find_program(key).await?;
        if program.is_none() {
            tracing::warn!(program = key, "unknown program, row imported without one");
        }
        Ok(program.map(|p| p.id))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::Builder;

    use super::*;
    use crate::config::AnalyticsConfig;
    use crate::models::Zone;
    use crate::store::memory::MemoryStore;
    use crate::zone::ZoneClassifier;

    const ROSTER: &str = "FacultyNo,FacultyName,EnrolledStudents,P1_Failed,P1_Percent,P1_Category\n\
                          T001,John Smith,60,6,10.00,GREEN (0.01%-10%)\n";

    #[tokio::test]
    async fn imports_teacher_snapshot_from_roster() {
        let store = MemoryStore::new();
        let config = AnalyticsConfig::default();
        let response = IngestionOrchestrator::new(&store, &config)
            .import_text(EntityKind::Teachers, ROSTER)
            .await;

        assert_eq!(
            response,
            ImportResponse {
                count: 1,
                errors: vec![],
                success: true
            }
        );

        let teacher = &store.teachers()[0];
        assert_eq!(teacher.enrolled, Some(60));
        assert_eq!(teacher.period(Period::P1).failed, Some(6));
        assert_eq!(teacher.period(Period::P1).percent, Some(10.0));

        let resolution =
            ZoneClassifier::default().resolve(teacher.enrolled, teacher.period(Period::P1));
        assert_eq!(resolution.zone, Some(Zone::Green));
    }

    #[tokio::test]
    async fn row_failures_do_not_stop_the_batch() {
        let store = MemoryStore::new();
        let config = AnalyticsConfig::default();
        let text = "Faculty No;Teacher Name;Dept\n\
                    T001;Ana Cruz;Math\n\
                    T001;Ana Again;Math\n\
                    ;Nameless;Math\n\
                    T002;Ben Reyes;Science\n";
        let response = IngestionOrchestrator::new(&store, &config)
            .import_text(EntityKind::Teachers, text)
            .await;

        assert!(response.success);
        assert_eq!(response.count, 2);
        assert_eq!(
            response.errors,
            vec![
                "Row 2: duplicate teacher `T001`".to_string(),
                "Row 2: missing required field FacultyNo".to_string(),
            ]
        );
        assert_eq!(store.teachers()[1].department.as_deref(), Some("Science"));
    }

    #[tokio::test]
    async fn students_resolve_programs_and_split_names() {
        let store = MemoryStore::new();
        let program = store.add_program("BSIT", "Information Technology");
        let config = AnalyticsConfig::default();
        let text = "Student ID\tFirst Name\tLast Name\tCourse\tYear\n\
                    S-01\tMia\tSantos\tbsit\t2\n\
                    S-02\tLeo\tTan\tUnknown\t1\n";
        let response = IngestionOrchestrator::new(&store, &config)
            .import_text(EntityKind::Students, text)
            .await;

        assert_eq!(response.count, 2);
        let students = store.students();
        assert_eq!(students[0].full_name, "Mia Santos");
        assert_eq!(students[0].program_id, Some(program));
        assert_eq!(students[0].year_level, Some(2));
        assert_eq!(students[1].program_id, None);
    }

    #[tokio::test]
    async fn subjects_require_code_and_title() {
        let store = MemoryStore::new();
        let config = AnalyticsConfig::default();
        let text = "Subject Code,Descriptive Title,Units\nIT101,Intro to Computing,3\nIT102,,3\n";
        let response = IngestionOrchestrator::new(&store, &config)
            .import_text(EntityKind::Subjects, text)
            .await;

        assert_eq!(response.count, 1);
        assert_eq!(response.errors, vec!["Row 2: missing required field SubjectName"]);
        assert_eq!(store.subjects()[0].units, Some(3));
    }

    #[tokio::test]
    async fn malformed_upload_is_rejected_whole() {
        let store = MemoryStore::new();
        let config = AnalyticsConfig::default();
        let response = IngestionOrchestrator::new(&store, &config)
            .import_text(EntityKind::Teachers, "   \n")
            .await;

        assert!(!response.success);
        assert_eq!(response.count, 0);
        assert_eq!(response.errors.len(), 1);
        assert!(store.teachers().is_empty());
    }

    #[tokio::test]
    async fn non_csv_files_are_refused() {
        let store = MemoryStore::new();
        let config = AnalyticsConfig::default();
        let mut file = Builder::new().suffix(".xlsx").tempfile().unwrap();
        write!(file, "{ROSTER}").unwrap();

        let response = IngestionOrchestrator::new(&store, &config)
            .import_file(EntityKind::Teachers, file.path())
            .await;

        assert!(!response.success);
        assert!(response.errors[0].contains("export the spreadsheet as CSV"));
        assert!(store.teachers().is_empty());
    }

    #[tokio::test]
    async fn csv_files_are_read_from_disk() {
        let store = MemoryStore::new();
        let config = AnalyticsConfig::default();
        let mut file = Builder::new().suffix(".CSV").tempfile().unwrap();
        write!(file, "\u{feff}{ROSTER}").unwrap();

        let response = IngestionOrchestrator::new(&store, &config)
            .import_file(EntityKind::Teachers, file.path())
            .await;

        assert_eq!(response.count, 1);
        assert_eq!(store.teachers()[0].faculty_no, "T001");
    }
}
