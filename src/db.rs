use anyhow::Context;
use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use uuid::Uuid;

use crate::config::Settings;
use crate::error::StoreError;
use crate::models::{
    GradeRow, GradeScope, GradeStatus, PeriodValues, ProgramRef, StudentRecord, SubjectRecord,
    TeacherRecord,
};
use crate::store::Store;

pub async fn connect(settings: &Settings) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .connect(&settings.database_url)
        .await
        .context("failed to connect to Postgres")
}

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

fn insert_error(err: sqlx::Error, entity: &'static str, key: &str) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return StoreError::Duplicate {
                entity,
                key: key.to_string(),
            };
        }
    }
    StoreError::Database(err)
}

const TEACHER_SELECT: &str = "SELECT faculty_no, full_name, department, program_id, email, \
     enrolled_students, \
     p1_failed, p1_percent, p1_category, \
     p2_failed, p2_percent, p2_category, \
     p3_failed, p3_percent, p3_category \
     FROM faculty_risk.teachers";

fn teacher_from_row(row: &PgRow) -> Result<TeacherRecord, sqlx::Error> {
    let period = |n: u8| -> Result<PeriodValues, sqlx::Error> {
        Ok(PeriodValues {
            failed: row.try_get(format!("p{n}_failed").as_str())?,
            percent: row.try_get(format!("p{n}_percent").as_str())?,
            category: row.try_get(format!("p{n}_category").as_str())?,
        })
    };

    Ok(TeacherRecord {
        faculty_no: row.try_get("faculty_no")?,
        full_name: row.try_get("full_name")?,
        department: row.try_get("department")?,
        program_id: row.try_get("program_id")?,
        email: row.try_get("email")?,
        enrolled: row.try_get("enrolled_students")?,
        periods: [period(1)?, period(2)?, period(3)?],
    })
}

fn grade_from_row(row: &PgRow) -> Result<GradeRow, sqlx::Error> {
    let period: Option<String> = row.try_get("period")?;
    let status: String = row.try_get("status")?;

    Ok(GradeRow {
        faculty_no: row.try_get("faculty_no")?,
        department: row.try_get("department")?,
        student_no: row.try_get("student_no")?,
        period: period.and_then(|p| p.parse().ok()),
        status: GradeStatus::from_text(&status),
        created_at: row.try_get("created_at")?,
    })
}

fn program_from_row(row: &PgRow) -> Result<ProgramRef, sqlx::Error> {
    Ok(ProgramRef {
        id: row.try_get("id")?,
        code: row.try_get("code")?,
        name: row.try_get("name")?,
    })
}

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn insert_teacher(&self, teacher: &TeacherRecord) -> Result<(), StoreError> {
        let [p1, p2, p3] = &teacher.periods;
        sqlx::query(
            r#"
            INSERT INTO faculty_risk.teachers
            (id, faculty_no, full_name, department, program_id, email, enrolled_students,
             p1_failed, p1_percent, p1_category,
             p2_failed, p2_percent, p2_category,
             p3_failed, p3_percent, p3_category)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&teacher.faculty_no)
        .bind(&teacher.full_name)
        .bind(&teacher.department)
        .bind(teacher.program_id)
        .bind(&teacher.email)
        .bind(teacher.enrolled)
        .bind(p1.failed)
        .bind(p1.percent)
        .bind(&p1.category)
        .bind(p2.failed)
        .bind(p2.percent)
        .bind(&p2.category)
        .bind(p3.failed)
        .bind(p3.percent)
        .bind(&p3.category)
        .execute(&self.pool)
        .await
        .map_err(|err| insert_error(err, "teacher", &teacher.faculty_no))?;
        Ok(())
    }

    async fn insert_student(&self, student: &StudentRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO faculty_risk.students
            (id, student_no, full_name, program_id, year_level, email, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&student.student_no)
        .bind(&student.full_name)
        .bind(student.program_id)
        .bind(student.year_level)
        .bind(&student.email)
        .bind(&student.status)
        .execute(&self.pool)
        .await
        .map_err(|err| insert_error(err, "student", &student.student_no))?;
        Ok(())
    }

    async fn insert_subject(&self, subject: &SubjectRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO faculty_risk.subjects (id, code, name, units, department)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&subject.code)
        .bind(&subject.name)
        .bind(subject.units)
        .bind(&subject.department)
        .execute(&self.pool)
        .await
        .map_err(|err| insert_error(err, "subject", &subject.code))?;
        Ok(())
    }

    async fn find_program(&self, key: &str) -> Result<Option<ProgramRef>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, code, name FROM faculty_risk.programs
            WHERE lower(code) = lower($1) OR lower(name) = lower($1)
            ORDER BY code
            LIMIT 1
            "#,
        )
        .bind(key.trim())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(program_from_row).transpose()?)
    }

    async fn program_by_id(&self, id: Uuid) -> Result<Option<ProgramRef>, StoreError> {
        let row = sqlx::query("SELECT id, code, name FROM faculty_risk.programs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(program_from_row).transpose()?)
    }

    async fn find_teacher(&self, faculty_no: &str) -> Result<Option<TeacherRecord>, StoreError> {
        let mut query = QueryBuilder::<Postgres>::new(TEACHER_SELECT);
        query.push(" WHERE faculty_no = ").push_bind(faculty_no);

        let row = query.build().fetch_optional(&self.pool).await?;

        Ok(row.as_ref().map(teacher_from_row).transpose()?)
    }

    async fn fetch_teachers(
        &self,
        program_id: Option<Uuid>,
    ) -> Result<Vec<TeacherRecord>, StoreError> {
        let mut query = QueryBuilder::<Postgres>::new(TEACHER_SELECT);
        if let Some(id) = program_id {
            query.push(" WHERE program_id = ").push_bind(id);
        }
        query.push(" ORDER BY faculty_no");

        let rows = query.build().fetch_all(&self.pool).await?;
        let mut teachers = Vec::with_capacity(rows.len());
        for row in &rows {
            teachers.push(teacher_from_row(row)?);
        }
        Ok(teachers)
    }

    async fn fetch_grades(&self, scope: &GradeScope) -> Result<Vec<GradeRow>, StoreError> {
        let mut query = QueryBuilder::<Postgres>::new(
            "SELECT g.faculty_no, t.department, g.student_no, g.period, g.status, g.created_at \
             FROM faculty_risk.grades g \
             JOIN faculty_risk.teachers t ON t.faculty_no = g.faculty_no \
             WHERE TRUE",
        );
        if let Some(year) = &scope.academic_year {
            query.push(" AND g.academic_year = ").push_bind(year.clone());
        }
        if let Some(semester) = scope.semester {
            query.push(" AND g.semester = ").push_bind(semester.as_str());
        }
        if let Some(program_id) = scope.program_id {
            query.push(" AND g.program_id = ").push_bind(program_id);
        }
        if let Some(faculty_no) = &scope.faculty_no {
            query.push(" AND g.faculty_no = ").push_bind(faculty_no.clone());
        }
        if let Some(period) = scope.period {
            query.push(" AND g.period = ").push_bind(period.as_str());
        }
        if let Some(year) = scope.calendar_year {
            query
                .push(" AND EXTRACT(YEAR FROM g.created_at)::INT = ")
                .push_bind(year);
        }
        query.push(" ORDER BY g.created_at, g.faculty_no");

        let rows = query.build().fetch_all(&self.pool).await?;
        let mut grades = Vec::with_capacity(rows.len());
        for row in &rows {
            grades.push(grade_from_row(row)?);
        }
        tracing::debug!(rows = grades.len(), ?scope, "fetched grade rows");
        Ok(grades)
    }
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let programs = vec![
        (
            Uuid::parse_str("6b1f0c1e-3c1a-4f7e-9d0b-2a9e6f1c4d10")?,
            "BSIT",
            "Information Technology",
        ),
        (
            Uuid::parse_str("a4d2e8b7-5f61-4c2b-8e3a-7d9c0b1e2f33")?,
            "BSED",
            "Secondary Education",
        ),
    ];

    for (id, code, name) in &programs {
        sqlx::query(
            r#"
            INSERT INTO faculty_risk.programs (id, code, name)
            VALUES ($1, $2, $3)
            ON CONFLICT (code) DO UPDATE SET name = EXCLUDED.name
            "#,
        )
        .bind(id)
        .bind(code)
        .bind(name)
        .execute(pool)
        .await?;
    }
    let bsit = programs[0].0;
    let bsed = programs[1].0;

    const GREEN: &str = "GREEN (0.01%-10%)";
    const YELLOW: &str = "YELLOW (10.01%-40%)";
    const RED: &str = "RED (40.01%-100%)";

    let teachers = vec![
        (
            "T001",
            "John Smith",
            "Mathematics",
            bsit,
            60,
            [(6, 10.0, GREEN), (9, 15.0, YELLOW), (4, 6.67, GREEN)],
        ),
        (
            "T002",
            "Maria Santos",
            "Computer Studies",
            bsit,
            45,
            [(20, 44.44, RED), (12, 26.67, YELLOW), (5, 11.11, YELLOW)],
        ),
        (
            "T003",
            "Ramon Dizon",
            "Education",
            bsed,
            38,
            [(2, 5.26, GREEN), (1, 2.63, GREEN), (3, 7.89, GREEN)],
        ),
    ];

    for (faculty_no, name, department, program_id, enrolled, periods) in teachers {
        let [(f1, pc1, c1), (f2, pc2, c2), (f3, pc3, c3)] = periods;
        sqlx::query(
            r#"
            INSERT INTO faculty_risk.teachers
            (id, faculty_no, full_name, department, program_id, enrolled_students,
             p1_failed, p1_percent, p1_category,
             p2_failed, p2_percent, p2_category,
             p3_failed, p3_percent, p3_category)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ON CONFLICT (faculty_no) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(faculty_no)
        .bind(name)
        .bind(department)
        .bind(program_id)
        .bind(enrolled as i64)
        .bind(f1 as i64)
        .bind(pc1)
        .bind(c1)
        .bind(f2 as i64)
        .bind(pc2)
        .bind(c2)
        .bind(f3 as i64)
        .bind(pc3)
        .bind(c3)
        .execute(pool)
        .await?;
    }

    let students = vec![
        ("2025-0001", "Avery Reyes", bsit),
        ("2025-0002", "Jules Mendoza", bsit),
        ("2025-0003", "Kiara Villanueva", bsit),
        ("2025-0004", "Paolo Garcia", bsed),
        ("2025-0005", "Lia Fernandez", bsed),
    ];

    for (student_no, name, program_id) in &students {
        sqlx::query(
            r#"
            INSERT INTO faculty_risk.students (id, student_no, full_name, program_id, year_level, status)
            VALUES ($1, $2, $3, $4, 1, 'Regular')
            ON CONFLICT (student_no) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(student_no)
        .bind(name)
        .bind(program_id)
        .execute(pool)
        .await?;
    }

    let today = Utc::now().date_naive();
    let year = today.year();
    let months_so_far = today.month();
    let grades = vec![
        ("seed-g01", "2025-0001", "T001", bsit, "P1", "Passed", 1),
        ("seed-g02", "2025-0002", "T001", bsit, "P1", "Failed", 1),
        ("seed-g03", "2025-0003", "T002", bsit, "P1", "Failed", 2),
        ("seed-g04", "2025-0001", "T002", bsit, "P1", "Failed", 2),
        ("seed-g05", "2025-0002", "T002", bsit, "P1", "Dropped", 2),
        ("seed-g06", "2025-0004", "T003", bsed, "P1", "Passed", 3),
        ("seed-g07", "2025-0005", "T003", bsed, "P2", "Passed", 3),
    ];

    for (source_key, student_no, faculty_no, program_id, period, status, month) in grades {
        let month = month.min(months_so_far);
        let created_at = NaiveDate::from_ymd_opt(year, month, 10)
            .and_then(|d| d.and_hms_opt(9, 0, 0))
            .context("invalid date")?;

        sqlx::query(
            r#"
            INSERT INTO faculty_risk.grades
            (id, source_key, student_no, faculty_no, program_id, academic_year, semester,
             period, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, '2nd', $7, $8, $9)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(source_key)
        .bind(student_no)
        .bind(faculty_no)
        .bind(program_id)
        .bind(format!("{}-{}", year - 1, year))
        .bind(period)
        .bind(status)
        .bind(created_at)
        .execute(pool)
        .await?;
    }

    Ok(())
}
