use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::Serialize;
use uuid::Uuid;

use crate::error::FilterError;

/// Risk tier derived from a failure percentage. Variants are ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Zone {
    Green,
    Yellow,
    Red,
}

impl Zone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Zone::Green => "green",
            Zone::Yellow => "yellow",
            Zone::Red => "red",
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Period {
    P1,
    P2,
    P3,
}

impl Period {
    pub const ALL: [Period; 3] = [Period::P1, Period::P2, Period::P3];

    pub fn as_str(&self) -> &'static str {
        match self {
            Period::P1 => "P1",
            Period::P2 => "P2",
            Period::P3 => "P3",
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Period::P1 => 0,
            Period::P2 => 1,
            Period::P3 => 2,
        }
    }
}

impl FromStr for Period {
    type Err = FilterError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "P1" => Ok(Period::P1),
            "P2" => Ok(Period::P2),
            "P3" => Ok(Period::P3),
            _ => Err(FilterError::Period(value.to_string())),
        }
    }
}

/// Period selector on the reporting boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodFilter {
    All,
    Single(Period),
}

impl PeriodFilter {
    pub fn periods(&self) -> Vec<Period> {
        match self {
            PeriodFilter::All => Period::ALL.to_vec(),
            PeriodFilter::Single(period) => vec![*period],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodFilter::All => "All",
            PeriodFilter::Single(period) => period.as_str(),
        }
    }
}

impl FromStr for PeriodFilter {
    type Err = FilterError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.trim().eq_ignore_ascii_case("all") {
            return Ok(PeriodFilter::All);
        }
        value
            .parse::<Period>()
            .map(PeriodFilter::Single)
            .map_err(|_| FilterError::Period(value.to_string()))
    }
}

impl Serialize for PeriodFilter {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Semester {
    First,
    Second,
    Summer,
}

impl Semester {
    pub fn as_str(&self) -> &'static str {
        match self {
            Semester::First => "1st",
            Semester::Second => "2nd",
            Semester::Summer => "Summer",
        }
    }
}

impl FromStr for Semester {
    type Err = FilterError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "1st" | "first" => Ok(Semester::First),
            "2nd" | "second" => Ok(Semester::Second),
            "summer" => Ok(Semester::Summer),
            _ => Err(FilterError::Semester(value.to_string())),
        }
    }
}

impl Serialize for Semester {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GradeStatus {
    Passed,
    Failed,
    Dropped,
    Withdrawn,
    Incomplete,
    Other(String),
}

impl GradeStatus {
    pub fn from_text(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "passed" => GradeStatus::Passed,
            "failed" => GradeStatus::Failed,
            "dropped" => GradeStatus::Dropped,
            "withdrawn" => GradeStatus::Withdrawn,
            "incomplete" | "inc" => GradeStatus::Incomplete,
            _ => GradeStatus::Other(value.trim().to_string()),
        }
    }

    /// Dropped and withdrawn enrolments never count toward any tally.
    pub fn is_counted(&self) -> bool {
        !matches!(self, GradeStatus::Dropped | GradeStatus::Withdrawn)
    }
}

/// Imported per-period values as they arrived in the roster.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PeriodValues {
    pub failed: Option<i64>,
    pub percent: Option<f64>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeacherRecord {
    pub faculty_no: String,
    pub full_name: String,
    pub department: Option<String>,
    pub program_id: Option<Uuid>,
    pub email: Option<String>,
    pub enrolled: Option<i64>,
    pub periods: [PeriodValues; 3],
}

impl TeacherRecord {
    pub fn period(&self, period: Period) -> &PeriodValues {
        &self.periods[period.index()]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentRecord {
    pub student_no: String,
    pub full_name: String,
    pub program_id: Option<Uuid>,
    pub year_level: Option<i64>,
    pub email: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectRecord {
    pub code: String,
    pub name: String,
    pub units: Option<i64>,
    pub department: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgramRef {
    pub id: Uuid,
    pub code: String,
    pub name: String,
}

/// One enrolment row joined to its teacher's department.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradeRow {
    pub faculty_no: String,
    pub department: Option<String>,
    pub student_no: String,
    pub period: Option<Period>,
    pub status: GradeStatus,
    pub created_at: NaiveDateTime,
}

/// Filtered-read scope for grade rows. `None` fields are unconstrained.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GradeScope {
    pub academic_year: Option<String>,
    pub semester: Option<Semester>,
    pub program_id: Option<Uuid>,
    pub faculty_no: Option<String>,
    pub period: Option<Period>,
    pub calendar_year: Option<i32>,
}
