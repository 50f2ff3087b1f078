use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::parse::fold_header;

/// Upper bounds (inclusive) of the green and yellow zones, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoneThresholds {
    pub green_max: f64,
    pub yellow_max: f64,
}

impl Default for ZoneThresholds {
    fn default() -> Self {
        Self {
            green_max: 10.0,
            yellow_max: 40.0,
        }
    }
}

const TEACHER_SYNONYMS: &[(&str, &str)] = &[
    ("facultyno", "FacultyNo"),
    ("facultynumber", "FacultyNo"),
    ("facultyid", "FacultyNo"),
    ("teacherid", "FacultyNo"),
    ("teacherno", "FacultyNo"),
    ("employeeno", "FacultyNo"),
    ("teachername", "FacultyName"),
    ("faculty", "FacultyName"),
    ("nameoffaculty", "FacultyName"),
    ("dept", "Department"),
    ("college", "Department"),
    ("programcode", "Program"),
    ("course", "Program"),
    ("emailaddress", "Email"),
    ("enrolled", "EnrolledStudents"),
    ("noofstudents", "EnrolledStudents"),
    ("numberofstudents", "EnrolledStudents"),
    ("totalstudents", "EnrolledStudents"),
    ("totalenrolled", "EnrolledStudents"),
];

const STUDENT_SYNONYMS: &[(&str, &str)] = &[
    ("studentid", "StudentNo"),
    ("studentnumber", "StudentNo"),
    ("idno", "StudentNo"),
    ("fullname", "StudentName"),
    ("nameofstudent", "StudentName"),
    ("givenname", "FirstName"),
    ("surname", "LastName"),
    ("familyname", "LastName"),
    ("year", "YearLevel"),
    ("yearlvl", "YearLevel"),
    ("remarks", "Status"),
];

const SUBJECT_SYNONYMS: &[(&str, &str)] = &[
    ("code", "SubjectCode"),
    ("coursecode", "SubjectCode"),
    ("subjectno", "SubjectCode"),
    ("subjecttitle", "SubjectName"),
    ("descriptivetitle", "SubjectName"),
    ("description", "SubjectName"),
    ("title", "SubjectName"),
    ("credits", "Units"),
    ("creditunits", "Units"),
];

const CANONICAL_FIELDS: &[&str] = &[
    "FacultyNo",
    "FacultyName",
    "Department",
    "Program",
    "Email",
    "EnrolledStudents",
    "StudentNo",
    "StudentName",
    "FirstName",
    "LastName",
    "YearLevel",
    "Status",
    "SubjectCode",
    "SubjectName",
    "Units",
];

/// Folded header text → canonical field name. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderVocabulary {
    synonyms: HashMap<String, String>,
}

impl HeaderVocabulary {
    pub fn standard() -> Self {
        let mut synonyms = HashMap::new();

        for (folded, canonical) in TEACHER_SYNONYMS
            .iter()
            .chain(STUDENT_SYNONYMS)
            .chain(SUBJECT_SYNONYMS)
        {
            synonyms.insert(folded.to_string(), canonical.to_string());
        }

        for period in 1..=3 {
            let failed = format!("P{period}_Failed");
            let percent = format!("P{period}_Percent");
            let category = format!("P{period}_Category");
            for folded in [
                format!("p{period}numberoffailed"),
                format!("p{period}nooffailed"),
                format!("p{period}failures"),
            ] {
                synonyms.insert(folded, failed.clone());
            }
            for folded in [
                format!("p{period}percentoffailed"),
                format!("p{period}failedpercent"),
                format!("p{period}failurerate"),
            ] {
                synonyms.insert(folded, percent.clone());
            }
            for folded in [
                format!("p{period}categorization"),
                format!("p{period}zone"),
                format!("p{period}remarks"),
            ] {
                synonyms.insert(folded, category.clone());
            }
            for canonical in [failed, percent, category] {
                synonyms.insert(fold_header(&canonical), canonical);
            }
        }

        // Every canonical name must map to itself so canonicalization is idempotent.
        for canonical in CANONICAL_FIELDS {
            synonyms.insert(fold_header(canonical), canonical.to_string());
        }

        Self { synonyms }
    }

    pub fn with_extra<I, K, V>(mut self, extra: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (raw, canonical) in extra {
            let canonical = canonical.into();
            // A target spelled like a known field resolves to that field's canonical name.
            let target = match self.synonyms.get(&fold_header(&canonical)) {
                Some(existing) => existing.clone(),
                None => {
                    self.synonyms.insert(fold_header(&canonical), canonical.clone());
                    canonical
                }
            };
            self.synonyms.insert(fold_header(raw.as_ref()), target);
        }
        self
    }

    pub fn lookup(&self, folded: &str) -> Option<&str> {
        self.synonyms.get(folded).map(String::as_str)
    }

    #[cfg(test)]
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.synonyms.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl Default for HeaderVocabulary {
    fn default() -> Self {
        Self::standard()
    }
}

/// Classification and header configuration, injected into the parsers and engines.
#[derive(Debug, Clone, Default)]
pub struct AnalyticsConfig {
    pub thresholds: ZoneThresholds,
    pub vocabulary: HeaderVocabulary,
}

#[derive(Debug, Default, Deserialize)]
struct ConfigOverrides {
    thresholds: Option<ZoneThresholds>,
    #[serde(default)]
    header_synonyms: HashMap<String, String>,
}

impl AnalyticsConfig {
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        let overrides: ConfigOverrides = serde_json::from_str(raw)?;
        let thresholds = overrides.thresholds.unwrap_or_default();
        anyhow::ensure!(
            thresholds.green_max < thresholds.yellow_max,
            "green_max ({}) must be below yellow_max ({})",
            thresholds.green_max,
            thresholds.yellow_max
        );

        Ok(Self {
            thresholds,
            vocabulary: HeaderVocabulary::standard().with_extra(overrides.header_synonyms),
        })
    }
}

/// Process settings read from the environment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub max_connections: u32,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .context("DATABASE_URL must be set to a production Postgres instance")?;
        let max_connections = match std::env::var("DB_MAX_CONNECTIONS") {
            Ok(value) => value
                .parse()
                .with_context(|| format!("DB_MAX_CONNECTIONS must be a number, got `{value}`"))?,
            Err(_) => 5,
        };

        Ok(Self {
            database_url,
            max_connections,
        })
    }
}
