use serde::Serialize;
use uuid::Uuid;

use crate::error::{FilterError, StoreError};
use crate::models::{PeriodFilter, Semester};
use crate::stats::StatFilter;
use crate::store::Store;

/// Query parameters shared by the reporting commands.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct ReportArgs {
    /// Program code or name
    #[arg(long)]
    pub program: Option<String>,
    #[arg(long)]
    pub program_id: Option<String>,
    /// Academic year, e.g. 2025-2026
    #[arg(long)]
    pub school_year: Option<String>,
    /// 1st, 2nd or Summer
    #[arg(long)]
    pub semester: Option<String>,
    /// All, P1, P2 or P3
    #[arg(long, default_value = "All")]
    pub period: String,
    /// Include a diagnostic sample in the output
    #[arg(long)]
    pub debug: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedFilters {
    pub program_id: Option<Uuid>,
    pub program: Option<String>,
    pub school_year: Option<String>,
    pub semester: Option<Semester>,
    pub period: PeriodFilter,
}

impl ResolvedFilters {
    pub fn stat_filter(&self) -> StatFilter {
        StatFilter {
            academic_year: self.school_year.clone(),
            semester: self.semester,
            program_id: self.program_id,
            period: None,
        }
    }
}

pub fn parse_school_year(value: &str) -> Result<String, FilterError> {
    let value = value.trim();
    let invalid = || FilterError::SchoolYear(value.to_string());
    let (start, end) = value.split_once('-').ok_or_else(invalid)?;
    if start.len() != 4 || end.len() != 4 {
        return Err(invalid());
    }
    let start: u16 = start.parse().map_err(|_| invalid())?;
    let end: u16 = end.parse().map_err(|_| invalid())?;
    if end != start + 1 {
        return Err(invalid());
    }
    Ok(format!("{start}-{end}"))
}

fn blank_to_none(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl ReportArgs {
    /// Validates filter text and resolves the program against the store.
    /// An unknown program drops the program filter instead of failing.
    pub async fn resolve(&self, store: &dyn Store) -> anyhow::Result<ResolvedFilters> {
        let school_year = blank_to_none(&self.school_year)
            .map(parse_school_year)
            .transpose()?;
        let semester = blank_to_none(&self.semester)
            .map(str::parse::<Semester>)
            .transpose()?;
        let period: PeriodFilter = self.period.parse()?;

        let program = self.resolve_program(store).await?;

        Ok(ResolvedFilters {
            program_id: program.as_ref().map(|(id, _)| *id),
            program: program.map(|(_, name)| name),
            school_year,
            semester,
            period,
        })
    }

    async fn resolve_program(
        &self,
        store: &dyn Store,
    ) -> Result<Option<(Uuid, String)>, StoreError> {
        if let Some(raw) = blank_to_none(&self.program_id) {
            match Uuid::parse_str(raw) {
                Ok(id) => {
                    if let Some(program) = store.program_by_id(id).await? {
                        return Ok(Some((program.id, program.name)));
                    }
                    tracing::warn!(program_id = raw, "unknown program id, ignoring program filter");
                }
                Err(_) => tracing::warn!(
                    program_id = raw,
                    "program id is not a uuid, ignoring program filter"
                ),
            }
            return Ok(None);
        }

        if let Some(key) = blank_to_none(&self.program) {
            if let Some(program) = store.find_program(key).await? {
                return Ok(Some((program.id, program.name)));
            }
            tracing::warn!(program = key, "unknown program, ignoring program filter");
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Period;
    use crate::store::memory::MemoryStore;

    #[test]
    fn school_year_must_span_consecutive_years() {
        assert_eq!(parse_school_year("2025-2026").unwrap(), "2025-2026");
        assert_eq!(parse_school_year(" 2025-2026 ").unwrap(), "2025-2026");
        assert!(parse_school_year("2025-2027").is_err());
        assert!(parse_school_year("2025/2026").is_err());
        assert!(parse_school_year("25-26").is_err());
        assert!(parse_school_year("abcd-efgh").is_err());
    }

    #[test]
    fn semester_and_period_parse_case_insensitively() {
        assert_eq!("1ST".parse::<Semester>().unwrap(), Semester::First);
        assert_eq!("summer".parse::<Semester>().unwrap(), Semester::Summer);
        assert!("3rd".parse::<Semester>().is_err());
        assert_eq!("all".parse::<PeriodFilter>().unwrap(), PeriodFilter::All);
        assert_eq!(
            "p2".parse::<PeriodFilter>().unwrap(),
            PeriodFilter::Single(Period::P2)
        );
        assert_eq!(
            "P4".parse::<PeriodFilter>(),
            Err(FilterError::Period("P4".to_string()))
        );
    }

    #[tokio::test]
    async fn resolves_program_by_name_or_id() {
        let store = MemoryStore::new();
        let id = store.add_program("BSED", "Secondary Education");

        let by_name = ReportArgs {
            program: Some("secondary education".to_string()),
            period: "All".to_string(),
            ..Default::default()
        }
        .resolve(&store)
        .await
        .unwrap();
        assert_eq!(by_name.program_id, Some(id));
        assert_eq!(by_name.program.as_deref(), Some("Secondary Education"));

        let by_id = ReportArgs {
            program_id: Some(id.to_string()),
            school_year: Some("2025-2026".to_string()),
            semester: Some("2nd".to_string()),
            period: "P1".to_string(),
            ..Default::default()
        }
        .resolve(&store)
        .await
        .unwrap();
        assert_eq!(by_id.program_id, Some(id));
        assert_eq!(by_id.semester, Some(Semester::Second));
        assert_eq!(by_id.period, PeriodFilter::Single(Period::P1));
    }

    #[tokio::test]
    async fn unknown_program_drops_the_filter() {
        let store = MemoryStore::new();
        let resolved = ReportArgs {
            program: Some("Astrology".to_string()),
            period: "All".to_string(),
            ..Default::default()
        }
        .resolve(&store)
        .await
        .unwrap();
        assert_eq!(resolved.program_id, None);
        assert_eq!(resolved.program, None);

        let bad_id = ReportArgs {
            program_id: Some("not-a-uuid".to_string()),
            period: "All".to_string(),
            ..Default::default()
        }
        .resolve(&store)
        .await
        .unwrap();
        assert_eq!(bad_id.program_id, None);
    }

    #[tokio::test]
    async fn malformed_filters_are_rejected() {
        let store = MemoryStore::new();
        let result = ReportArgs {
            semester: Some("Fall".to_string()),
            period: "All".to_string(),
            ..Default::default()
        }
        .resolve(&store)
        .await;
        assert!(result.is_err());
    }
}
