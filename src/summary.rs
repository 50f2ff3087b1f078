use anyhow::Context;
use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::filters::ResolvedFilters;
use crate::models::{GradeRow, GradeScope, Period, Zone};
use crate::monthly::{summarize_months, MonthlyZoneCount};
use crate::period::{summarize_periods, PeriodSummaryRow, ZoneCounts};
use crate::stats::{OverallOutcome, SnapshotOutcome, TeacherStatAggregator, TeacherView};
use crate::store::Store;
use crate::zone::{ZoneClassifier, ZoneSource};

const DEBUG_SAMPLE_SIZE: usize = 5;

#[derive(Debug, Clone, Serialize)]
pub struct ResolutionTrace {
    pub faculty_no: String,
    pub period: Period,
    pub zone: Option<Zone>,
    pub source: ZoneSource,
}

#[derive(Debug, Clone, Serialize)]
pub struct DebugBlock {
    pub rows_in_scope: usize,
    pub sample: Vec<GradeRow>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub resolutions: Vec<ResolutionTrace>,
}

impl DebugBlock {
    fn new(rows: &[GradeRow], resolutions: Vec<ResolutionTrace>) -> Self {
        Self {
            rows_in_scope: rows.len(),
            sample: rows.iter().take(DEBUG_SAMPLE_SIZE).cloned().collect(),
            resolutions,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TeacherSummaryResponse {
    pub filters: ResolvedFilters,
    pub summary: Vec<PeriodSummaryRow>,
    pub consistent: ZoneCounts,
    pub teachers: Vec<TeacherView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<DebugBlock>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthlySummaryResponse {
    pub filters: ResolvedFilters,
    pub year: i32,
    pub monthly: Vec<MonthlyZoneCount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<DebugBlock>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PeriodOutcome {
    pub period: Period,
    pub zone: Option<Zone>,
    pub result: SnapshotOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct TeacherStatsResponse {
    pub faculty_no: String,
    pub filters: ResolvedFilters,
    pub overall: OverallOutcome,
    pub periods: Vec<PeriodOutcome>,
}

/// Live snapshot for a single teacher, overall and per selected period.
pub async fn teacher_stats(
    store: &dyn Store,
    classifier: &ZoneClassifier,
    faculty_no: &str,
    filters: ResolvedFilters,
) -> anyhow::Result<TeacherStatsResponse> {
    let teacher = store
        .find_teacher(faculty_no)
        .await?
        .with_context(|| format!("no teacher with faculty number `{faculty_no}`"))?;

    let aggregator = TeacherStatAggregator::new(store, classifier);
    let filter = filters.stat_filter();
    let overall = aggregator.overall(&teacher, &filter).await?;

    let mut periods = Vec::new();
    for period in filters.period.periods() {
        let result = aggregator.period_outcome(&teacher, period, &filter).await?;
        let zone = match &result {
            SnapshotOutcome::Recomputed(snapshot) => Some(snapshot.zone),
            SnapshotOutcome::PreservedImported(imported) => {
                classifier.resolve(imported.enrolled, &imported.values).zone
            }
        };
        periods.push(PeriodOutcome {
            period,
            zone,
            result,
        });
    }

    Ok(TeacherStatsResponse {
        faculty_no: teacher.faculty_no,
        filters,
        overall,
        periods,
    })
}

pub async fn teacher_summary(
    store: &dyn Store,
    classifier: &ZoneClassifier,
    filters: ResolvedFilters,
    debug: bool,
) -> anyhow::Result<TeacherSummaryResponse> {
    let aggregator = TeacherStatAggregator::new(store, classifier);
    let (teachers, rows) = aggregator.teacher_views(&filters.stat_filter()).await?;

    let zones: Vec<[Option<Zone>; 3]> = teachers.iter().map(TeacherView::zones).collect();
    let summary = summarize_periods(&zones, filters.period);

    tracing::info!(
        teachers = teachers.len(),
        grade_rows = rows.len(),
        period = filters.period.as_str(),
        "teacher summary computed"
    );

    let debug = debug.then(|| {
        let resolutions = teachers
            .iter()
            .flat_map(|teacher| {
                teacher.periods.iter().map(|view| ResolutionTrace {
                    faculty_no: teacher.faculty_no.clone(),
                    period: view.period,
                    zone: view.zone,
                    source: view.source,
                })
            })
            .collect();
        DebugBlock::new(&rows, resolutions)
    });

    Ok(TeacherSummaryResponse {
        filters,
        summary: summary.rows,
        consistent: summary.consistent,
        teachers,
        debug,
    })
}

pub async fn monthly_summary(
    store: &dyn Store,
    classifier: &ZoneClassifier,
    filters: ResolvedFilters,
    today: NaiveDate,
    debug: bool,
) -> anyhow::Result<MonthlySummaryResponse> {
    let scope = GradeScope {
        calendar_year: Some(today.year()),
        ..filters.stat_filter().scope(None)
    };
    let rows = store.fetch_grades(&scope).await?;
    let monthly = summarize_months(&rows, today, classifier);

    tracing::info!(
        grade_rows = rows.len(),
        months = monthly.len(),
        "monthly department summary computed"
    );

    Ok(MonthlySummaryResponse {
        filters,
        year: today.year(),
        monthly,
        debug: debug.then(|| DebugBlock::new(&rows, Vec::new())),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PeriodFilter, PeriodValues, Semester, TeacherRecord};
    use crate::store::memory::{GradeFixture, MemoryStore};

    fn teacher(faculty_no: &str, department: &str, periods: [PeriodValues; 3]) -> TeacherRecord {
        TeacherRecord {
            faculty_no: faculty_no.to_string(),
            full_name: format!("Teacher {faculty_no}"),
            department: Some(department.to_string()),
            program_id: None,
            email: None,
            enrolled: Some(20),
            periods,
        }
    }

    fn percent(value: f64) -> PeriodValues {
        PeriodValues {
            percent: Some(value),
            ..Default::default()
        }
    }

    fn filters(period: PeriodFilter) -> ResolvedFilters {
        ResolvedFilters {
            program_id: None,
            program: None,
            school_year: Some("2025-2026".to_string()),
            semester: Some(Semester::Second),
            period,
        }
    }

    async fn seeded_store() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .insert_teacher(&teacher("T1", "Math", [percent(5.0), percent(20.0), percent(50.0)]))
            .await
            .unwrap();
        store
            .insert_teacher(&teacher("T2", "Science", [percent(5.0), percent(5.0), percent(5.0)]))
            .await
            .unwrap();
        store
            .insert_teacher(&teacher(
                "T3",
                "Science",
                [PeriodValues::default(), PeriodValues::default(), PeriodValues::default()],
            ))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn teacher_summary_uses_imported_values_without_grades() {
        let store = seeded_store().await;
        let classifier = ZoneClassifier::default();
        let response = teacher_summary(&store, &classifier, filters(PeriodFilter::All), false)
            .await
            .unwrap();

        assert_eq!(response.summary.len(), 4);
        assert_eq!(response.summary[0].green, Some(2));
        assert_eq!(response.summary[2].red, Some(1));
        assert_eq!(response.consistent, ZoneCounts { green: 1, yellow: 0, red: 1 });
        assert!(response.debug.is_none());
    }

    #[tokio::test]
    async fn live_grades_override_and_debug_traces_sources() {
        let store = seeded_store().await;
        let classifier = ZoneClassifier::default();
        let created_at = NaiveDate::from_ymd_opt(2026, 1, 12)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        for (student, status) in [("S1", "Failed"), ("S2", "Failed"), ("S3", "Passed")] {
            store.add_grade(GradeFixture {
                faculty_no: "T2".to_string(),
                student_no: student.to_string(),
                program_id: None,
                academic_year: "2025-2026".to_string(),
                semester: Semester::Second,
                period: Some(Period::P1),
                status: status.to_string(),
                created_at,
            });
        }

        let response = teacher_summary(
            &store,
            &classifier,
            filters(PeriodFilter::Single(Period::P1)),
            true,
        )
        .await
        .unwrap();

        assert_eq!(response.summary.len(), 1);
        assert_eq!(response.summary[0].green, Some(1));
        assert_eq!(response.summary[0].red, Some(1));
        assert_eq!(response.consistent, ZoneCounts { green: 1, yellow: 0, red: 1 });

        let debug = response.debug.unwrap();
        assert_eq!(debug.rows_in_scope, 3);
        let t2 = debug
            .resolutions
            .iter()
            .find(|r| r.faculty_no == "T2" && r.period == Period::P1)
            .unwrap();
        assert_eq!(t2.source, ZoneSource::Counts);
        assert_eq!(t2.zone, Some(Zone::Red));
    }

    #[tokio::test]
    async fn teacher_stats_reports_tagged_outcomes() {
        let store = seeded_store().await;
        let classifier = ZoneClassifier::default();
        store.add_grade(GradeFixture {
            faculty_no: "T1".to_string(),
            student_no: "S1".to_string(),
            program_id: None,
            academic_year: "2025-2026".to_string(),
            semester: Semester::Second,
            period: Some(Period::P1),
            status: "Passed".to_string(),
            created_at: NaiveDate::from_ymd_opt(2026, 1, 20)
                .unwrap()
                .and_hms_opt(8, 0, 0)
                .unwrap(),
        });

        let response = teacher_stats(&store, &classifier, "T1", filters(PeriodFilter::All))
            .await
            .unwrap();

        match &response.overall {
            OverallOutcome::Recomputed(snapshot) => assert_eq!(snapshot.enrolled, 1),
            other => panic!("expected a recomputed overall, got {other:?}"),
        }
        assert_eq!(response.periods.len(), 3);
        assert!(matches!(response.periods[0].result, SnapshotOutcome::Recomputed(_)));
        assert!(matches!(
            response.periods[2].result,
            SnapshotOutcome::PreservedImported(_)
        ));
        assert_eq!(response.periods[2].zone, Some(Zone::Red));

        let json = serde_json::to_value(&response.periods[2]).unwrap();
        assert_eq!(json["result"]["outcome"], "preserved_imported");
        assert_eq!(json["result"]["snapshot"]["values"]["percent"], 50.0);

        assert!(teacher_stats(&store, &classifier, "T404", filters(PeriodFilter::All))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn teacher_stats_keeps_imported_history_without_grades() {
        let store = MemoryStore::new();
        let classifier = ZoneClassifier::default();
        let red = PeriodValues {
            failed: Some(30),
            percent: Some(50.0),
            category: Some("RED".to_string()),
        };
        store
            .insert_teacher(&TeacherRecord {
                enrolled: Some(60),
                ..teacher("T9", "Math", [red.clone(), red.clone(), red])
            })
            .await
            .unwrap();

        let response = teacher_stats(&store, &classifier, "T9", filters(PeriodFilter::All))
            .await
            .unwrap();

        assert_eq!(response.overall.zone(), Some(Zone::Red));
        match &response.overall {
            OverallOutcome::PreservedImported(imported) => {
                assert_eq!(imported.enrolled, Some(60));
                assert_eq!(imported.zones, [Some(Zone::Red); 3]);
            }
            other => panic!("expected imported overall, got {other:?}"),
        }

        let json = serde_json::to_value(&response.overall).unwrap();
        assert_eq!(json["outcome"], "preserved_imported");
        assert_eq!(json["snapshot"]["zone"], "red");
        assert!(json["snapshot"].get("percent").is_none());
    }

    #[tokio::test]
    async fn monthly_summary_covers_the_year_to_date() {
        let store = seeded_store().await;
        let classifier = ZoneClassifier::default();
        let today = NaiveDate::from_ymd_opt(2026, 3, 5).unwrap();
        store.add_grade(GradeFixture {
            faculty_no: "T1".to_string(),
            student_no: "S9".to_string(),
            program_id: None,
            academic_year: "2025-2026".to_string(),
            semester: Semester::Second,
            period: Some(Period::P2),
            status: "Failed".to_string(),
            created_at: NaiveDate::from_ymd_opt(2026, 2, 3)
                .unwrap()
                .and_hms_opt(9, 30, 0)
                .unwrap(),
        });

        let response =
            monthly_summary(&store, &classifier, filters(PeriodFilter::All), today, false)
                .await
                .unwrap();

        assert_eq!(response.year, 2026);
        assert_eq!(response.monthly.len(), 3);
        assert_eq!(response.monthly[1].red, 1);
        assert_eq!(response.monthly[1].red_department.as_deref(), Some("Math"));
        assert_eq!(response.monthly[0].red_department, None);
        let march = &response.monthly[2];
        assert_eq!(march.green + march.yellow + march.red, 0);
    }
}
