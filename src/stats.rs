use std::collections::{HashMap, HashSet};

use serde::Serialize;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{
    GradeRow, GradeScope, GradeStatus, Period, PeriodValues, Semester, TeacherRecord, Zone,
};
use crate::period::consistent_zone;
use crate::store::Store;
use crate::zone::{failure_percent, round2, ZoneClassifier, ZoneSource};

/// Live enrolled/failed figures for one teacher under a filter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Snapshot {
    pub enrolled: i64,
    pub failed: i64,
    pub percent: f64,
    pub zone: Zone,
}

impl Snapshot {
    /// True when no counted grade rows were in scope.
    pub fn is_empty(&self) -> bool {
        self.enrolled == 0 && self.failed == 0
    }
}

/// Period values as they were bulk-imported, with the teacher's enrolled count.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportedSnapshot {
    pub enrolled: Option<i64>,
    pub values: PeriodValues,
}

/// Whether live grade data replaced the imported figures.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "snapshot", rename_all = "snake_case")]
pub enum SnapshotOutcome {
    Recomputed(Snapshot),
    PreservedImported(ImportedSnapshot),
}

/// Imported state standing in for a teacher's overall figures.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportedOverall {
    pub enrolled: Option<i64>,
    pub zone: Option<Zone>,
    pub zones: [Option<Zone>; 3],
}

impl ImportedOverall {
    pub fn from_teacher(teacher: &TeacherRecord, classifier: &ZoneClassifier) -> Self {
        let resolve = |period: Period| classifier.resolve(teacher.enrolled, teacher.period(period));
        let zones = Period::ALL.map(|period| resolve(period).zone);
        Self {
            enrolled: teacher.enrolled,
            zone: consistent_zone(&zones),
            zones,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "snapshot", rename_all = "snake_case")]
pub enum OverallOutcome {
    Recomputed(Snapshot),
    PreservedImported(ImportedOverall),
}

impl OverallOutcome {
    pub fn zone(&self) -> Option<Zone> {
        match self {
            Self::Recomputed(snapshot) => Some(snapshot.zone),
            Self::PreservedImported(imported) => imported.zone,
        }
    }
}

/// An empty recomputation must never replace imported history.
pub fn reconcile(recomputed: Snapshot, imported: ImportedSnapshot) -> SnapshotOutcome {
    if recomputed.is_empty() {
        SnapshotOutcome::PreservedImported(imported)
    } else {
        SnapshotOutcome::Recomputed(recomputed)
    }
}

pub fn compute_snapshot<'r, I>(rows: I, classifier: &ZoneClassifier) -> Snapshot
where
    I: IntoIterator<Item = &'r GradeRow>,
{
    let mut enrolled = HashSet::new();
    let mut failed = HashSet::new();

    for row in rows {
        if !row.status.is_counted() {
            continue;
        }
        enrolled.insert(row.student_no.as_str());
        if row.status == GradeStatus::Failed {
            failed.insert(row.student_no.as_str());
        }
    }

    let enrolled = enrolled.len() as i64;
    let failed = failed.len() as i64;
    let percent = failure_percent(failed, enrolled);

    Snapshot {
        enrolled,
        failed,
        percent: round2(percent),
        zone: classifier.classify_percent(percent),
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatFilter {
    pub academic_year: Option<String>,
    pub semester: Option<Semester>,
    pub program_id: Option<Uuid>,
    pub period: Option<Period>,
}

impl StatFilter {
    pub fn scope(&self, faculty_no: Option<&str>) -> GradeScope {
        GradeScope {
            academic_year: self.academic_year.clone(),
            semester: self.semester,
            program_id: self.program_id,
            faculty_no: faculty_no.map(str::to_string),
            period: self.period,
            calendar_year: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Recomputed,
    Imported,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodView {
    pub period: Period,
    pub origin: Origin,
    pub enrolled: Option<i64>,
    pub failed: Option<i64>,
    pub percent: Option<f64>,
    pub category: Option<String>,
    pub zone: Option<Zone>,
    pub source: ZoneSource,
}

impl PeriodView {
    fn from_outcome(period: Period, outcome: SnapshotOutcome, classifier: &ZoneClassifier) -> Self {
        match outcome {
            SnapshotOutcome::Recomputed(snapshot) => Self {
                period,
                origin: Origin::Recomputed,
                enrolled: Some(snapshot.enrolled),
                failed: Some(snapshot.failed),
                percent: Some(snapshot.percent),
                category: Some(classifier.label(snapshot.zone)),
                zone: Some(snapshot.zone),
                source: ZoneSource::Counts,
            },
            SnapshotOutcome::PreservedImported(imported) => {
                let resolution = classifier.resolve(imported.enrolled, &imported.values);
                Self {
                    period,
                    origin: Origin::Imported,
                    enrolled: imported.enrolled,
                    failed: imported.values.failed,
                    percent: imported.values.percent,
                    category: imported.values.category,
                    zone: resolution.zone,
                    source: resolution.source,
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeacherView {
    pub faculty_no: String,
    pub full_name: String,
    pub department: Option<String>,
    pub periods: Vec<PeriodView>,
    pub consistent_zone: Option<Zone>,
}

impl TeacherView {
    pub fn zones(&self) -> [Option<Zone>; 3] {
        let mut zones = [None; 3];
        for view in &self.periods {
            zones[view.period.index()] = view.zone;
        }
        zones
    }

    pub fn period(&self, period: Period) -> Option<&PeriodView> {
        self.periods.iter().find(|v| v.period == period)
    }
}

/// Builds a teacher's P1-P3 view from the grade rows already scoped to them.
pub fn build_teacher_view(
    teacher: &TeacherRecord,
    rows: &[&GradeRow],
    classifier: &ZoneClassifier,
) -> TeacherView {
    let periods: Vec<PeriodView> = Period::ALL
        .iter()
        .map(|&period| {
            let recomputed = compute_snapshot(
                rows.iter().copied().filter(|r| r.period == Some(period)),
                classifier,
            );
            let imported = ImportedSnapshot {
                enrolled: teacher.enrolled,
                values: teacher.period(period).clone(),
            };
            let outcome = reconcile(recomputed, imported);
            if matches!(outcome, SnapshotOutcome::PreservedImported(_)) {
                tracing::debug!(
                    faculty_no = %teacher.faculty_no,
                    period = period.as_str(),
                    "no live grade rows, keeping imported snapshot"
                );
            }
            PeriodView::from_outcome(period, outcome, classifier)
        })
        .collect();

    let zones: Vec<Option<Zone>> = periods.iter().map(|v| v.zone).collect();

    TeacherView {
        faculty_no: teacher.faculty_no.clone(),
        full_name: teacher.full_name.clone(),
        department: teacher.department.clone(),
        consistent_zone: consistent_zone(&zones),
        periods,
    }
}

pub struct TeacherStatAggregator<'a> {
    store: &'a dyn Store,
    classifier: &'a ZoneClassifier,
}

impl<'a> TeacherStatAggregator<'a> {
    pub fn new(store: &'a dyn Store, classifier: &'a ZoneClassifier) -> Self {
        Self { store, classifier }
    }

    /// Read-only recomputation for one teacher.
    pub async fn snapshot(
        &self,
        faculty_no: &str,
        filter: &StatFilter,
    ) -> Result<Snapshot, StoreError> {
        let rows = self.store.fetch_grades(&filter.scope(Some(faculty_no))).await?;
        Ok(compute_snapshot(&rows, self.classifier))
    }

    /// Whole-filter snapshot, falling back to the imported P1-P3 state when
    /// no live rows are in scope.
    pub async fn overall(
        &self,
        teacher: &TeacherRecord,
        filter: &StatFilter,
    ) -> Result<OverallOutcome, StoreError> {
        let recomputed = self.snapshot(&teacher.faculty_no, filter).await?;
        if !recomputed.is_empty() {
            return Ok(OverallOutcome::Recomputed(recomputed));
        }
        tracing::debug!(
            faculty_no = %teacher.faculty_no,
            "no live grade rows, reporting imported overall zone"
        );
        let imported = ImportedOverall::from_teacher(teacher, self.classifier);
        Ok(OverallOutcome::PreservedImported(imported))
    }

    pub async fn period_outcome(
        &self,
        teacher: &TeacherRecord,
        period: Period,
        filter: &StatFilter,
    ) -> Result<SnapshotOutcome, StoreError> {
        let filter = StatFilter {
            period: Some(period),
            ..filter.clone()
        };
        let recomputed = self.snapshot(&teacher.faculty_no, &filter).await?;
        Ok(reconcile(
            recomputed,
            ImportedSnapshot {
                enrolled: teacher.enrolled,
                values: teacher.period(period).clone(),
            },
        ))
    }

    /// One bulk read of teachers and grade rows, then per-teacher views.
    pub async fn teacher_views(
        &self,
        filter: &StatFilter,
    ) -> Result<(Vec<TeacherView>, Vec<GradeRow>), StoreError> {
        let teachers = self.store.fetch_teachers(filter.program_id).await?;
        let rows = self
            .store
            .fetch_grades(&StatFilter {
                period: None,
                ..filter.clone()
            }
            .scope(None))
            .await?;

        let views = {
            let mut by_teacher: HashMap<&str, Vec<&GradeRow>> = HashMap::new();
            for row in &rows {
                by_teacher.entry(row.faculty_no.as_str()).or_default().push(row);
            }

            teachers
                .iter()
                .map(|teacher| {
                    let scoped = by_teacher
                        .get(teacher.faculty_no.as_str())
                        .map(Vec::as_slice)
                        .unwrap_or_default();
                    build_teacher_view(teacher, scoped, self.classifier)
                })
                .collect()
        };

        Ok((views, rows))
    }
}
