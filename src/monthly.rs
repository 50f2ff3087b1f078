use std::collections::{HashMap, HashSet};

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::models::{GradeRow, GradeStatus, Zone};
use crate::period::ZoneCounts;
use crate::zone::{failure_percent, ZoneClassifier};

/// Zone tallies for one calendar month of the current year.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyZoneCount {
    pub month: u32,
    pub green: usize,
    pub yellow: usize,
    pub red: usize,
    pub green_department: Option<String>,
    pub yellow_department: Option<String>,
    pub red_department: Option<String>,
}

impl MonthlyZoneCount {
    pub fn department(&self, zone: Zone) -> Option<&str> {
        match zone {
            Zone::Green => self.green_department.as_deref(),
            Zone::Yellow => self.yellow_department.as_deref(),
            Zone::Red => self.red_department.as_deref(),
        }
    }
}

#[derive(Default)]
struct TeacherMonth<'r> {
    enrolled: HashSet<&'r str>,
    failed: HashSet<&'r str>,
}

/// Department counters in first-seen order.
#[derive(Default)]
struct DepartmentTally<'r> {
    counts: Vec<(&'r str, usize)>,
}

impl<'r> DepartmentTally<'r> {
    fn bump(&mut self, department: &'r str) {
        match self.counts.iter_mut().find(|(name, _)| *name == department) {
            Some((_, count)) => *count += 1,
            None => self.counts.push((department, 1)),
        }
    }

    /// Highest counter; on a tie the department seen first wins.
    fn leader(&self) -> Option<&'r str> {
        let mut best: Option<(&'r str, usize)> = None;
        for &(name, count) in &self.counts {
            if best.map_or(true, |(_, top)| count > top) {
                best = Some((name, count));
            }
        }
        best.map(|(name, _)| name)
    }
}

/// Per-month zone tallies for months 1 through `today`'s month of `today`'s year.
/// Rows outside that window are ignored; every month in it is reported.
pub fn summarize_months(
    rows: &[GradeRow],
    today: NaiveDate,
    classifier: &ZoneClassifier,
) -> Vec<MonthlyZoneCount> {
    let last_month = today.month();

    let mut group_order: Vec<(u32, &str, Option<&str>)> = Vec::new();
    let mut groups: HashMap<(u32, &str, Option<&str>), TeacherMonth<'_>> = HashMap::new();

    for row in rows {
        if !row.status.is_counted() {
            continue;
        }
        let created = row.created_at.date();
        if created.year() != today.year() || created.month() > last_month {
            continue;
        }

        let key = (
            created.month(),
            row.faculty_no.as_str(),
            row.department.as_deref(),
        );
        let group = groups.entry(key).or_insert_with(|| {
            group_order.push(key);
            TeacherMonth::default()
        });
        group.enrolled.insert(row.student_no.as_str());
        if row.status == GradeStatus::Failed {
            group.failed.insert(row.student_no.as_str());
        }
    }

    let window = last_month as usize;
    let mut counts = vec![ZoneCounts::default(); window];
    let mut departments: Vec<[DepartmentTally<'_>; 3]> = (0..window)
        .map(|_| Default::default())
        .collect();

    for key in &group_order {
        let (month, _, department) = *key;
        let group = &groups[key];
        let percent = failure_percent(group.failed.len() as i64, group.enrolled.len() as i64);
        let zone = classifier.classify_percent(percent);
        let slot = (month - 1) as usize;

        counts[slot].add(zone);
        if let Some(department) = department {
            departments[slot][zone_slot(zone)].bump(department);
        }
    }

    (1..=last_month)
        .map(|month| {
            let slot = (month - 1) as usize;
            let leaders = &departments[slot];
            let leader = |zone: Zone| leaders[zone_slot(zone)].leader().map(str::to_string);
            MonthlyZoneCount {
                month,
                green: counts[slot].green,
                yellow: counts[slot].yellow,
                red: counts[slot].red,
                green_department: leader(Zone::Green),
                yellow_department: leader(Zone::Yellow),
                red_department: leader(Zone::Red),
            }
        })
        .collect()
}

fn zone_slot(zone: Zone) -> usize {
    match zone {
        Zone::Green => 0,
        Zone::Yellow => 1,
        Zone::Red => 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(month: &MonthlyZoneCount) -> ZoneCounts {
        ZoneCounts {
            green: month.green,
            yellow: month.yellow,
            red: month.red,
        }
    }

    fn row(
        month: u32,
        faculty_no: &str,
        department: &str,
        student: &str,
        status: &str,
    ) -> GradeRow {
        row_in(2026, month, faculty_no, department, student, status)
    }

    fn row_in(
        year: i32,
        month: u32,
        faculty_no: &str,
        department: &str,
        student: &str,
        status: &str,
    ) -> GradeRow {
        GradeRow {
            faculty_no: faculty_no.to_string(),
            department: Some(department.to_string()),
            student_no: student.to_string(),
            period: None,
            status: GradeStatus::from_text(status),
            created_at: NaiveDate::from_ymd_opt(year, month, 15)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap(),
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 4, 20).unwrap()
    }

    #[test]
    fn every_month_up_to_today_is_reported() {
        let months = summarize_months(&[], today(), &ZoneClassifier::default());

        assert_eq!(months.len(), 4);
        for (index, month) in months.iter().enumerate() {
            assert_eq!(month.month, index as u32 + 1);
            assert_eq!(counts(month), ZoneCounts::default());
            assert_eq!(month.green_department, None);
            assert_eq!(month.yellow_department, None);
            assert_eq!(month.red_department, None);
        }
    }

    #[test]
    fn groups_by_month_teacher_and_department() {
        let rows = vec![
            row(2, "T1", "Math", "S1", "Passed"),
            row(2, "T1", "Math", "S2", "Passed"),
            row(2, "T2", "Science", "S3", "Failed"),
            row(2, "T2", "Science", "S4", "Passed"),
            row(2, "T3", "Science", "S5", "Failed"),
            row(3, "T1", "Math", "S1", "Failed"),
            row(3, "T1", "Math", "S2", "Dropped"),
        ];
        let months = summarize_months(&rows, today(), &ZoneClassifier::default());

        let february = &months[1];
        assert_eq!(counts(february), ZoneCounts { green: 1, yellow: 0, red: 2 });
        assert_eq!(february.department(Zone::Green), Some("Math"));
        assert_eq!(february.department(Zone::Red), Some("Science"));
        assert_eq!(february.department(Zone::Yellow), None);

        let march = &months[2];
        assert_eq!(counts(march), ZoneCounts { green: 0, yellow: 0, red: 1 });
        assert_eq!(march.department(Zone::Red), Some("Math"));

        assert_eq!(counts(&months[0]), ZoneCounts::default());
        assert_eq!(counts(&months[3]), ZoneCounts::default());
    }

    #[test]
    fn ties_go_to_first_seen_department() {
        let rows = vec![
            row(1, "T1", "History", "S1", "Failed"),
            row(1, "T2", "Math", "S2", "Failed"),
            row(1, "T3", "Math", "S3", "Passed"),
            row(1, "T4", "History", "S4", "Passed"),
        ];
        let months = summarize_months(&rows, today(), &ZoneClassifier::default());

        assert_eq!(months[0].department(Zone::Red), Some("History"));
        assert_eq!(months[0].department(Zone::Green), Some("Math"));
    }

    #[test]
    fn future_months_and_other_years_are_excluded() {
        let rows = vec![
            row(6, "T1", "Math", "S1", "Failed"),
            row_in(2025, 2, "T1", "Math", "S1", "Failed"),
            row(4, "T1", "Math", "S1", "Withdrawn"),
        ];
        let months = summarize_months(&rows, today(), &ZoneClassifier::default());

        assert_eq!(months.len(), 4);
        assert!(months.iter().all(|m| counts(m) == ZoneCounts::default()));
    }

    #[test]
    fn teacher_counted_once_per_department_and_month() {
        let rows = vec![
            row(1, "T1", "Math", "S1", "Passed"),
            row(1, "T1", "Math", "S2", "Passed"),
            row(1, "T1", "Math", "S1", "Passed"),
        ];
        let months = summarize_months(&rows, today(), &ZoneClassifier::default());
        assert_eq!(months[0].green, 1);
    }
}
