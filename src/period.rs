use serde::Serialize;

use crate::models::{Period, PeriodFilter, Zone};
use crate::zone::round2;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ZoneCounts {
    pub green: usize,
    pub yellow: usize,
    pub red: usize,
}

impl ZoneCounts {
    pub fn add(&mut self, zone: Zone) {
        match zone {
            Zone::Green => self.green += 1,
            Zone::Yellow => self.yellow += 1,
            Zone::Red => self.red += 1,
        }
    }
}

/// One line of the period table. The SEMESTRAL row carries only its label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodSummaryRow {
    pub period: String,
    pub total_teachers: Option<usize>,
    pub green: Option<usize>,
    pub green_percent: Option<f64>,
    pub yellow: Option<usize>,
    pub yellow_percent: Option<f64>,
    pub red: Option<usize>,
    pub red_percent: Option<f64>,
}

impl PeriodSummaryRow {
    fn tallied(period: Period, total: usize, counts: ZoneCounts) -> Self {
        let share = |count: usize| {
            if total == 0 {
                0.0
            } else {
                round2(count as f64 * 100.0 / total as f64)
            }
        };

        Self {
            period: period.as_str().to_string(),
            total_teachers: Some(total),
            green: Some(counts.green),
            green_percent: Some(share(counts.green)),
            yellow: Some(counts.yellow),
            yellow_percent: Some(share(counts.yellow)),
            red: Some(counts.red),
            red_percent: Some(share(counts.red)),
        }
    }

    fn semestral() -> Self {
        Self {
            period: "SEMESTRAL".to_string(),
            total_teachers: None,
            green: None,
            green_percent: None,
            yellow: None,
            yellow_percent: None,
            red: None,
            red_percent: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodSummary {
    pub rows: Vec<PeriodSummaryRow>,
    pub consistent: ZoneCounts,
}

/// Most severe resolved zone; `None` when nothing resolved.
pub fn consistent_zone(zones: &[Option<Zone>]) -> Option<Zone> {
    zones.iter().flatten().copied().max()
}

pub fn period_counts(teachers: &[[Option<Zone>; 3]], period: Period) -> ZoneCounts {
    let mut counts = ZoneCounts::default();
    for zone in teachers.iter().filter_map(|zones| zones[period.index()]) {
        counts.add(zone);
    }
    counts
}

pub fn summarize_periods(teachers: &[[Option<Zone>; 3]], filter: PeriodFilter) -> PeriodSummary {
    let total = teachers.len();
    let mut rows: Vec<PeriodSummaryRow> = filter
        .periods()
        .into_iter()
        .map(|period| PeriodSummaryRow::tallied(period, total, period_counts(teachers, period)))
        .collect();

    let consistent = match filter {
        PeriodFilter::Single(period) => period_counts(teachers, period),
        PeriodFilter::All => {
            rows.push(PeriodSummaryRow::semestral());
            let mut counts = ZoneCounts::default();
            for zone in teachers.iter().filter_map(|zones| consistent_zone(zones)) {
                counts.add(zone);
            }
            counts
        }
    };

    PeriodSummary { rows, consistent }
}
