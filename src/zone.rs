use serde::Serialize;

use crate::config::ZoneThresholds;
use crate::models::{PeriodValues, Zone};

/// Which input decided a teacher/period zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneSource {
    Counts,
    RawPercent,
    Label,
    Unresolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub zone: Option<Zone>,
    pub source: ZoneSource,
}

#[derive(Debug, Clone, Copy)]
pub struct ZoneClassifier {
    thresholds: ZoneThresholds,
}

impl ZoneClassifier {
    pub fn new(thresholds: ZoneThresholds) -> Self {
        Self { thresholds }
    }

    pub fn classify_percent(&self, percent: f64) -> Zone {
        if percent.is_nan() || percent <= self.thresholds.green_max {
            Zone::Green
        } else if percent <= self.thresholds.yellow_max {
            Zone::Yellow
        } else {
            Zone::Red
        }
    }

    pub fn classify_label(text: &str) -> Option<Zone> {
        let upper = text.trim().to_uppercase();
        if upper.starts_with("RED") {
            Some(Zone::Red)
        } else if upper.starts_with("YELLOW") {
            Some(Zone::Yellow)
        } else if upper.starts_with("GREEN") {
            Some(Zone::Green)
        } else {
            None
        }
    }

    /// Counts first, then the raw percent, then the free-text label.
    pub fn resolve(&self, enrolled: Option<i64>, values: &PeriodValues) -> Resolution {
        if let (Some(failed), Some(enrolled)) = (values.failed, enrolled) {
            if enrolled > 0 {
                return Resolution {
                    zone: Some(self.classify_percent(failure_percent(failed, enrolled))),
                    source: ZoneSource::Counts,
                };
            }
        }

        if let Some(percent) = values.percent {
            return Resolution {
                zone: Some(self.classify_percent(percent)),
                source: ZoneSource::RawPercent,
            };
        }

        match values.category.as_deref().and_then(Self::classify_label) {
            Some(zone) => Resolution {
                zone: Some(zone),
                source: ZoneSource::Label,
            },
            None => Resolution {
                zone: None,
                source: ZoneSource::Unresolved,
            },
        }
    }

    /// Display label in the roster's categorization style.
    pub fn label(&self, zone: Zone) -> String {
        let ZoneThresholds {
            green_max,
            yellow_max,
        } = self.thresholds;
        match zone {
            Zone::Green => format!("GREEN (0%-{green_max}%)"),
            Zone::Yellow => format!("YELLOW ({:.2}%-{yellow_max}%)", green_max + 0.01),
            Zone::Red => format!("RED ({:.2}%-100%)", yellow_max + 0.01),
        }
    }
}

impl Default for ZoneClassifier {
    fn default() -> Self {
        Self::new(ZoneThresholds::default())
    }
}

pub fn failure_percent(failed: i64, enrolled: i64) -> f64 {
    if enrolled == 0 {
        0.0
    } else {
        failed as f64 * 100.0 / enrolled as f64
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
