use std::fmt::Write;

use crate::models::{Period, Zone};
use crate::monthly::MonthlyZoneCount;
use crate::stats::TeacherView;
use crate::summary::{MonthlySummaryResponse, TeacherSummaryResponse};

const MONTH_NAMES: [&str; 12] = [
    "January", "February", "March", "April", "May", "June", "July", "August", "September",
    "October", "November", "December",
];

fn month_name(month: u32) -> &'static str {
    MONTH_NAMES
        .get(month.saturating_sub(1) as usize)
        .copied()
        .unwrap_or("?")
}

fn cell<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

fn zone_cell(zone: Option<Zone>) -> String {
    zone.map(|z| z.as_str().to_uppercase())
        .unwrap_or_else(|| "-".to_string())
}

/// Teachers ordered by worst zone first, then by faculty number.
pub fn rank_teachers(teachers: &[TeacherView]) -> Vec<&TeacherView> {
    let mut ranked: Vec<&TeacherView> = teachers.iter().collect();
    ranked.sort_by(|a, b| {
        b.consistent_zone
            .cmp(&a.consistent_zone)
            .then_with(|| a.faculty_no.cmp(&b.faculty_no))
    });
    ranked
}

pub fn build_report(summary: &TeacherSummaryResponse, monthly: &MonthlySummaryResponse) -> String {
    let mut output = String::new();
    let filters = &summary.filters;

    let _ = writeln!(output, "# Faculty Failure-Rate Report");
    let _ = writeln!(
        output,
        "Generated for {} / {} semester / {} (period {})",
        filters.program.as_deref().unwrap_or("all programs"),
        filters.semester.map(|s| s.as_str()).unwrap_or("any"),
        filters.school_year.as_deref().unwrap_or("all school years"),
        filters.period.as_str()
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Zone Distribution by Period");

    let _ = writeln!(output, "| Period | Teachers | Green | Yellow | Red |");
    let _ = writeln!(output, "|---|---|---|---|---|");
    for row in &summary.summary {
        let share = |count: Option<usize>, percent: Option<f64>| match (count, percent) {
            (Some(count), Some(percent)) => format!("{count} ({percent:.2}%)"),
            _ => "-".to_string(),
        };
        let _ = writeln!(
            output,
            "| {} | {} | {} | {} | {} |",
            row.period,
            cell(row.total_teachers),
            share(row.green, row.green_percent),
            share(row.yellow, row.yellow_percent),
            share(row.red, row.red_percent)
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "Consistent zones: {} green, {} yellow, {} red",
        summary.consistent.green, summary.consistent.yellow, summary.consistent.red
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Teachers");

    if summary.teachers.is_empty() {
        let _ = writeln!(output, "No teachers matched these filters.");
    } else {
        let _ = writeln!(output, "| Faculty No | Name | Department | P1 | P2 | P3 | Overall |");
        let _ = writeln!(output, "|---|---|---|---|---|---|---|");
        for teacher in rank_teachers(&summary.teachers) {
            let period = |p: Period| zone_cell(teacher.period(p).and_then(|v| v.zone));
            let _ = writeln!(
                output,
                "| {} | {} | {} | {} | {} | {} | {} |",
                teacher.faculty_no,
                teacher.full_name,
                teacher.department.as_deref().unwrap_or("-"),
                period(Period::P1),
                period(Period::P2),
                period(Period::P3),
                zone_cell(teacher.consistent_zone)
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Monthly Department Summary ({})", monthly.year);
    write_monthly(&mut output, &monthly.monthly);

    output
}

fn write_monthly(output: &mut String, months: &[MonthlyZoneCount]) {
    if months.is_empty() {
        let _ = writeln!(output, "No months in the reporting window.");
        return;
    }

    let _ = writeln!(
        output,
        "| Month | Green | Yellow | Red | Top Green Dept | Top Yellow Dept | Top Red Dept |"
    );
    let _ = writeln!(output, "|---|---|---|---|---|---|---|");
    for month in months {
        let _ = writeln!(
            output,
            "| {} | {} | {} | {} | {} | {} | {} |",
            month_name(month.month),
            month.green,
            month.yellow,
            month.red,
            cell(month.department(Zone::Green)),
            cell(month.department(Zone::Yellow)),
            cell(month.department(Zone::Red))
        );
    }
}
