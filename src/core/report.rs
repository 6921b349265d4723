//! Report generation business logic.
//!
//! Builds the per-class daily report (AM, PM and daily rates with status and
//! trend against the class's historical average) and filtered summary
//! reports, plus the text formatting used by the command line.

use crate::{
    core::{
        attendance::{get_all_entries, get_entries_for_date},
        class::get_all_classes,
        cumulative::{CumulativeLedger, Trend},
        rate::{RateStatus, combined_daily_rate, daily_rate, rate},
        summary::{AttendanceFigures, AttendanceSummary, RecordFilter, summarize},
        term::get_all_terms,
    },
    entities::{Session, attendance, class},
    errors::Result,
};
use chrono::NaiveDate;
use sea_orm::DatabaseConnection;

/// One class's line in a daily report.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassDayRow {
    /// The class reported on
    pub class: class::Model,
    /// AM rate, if AM was recorded
    pub am_rate: Option<u32>,
    /// PM rate, if PM was recorded
    pub pm_rate: Option<u32>,
    /// Two-stage daily rate; the single recorded session's rate when only one exists
    pub daily_rate: Option<u32>,
    /// Present over possible across both sessions, when both were recorded
    pub combined_rate: Option<u32>,
    /// Classification of `daily_rate`
    pub status: Option<RateStatus>,
    /// The class's mean per-entry rate over all history
    pub historical_average: u32,
    /// Daily rate against the historical average
    pub trend: Option<Trend>,
}

/// Attendance for every class on one date.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyReport {
    /// Date reported on
    pub date: NaiveDate,
    /// One row per class, in class order
    pub rows: Vec<ClassDayRow>,
    /// Summary over the date's entries
    pub summary: AttendanceSummary,
}

fn session_rate(entry: &attendance::Model) -> u32 {
    rate(
        u64::from(entry.total_present()),
        u64::from(entry.class_size()),
    )
}

/// Builds a daily report from loaded data.
///
/// Entries dated other than `date` are ignored. Each class gets one row with
/// its session rates, its daily rate and a trend against the ledger's
/// historical average. The summary aggregates the day's entries.
///
/// # Arguments
/// * `date` - Day being reported
/// * `classes` - Classes to list, in display order
/// * `entries` - Loaded entries, usually just the day's
/// * `ledger` - Source of each class's historical average
///
/// # Returns
/// The report rows and the summary of the day's entries.
#[must_use]
pub fn build_daily_report(
    date: NaiveDate,
    classes: &[class::Model],
    entries: &[attendance::Model],
    ledger: &CumulativeLedger,
) -> DailyReport {
    let todays: Vec<&attendance::Model> = entries.iter().filter(|e| e.date == date).collect();

    let rows = classes
        .iter()
        .map(|class| {
            let find = |session: Session| {
                todays
                    .iter()
                    .find(|e| e.class_id == class.id && e.session == session)
                    .copied()
            };
            let am = find(Session::Am);
            let pm = find(Session::Pm);
            let am_rate = am.map(session_rate);
            let pm_rate = pm.map(session_rate);

            let day_rate = match (am_rate, pm_rate) {
                (Some(a), Some(p)) => Some(daily_rate(a, p)),
                (Some(r), None) | (None, Some(r)) => Some(r),
                (None, None) => None,
            };
            let combined_rate = match (am, pm) {
                (Some(a), Some(p)) => Some(combined_daily_rate(
                    u64::from(a.total_present()),
                    u64::from(p.total_present()),
                    u64::from(a.class_size().max(p.class_size())),
                )),
                _ => None,
            };
            let historical_average = ledger.historical_average(class.id);

            ClassDayRow {
                class: class.clone(),
                am_rate,
                pm_rate,
                daily_rate: day_rate,
                combined_rate,
                status: day_rate.map(RateStatus::classify),
                historical_average,
                trend: day_rate.and_then(|r| Trend::classify(r, historical_average)),
            }
        })
        .collect();

    DailyReport {
        date,
        rows,
        summary: summarize(&todays),
    }
}

/// Loads the date's entries and builds its daily report.
pub async fn generate_daily_report(
    db: &DatabaseConnection,
    date: NaiveDate,
    ledger: &CumulativeLedger,
) -> Result<DailyReport> {
    let classes = get_all_classes(db).await?;
    let entries = get_entries_for_date(db, date).await?;
    Ok(build_daily_report(date, &classes, &entries, ledger))
}

/// Summary over a filtered set of entries, overall and per class.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryReport {
    /// Filter the entries were selected with
    pub filter: RecordFilter,
    /// Summary of every selected entry
    pub overall: AttendanceSummary,
    /// Summary per class that has selected entries, in class order
    pub per_class: Vec<(class::Model, AttendanceSummary)>,
}

/// Selects entries with `filter` and summarizes them.
pub async fn generate_summary_report(
    db: &DatabaseConnection,
    filter: RecordFilter,
) -> Result<SummaryReport> {
    let classes = get_all_classes(db).await?;
    let terms = get_all_terms(db).await?;
    let entries = get_all_entries(db).await?;
    let selected = filter.apply(&entries, &classes, &terms);

    let per_class = classes
        .into_iter()
        .filter_map(|class| {
            let own: Vec<&attendance::Model> = selected
                .iter()
                .filter(|e| e.class_id == class.id)
                .copied()
                .collect();
            if own.is_empty() {
                None
            } else {
                Some((class, summarize(&own)))
            }
        })
        .collect();

    Ok(SummaryReport {
        overall: summarize(&selected),
        filter,
        per_class,
    })
}

/// Generates a progress bar string for a rate.
///
/// Creates a text-based progress bar like: `[████████░░] 80%`
#[must_use]
pub fn format_progress_bar(rate: u32, bar_length: Option<usize>) -> String {
    let length = bar_length.unwrap_or(10);
    let clamped = rate.min(100);

    // Cast safety: clamped ∈ [0, 100], length is small (10-20).
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let filled = ((f64::from(clamped) / 100.0) * length as f64).round() as usize;
    let empty = length.saturating_sub(filled);

    format!("[{}{}] {rate}%", "█".repeat(filled), "░".repeat(empty))
}

/// Arrow for a trend, `-` when there is nothing to compare with.
#[must_use]
pub const fn format_trend(trend: Option<Trend>) -> &'static str {
    match trend {
        Some(Trend::Positive) => "▲",
        Some(Trend::Neutral) => "▶",
        Some(Trend::Negative) => "▼",
        None => "-",
    }
}

fn format_optional_rate(rate: Option<u32>) -> String {
    rate.map_or_else(|| "--".to_string(), |r| format!("{r}%"))
}

/// Multi-line summary block.
#[must_use]
pub fn format_summary(summary: &AttendanceSummary) -> String {
    [
        format!(
            "Records: {} over {} day(s)",
            summary.total_records, summary.total_days
        ),
        format!(
            "Present: {} of {} possible",
            summary.total_present, summary.total_possible
        ),
        format!(
            "Average: {} ({})",
            format_progress_bar(summary.average_attendance, None),
            RateStatus::classify(summary.average_attendance)
        ),
        format!(
            "Male: {}%  Female: {}%",
            summary.male_attendance, summary.female_attendance
        ),
    ]
    .join("\n")
}

fn format_table_line(columns: [&str; 8]) -> String {
    let [class, year, am, pm, day, status, avg, trend] = columns;
    format!("{class:<10} {year:<10} {am:>5} {pm:>5} {day:>6}  {status:<8} {avg:>5} {trend}")
}

/// Daily report as a text table.
#[must_use]
pub fn format_daily_report(report: &DailyReport) -> String {
    let mut lines = vec![format!(
        "Attendance for {}",
        report.date.format("%A %d %B %Y")
    )];

    if report.rows.is_empty() {
        lines.push("No classes set up yet.\n".to_string());
        return lines.join("\n");
    }

    lines.push(format_table_line([
        "Class", "Year", "AM", "PM", "Day", "Status", "Avg", "Trend",
    ]));
    for row in &report.rows {
        lines.push(format_table_line([
            row.class.code.as_str(),
            row.class.year_group.as_str(),
            format_optional_rate(row.am_rate).as_str(),
            format_optional_rate(row.pm_rate).as_str(),
            format_optional_rate(row.daily_rate).as_str(),
            row.status.map_or("-", RateStatus::as_str),
            format!("{}%", row.historical_average).as_str(),
            format_trend(row.trend),
        ]));
    }
    lines.push(String::new());
    lines.push(format_summary(&report.summary));
    lines.join("\n")
}
