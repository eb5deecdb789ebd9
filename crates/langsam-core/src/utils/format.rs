use chrono::{Datelike, NaiveDate};

const MONTHS_DE: [&str; 12] = [
    "Januar",
    "Februar",
    "März",
    "April",
    "Mai",
    "Juni",
    "Juli",
    "August",
    "September",
    "Oktober",
    "November",
    "Dezember",
];

/// Format a playback position as `m:ss`.
pub fn format_time(seconds: f64) -> String {
    if !seconds.is_finite() || seconds <= 0.0 {
        return "0:00".to_string();
    }
    let minutes = (seconds / 60.0).floor() as u64;
    let secs = (seconds % 60.0).floor() as u64;
    format!("{}:{:02}", minutes, secs)
}

/// Format a narration length as whole minutes, rounded up ("3 Min.").
/// Unknown or zero lengths have no label.
pub fn format_minutes(seconds: f64) -> Option<String> {
    if !seconds.is_finite() || seconds <= 0.0 {
        return None;
    }
    Some(format!("{} Min.", (seconds / 60.0).ceil() as u64))
}

/// Format a calendar date the German way ("15. Januar 2024").
pub fn format_date_de(date: NaiveDate) -> String {
    format!(
        "{}. {} {}",
        date.day(),
        MONTHS_DE[date.month0() as usize],
        date.year()
    )
}
