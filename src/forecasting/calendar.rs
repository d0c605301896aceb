//! Month arithmetic shared by the forecast and history windows.

use chrono::{Datelike, Months, NaiveDate};

pub fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

pub fn last_of_month(date: NaiveDate) -> NaiveDate {
    first_of_month(date)
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .unwrap_or(date)
}

/// Adds calendar months, clamping the day to the target month's length.
pub fn add_months(date: NaiveDate, months: u32) -> NaiveDate {
    date.checked_add_months(Months::new(months))
        .unwrap_or(NaiveDate::MAX)
}

pub fn sub_months(date: NaiveDate, months: u32) -> NaiveDate {
    date.checked_sub_months(Months::new(months))
        .unwrap_or(NaiveDate::MIN)
}

/// Last day of the calendar quarter containing `date`.
pub fn quarter_end(date: NaiveDate) -> NaiveDate {
    let quarter_last_month = ((date.month0() / 3) + 1) * 3;
    NaiveDate::from_ymd_opt(date.year(), quarter_last_month, 1)
        .map(last_of_month)
        .unwrap_or(date)
}

pub fn year_end(date: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(date.year(), 12, 31).unwrap_or(date)
}

/// `YYYY-MM` bucket key.
pub fn month_key(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}

/// Short human label such as `Oct 2026`.
pub fn month_label(date: NaiveDate) -> String {
    date.format("%b %Y").to_string()
}

/// First days of every month from `start`'s month while the month start is
/// not after `end`. A partially covered final month is included.
pub fn month_starts(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    let mut cursor = Some(first_of_month(start));
    std::iter::from_fn(move || {
        let current = cursor.filter(|month| *month <= end)?;
        cursor = current.checked_add_months(Months::new(1));
        Some(current)
    })
}
