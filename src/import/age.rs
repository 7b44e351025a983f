use super::sheet::{excel_serial_to_date, Cell};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};

pub const MAX_BIRTH_DATE_AGE: i32 = 100;
pub const MAX_DIRECT_AGE: i64 = 100;

/// Formats tried after the slash and dash forms fail.
const FALLBACK_DATE_FORMATS: [&str; 8] = [
    "%Y/%m/%d",
    "%d.%m.%Y",
    "%Y.%m.%d",
    "%d %B %Y",
    "%d %b %Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%Y%m%d",
];

const FALLBACK_DATETIME_FORMATS: [&str; 3] =
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%d/%m/%Y %H:%M:%S"];

pub fn parse_birth_date(cell: &Cell) -> Option<NaiveDate> {
    match cell {
        Cell::Date(d) => Some(*d),
        Cell::Number(n) => excel_serial_to_date(*n),
        Cell::Text(s) => parse_date_text(s),
        Cell::Empty | Cell::Bool(_) => None,
    }
}

pub fn parse_date_text(raw: &str) -> Option<NaiveDate> {
    let t = raw.trim();
    if t.is_empty() {
        return None;
    }
    let head = t.split_whitespace().next().unwrap_or(t);
    parse_slash_date(head)
        .or_else(|| parse_dash_date(head))
        .or_else(|| parse_generic_date(t))
}

fn numeric_parts(s: &str, sep: char) -> Option<Vec<&str>> {
    let parts: Vec<&str> = s.split(sep).map(str::trim).collect();
    if parts.len() != 3 {
        return None;
    }
    if parts
        .iter()
        .any(|p| p.is_empty() || !p.chars().all(|c| c.is_ascii_digit()))
    {
        return None;
    }
    Some(parts)
}

fn ymd(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    if year.len() != 4 {
        return None;
    }
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
}

/// `d/m/y`
fn parse_slash_date(s: &str) -> Option<NaiveDate> {
    let p = numeric_parts(s, '/')?;
    ymd(p[2], p[1], p[0])
}

/// `y-m-d` when the first part is a four digit year, `d-m-y` otherwise.
fn parse_dash_date(s: &str) -> Option<NaiveDate> {
    let p = numeric_parts(s, '-')?;
    if p[0].len() == 4 {
        ymd(p[0], p[1], p[2])
    } else {
        ymd(p[2], p[1], p[0])
    }
}

fn parse_generic_date(s: &str) -> Option<NaiveDate> {
    let parsed = DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.date_naive())
        .ok()
        .or_else(|| {
            FALLBACK_DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                .map(|dt| dt.date())
        })
        .or_else(|| {
            FALLBACK_DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        })?;
    // `%Y` happily reads "19" as year 19.
    (parsed.year() >= 1000).then_some(parsed)
}

/// Whole years between `birth` and `today`, one less while this year's
/// anniversary is still ahead.
pub fn age_on(birth: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - birth.year();
    if (today.month(), today.day()) < (birth.month(), birth.day()) {
        age -= 1;
    }
    age
}

pub fn age_from_birth_date(cell: &Cell, today: NaiveDate) -> Option<u32> {
    let birth = parse_birth_date(cell)?;
    let age = age_on(birth, today);
    if (0..=MAX_BIRTH_DATE_AGE).contains(&age) {
        Some(age as u32)
    } else {
        None
    }
}

/// Age typed directly into the sheet: a whole number in `1..=100`.
pub fn age_from_age_cell(cell: &Cell) -> Option<u32> {
    let n: i64 = match cell {
        Cell::Number(n) if n.fract() == 0.0 && n.is_finite() => *n as i64,
        Cell::Text(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    if n > 0 && n <= MAX_DIRECT_AGE {
        Some(n as u32)
    } else {
        None
    }
}
