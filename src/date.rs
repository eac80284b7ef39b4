//! PDF date strings: `D:YYYYMMDDHHmmSS+HH'mm'`.

use chrono::{DateTime, FixedOffset, NaiveDate, Offset, TimeZone};

/// Format a timestamp as a PDF date.
pub fn pdf_date<Tz: TimeZone>(time: &DateTime<Tz>) -> String {
    let offset = time.offset().fix().local_minus_utc();
    let sign = if offset < 0 { '-' } else { '+' };
    let minutes = offset.abs() / 60;
    format!(
        "D:{}{}{:02}'{:02}'",
        time.naive_local().format("%Y%m%d%H%M%S"),
        sign,
        minutes / 60,
        minutes % 60
    )
}

/// The current local time as a PDF date.
pub fn now() -> String {
    pdf_date(&chrono::Local::now())
}

/// Parse a PDF date.
///
/// Surrounding parentheses are ignored, and every field after the year is
/// optional as the format allows. A missing offset means UTC.
pub fn parse_pdf_date(text: &str) -> Option<DateTime<FixedOffset>> {
    let text = text.trim();
    let text = text.strip_prefix('(').and_then(|t| t.strip_suffix(')')).unwrap_or(text);
    let text = text.strip_prefix("D:")?;

    let digits_end = text.find(|c: char| !c.is_ascii_digit()).unwrap_or(text.len());
    let (digits, zone) = text.split_at(digits_end);
    if digits.len() < 4 || digits.len() % 2 != 0 || digits.len() > 14 {
        return None;
    }
    let field = |start: usize, default: u32| -> Option<u32> {
        match digits.get(start..start + 2) {
            Some(s) => s.parse().ok(),
            None => Some(default),
        }
    };
    let year: i32 = digits[..4].parse().ok()?;
    let date = NaiveDate::from_ymd_opt(year, field(4, 1)?, field(6, 1)?)?;
    let naive = date.and_hms_opt(field(8, 0)?, field(10, 0)?, field(12, 0)?)?;

    let offset = parse_offset(zone)?;
    offset.from_local_datetime(&naive).single()
}

fn parse_offset(zone: &str) -> Option<FixedOffset> {
    let sign = match zone.chars().next() {
        None | Some('Z') => return FixedOffset::east_opt(0),
        Some('+') => 1,
        Some('-') => -1,
        Some(_) => return None,
    };
    let parts: Vec<&str> = zone[1..].split('\'').filter(|p| !p.is_empty()).collect();
    let hours: i32 = parts.first()?.parse().ok()?;
    let minutes: i32 = match parts.get(1) {
        Some(m) => m.parse().ok()?,
        None => 0,
    };
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_format_with_offset() {
        let offset = FixedOffset::east_opt(-(5 * 3600 + 30 * 60)).unwrap();
        let time = offset.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(pdf_date(&time), "D:20240309140507-05'30'");

        let utc = chrono::Utc.with_ymd_and_hms(1999, 12, 31, 23, 59, 59).unwrap();
        assert_eq!(pdf_date(&utc), "D:19991231235959+00'00'");
    }

    #[test]
    fn test_parse_round_trip() {
        let parsed = parse_pdf_date("(D:20240309140507-05'30')").unwrap();
        assert_eq!(pdf_date(&parsed), "D:20240309140507-05'30'");
    }

    #[test]
    fn test_parse_partial() {
        let parsed = parse_pdf_date("D:2023").unwrap();
        assert_eq!((parsed.year(), parsed.month(), parsed.day(), parsed.hour()), (2023, 1, 1, 0));
        let parsed = parse_pdf_date("D:202306151230Z").unwrap();
        assert_eq!((parsed.hour(), parsed.minute()), (12, 30));
        assert_eq!(parse_pdf_date("D:20230615+02").unwrap().offset().local_minus_utc(), 7200);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_pdf_date("20230615").is_none());
        assert!(parse_pdf_date("D:20231345").is_none());
        assert!(parse_pdf_date("D:202").is_none());
    }
}
