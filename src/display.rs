//! Text the UI shell puts on screen: panel label and due-date strings.
use chrono::{DateTime, Duration, TimeZone, Utc};

pub const LOADING_TEXT: &str = "Loading Canvas assignments...";
pub const EMPTY_TEXT: &str = "📚 No upcoming assignments";
pub const FETCH_ERROR_TEXT: &str = "⚠ Error fetching assignments";

/// Long form for menus, e.g. `Tue, Oct 20, 11:59 PM`.
pub fn format_due<Tz: TimeZone>(due: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    due.format("%a, %b %-d, %I:%M %p").to_string()
}

/// Compact form for the panel: `Today 9:05`, `Tomorrow 23:59`, or
/// `Oct 21, 09:05 PM` further out. Day boundaries follow `tz`.
pub fn format_due_short<Tz: TimeZone>(due: DateTime<Utc>, now: DateTime<Utc>, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let due = due.with_timezone(tz);
    let today = now.with_timezone(tz).date_naive();
    let day = due.date_naive();
    if day == today {
        format!("Today {}", due.format("%-H:%M"))
    } else if Some(day) == today.checked_add_signed(Duration::days(1)) {
        format!("Tomorrow {}", due.format("%-H:%M"))
    } else {
        due.format("%b %-d, %I:%M %p").to_string()
    }
}

/// Panel label for the assignment currently in rotation.
pub fn panel_label(display_name: &str, due_short: &str) -> String {
    format!("📚 {} ({})", display_name, due_short)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn short_format_today_and_tomorrow() {
        let now = at(2026, 10, 19, 8, 0);
        assert_eq!(format_due_short(at(2026, 10, 19, 9, 5), now, &Utc), "Today 9:05");
        assert_eq!(
            format_due_short(at(2026, 10, 20, 23, 59), now, &Utc),
            "Tomorrow 23:59"
        );
        assert_eq!(
            format_due_short(at(2026, 10, 21, 21, 5), now, &Utc),
            "Oct 21, 09:05 PM"
        );
    }

    #[test]
    fn short_format_uses_local_day_boundaries() {
        // 02:00 UTC on the 20th is still the 19th in UTC-5.
        let tz = FixedOffset::west_opt(5 * 3600).unwrap();
        let now = at(2026, 10, 19, 15, 0);
        assert_eq!(format_due_short(at(2026, 10, 20, 2, 0), now, &tz), "Today 21:00");
    }

    #[test]
    fn long_format() {
        assert_eq!(format_due(&at(2026, 10, 20, 23, 59)), "Tue, Oct 20, 11:59 PM");
    }

    #[test]
    fn panel_label_wraps_name_and_date() {
        assert_eq!(
            panel_label("CS 50: Pset 3", "Today 9:05"),
            "📚 CS 50: Pset 3 (Today 9:05)"
        );
    }
}
