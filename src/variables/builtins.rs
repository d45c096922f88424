use chrono::{NaiveDateTime, Timelike};
use regex::{Captures, Regex};
use std::sync::LazyLock;

/// Text substituted for `{location}`
pub const LOCATION: &str = "Unknown Location";

/// Matches exactly the fixed placeholder vocabulary
static PLACEHOLDER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\{(date_long|datetime|date|time_ampm|time|weekday|month|year|greeting|location)\}",
    )
    .expect("Invalid placeholder regex")
});

/// Substitute every placeholder token in `text`, evaluated at `now`
///
/// Anything in braces that is not part of the vocabulary is left alone, so
/// nested references like `{/sig}` survive for the resolver.
pub fn expand_placeholders(text: &str, now: &NaiveDateTime) -> String {
    PLACEHOLDER_REGEX
        .replace_all(text, |caps: &Captures| {
            expand_single_placeholder(&caps[1], now).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Value of one vocabulary entry; `None` for names outside it
fn expand_single_placeholder(name: &str, now: &NaiveDateTime) -> Option<String> {
    let value = match name {
        "date" => now.format("%Y-%m-%d").to_string(),
        "date_long" => now.format("%B %-d, %Y").to_string(),
        "time" => now.format("%H:%M").to_string(),
        "time_ampm" => now.format("%-I:%M %p").to_string(),
        "datetime" => now.format("%Y-%m-%d %H:%M").to_string(),
        "weekday" => now.format("%A").to_string(),
        "month" => now.format("%B").to_string(),
        "year" => now.format("%Y").to_string(),
        "greeting" => greeting(now.hour()).to_string(),
        "location" => LOCATION.to_string(),
        _ => return None,
    };
    Some(value)
}

/// Time-of-day greeting for a 24h hour
pub fn greeting(hour: u32) -> &'static str {
    match hour {
        5..=10 => "Good Morning",
        11..=16 => "Good Afternoon",
        17..=21 => "Good Evening",
        _ => "Hello",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    #[test]
    fn test_date_and_time_tokens() {
        let now = at(14, 7);
        assert_eq!(expand_placeholders("{date}", &now), "2024-03-05");
        assert_eq!(expand_placeholders("{date_long}", &now), "March 5, 2024");
        assert_eq!(expand_placeholders("{time}", &now), "14:07");
        assert_eq!(expand_placeholders("{time_ampm}", &now), "2:07 PM");
        assert_eq!(expand_placeholders("{datetime}", &now), "2024-03-05 14:07");
        assert_eq!(expand_placeholders("{weekday}", &now), "Tuesday");
        assert_eq!(expand_placeholders("{month}", &now), "March");
        assert_eq!(expand_placeholders("{year}", &now), "2024");
        assert_eq!(expand_placeholders("{location}", &now), LOCATION);
    }

    #[test]
    fn test_greeting_boundaries() {
        assert_eq!(greeting(4), "Hello");
        assert_eq!(greeting(5), "Good Morning");
        assert_eq!(greeting(10), "Good Morning");
        assert_eq!(greeting(11), "Good Afternoon");
        assert_eq!(greeting(16), "Good Afternoon");
        assert_eq!(greeting(17), "Good Evening");
        assert_eq!(greeting(21), "Good Evening");
        assert_eq!(greeting(22), "Hello");
        assert_eq!(greeting(0), "Hello");
    }

    #[test]
    fn test_unknown_and_nested_tokens_untouched() {
        let now = at(9, 0);
        let text = "{Date} {nope} {/sig} {greeting}";
        assert_eq!(
            expand_placeholders(text, &now),
            "{Date} {nope} {/sig} Good Morning"
        );
    }

    #[test]
    fn test_single_placeholder_outside_vocabulary() {
        let now = at(9, 0);
        assert_eq!(expand_single_placeholder("greeting", &now).as_deref(), Some("Good Morning"));
        assert_eq!(expand_single_placeholder("Date", &now), None);
        assert_eq!(expand_single_placeholder("/sig", &now), None);
    }

    #[test]
    fn test_expansion_is_idempotent() {
        let now = at(9, 0);
        let once = expand_placeholders("Hi {greeting}, it is {weekday}", &now);
        assert_eq!(expand_placeholders(&once, &now), once);
    }
}
