use chrono::Duration;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use chrono::NaiveTime;
use std::fmt::Display;

/// How a numeric cell should be presented, resolved from its number format.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub(crate) enum NumberFormat {
    #[default]
    Number,
    /// Date values stored as serial days
    Date { is_1904: bool },
    /// Time values stored as a fraction of a day
    Time,
    /// Date/time values stored as serial days with a fractional time part
    DateTime { is_1904: bool },
}

impl NumberFormat {
    /// Parses built-in Excel number format IDs.
    pub(crate) fn parse_builtin_number_format_id(id: &str, is_1904: bool) -> Option<Self> {
        match id {
            "22" => Some(Self::DateTime { is_1904 }),
            "14" | "15" | "16" | "17" => Some(Self::Date { is_1904 }),
            "18" | "19" | "20" | "21" | "45" | "46" | "47" => Some(Self::Time),
            _ => None,
        }
    }

    /// Parses custom number format strings looking for date/time tokens
    /// outside literals, escapes and bracketed sections.
    pub(crate) fn parse_custom_number_format(format: &str, is_1904: bool) -> Self {
        let mut is_escaped = false;
        let mut is_literal = false;
        let mut is_date = false;
        let mut is_time = false;
        let mut is_color = false;
        for character in format.chars() {
            match character {
                _ if is_escaped => is_escaped = false,
                '_' | '\\' if !is_escaped => is_escaped = true,

                '"' if is_literal => is_literal = false,
                '"' if !is_literal && !is_color => is_literal = true,

                ']' if is_color => is_color = false,
                '[' if !is_color && !is_literal => is_color = true,
                _ if is_literal || is_color => (),

                'Y' | 'y' | 'D' | 'd' => is_date = true,
                'H' | 'h' | 'S' | 's' => is_time = true,
                _ => (),
            }
        }

        match (is_date, is_time) {
            (true, true) => Self::DateTime { is_1904 },
            (true, false) => Self::Date { is_1904 },
            (false, true) => Self::Time,
            (false, false) => Self::Number,
        }
    }

    /// Converts a raw numeric value into a typed cell value.
    pub(crate) fn to_cell_value(self, value: f64) -> CellValue {
        match self {
            Self::Number => CellValue::Number(value),
            Self::Time => CellValue::Time(to_time(value)),
            Self::Date { is_1904 } | Self::DateTime { is_1904 } => match to_datetime(value, is_1904) {
                Some(datetime) => CellValue::DateTime(datetime),
                None => CellValue::Number(value),
            },
        }
    }
}

/// Converts Excel error codes to their display strings.
pub(crate) fn to_error_value(value: u8) -> &'static str {
    match value {
        0x00 => "#NULL!",
        0x07 => "#DIV/0!",
        0x0F => "#VALUE!",
        0x17 => "#REF!",
        0x1D => "#NAME?",
        0x24 => "#NUM!",
        0x2A => "#N/A",
        0x2B => "#GETTING_DATA",
        _ => "#ERROR!",
    }
}

/// A single spreadsheet cell value.
///
/// The `Display` form is what the hostname rules see: integral numbers drop
/// their fractional part, booleans render as `True`/`False` and dates as
/// `YYYY-MM-DD HH:MM:SS`.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Boolean(bool),
    DateTime(NaiveDateTime),
    Time(NaiveTime),
    Error(String),
}

impl CellValue {
    /// True for missing cells and empty strings.
    /// Whitespace-only text is not blank.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(text) => text.is_empty(),
            _ => false,
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => Ok(()),
            Self::Text(text) => write!(f, "{}", text),
            Self::Number(number) if number.fract() == 0.0 && number.abs() < 1e15 => {
                write!(f, "{}", *number as i64)
            }
            Self::Number(number) => write!(f, "{}", number),
            Self::Boolean(true) => write!(f, "True"),
            Self::Boolean(false) => write!(f, "False"),
            Self::DateTime(datetime) => write!(f, "{}", datetime.format("%Y-%m-%d %H:%M:%S")),
            Self::Time(time) => write!(f, "{}", time.format("%H:%M:%S")),
            Self::Error(code) => write!(f, "{}", code),
        }
    }
}

/// Converts an Excel serial number to a date/time.
/// Handles the Lotus 1-2-3 leap year bug for the 1900 epoch.
pub(crate) fn to_datetime(value: f64, is_1904: bool) -> Option<NaiveDateTime> {
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    let days = value.trunc() as i64;
    let offset = if is_1904 {
        1462
    } else if days < 60 {
        1
    } else {
        0
    };
    let date = NaiveDate::from_ymd_opt(1899, 12, 30)?.checked_add_signed(Duration::days(days + offset))?;
    Some(date.and_time(to_time(value)))
}

/// Converts the fractional part of an Excel serial number to a time of day.
pub(crate) fn to_time(value: f64) -> NaiveTime {
    let milliseconds = (value.fract().abs() * 86_400_000f64).round() as i64;
    NaiveTime::MIN + Duration::milliseconds(milliseconds % 86_400_000)
}

/// Parses ISO 8601 values stored in cells of type `d`.
pub(crate) fn parse_iso_datetime(value: &str) -> Option<NaiveDateTime> {
    if value.contains('T') {
        NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f").ok()
    } else {
        NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .ok()
            .map(|date| date.and_time(NaiveTime::MIN))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_like_the_hostname_rules_expect() {
        assert_eq!(CellValue::Number(1234.0).to_string(), "1234");
        assert_eq!(CellValue::Number(1.5).to_string(), "1.5");
        assert_eq!(CellValue::Boolean(true).to_string(), "True");
        assert_eq!(CellValue::Empty.to_string(), "");
        assert_eq!(CellValue::from("web01").to_string(), "web01");
    }

    #[test]
    fn converts_serial_dates() {
        let datetime = to_datetime(45292.5, false).map(|it| it.to_string());
        assert_eq!(datetime.as_deref(), Some("2024-01-01 12:00:00"));
        let datetime = to_datetime(1.0, false).map(|it| it.to_string());
        assert_eq!(datetime.as_deref(), Some("1900-01-01 00:00:00"));
        let datetime = to_datetime(0.0, true).map(|it| it.to_string());
        assert_eq!(datetime.as_deref(), Some("1904-01-01 00:00:00"));
    }

    #[test]
    fn detects_custom_formats() {
        assert_eq!(NumberFormat::parse_custom_number_format("yyyy-mm-dd", false), NumberFormat::Date { is_1904: false });
        assert_eq!(NumberFormat::parse_custom_number_format("hh:mm", true), NumberFormat::Time);
        assert_eq!(NumberFormat::parse_custom_number_format("\"Day\" 0", false), NumberFormat::Number);
        assert_eq!(NumberFormat::parse_custom_number_format("[Red]0.00", false), NumberFormat::Number);
    }

    #[test]
    fn blank_cells() {
        assert!(CellValue::Empty.is_blank());
        assert!(CellValue::from("").is_blank());
        assert!(!CellValue::from(" ").is_blank());
        assert!(!CellValue::Number(0.0).is_blank());
    }
}
