/// Formatting helpers for log output
use time::macros::format_description;
use time::OffsetDateTime;

/// Format a timestamp as DD.MM.YYYY - HH:MM:SS, falling back to the default
/// representation if formatting fails.
pub fn format_datetime(dt: &OffsetDateTime) -> String {
    let format = format_description!("[day].[month].[year] - [hour]:[minute]:[second]");
    dt.format(format).unwrap_or_else(|_| dt.to_string())
}
