//! Wall-clock stamps for broadcasts and room logs

use chrono::Utc;

/// Current UTC time as `[HH:MM:SS]`, prefixed to broadcasts and private messages
pub fn timestamp() -> String {
    Utc::now().format("[%H:%M:%S]").to_string()
}

/// Current UTC date and time in long form, used in room log headers
pub fn long_date() -> String {
    Utc::now().format("%a %b %e %H:%M:%S %Y").to_string()
}
