//! Post text formatting.

use std::fmt::Display;

use chrono::{DateTime, TimeZone};

use crate::models::{Reading, Terminal};

/// Value the airport site reports when a queue is at its ceiling.
pub const SATURATED_MINUTES: u32 = 60;

/// Appended when either terminal is saturated.
pub const PEAK_WARNING: &str =
    "WARNING: Allow yourself extra time to get through security. A terminal is peaking.";

/// Build the status post for a reading, stamped with local time `now`.
pub fn compose_post<Tz>(reading: &Reading, now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let mut post = format!(
        "Current times - {}\n{}\n{}",
        now.format("%A, %d/%m/%Y %H:%M"),
        terminal_line(reading, Terminal::T1),
        terminal_line(reading, Terminal::T2),
    );

    if is_peaking(reading) {
        post.push_str("\n\n");
        post.push_str(PEAK_WARNING);
    }

    post
}

/// True when either terminal reports exactly the saturation value.
pub fn is_peaking(reading: &Reading) -> bool {
    Terminal::ALL
        .iter()
        .any(|&t| reading.minutes(t) == SATURATED_MINUTES)
}

fn terminal_line(reading: &Reading, terminal: Terminal) -> String {
    format!("{}: {} minutes", terminal.label(), reading.minutes(terminal))
}
