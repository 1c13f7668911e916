//! A single paired observation of both terminals.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Security queue times for both terminals at one instant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Reading {
    /// Terminal 1 queue, in minutes
    pub terminal1_minutes: u32,

    /// Terminal 2 queue, in minutes
    pub terminal2_minutes: u32,

    /// When the reading was taken
    pub observed_at: DateTime<Utc>,
}

impl Reading {
    pub fn new(terminal1_minutes: u32, terminal2_minutes: u32, observed_at: DateTime<Utc>) -> Self {
        Self {
            terminal1_minutes,
            terminal2_minutes,
            observed_at,
        }
    }

    /// Minutes for the given terminal.
    pub fn minutes(&self, terminal: Terminal) -> u32 {
        match terminal {
            Terminal::T1 => self.terminal1_minutes,
            Terminal::T2 => self.terminal2_minutes,
        }
    }
}

/// One of the airport's two terminals.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Terminal {
    T1,
    T2,
}

impl Terminal {
    pub const ALL: [Terminal; 2] = [Terminal::T1, Terminal::T2];

    /// Field name used in the time-series store and the chart legend.
    pub fn field(self) -> &'static str {
        match self {
            Terminal::T1 => "T1",
            Terminal::T2 => "T2",
        }
    }

    /// Human-readable label used in posts.
    pub fn label(self) -> &'static str {
        match self {
            Terminal::T1 => "Terminal 1",
            Terminal::T2 => "Terminal 2",
        }
    }

    /// Parse a store field name.
    pub fn from_field(field: &str) -> Option<Self> {
        match field {
            "T1" => Some(Terminal::T1),
            "T2" => Some(Terminal::T2),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_names_round_trip() {
        for terminal in Terminal::ALL {
            assert_eq!(Terminal::from_field(terminal.field()), Some(terminal));
        }
        assert_eq!(Terminal::from_field("T3"), None);
    }

    #[test]
    fn minutes_by_terminal() {
        let reading = Reading::new(12, 15, Utc::now());
        assert_eq!(reading.minutes(Terminal::T1), 12);
        assert_eq!(reading.minutes(Terminal::T2), 15);
    }
}
