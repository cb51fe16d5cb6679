use serde::{Deserialize, Serialize};

/// How the remaining countdown is rendered for people.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DisplayFormat {
    /// `3d 04:05:06`
    #[default]
    Clock,
    /// Raw remaining seconds.
    Seconds,
}

pub fn format_remaining(secs: u64, format: DisplayFormat) -> String {
    match format {
        DisplayFormat::Seconds => secs.to_string(),
        DisplayFormat::Clock => {
            let days = secs / 86_400;
            let hours = secs % 86_400 / 3_600;
            let minutes = secs % 3_600 / 60;
            let seconds = secs % 60;
            format!("{days}d {hours:02}:{minutes:02}:{seconds:02}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_format() {
        assert_eq!(format_remaining(864_000, DisplayFormat::Clock), "10d 00:00:00");
        assert_eq!(format_remaining(90_061, DisplayFormat::Clock), "1d 01:01:01");
        assert_eq!(format_remaining(0, DisplayFormat::Clock), "0d 00:00:00");
    }

    #[test]
    fn seconds_format() {
        assert_eq!(format_remaining(42, DisplayFormat::Seconds), "42");
    }
}
