//! Human-readable byte sizes for disk usage reporting

use std::fmt;

const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Byte count rendered with binary units
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct ByteSize(pub u64);

impl ByteSize {
    /// `1536` -> `"1.5KB"`, `1024` -> `"1KB"`; one decimal at most
    pub fn to_human_readable(&self) -> String {
        let mut unit = 0;
        let mut scaled = self.0 as f64;
        while scaled >= 1024.0 && unit < UNITS.len() - 1 {
            scaled /= 1024.0;
            unit += 1;
        }

        let tenths = (scaled * 10.0).floor() / 10.0;
        if unit == 0 || tenths.fract() == 0.0 {
            format!("{}{}", tenths as u64, UNITS[unit])
        } else {
            format!("{:.1}{}", tenths, UNITS[unit])
        }
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_human_readable())
    }
}

/// Disk usage of one database before and after a prune
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpaceUsage {
    pub before: ByteSize,
    pub after: ByteSize,
}

impl SpaceUsage {
    pub fn new(before: u64, after: u64) -> Self {
        Self {
            before: ByteSize(before),
            after: ByteSize(after),
        }
    }

    /// Bytes freed; zero when the database grew (tombstones not yet compacted)
    pub fn reclaimed(&self) -> ByteSize {
        ByteSize(self.before.0.saturating_sub(self.after.0))
    }
}

impl fmt::Display for SpaceUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} (reclaimed {})",
            self.before,
            self.after,
            self.reclaimed()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_human_readable() {
        assert_eq!(ByteSize(0).to_human_readable(), "0B");
        assert_eq!(ByteSize(1023).to_human_readable(), "1023B");
        assert_eq!(ByteSize(1024).to_human_readable(), "1KB");
        assert_eq!(ByteSize(1536).to_human_readable(), "1.5KB");
        assert_eq!(ByteSize(5 * 1024 * 1024).to_human_readable(), "5MB");
        assert_eq!(ByteSize(50 * 1024 * 1024 * 1024).to_human_readable(), "50GB");
    }

    #[test]
    fn test_largest_unit_caps() {
        let petabyte = 1024u64.pow(5);
        assert_eq!(ByteSize(petabyte).to_human_readable(), "1024TB");
    }

    #[test]
    fn test_reclaimed_space() {
        let usage = SpaceUsage::new(3 * 1024 * 1024, 1024 * 1024);
        assert_eq!(usage.reclaimed(), ByteSize(2 * 1024 * 1024));
        assert_eq!(format!("{}", usage), "3MB -> 1MB (reclaimed 2MB)");
    }

    #[test]
    fn test_growth_reports_nothing_reclaimed() {
        let usage = SpaceUsage::new(100, 200);
        assert_eq!(usage.reclaimed(), ByteSize(0));
    }
}
