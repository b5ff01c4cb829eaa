//! Simulated time.
//!
//! [`SimTime`] is a femtosecond timestamp plus the index of the settle pass
//! inside that step. [`TimeUnit`] and [`parse_duration`] turn durations such
//! as `"10ns"` from benches and config files into femtoseconds.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::SimError;

/// fs in 1 ps.
pub const FS_PER_PS: u64 = 1_000;
/// fs in 1 ns.
pub const FS_PER_NS: u64 = 1_000 * FS_PER_PS;
/// fs in 1 us.
pub const FS_PER_US: u64 = 1_000 * FS_PER_NS;
/// fs in 1 ms.
pub const FS_PER_MS: u64 = 1_000 * FS_PER_US;
/// fs in 1 s.
pub const FS_PER_S: u64 = 1_000 * FS_PER_MS;

/// A point in simulated time.
///
/// Orders by `fs`, then by `delta`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SimTime {
    /// Femtoseconds since the start of the run.
    pub fs: u64,
    /// Settle pass within the step at `fs`.
    pub delta: u32,
}

impl SimTime {
    /// The start of a run.
    pub fn zero() -> Self {
        Self::default()
    }

    /// `ns` nanoseconds, first pass.
    pub fn from_ns(ns: u64) -> Self {
        Self::from_fs(TimeUnit::Ns.to_fs(ns))
    }

    /// `fs` femtoseconds, first pass.
    pub fn from_fs(fs: u64) -> Self {
        Self { fs, delta: 0 }
    }

    /// The following settle pass of the same step.
    pub fn next_delta(&self) -> Self {
        Self {
            delta: self.delta + 1,
            ..*self
        }
    }

    /// The first pass of the step at `fs`, which must not lie in the past.
    pub fn advance_to(&self, fs: u64) -> Self {
        debug_assert!(fs >= self.fs, "time moved backwards: {} -> {fs}", self.fs);
        Self::from_fs(fs)
    }

    /// Whole nanoseconds, truncated.
    pub fn to_ns(&self) -> u64 {
        self.fs / FS_PER_NS
    }
}

impl Ord for SimTime {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.fs, self.delta).cmp(&(other.fs, other.delta))
    }
}

impl PartialOrd for SimTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = [TimeUnit::Ms, TimeUnit::Us, TimeUnit::Ns, TimeUnit::Ps]
            .into_iter()
            .find(|u| self.fs >= u.fs_per_unit() && self.fs % u.fs_per_unit() == 0)
            .unwrap_or(TimeUnit::Fs);
        write!(f, "{} {unit}", self.fs / unit.fs_per_unit())?;
        if self.delta > 0 {
            write!(f, "+d{}", self.delta)?;
        }
        Ok(())
    }
}

/// Unit attached to a duration given to a timer, clock, reset or watchdog.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    /// Femtoseconds.
    Fs,
    /// Picoseconds.
    Ps,
    /// Nanoseconds.
    #[default]
    Ns,
    /// Microseconds.
    Us,
    /// Milliseconds.
    Ms,
    /// Seconds.
    S,
}

impl TimeUnit {
    /// Femtoseconds in one unit.
    pub fn fs_per_unit(self) -> u64 {
        match self {
            TimeUnit::Fs => 1,
            TimeUnit::Ps => FS_PER_PS,
            TimeUnit::Ns => FS_PER_NS,
            TimeUnit::Us => FS_PER_US,
            TimeUnit::Ms => FS_PER_MS,
            TimeUnit::S => FS_PER_S,
        }
    }

    /// Converts `amount` of this unit to femtoseconds, saturating at `u64::MAX`.
    pub fn to_fs(self, amount: u64) -> u64 {
        amount.saturating_mul(self.fs_per_unit())
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TimeUnit::Fs => "fs",
            TimeUnit::Ps => "ps",
            TimeUnit::Ns => "ns",
            TimeUnit::Us => "us",
            TimeUnit::Ms => "ms",
            TimeUnit::S => "s",
        };
        f.write_str(s)
    }
}

impl FromStr for TimeUnit {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "fs" => Ok(TimeUnit::Fs),
            "ps" => Ok(TimeUnit::Ps),
            "ns" => Ok(TimeUnit::Ns),
            "us" => Ok(TimeUnit::Us),
            "ms" => Ok(TimeUnit::Ms),
            "s" => Ok(TimeUnit::S),
            other => Err(SimError::Config {
                reason: format!("unknown time unit '{other}' (use fs, ps, ns, us, ms, or s)"),
            }),
        }
    }
}

/// Parses a duration string like `"100ns"` or `"5 us"` into femtoseconds.
pub fn parse_duration(s: &str) -> Result<u64, SimError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(SimError::config("empty duration string"));
    }

    let digit_end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    if digit_end == 0 {
        return Err(SimError::config(format!(
            "invalid duration: no numeric value in '{s}'"
        )));
    }

    let number: u64 = s[..digit_end]
        .parse()
        .map_err(|_| SimError::config(format!("invalid number in duration '{s}'")))?;

    let unit = s[digit_end..].trim();
    if unit.is_empty() {
        return Err(SimError::config(format!(
            "missing unit in duration '{s}' (use fs, ps, ns, us, ms, or s)"
        )));
    }

    let unit: TimeUnit = unit.parse()?;
    Ok(unit.to_fs(number))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors() {
        assert_eq!(SimTime::zero(), SimTime { fs: 0, delta: 0 });
        assert_eq!(SimTime::from_ns(3).fs, 3_000_000);
        assert_eq!(SimTime::from_ns(3).to_ns(), 3);
        assert_eq!(SimTime::from_fs(2_999_999).to_ns(), 2);
    }

    #[test]
    fn deltas_stay_within_a_step() {
        let step = SimTime::from_ns(4).next_delta().next_delta();
        assert_eq!((step.to_ns(), step.delta), (4, 2));
        let later = step.advance_to(6 * FS_PER_NS);
        assert_eq!(later, SimTime::from_ns(6));
    }

    #[test]
    fn later_step_beats_any_delta() {
        let busy = SimTime { fs: 10, delta: 500 };
        assert!(SimTime::from_fs(11) > busy);
        assert!(busy > SimTime { fs: 10, delta: 499 });
    }

    #[test]
    fn display_picks_largest_exact_unit() {
        assert_eq!(SimTime::zero().to_string(), "0 fs");
        assert_eq!(SimTime::from_ns(7).to_string(), "7 ns");
        assert_eq!(SimTime::from_ns(2_000).to_string(), "2 us");
        assert_eq!(SimTime::from_fs(3 * FS_PER_MS).to_string(), "3 ms");
        assert_eq!(SimTime::from_fs(250 * FS_PER_PS).to_string(), "250 ps");
        assert_eq!(SimTime::from_fs(1_001).to_string(), "1001 fs");
        assert_eq!(SimTime::from_ns(9).next_delta().to_string(), "9 ns+d1");
    }

    #[test]
    fn unit_conversion_saturates() {
        assert_eq!(TimeUnit::Us.to_fs(2), 2 * FS_PER_US);
        assert_eq!(TimeUnit::Fs.to_fs(7), 7);
        assert_eq!(TimeUnit::S.to_fs(u64::MAX), u64::MAX);
    }

    #[test]
    fn unit_names_round_trip() {
        let units = [
            TimeUnit::Fs,
            TimeUnit::Ps,
            TimeUnit::Ns,
            TimeUnit::Us,
            TimeUnit::Ms,
            TimeUnit::S,
        ];
        for unit in units {
            assert_eq!(unit.to_string().parse::<TimeUnit>().unwrap(), unit);
        }
        assert!("hours".parse::<TimeUnit>().is_err());
    }

    #[test]
    fn parse_duration_accepts_spacing() {
        assert_eq!(parse_duration("10ns").unwrap(), 10 * FS_PER_NS);
        assert_eq!(parse_duration(" 5 us ").unwrap(), 5 * FS_PER_US);
        assert_eq!(parse_duration("1s").unwrap(), FS_PER_S);
    }

    #[test]
    fn parse_duration_reports_what_is_wrong() {
        let message = |s: &str| parse_duration(s).unwrap_err().to_string();
        assert!(message("").contains("empty"));
        assert!(message("us").contains("no numeric value"));
        assert!(message("12").contains("missing unit"));
        assert!(message("12 parsecs").contains("unknown time unit"));
    }

    #[test]
    fn serializes_as_plain_fields() {
        let t = SimTime { fs: 12, delta: 3 };
        let json = serde_json::to_value(t).unwrap();
        assert_eq!(json, serde_json::json!({ "fs": 12, "delta": 3 }));
        let unit: TimeUnit = serde_json::from_str("\"ms\"").unwrap();
        assert_eq!(unit, TimeUnit::Ms);
    }
}
