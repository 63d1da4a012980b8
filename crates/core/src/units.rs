// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Duration and size unit parsing: durations `{s,m,h,d,w}` to
//! seconds, sizes `{k,m,g}` to KiB.

use crate::error::ConfigError;
use std::time::Duration;

/// Parses a duration literal like `"30d"`, `"1h"`, `"90s"` into seconds.
pub fn parse_duration_secs(raw: &str) -> Result<u64, ConfigError> {
    let (number, unit) = split_number_unit(raw)?;
    let seconds_per_unit: u64 = match unit {
        's' => 1,
        'm' => 60,
        'h' => 3_600,
        'd' => 86_400,
        'w' => 604_800,
        other => return Err(ConfigError::InvalidUnit { raw: raw.to_string(), unit: other }),
    };
    Ok(number * seconds_per_unit)
}

pub fn parse_duration(raw: &str) -> Result<Duration, ConfigError> {
    Ok(Duration::from_secs(parse_duration_secs(raw)?))
}

/// Parses a size literal like `"10m"`, `"512k"` into KiB.
pub fn parse_size_kib(raw: &str) -> Result<u64, ConfigError> {
    let (number, unit) = split_number_unit(raw)?;
    let kib_per_unit: u64 = match unit {
        'k' => 1,
        'm' => 1_024,
        'g' => 1_048_576,
        other => return Err(ConfigError::InvalidUnit { raw: raw.to_string(), unit: other }),
    };
    Ok(number * kib_per_unit)
}

fn split_number_unit(raw: &str) -> Result<(u64, char), ConfigError> {
    let raw = raw.trim();
    let unit = raw
        .chars()
        .last()
        .ok_or_else(|| ConfigError::InvalidUnit { raw: raw.to_string(), unit: '\0' })?;
    let digits = &raw[..raw.len() - unit.len_utf8()];
    let number: u64 = digits
        .parse()
        .map_err(|_| ConfigError::InvalidUnit { raw: raw.to_string(), unit })?;
    Ok((number, unit.to_ascii_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use yare::parameterized;

    #[parameterized(
        seconds = { "45s", 45 },
        minutes = { "2m", 120 },
        hours = { "1h", 3600 },
        days = { "30d", 2_592_000 },
        weeks = { "1w", 604_800 },
        uppercase_unit = { "1D", 86_400 },
    )]
    fn parses_durations(raw: &str, expected: u64) {
        assert_eq!(parse_duration_secs(raw).unwrap(), expected);
    }

    #[parameterized(
        kib = { "512k", 512 },
        mib = { "10m", 10 * 1024 },
        gib = { "1g", 1024 * 1024 },
    )]
    fn parses_sizes(raw: &str, expected: u64) {
        assert_eq!(parse_size_kib(raw).unwrap(), expected);
    }

    #[test]
    fn rejects_unknown_unit() {
        assert!(parse_duration_secs("5x").is_err());
        assert!(parse_size_kib("5t").is_err());
    }

    #[test]
    fn rejects_non_numeric_amount() {
        assert!(parse_duration_secs("abcs").is_err());
    }
}
