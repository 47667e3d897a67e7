use crate::error::{Result, VoldockError};
use std::time::Duration;

const KIB: u64 = 1024;
const MIB: u64 = 1024 * KIB;
const GIB: u64 = 1024 * MIB;
const TIB: u64 = 1024 * GIB;
const PIB: u64 = 1024 * TIB;

/// Byte-unit suffixes accepted by the size grammar, smallest first.
///
/// Multipliers are binary: "1KB" is 1024 bytes.
pub const SIZE_UNITS: &[(&str, u64)] = &[
    ("B", 1),
    ("KB", KIB),
    ("MB", MIB),
    ("GB", GIB),
    ("TB", TIB),
    ("PB", PIB),
];

/// Parse a size string (e.g., "10MB", "1GB", "512KB") into bytes
///
/// The grammar is `<digits><unit>` with no whitespace. A missing or
/// unrecognized unit, a missing number, overflow, or a zero result are all
/// errors.
pub fn parse_size(s: &str) -> Result<u64> {
    let split = s
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    let (digits, unit) = s.split_at(split);

    if digits.is_empty() {
        return Err(VoldockError::size_parse(s, "no leading digits"));
    }

    if unit.is_empty() {
        return Err(VoldockError::size_parse(s, "missing unit suffix"));
    }

    let multiplier = SIZE_UNITS
        .iter()
        .find(|(suffix, _)| *suffix == unit)
        .map(|(_, m)| *m)
        .ok_or_else(|| VoldockError::size_parse(s, format!("unrecognized unit {:?}", unit)))?;

    let value: u64 = digits
        .parse()
        .map_err(|e| VoldockError::size_parse(s, format!("invalid number: {}", e)))?;

    let bytes = value
        .checked_mul(multiplier)
        .ok_or_else(|| VoldockError::size_parse(s, "size overflows 64 bits"))?;

    if bytes == 0 {
        return Err(VoldockError::size_parse(s, "size must be greater than zero"));
    }

    Ok(bytes)
}

/// Render a byte count with the largest unit that divides it evenly
pub fn format_size(bytes: u64) -> String {
    for (suffix, multiplier) in SIZE_UNITS.iter().rev() {
        if bytes > 0 && bytes % multiplier == 0 {
            return format!("{}{}", bytes / multiplier, suffix);
        }
    }
    format!("{}B", bytes)
}

/// Parse a duration string (e.g., "30s", "5m", "1h") into a strictly
/// positive `Duration`
pub fn parse_duration(s: &str) -> Result<Duration> {
    let duration = humantime::parse_duration(s)
        .map_err(|e| VoldockError::duration_parse(s, e.to_string()))?;

    if duration.is_zero() {
        return Err(VoldockError::duration_parse(
            s,
            "duration must be greater than zero",
        ));
    }

    Ok(duration)
}

/// Parse a snapshot frequency into whole seconds.
///
/// Sub-second frequencies cannot be placed on the one-second scheduling
/// grid and are rejected.
pub fn parse_frequency_secs(s: &str) -> Result<u64> {
    let secs = parse_duration(s)?.as_secs();
    if secs == 0 {
        return Err(VoldockError::duration_parse(
            s,
            "frequency must be at least one second",
        ));
    }
    Ok(secs)
}
