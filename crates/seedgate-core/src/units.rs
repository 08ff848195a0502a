//! Bandwidth units and conversion between them.
//!
//! Every speed in the config (bounds, absolute schedule reductions) is in the
//! configured unit. Adapters convert at the edge: media servers report bits/s,
//! qBittorrent wants bytes/s, Transmission wants kB/s.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A bandwidth unit (per second is implied).
///
/// Serialized by its short name (`"Mbit"`, `"KiB"`, ...). Long names such as
/// `"megabit"` are accepted as aliases when reading config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Unit {
    #[serde(rename = "bit")]
    Bit,
    #[serde(rename = "B", alias = "byte")]
    Byte,
    #[serde(rename = "Kbit", alias = "kilobit")]
    Kilobit,
    #[serde(rename = "Kibit", alias = "kibibit")]
    Kibibit,
    #[serde(rename = "KB", alias = "kilobyte")]
    Kilobyte,
    #[serde(rename = "KiB", alias = "kibibyte")]
    Kibibyte,
    #[serde(rename = "Mbit", alias = "megabit")]
    Megabit,
    #[serde(rename = "Mibit", alias = "mebibit")]
    Mebibit,
    #[serde(rename = "MB", alias = "megabyte")]
    Megabyte,
    #[serde(rename = "MiB", alias = "mebibyte")]
    Mebibyte,
    #[serde(rename = "Gbit", alias = "gigabit")]
    Gigabit,
    #[serde(rename = "Gibit", alias = "gibibit")]
    Gibibit,
    #[serde(rename = "GB", alias = "gigabyte")]
    Gigabyte,
    #[serde(rename = "GiB", alias = "gibibyte")]
    Gibibyte,
}

impl Unit {
    /// Number of bits in one of this unit.
    pub fn bits(self) -> f64 {
        const K: f64 = 1000.0;
        const KI: f64 = 1024.0;
        match self {
            Unit::Bit => 1.0,
            Unit::Byte => 8.0,
            Unit::Kilobit => K,
            Unit::Kibibit => KI,
            Unit::Kilobyte => 8.0 * K,
            Unit::Kibibyte => 8.0 * KI,
            Unit::Megabit => K * K,
            Unit::Mebibit => KI * KI,
            Unit::Megabyte => 8.0 * K * K,
            Unit::Mebibyte => 8.0 * KI * KI,
            Unit::Gigabit => K * K * K,
            Unit::Gibibit => KI * KI * KI,
            Unit::Gigabyte => 8.0 * K * K * K,
            Unit::Gibibyte => 8.0 * KI * KI * KI,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Unit::Bit => "bit",
            Unit::Byte => "B",
            Unit::Kilobit => "Kbit",
            Unit::Kibibit => "Kibit",
            Unit::Kilobyte => "KB",
            Unit::Kibibyte => "KiB",
            Unit::Megabit => "Mbit",
            Unit::Mebibit => "Mibit",
            Unit::Megabyte => "MB",
            Unit::Mebibyte => "MiB",
            Unit::Gigabit => "Gbit",
            Unit::Gibibit => "Gibit",
            Unit::Gigabyte => "GB",
            Unit::Gibibyte => "GiB",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Convert `value` from one unit to another, rounded to 3 decimal places.
pub fn convert(value: f64, from: Unit, to: Unit) -> f64 {
    if from == to {
        return round3(value);
    }
    round3(value * from.bits() / to.bits())
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Wrapper {
        unit: Unit,
    }

    fn parse(name: &str) -> Unit {
        let wrapper: Wrapper = toml::from_str(&format!("unit = \"{}\"", name)).unwrap();
        wrapper.unit
    }

    #[test]
    fn convert_between_si_units() {
        assert_eq!(convert(1.0, Unit::Megabit, Unit::Kilobit), 1000.0);
        assert_eq!(convert(8.0, Unit::Bit, Unit::Byte), 1.0);
        assert_eq!(convert(1.0, Unit::Kilobyte, Unit::Bit), 8000.0);
        assert_eq!(convert(2500.0, Unit::Kilobit, Unit::Megabit), 2.5);
    }

    #[test]
    fn convert_between_iec_units() {
        assert_eq!(convert(1.0, Unit::Kibibyte, Unit::Bit), 8192.0);
        assert_eq!(convert(1.0, Unit::Mebibyte, Unit::Kibibyte), 1024.0);
        assert_eq!(convert(1.0, Unit::Gibibit, Unit::Mebibit), 1024.0);
    }

    #[test]
    fn convert_rounds_to_three_decimals() {
        // 1 bit = 0.000125 KB -> 0.0 after rounding
        assert_eq!(convert(1.0, Unit::Bit, Unit::Kilobyte), 0.0);
        assert_eq!(convert(1.0, Unit::Kilobit, Unit::Kibibyte), 0.122);
    }

    #[test]
    fn units_parse_by_short_and_long_names() {
        assert_eq!(parse("Mbit"), Unit::Megabit);
        assert_eq!(parse("megabit"), Unit::Megabit);
        assert_eq!(parse("B"), Unit::Byte);
        assert_eq!(parse("byte"), Unit::Byte);
        assert_eq!(parse("KiB"), Unit::Kibibyte);
        assert_eq!(parse("gibibyte"), Unit::Gibibyte);
    }

    #[test]
    fn unknown_unit_is_rejected() {
        let parsed: Result<Wrapper, _> = toml::from_str("unit = \"furlongs\"");
        assert!(parsed.is_err());
    }

    #[test]
    fn display_uses_short_name() {
        assert_eq!(Unit::Mebibyte.to_string(), "MiB");
        assert_eq!(Unit::Kilobit.to_string(), "Kbit");
    }
}
