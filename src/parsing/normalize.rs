// Copyright 2025 Lablup Inc. and Jeongkyu Shin
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Field filters turning nvidia-smi readings ("1005 MiB", "61 %", "P0",
// "440.95.01", "N/A") into canonical numeric strings.

use super::float_format::format_compact;

/// Literal nvidia-smi uses for readings the device does not support.
pub const NOT_AVAILABLE: &str = "N/A";

const ZERO: &str = "0";

/// Magnitude prefix of a unit-bearing reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitPrefix {
    None,
    Kilo,
    Mega,
    Giga,
    Tera,
    Kibi,
    Mebi,
    Gibi,
    Tebi,
}

impl UnitPrefix {
    /// Factor applied to the numeral to reach the base unit.
    pub fn multiplier(self) -> f64 {
        match self {
            UnitPrefix::None => 1.0,
            UnitPrefix::Kilo => 1e3,
            UnitPrefix::Mega => 1e6,
            UnitPrefix::Giga => 1e9,
            UnitPrefix::Tera => 1e12,
            UnitPrefix::Kibi => 1024.0,
            UnitPrefix::Mebi => 1024.0_f64.powi(2),
            UnitPrefix::Gibi => 1024.0_f64.powi(3),
            UnitPrefix::Tebi => 1024.0_f64.powi(4),
        }
    }

    /// Split a leading `K`/`M`/`G`/`T` (optionally followed by `i`) off `unit`.
    fn split(unit: &str) -> (UnitPrefix, &str) {
        let decimal = match unit.chars().next() {
            Some('K') => UnitPrefix::Kilo,
            Some('M') => UnitPrefix::Mega,
            Some('G') => UnitPrefix::Giga,
            Some('T') => UnitPrefix::Tera,
            _ => return (UnitPrefix::None, unit),
        };
        let rest = &unit[1..];
        match rest.strip_prefix('i') {
            Some(after) => (decimal.binary(), after),
            None => (decimal, rest),
        }
    }

    fn binary(self) -> UnitPrefix {
        match self {
            UnitPrefix::Kilo => UnitPrefix::Kibi,
            UnitPrefix::Mega => UnitPrefix::Mebi,
            UnitPrefix::Giga => UnitPrefix::Gibi,
            UnitPrefix::Tera => UnitPrefix::Tebi,
            other => other,
        }
    }
}

/// A reading of the shape `<numeral> <prefix><unit>`, e.g. `1005 MiB`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitMagnitude<'a> {
    pub value: f32,
    pub prefix: UnitPrefix,
    pub unit: &'a str,
}

impl<'a> UnitMagnitude<'a> {
    /// Tokenize `raw` as numeral, one space, optional prefix, remainder as unit.
    ///
    /// The numeral is the leading run of digits and dots and must parse as a
    /// float; the separating space is mandatory.
    pub fn parse(raw: &'a str) -> Option<Self> {
        let numeral_len = raw
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(raw.len());
        if numeral_len == 0 {
            return None;
        }
        let (numeral, rest) = raw.split_at(numeral_len);
        let rest = rest.strip_prefix(' ')?;

        let value = numeral.parse::<f32>().ok().filter(|v| v.is_finite())?;
        let (prefix, unit) = UnitPrefix::split(rest);
        Some(Self {
            value,
            prefix,
            unit,
        })
    }

    /// Value expressed in the base unit.
    pub fn scaled(&self) -> f32 {
        (f64::from(self.value) * self.prefix.multiplier()) as f32
    }
}

/// Keep only decimal digits and dots, e.g. `"P2"` -> `"2"`, `"x16"` -> `"16"`.
/// A result that is not a number (`"1.2.3"`, `"."`) becomes `"0"`.
pub fn filter_number(raw: &str) -> String {
    if raw == NOT_AVAILABLE {
        return ZERO.to_string();
    }
    let kept: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if kept.parse::<f64>().is_ok() {
        kept
    } else {
        ZERO.to_string()
    }
}

/// Resolve a unit-bearing reading to its base-unit value, e.g.
/// `"1005 MiB"` -> `"1.0538189e+09"`. Anything that does not fit the
/// `<numeral> <prefix><unit>` shape yields `"0"`.
pub fn filter_unit(raw: &str) -> String {
    if raw == NOT_AVAILABLE {
        return ZERO.to_string();
    }
    UnitMagnitude::parse(raw)
        .map(|m| format_compact(m.scaled()))
        .unwrap_or_else(|| ZERO.to_string())
}

/// Leading `<major>.<minor>` of a version string, e.g. `"440.95.01"` -> `"440.95"`.
pub fn filter_version(raw: &str) -> String {
    let bytes = raw.as_bytes();
    for start in 0..bytes.len() {
        if let Some(end) = match_major_minor(bytes, start) {
            return raw[start..end].to_string();
        }
    }
    ZERO.to_string()
}

/// End offset of `\d+\.\d+` starting exactly at `start`, if present.
fn match_major_minor(bytes: &[u8], start: usize) -> Option<usize> {
    let major_end = digits_end(bytes, start);
    if major_end == start || bytes.get(major_end) != Some(&b'.') {
        return None;
    }
    let minor_start = major_end + 1;
    let minor_end = digits_end(bytes, minor_start);
    (minor_end > minor_start).then_some(minor_end)
}

fn digits_end(bytes: &[u8], from: usize) -> usize {
    bytes[from.min(bytes.len())..]
        .iter()
        .position(|b| !b.is_ascii_digit())
        .map_or(bytes.len(), |offset| from + offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(actual: &str, expected: f64) {
        let actual: f64 = actual.parse().expect("normalized value must be numeric");
        let tolerance = expected.abs() * 1e-6;
        assert!(
            (actual - expected).abs() <= tolerance,
            "got {actual}, expected {expected}"
        );
    }

    #[test]
    fn test_filter_number() {
        assert_eq!(filter_number("P0"), "0");
        assert_eq!(filter_number("P8"), "8");
        assert_eq!(filter_number("15"), "15");
        assert_eq!(filter_number("x16"), "16");
        assert_eq!(filter_number("12.5 fps"), "12.5");
        assert_eq!(filter_number("N/A"), "0");
        assert_eq!(filter_number(""), "0");
        assert_eq!(filter_number("Enabled"), "0");
    }

    #[test]
    fn test_filter_number_always_numeric() {
        assert_eq!(filter_number("1.2.3"), "0");
        assert_eq!(filter_number("v1.2.3"), "0");
        assert_eq!(filter_number("."), "0");
        assert_eq!(filter_number("Gen 4.0"), "4.0");
        for raw in ["1.2.3", "P12", "N/A", "16x", "..", "3."] {
            assert!(filter_number(raw).parse::<f64>().is_ok(), "{raw}");
        }
    }

    #[test]
    fn test_filter_unit_without_prefix() {
        assert_eq!(filter_unit("61 %"), "61");
        assert_eq!(filter_unit("1 %"), "1");
        assert_eq!(filter_unit("45 C"), "45");
        assert_eq!(filter_unit("36.47 W"), "36.47");
    }

    #[test]
    fn test_filter_unit_decimal_prefixes() {
        assert_eq!(filter_unit("961 MHz"), "9.61e+08");
        assert_eq!(filter_unit("12345 KB/s"), "1.2345e+07");
        approx(&filter_unit("2 GHz"), 2e9);
        approx(&filter_unit("3 TB"), 3e12);
    }

    #[test]
    fn test_filter_unit_binary_prefixes() {
        approx(&filter_unit("1005 MiB"), 1005.0 * 1024.0 * 1024.0);
        approx(&filter_unit("8119 MiB"), 8119.0 * 1024.0 * 1024.0);
        assert_eq!(filter_unit("4 KiB"), "4096");
        approx(&filter_unit("2 GiB"), 2.0 * 1024f64.powi(3));
        approx(&filter_unit("1 TiB"), 1024f64.powi(4));
    }

    #[test]
    fn test_filter_unit_not_available() {
        assert_eq!(filter_unit("N/A"), "0");
    }

    #[test]
    fn test_filter_unit_rejects_malformed_shapes() {
        // Missing separator between numeral and unit.
        assert_eq!(filter_unit("61%"), "0");
        assert_eq!(filter_unit("42"), "0");
        // No numeral at all.
        assert_eq!(filter_unit("On"), "0");
        assert_eq!(filter_unit(""), "0");
        // Numeral with more than one dot.
        assert_eq!(filter_unit("1.2.3 MiB"), "0");
        // Leading garbage before the numeral.
        assert_eq!(filter_unit("~5 W"), "0");
    }

    #[test]
    fn test_unit_magnitude_tokens() {
        let m = UnitMagnitude::parse("1005 MiB").unwrap();
        assert_eq!(m.value, 1005.0);
        assert_eq!(m.prefix, UnitPrefix::Mebi);
        assert_eq!(m.unit, "B");

        let m = UnitMagnitude::parse("12345 KB/s").unwrap();
        assert_eq!(m.prefix, UnitPrefix::Kilo);
        assert_eq!(m.unit, "B/s");

        // Unknown prefix letters stay part of the unit.
        let m = UnitMagnitude::parse("5 mW").unwrap();
        assert_eq!(m.prefix, UnitPrefix::None);
        assert_eq!(m.unit, "mW");
        assert_eq!(m.scaled(), 5.0);

        // Trailing text after the unit is ignored.
        let m = UnitMagnitude::parse("70 C (throttle)").unwrap();
        assert_eq!(m.unit, "C (throttle)");
        assert_eq!(m.scaled(), 70.0);

        // A bare numeral without unit still needs the separator.
        assert!(UnitMagnitude::parse("42").is_none());
        assert!(UnitMagnitude::parse("42 ").is_some());
    }

    #[test]
    fn test_filter_version() {
        assert_eq!(filter_version("440.95.01"), "440.95");
        assert_eq!(filter_version("11.0"), "11.0");
        assert_eq!(filter_version("12.2.140+build7"), "12.2");
        assert_eq!(filter_version("CUDA 11.4"), "11.4");
        assert_eq!(filter_version("v1a.5 then 3.14"), "3.14");
        assert_eq!(filter_version("N/A"), "0");
        assert_eq!(filter_version("440"), "0");
        assert_eq!(filter_version("440."), "0");
        assert_eq!(filter_version(""), "0");
    }
}
