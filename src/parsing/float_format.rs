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

// Compact float rendering for sample values.
//
// Existing dashboards were built against values such as `9.61e+08` and `1`,
// so the layout is fixed: shortest round-trip digits of an f32, positional
// notation while the decimal exponent is in [-4, 6), scientific notation with
// a signed two-digit exponent otherwise.

/// Exponent at which positional notation switches to scientific notation.
const SCIENTIFIC_EXPONENT_MIN: i32 = 6;
/// Smallest exponent still rendered positionally.
const POSITIONAL_EXPONENT_MIN: i32 = -4;

/// Format `value` with the shortest digits that round-trip through `f32`.
///
/// Non-finite values have no place in the exposition body and render as `"0"`.
pub fn format_compact(value: f32) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }

    // `{:e}` yields the shortest round-trip digits, e.g. "9.61e8" or "-1.5e-5".
    let rendered = format!("{value:e}");
    let Some((mantissa, exponent)) = rendered.split_once('e') else {
        return "0".to_string();
    };
    let Ok(exponent) = exponent.parse::<i32>() else {
        return "0".to_string();
    };

    let (sign, mantissa) = match mantissa.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", mantissa),
    };
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();

    let body = if (POSITIONAL_EXPONENT_MIN..SCIENTIFIC_EXPONENT_MIN).contains(&exponent) {
        positional(&digits, exponent)
    } else {
        scientific(&digits, exponent)
    };
    format!("{sign}{body}")
}

fn positional(digits: &str, exponent: i32) -> String {
    if exponent < 0 {
        let zeros = "0".repeat((-exponent - 1) as usize);
        return format!("0.{zeros}{digits}");
    }

    let int_len = exponent as usize + 1;
    if digits.len() <= int_len {
        let zeros = "0".repeat(int_len - digits.len());
        format!("{digits}{zeros}")
    } else {
        let (int_part, frac_part) = digits.split_at(int_len);
        format!("{int_part}.{frac_part}")
    }
}

fn scientific(digits: &str, exponent: i32) -> String {
    let (lead, rest) = digits.split_at(1);
    let exp_sign = if exponent < 0 { '-' } else { '+' };
    let exp_abs = exponent.unsigned_abs();
    if rest.is_empty() {
        format!("{lead}e{exp_sign}{exp_abs:02}")
    } else {
        format!("{lead}.{rest}e{exp_sign}{exp_abs:02}")
    }
}
