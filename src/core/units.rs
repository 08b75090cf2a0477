//! Yen/man-yen conversion, number labels and the integer field editor.

use std::sync::OnceLock;

use numfmt::{Formatter, Precision};

/// Yen per display unit (1 man-yen).
pub const DISPLAY_UNIT: i64 = 10_000;
pub const DISPLAY_UNIT_LABEL: &str = "万円";

/// Rounds half-way cases towards positive infinity, so `-2.5` becomes `-2`.
pub fn round_half_up(value: f64) -> f64 {
    let floor = value.floor();
    if value - floor >= 0.5 {
        floor + 1.0
    } else {
        floor
    }
}

pub fn round_yen(value: f64) -> i64 {
    round_half_up(value) as i64
}

pub fn to_display(yen: f64) -> i64 {
    round_yen(yen / DISPLAY_UNIT as f64)
}

pub fn from_display(man: i64) -> i64 {
    man.saturating_mul(DISPLAY_UNIT)
}

fn grouping() -> &'static Formatter {
    static GROUPED: OnceLock<Formatter> = OnceLock::new();
    GROUPED.get_or_init(|| {
        Formatter::currency("")
            .expect("valid empty prefix")
            .precision(Precision::Decimals(0))
    })
}

/// Thousands-grouped integer, e.g. `-1,234`. The formatter only sees magnitudes.
pub fn group_int(value: i64) -> String {
    let grouped = grouping().fmt_string(value.unsigned_abs() as f64);
    if value < 0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}

/// `6_000_000` yen renders as `"600万円"`.
pub fn man_label(yen: f64) -> String {
    format!("{}{DISPLAY_UNIT_LABEL}", group_int(to_display(yen)))
}

pub fn yen_label(yen: f64) -> String {
    format!("¥{}", group_int(round_yen(yen)))
}

pub fn percent_label(rate: f64) -> String {
    format!("{:.2}%", rate * 100.0)
}

/// Keeps digits only and strips leading zeros (a lone `0` survives).
pub fn clean_int(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    strip_leading_zeros(&digits).to_string()
}

/// Like [`clean_int`] but allows a single leading minus sign.
pub fn clean_signed_int(raw: &str) -> String {
    let mut cleaned = String::with_capacity(raw.len());
    for (i, ch) in raw.chars().filter(|c| c.is_ascii_digit() || *c == '-').enumerate() {
        if ch == '-' && i != 0 {
            continue;
        }
        cleaned.push(ch);
    }
    match cleaned.strip_prefix('-') {
        Some(rest) => format!("-{}", strip_leading_zeros(rest)),
        None => strip_leading_zeros(&cleaned).to_string(),
    }
}

fn strip_leading_zeros(digits: &str) -> &str {
    let trimmed = digits.trim_start_matches('0');
    if trimmed.is_empty() && !digits.is_empty() {
        &digits[digits.len() - 1..]
    } else {
        trimmed
    }
}

/// Mirrors a numeric form input: blank is zero, garbage is NaN.
pub fn parse_number(raw: &str) -> f64 {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    trimmed.parse::<f64>().unwrap_or(f64::NAN)
}

pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

/// Largest yen amount any single input may hold. Keeps yearly totals and
/// their sums well inside `i64`.
pub const MAX_YEN: i64 = 10_000_000_000_000;

pub const MIN_YEAR: i32 = 1900;
pub const MAX_YEAR: i32 = 2200;

pub fn clamp_non_neg(value: f64) -> i64 {
    if !value.is_finite() || value < 0.0 {
        return 0;
    }
    value.floor().min(MAX_YEN as f64) as i64
}

pub fn clamp_yen(yen: i64) -> i64 {
    yen.clamp(-MAX_YEN, MAX_YEN)
}

pub fn clamp_year(year: i64) -> i32 {
    year.clamp(MIN_YEAR as i64, MAX_YEAR as i64) as i32
}

pub fn clamp_range(value: f64, min: u32, max: u32) -> u32 {
    if !value.is_finite() {
        return min;
    }
    value.floor().clamp(min as f64, max.max(min) as f64) as u32
}

/// Longest projection the planner will run, in years.
pub const MAX_HORIZON: u32 = 200;

pub fn clamp_horizon(years: i64) -> u32 {
    years.clamp(1, MAX_HORIZON as i64) as u32
}

pub fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

/// Integer text entry with a raw editing buffer.
///
/// While focused the field shows exactly what the user typed (after
/// sanitizing); once blurred it shows the committed value, scaled and
/// grouped. Every keystroke commits a yen value so the projection stays live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntField {
    scale: i64,
    signed: bool,
    focused: bool,
    buffer: String,
}

impl IntField {
    pub fn new(scale: i64, signed: bool) -> Self {
        Self {
            scale: scale.max(1),
            signed,
            focused: false,
            buffer: String::new(),
        }
    }

    pub fn man_yen(signed: bool) -> Self {
        Self::new(DISPLAY_UNIT, signed)
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    pub fn focus(&mut self, committed: i64) {
        self.focused = true;
        self.buffer = (committed / self.scale).to_string();
    }

    /// Sanitizes `raw` into the buffer and returns the yen value to commit.
    pub fn input(&mut self, raw: &str) -> i64 {
        self.buffer = if self.signed {
            clean_signed_int(raw)
        } else {
            clean_int(raw)
        };
        self.buffer_value().saturating_mul(self.scale)
    }

    /// Leaves the field. An empty buffer commits zero.
    pub fn blur(&mut self) -> Option<i64> {
        self.focused = false;
        if self.buffer.is_empty() || self.buffer == "-" {
            Some(0)
        } else {
            None
        }
    }

    pub fn display(&self, committed: i64) -> String {
        if self.focused {
            self.buffer.clone()
        } else {
            group_int(committed / self.scale)
        }
    }

    fn buffer_value(&self) -> i64 {
        match self.buffer.as_str() {
            "" | "-" => 0,
            digits => digits.parse::<i64>().unwrap_or(if digits.starts_with('-') {
                i64::MIN / self.scale
            } else {
                i64::MAX / self.scale
            }),
        }
    }
}
