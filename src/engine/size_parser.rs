// * Size Parser - human readable sizes to exact byte counts
// * Accepts the text found on tracker profile pages, e.g. " UP: 1,234.5 GiB\n"

use regex::Regex;
use std::str::FromStr;
use std::sync::LazyLock;
use thiserror::Error;

// * Labels some trackers print inside the same element as the value
const LABELS: &[&str] = &[" UP: ", " DL: "];

// * Stripped after the labels, so a label never leaves a dangling "UP:" behind
const NOISE: &[char] = &['\n', '\r', ',', ' '];

static PATTERN_SIZE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+(?:\.\d*)?|\.\d+)(\w+)$").expect("Invalid size regex")
});

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("'{0}' is not a <number><unit> size")]
    Malformed(String),

    #[error("unknown size unit '{0}'")]
    UnknownUnit(String),
}

/// Units understood by [`parse_size`]. Decimal spellings share the binary multipliers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeUnit {
    Byte,
    Kibi,
    Mebi,
    Gibi,
    Tebi,
}

impl SizeUnit {
    pub fn multiplier(self) -> f64 {
        match self {
            SizeUnit::Byte => 1.0,
            SizeUnit::Kibi => 1024.0,
            SizeUnit::Mebi => 1024f64.powi(2),
            SizeUnit::Gibi => 1024f64.powi(3),
            SizeUnit::Tebi => 1024f64.powi(4),
        }
    }
}

impl FromStr for SizeUnit {
    type Err = ParseError;

    // * Case-sensitive: "kb" or "gib" are rejected
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "B" => Ok(SizeUnit::Byte),
            "KiB" | "KB" => Ok(SizeUnit::Kibi),
            "MiB" | "MB" => Ok(SizeUnit::Mebi),
            "GiB" | "GB" => Ok(SizeUnit::Gibi),
            "TiB" | "TB" => Ok(SizeUnit::Tebi),
            other => Err(ParseError::UnknownUnit(other.to_string())),
        }
    }
}

/// Converts a size string such as `"1.5 GiB"` into a byte count.
///
/// Labels (`" UP: "`, `" DL: "`), newlines, carriage returns, commas and spaces are removed
/// first; whatever remains must be a non-negative decimal immediately followed by a unit.
pub fn parse_size(raw: &str) -> Result<f64, ParseError> {
    let compact = normalize(raw);

    let caps = PATTERN_SIZE
        .captures(&compact)
        .ok_or_else(|| ParseError::Malformed(raw.to_string()))?;

    let unit: SizeUnit = caps[2].parse()?;
    let value: f64 = caps[1]
        .parse()
        .map_err(|_| ParseError::Malformed(raw.to_string()))?;

    // * Literals past f64 range saturate to infinity; that is not a size
    let bytes = value * unit.multiplier();
    if !bytes.is_finite() {
        return Err(ParseError::Malformed(raw.to_string()));
    }
    Ok(bytes)
}

fn normalize(raw: &str) -> String {
    let mut out = raw.to_string();
    for label in LABELS {
        out = out.replace(label, "");
    }
    out.retain(|c| !NOISE.contains(&c));
    out
}
