//! Named split ratios.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::error::YoloprepError;

/// How far the ratios may drift from a sum of 1.0.
pub const RATIO_TOLERANCE: f64 = 1e-6;

/// An ordered list of `(split name, ratio)` pairs summing to 1.0.
///
/// Items are assigned left to right: the first split takes
/// `floor(n * r0)` items, the second ends at `floor(n * (r0 + r1))`, and the
/// last split takes whatever remains.
#[derive(Clone, Debug, PartialEq)]
pub struct SplitSpec {
    entries: Vec<(String, f64)>,
}

impl SplitSpec {
    /// A validated specification.
    pub fn new<S: Into<String>>(entries: Vec<(S, f64)>) -> Result<Self, YoloprepError> {
        let entries: Vec<(String, f64)> = entries
            .into_iter()
            .map(|(name, ratio)| (name.into(), ratio))
            .collect();

        if entries.is_empty() {
            return Err(invalid("at least one split is required"));
        }

        let mut seen = HashSet::new();
        for (name, ratio) in &entries {
            validate_split_name(name)?;
            if !seen.insert(name.as_str()) {
                return Err(invalid(format!("split '{}' is listed more than once", name)));
            }
            if !ratio.is_finite() || !(0.0..=1.0).contains(ratio) {
                return Err(invalid(format!(
                    "ratio for '{}' must be between 0.0 and 1.0, got {}",
                    name, ratio
                )));
            }
        }

        let total: f64 = entries.iter().map(|(_, ratio)| ratio).sum();
        if (total - 1.0).abs() > RATIO_TOLERANCE {
            return Err(invalid(format!("ratios must sum to 1.0, got {}", total)));
        }

        Ok(Self { entries })
    }

    /// Two-way `train`/`val` split with `train_ratio` going to `train`.
    pub fn binary(train_ratio: f64) -> Result<Self, YoloprepError> {
        if !train_ratio.is_finite() || !(0.0..=1.0).contains(&train_ratio) {
            return Err(invalid(format!(
                "ratio must be between 0.0 and 1.0, got {}",
                train_ratio
            )));
        }
        Self::new(vec![("train", train_ratio), ("val", 1.0 - train_ratio)])
    }

    /// Everything goes to one named split.
    pub fn single(name: impl Into<String>) -> Result<Self, YoloprepError> {
        Self::new(vec![(name.into(), 1.0)])
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn entries(&self) -> &[(String, f64)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Exclusive end index of every split for a pool of `pool_size` items.
    pub fn boundaries(&self, pool_size: usize) -> Vec<usize> {
        let last = self.entries.len() - 1;
        let mut cumulative = 0.0;
        let mut previous = 0;
        let mut ends = Vec::with_capacity(self.entries.len());

        for (index, (_, ratio)) in self.entries.iter().enumerate() {
            let end = if index == last {
                pool_size
            } else {
                cumulative += ratio;
                // Snap so that 10 * (0.7 + 0.2) floors to 9, not 8.
                let scaled = pool_size as f64 * cumulative;
                let snapped = (scaled * 1e6).round() / 1e6;
                (snapped.floor() as usize).clamp(previous, pool_size)
            };
            ends.push(end);
            previous = end;
        }

        ends
    }
}

impl fmt::Display for SplitSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, (name, ratio)) in self.entries.iter().enumerate() {
            if index > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}={}", name, ratio)?;
        }
        Ok(())
    }
}

/// Accepts either a bare ratio (`0.8`, a train/val split) or a named list
/// (`train=0.7,val=0.2,test=0.1`).
impl FromStr for SplitSpec {
    type Err = YoloprepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if !trimmed.contains('=') {
            let ratio = trimmed
                .parse::<f64>()
                .map_err(|_| invalid(format!("'{}' is not a ratio", trimmed)))?;
            return Self::binary(ratio);
        }

        let mut entries = Vec::new();
        for part in trimmed.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (name, raw_ratio) = part
                .split_once('=')
                .ok_or_else(|| invalid(format!("expected NAME=RATIO, got '{}'", part)))?;
            let ratio = raw_ratio
                .trim()
                .parse::<f64>()
                .map_err(|_| invalid(format!("'{}' is not a ratio", raw_ratio.trim())))?;
            entries.push((name.trim().to_string(), ratio));
        }
        Self::new(entries)
    }
}

/// Split names become directory names, so they must be a single normal
/// path component.
fn validate_split_name(name: &str) -> Result<(), YoloprepError> {
    if name.is_empty() {
        return Err(invalid("split name must not be empty"));
    }
    if name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(invalid(format!(
            "split name '{}' must be a plain directory name",
            name
        )));
    }
    Ok(())
}

fn invalid(message: impl Into<String>) -> YoloprepError {
    YoloprepError::InvalidSplitSpec {
        message: message.into(),
    }
}
