//! Monitor configuration
//!
//! Root contexts, root margins and the config fingerprint used as the
//! inner registry key.

use std::fmt;

use lazy_dom::{DOMRect, NodeId};
use serde::{Deserialize, Serialize};

use crate::ObserveError;

/// Default root margin (no expansion)
pub const DEFAULT_MARGIN: &str = "0px 0px 0px 0px";

/// Container relative to which visibility is measured
///
/// Compared by identity only: `Element` wraps an arena handle, so two roots
/// are equal exactly when they name the same node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RootContext {
    /// The document viewport
    Document,
    /// A specific ancestor element
    Element(NodeId),
}

impl fmt::Display for RootContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RootContext::Document => f.write_str("document"),
            RootContext::Element(node) => write!(f, "element {node}"),
        }
    }
}

/// One component of a root margin
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MarginLength {
    Px(f32),
    /// Percentage of the root's width (left/right) or height (top/bottom)
    Percent(f32),
}

impl MarginLength {
    fn parse(token: &str) -> Result<Self, ObserveError> {
        let (number, percent) = if let Some(n) = token.strip_suffix("px") {
            (n, false)
        } else if let Some(n) = token.strip_suffix('%') {
            (n, true)
        } else {
            return Err(ObserveError::InvalidConfiguration(format!(
                "margin component {token:?} must be in px or %"
            )));
        };

        match number.parse::<f32>() {
            // `+ 0.0` folds -0 into 0 so the fingerprint stays canonical
            Ok(value) if value.is_finite() && percent => Ok(MarginLength::Percent(value + 0.0)),
            Ok(value) if value.is_finite() => Ok(MarginLength::Px(value + 0.0)),
            _ => Err(ObserveError::InvalidConfiguration(format!(
                "margin component {token:?} is not a number"
            ))),
        }
    }

    /// Resolve against the root dimension this component applies to.
    #[inline]
    pub fn to_px(self, basis: f32) -> f32 {
        match self {
            MarginLength::Px(v) => v,
            MarginLength::Percent(p) => basis * p / 100.0,
        }
    }
}

impl fmt::Display for MarginLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarginLength::Px(v) => write!(f, "{v}px"),
            MarginLength::Percent(p) => write!(f, "{p}%"),
        }
    }
}

/// Parsed root margin, CSS `margin` shorthand order
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RootMargin {
    pub top: MarginLength,
    pub right: MarginLength,
    pub bottom: MarginLength,
    pub left: MarginLength,
}

impl Default for RootMargin {
    fn default() -> Self {
        let zero = MarginLength::Px(0.0);
        Self { top: zero, right: zero, bottom: zero, left: zero }
    }
}

impl RootMargin {
    /// Parse one to four whitespace-separated px/% components
    pub fn parse(s: &str) -> Result<Self, ObserveError> {
        let parts = s
            .split_whitespace()
            .map(MarginLength::parse)
            .collect::<Result<Vec<_>, _>>()?;

        let [top, right, bottom, left] = match parts[..] {
            [all] => [all, all, all, all],
            [v, h] => [v, h, v, h],
            [t, h, b] => [t, h, b, h],
            [t, r, b, l] => [t, r, b, l],
            _ => {
                return Err(ObserveError::InvalidConfiguration(format!(
                    "margin {s:?} must have one to four components"
                )));
            }
        };
        Ok(Self { top, right, bottom, left })
    }

    /// Root bounds grown by this margin
    pub fn apply(&self, root: &DOMRect) -> DOMRect {
        root.expand(
            self.top.to_px(root.height),
            self.right.to_px(root.width),
            self.bottom.to_px(root.height),
            self.left.to_px(root.width),
        )
    }
}

impl fmt::Display for RootMargin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} {}", self.top, self.right, self.bottom, self.left)
    }
}

/// Margin and threshold for one monitor
///
/// `threshold` is the fraction of the target (0.0 to 1.0) that must be
/// inside the expanded root for the target to count as visible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub margin: String,
    pub threshold: f64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            margin: DEFAULT_MARGIN.to_string(),
            threshold: 0.0,
        }
    }
}

impl MonitorConfig {
    pub fn new(margin: impl Into<String>, threshold: f64) -> Self {
        Self { margin: margin.into(), threshold }
    }

    /// Check preconditions and return the parsed margin
    pub fn validate(&self) -> Result<RootMargin, ObserveError> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(ObserveError::InvalidConfiguration(format!(
                "threshold {} is outside [0, 1]",
                self.threshold
            )));
        }
        RootMargin::parse(&self.margin)
    }

    /// Fingerprint of this config: canonical margin, then threshold
    pub fn key(&self) -> Result<ConfigKey, ObserveError> {
        let margin = self.validate()?;
        Ok(ConfigKey(format!("{}/{}", margin, self.threshold + 0.0)))
    }
}

/// Inner registry key derived from a [`MonitorConfig`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConfigKey(String);

impl ConfigKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
