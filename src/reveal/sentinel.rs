//! Sentinel observer: "the reader is approaching the end of the primary article".
//!
//! The sentinel is a 1px marker placed right after the primary content. The
//! viewport is expanded by a [`RootMargin`] before intersecting, so the sentinel
//! fires well before the marker actually scrolls into view. It fires once and
//! disconnects.

use crate::error::Error;
use crate::models::{Rect, Viewport};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

/// CSS-style margin shorthand, px only: `"600px"`, `"600px 0px"`,
/// `"10px 0px 600px"` or `"1px 2px 3px 4px"`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct RootMargin {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl RootMargin {
    /// Same margin above and below the viewport, none at the sides.
    pub fn vertical(px: f64) -> Self {
        Self { top: px, right: 0.0, bottom: px, left: 0.0 }
    }
}

impl FromStr for RootMargin {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let values = s
            .split_whitespace()
            .map(|part| {
                let number = part.strip_suffix("px").unwrap_or(part);
                number
                    .parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| Error::InvalidRootMargin(s.to_string()))
            })
            .collect::<Result<Vec<f64>, Error>>()?;

        let (top, right, bottom, left) = match values.as_slice() {
            [all] => (*all, *all, *all, *all),
            [v, h] => (*v, *h, *v, *h),
            [t, h, b] => (*t, *h, *b, *h),
            [t, r, b, l] => (*t, *r, *b, *l),
            _ => return Err(Error::InvalidRootMargin(s.to_string())),
        };
        Ok(Self { top, right, bottom, left })
    }
}

impl TryFrom<String> for RootMargin {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RootMargin> for String {
    fn from(margin: RootMargin) -> Self {
        margin.to_string()
    }
}

impl fmt::Display for RootMargin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}px {}px {}px {}px",
            self.top, self.right, self.bottom, self.left
        )
    }
}

/// Whether `target` overlaps the viewport grown by `margin`.
///
/// Edge contact counts, so a zero-height marker sitting exactly on the
/// expanded edge still intersects.
pub fn intersects(target: Rect, viewport: Viewport, margin: RootMargin) -> bool {
    let root_top = -margin.top;
    let root_bottom = viewport.height + margin.bottom;
    let root_left = -margin.left;
    let root_right = viewport.width + margin.right;

    target.top <= root_bottom
        && target.bottom() >= root_top
        && target.left <= root_right
        && target.right() >= root_left
}

/// One-shot intersection watch over the sentinel marker.
#[derive(Debug)]
pub struct SentinelObserver {
    margin: RootMargin,
    connected: bool,
    fired: bool,
}

impl SentinelObserver {
    pub fn new(margin: RootMargin) -> Self {
        Self { margin, connected: true, fired: false }
    }

    /// Feed the marker's current geometry. Returns `true` only on the call
    /// that fires; every later call is a no-op because the observer has
    /// disconnected itself. `None` means the marker is not in the page.
    pub fn observe(&mut self, target: Option<Rect>, viewport: Viewport) -> bool {
        if !self.connected || self.fired {
            return false;
        }
        let Some(rect) = target else {
            debug!("Sentinel marker absent; nothing to observe");
            return false;
        };
        if !intersects(rect, viewport, self.margin) {
            return false;
        }

        self.fired = true;
        self.connected = false;
        info!(top = rect.top, viewport_height = viewport.height, "Sentinel fired; showing ads");
        true
    }

    pub fn disconnect(&mut self) {
        self.connected = false;
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn has_fired(&self) -> bool {
        self.fired
    }
}
