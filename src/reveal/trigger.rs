//! Scroll trigger: reveal the second article once the ad block has climbed far
//! enough into the viewport.

use crate::error::RevealScopeError;
use crate::models::ViewportTriggerConfig;
use crate::reveal::state::RevealState;
use tracing::{debug, info};

/// Pure firing condition.
///
/// Fires when `top <= threshold_fraction * viewport_height`, and also
/// `top > 0` when the config requires it.
pub fn should_fire(top: f64, viewport_height: f64, config: &ViewportTriggerConfig) -> bool {
    if config.require_positive_top && top <= 0.0 {
        return false;
    }
    top <= config.threshold_fraction * viewport_height
}

/// Scroll listener that sets `adsMoved` exactly once.
#[derive(Debug)]
pub struct ScrollTrigger {
    config: ViewportTriggerConfig,
    state: RevealState,
    listening: bool,
    triggered: bool,
}

impl ScrollTrigger {
    pub fn new(config: ViewportTriggerConfig, state: RevealState) -> Self {
        Self { config, state, listening: false, triggered: false }
    }

    /// Start listening, but only once ads are visible and the reveal has not
    /// already happened. Returns whether the trigger is listening afterwards.
    pub fn arm(&mut self, ads_visible: bool) -> Result<bool, RevealScopeError> {
        if self.triggered || self.listening {
            return Ok(self.listening);
        }
        if !ads_visible {
            debug!("Scroll trigger not armed; ads are not visible yet");
            return Ok(false);
        }
        if self.state.ads_moved()? {
            debug!("Scroll trigger not armed; reveal already happened");
            self.triggered = true;
            return Ok(false);
        }
        self.listening = true;
        debug!(threshold = self.config.threshold_fraction, "Scroll trigger armed");
        Ok(true)
    }

    /// Handle one scroll tick. `top` is the ad container's top edge relative
    /// to the viewport, `None` when the container is not in the page.
    ///
    /// Returns `true` only on the tick that performed the reveal.
    pub fn on_scroll(
        &mut self,
        top: Option<f64>,
        viewport_height: f64,
    ) -> Result<bool, RevealScopeError> {
        if !self.listening || self.triggered {
            return Ok(false);
        }
        let Some(top) = top else {
            return Ok(false);
        };
        if !should_fire(top, viewport_height, &self.config) {
            return Ok(false);
        }

        // Latch before touching shared state so a re-entrant tick is a no-op.
        self.triggered = true;
        self.listening = false;
        let transitioned = self.state.set_ads_moved(true)?;
        info!(top, viewport_height, transitioned, "Scroll trigger fired; removing listener");
        Ok(transitioned)
    }

    /// Remove the listener without firing (page teardown).
    pub fn disarm(&mut self) {
        self.listening = false;
    }

    pub fn is_listening(&self) -> bool {
        self.listening
    }

    pub fn has_fired(&self) -> bool {
        self.triggered
    }
}
