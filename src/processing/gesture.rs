//! Click derivation from gesture labels
//!
//! A click is the rising edge of the active label on one identity, rate
//! limited by a per-identity cooldown. Holding the active label does not
//! repeat the click.

use crate::config::ClickConfig;

/// Per-identity edge state, created on the identity's first fresh observation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GestureEdgeState {
    last_label: Option<String>,
    last_click_ms: Option<f64>,
}

impl GestureEdgeState {
    pub fn last_label(&self) -> Option<&str> {
        self.last_label.as_deref()
    }

    pub fn last_click_ms(&self) -> Option<f64> {
        self.last_click_ms
    }

    /// Forget the last click time; label history is kept
    pub fn reset_cooldown(&mut self) {
        self.last_click_ms = None;
    }
}

#[derive(Debug, Clone)]
pub struct ClickDetector {
    config: ClickConfig,
}

impl ClickDetector {
    pub fn new(config: ClickConfig) -> Self {
        Self { config }
    }

    pub fn active_label(&self) -> &str {
        &self.config.active_label
    }

    /// Record a fresh label for one identity and report whether it clicks
    pub fn observe(&self, state: &mut GestureEdgeState, label: &str, now_ms: f64) -> bool {
        let active = self.config.active_label.as_str();
        let rising = label == active && state.last_label.as_deref() != Some(active);
        let cooled = state
            .last_click_ms
            .map_or(true, |last| now_ms - last >= self.config.cooldown_ms);

        let fired = rising && cooled;
        if fired {
            // Click time never moves backwards
            let at = state.last_click_ms.map_or(now_ms, |last| last.max(now_ms));
            state.last_click_ms = Some(at);
        }

        if state.last_label.as_deref() != Some(label) {
            state.last_label = Some(label.to_string());
        }

        fired
    }
}
