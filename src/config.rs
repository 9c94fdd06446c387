//! Session construction parameters.
//!
//! Mirrors the explicit-constructor-arguments style of a driver `new()`
//! rather than hidden globals or S-register side channels, matching the
//! teacher's preference for the caller stating configuration up front.

/// Tunable session parameters supplied at construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionConfig {
    /// When `true`, `tx()` pads unused output with silence up to the
    /// requested length instead of returning a short buffer.
    pub transmit_on_idle: bool,
    /// Training Extension Packet timing mode for T.38 training indicators.
    pub tep_mode: bool,
    /// T.38 pacing mode: `true` selects TCP-style "no pacing" (the
    /// `set_t38_config(without_pacing)` knob in `spec.md` §6).
    pub without_pacing: bool,
    /// Seconds after off-hook with no carrier before giving up (the
    /// S7-register equivalent).
    pub s7_seconds: u32,
    /// Whether an unexpected V.21 preamble during fast-modem receive
    /// reports `+FRH:3`+`CONNECT` (`true`) or `+FCERROR` (`false`).
    pub adaptive_receive: bool,
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_transmit_on_idle(mut self, on: bool) -> Self {
        self.transmit_on_idle = on;
        self
    }

    pub fn with_tep_mode(mut self, on: bool) -> Self {
        self.tep_mode = on;
        self
    }

    pub fn with_t38_pacing(mut self, without_pacing: bool) -> Self {
        self.without_pacing = without_pacing;
        self
    }

    pub fn with_s7_seconds(mut self, seconds: u32) -> Self {
        self.s7_seconds = seconds;
        self
    }

    pub fn with_adaptive_receive(mut self, on: bool) -> Self {
        self.adaptive_receive = on;
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            transmit_on_idle: true,
            tep_mode: false,
            without_pacing: false,
            s7_seconds: 60,
            adaptive_receive: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let cfg = SessionConfig::new()
            .with_transmit_on_idle(false)
            .with_s7_seconds(30)
            .with_adaptive_receive(true);
        assert!(!cfg.transmit_on_idle);
        assert_eq!(cfg.s7_seconds, 30);
        assert!(cfg.adaptive_receive);
    }
}
