//! Edge-capture encoder timing.
//!
//! An [`EncoderState`] counts periodic ticks between level changes on one
//! encoder input. The tick interrupt calls [`tick`](EncoderState::tick); the
//! pin-change interrupt calls [`on_level`](EncoderState::on_level). The
//! controller only ever reads [`last_period`](EncoderState::last_period).
//!
//! ```text
//! pin    ___|‾‾‾‾‾‾‾|_____|‾‾‾
//! ticks     0 1 2 3 0 1 2 0
//! period          ^4    ^3
//! ```

/// Timing state of one encoder input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EncoderState {
    current_tick: u16,
    last_period: u16,
    last_level: bool,
}

impl EncoderState {
    /// A fresh encoder reads as stopped until its first edge.
    pub const fn new() -> Self {
        Self {
            current_tick: 0,
            last_period: u16::MAX,
            last_level: false,
        }
    }

    /// Advance by one hardware tick.
    ///
    /// The counter saturates instead of wrapping. Once saturated the period
    /// is forced to the maximum too, so feedback decays to zero for a
    /// stalled wheel.
    #[inline]
    pub fn tick(&mut self) {
        if self.current_tick < u16::MAX {
            self.current_tick += 1;
        } else {
            self.last_period = self.current_tick;
        }
    }

    /// Feed the sampled pin level. Returns true if it was an edge.
    #[inline]
    pub fn on_level(&mut self, level: bool) -> bool {
        if level == self.last_level {
            return false;
        }
        self.last_level = level;
        self.last_period = self.current_tick;
        self.current_tick = 0;
        true
    }

    /// Ticks in the most recently completed half-cycle.
    #[inline]
    pub fn last_period(&self) -> u16 {
        self.last_period
    }

    /// Ticks since the last edge.
    #[inline]
    pub fn current_tick(&self) -> u16 {
        self.current_tick
    }

    /// Last sampled pin level.
    #[inline]
    pub fn level(&self) -> bool {
        self.last_level
    }

    /// Returns true once the running counter has saturated.
    #[inline]
    pub fn is_stalled(&self) -> bool {
        self.current_tick == u16::MAX
    }
}

impl Default for EncoderState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticks(enc: &mut EncoderState, n: u32) {
        for _ in 0..n {
            enc.tick();
        }
    }

    #[test]
    fn fresh_encoder_reads_stopped() {
        let enc = EncoderState::new();
        assert_eq!(enc.last_period(), u16::MAX);
        assert_eq!(enc.current_tick(), 0);
    }

    #[test]
    fn edge_freezes_period_and_resets_counter() {
        let mut enc = EncoderState::new();
        ticks(&mut enc, 4);
        assert!(enc.on_level(true));
        assert_eq!(enc.last_period(), 4);
        assert_eq!(enc.current_tick(), 0);

        ticks(&mut enc, 3);
        assert!(enc.on_level(false));
        assert_eq!(enc.last_period(), 3);
    }

    #[test]
    fn same_level_is_not_an_edge() {
        let mut enc = EncoderState::new();
        ticks(&mut enc, 7);
        assert!(!enc.on_level(false));
        assert_eq!(enc.current_tick(), 7);
        assert_eq!(enc.last_period(), u16::MAX);
    }

    #[test]
    fn counter_saturates() {
        let mut enc = EncoderState::new();
        enc.on_level(true);
        ticks(&mut enc, 10);
        enc.on_level(false);
        assert_eq!(enc.last_period(), 10);

        ticks(&mut enc, u16::MAX as u32 + 100);
        assert!(enc.is_stalled());
        assert_eq!(enc.current_tick(), u16::MAX);
        assert_eq!(enc.last_period(), u16::MAX);
    }

    #[test]
    fn edge_right_after_edge_gives_zero_period() {
        let mut enc = EncoderState::new();
        enc.on_level(true);
        enc.on_level(false);
        assert_eq!(enc.last_period(), 0);
    }
}
