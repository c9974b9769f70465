//! Continuous line-discipline checking.
//!
//! CPOL0/CPHA0 demands that neither data line changes value while the
//! serial clock is high; both sides sample on the rising edge and move
//! data only while the clock is low. The monitor watches the raw line
//! levels every local tick. The device's synchronizers delay its view
//! of each edge by a couple of ticks, so a well-behaved device moves
//! its output a little *after* the raw falling edge; that still lands
//! well inside the low half and the raw clock is the discipline that
//! matters on the wire.

use bridge_core::EdgeDetector;

/// Records every tick where a data line moved under a high clock.
///
/// Violations are collected, not panicked on, so a test can drive a
/// whole scenario and assert the list is empty at the end.
#[derive(Debug, Default)]
pub struct StabilityMonitor {
    clk_edge: EdgeDetector,
    /// Line levels captured at the last rising edge, valid while the
    /// clock stays high.
    latched: Option<(bool, bool)>,
    tick: u64,
    violations: Vec<String>,
}

impl StabilityMonitor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one local tick of line state.
    ///
    /// `data_in` is the host-to-device line, `data_out` the
    /// device-to-host line; in shared-line modes both arguments carry
    /// the one resolved line level. Checks are suspended while
    /// `frame_active` is false.
    pub fn observe(&mut self, frame_active: bool, raw_clk: bool, data_in: bool, data_out: bool) {
        self.tick += 1;
        let edge = self.clk_edge.step(raw_clk);

        if !frame_active {
            self.latched = None;
            return;
        }

        if edge.rising {
            self.latched = Some((data_in, data_out));
        } else if raw_clk {
            if let Some((latched_in, latched_out)) = self.latched {
                if data_in != latched_in {
                    self.violations.push(format!(
                        "tick {}: data-in changed while serial clock high ({latched_in} -> {data_in})",
                        self.tick
                    ));
                }
                if data_out != latched_out {
                    self.violations.push(format!(
                        "tick {}: data-out changed while serial clock high ({latched_out} -> {data_out})",
                        self.tick
                    ));
                }
            }
        } else {
            self.latched = None;
        }
    }

    /// All recorded violations, in tick order.
    #[must_use]
    pub fn violations(&self) -> &[String] {
        &self.violations
    }

    /// Forget recorded violations (between scenario phases).
    pub fn clear(&mut self) {
        self.violations.clear();
    }
}
