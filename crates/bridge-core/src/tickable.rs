//! Trait for components that can be advanced by clock ticks.

use crate::Ticks;

/// A component driven by the local clock.
///
/// Every synchronous component (the bridge, the register-window
/// controller, bus slaves) implements this trait. One call to `tick()`
/// is one local clock cycle; a component never blocks inside a tick,
/// it occupies a state across ticks instead.
pub trait Tickable {
    /// Advance the component by one local clock tick.
    fn tick(&mut self);

    /// Advance the component by multiple ticks.
    ///
    /// Default implementation calls `tick()` in a loop. Components may
    /// override for efficiency, but must produce identical results.
    fn tick_n(&mut self, count: Ticks) {
        for _ in 0..count.get() {
            self.tick();
        }
    }
}
