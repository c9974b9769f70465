//! Signal recovery: clock-domain crossing and edge detection.
//!
//! The serial clock, chip select and data-in lines are driven by the
//! host in its own clock domain. Each one passes through a two-stage
//! flip-flop synchronizer before anything else looks at it; edge
//! detection then compares the synchronized level against its value one
//! local tick earlier. Nothing outside this module may consume a raw
//! unsynchronized line.

/// Two-stage flip-flop synchronizer for one asynchronous input line.
///
/// `sample` must be called exactly once per local clock tick; each call
/// is one local clock edge. The returned level is the second flop's
/// output, so a change on the raw line becomes visible on the following
/// tick, which is the price of metastability protection.
#[derive(Debug, Clone, Copy, Default)]
pub struct Synchronizer {
    stage0: bool,
    stage1: bool,
}

impl Synchronizer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Shift the raw level into the chain and return the stable level.
    pub fn sample(&mut self, raw: bool) -> bool {
        self.stage1 = self.stage0;
        self.stage0 = raw;
        self.stage1
    }
}

/// Edge flags for one tick. At most one of the two is set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Edge {
    pub rising: bool,
    pub falling: bool,
}

/// Detects rising/falling transitions of an already-synchronized level.
#[derive(Debug, Clone, Copy, Default)]
pub struct EdgeDetector {
    last: bool,
}

impl EdgeDetector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare the level against last tick's and record it.
    pub fn step(&mut self, level: bool) -> Edge {
        let edge = Edge {
            rising: level && !self.last,
            falling: !level && self.last,
        };
        self.last = level;
        edge
    }
}

/// A synchronizer and edge detector pair, used for the serial clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncedLine {
    sync: Synchronizer,
    edge: EdgeDetector,
}

/// Synchronized serial-clock view for one tick.
#[derive(Debug, Clone, Copy)]
pub struct LineState {
    /// Stable level in the local domain.
    pub level: bool,
    /// Edge pulses derived from the stable level.
    pub edge: Edge,
}

impl SyncedLine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance one tick: synchronize the raw level and detect edges.
    pub fn update(&mut self, raw: bool) -> LineState {
        let level = self.sync.sample(raw);
        let edge = self.edge.step(level);
        LineState { level, edge }
    }
}
