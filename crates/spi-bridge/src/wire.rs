//! Wire-mode configuration and two-wire frame detection.
//!
//! The link comes in three electrical flavours that share one protocol:
//!
//! - **Four-wire**: clk, cs_n, mosi, miso. Dedicated lines in each
//!   direction; cs_n bounds the frame.
//! - **Three-wire**: clk, cs_n and one shared data line. The line is an
//!   input until the request fields are in, then the bridge takes it
//!   over for the response (turnaround).
//! - **Two-wire**: clk and the shared data line only. With no cs_n,
//!   frames are announced in-band by a sync byte.
//!
//! Mode selection is fixed for the lifetime of a bridge instance;
//! unsupported combinations are rejected at construction.

use std::fmt;

/// Synchronization byte that opens every two-wire frame (`10101011`).
pub const SYNC_BYTE: u8 = 0xAB;

/// Electrical wiring of the serial link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireMode {
    /// Dedicated input and output data lines plus cs_n.
    FourWire,
    /// One shared data line plus cs_n.
    ThreeWire,
    /// One shared data line, no cs_n; in-band sync byte framing.
    TwoWire,
}

impl WireMode {
    /// Map a wire count from a configuration surface to a mode.
    pub fn from_wires(wires: u8) -> Result<Self, ConfigError> {
        match wires {
            2 => Ok(Self::TwoWire),
            3 => Ok(Self::ThreeWire),
            4 => Ok(Self::FourWire),
            other => Err(ConfigError::UnsupportedWireCount(other)),
        }
    }

    /// Whether this mode has a dedicated frame-select (cs_n) line.
    #[must_use]
    pub fn has_frame_select(self) -> bool {
        !matches!(self, Self::TwoWire)
    }

    /// Whether the data line is shared between both directions.
    #[must_use]
    pub fn shared_data_line(self) -> bool {
        !matches!(self, Self::FourWire)
    }
}

impl fmt::Display for WireMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FourWire => write!(f, "four-wire"),
            Self::ThreeWire => write!(f, "three-wire"),
            Self::TwoWire => write!(f, "two-wire"),
        }
    }
}

/// Construction-time configuration errors. Wire mode is not a runtime
/// concern; a bad value never reaches the state machine.
#[derive(Debug)]
pub enum ConfigError {
    /// Wire count other than 2, 3 or 4.
    UnsupportedWireCount(u8),
    /// A shared data line cannot be permanently driven.
    SharedLineNeedsTristate(WireMode),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedWireCount(wires) => {
                write!(f, "unsupported wire count: {wires} (expected 2, 3 or 4)")
            }
            Self::SharedLineNeedsTristate(mode) => {
                write!(f, "{mode} mode requires a tri-state data buffer")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Fixed electrical configuration of one bridge instance.
#[derive(Debug, Clone, Copy)]
pub struct WireConfig {
    pub mode: WireMode,
    /// Whether the output buffer can be released. Only four-wire links
    /// may drive their (dedicated) output permanently.
    pub with_tristate: bool,
}

impl WireConfig {
    pub fn new(mode: WireMode, with_tristate: bool) -> Result<Self, ConfigError> {
        if mode.shared_data_line() && !with_tristate {
            return Err(ConfigError::SharedLineNeedsTristate(mode));
        }
        Ok(Self {
            mode,
            with_tristate,
        })
    }

    /// Four-wire link with a tri-state output buffer.
    #[must_use]
    pub fn four_wire() -> Self {
        Self {
            mode: WireMode::FourWire,
            with_tristate: true,
        }
    }

    /// Three-wire link (shared data line, cs_n present).
    #[must_use]
    pub fn three_wire() -> Self {
        Self {
            mode: WireMode::ThreeWire,
            with_tristate: true,
        }
    }

    /// Two-wire link (shared data line, in-band framing).
    #[must_use]
    pub fn two_wire() -> Self {
        Self {
            mode: WireMode::TwoWire,
            with_tristate: true,
        }
    }
}

/// Two-wire frame-start detector.
///
/// Shifts every incoming bit into an 8-bit recognition window and
/// reports a match when the window equals [`SYNC_BYTE`]. Detection is
/// bit-exact and works at any bit offset: a false positive corrupts the
/// transaction, a false negative hangs the link.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncDetector {
    window: u8,
}

impl SyncDetector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Shift one bit in (MSB-first stream order). Returns true when the
    /// window now holds the sync byte.
    pub fn shift(&mut self, bit: bool) -> bool {
        self.window = (self.window << 1) | u8::from(bit);
        self.window == SYNC_BYTE
    }

    /// Clear the window so stale bits cannot re-trigger a match.
    pub fn reset(&mut self) {
        self.window = 0;
    }
}
