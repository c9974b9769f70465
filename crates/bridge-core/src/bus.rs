//! Internal bus interfaces.
//!
//! Two buses live behind the serial link. The word bus is a
//! single-outstanding request/completion handshake with unbounded
//! latency, consumed by the protocol bridge. The CSR bus is a flat
//! byte-wide register file with immediate reads and writes, consumed by
//! the register-window controller.

use std::ops::Range;

use crate::{Tickable, Ticks};

/// One word-bus transaction request.
///
/// `address` is in bus-native word units; the bridge drops the low two
/// bits of the serial address before issuing. The full word is always
/// selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusRequest {
    pub address: u32,
    pub data: u32,
    pub write: bool,
}

/// Terminal bus response. The bridge treats both identically when
/// framing its response; the distinction exists for bus-side observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusReply {
    Ack,
    Err,
}

/// Completion of a [`BusRequest`]. `data` carries the read value and is
/// zero for writes and errored reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusCompletion {
    pub reply: BusReply,
    pub data: u32,
}

/// Single-outstanding word-bus handshake.
///
/// `begin` starts a transaction and abandons any unclaimed completion
/// from an earlier one (a master that resets mid-transaction simply
/// issues its next request). A completion is never visible on the same
/// tick `begin` was called; the slave needs at least one tick.
pub trait BusPort {
    /// Start a transaction. Replaces any transaction still in flight.
    fn begin(&mut self, request: BusRequest);

    /// Claim the completion of the in-flight transaction, if ready.
    fn completion(&mut self) -> Option<BusCompletion>;
}

/// Word-addressed RAM-backed bus slave with a programmable ack latency.
///
/// Addresses inside the optional error window (and any address past the
/// end of the backing store) complete with [`BusReply::Err`]. Latency is
/// counted in local clock ticks; the slave must be ticked.
pub struct SramBus {
    words: Vec<u32>,
    /// Word address of the first backed word.
    base: u32,
    /// Ticks between `begin` and the completion becoming claimable.
    latency: Ticks,
    /// Word-address range that completes with an error reply.
    error_window: Option<Range<u32>>,
    pending: Option<(BusRequest, u64)>,
}

impl SramBus {
    /// A bus slave backing `words` 32-bit words starting at word
    /// address `base`, acknowledging after `latency` ticks (minimum 1).
    #[must_use]
    pub fn new(base: u32, words: usize, latency: Ticks) -> Self {
        Self {
            words: vec![0; words],
            base,
            latency: Ticks::new(latency.get().max(1)),
            error_window: None,
            pending: None,
        }
    }

    /// Make every word address in `window` complete with an error.
    pub fn set_error_window(&mut self, window: Range<u32>) {
        self.error_window = Some(window);
    }

    /// Direct backdoor read, bypassing the handshake. For tests and
    /// cross-checks only; does not disturb an in-flight transaction.
    #[must_use]
    pub fn peek(&self, word_address: u32) -> u32 {
        self.words
            .get(word_address.wrapping_sub(self.base) as usize)
            .copied()
            .unwrap_or(0)
    }

    /// Direct backdoor write, bypassing the handshake.
    pub fn poke(&mut self, word_address: u32, value: u32) {
        let index = word_address.wrapping_sub(self.base) as usize;
        if let Some(slot) = self.words.get_mut(index) {
            *slot = value;
        }
    }

    fn errored(&self, word_address: u32) -> bool {
        if let Some(window) = &self.error_window {
            if window.contains(&word_address) {
                return true;
            }
        }
        let index = word_address.wrapping_sub(self.base) as u64;
        index >= self.words.len() as u64
    }
}

impl BusPort for SramBus {
    fn begin(&mut self, request: BusRequest) {
        self.pending = Some((request, self.latency.get()));
    }

    fn completion(&mut self) -> Option<BusCompletion> {
        match self.pending {
            Some((request, 0)) => {
                self.pending = None;
                if self.errored(request.address) {
                    return Some(BusCompletion {
                        reply: BusReply::Err,
                        data: 0,
                    });
                }
                let index = request.address.wrapping_sub(self.base) as usize;
                if request.write {
                    self.words[index] = request.data;
                    Some(BusCompletion {
                        reply: BusReply::Ack,
                        data: 0,
                    })
                } else {
                    Some(BusCompletion {
                        reply: BusReply::Ack,
                        data: self.words[index],
                    })
                }
            }
            _ => None,
        }
    }
}

impl Tickable for SramBus {
    fn tick(&mut self) {
        if let Some((_, remaining)) = &mut self.pending {
            *remaining = remaining.saturating_sub(1);
        }
    }
}

/// Immediate byte-wide register bus.
///
/// The register-window controller strobes one read or write per
/// transferred byte; there is no handshake, a CSR access completes
/// within the tick it is issued.
pub trait CsrBus {
    /// Read the register at `address`.
    fn read(&mut self, address: u16) -> u8;

    /// Write the register at `address`.
    fn write(&mut self, address: u16, value: u8);
}

/// Flat `Vec<u8>`-backed register file.
///
/// Out-of-range reads return zero and out-of-range writes are dropped,
/// like an undecoded address on a real register bus.
pub struct CsrFile {
    bytes: Vec<u8>,
    base: u16,
}

impl CsrFile {
    #[must_use]
    pub fn new(base: u16, size: usize) -> Self {
        Self {
            bytes: vec![0; size],
            base,
        }
    }
}

impl CsrBus for CsrFile {
    fn read(&mut self, address: u16) -> u8 {
        self.bytes
            .get(address.wrapping_sub(self.base) as usize)
            .copied()
            .unwrap_or(0)
    }

    fn write(&mut self, address: u16, value: u8) {
        let index = address.wrapping_sub(self.base) as usize;
        if let Some(slot) = self.bytes.get_mut(index) {
            *slot = value;
        }
    }
}
