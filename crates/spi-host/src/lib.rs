//! Host-side SPI master model.
//!
//! The verification driver for the protocol bridge: it owns the raw
//! clk/cs_n/data lines, toggles them with CPOL0/CPHA0 discipline (data
//! moves only while the clock is low), performs whole write/read
//! transactions byte-wise, and polls for the response by reading bytes
//! until the first one that is not `0xFF` — exactly the discipline a
//! real host controller uses against this device.
//!
//! Undriven lines read high, as if pulled up: a tri-stated output or a
//! released shared line yields `0xFF` bytes to the poll loop.

pub mod monitor;

use std::fmt;

use bridge_core::{BusPort, CsrBus, MasterClock, SramBus, Tickable, Ticks};
use spi_bridge::{SpiBridge, WireConfig, WireMode, HEADER_READ, HEADER_WRITE, SYNC_BYTE};
use spi_control::SpiControl;

pub use monitor::StabilityMonitor;

/// Bytes the poll loop will read before giving up on a response.
const POLL_BUDGET: usize = 20;

/// Undriven lines read high.
const PULL_UP: bool = true;

/// Anything with the bridge-style SPI pin interface that the host can
/// stimulate: the protocol bridge and the register-window controller.
pub trait SpiDevice: Tickable {
    fn set_clk(&mut self, level: bool);
    fn set_cs_n(&mut self, level: bool);
    fn set_mosi(&mut self, level: bool);
    fn data_out(&self) -> Option<bool>;
}

impl<B: BusPort + Tickable> SpiDevice for SpiBridge<B> {
    fn set_clk(&mut self, level: bool) {
        SpiBridge::set_clk(self, level);
    }

    fn set_cs_n(&mut self, level: bool) {
        SpiBridge::set_cs_n(self, level);
    }

    fn set_mosi(&mut self, level: bool) {
        SpiBridge::set_mosi(self, level);
    }

    fn data_out(&self) -> Option<bool> {
        SpiBridge::data_out(self)
    }
}

impl<C: CsrBus> SpiDevice for SpiControl<C> {
    fn set_clk(&mut self, level: bool) {
        SpiControl::set_clk(self, level);
    }

    fn set_cs_n(&mut self, level: bool) {
        SpiControl::set_cs_n(self, level);
    }

    fn set_mosi(&mut self, level: bool) {
        SpiControl::set_mosi(self, level);
    }

    fn data_out(&self) -> Option<bool> {
        SpiControl::data_out(self)
    }
}

/// Transaction failures as seen from the host side.
#[derive(Debug)]
pub enum HostError {
    /// No response byte arrived within the poll budget.
    ResponseTimeout { polled: usize },
    /// A response byte arrived but was not the expected header.
    UnexpectedResponse { got: u8, expected: u8 },
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ResponseTimeout { polled } => {
                write!(f, "no response after polling {polled} bytes")
            }
            Self::UnexpectedResponse { got, expected } => {
                write!(f, "response byte was {got:#04X}, not {expected:#04X}")
            }
        }
    }
}

impl std::error::Error for HostError {}

/// Host-side SPI master.
pub struct SpiHost {
    mode: WireMode,
    /// Local ticks per half period of the serial clock.
    half_bit: u64,
    monitor: StabilityMonitor,

    clk: bool,
    cs_n: bool,
    mosi: bool,
    /// Host ownership of the (possibly shared) data line.
    driving: bool,
}

impl SpiHost {
    /// A host clocking the link at `bit_rate_hz` against a device on
    /// the given local clock.
    #[must_use]
    pub fn new(mode: WireMode, clock: MasterClock, bit_rate_hz: u64) -> Self {
        // The synchronizers swallow a couple of ticks per edge; give
        // every half period room for that plus the edge pulse itself.
        let half_bit = clock.ticks_per_half_bit(bit_rate_hz).get().max(4);
        Self {
            mode,
            half_bit,
            monitor: StabilityMonitor::new(),
            clk: false,
            cs_n: true,
            mosi: false,
            driving: true,
        }
    }

    #[must_use]
    pub fn monitor(&self) -> &StabilityMonitor {
        &self.monitor
    }

    pub fn monitor_mut(&mut self) -> &mut StabilityMonitor {
        &mut self.monitor
    }

    /// One write transaction: header, address, value, then poll for
    /// the all-zero acknowledgement byte.
    pub fn write<D: SpiDevice>(
        &mut self,
        device: &mut D,
        address: u32,
        value: u32,
    ) -> Result<(), HostError> {
        self.start(device);
        self.write_byte(device, HEADER_WRITE);
        for shift in [24, 16, 8, 0] {
            self.write_byte(device, (address >> shift) as u8);
        }
        for shift in [24, 16, 8, 0] {
            self.write_byte(device, (value >> shift) as u8);
        }
        self.release();
        let polled = self.poll(device, HEADER_WRITE);
        self.finish(device);
        polled
    }

    /// One read transaction: header, address, poll for the `0x01`
    /// response header, then clock the value out.
    pub fn read<D: SpiDevice>(&mut self, device: &mut D, address: u32) -> Result<u32, HostError> {
        self.start(device);
        self.write_byte(device, HEADER_READ);
        for shift in [24, 16, 8, 0] {
            self.write_byte(device, (address >> shift) as u8);
        }
        self.release();
        match self.poll(device, HEADER_READ) {
            Ok(()) => {
                let mut value = 0u32;
                for _ in 0..4 {
                    value = (value << 8) | u32::from(self.read_byte(device));
                }
                self.finish(device);
                Ok(value)
            }
            Err(error) => {
                self.finish(device);
                Err(error)
            }
        }
    }

    /// Clock raw bits onto the line outside any transaction helper.
    /// Used to exercise unaligned two-wire sync detection.
    pub fn send_bits<D: SpiDevice>(&mut self, device: &mut D, bits: &[bool]) {
        for &bit in bits {
            self.transfer_bit(device, bit);
        }
    }

    /// Clock one raw byte MSB-first.
    pub fn send_byte<D: SpiDevice>(&mut self, device: &mut D, byte: u8) {
        self.write_byte(device, byte);
    }

    /// Clock one byte in from the device.
    pub fn read_byte<D: SpiDevice>(&mut self, device: &mut D) -> u8 {
        let mut byte = 0u8;
        for _ in 0..8 {
            byte = (byte << 1) | u8::from(self.transfer_bit(device, false));
        }
        byte
    }

    /// Deassert frame select without completing the frame. The device
    /// must discard all partial state.
    pub fn abort<D: SpiDevice>(&mut self, device: &mut D) {
        self.finish(device);
    }

    /// Open a frame: assert frame select, or emit the sync byte on a
    /// two-wire link.
    pub fn start<D: SpiDevice>(&mut self, device: &mut D) {
        self.driving = true;
        self.mosi = false;
        self.clk = false;
        if self.mode.has_frame_select() {
            self.cs_n = false;
            self.run(device, self.half_bit);
        } else {
            self.run(device, self.half_bit);
            self.write_byte(device, SYNC_BYTE);
        }
    }

    /// Hand the shared line to the bridge for the response phase.
    fn release(&mut self) {
        if self.mode.shared_data_line() {
            self.driving = false;
        }
    }

    /// Close a frame: deassert frame select, retake the line and send
    /// a few trailing clocks.
    pub fn finish<D: SpiDevice>(&mut self, device: &mut D) {
        if self.mode.has_frame_select() {
            self.cs_n = true;
        }
        self.driving = true;
        self.mosi = false;
        // Trailing clocks: in two-wire mode these let the bridge leave
        // END and re-arm its sync detector.
        for _ in 0..5 {
            self.transfer_bit(device, false);
        }
        self.run(device, self.half_bit);
    }

    fn write_byte<D: SpiDevice>(&mut self, device: &mut D, byte: u8) {
        for shift in (0..8).rev() {
            self.transfer_bit(device, (byte >> shift) & 1 != 0);
        }
    }

    /// One CPOL0/CPHA0 bit: data setup while the clock is low, sample
    /// at the end of the high phase.
    fn transfer_bit<D: SpiDevice>(&mut self, device: &mut D, bit: bool) -> bool {
        if self.driving {
            self.mosi = bit;
        }
        self.run(device, self.half_bit);
        self.clk = true;
        self.run(device, self.half_bit);
        let sampled = self.line_in(device);
        self.clk = false;
        sampled
    }

    /// The data level the host reads: dedicated output pin in
    /// four-wire mode, the resolved shared line otherwise.
    fn line_in<D: SpiDevice>(&self, device: &D) -> bool {
        match self.mode {
            WireMode::FourWire => device.data_out().unwrap_or(PULL_UP),
            WireMode::ThreeWire | WireMode::TwoWire => self.resolved_line(device),
        }
    }

    /// Shared-line resolution: the bridge's drive wins when present,
    /// then the host's, then the pull-up.
    fn resolved_line<D: SpiDevice>(&self, device: &D) -> bool {
        device
            .data_out()
            .unwrap_or(if self.driving { self.mosi } else { PULL_UP })
    }

    fn poll<D: SpiDevice>(&mut self, device: &mut D, expected: u8) -> Result<(), HostError> {
        for _ in 0..POLL_BUDGET {
            let byte = self.read_byte(device);
            if byte != 0xFF {
                if byte == expected {
                    return Ok(());
                }
                return Err(HostError::UnexpectedResponse {
                    got: byte,
                    expected,
                });
            }
        }
        Err(HostError::ResponseTimeout {
            polled: POLL_BUDGET,
        })
    }

    /// Apply the line levels, tick the device, feed the monitor.
    fn run<D: SpiDevice>(&mut self, device: &mut D, ticks: u64) {
        for _ in 0..ticks {
            let input = match self.mode {
                WireMode::FourWire => self.mosi,
                WireMode::ThreeWire | WireMode::TwoWire => self.resolved_line(device),
            };
            device.set_clk(self.clk);
            device.set_cs_n(self.cs_n);
            device.set_mosi(input);
            device.tick();

            let frame_active = if self.mode.has_frame_select() {
                !self.cs_n
            } else {
                true
            };
            let (line_in, line_out) = match self.mode {
                WireMode::FourWire => (self.mosi, device.data_out().unwrap_or(PULL_UP)),
                WireMode::ThreeWire | WireMode::TwoWire => {
                    let line = self.resolved_line(device);
                    (line, line)
                }
            };
            self.monitor.observe(frame_active, self.clk, line_in, line_out);
        }
    }
}

/// A bridge wired to RAM plus a host, ready for end-to-end scenarios.
pub struct BridgeFixture {
    pub host: SpiHost,
    pub bridge: SpiBridge<SramBus>,
}

/// Word address of the first backed RAM word (byte address
/// `0x4000_0000`).
pub const RAM_BASE_WORDS: u32 = 0x1000_0000;

/// Backed RAM size in words.
pub const RAM_WORDS: usize = 64;

impl BridgeFixture {
    #[must_use]
    pub fn new(config: WireConfig) -> Self {
        Self::with_latency(config, Ticks::new(1))
    }

    /// Fixture with a configurable bus ack latency, for stall tests.
    #[must_use]
    pub fn with_latency(config: WireConfig, latency: Ticks) -> Self {
        let bus = SramBus::new(RAM_BASE_WORDS, RAM_WORDS, latency);
        Self {
            host: SpiHost::new(config.mode, MasterClock::new(48_000_000), 1_000_000),
            bridge: SpiBridge::new(config, bus),
        }
    }

    pub fn write(&mut self, address: u32, value: u32) -> Result<(), HostError> {
        self.host.write(&mut self.bridge, address, value)
    }

    pub fn read(&mut self, address: u32) -> Result<u32, HostError> {
        self.host.read(&mut self.bridge, address)
    }

    /// Assert the whole scenario respected the line discipline.
    pub fn assert_lines_clean(&self) {
        assert!(
            self.host.monitor().violations().is_empty(),
            "line discipline violated: {:?}",
            self.host.monitor().violations()
        );
    }
}
