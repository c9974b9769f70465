//! SPI register-window controller.
//!
//! The degenerate sibling of the full protocol bridge: instead of
//! mastering a word bus it exposes a narrow window of byte-wide control
//! and status registers. Same recovered-signal front end, much simpler
//! framing:
//!
//! | Field | Size | Meaning |
//! |-------|------|---------|
//! | command | 16 bits | bit 15: 1 = write, 0 = read; bits 13..0: start address |
//! | data | n × 8 bits | register bytes, address auto-incrementing |
//!
//! All fields MSB-first, CPOL0/CPHA0. The transfer streams bytes until
//! the address reaches the end of the configured window or frame
//! select deasserts. Commands addressing outside the window are ignored
//! wholesale: no register is touched and nothing is driven.

use std::fmt;

use bridge_core::{CsrBus, Observable, SyncedLine, Synchronizer, Tickable, Value};

/// Address bits carried by the command word.
const ADDRESS_MASK: u16 = 0x3FFF;

/// Construction-time window validation failure.
#[derive(Debug)]
pub struct WindowError {
    pub base: u16,
    pub end: u16,
}

impl fmt::Display for WindowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid register window: base {:#06X} past end {:#06X}",
            self.base, self.end
        )
    }
}

impl std::error::Error for WindowError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Address,
    Write,
    Read,
    End,
}

impl State {
    fn name(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Address => "address",
            Self::Write => "write",
            Self::Read => "read",
            Self::End => "end",
        }
    }
}

/// The register-window controller, generic over its CSR bus.
pub struct SpiControl<C> {
    csr: C,
    base: u16,
    end: u16,
    with_tristate: bool,

    raw_clk: bool,
    raw_cs_n: bool,
    raw_mosi: bool,

    clk: SyncedLine,
    cs_sync: Synchronizer,
    data_sync: Synchronizer,
    cs_active: bool,

    state: State,
    /// Direction bit from the command word (1 = write).
    we: bool,
    /// Current register address, auto-incremented per byte.
    adr: u16,
    /// Bit position within the current field.
    counter: u8,
    /// Inbound byte assembly (write path).
    shift_in: u8,
    /// Outbound byte (read path), latched at each byte start.
    shift_out: u8,

    out_level: bool,
}

impl<C: CsrBus> SpiControl<C> {
    /// A controller exposing registers `base..=end` of `csr`.
    pub fn new(base: u16, end: u16, with_tristate: bool, csr: C) -> Result<Self, WindowError> {
        if base > end {
            return Err(WindowError { base, end });
        }
        Ok(Self {
            csr,
            base,
            end,
            with_tristate,
            raw_clk: false,
            raw_cs_n: true,
            raw_mosi: false,
            clk: SyncedLine::new(),
            cs_sync: Synchronizer::new(),
            data_sync: Synchronizer::new(),
            cs_active: false,
            state: State::Idle,
            we: false,
            adr: 0,
            counter: 0,
            shift_in: 0,
            shift_out: 0,
            out_level: false,
        })
    }

    pub fn set_clk(&mut self, level: bool) {
        self.raw_clk = level;
    }

    pub fn set_cs_n(&mut self, level: bool) {
        self.raw_cs_n = level;
    }

    pub fn set_mosi(&mut self, level: bool) {
        self.raw_mosi = level;
    }

    /// Drive onto the output pin; `None` while tri-stated.
    #[must_use]
    pub fn data_out(&self) -> Option<bool> {
        let enabled = !self.with_tristate || self.cs_active;
        enabled.then_some(self.out_level)
    }

    #[must_use]
    pub fn csr(&self) -> &C {
        &self.csr
    }

    pub fn csr_mut(&mut self) -> &mut C {
        &mut self.csr
    }

    fn clear(&mut self) {
        self.state = State::Idle;
        self.we = false;
        self.adr = 0;
        self.counter = 0;
        self.shift_in = 0;
        self.shift_out = 0;
        self.out_level = false;
    }

    fn on_rising_edge(&mut self, data_in: bool) {
        match self.state {
            State::Idle => {
                // First command bit is the direction flag.
                self.we = data_in;
                self.counter = 1;
                self.adr = 0;
                self.state = State::Address;
            }
            State::Address => {
                self.adr = ((self.adr << 1) | u16::from(data_in)) & ADDRESS_MASK;
                self.counter += 1;
                if self.counter == 16 {
                    self.counter = 0;
                    if self.adr >= self.base && self.adr <= self.end {
                        if self.we {
                            self.state = State::Write;
                        } else {
                            self.shift_out = self.csr.read(self.adr);
                            self.state = State::Read;
                        }
                    } else {
                        // Out-of-window command: ignore the whole frame.
                        self.state = State::End;
                    }
                }
            }
            State::Write => {
                self.shift_in = (self.shift_in << 1) | u8::from(data_in);
                self.counter += 1;
                if self.counter == 8 {
                    self.csr.write(self.adr, self.shift_in);
                    self.counter = 0;
                    if self.adr == self.end {
                        self.state = State::End;
                    } else {
                        self.adr += 1;
                    }
                }
            }
            State::Read | State::End => {}
        }
    }

    fn on_falling_edge(&mut self) {
        match self.state {
            State::Read => {
                if self.counter == 8 {
                    if self.adr == self.end {
                        self.state = State::End;
                        self.out_level = false;
                        return;
                    }
                    self.adr += 1;
                    self.shift_out = self.csr.read(self.adr);
                    self.counter = 0;
                }
                self.out_level = (self.shift_out >> (7 - self.counter)) & 1 != 0;
                self.counter += 1;
            }
            State::End => self.out_level = false,
            _ => {}
        }
    }
}

impl<C: CsrBus> Tickable for SpiControl<C> {
    fn tick(&mut self) {
        let clk = self.clk.update(self.raw_clk);
        let data_in = self.data_sync.sample(self.raw_mosi);
        self.cs_active = !self.cs_sync.sample(self.raw_cs_n);

        // Frame select gates everything; deassertion resets any state.
        if !self.cs_active {
            self.clear();
            return;
        }

        if clk.edge.rising {
            self.on_rising_edge(data_in);
        }
        if clk.edge.falling {
            self.on_falling_edge();
        }
    }
}

impl<C: CsrBus> Observable for SpiControl<C> {
    fn query(&self, path: &str) -> Option<Value> {
        match path {
            "state" => Some(self.state.name().into()),
            "adr" => Some(self.adr.into()),
            "we" => Some(self.we.into()),
            "line.out" => Some(self.out_level.into()),
            _ => None,
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &["state", "adr", "we", "line.out"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_core::CsrFile;

    const SETTLE: usize = 6;

    fn control() -> SpiControl<CsrFile> {
        SpiControl::new(0x000, 0x0FF, true, CsrFile::new(0, 0x100)).unwrap()
    }

    fn settle(c: &mut SpiControl<CsrFile>) {
        for _ in 0..SETTLE {
            c.tick();
        }
    }

    fn pulse(c: &mut SpiControl<CsrFile>, bit: bool) {
        c.set_mosi(bit);
        settle(c);
        c.set_clk(true);
        settle(c);
        c.set_clk(false);
        settle(c);
    }

    fn send_command(c: &mut SpiControl<CsrFile>, write: bool, adr: u16) {
        let command = (u16::from(write) << 15) | (adr & ADDRESS_MASK);
        for shift in (0..16).rev() {
            pulse(c, (command >> shift) & 1 != 0);
        }
    }

    fn send_byte(c: &mut SpiControl<CsrFile>, byte: u8) {
        for shift in (0..8).rev() {
            pulse(c, (byte >> shift) & 1 != 0);
        }
    }

    fn read_byte(c: &mut SpiControl<CsrFile>) -> u8 {
        let mut byte = 0u8;
        for _ in 0..8 {
            c.set_clk(true);
            settle(c);
            byte = (byte << 1) | u8::from(c.data_out().unwrap_or(false));
            c.set_clk(false);
            settle(c);
        }
        byte
    }

    fn start(c: &mut SpiControl<CsrFile>) {
        c.set_cs_n(false);
        settle(c);
    }

    fn finish(c: &mut SpiControl<CsrFile>) {
        c.set_cs_n(true);
        settle(c);
    }

    #[test]
    fn single_byte_write_lands_in_register() {
        let mut c = control();
        start(&mut c);
        send_command(&mut c, true, 0x42);
        send_byte(&mut c, 0x99);
        finish(&mut c);
        assert_eq!(c.csr_mut().read(0x42), 0x99);
    }

    #[test]
    fn burst_write_auto_increments() {
        let mut c = control();
        start(&mut c);
        send_command(&mut c, true, 0x10);
        for byte in [0xDE, 0xAD, 0xBE, 0xEF] {
            send_byte(&mut c, byte);
        }
        finish(&mut c);
        assert_eq!(c.csr_mut().read(0x10), 0xDE);
        assert_eq!(c.csr_mut().read(0x11), 0xAD);
        assert_eq!(c.csr_mut().read(0x12), 0xBE);
        assert_eq!(c.csr_mut().read(0x13), 0xEF);
    }

    #[test]
    fn burst_read_returns_bytes_msb_first() {
        let mut c = control();
        c.csr_mut().write(0x20, 0xA5);
        c.csr_mut().write(0x21, 0x3C);
        start(&mut c);
        send_command(&mut c, false, 0x20);
        assert_eq!(read_byte(&mut c), 0xA5);
        assert_eq!(read_byte(&mut c), 0x3C);
        finish(&mut c);
    }

    #[test]
    fn out_of_window_command_is_ignored() {
        let mut c = SpiControl::new(0x10, 0x1F, true, CsrFile::new(0, 0x100)).unwrap();
        start(&mut c);
        send_command(&mut c, true, 0x42);
        send_byte(&mut c, 0xFF);
        finish(&mut c);
        assert_eq!(c.csr_mut().read(0x42), 0);
        assert_eq!(c.csr_mut().read(0x10), 0);
    }

    #[test]
    fn write_stops_at_window_end() {
        let mut c = SpiControl::new(0x00, 0x01, true, CsrFile::new(0, 0x100)).unwrap();
        start(&mut c);
        send_command(&mut c, true, 0x01);
        send_byte(&mut c, 0x11);
        // Window exhausted: further bytes must go nowhere.
        send_byte(&mut c, 0x22);
        finish(&mut c);
        assert_eq!(c.csr_mut().read(0x01), 0x11);
        assert_eq!(c.csr_mut().read(0x02), 0);
    }

    #[test]
    fn frame_select_deassert_resets_mid_command() {
        let mut c = control();
        start(&mut c);
        for _ in 0..9 {
            pulse(&mut c, true);
        }
        finish(&mut c);
        assert_eq!(c.query("state"), Some(Value::String("idle".into())));
        assert_eq!(c.query("adr"), Some(Value::U16(0)));
    }

    #[test]
    fn inverted_window_rejected_at_construction() {
        assert!(SpiControl::new(0x20, 0x10, true, CsrFile::new(0, 0x100)).is_err());
    }

    #[test]
    fn output_tristated_outside_frame() {
        let mut c = control();
        settle(&mut c);
        assert_eq!(c.data_out(), None);
        start(&mut c);
        assert!(c.data_out().is_some());
    }
}
