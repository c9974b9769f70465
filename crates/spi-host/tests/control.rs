//! Host model driving the register-window controller.

use bridge_core::{CsrBus, CsrFile, MasterClock};
use spi_bridge::WireMode;
use spi_control::SpiControl;
use spi_host::SpiHost;

fn host() -> SpiHost {
    SpiHost::new(WireMode::FourWire, MasterClock::new(48_000_000), 1_000_000)
}

fn controller() -> SpiControl<CsrFile> {
    SpiControl::new(0x000, 0x0FF, true, CsrFile::new(0, 0x100)).unwrap()
}

fn send_command(host: &mut SpiHost, control: &mut SpiControl<CsrFile>, write: bool, adr: u16) {
    let command = (u16::from(write) << 15) | adr;
    host.send_byte(control, (command >> 8) as u8);
    host.send_byte(control, command as u8);
}

#[test]
fn burst_write_then_burst_read() {
    let mut host = host();
    let mut control = controller();

    host.start(&mut control);
    send_command(&mut host, &mut control, true, 0x10);
    for byte in [0xDE, 0xAD, 0xBE, 0xEF] {
        host.send_byte(&mut control, byte);
    }
    host.finish(&mut control);

    assert_eq!(control.csr_mut().read(0x10), 0xDE);
    assert_eq!(control.csr_mut().read(0x13), 0xEF);

    host.start(&mut control);
    send_command(&mut host, &mut control, false, 0x10);
    let bytes: Vec<u8> = (0..4).map(|_| host.read_byte(&mut control)).collect();
    host.finish(&mut control);

    assert_eq!(bytes, [0xDE, 0xAD, 0xBE, 0xEF]);
    assert!(host.monitor().violations().is_empty());
}

#[test]
fn out_of_window_command_touches_nothing() {
    let mut host = host();
    let mut control = SpiControl::new(0x10, 0x1F, true, CsrFile::new(0, 0x100)).unwrap();

    host.start(&mut control);
    send_command(&mut host, &mut control, true, 0x42);
    host.send_byte(&mut control, 0xFF);
    host.finish(&mut control);

    assert_eq!(control.csr_mut().read(0x42), 0);
}
