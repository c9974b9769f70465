//! Named-register access: resolve addresses through a register map and
//! drive them over the serial link.

use bridge_regmap::{Access, RegisterMap};
use spi_bridge::WireConfig;
use spi_host::BridgeFixture;

const CSV: &str = "\
csr_base,ctrl,0x40000000
csr_register,ctrl_reset,0x40000000,1,rw
csr_register,ctrl_scratch,0x40000004,1,rw
csr_register,ctrl_bus_errors,0x40000008,1,ro
constant,config_clock_frequency,48000000
";

#[test]
fn named_register_round_trips_over_the_link() {
    let map = RegisterMap::from_csv_str(CSV).unwrap();
    let scratch = map.address_of("ctrl_scratch").unwrap();

    let mut fixture = BridgeFixture::new(WireConfig::four_wire());
    fixture.write(scratch, 0x600D_CAFE).unwrap();
    assert_eq!(fixture.read(scratch).unwrap(), 0x600D_CAFE);
    fixture.assert_lines_clean();
}

#[test]
fn access_rights_travel_with_the_map() {
    let map = RegisterMap::from_csv_str(CSV).unwrap();
    assert_eq!(map.get("ctrl_scratch").unwrap().access, Access::ReadWrite);
    assert_eq!(map.get("ctrl_bus_errors").unwrap().access, Access::ReadOnly);
}

#[test]
fn json_map_resolves_the_same_addresses() {
    let json = r#"[
        {"name": "ctrl_scratch", "address": 1073741828, "size": 1, "access": "read-write"}
    ]"#;
    let map = RegisterMap::from_json_str(json).unwrap();
    let scratch = map.address_of("ctrl_scratch").unwrap();
    assert_eq!(scratch, 0x4000_0004);

    let mut fixture = BridgeFixture::new(WireConfig::three_wire());
    fixture.write(scratch, 0x7777_7777).unwrap();
    assert_eq!(fixture.read(scratch).unwrap(), 0x7777_7777);
}
