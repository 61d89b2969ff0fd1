// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;
use vpd_parser_rs::{
    models::{error::VpdError, map::VpdMap},
    parsers::{ParseOptions, parse_vpd},
};

use super::common::build_ddr5_ddimm_spd;

const PN: &[u8; 7] = b"78P4191";
const SN: &[u8; 12] = b"YH30MS5CH123";
const CC: &[u8; 4] = b"32AB";

fn parse_ddimm(spd: &[u8]) -> Result<VpdMap> {
    parse_vpd(spd, ParseOptions::new("dimm0"))
}

#[test]
fn test_capacity_16gb_module() -> Result<()> {
    // 2 channels x 32-bit bus, 1 die per package, 4 GB per die, 2 ranks,
    // x4 DRAM: 2*32*1*4*2 / (8*4) = 16 GB
    let spd = build_ddr5_ddimm_spd(0x01, 0x00, 0x00, 0b0000_1001, PN, SN, CC);

    let VpdMap::Ddimm(fields) = parse_ddimm(&spd)? else {
        panic!("expected a DDIMM result");
    };
    assert_eq!(fields.size_kb, 16 * 1_048_576);
    Ok(())
}

#[test]
fn test_capacity_32gb_module() -> Result<()> {
    // 2 dies per package, 4 ranks (1 + 1 + 2), x8 DRAM:
    // 2*32*2*4*4 / (8*8) = 32 GB
    let spd = build_ddr5_ddimm_spd(0x21, 0x20, 0b0000_1001, 0b0000_1001, PN, SN, CC);

    let VpdMap::Ddimm(fields) = parse_ddimm(&spd)? else {
        panic!("expected a DDIMM result");
    };
    assert_eq!(fields.size_kb, 32 * 1_048_576);
    Ok(())
}

#[test]
fn test_capacity_uses_density_table() -> Result<()> {
    // density code 8 maps to 64 GB per die, die code 5 to 16 dies, x32
    // DRAM, ranks = 7 + 7 + 2: 2*32*16*64*16 / (8*32) = 4096 GB
    let spd = build_ddr5_ddimm_spd(0xA8, 0x60, 0b0011_1111, 0b0000_1001, PN, SN, CC);

    let VpdMap::Ddimm(fields) = parse_ddimm(&spd)? else {
        panic!("expected a DDIMM result");
    };
    assert_eq!(fields.size_kb, 4096 * 1_048_576);
    Ok(())
}

#[test]
fn test_identity_fields_at_11s_offsets() -> Result<()> {
    let spd = build_ddr5_ddimm_spd(0x01, 0x00, 0x00, 0b0000_1001, PN, SN, CC);
    assert_eq!(&spd[419..426], PN);
    assert_eq!(&spd[426..438], SN);
    assert_eq!(&spd[438..442], CC);

    let VpdMap::Ddimm(fields) = parse_ddimm(&spd)? else {
        panic!("expected a DDIMM result");
    };
    assert_eq!(fields.part_number.as_ref(), PN);
    assert_eq!(fields.serial_number.as_ref(), SN);
    assert_eq!(fields.ccin.as_ref(), CC);
    assert_eq!(
        fields.fru_number, fields.part_number,
        "FN mirrors PN byte for byte"
    );
    Ok(())
}

#[test]
fn test_invalid_density_code_is_fatal() {
    // density code 9 is outside [1..8], capacity collapses to zero
    let spd = build_ddr5_ddimm_spd(0x09, 0x00, 0x00, 0b0000_1001, PN, SN, CC);

    let err = parse_ddimm(&spd).expect_err("must fail");
    let kind = err.downcast_ref::<VpdError>().expect("typed error");
    assert!(matches!(kind, VpdError::Data(_)), "unexpected error: {kind}");
}

#[test]
fn test_missing_channel_is_fatal() {
    // byte 235 low channel subfield is zero
    let spd = build_ddr5_ddimm_spd(0x01, 0x00, 0x00, 0b0000_1000, PN, SN, CC);

    let err = parse_ddimm(&spd).expect_err("must fail");
    let kind = err.downcast_ref::<VpdError>().expect("typed error");
    assert!(matches!(kind, VpdError::Data(_)), "unexpected error: {kind}");
}

#[test]
fn test_ddr4_ddimm_is_unsupported() {
    let mut spd = build_ddr5_ddimm_spd(0x01, 0x00, 0x00, 0b0000_1001, PN, SN, CC);
    spd[2] = 0x0C;

    let err = parse_ddimm(&spd).expect_err("must fail");
    let kind = err.downcast_ref::<VpdError>().expect("typed error");
    assert!(
        matches!(kind, VpdError::Unsupported(_)),
        "unexpected error: {kind}"
    );
}

#[test]
fn test_isdimm_is_unsupported() {
    // DDR5 DRAM type without the DDIMM module nibble or the 11S block
    let mut spd = vec![0u8; 512];
    spd[2] = 0x12;

    let err = parse_ddimm(&spd).expect_err("must fail");
    let kind = err.downcast_ref::<VpdError>().expect("typed error");
    assert!(
        matches!(kind, VpdError::Unsupported(_)),
        "unexpected error: {kind}"
    );
}
