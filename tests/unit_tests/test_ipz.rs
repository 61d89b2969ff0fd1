// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::io::Cursor;

use anyhow::Result;
use vpd_parser_rs::{
    models::{error::VpdError, map::VpdMap},
    parsers::{ParseOptions, parse_vpd},
};

use super::common::{PtExtra, build_ipz_image, build_ipz_image_with};

static PLANAR_RECORDS: &[(&str, &[(&str, &[u8])])] = &[
    ("VINI", &[("DR", b"SYSTEM PLANAR"), ("PN", b"01AB234")]),
    ("OSYS", &[("SS", b"XYZ")]),
];

#[test]
fn test_parse_two_records() -> Result<()> {
    let img = build_ipz_image(PLANAR_RECORDS);
    assert_eq!(img.bytes.len(), 256);

    let map = parse_vpd(&img.bytes, ParseOptions::new("eeprom0"))?;
    let VpdMap::Ipz(records) = map else {
        panic!("expected an IPZ result");
    };
    assert_eq!(records.len(), 2);

    let vini = &records["VINI"];
    assert_eq!(vini["RT"].as_ref(), b"VINI");
    assert_eq!(vini["DR"].as_ref(), b"SYSTEM PLANAR");
    assert_eq!(vini["PN"].as_ref(), b"01AB234");

    let osys = &records["OSYS"];
    assert_eq!(osys["RT"].as_ref(), b"OSYS");
    assert_eq!(osys["SS"].as_ref(), b"XYZ");
    Ok(())
}

#[test]
fn test_correctable_record_is_repaired_and_written_back() -> Result<()> {
    let img = build_ipz_image(PLANAR_RECORDS);
    let pristine = img.bytes.clone();
    let vini = img
        .records
        .iter()
        .find(|r| r.name == "VINI")
        .expect("VINI was built");

    // one flipped bit inside the DR value
    let mut damaged = img.bytes.clone();
    damaged[vini.offset + 15] ^= 0x01;
    assert_ne!(damaged, pristine);

    let base = 0x180u64;
    let mut sink = Cursor::new(vec![0u8; base as usize + pristine.len()]);
    let map = parse_vpd(
        &damaged,
        ParseOptions::new("eeprom0")
            .with_base_offset(base)
            .with_sink(&mut sink),
    )?;

    let VpdMap::Ipz(records) = map else {
        panic!("expected an IPZ result");
    };
    assert_eq!(records["VINI"]["DR"].as_ref(), b"SYSTEM PLANAR");

    // exactly the repaired record body landed at base + record_offset
    let written = sink.into_inner();
    let start = base as usize + vini.offset;
    assert_eq!(
        &written[start..start + vini.length],
        &pristine[vini.offset..vini.offset + vini.length]
    );
    assert!(written[..start].iter().all(|b| *b == 0));
    assert!(written[start + vini.length..].iter().all(|b| *b == 0));
    Ok(())
}

#[test]
fn test_correctable_without_sink_still_parses() -> Result<()> {
    let img = build_ipz_image(PLANAR_RECORDS);
    let vini = &img.records[0];
    let mut damaged = img.bytes.clone();
    damaged[vini.offset + 15] ^= 0x01;

    let map = parse_vpd(&damaged, ParseOptions::new("eeprom0"))?;
    let VpdMap::Ipz(records) = map else {
        panic!("expected an IPZ result");
    };
    assert_eq!(records["VINI"]["DR"].as_ref(), b"SYSTEM PLANAR");
    Ok(())
}

#[test]
fn test_uncorrectable_vhdr_is_fatal() {
    let img = build_ipz_image(PLANAR_RECORDS);
    let mut damaged = img.bytes;
    // two flipped bits in one ECC group of the VHDR body
    damaged[24] ^= 0b0000_0011;

    let err = parse_vpd(&damaged, ParseOptions::new("eeprom0")).expect_err("must fail");
    let kind = err.downcast_ref::<VpdError>().expect("typed error");
    assert!(
        matches!(kind, VpdError::EccUncorrectable(what) if what.contains("VHDR")),
        "unexpected error: {kind}"
    );
}

#[test]
fn test_uncorrectable_record_is_skipped() -> Result<()> {
    let img = build_ipz_image(PLANAR_RECORDS);
    let osys = img
        .records
        .iter()
        .find(|r| r.name == "OSYS")
        .expect("OSYS was built");
    let mut damaged = img.bytes.clone();
    damaged[osys.offset + 12] ^= 0b0000_0011;

    let map = parse_vpd(&damaged, ParseOptions::new("eeprom0"))?;
    let VpdMap::Ipz(records) = map else {
        panic!("expected an IPZ result");
    };
    assert!(records.contains_key("VINI"), "survivors must be kept");
    assert!(!records.contains_key("OSYS"), "rotten record must be dropped");
    Ok(())
}

#[test]
fn test_pt_entry_with_zero_offset_is_skipped() -> Result<()> {
    let img = build_ipz_image_with(
        PLANAR_RECORDS,
        &[PtExtra {
            name: "BAD0",
            offset: 0,
            length: 0x20,
            ecc_offset: 0,
            ecc_length: 8,
        }],
        256,
    );

    let map = parse_vpd(&img.bytes, ParseOptions::new("eeprom0"))?;
    let VpdMap::Ipz(records) = map else {
        panic!("expected an IPZ result");
    };
    assert_eq!(records.len(), 2);
    assert!(!records.contains_key("BAD0"));
    Ok(())
}

#[test]
fn test_pt_entry_outside_buffer_is_skipped() -> Result<()> {
    let img = build_ipz_image_with(
        PLANAR_RECORDS,
        &[PtExtra {
            name: "OOBX",
            offset: 0xF000,
            length: 0x40,
            ecc_offset: 0xF040,
            ecc_length: 0x10,
        }],
        256,
    );

    let map = parse_vpd(&img.bytes, ParseOptions::new("eeprom0"))?;
    let VpdMap::Ipz(records) = map else {
        panic!("expected an IPZ result");
    };
    assert_eq!(records.len(), 2);
    Ok(())
}

#[test]
fn test_strict_mode_filters_records_and_keywords() -> Result<()> {
    let records: &[(&str, &[(&str, &[u8])])] = &[
        ("VINI", &[("DR", b"SYSTEM PLANAR"), ("ZZ", b"??")]),
        ("CUST", &[("CD", b"0123")]),
    ];
    let img = build_ipz_image(records);

    let map = parse_vpd(&img.bytes, ParseOptions::new("eeprom0").with_strict(true))?;
    let VpdMap::Ipz(parsed) = map else {
        panic!("expected an IPZ result");
    };
    assert_eq!(parsed.len(), 1, "only records of interest survive");
    let vini = &parsed["VINI"];
    assert_eq!(vini["DR"].as_ref(), b"SYSTEM PLANAR");
    assert!(!vini.contains_key("ZZ"), "unknown keywords are dropped");
    assert!(!vini.contains_key("RT"), "RT has no encoding, dropped too");
    Ok(())
}

#[test]
fn test_pound_keyword_carries_u16_length() -> Result<()> {
    let payload = vec![0xAB; 300];
    let records: &[(&str, &[(&str, &[u8])])] =
        &[("VINI", &[("DR", b"BACKPLANE"), ("#I", payload.as_slice())])];
    let img = build_ipz_image(records);

    let map = parse_vpd(&img.bytes, ParseOptions::new("eeprom0"))?;
    let VpdMap::Ipz(parsed) = map else {
        panic!("expected an IPZ result");
    };
    let vini = &parsed["VINI"];
    assert_eq!(vini["#I"].len(), 300);
    assert!(vini["#I"].iter().all(|b| *b == 0xAB));
    Ok(())
}

#[test]
fn test_header_only_buffer_is_truncated() {
    let img = build_ipz_image(PLANAR_RECORDS);
    let short = &img.bytes[..44];

    let err = parse_vpd(short, ParseOptions::new("eeprom0")).expect_err("must fail");
    let kind = err.downcast_ref::<VpdError>().expect("typed error");
    assert!(matches!(kind, VpdError::Truncated(_)), "unexpected error: {kind}");
}

#[test]
fn test_missing_vhdr_magic() {
    let mut buf = vec![0u8; 64];
    buf[11] = 0x84;

    let err = parse_vpd(&buf, ParseOptions::new("eeprom0")).expect_err("must fail");
    let kind = err.downcast_ref::<VpdError>().expect("typed error");
    assert!(matches!(kind, VpdError::BadMagic(_)), "unexpected error: {kind}");
}

#[test]
fn test_printable_view_decodes_keywords() -> Result<()> {
    let records: &[(&str, &[(&str, &[u8])])] = &[(
        "VINI",
        &[
            ("DR", b"SYSTEM PLANAR"),
            ("HW", &[0x00, 0x1A]),
            ("B1", &[0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]),
        ],
    )];
    let img = build_ipz_image(records);

    let map = parse_vpd(&img.bytes, ParseOptions::new("eeprom0"))?;
    let json = map.to_json();
    assert_eq!(json["VINI"]["DR"], "SYSTEM PLANAR");
    assert_eq!(json["VINI"]["HW"], "001a");
    assert_eq!(json["VINI"]["B1"], "aa:bb:cc:dd:ee:ff");
    assert_eq!(json["VINI"]["RT"], "VINI");
    Ok(())
}
