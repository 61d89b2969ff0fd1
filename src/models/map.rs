// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Parsed VPD maps and the tagged result handed back to callers.
//!
//! Parsing stores keyword values as the raw bytes read from media; the
//! printable views below decode on demand so that a publisher can ask for a
//! human-facing rendering without the parser ever guessing what a consumer
//! wants.

use std::collections::{BTreeMap, HashMap};

use bytes::Bytes;
use serde_json::{Value, json};
use tracing::warn;

use crate::{models::keyword, utils::ascii_lossy};

/// Keyword name → raw value bytes, one record's worth.
pub type KeywordValueMap = HashMap<String, Bytes>;

/// Record name → keyword map, the whole IPZ image.
pub type IpzVpdMap = HashMap<String, KeywordValueMap>;

/// Keyword name → raw value bytes of the single keyword VPD record.
pub type KeywordVpdMap = HashMap<String, Bytes>;

/// Fields decoded from a DDR5 DDIMM SPD image.
///
/// `fru_number` mirrors `part_number` byte for byte; consumers needing a
/// true FRU number must not rely on it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DdimmVpdMap {
    pub size_kb: u64,
    pub fru_number: Bytes,
    pub part_number: Bytes,
    pub serial_number: Bytes,
    pub ccin: Bytes,
}

/// Result of one parse, tagged by the format that was found.
///
/// `Empty` is the default state a caller holds before (or instead of) a
/// successful parse; match on the tag before touching the contents.
#[derive(Debug, Clone, Default)]
pub enum VpdMap {
    #[default]
    Empty,
    Ipz(IpzVpdMap),
    KeywordVpd(KeywordVpdMap),
    Ddimm(DdimmVpdMap),
}

impl VpdMap {
    /// Decoded rendering of the whole result as JSON, ready for an
    /// inventory publisher. Keys come out sorted.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Empty => Value::Null,
            Self::Ipz(records) => json!(ipz_printable(records)),
            Self::KeywordVpd(keywords) => json!(keyword_printable(keywords)),
            Self::Ddimm(ddimm) => json!({
                "MemorySizeInKB": ddimm.size_kb,
                "FN": ascii_lossy(&ddimm.fru_number),
                "PN": ascii_lossy(&ddimm.part_number),
                "SN": ascii_lossy(&ddimm.serial_number),
                "CC": ascii_lossy(&ddimm.ccin),
            }),
        }
    }
}

/// Decoded view of a parsed IPZ map.
///
/// Keywords with a known encoding are decoded per the keyword table;
/// everything else is carried as its raw bytes rendered verbatim.
pub fn ipz_printable(records: &IpzVpdMap) -> BTreeMap<String, BTreeMap<String, String>> {
    records
        .iter()
        .map(|(record, kwds)| (record.clone(), keyword_printable(kwds)))
        .collect()
}

/// Decoded view of one keyword → raw-bytes map.
pub fn keyword_printable(kwds: &KeywordValueMap) -> BTreeMap<String, String> {
    kwds.iter()
        .map(|(name, raw)| {
            let rendered = match keyword::decode(name, raw) {
                Ok(Some(decoded)) => decoded,
                Ok(None) => ascii_lossy(raw),
                Err(e) => {
                    warn!("keyword {name} does not decode ({e}), rendering as hex");
                    hex::encode(raw)
                },
            };
            (name.clone(), rendered)
        })
        .collect()
}
