// SPDX-License-Identifier: AGPL-3.0-or-later GPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Parser selection and the single entry point.
//!
//! One parse owns its buffer for the duration of the call, runs on the
//! caller's thread and shares no state with any other parse. Callers
//! wanting many EEPROMs in flight run one parse per thread or task.

pub mod ddimm;
pub mod ipz;
pub mod keyword_vpd;

use anyhow::{Context, Result};
use enum_dispatch::enum_dispatch;

use crate::{
    cfg::config::Config,
    ecc::EccSink,
    models::{error::VpdError, format::VpdFormat, map::VpdMap},
    parsers::{ddimm::DdimmVpdParser, ipz::IpzVpdParser, keyword_vpd::KeywordVpdParser},
};

/// Per-parse knobs and collaborators.
pub struct ParseOptions<'a> {
    /// Opaque EEPROM identifier, carried into diagnostics only.
    pub source: String,
    /// Where the VPD starts inside the EEPROM; only ECC write-back cares.
    pub base_offset: u64,
    /// Keep only the records and keywords of interest.
    pub strict: bool,
    /// Destination for repaired ECC regions, usually the EEPROM file.
    pub sink: Option<&'a mut dyn EccSink>,
}

impl<'a> ParseOptions<'a> {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            base_offset: 0,
            strict: false,
            sink: None,
        }
    }

    /// Options derived from a loaded [`Config`]. Attach a sink separately;
    /// callers honouring `EccWriteBack = false` simply never attach one.
    pub fn from_config(cfg: &Config, source: impl Into<String>) -> Self {
        Self {
            strict: cfg.parser.strict,
            ..Self::new(source)
        }
    }

    pub fn with_base_offset(mut self, base_offset: u64) -> Self {
        self.base_offset = base_offset;
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_sink(mut self, sink: &'a mut dyn EccSink) -> Self {
        self.sink = Some(sink);
        self
    }
}

/// Common surface of every format parser.
#[enum_dispatch]
pub trait ParseVpd {
    /// Runs the single-pass parse and hands back the tagged map.
    fn parse(&mut self) -> Result<VpdMap>;
}

/// The closed set of parsers this core ships.
#[enum_dispatch(ParseVpd)]
pub enum VpdParser<'a> {
    Ipz(IpzVpdParser<'a>),
    KeywordVpd(KeywordVpdParser<'a>),
    Ddimm(DdimmVpdParser<'a>),
}

impl<'a> VpdParser<'a> {
    /// Picks the parser matching the buffer's format signature.
    ///
    /// Formats this core recognises but does not decode (DDR4 DDIMM and
    /// both industry-standard DIMM flavours) fail with
    /// [`VpdError::Unsupported`].
    pub fn for_buffer(vpd: &'a [u8], opts: ParseOptions<'a>) -> Result<Self, VpdError> {
        if vpd.is_empty() {
            return Err(VpdError::Truncated("empty VPD buffer".to_string()));
        }

        match VpdFormat::detect(vpd)? {
            VpdFormat::Ipz => Ok(Self::Ipz(IpzVpdParser::new(vpd, opts))),
            VpdFormat::KeywordVpd => {
                Ok(Self::KeywordVpd(KeywordVpdParser::new(vpd, opts.source)))
            },
            VpdFormat::Ddr5Ddimm => Ok(Self::Ddimm(DdimmVpdParser::new(vpd, opts.source))),
            unsupported => Err(VpdError::Unsupported(unsupported)),
        }
    }
}

/// Parses one VPD buffer and returns the tagged result.
///
/// This is the whole public contract: bytes in, [`VpdMap`] out, every
/// failure a [`VpdError`] kind reachable through `downcast_ref`.
pub fn parse_vpd<'a>(vpd: &'a [u8], opts: ParseOptions<'a>) -> Result<VpdMap> {
    let source = opts.source.clone();
    let mut parser = VpdParser::for_buffer(vpd, opts)?;
    parser
        .parse()
        .with_context(|| format!("VPD parse failed for {source}"))
}
