// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! IPZ VPD parsing.
//!
//! On-media layout, all offsets absolute within the parse buffer:
//!
//! ```text
//! [0..11)   ECC covering the VHDR record body
//! [11..55)  VHDR record body: 0x84 tag, length, RT keyword, "VHDR", ...
//! [17..21)  ASCII "VHDR"
//! [35..37)  u16le offset of the VTOC record
//! [37..39)  u16le VTOC length
//! [39..41)  u16le VTOC ECC offset
//! [41..43)  u16le VTOC ECC length
//! ```
//!
//! The VTOC record carries the `PT` keyword, a packed list of 13-byte
//! entries naming every other record together with its body and ECC
//! coordinates. Each record opens with an `RT` keyword repeating the record
//! name and closes with the `PF` keyword.
//!
//! ECC runs on the header, then the VTOC, then every record listed in the
//! PT, strictly in that order. Header or VTOC damage beyond repair aborts
//! the parse; a single rotten record is skipped with a warning and the
//! survivors are still returned. Repaired regions are pushed through the
//! write-back sink at `base_offset + region_offset`, best effort.

use anyhow::Result;
use bytes::Bytes;
use tracing::{debug, warn};
use zerocopy::FromBytes;

use crate::{
    ecc::{self, EccSink, EccStatus},
    models::{
        error::VpdError,
        keyword::{self, LAST_KW, POUND_KW},
        map::{IpzVpdMap, KeywordValueMap, VpdMap},
        reader::ByteReader,
        zero_copy::{PT_ENTRY_LEN, PtEntry},
    },
    parsers::{ParseOptions, ParseVpd},
    utils::ascii_lossy,
};

// Offsets of fixed entries within the VPD buffer.
const VHDR_ECC_START: usize = 0;
const VHDR_RECORD_START: usize = 11;
const VHDR_NAME_START: usize = 17;
const VTOC_PTR: usize = 35;
const VTOC_REC_LEN: usize = 37;
const VTOC_ECC_OFF: usize = 39;
const VTOC_ECC_LEN: usize = 41;

// Lengths of specific entries within the VPD buffer.
const RECORD_MIN: usize = 44;
const VHDR_RECORD_LENGTH: usize = 44;
const VHDR_ECC_LENGTH: usize = 11;
const RECORD_NAME_LEN: usize = 4;
const KW_NAME_LEN: usize = 2;
const RECORD_ID_LEN: usize = 2;
const RECORD_SIZE_LEN: usize = 2;
const KW_SIZE_LEN: usize = 1;

// First byte past the VHDR ECC + record pair; PT coordinates below this
// would alias the header.
const VHDR_END: usize = VHDR_RECORD_START + VHDR_RECORD_LENGTH;

/// Largest EEPROM read window the inventory stack hands us.
pub const MAX_IPZ_BUFFER: usize = 65_504;

/// Records kept when strict filtering is on.
pub const RECORDS_OF_INTEREST: [&str; 3] = ["VINI", "OPFR", "OSYS"];

/// Parser for the IPZ record/keyword format.
///
/// Holds a working copy of the input so ECC repairs can land in place; the
/// caller's buffer is never touched.
pub struct IpzVpdParser<'a> {
    vpd: Vec<u8>,
    source: String,
    base_offset: u64,
    strict: bool,
    sink: Option<&'a mut dyn EccSink>,
    parsed: IpzVpdMap,
}

impl<'a> IpzVpdParser<'a> {
    pub fn new(vpd: &[u8], opts: ParseOptions<'a>) -> Self {
        Self {
            vpd: vpd.to_vec(),
            source: opts.source,
            base_offset: opts.base_offset,
            strict: opts.strict,
            sink: opts.sink,
            parsed: IpzVpdMap::new(),
        }
    }

    /// Validates the VHDR record, including its ECC.
    fn check_header(&mut self) -> Result<(), VpdError> {
        if self.vpd.len() < RECORD_MIN {
            return Err(VpdError::Data(format!(
                "malformed VPD, {} byte(s) is below the {RECORD_MIN}-byte minimum",
                self.vpd.len()
            )));
        }
        if self.vpd.len() > MAX_IPZ_BUFFER {
            warn!(
                source = %self.source,
                "buffer is {} bytes, larger than the {MAX_IPZ_BUFFER}-byte EEPROM window",
                self.vpd.len()
            );
        }

        let reader = ByteReader::new(&self.vpd);
        if reader.bytes_at(VHDR_NAME_START, RECORD_NAME_LEN)? != b"VHDR" {
            return Err(VpdError::BadMagic("VHDR record not found".to_string()));
        }

        match self.region_ecc_check(
            "VHDR",
            VHDR_RECORD_START,
            VHDR_RECORD_LENGTH,
            VHDR_ECC_START,
            VHDR_ECC_LENGTH,
        )? {
            EccStatus::Uncorrectable => {
                Err(VpdError::EccUncorrectable(format!("VHDR of {}", self.source)))
            },
            _ => Ok(()),
        }
    }

    /// Verifies one ECC-covered region, repairing and writing back
    /// correctable damage. The verdict is returned; fatality is the
    /// caller's call.
    fn region_ecc_check(
        &mut self,
        what: &str,
        data_offset: usize,
        data_len: usize,
        ecc_offset: usize,
        ecc_len: usize,
    ) -> Result<EccStatus, VpdError> {
        let reader = ByteReader::new(&self.vpd);
        let ecc = reader.bytes_at(ecc_offset, ecc_len)?.to_vec();
        reader.bytes_at(data_offset, data_len)?;

        let data = &mut self.vpd[data_offset..data_offset + data_len];
        let status = ecc::check_and_correct(data, &ecc);
        if status == EccStatus::Correctable {
            debug!(source = %self.source, "repaired ECC damage in {what}");
            self.write_back(what, data_offset, data_len);
        }
        Ok(status)
    }

    /// Pushes a repaired data region to the sink at its absolute EEPROM
    /// offset. Failure to persist is a diagnostic, never fatal.
    fn write_back(&mut self, what: &str, offset: usize, len: usize) {
        let Some(sink) = self.sink.as_deref_mut() else {
            debug!(source = %self.source, "no sink, repaired {what} stays in memory");
            return;
        };
        let absolute = self.base_offset + offset as u64;
        let outcome = sink
            .seek_absolute(absolute)
            .and_then(|()| sink.write_all(&self.vpd[offset..offset + len]));
        if let Err(e) = outcome {
            warn!(
                source = %self.source,
                "could not write repaired {what} back at {absolute:#x}: {e}"
            );
        }
    }

    /// Verifies the VTOC region named by the header's pointer block.
    fn vtoc_ecc_check(&mut self) -> Result<(), VpdError> {
        let reader = ByteReader::new(&self.vpd);
        let vtoc_offset = usize::from(reader.u16_le_at(VTOC_PTR)?);
        let vtoc_length = usize::from(reader.u16_le_at(VTOC_REC_LEN)?);
        let ecc_offset = usize::from(reader.u16_le_at(VTOC_ECC_OFF)?);
        let ecc_length = usize::from(reader.u16_le_at(VTOC_ECC_LEN)?);

        if vtoc_offset == 0 || vtoc_length == 0 || ecc_offset == 0 || ecc_length == 0 {
            return Err(VpdError::Data(
                "zero VTOC coordinate in the VHDR pointer block".to_string(),
            ));
        }

        match self.region_ecc_check("VTOC", vtoc_offset, vtoc_length, ecc_offset, ecc_length)? {
            EccStatus::Uncorrectable => {
                Err(VpdError::EccUncorrectable(format!("VTOC of {}", self.source)))
            },
            _ => Ok(()),
        }
    }

    /// Locates the VTOC record, verifies it and returns the PT keyword's
    /// data span as `(start, length)`.
    fn read_toc(&mut self) -> Result<(usize, usize), VpdError> {
        let vtoc_offset = usize::from(ByteReader::new(&self.vpd).u16_le_at(VTOC_PTR)?);

        // The record name is the RT keyword's value, past the record header
        // and the RT framing.
        let name_offset =
            vtoc_offset + RECORD_ID_LEN + RECORD_SIZE_LEN + KW_NAME_LEN + KW_SIZE_LEN;
        if ByteReader::new(&self.vpd).bytes_at(name_offset, RECORD_NAME_LEN)? != b"VTOC" {
            return Err(VpdError::BadMagic("VTOC record not found".to_string()));
        }

        self.vtoc_ecc_check()?;

        // Past the record name and the "PT" keyword name sits the PT size
        // byte, then the PT data itself.
        let mut reader = ByteReader::new(&self.vpd);
        reader.seek(name_offset + RECORD_NAME_LEN + KW_NAME_LEN)?;
        let pt_len = usize::from(reader.take_u8()?);
        Ok((reader.position(), pt_len))
    }

    /// Walks the PT keyword and returns the records worth processing as
    /// `(name as listed in the PT, record offset)`.
    ///
    /// Entries with impossible coordinates or ECC damage beyond repair are
    /// skipped with a diagnostic; the rest of the PT is still honoured.
    fn read_pt(&mut self, pt_start: usize, pt_len: usize) -> Result<Vec<(String, usize)>, VpdError> {
        let pt = ByteReader::new(&self.vpd)
            .bytes_at(pt_start, pt_len)?
            .to_vec();
        if pt_len % PT_ENTRY_LEN != 0 {
            warn!(
                source = %self.source,
                "PT length {pt_len} is not a whole number of entries, \
                 ignoring the trailing {} byte(s)",
                pt_len % PT_ENTRY_LEN
            );
        }

        let mut records = Vec::with_capacity(pt_len / PT_ENTRY_LEN);
        for chunk in pt.chunks_exact(PT_ENTRY_LEN) {
            let entry = PtEntry::ref_from_bytes(chunk)
                .map_err(|_| VpdError::Truncated("PT entry".to_string()))?;
            let name = entry.name();
            let offset = usize::from(entry.record_offset.get());
            let length = usize::from(entry.record_length.get());
            let ecc_offset = usize::from(entry.ecc_offset.get());
            let ecc_length = usize::from(entry.ecc_length.get());

            if offset == 0 || length == 0 {
                warn!(source = %self.source, "record {name}: invalid offset or length, skipping");
                continue;
            }
            if ecc_offset == 0 || ecc_length == 0 {
                warn!(source = %self.source, "record {name}: invalid ECC length or offset, skipping");
                continue;
            }
            if offset < VHDR_END || ecc_offset < VHDR_END {
                warn!(source = %self.source, "record {name}: coordinates alias the header, skipping");
                continue;
            }
            let buf_len = self.vpd.len();
            if offset + length > buf_len || ecc_offset + ecc_length > buf_len {
                warn!(source = %self.source, "record {name}: body or ECC outside the buffer, skipping");
                continue;
            }

            match self.region_ecc_check(&format!("record {name}"), offset, length, ecc_offset, ecc_length)? {
                EccStatus::Uncorrectable => {
                    warn!(source = %self.source, "record {name}: ECC check failed, skipping");
                },
                _ => records.push((name, offset)),
            }
        }
        Ok(records)
    }

    /// Reads one record's keyword stream into the parsed map.
    fn process_record(&mut self, pt_name: &str, record_offset: usize) -> Result<(), VpdError> {
        let name_offset =
            record_offset + RECORD_ID_LEN + RECORD_SIZE_LEN + KW_NAME_LEN + KW_SIZE_LEN;
        let record_name = ascii_lossy(
            ByteReader::new(&self.vpd).bytes_at(name_offset, RECORD_NAME_LEN)?,
        );
        if record_name != pt_name {
            warn!(
                source = %self.source,
                "PT lists record {pt_name} but its RT keyword says {record_name}"
            );
        }

        if self.strict && !RECORDS_OF_INTEREST.contains(&record_name.as_str()) {
            debug!(source = %self.source, "record {record_name} filtered out");
            return Ok(());
        }

        // Start at the RT keyword itself so it lands in the map alongside
        // everything else.
        let keywords = self.read_keywords(record_offset + RECORD_ID_LEN + RECORD_SIZE_LEN)?;
        self.parsed.insert(record_name, keywords);
        Ok(())
    }

    /// Walks a keyword stream until `PF` or the end of the buffer.
    ///
    /// A `#`-prefixed keyword name announces a 16-bit data length, everyone
    /// else carries a single length byte.
    fn read_keywords(&self, start: usize) -> Result<KeywordValueMap, VpdError> {
        let mut reader = ByteReader::new(&self.vpd);
        reader.seek(start)?;

        let mut keywords = KeywordValueMap::new();
        while reader.remaining() >= KW_NAME_LEN {
            let name_bytes = reader.take(KW_NAME_LEN)?;
            if name_bytes == LAST_KW {
                break;
            }
            let name = ascii_lossy(name_bytes);

            let data_len = if name_bytes[0] == POUND_KW {
                usize::from(reader.take_u16_le()?)
            } else {
                usize::from(reader.take_u8()?)
            };
            let value = Bytes::copy_from_slice(reader.take(data_len)?);

            if !self.strict || keyword::encoding_for(&name).is_some() {
                keywords.insert(name, value);
            }
        }
        Ok(keywords)
    }
}

impl ParseVpd for IpzVpdParser<'_> {
    fn parse(&mut self) -> Result<VpdMap> {
        self.check_header()?;
        let (pt_start, pt_len) = self.read_toc()?;
        let records = self.read_pt(pt_start, pt_len)?;
        for (pt_name, offset) in records {
            self.process_record(&pt_name, offset)?;
        }
        debug!(
            source = %self.source,
            records = self.parsed.len(),
            "IPZ parse complete"
        );
        Ok(VpdMap::Ipz(std::mem::take(&mut self.parsed)))
    }
}
