// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Keyword VPD parsing.
//!
//! A keyword VPD stream is a single tag-framed record:
//!
//! ```text
//! 0x82                      large resource: identifier string
//! u16le len, len bytes      the identifier itself
//! 0x84 | 0x90               vendor-defined large resource   ┐
//! u16le total_size          size of the keyword area        │ summed for
//! (name2, len1, data)...    keyword/value triples           ┘ the checksum
//! u8 checksum               two's complement of the sum above
//! 0x79                      end of small resource
//! 0x78                      end of VPD
//! ```
//!
//! Unlike IPZ there is no ECC here; the additive checksum is the only
//! integrity cover, and any violation condemns the whole buffer.

use anyhow::Result;
use bytes::Bytes;
use tracing::debug;

use crate::{
    models::{
        error::VpdError,
        format::{
            ALT_KW_VPD_PAIR_START_TAG, KW_VAL_PAIR_END_TAG, KW_VAL_PAIR_START_TAG,
            KW_VPD_END_TAG, KW_VPD_START_TAG,
        },
        map::{KeywordVpdMap, VpdMap},
        reader::ByteReader,
    },
    parsers::ParseVpd,
    utils::ascii_lossy,
};

const KW_NAME_LEN: usize = 2;

/// Parser for the tag-framed keyword VPD format.
pub struct KeywordVpdParser<'a> {
    vpd: &'a [u8],
    source: String,
}

impl<'a> KeywordVpdParser<'a> {
    pub fn new(vpd: &'a [u8], source: impl Into<String>) -> Self {
        Self { vpd, source: source.into() }
    }

    fn parse_keywords(&self) -> Result<KeywordVpdMap, VpdError> {
        let mut reader = ByteReader::new(self.vpd);

        if reader.take_u8()? != KW_VPD_START_TAG {
            return Err(VpdError::BadMagic(
                "large resource identifier tag missing".to_string(),
            ));
        }
        let identifier_len = usize::from(reader.take_u16_le()?);
        reader.skip(identifier_len)?;

        let checksum_start = reader.position();
        let vendor_tag = reader.take_u8()?;
        if vendor_tag != KW_VAL_PAIR_START_TAG && vendor_tag != ALT_KW_VPD_PAIR_START_TAG {
            return Err(VpdError::BadMagic(format!(
                "vendor-defined resource tag missing, found {vendor_tag:#04x}"
            )));
        }

        let total_size = usize::from(reader.take_u16_le()?);
        if total_size == 0 {
            return Err(VpdError::Data(
                "keyword data size is 0, badly formed keyword VPD".to_string(),
            ));
        }

        let mut keywords = KeywordVpdMap::new();
        let mut remaining = total_size;
        while remaining > 0 {
            let name = ascii_lossy(reader.take(KW_NAME_LEN)?);
            let data_len = usize::from(reader.take_u8()?);
            let value = Bytes::copy_from_slice(reader.take(data_len)?);
            keywords.insert(name, value);
            remaining = remaining.saturating_sub(KW_NAME_LEN + 1 + data_len);
        }
        let checksum_end = reader.position();

        self.validate_checksum(&mut reader, checksum_start, checksum_end)?;

        if reader.take_u8()? != KW_VAL_PAIR_END_TAG {
            return Err(VpdError::BadTrailer(
                "small resource end tag missing".to_string(),
            ));
        }
        if reader.take_u8()? != KW_VPD_END_TAG {
            return Err(VpdError::BadTrailer("VPD end tag missing".to_string()));
        }

        Ok(keywords)
    }

    /// The checksum byte follows the keyword area and must be the two's
    /// complement of everything from the vendor tag onward, so the whole
    /// span sums to zero mod 256.
    fn validate_checksum(
        &self,
        reader: &mut ByteReader<'_>,
        checksum_start: usize,
        checksum_end: usize,
    ) -> Result<(), VpdError> {
        let summed = ByteReader::new(self.vpd)
            .bytes_at(checksum_start, checksum_end - checksum_start)?
            .iter()
            .fold(0u8, |acc, b| acc.wrapping_add(*b));
        let expected = summed.wrapping_neg();

        let stored = reader.take_u8()?;
        if stored != expected {
            return Err(VpdError::BadChecksum(format!(
                "computed {expected:#04x}, stored {stored:#04x}"
            )));
        }
        Ok(())
    }
}

impl ParseVpd for KeywordVpdParser<'_> {
    fn parse(&mut self) -> Result<VpdMap> {
        let keywords = self.parse_keywords()?;
        debug!(
            source = %self.source,
            keywords = keywords.len(),
            "keyword VPD parse complete"
        );
        Ok(VpdMap::KeywordVpd(keywords))
    }
}
