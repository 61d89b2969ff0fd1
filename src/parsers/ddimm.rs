// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! DDR5 DDIMM SPD parsing.
//!
//! Two independent things come out of a DDIMM SPD image: the module
//! capacity, derived from the geometry bytes 4, 6, 234 and 235, and the
//! printable identity fields that trail the `"11S"` barcode marker at
//! offset 416.
//!
//! Capacity, in GB:
//!
//! ```text
//!   channels × bus_width × die_per_package × density_per_die × ranks
//!   ------------------------------------------------------------------
//!                        8 × dram_width
//! ```
//!
//! Every geometry subfield is range-checked first; one bad subfield zeroes
//! the capacity, and a zero capacity condemns the buffer.

use anyhow::Result;
use bytes::Bytes;
use tracing::{debug, warn};

use crate::{
    models::{
        error::VpdError,
        format::{FORMAT_11S_LEN, MEMORY_VPD_DATA_START, SPD_BYTE_2, SPD_DRAM_TYPE_DDR5},
        map::{DdimmVpdMap, VpdMap},
        reader::ByteReader,
    },
    parsers::ParseVpd,
};

const SPD_BYTE_4: usize = 4;
const SPD_BYTE_6: usize = 6;
const SPD_BYTE_234: usize = 234;
const SPD_BYTE_235: usize = 235;

const MASK_BYTE_BITS_01: u8 = 0x03;
const MASK_BYTE_BITS_012: u8 = 0x07;
const MASK_BYTE_BITS_345: u8 = 0x38;
const MASK_BYTE_BITS_567: u8 = 0xE0;
const MASK_BYTE_BITS_01234: u8 = 0x1F;

const SHIFT_BITS_3: u8 = 3;
const SHIFT_BITS_5: u8 = 5;

const SDRAM_DENSITY_PER_DIE_24GB: u64 = 24;
const SDRAM_DENSITY_PER_DIE_32GB: u64 = 32;
const SDRAM_DENSITY_PER_DIE_48GB: u64 = 48;
const SDRAM_DENSITY_PER_DIE_64GB: u64 = 64;
const SDRAM_DENSITY_PER_DIE_UNDEFINED: u64 = 0;

const PRIMARY_BUS_WIDTH_32_BITS: u64 = 32;
const PRIMARY_BUS_WIDTH_UNUSED: u64 = 0;

const CONVERT_GB_TO_KB: u64 = 1024 * 1024;

// 11S identity field widths, in order of appearance after the marker.
const PART_NUM_LEN: usize = 7;
const SERIAL_NUM_LEN: usize = 12;
const CCIN_LEN: usize = 4;

const IDENTITY_START: usize = MEMORY_VPD_DATA_START + FORMAT_11S_LEN;

/// Parser for DDR5 DDIMM SPD images.
pub struct DdimmVpdParser<'a> {
    vpd: &'a [u8],
    source: String,
}

impl<'a> DdimmVpdParser<'a> {
    pub fn new(vpd: &'a [u8], source: impl Into<String>) -> Self {
        Self { vpd, source: source.into() }
    }

    fn valid_subfield(&self, what: &str, masked: u8, shift: u8, min: u8, max: u8) -> bool {
        let value = masked >> shift;
        if value < min || value > max {
            warn!(
                source = %self.source,
                "{what} value {value} outside [{min}..{max}]"
            );
            return false;
        }
        true
    }

    fn spd_byte(&self, at: usize) -> Result<u8, VpdError> {
        Ok(ByteReader::new(self.vpd).bytes_at(at, 1)?[0])
    }

    /// Capacity of the module in GB, `None` when any geometry subfield is
    /// out of range.
    fn ddr5_size_gb(&self) -> Result<Option<u64>, VpdError> {
        let byte_235 = self.spd_byte(SPD_BYTE_235)?;
        let byte_234 = self.spd_byte(SPD_BYTE_234)?;
        let byte_4 = self.spd_byte(SPD_BYTE_4)?;
        let byte_6 = self.spd_byte(SPD_BYTE_6)?;

        if !self.valid_subfield("channels per DDIMM", byte_235 & MASK_BYTE_BITS_01, 0, 1, 3)
            || !self.valid_subfield(
                "channels per DDIMM",
                byte_235 & MASK_BYTE_BITS_345,
                SHIFT_BITS_3,
                1,
                3,
            )
        {
            return Ok(None);
        }
        let channels = u64::from(byte_235 & MASK_BYTE_BITS_01 != 0)
            + u64::from(byte_235 & MASK_BYTE_BITS_345 != 0);

        if !self.valid_subfield(
            "bus width per channel",
            byte_235 & MASK_BYTE_BITS_012,
            0,
            1,
            3,
        ) {
            return Ok(None);
        }
        let bus_width = if byte_235 & MASK_BYTE_BITS_012 != 0 {
            PRIMARY_BUS_WIDTH_32_BITS
        } else {
            PRIMARY_BUS_WIDTH_UNUSED
        };

        if !self.valid_subfield(
            "die per package",
            byte_4 & MASK_BYTE_BITS_567,
            SHIFT_BITS_5,
            0,
            5,
        ) {
            return Ok(None);
        }
        let die_per_package = ddr5_die_per_package((byte_4 & MASK_BYTE_BITS_567) >> SHIFT_BITS_5);

        if !self.valid_subfield("SDRAM density per die", byte_4 & MASK_BYTE_BITS_01234, 0, 1, 8) {
            return Ok(None);
        }
        let density_per_die = ddr5_density_per_die(byte_4 & MASK_BYTE_BITS_01234);

        let ranks = u64::from((byte_234 & MASK_BYTE_BITS_345) >> SHIFT_BITS_3)
            + u64::from(byte_234 & MASK_BYTE_BITS_012)
            + 2;

        if !self.valid_subfield("DRAM width", byte_6 & MASK_BYTE_BITS_567, SHIFT_BITS_5, 0, 3) {
            return Ok(None);
        }
        let dram_width = 4 * (1u64 << ((byte_6 & MASK_BYTE_BITS_567) >> SHIFT_BITS_5));

        Ok(Some(
            channels * bus_width * die_per_package * density_per_die * ranks
                / (8 * dram_width),
        ))
    }

    /// Module size in KB; 0 when the geometry does not add up.
    fn ddimm_size_kb(&self) -> Result<u64, VpdError> {
        if self.spd_byte(SPD_BYTE_2)? != SPD_DRAM_TYPE_DDR5 {
            warn!(source = %self.source, "DDIMM is not DDR5, size not derivable here");
            return Ok(0);
        }
        Ok(CONVERT_GB_TO_KB * self.ddr5_size_gb()?.unwrap_or(0))
    }

    fn parse_fields(&self) -> Result<DdimmVpdMap, VpdError> {
        let size_kb = self.ddimm_size_kb()?;
        if size_kb == 0 {
            return Err(VpdError::Data(format!(
                "calculated DDIMM size is 0 for {}",
                self.source
            )));
        }

        let mut reader = ByteReader::new(self.vpd);
        reader.seek(IDENTITY_START)?;
        let part_number = Bytes::copy_from_slice(reader.take(PART_NUM_LEN)?);
        let serial_number = Bytes::copy_from_slice(reader.take(SERIAL_NUM_LEN)?);
        let ccin = Bytes::copy_from_slice(reader.take(CCIN_LEN)?);

        Ok(DdimmVpdMap {
            size_kb,
            fru_number: part_number.clone(),
            part_number,
            serial_number,
            ccin,
        })
    }
}

fn ddr5_density_per_die(value: u8) -> u64 {
    match value {
        0..=4 => u64::from(value) * 4,
        5 => SDRAM_DENSITY_PER_DIE_24GB,
        6 => SDRAM_DENSITY_PER_DIE_32GB,
        7 => SDRAM_DENSITY_PER_DIE_48GB,
        8 => SDRAM_DENSITY_PER_DIE_64GB,
        _ => SDRAM_DENSITY_PER_DIE_UNDEFINED,
    }
}

fn ddr5_die_per_package(value: u8) -> u64 {
    if value < 2 {
        u64::from(value) + 1
    } else {
        1 << (value - 1)
    }
}

impl ParseVpd for DdimmVpdParser<'_> {
    fn parse(&mut self) -> Result<VpdMap> {
        let fields = self.parse_fields()?;
        debug!(
            source = %self.source,
            size_kb = fields.size_kb,
            "DDIMM parse complete"
        );
        Ok(VpdMap::Ddimm(fields))
    }
}
