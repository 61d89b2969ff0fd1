// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! VPD format discrimination from a raw EEPROM image.
//!
//! The signatures, probed in order:
//!
//! ```text
//! byte 11 == 0x84                              → IPZ
//! byte 0  == 0x82                              → keyword VPD
//! byte 2  == 0x12, DDIMM nibble, "11S" marker  → DDR5 DDIMM SPD
//! byte 2  == 0x0C, DDIMM nibble, "11S" marker  → DDR4 DDIMM SPD
//! byte 2  == 0x12                              → DDR5 industry-standard DIMM
//! byte 2  == 0x0C                              → DDR4 industry-standard DIMM
//! ```
//!
//! The DDIMM nibble is the low half of SPD byte 3 (module type) equal to
//! 0x0A; the `"11S"` barcode marker sits at SPD offset 416. The DDIMM probes
//! must run before the plain ISDIMM ones, otherwise the DRAM-type byte alone
//! would swallow every DDIMM.

use crate::models::error::VpdError;

/// Large resource tag that opens keyword VPD.
pub const KW_VPD_START_TAG: u8 = 0x82;
/// Vendor-defined large resource tag (also the IPZ data tag at offset 11).
pub const KW_VAL_PAIR_START_TAG: u8 = 0x84;
/// Alternate vendor-defined large resource tag.
pub const ALT_KW_VPD_PAIR_START_TAG: u8 = 0x90;
/// Small resource end tag.
pub const KW_VAL_PAIR_END_TAG: u8 = 0x79;
/// End-of-VPD tag.
pub const KW_VPD_END_TAG: u8 = 0x78;

/// Offset of the IPZ large resource tag inside the VHDR record.
pub const IPZ_DATA_START: usize = 11;

pub const SPD_BYTE_2: usize = 2;
pub const SPD_BYTE_3: usize = 3;
pub const SPD_BYTE_BIT_0_3_MASK: u8 = 0x0F;
pub const SPD_MODULE_TYPE_DDIMM: u8 = 0x0A;
pub const SPD_DRAM_TYPE_DDR5: u8 = 0x12;
pub const SPD_DRAM_TYPE_DDR4: u8 = 0x0C;

/// Offset of the 11S barcode block in a DDIMM SPD image.
pub const MEMORY_VPD_DATA_START: usize = 416;
pub const MEMORY_VPD_START_TAG: &[u8; 3] = b"11S";
pub const FORMAT_11S_LEN: usize = 3;

/// The VPD layouts this core can tell apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VpdFormat {
    Ipz,
    KeywordVpd,
    Ddr5Ddimm,
    Ddr4Ddimm,
    Ddr5Isdimm,
    Ddr4Isdimm,
}

impl VpdFormat {
    /// Classifies a raw buffer, or fails with [`VpdError::UnknownFormat`].
    pub fn detect(vpd: &[u8]) -> Result<Self, VpdError> {
        if vpd.get(IPZ_DATA_START) == Some(&KW_VAL_PAIR_START_TAG) {
            return Ok(Self::Ipz);
        }

        if vpd.first() == Some(&KW_VPD_START_TAG) {
            return Ok(Self::KeywordVpd);
        }

        let ddimm = has_11s_block(vpd);
        match vpd.get(SPD_BYTE_2) {
            Some(&SPD_DRAM_TYPE_DDR5) if ddimm => Ok(Self::Ddr5Ddimm),
            Some(&SPD_DRAM_TYPE_DDR4) if ddimm => Ok(Self::Ddr4Ddimm),
            Some(&SPD_DRAM_TYPE_DDR5) => Ok(Self::Ddr5Isdimm),
            Some(&SPD_DRAM_TYPE_DDR4) => Ok(Self::Ddr4Isdimm),
            _ => Err(VpdError::UnknownFormat),
        }
    }

    /// Whether this core carries a decoder for the format.
    pub fn is_supported(&self) -> bool {
        matches!(self, Self::Ipz | Self::KeywordVpd | Self::Ddr5Ddimm)
    }
}

fn has_11s_block(vpd: &[u8]) -> bool {
    let module_nibble = vpd.get(SPD_BYTE_3).map(|b| b & SPD_BYTE_BIT_0_3_MASK);
    module_nibble == Some(SPD_MODULE_TYPE_DDIMM)
        && vpd.get(MEMORY_VPD_DATA_START..MEMORY_VPD_DATA_START + FORMAT_11S_LEN)
            == Some(MEMORY_VPD_START_TAG.as_slice())
}
