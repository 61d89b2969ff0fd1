// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Zero-copy wire view of an IPZ table-of-contents entry.

use core::fmt;

use zerocopy::{FromBytes, Immutable, KnownLayout, Unaligned, little_endian::U16};

use crate::utils::ascii_lossy;

/// Size of one PT keyword entry on media.
pub const PT_ENTRY_LEN: usize = 13;

/// One entry of the `PT` keyword inside the VTOC record.
///
/// 13 bytes on media: 4-byte record name, 1-byte record type, then four
/// little-endian u16 coordinates describing the record body and its ECC
/// companion region.
#[repr(C)]
#[derive(FromBytes, KnownLayout, Immutable, Unaligned)]
pub struct PtEntry {
    pub record_name: [u8; 4],
    pub record_type: u8,
    pub record_offset: U16,
    pub record_length: U16,
    pub ecc_offset: U16,
    pub ecc_length: U16,
}

impl PtEntry {
    #[inline]
    pub fn name(&self) -> String {
        ascii_lossy(&self.record_name)
    }
}

impl fmt::Debug for PtEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PtEntry")
            .field("record_name", &self.name())
            .field("record_type", &self.record_type)
            .field("record_offset", &self.record_offset.get())
            .field("record_length", &self.record_length.get())
            .field("ecc_offset", &self.ecc_offset.get())
            .field("ecc_length", &self.ecc_length.get())
            .finish()
    }
}
