// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use thiserror::Error;

use crate::models::format::VpdFormat;

/// Every failure the parsing core surfaces to its caller.
///
/// The set is closed on purpose: downstream inventory publishers decide what
/// to do (log, call out a FRU, retry from the redundant EEPROM) purely from
/// the kind, so new kinds are an API break.
#[derive(Debug, Error)]
pub enum VpdError {
    /// A read or slice would run past the end of the buffer.
    #[error("truncated VPD: {0}")]
    Truncated(String),

    /// A required marker (`VHDR`, `VTOC`, `11S`, resource tags) is missing
    /// at its fixed offset.
    #[error("bad magic: {0}")]
    BadMagic(String),

    /// The keyword VPD additive checksum does not match.
    #[error("checksum mismatch: {0}")]
    BadChecksum(String),

    /// The keyword VPD end tags are missing or out of order.
    #[error("bad trailer: {0}")]
    BadTrailer(String),

    /// An ECC-covered region fails verification and cannot be repaired.
    #[error("uncorrectable ECC damage in {0}")]
    EccUncorrectable(String),

    /// A semantic invariant does not hold (zero record coordinates, zero
    /// DDIMM capacity, empty keyword data).
    #[error("invalid VPD data: {0}")]
    Data(String),

    /// None of the known format signatures matched.
    #[error("unable to determine VPD format")]
    UnknownFormat,

    /// The format was recognised but this core carries no decoder for it.
    #[error("unsupported VPD format: {0:?}")]
    Unsupported(VpdFormat),
}
