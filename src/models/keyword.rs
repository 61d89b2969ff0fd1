// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Per-keyword value decoding.
//!
//! IPZ keyword data is stored raw; only when a consumer asks for a printable
//! view does the value get decoded according to the keyword's encoding
//! scheme. The table:
//!
//! | keyword                        | scheme | rendered as                    |
//! |--------------------------------|--------|--------------------------------|
//! | DR PN SN CC VN MM VP VS        | ASCII  | bytes verbatim                 |
//! | HW                             | RAW    | lowercase hex                  |
//! | B1                             | MAC    | `aa:bb:cc:dd:ee:ff`            |
//! | MB                             | DATE   | `YYYY-MM-DD-HH:MM:SS`          |
//! | UD                             | UUID   | 8-4-4-4-12 lowercase hex       |

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::{models::error::VpdError, utils::ascii_lossy};

/// Encoding scheme of a VPD keyword's data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KwdEncoding {
    /// Data encoded in ASCII.
    Ascii,
    /// Raw data, rendered as hex.
    Raw,
    /// The B1 keyword carries a MAC address.
    Mac,
    /// The MB keyword carries the FRU build date.
    Date,
    /// The UD keyword carries the system UUID.
    Uuid,
}

/// Keyword name that terminates every keyword stream.
pub const LAST_KW: &[u8; 2] = b"PF";
/// Keywords whose name starts with `#` carry a 16-bit data length.
pub const POUND_KW: u8 = b'#';

const MAC_ADDRESS_LEN_BYTES: usize = 6;
const MB_LEN_BYTES: usize = 8;
const UUID_LEN_BYTES: usize = 16;

// Separator slots, applied in order to the growing hex string.
const MB_SEPARATORS: [(usize, char); 5] =
    [(4, '-'), (7, '-'), (10, '-'), (13, ':'), (16, ':')];
const UUID_SEPARATORS: [(usize, char); 4] = [(8, '-'), (13, '-'), (18, '-'), (23, '-')];

static SUPPORTED_KEYWORDS: Lazy<HashMap<&'static str, KwdEncoding>> = Lazy::new(|| {
    HashMap::from([
        ("DR", KwdEncoding::Ascii),
        ("PN", KwdEncoding::Ascii),
        ("SN", KwdEncoding::Ascii),
        ("CC", KwdEncoding::Ascii),
        ("HW", KwdEncoding::Raw),
        ("B1", KwdEncoding::Mac),
        ("VN", KwdEncoding::Ascii),
        ("MB", KwdEncoding::Date),
        ("MM", KwdEncoding::Ascii),
        ("UD", KwdEncoding::Uuid),
        ("VP", KwdEncoding::Ascii),
        ("VS", KwdEncoding::Ascii),
    ])
});

/// Looks up the encoding scheme for a keyword name.
pub fn encoding_for(kwd: &str) -> Option<KwdEncoding> {
    SUPPORTED_KEYWORDS.get(kwd).copied()
}

/// Decodes one keyword's raw bytes into printable form.
///
/// Returns `Ok(None)` when the keyword has no known encoding; the caller
/// decides whether to drop it (strict) or carry the raw bytes (lenient).
pub fn decode(kwd: &str, data: &[u8]) -> Result<Option<String>, VpdError> {
    let Some(encoding) = encoding_for(kwd) else {
        return Ok(None);
    };

    let decoded = match encoding {
        KwdEncoding::Ascii => ascii_lossy(data),
        KwdEncoding::Raw => hex::encode(data),
        KwdEncoding::Mac => {
            let mac = fixed_width(kwd, data, MAC_ADDRESS_LEN_BYTES)?;
            let mut out = String::with_capacity(MAC_ADDRESS_LEN_BYTES * 3 - 1);
            for (i, byte) in mac.iter().enumerate() {
                if i > 0 {
                    out.push(':');
                }
                out.push_str(&hex::encode([*byte]));
            }
            out
        },
        KwdEncoding::Date => {
            // Build date, byte 0 is a format discriminator and is skipped.
            let raw = fixed_width(kwd, data, MB_LEN_BYTES)?;
            with_separators(hex::encode(&raw[1..]), &MB_SEPARATORS)
        },
        KwdEncoding::Uuid => {
            let raw = fixed_width(kwd, data, UUID_LEN_BYTES)?;
            with_separators(hex::encode(raw), &UUID_SEPARATORS)
        },
    };

    Ok(Some(decoded))
}

fn fixed_width<'a>(kwd: &str, data: &'a [u8], want: usize) -> Result<&'a [u8], VpdError> {
    data.get(..want).ok_or_else(|| {
        VpdError::Data(format!(
            "keyword {kwd} holds {} byte(s), needs {want}",
            data.len()
        ))
    })
}

fn with_separators(mut hex: String, slots: &[(usize, char)]) -> String {
    for &(at, sep) in slots {
        hex.insert(at, sep);
    }
    hex
}
