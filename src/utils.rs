// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// Renders raw VPD bytes as text.
///
/// Record and keyword names, part numbers and the like are plain ASCII on
/// media; anything that is not valid UTF-8 comes back with replacement
/// characters rather than failing the whole parse.
pub fn ascii_lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
