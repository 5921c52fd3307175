// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use rand::RngExt;

use crate::cfg::enums::AccessMode;

const ID_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const ID_LENGTH: usize = 50;

/// Generates a random connection id of the form `<mode>-<50 alnum chars>`,
/// unique enough for the pools to index borrowed connections by it.
pub fn connection_id(mode: AccessMode) -> String {
    let mut rng = rand::rng();
    let mut id = String::with_capacity(ID_LENGTH + 8);
    id.push_str(&mode.to_string());
    id.push('-');
    for _ in 0..ID_LENGTH {
        let idx = rng.random_range(0..ID_CHARSET.len());
        id.push(ID_CHARSET[idx] as char);
    }
    id
}
