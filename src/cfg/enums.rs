// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use core::fmt;

use serde::{Deserialize, Serialize};

/// Whether a borrowed connection will be used for reads or writes.
///
/// v3+ connections encode read intent as `mode: "r"` in statement metadata;
/// the routing pool uses the same value to pick a cluster member.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AccessMode {
    #[serde(rename = "read", alias = "Read", alias = "READ", alias = "r")]
    Read,
    #[default]
    #[serde(rename = "write", alias = "Write", alias = "WRITE", alias = "w")]
    Write,
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AccessMode::Read => "read",
            AccessMode::Write => "write",
        })
    }
}

/// Connection string scheme.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    #[serde(rename = "bolt")]
    Bolt,
    #[serde(rename = "bolt+routing")]
    BoltRouting,
}

impl Scheme {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "bolt" => Some(Scheme::Bolt),
            "bolt+routing" => Some(Scheme::BoltRouting),
            _ => None,
        }
    }

    pub fn is_routing(self) -> bool {
        matches!(self, Scheme::BoltRouting)
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Scheme::Bolt => "bolt",
            Scheme::BoltRouting => "bolt+routing",
        })
    }
}

/// Truthiness rule for URL query flags: `1` or anything starting with
/// `t`/`T` is true, everything else is false.
pub fn flag_is_set(raw: &str) -> bool {
    raw == "1" || raw.to_ascii_lowercase().starts_with('t')
}
