// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Handshake bytes and protocol version selection.
//!
//! A connection opens with a fixed 4-byte preamble followed by four
//! candidate versions as big-endian `u32`s in preference order, zero-padded.
//! The server answers with a single `u32` naming its pick; all zeroes means
//! no shared version and is fatal.

use serde::{Deserialize, Serialize};

/// The fixed bytes every Bolt handshake starts with.
pub const MAGIC_PREAMBLE: [u8; 4] = [0x60, 0x60, 0xB0, 0x17];

/// The server's "no supported version" answer.
pub const NO_VERSION: [u8; 4] = [0x00, 0x00, 0x00, 0x00];

/// Number of candidate version slots in the handshake.
pub const VERSION_SLOTS: usize = 4;

/// A negotiated protocol version.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(try_from = "u32", into = "u32")]
pub enum BoltVersion {
    V1,
    V2,
    V3,
    V4,
}

impl BoltVersion {
    pub fn from_u32(raw: u32) -> Option<Self> {
        match raw {
            1 => Some(BoltVersion::V1),
            2 => Some(BoltVersion::V2),
            3 => Some(BoltVersion::V3),
            4 => Some(BoltVersion::V4),
            _ => None,
        }
    }

    pub fn as_u32(self) -> u32 {
        match self {
            BoltVersion::V1 => 1,
            BoltVersion::V2 => 2,
            BoltVersion::V3 => 3,
            BoltVersion::V4 => 4,
        }
    }

    pub fn latest() -> Self {
        BoltVersion::V4
    }
}

impl TryFrom<u32> for BoltVersion {
    type Error = String;

    fn try_from(raw: u32) -> Result<Self, Self::Error> {
        Self::from_u32(raw).ok_or_else(|| format!("unsupported bolt version {raw}"))
    }
}

impl From<BoltVersion> for u32 {
    fn from(v: BoltVersion) -> u32 {
        v.as_u32()
    }
}

impl std::fmt::Display for BoltVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_u32())
    }
}

/// How the client fills its four handshake slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VersionPolicy {
    /// Offer exactly one version; anything else is a handshake failure.
    Strict(BoltVersion),
    /// Offer every version in the inclusive range, newest first.
    Range { min: BoltVersion, max: BoltVersion },
    /// Offer everything this client speaks, newest first.
    #[default]
    Negotiate,
}

impl VersionPolicy {
    /// The four candidate slots, newest preference first, zero-padded.
    pub fn candidates(&self) -> [u32; VERSION_SLOTS] {
        let mut slots = [0u32; VERSION_SLOTS];
        match self {
            VersionPolicy::Strict(v) => {
                slots[0] = v.as_u32();
            },
            VersionPolicy::Range { min, max } => {
                let (lo, hi) = if min <= max { (*min, *max) } else { (*max, *min) };
                let mut next = 0;
                for raw in (lo.as_u32()..=hi.as_u32()).rev() {
                    if next == VERSION_SLOTS {
                        break;
                    }
                    slots[next] = raw;
                    next += 1;
                }
            },
            VersionPolicy::Negotiate => {
                slots = [4, 3, 2, 1];
            },
        }
        slots
    }

    /// True when the policy would have offered `version`.
    pub fn accepts(&self, version: BoltVersion) -> bool {
        self.candidates().contains(&version.as_u32())
    }
}

/// The exact 20 bytes written to open a connection.
pub fn handshake_bytes(policy: &VersionPolicy) -> [u8; 20] {
    let mut out = [0u8; 20];
    out[..4].copy_from_slice(&MAGIC_PREAMBLE);
    for (slot, raw) in policy.candidates().iter().enumerate() {
        let start = 4 + slot * 4;
        out[start..start + 4].copy_from_slice(&raw.to_be_bytes());
    }
    out
}

/// Interprets the server's 4-byte handshake answer. `None` covers both the
/// all-zero rejection and a version this client does not speak.
pub fn selected_version(reply: &[u8; 4]) -> Option<BoltVersion> {
    if *reply == NO_VERSION {
        return None;
    }
    BoltVersion::from_u32(u32::from_be_bytes(*reply))
}
