// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! PackStream marker bytes and structure signatures.
//!
//! Every serialized value starts with a single marker byte. Small values
//! (tiny ints, short strings, short containers) fold their size into the
//! marker itself; everything else is followed by a fixed-width big-endian
//! size field and then the payload.

/// Marker for the null value.
pub const NULL: u8 = 0xC0;
/// Marker for an IEEE-754 double, followed by 8 payload bytes.
pub const FLOAT64: u8 = 0xC1;
/// Marker for boolean `false`.
pub const FALSE: u8 = 0xC2;
/// Marker for boolean `true`.
pub const TRUE: u8 = 0xC3;

/// Marker for an int8 follower.
pub const INT8: u8 = 0xC8;
/// Marker for an int16 follower.
pub const INT16: u8 = 0xC9;
/// Marker for an int32 follower.
pub const INT32: u8 = 0xCA;
/// Marker for an int64 follower.
pub const INT64: u8 = 0xCB;

/// High nibble of a tiny string; low nibble carries the byte length (0..=15).
pub const TINY_STRING: u8 = 0x80;
/// String with a u8 length follower.
pub const STRING8: u8 = 0xD0;
/// String with a u16 length follower.
pub const STRING16: u8 = 0xD1;
/// String with a u32 length follower.
pub const STRING32: u8 = 0xD2;

/// High nibble of a tiny list; low nibble carries the element count.
pub const TINY_LIST: u8 = 0x90;
/// List with a u8 count follower.
pub const LIST8: u8 = 0xD4;
/// List with a u16 count follower.
pub const LIST16: u8 = 0xD5;
/// List with a u32 count follower.
pub const LIST32: u8 = 0xD6;

/// High nibble of a tiny map; low nibble carries the entry count.
pub const TINY_MAP: u8 = 0xA0;
/// Map with a u8 count follower.
pub const MAP8: u8 = 0xD8;
/// Map with a u16 count follower.
pub const MAP16: u8 = 0xD9;
/// Map with a u32 count follower.
pub const MAP32: u8 = 0xDA;

/// High nibble of a tiny structure; low nibble carries the field count.
pub const TINY_STRUCT: u8 = 0xB0;
/// Structure with a u8 field-count follower.
pub const STRUCT8: u8 = 0xDC;
/// Structure with a u16 field-count follower.
pub const STRUCT16: u8 = 0xDD;

/// Smallest value encodable as a tiny int (the marker byte is the value).
pub const TINY_INT_MIN: i64 = -16;
/// Largest value encodable as a tiny int.
pub const TINY_INT_MAX: i64 = 127;

// Graph structure signatures.

/// Node: `(id, labels, properties)`.
pub const SIG_NODE: u8 = b'N';
/// Relationship: `(id, start, end, type, properties)`.
pub const SIG_RELATIONSHIP: u8 = b'R';
/// Relationship detached from its endpoints: `(id, type, properties)`.
pub const SIG_UNBOUND_RELATIONSHIP: u8 = b'r';
/// Path: `(nodes, relationships, sequence)`.
pub const SIG_PATH: u8 = b'P';

// Spatial structure signatures.

/// Point in two dimensions: `(srid, x, y)`.
pub const SIG_POINT_2D: u8 = b'X';
/// Point in three dimensions: `(srid, x, y, z)`.
pub const SIG_POINT_3D: u8 = b'Y';

// Temporal structure signatures.

/// Date: `(days_since_epoch)`.
pub const SIG_DATE: u8 = b'D';
/// Time of day without a zone: `(nanos_of_day)`.
pub const SIG_LOCAL_TIME: u8 = b't';
/// Time of day with a zone offset: `(nanos_of_day, offset_seconds)`.
pub const SIG_TIME: u8 = b'T';
/// Date and time without a zone: `(epoch_seconds, nanos)`.
pub const SIG_LOCAL_DATE_TIME: u8 = b'd';
/// Date and time with a zone offset: `(epoch_seconds, nanos, offset_seconds)`.
pub const SIG_DATE_TIME: u8 = b'F';
/// Date and time with a named zone: `(epoch_seconds, nanos, zone_id)`.
pub const SIG_DATE_TIME_ZONE_ID: u8 = b'f';
/// Duration: `(months, days, seconds, nanos)`.
pub const SIG_DURATION: u8 = b'E';
