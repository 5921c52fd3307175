// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The PackStream value model.
//!
//! [`Value`] is a closed sum over everything that can cross the wire:
//! primitives, ordered and keyed containers, generic tagged structures, and
//! the graph / spatial / temporal structures with well-known signatures.
//! Keeping the sum closed keeps `match` arms total, so a new wire shape is a
//! compile error everywhere it matters instead of a runtime surprise.

use std::collections::HashMap;

use chrono::{
    DateTime as ChronoDateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime,
    Offset, TimeZone, Timelike,
};

const NANOS_PER_SEC: i64 = 1_000_000_000;
const SECONDS_PER_DAY: i64 = 86_400;

/// Any value that can be encoded to or decoded from PackStream.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(HashMap<String, Value>),
    /// A tagged structure whose signature is not one of the well-known ones.
    Struct(Structure),
    Node(Node),
    Relationship(Relationship),
    UnboundRelationship(UnboundRelationship),
    Path(Path),
    Point2D(Point2D),
    Point3D(Point3D),
    Date(Date),
    LocalTime(LocalTime),
    Time(Time),
    LocalDateTime(LocalDateTime),
    DateTime(DateTime),
    DateTimeZoneId(DateTimeZoneId),
    Duration(Duration),
}

/// A generic signature + ordered fields pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Structure {
    pub signature: u8,
    pub fields: Vec<Value>,
}

/// A graph node.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: i64,
    pub labels: Vec<String>,
    pub properties: HashMap<String, Value>,
}

/// A relationship bound to its start and end nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct Relationship {
    pub id: i64,
    pub start_node_id: i64,
    pub end_node_id: i64,
    pub rel_type: String,
    pub properties: HashMap<String, Value>,
}

/// A relationship as it appears inside a path, detached from its endpoints.
#[derive(Debug, Clone, PartialEq)]
pub struct UnboundRelationship {
    pub id: i64,
    pub rel_type: String,
    pub properties: HashMap<String, Value>,
}

/// An alternating node/relationship walk.
///
/// `sequence` holds signed indexes into `relationships` (1-based, negated
/// when traversed against the relationship direction) interleaved with
/// indexes into `nodes`, exactly as the server sends them.
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    pub nodes: Vec<Node>,
    pub relationships: Vec<UnboundRelationship>,
    pub sequence: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Point2D {
    pub srid: i64,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Point3D {
    pub srid: i64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// A calendar date, counted in days since 1970-01-01.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Date {
    pub epoch_days: i64,
}

/// A wall-clock time without a zone, counted in nanoseconds since midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalTime {
    pub nanos_of_day: i64,
}

/// A wall-clock time with a fixed zone offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Time {
    pub nanos_of_day: i64,
    pub offset_seconds: i32,
}

/// A date and time without a zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalDateTime {
    pub epoch_seconds: i64,
    pub nanos: i64,
}

/// A date and time with a fixed zone offset.
///
/// `epoch_seconds` holds the *local* epoch second, i.e. the instant shifted
/// forward by `offset_seconds`. The decoder undoes the shift, so the same
/// instant in the same zone survives a round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateTime {
    pub epoch_seconds: i64,
    pub nanos: i64,
    pub offset_seconds: i32,
}

/// A date and time carrying a named zone instead of an offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateTimeZoneId {
    pub epoch_seconds: i64,
    pub nanos: i64,
    pub zone_id: String,
}

/// An amount of time spanning months, days, seconds and nanoseconds.
///
/// The four components are kept separate because months and days have no
/// fixed length in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Duration {
    pub months: i64,
    pub days: i64,
    pub seconds: i64,
    pub nanos: i64,
}

impl Value {
    /// Short name of the variant, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Struct(_) => "structure",
            Value::Node(_) => "node",
            Value::Relationship(_) => "relationship",
            Value::UnboundRelationship(_) => "unbound relationship",
            Value::Path(_) => "path",
            Value::Point2D(_) => "point2d",
            Value::Point3D(_) => "point3d",
            Value::Date(_) => "date",
            Value::LocalTime(_) => "local time",
            Value::Time(_) => "time",
            Value::LocalDateTime(_) => "local datetime",
            Value::DateTime(_) => "datetime",
            Value::DateTimeZoneId(_) => "zoned datetime",
            Value::Duration(_) => "duration",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&HashMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Value::Node(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_relationship(&self) -> Option<&Relationship> {
        match self {
            Value::Relationship(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Value::Path(p) => Some(p),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i8> for Value {
    fn from(v: i8) -> Self {
        Value::Int(v.into())
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Value::Int(v.into())
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v.into())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(v.into())
    }
}

impl TryFrom<u64> for Value {
    type Error = crate::codec::error::EncodeError;

    /// Bolt integers are signed 64-bit; anything above `i64::MAX` cannot
    /// cross the wire.
    fn try_from(v: u64) -> Result<Self, Self::Error> {
        i64::try_from(v)
            .map(Value::Int)
            .map_err(|_| crate::codec::error::EncodeError::IntOverflow(v.into()))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}

impl From<HashMap<String, Value>> for Value {
    fn from(v: HashMap<String, Value>) -> Self {
        Value::Map(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(inner) => inner.into(),
            None => Value::Null,
        }
    }
}

impl Value {
    /// Loses structure tags but makes summary metadata easy to log or
    /// export. Graph and temporal values render through their `Debug` form.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::json!(*f),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            },
            Value::Map(entries) => serde_json::Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            other => serde_json::Value::String(format!("{other:?}")),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// chrono bridges

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        // NaiveDate::default() is the Unix epoch.
        let epoch_days = d.signed_duration_since(NaiveDate::default()).num_days();
        Value::Date(Date { epoch_days })
    }
}

impl From<NaiveTime> for Value {
    fn from(t: NaiveTime) -> Self {
        let nanos_of_day =
            i64::from(t.num_seconds_from_midnight()) * NANOS_PER_SEC
                + i64::from(t.nanosecond());
        Value::LocalTime(LocalTime { nanos_of_day })
    }
}

impl From<NaiveDateTime> for Value {
    fn from(dt: NaiveDateTime) -> Self {
        let utc = dt.and_utc();
        Value::LocalDateTime(LocalDateTime {
            epoch_seconds: utc.timestamp(),
            nanos: i64::from(utc.timestamp_subsec_nanos()),
        })
    }
}

impl From<ChronoDateTime<FixedOffset>> for Value {
    fn from(dt: ChronoDateTime<FixedOffset>) -> Self {
        let offset_seconds = dt.offset().fix().local_minus_utc();
        // The wire carries local epoch seconds: the instant shifted by +offset.
        Value::DateTime(DateTime {
            epoch_seconds: dt.timestamp() + i64::from(offset_seconds),
            nanos: i64::from(dt.timestamp_subsec_nanos()),
            offset_seconds,
        })
    }
}

impl From<std::time::Duration> for Value {
    fn from(d: std::time::Duration) -> Self {
        let total_seconds = d.as_secs() as i64;
        Value::Duration(Duration {
            months: 0,
            days: total_seconds / SECONDS_PER_DAY,
            seconds: total_seconds % SECONDS_PER_DAY,
            nanos: i64::from(d.subsec_nanos()),
        })
    }
}

impl Date {
    pub fn to_chrono(self) -> Option<NaiveDate> {
        NaiveDate::default().checked_add_signed(chrono::Duration::days(self.epoch_days))
    }
}

impl LocalTime {
    pub fn to_chrono(self) -> Option<NaiveTime> {
        let secs = u32::try_from(self.nanos_of_day / NANOS_PER_SEC).ok()?;
        let nanos = u32::try_from(self.nanos_of_day % NANOS_PER_SEC).ok()?;
        NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos)
    }
}

impl LocalDateTime {
    pub fn to_chrono(self) -> Option<NaiveDateTime> {
        let nanos = u32::try_from(self.nanos).ok()?;
        chrono::DateTime::from_timestamp(self.epoch_seconds, nanos)
            .map(|dt| dt.naive_utc())
    }
}

impl DateTime {
    /// Reconstructs the instant in its original zone, undoing the local-epoch
    /// shift applied on encode.
    pub fn to_chrono(self) -> Option<ChronoDateTime<FixedOffset>> {
        let instant = self.epoch_seconds - i64::from(self.offset_seconds);
        let nanos = u32::try_from(self.nanos).ok()?;
        FixedOffset::east_opt(self.offset_seconds)?
            .timestamp_opt(instant, nanos)
            .single()
    }
}
