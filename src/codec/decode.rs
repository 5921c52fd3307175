// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! PackStream parsing and inbound chunk reassembly.
//!
//! [`read_message`] collects chunks off the stream until the zero-length
//! terminator and hands back one contiguous payload; the pure decoding
//! functions then turn that payload into a [`Value`]. Well-known structure
//! signatures become their typed variants, anything else is preserved as a
//! generic [`Structure`].

use std::collections::HashMap;

use bytes::{Buf, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::codec::{
    error::DecodeError,
    markers,
    value::{
        Date, DateTime, DateTimeZoneId, Duration, LocalDateTime, LocalTime, Node,
        Path, Point2D, Point3D, Relationship, Structure, Time, UnboundRelationship,
        Value,
    },
};

/// Reads one logical message: a run of `u16`-length-prefixed chunks ending
/// with a zero-length chunk, concatenated into a single payload.
pub async fn read_message<R>(r: &mut R) -> std::io::Result<BytesMut>
where R: AsyncRead + Unpin {
    let mut out = BytesMut::new();
    loop {
        let mut len_buf = [0u8; 2];
        r.read_exact(&mut len_buf).await?;
        let len = usize::from(u16::from_be_bytes(len_buf));
        if len == 0 {
            return Ok(out);
        }

        let start = out.len();
        out.resize(start + len, 0);
        r.read_exact(&mut out[start..]).await?;
    }
}

/// Decodes a whole unframed payload into exactly one value.
pub fn decode_from_bytes(payload: &[u8]) -> Result<Value, DecodeError> {
    let mut buf = Bytes::copy_from_slice(payload);
    let value = decode_value(&mut buf)?;
    if buf.has_remaining() {
        return Err(DecodeError::TrailingBytes(buf.remaining()));
    }
    Ok(value)
}

/// Decodes the next value off the front of `buf`.
pub fn decode_value(buf: &mut Bytes) -> Result<Value, DecodeError> {
    let marker = take_u8(buf)?;
    match marker {
        // Positive and negative tiny ints occupy the marker byte itself.
        0x00..=0x7F | 0xF0..=0xFF => Ok(Value::Int(i64::from(marker as i8))),

        markers::NULL => Ok(Value::Null),
        markers::TRUE => Ok(Value::Bool(true)),
        markers::FALSE => Ok(Value::Bool(false)),
        markers::FLOAT64 => Ok(Value::Float(f64::from_bits(take_u64(buf)?))),

        markers::INT8 => Ok(Value::Int(i64::from(take_u8(buf)? as i8))),
        markers::INT16 => Ok(Value::Int(i64::from(take_u16(buf)? as i16))),
        markers::INT32 => Ok(Value::Int(i64::from(take_u32(buf)? as i32))),
        markers::INT64 => Ok(Value::Int(take_u64(buf)? as i64)),

        0x80..=0x8F => decode_string(buf, usize::from(marker & 0x0F)).map(Value::String),
        markers::STRING8 => {
            let len = usize::from(take_u8(buf)?);
            decode_string(buf, len).map(Value::String)
        },
        markers::STRING16 => {
            let len = usize::from(take_u16(buf)?);
            decode_string(buf, len).map(Value::String)
        },
        markers::STRING32 => {
            let len = take_u32(buf)? as usize;
            decode_string(buf, len).map(Value::String)
        },

        0x90..=0x9F => decode_list(buf, usize::from(marker & 0x0F)).map(Value::List),
        markers::LIST8 => {
            let len = usize::from(take_u8(buf)?);
            decode_list(buf, len).map(Value::List)
        },
        markers::LIST16 => {
            let len = usize::from(take_u16(buf)?);
            decode_list(buf, len).map(Value::List)
        },
        markers::LIST32 => {
            let len = take_u32(buf)? as usize;
            decode_list(buf, len).map(Value::List)
        },

        0xA0..=0xAF => decode_map(buf, usize::from(marker & 0x0F)).map(Value::Map),
        markers::MAP8 => {
            let len = usize::from(take_u8(buf)?);
            decode_map(buf, len).map(Value::Map)
        },
        markers::MAP16 => {
            let len = usize::from(take_u16(buf)?);
            decode_map(buf, len).map(Value::Map)
        },
        markers::MAP32 => {
            let len = take_u32(buf)? as usize;
            decode_map(buf, len).map(Value::Map)
        },

        0xB0..=0xBF => decode_struct(buf, usize::from(marker & 0x0F)),
        markers::STRUCT8 => {
            let len = usize::from(take_u8(buf)?);
            decode_struct(buf, len)
        },
        markers::STRUCT16 => {
            let len = usize::from(take_u16(buf)?);
            decode_struct(buf, len)
        },

        other => Err(DecodeError::UnknownMarker(other)),
    }
}

fn decode_string(buf: &mut Bytes, len: usize) -> Result<String, DecodeError> {
    if buf.remaining() < len {
        return Err(DecodeError::Truncated);
    }
    let raw = buf.split_to(len);
    Ok(String::from_utf8(raw.to_vec())?)
}

fn decode_list(buf: &mut Bytes, len: usize) -> Result<Vec<Value>, DecodeError> {
    let mut items = Vec::with_capacity(len.min(64));
    for _ in 0..len {
        items.push(decode_value(buf)?);
    }
    Ok(items)
}

fn decode_map(
    buf: &mut Bytes,
    len: usize,
) -> Result<HashMap<String, Value>, DecodeError> {
    let mut entries = HashMap::with_capacity(len.min(64));
    for _ in 0..len {
        let key = match decode_value(buf)? {
            Value::String(s) => s,
            _ => return Err(DecodeError::BadMapKey),
        };
        let value = decode_value(buf)?;
        entries.insert(key, value);
    }
    Ok(entries)
}

fn decode_struct(buf: &mut Bytes, size: usize) -> Result<Value, DecodeError> {
    let signature = take_u8(buf)?;
    let mut fields = Vec::with_capacity(size.min(16));
    for _ in 0..size {
        fields.push(decode_value(buf)?);
    }

    match signature {
        markers::SIG_NODE => {
            let [id, labels, properties] = take_fields(signature, fields)?;
            Ok(Value::Node(Node {
                id: expect_int(id, "node id")?,
                labels: expect_string_list(labels, "node labels")?,
                properties: expect_map(properties, "node properties")?,
            }))
        },
        markers::SIG_RELATIONSHIP => {
            let [id, start, end, rel_type, properties] =
                take_fields(signature, fields)?;
            Ok(Value::Relationship(Relationship {
                id: expect_int(id, "relationship id")?,
                start_node_id: expect_int(start, "relationship start")?,
                end_node_id: expect_int(end, "relationship end")?,
                rel_type: expect_string(rel_type, "relationship type")?,
                properties: expect_map(properties, "relationship properties")?,
            }))
        },
        markers::SIG_UNBOUND_RELATIONSHIP => {
            let [id, rel_type, properties] = take_fields(signature, fields)?;
            Ok(Value::UnboundRelationship(UnboundRelationship {
                id: expect_int(id, "relationship id")?,
                rel_type: expect_string(rel_type, "relationship type")?,
                properties: expect_map(properties, "relationship properties")?,
            }))
        },
        markers::SIG_PATH => {
            let [nodes, rels, sequence] = take_fields(signature, fields)?;
            Ok(Value::Path(Path {
                nodes: expect_node_list(nodes)?,
                relationships: expect_unbound_list(rels)?,
                sequence: expect_int_list(sequence, "path sequence")?,
            }))
        },
        markers::SIG_POINT_2D => {
            let [srid, x, y] = take_fields(signature, fields)?;
            Ok(Value::Point2D(Point2D {
                srid: expect_int(srid, "point srid")?,
                x: expect_float(x, "point x")?,
                y: expect_float(y, "point y")?,
            }))
        },
        markers::SIG_POINT_3D => {
            let [srid, x, y, z] = take_fields(signature, fields)?;
            Ok(Value::Point3D(Point3D {
                srid: expect_int(srid, "point srid")?,
                x: expect_float(x, "point x")?,
                y: expect_float(y, "point y")?,
                z: expect_float(z, "point z")?,
            }))
        },
        markers::SIG_DATE => {
            let [days] = take_fields(signature, fields)?;
            Ok(Value::Date(Date {
                epoch_days: expect_int(days, "date days")?,
            }))
        },
        markers::SIG_LOCAL_TIME => {
            let [nanos] = take_fields(signature, fields)?;
            Ok(Value::LocalTime(LocalTime {
                nanos_of_day: expect_int(nanos, "time nanos")?,
            }))
        },
        markers::SIG_TIME => {
            let [nanos, offset] = take_fields(signature, fields)?;
            Ok(Value::Time(Time {
                nanos_of_day: expect_int(nanos, "time nanos")?,
                offset_seconds: expect_offset(offset)?,
            }))
        },
        markers::SIG_LOCAL_DATE_TIME => {
            let [seconds, nanos] = take_fields(signature, fields)?;
            Ok(Value::LocalDateTime(LocalDateTime {
                epoch_seconds: expect_int(seconds, "datetime seconds")?,
                nanos: expect_int(nanos, "datetime nanos")?,
            }))
        },
        markers::SIG_DATE_TIME => {
            let [seconds, nanos, offset] = take_fields(signature, fields)?;
            Ok(Value::DateTime(DateTime {
                epoch_seconds: expect_int(seconds, "datetime seconds")?,
                nanos: expect_int(nanos, "datetime nanos")?,
                offset_seconds: expect_offset(offset)?,
            }))
        },
        markers::SIG_DATE_TIME_ZONE_ID => {
            let [seconds, nanos, zone] = take_fields(signature, fields)?;
            Ok(Value::DateTimeZoneId(DateTimeZoneId {
                epoch_seconds: expect_int(seconds, "datetime seconds")?,
                nanos: expect_int(nanos, "datetime nanos")?,
                zone_id: expect_string(zone, "zone id")?,
            }))
        },
        markers::SIG_DURATION => {
            let [months, days, seconds, nanos] = take_fields(signature, fields)?;
            Ok(Value::Duration(Duration {
                months: expect_int(months, "duration months")?,
                days: expect_int(days, "duration days")?,
                seconds: expect_int(seconds, "duration seconds")?,
                nanos: expect_int(nanos, "duration nanos")?,
            }))
        },
        _ => Ok(Value::Struct(Structure { signature, fields })),
    }
}

fn take_fields<const N: usize>(
    signature: u8,
    fields: Vec<Value>,
) -> Result<[Value; N], DecodeError> {
    let got = fields.len();
    fields
        .try_into()
        .map_err(|_| DecodeError::BadArity {
            signature,
            expected: N,
            got,
        })
}

fn expect_int(value: Value, context: &'static str) -> Result<i64, DecodeError> {
    value.as_int().ok_or(DecodeError::UnexpectedType {
        expected: "int",
        context,
    })
}

fn expect_float(value: Value, context: &'static str) -> Result<f64, DecodeError> {
    value.as_float().ok_or(DecodeError::UnexpectedType {
        expected: "float",
        context,
    })
}

fn expect_string(value: Value, context: &'static str) -> Result<String, DecodeError> {
    match value {
        Value::String(s) => Ok(s),
        _ => Err(DecodeError::UnexpectedType {
            expected: "string",
            context,
        }),
    }
}

fn expect_map(
    value: Value,
    context: &'static str,
) -> Result<HashMap<String, Value>, DecodeError> {
    match value {
        Value::Map(m) => Ok(m),
        _ => Err(DecodeError::UnexpectedType {
            expected: "map",
            context,
        }),
    }
}

fn expect_offset(value: Value) -> Result<i32, DecodeError> {
    let raw = expect_int(value, "zone offset")?;
    i32::try_from(raw).map_err(|_| DecodeError::UnexpectedType {
        expected: "32-bit offset",
        context: "zone offset",
    })
}

fn expect_string_list(
    value: Value,
    context: &'static str,
) -> Result<Vec<String>, DecodeError> {
    let items = match value {
        Value::List(items) => items,
        _ => {
            return Err(DecodeError::UnexpectedType {
                expected: "list",
                context,
            });
        },
    };
    items
        .into_iter()
        .map(|item| expect_string(item, context))
        .collect()
}

fn expect_int_list(
    value: Value,
    context: &'static str,
) -> Result<Vec<i64>, DecodeError> {
    let items = match value {
        Value::List(items) => items,
        _ => {
            return Err(DecodeError::UnexpectedType {
                expected: "list",
                context,
            });
        },
    };
    items.into_iter().map(|item| expect_int(item, context)).collect()
}

fn expect_node_list(value: Value) -> Result<Vec<Node>, DecodeError> {
    let items = match value {
        Value::List(items) => items,
        _ => {
            return Err(DecodeError::UnexpectedType {
                expected: "list",
                context: "path nodes",
            });
        },
    };
    items
        .into_iter()
        .map(|item| match item {
            Value::Node(n) => Ok(n),
            _ => Err(DecodeError::UnexpectedType {
                expected: "node",
                context: "path nodes",
            }),
        })
        .collect()
}

fn expect_unbound_list(value: Value) -> Result<Vec<UnboundRelationship>, DecodeError> {
    let items = match value {
        Value::List(items) => items,
        _ => {
            return Err(DecodeError::UnexpectedType {
                expected: "list",
                context: "path relationships",
            });
        },
    };
    items
        .into_iter()
        .map(|item| match item {
            Value::UnboundRelationship(r) => Ok(r),
            _ => Err(DecodeError::UnexpectedType {
                expected: "unbound relationship",
                context: "path relationships",
            }),
        })
        .collect()
}

fn take_u8(buf: &mut Bytes) -> Result<u8, DecodeError> {
    if buf.remaining() < 1 {
        return Err(DecodeError::Truncated);
    }
    Ok(buf.get_u8())
}

fn take_u16(buf: &mut Bytes) -> Result<u16, DecodeError> {
    if buf.remaining() < 2 {
        return Err(DecodeError::Truncated);
    }
    Ok(buf.get_u16())
}

fn take_u32(buf: &mut Bytes) -> Result<u32, DecodeError> {
    if buf.remaining() < 4 {
        return Err(DecodeError::Truncated);
    }
    Ok(buf.get_u32())
}

fn take_u64(buf: &mut Bytes) -> Result<u64, DecodeError> {
    if buf.remaining() < 8 {
        return Err(DecodeError::Truncated);
    }
    Ok(buf.get_u64())
}
