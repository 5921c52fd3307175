// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! PackStream serialization and chunked framing.
//!
//! Encoding is a two-step affair: a [`Encoder`] lays a value out into an
//! in-memory buffer, then [`frame_message`] slices that buffer into
//! length-prefixed chunks bounded by the negotiated maximum and appends the
//! zero-length terminator. Keeping the steps separate lets tests assert on
//! raw payload bytes without peeling framing off first.

use bytes::{BufMut, Bytes, BytesMut};

use crate::codec::{
    error::EncodeError,
    markers,
    value::{Node, UnboundRelationship, Value},
};

/// Largest chunk payload expressible in the 16-bit length prefix.
pub const MAX_CHUNK_SIZE: u16 = u16::MAX;

/// Serializes values into an unframed PackStream payload.
#[derive(Debug, Default)]
pub struct Encoder {
    buf: BytesMut,
}

impl Encoder {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(256),
        }
    }

    /// Finish encoding and hand back the raw payload.
    pub fn into_payload(self) -> Bytes {
        self.buf.freeze()
    }

    pub fn encode_value(&mut self, value: &Value) -> Result<(), EncodeError> {
        match value {
            Value::Null => self.buf.put_u8(markers::NULL),
            Value::Bool(true) => self.buf.put_u8(markers::TRUE),
            Value::Bool(false) => self.buf.put_u8(markers::FALSE),
            Value::Int(i) => self.encode_int(*i),
            Value::Float(f) => {
                self.buf.put_u8(markers::FLOAT64);
                self.buf.put_f64(*f);
            },
            Value::String(s) => self.encode_string(s)?,
            Value::List(items) => {
                self.encode_list_header(items.len())?;
                for item in items {
                    self.encode_value(item)?;
                }
            },
            Value::Map(entries) => {
                self.encode_map_header(entries.len())?;
                for (key, item) in entries {
                    self.encode_string(key)?;
                    self.encode_value(item)?;
                }
            },
            Value::Struct(s) => {
                self.encode_struct_header(s.fields.len(), s.signature)?;
                for field in &s.fields {
                    self.encode_value(field)?;
                }
            },
            Value::Node(n) => self.encode_node(n)?,
            Value::Relationship(r) => {
                self.encode_struct_header(5, markers::SIG_RELATIONSHIP)?;
                self.encode_int(r.id);
                self.encode_int(r.start_node_id);
                self.encode_int(r.end_node_id);
                self.encode_string(&r.rel_type)?;
                self.encode_map_header(r.properties.len())?;
                for (key, item) in &r.properties {
                    self.encode_string(key)?;
                    self.encode_value(item)?;
                }
            },
            Value::UnboundRelationship(r) => self.encode_unbound(r)?,
            Value::Path(p) => {
                self.encode_struct_header(3, markers::SIG_PATH)?;
                self.encode_list_header(p.nodes.len())?;
                for node in &p.nodes {
                    self.encode_node(node)?;
                }
                self.encode_list_header(p.relationships.len())?;
                for rel in &p.relationships {
                    self.encode_unbound(rel)?;
                }
                self.encode_list_header(p.sequence.len())?;
                for idx in &p.sequence {
                    self.encode_int(*idx);
                }
            },
            Value::Point2D(p) => {
                self.encode_struct_header(3, markers::SIG_POINT_2D)?;
                self.encode_int(p.srid);
                self.buf.put_u8(markers::FLOAT64);
                self.buf.put_f64(p.x);
                self.buf.put_u8(markers::FLOAT64);
                self.buf.put_f64(p.y);
            },
            Value::Point3D(p) => {
                self.encode_struct_header(4, markers::SIG_POINT_3D)?;
                self.encode_int(p.srid);
                self.buf.put_u8(markers::FLOAT64);
                self.buf.put_f64(p.x);
                self.buf.put_u8(markers::FLOAT64);
                self.buf.put_f64(p.y);
                self.buf.put_u8(markers::FLOAT64);
                self.buf.put_f64(p.z);
            },
            Value::Date(d) => {
                self.encode_struct_header(1, markers::SIG_DATE)?;
                self.encode_int(d.epoch_days);
            },
            Value::LocalTime(t) => {
                self.encode_struct_header(1, markers::SIG_LOCAL_TIME)?;
                self.encode_int(t.nanos_of_day);
            },
            Value::Time(t) => {
                self.encode_struct_header(2, markers::SIG_TIME)?;
                self.encode_int(t.nanos_of_day);
                self.encode_int(t.offset_seconds.into());
            },
            Value::LocalDateTime(dt) => {
                self.encode_struct_header(2, markers::SIG_LOCAL_DATE_TIME)?;
                self.encode_int(dt.epoch_seconds);
                self.encode_int(dt.nanos);
            },
            Value::DateTime(dt) => {
                self.encode_struct_header(3, markers::SIG_DATE_TIME)?;
                self.encode_int(dt.epoch_seconds);
                self.encode_int(dt.nanos);
                self.encode_int(dt.offset_seconds.into());
            },
            Value::DateTimeZoneId(dt) => {
                self.encode_struct_header(3, markers::SIG_DATE_TIME_ZONE_ID)?;
                self.encode_int(dt.epoch_seconds);
                self.encode_int(dt.nanos);
                self.encode_string(&dt.zone_id)?;
            },
            Value::Duration(d) => {
                self.encode_struct_header(4, markers::SIG_DURATION)?;
                self.encode_int(d.months);
                self.encode_int(d.days);
                self.encode_int(d.seconds);
                self.encode_int(d.nanos);
            },
        }
        Ok(())
    }

    fn encode_node(&mut self, n: &Node) -> Result<(), EncodeError> {
        self.encode_struct_header(3, markers::SIG_NODE)?;
        self.encode_int(n.id);
        self.encode_list_header(n.labels.len())?;
        for label in &n.labels {
            self.encode_string(label)?;
        }
        self.encode_map_header(n.properties.len())?;
        for (key, item) in &n.properties {
            self.encode_string(key)?;
            self.encode_value(item)?;
        }
        Ok(())
    }

    fn encode_unbound(&mut self, r: &UnboundRelationship) -> Result<(), EncodeError> {
        self.encode_struct_header(3, markers::SIG_UNBOUND_RELATIONSHIP)?;
        self.encode_int(r.id);
        self.encode_string(&r.rel_type)?;
        self.encode_map_header(r.properties.len())?;
        for (key, item) in &r.properties {
            self.encode_string(key)?;
            self.encode_value(item)?;
        }
        Ok(())
    }

    /// Writes an integer using the smallest marker that can hold it.
    pub fn encode_int(&mut self, value: i64) {
        match value {
            markers::TINY_INT_MIN..=markers::TINY_INT_MAX => {
                self.buf.put_i8(value as i8);
            },
            v if i8::try_from(v).is_ok() => {
                self.buf.put_u8(markers::INT8);
                self.buf.put_i8(v as i8);
            },
            v if i16::try_from(v).is_ok() => {
                self.buf.put_u8(markers::INT16);
                self.buf.put_i16(v as i16);
            },
            v if i32::try_from(v).is_ok() => {
                self.buf.put_u8(markers::INT32);
                self.buf.put_i32(v as i32);
            },
            v => {
                self.buf.put_u8(markers::INT64);
                self.buf.put_i64(v);
            },
        }
    }

    pub fn encode_string(&mut self, value: &str) -> Result<(), EncodeError> {
        let bytes = value.as_bytes();
        self.encode_sized_header(
            bytes.len(),
            "string",
            markers::TINY_STRING,
            markers::STRING8,
            markers::STRING16,
            markers::STRING32,
        )?;
        self.buf.put_slice(bytes);
        Ok(())
    }

    pub fn encode_list_header(&mut self, len: usize) -> Result<(), EncodeError> {
        self.encode_sized_header(
            len,
            "list",
            markers::TINY_LIST,
            markers::LIST8,
            markers::LIST16,
            markers::LIST32,
        )
    }

    pub fn encode_map_header(&mut self, len: usize) -> Result<(), EncodeError> {
        self.encode_sized_header(
            len,
            "map",
            markers::TINY_MAP,
            markers::MAP8,
            markers::MAP16,
            markers::MAP32,
        )
    }

    pub fn encode_struct_header(
        &mut self,
        len: usize,
        signature: u8,
    ) -> Result<(), EncodeError> {
        match len {
            0..=15 => self.buf.put_u8(markers::TINY_STRUCT | len as u8),
            16..=0xFF => {
                self.buf.put_u8(markers::STRUCT8);
                self.buf.put_u8(len as u8);
            },
            0x100..=0xFFFF => {
                self.buf.put_u8(markers::STRUCT16);
                self.buf.put_u16(len as u16);
            },
            _ => {
                return Err(EncodeError::TooLong {
                    kind: "structure",
                    len,
                });
            },
        }
        self.buf.put_u8(signature);
        Ok(())
    }

    fn encode_sized_header(
        &mut self,
        len: usize,
        kind: &'static str,
        tiny: u8,
        m8: u8,
        m16: u8,
        m32: u8,
    ) -> Result<(), EncodeError> {
        match len {
            0..=15 => self.buf.put_u8(tiny | len as u8),
            16..=0xFF => {
                self.buf.put_u8(m8);
                self.buf.put_u8(len as u8);
            },
            0x100..=0xFFFF => {
                self.buf.put_u8(m16);
                self.buf.put_u16(len as u16);
            },
            0x1_0000..=0xFFFF_FFFF => {
                self.buf.put_u8(m32);
                self.buf.put_u32(len as u32);
            },
            _ => return Err(EncodeError::TooLong { kind, len }),
        }
        Ok(())
    }
}

/// Encodes one value into an unframed payload.
pub fn encode_to_bytes(value: &Value) -> Result<Bytes, EncodeError> {
    let mut enc = Encoder::new();
    enc.encode_value(value)?;
    Ok(enc.into_payload())
}

/// Slices a payload into `u16`-length-prefixed chunks capped at
/// `max_chunk_size` and terminated by a zero-length chunk.
pub fn frame_message(payload: &[u8], max_chunk_size: u16) -> Result<Bytes, EncodeError> {
    if max_chunk_size == 0 {
        return Err(EncodeError::ZeroChunkSize);
    }

    let chunk = usize::from(max_chunk_size);
    let chunks = payload.len().div_ceil(chunk.max(1));
    let mut out = BytesMut::with_capacity(payload.len() + 2 * chunks + 2);

    for piece in payload.chunks(chunk) {
        out.put_u16(piece.len() as u16);
        out.put_slice(piece);
    }
    out.put_u16(0);

    Ok(out.freeze())
}
