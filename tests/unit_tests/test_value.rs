// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;
use bolt_client_rs::codec::{
    decode::decode_from_bytes,
    encode::encode_to_bytes,
    value::{
        Date, DateTime, Duration, LocalDateTime, Node, Path, Point2D, Point3D,
        Time, UnboundRelationship, Value,
    },
};
use chrono::TimeZone;
use hex_literal::hex;

use crate::unit_tests::value_map;

/// A representative nested value survives a round trip unchanged.
#[test]
fn test_composite_value_round_trip() -> Result<()> {
    let value = Value::Map(value_map(&[
        ("name", Value::from("bolt")),
        ("ok", Value::Bool(true)),
        ("score", Value::Float(0.25)),
        (
            "tags",
            Value::List(vec![Value::from("db"), Value::from("graph"), Value::Null]),
        ),
        (
            "point",
            Value::Point2D(Point2D {
                srid: 4326,
                x: 1.5,
                y: -2.5,
            }),
        ),
    ]));

    let bytes = encode_to_bytes(&value)?;
    assert_eq!(decode_from_bytes(&bytes)?, value);
    Ok(())
}

/// The wall-clock instant fixture: 1_000_000_000 seconds, no nanos, UTC.
/// Encodes as a tiny struct of three integer fields behind signature 'F'.
#[test]
fn test_datetime_fixture_bytes_and_round_trip() -> Result<()> {
    let value = Value::DateTime(DateTime {
        epoch_seconds: 1_000_000_000,
        nanos: 0,
        offset_seconds: 0,
    });

    let bytes = encode_to_bytes(&value)?;
    assert_eq!(
        bytes.as_ref(),
        hex!(
            "B3 46"             // tiny struct, 3 fields, signature 'F'
            "CA 3B 9A CA 00"    // 1_000_000_000 as INT32
            "00"                // nanos
            "00"                // offset seconds
        )
    );
    assert_eq!(decode_from_bytes(&bytes)?, value);
    Ok(())
}

/// Encoding a zoned instant shifts epoch seconds by the offset; decoding
/// shifts back, so the same instant in the same zone comes out.
#[test]
fn test_zoned_datetime_round_trips_to_same_instant() -> Result<()> {
    let instant = chrono::FixedOffset::east_opt(3600)
        .expect("valid offset")
        .timestamp_opt(1_000_000_000, 42)
        .single()
        .expect("unambiguous");

    let encoded = encode_to_bytes(&Value::from(instant))?;
    let Value::DateTime(wire) = decode_from_bytes(&encoded)? else {
        panic!("expected a datetime");
    };
    assert_eq!(wire.epoch_seconds, 1_000_000_000 + 3600);
    assert_eq!(wire.to_chrono(), Some(instant));
    Ok(())
}

#[test]
fn test_temporal_structures_round_trip() -> Result<()> {
    let values = vec![
        Value::Date(Date { epoch_days: 18_000 }),
        Value::Time(Time {
            nanos_of_day: 3_600_000_000_000,
            offset_seconds: -7200,
        }),
        Value::LocalDateTime(LocalDateTime {
            epoch_seconds: 1_500_000_000,
            nanos: 999,
        }),
        Value::Duration(Duration {
            months: 13,
            days: 2,
            seconds: 30,
            nanos: 7,
        }),
        Value::Point3D(Point3D {
            srid: 9157,
            x: 1.0,
            y: 2.0,
            z: 3.0,
        }),
    ];

    for value in values {
        let bytes = encode_to_bytes(&value)?;
        assert_eq!(decode_from_bytes(&bytes)?, value, "round trip failed");
    }
    Ok(())
}

#[test]
fn test_path_round_trip() -> Result<()> {
    let node = |id: i64, label: &str| Node {
        id,
        labels: vec![label.to_string()],
        properties: Default::default(),
    };
    let value = Value::Path(Path {
        nodes: vec![node(1, "A"), node(2, "B")],
        relationships: vec![UnboundRelationship {
            id: 9,
            rel_type: "KNOWS".to_string(),
            properties: Default::default(),
        }],
        sequence: vec![1, 1],
    });

    let bytes = encode_to_bytes(&value)?;
    assert_eq!(decode_from_bytes(&bytes)?, value);
    Ok(())
}
