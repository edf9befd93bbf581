#[cfg(test)]
mod tests {
    use crate::literal::to_literal;
    use crate::registry::{decode, encode, lookup};
    use crate::scalar::truncate_to_millis;
    use chrono::{DateTime, NaiveDate, Utc};
    use num_bigint::BigInt;
    use quill_core::error::{DecodeError, EncodeError};
    use quill_core::types::{ColumnValue, WireType};
    use uuid::Uuid;

    struct Case {
        wire_type: &'static str,
        insert: ColumnValue,
        expected: ColumnValue,
        supported: bool,
    }

    fn at_micros(micros: u32) -> DateTime<Utc> {
        NaiveDate::from_ymd_opt(2020, 1, 1)
            .and_then(|d| d.and_hms_micro_opt(0, 0, 0, micros))
            .expect("valid date")
            .and_utc()
    }

    fn uuid1() -> Uuid {
        Uuid::parse_str("6ba7b810-9dad-11d1-80b4-00c04fd430c8").expect("uuid")
    }

    fn marshalling_table() -> Vec<Case> {
        let text = "(づ｡◕‿‿◕｡)づ";
        vec![
            Case {
                wire_type: "ascii",
                insert: ColumnValue::Ascii("abcdefg".into()),
                expected: ColumnValue::Ascii("abcdefg".into()),
                supported: true,
            },
            Case {
                wire_type: "bigint",
                insert: ColumnValue::Bigint(9223372036854775805),
                expected: ColumnValue::Bigint(9223372036854775805),
                supported: true,
            },
            Case {
                wire_type: "blob",
                insert: ColumnValue::blob_from_hex("6d796b657931").expect("hex"),
                expected: ColumnValue::Blob(b"mykey1".to_vec()),
                supported: true,
            },
            Case {
                wire_type: "boolean",
                insert: ColumnValue::Boolean(true),
                expected: ColumnValue::Boolean(true),
                supported: true,
            },
            Case {
                wire_type: "counter",
                insert: ColumnValue::CounterDelta(1),
                expected: ColumnValue::Counter(1),
                supported: true,
            },
            Case {
                wire_type: "decimal",
                insert: ColumnValue::Double(1.513623),
                expected: ColumnValue::Double(1.513623),
                supported: false,
            },
            Case {
                wire_type: "double",
                insert: ColumnValue::Double(1.513623614),
                expected: ColumnValue::Double(1.513623614),
                supported: true,
            },
            Case {
                wire_type: "float",
                insert: ColumnValue::Float(136.36460918),
                expected: ColumnValue::Float(136.36460918),
                supported: true,
            },
            Case {
                wire_type: "inet",
                insert: ColumnValue::Text("152.12.14.1".into()),
                expected: ColumnValue::Text("152.12.14.1".into()),
                supported: false,
            },
            Case {
                wire_type: "int",
                insert: ColumnValue::Int(5),
                expected: ColumnValue::Int(5),
                supported: true,
            },
            Case {
                wire_type: "list<int>",
                insert: ColumnValue::List([1, 1, 2, 2, 3, 3, 4, 4].map(ColumnValue::Int).to_vec()),
                expected: ColumnValue::List([1, 1, 2, 2, 3, 3, 4, 4].map(ColumnValue::Int).to_vec()),
                supported: true,
            },
            Case {
                wire_type: "map<int, text>",
                insert: ColumnValue::Map(vec![(1.into(), "whats".into()), (2.into(), "up".into())]),
                expected: ColumnValue::Map(vec![(2.into(), "up".into()), (1.into(), "whats".into())]),
                supported: true,
            },
            Case {
                wire_type: "set<int>",
                insert: ColumnValue::Set([1, 2, 3, 4].map(ColumnValue::Int).to_vec()),
                expected: ColumnValue::Set([4, 3, 2, 1].map(ColumnValue::Int).to_vec()),
                supported: true,
            },
            Case {
                wire_type: "text",
                insert: ColumnValue::Text(text.into()),
                expected: ColumnValue::Text(text.into()),
                supported: true,
            },
            Case {
                wire_type: "timestamp",
                insert: ColumnValue::Timestamp(at_micros(123_456)),
                expected: ColumnValue::Timestamp(at_micros(123_000)),
                supported: true,
            },
            Case {
                wire_type: "uuid",
                insert: ColumnValue::Uuid(uuid1()),
                expected: ColumnValue::Uuid(uuid1()),
                supported: true,
            },
            Case {
                wire_type: "timeuuid",
                insert: ColumnValue::Timeuuid(uuid1()),
                expected: ColumnValue::Timeuuid(uuid1()),
                supported: true,
            },
            Case {
                wire_type: "varchar",
                insert: ColumnValue::Text(text.into()),
                expected: ColumnValue::Text(text.into()),
                supported: true,
            },
            Case {
                wire_type: "varint",
                insert: ColumnValue::Varint(BigInt::from(15984362469i64)),
                expected: ColumnValue::Varint(BigInt::from(15984362469i64)),
                supported: true,
            },
        ]
    }

    #[test]
    fn marshalling_table_round_trips() {
        for case in marshalling_table() {
            let wire_type: WireType = case.wire_type.parse().expect("wire type");
            let encoded = encode(&wire_type, &case.insert);
            if !case.supported {
                assert_eq!(
                    encoded,
                    Err(EncodeError::Unsupported(wire_type.clone())),
                    "{} should be refused",
                    case.wire_type
                );
                continue;
            }
            let bytes = encoded
                .unwrap_or_else(|err| panic!("encode {}: {err}", case.wire_type))
                .expect("non-null");
            let decoded = decode(&wire_type, Some(&bytes[..]))
                .unwrap_or_else(|err| panic!("decode {}: {err}", case.wire_type));
            assert_eq!(decoded, case.expected, "round trip of {}", case.wire_type);
        }
    }

    #[test]
    fn null_round_trips_for_every_wire_type() {
        for case in marshalling_table() {
            let wire_type: WireType = case.wire_type.parse().expect("wire type");
            let encoded = encode(&wire_type, &ColumnValue::Null).expect("encode null");
            assert_eq!(encoded, None);
            assert_eq!(
                decode(&wire_type, encoded.as_deref()).expect("decode null"),
                ColumnValue::Null
            );
        }
    }

    #[test]
    fn unsupported_types_fail_at_lookup() {
        assert!(matches!(
            lookup(&WireType::Decimal),
            Err(EncodeError::Unsupported(WireType::Decimal))
        ));
        assert!(matches!(
            lookup(&WireType::Inet),
            Err(EncodeError::Unsupported(WireType::Inet))
        ));
        assert_eq!(
            decode(&WireType::Inet, Some(&[152, 12, 14, 1][..])),
            Err(DecodeError::Unsupported(WireType::Inet))
        );
        assert_eq!(
            encode(&WireType::list(WireType::Decimal), &ColumnValue::List(vec![1.into()])),
            Err(EncodeError::Unsupported(WireType::Decimal))
        );
    }

    #[test]
    fn fixed_width_integers_are_big_endian() {
        let bytes = encode(&WireType::Int, &ColumnValue::Int(-2)).unwrap().unwrap();
        assert_eq!(&bytes[..], &[0xff, 0xff, 0xff, 0xfe]);
        let bytes = encode(&WireType::Bigint, &ColumnValue::Bigint(258)).unwrap().unwrap();
        assert_eq!(&bytes[..], &[0, 0, 0, 0, 0, 0, 1, 2]);
        let bytes = encode(&WireType::Boolean, &ColumnValue::Boolean(true)).unwrap().unwrap();
        assert_eq!(&bytes[..], &[1]);
    }

    #[test]
    fn varint_exceeding_64_bits_round_trips() {
        let huge: BigInt = "-170141183460469231731687303715884105729123".parse().unwrap();
        let value = ColumnValue::Varint(huge);
        let bytes = encode(&WireType::Varint, &value).unwrap().unwrap();
        assert!(bytes.len() > 16);
        assert_eq!(decode(&WireType::Varint, Some(&bytes[..])).unwrap(), value);

        let zero = encode(&WireType::Varint, &ColumnValue::Varint(BigInt::from(0))).unwrap().unwrap();
        assert_eq!(&zero[..], &[0]);
        let neg = encode(&WireType::Varint, &ColumnValue::Varint(BigInt::from(-129))).unwrap().unwrap();
        assert_eq!(&neg[..], &[0xff, 0x7f]);
    }

    #[test]
    fn timestamp_truncates_sub_millisecond_precision() {
        let value = at_micros(123_999);
        let bytes = encode(&WireType::Timestamp, &ColumnValue::Timestamp(value)).unwrap().unwrap();
        assert_eq!(&bytes[..], &1_577_836_800_123i64.to_be_bytes());
        assert_eq!(
            decode(&WireType::Timestamp, Some(&bytes[..])).unwrap(),
            ColumnValue::Timestamp(at_micros(123_000))
        );
        assert_eq!(truncate_to_millis(value), at_micros(123_000));
    }

    #[test]
    fn ascii_rejects_high_codepoints() {
        assert_eq!(
            encode(&WireType::Ascii, &ColumnValue::Ascii("abé".into())),
            Err(EncodeError::NonAscii { position: 2 })
        );
        assert_eq!(
            decode(&WireType::Ascii, Some("é".as_bytes())),
            Err(DecodeError::NonAscii { position: 0 })
        );
    }

    #[test]
    fn shape_mismatch_is_an_encode_error() {
        assert_eq!(
            encode(&WireType::Int, &ColumnValue::Text("5".into())),
            Err(EncodeError::TypeMismatch {
                expected: WireType::Int,
                found: "text"
            })
        );
        assert!(matches!(
            encode(&WireType::Uuid, &ColumnValue::Timeuuid(uuid1())),
            Err(EncodeError::TypeMismatch { .. })
        ));
        let mixed = ColumnValue::List(vec![1.into(), ColumnValue::Text("two".into())]);
        assert!(matches!(
            encode(&WireType::list(WireType::Int), &mixed),
            Err(EncodeError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn counter_only_accepts_increments() {
        assert_eq!(
            encode(&WireType::Counter, &ColumnValue::Counter(10)),
            Err(EncodeError::CounterAssignment)
        );
        let bytes = encode(&WireType::Counter, &ColumnValue::CounterDelta(-3)).unwrap().unwrap();
        assert_eq!(
            decode(&WireType::Counter, Some(&bytes[..])).unwrap(),
            ColumnValue::Counter(-3)
        );
    }

    #[test]
    fn collections_reject_null_and_duplicate_elements() {
        let ty = WireType::list(WireType::Int);
        assert_eq!(
            encode(&ty, &ColumnValue::List(vec![1.into(), ColumnValue::Null])),
            Err(EncodeError::NullElement(ty.clone()))
        );
        let ty = WireType::set(WireType::Int);
        assert_eq!(
            encode(&ty, &ColumnValue::Set(vec![1.into(), 1.into()])),
            Err(EncodeError::DuplicateElement(ty.clone()))
        );
        let ty = WireType::map(WireType::Int, WireType::Text);
        let dup = ColumnValue::Map(vec![(1.into(), "a".into()), (1.into(), "b".into())]);
        assert_eq!(encode(&ty, &dup), Err(EncodeError::DuplicateElement(ty.clone())));
    }

    #[test]
    fn list_layout_is_count_then_length_prefixed_elements() {
        let ty = WireType::list(WireType::Int);
        let bytes = encode(&ty, &ColumnValue::List(vec![7.into()])).unwrap().unwrap();
        assert_eq!(&bytes[..], &[0, 0, 0, 1, 0, 0, 0, 4, 0, 0, 0, 7]);
    }

    #[test]
    fn nested_collections_round_trip() {
        let ty = WireType::map(WireType::Text, WireType::list(WireType::Bigint));
        let value = ColumnValue::Map(vec![
            ("a".into(), ColumnValue::List(vec![1i64.into(), 2i64.into()])),
            ("b".into(), ColumnValue::List(vec![])),
        ]);
        let bytes = encode(&ty, &value).unwrap().unwrap();
        assert_eq!(decode(&ty, Some(&bytes[..])).unwrap(), value);
    }

    #[test]
    fn malformed_bytes_are_decode_errors() {
        assert_eq!(
            decode(&WireType::Int, Some(&[0, 1][..])),
            Err(DecodeError::InvalidLength {
                wire_type: WireType::Int,
                expected: 4,
                found: 2
            })
        );
        assert_eq!(
            decode(&WireType::Boolean, Some(&[2][..])),
            Err(DecodeError::InvalidBoolean(2))
        );
        assert_eq!(
            decode(&WireType::Text, Some(&[0xff, 0xfe][..])),
            Err(DecodeError::InvalidUtf8)
        );
        let ty = WireType::list(WireType::Int);
        assert_eq!(
            decode(&ty, Some(&[0xff, 0xff, 0xff, 0xff][..])),
            Err(DecodeError::NegativeCount(-1))
        );
        assert_eq!(
            decode(&ty, Some(&[0, 0, 0, 1, 0, 0, 0, 4, 0, 0][..])),
            Err(DecodeError::Truncated(ty.clone()))
        );
        assert_eq!(
            decode(&ty, Some(&[0, 0, 0, 0, 9][..])),
            Err(DecodeError::TrailingBytes(ty.clone()))
        );
        assert_eq!(
            decode(&ty, Some(&[0, 0, 0, 1, 0xff, 0xff, 0xff, 0xff][..])),
            Err(DecodeError::NullElement(ty.clone()))
        );
    }

    #[test]
    fn set_literals_leave_numbers_bare_and_quote_strings() {
        let ints = ColumnValue::Set([1, 2, 3, 4].map(ColumnValue::Int).to_vec());
        assert_eq!(
            to_literal(&WireType::set(WireType::Int), &ints).unwrap(),
            "{1, 2, 3, 4}"
        );
        let texts = ColumnValue::Set(vec!["it's".into(), "b".into()]);
        assert_eq!(
            to_literal(&WireType::set(WireType::Text), &texts).unwrap(),
            "{'it''s', 'b'}"
        );
        let flags = ColumnValue::Set(vec![true.into(), false.into()]);
        assert_eq!(
            to_literal(&WireType::set(WireType::Boolean), &flags).unwrap(),
            "{true, false}"
        );
    }

    #[test]
    fn literals_cover_scalars_and_maps() {
        assert_eq!(
            to_literal(&WireType::Blob, &ColumnValue::Blob(vec![0x6d, 0x01])).unwrap(),
            "0x6d01"
        );
        assert_eq!(
            to_literal(&WireType::Timestamp, &ColumnValue::Timestamp(at_micros(123_456))).unwrap(),
            "1577836800123"
        );
        let map = ColumnValue::Map(vec![(1.into(), "whats".into())]);
        assert_eq!(
            to_literal(&WireType::map(WireType::Int, WireType::Text), &map).unwrap(),
            "{1: 'whats'}"
        );
        assert_eq!(to_literal(&WireType::Int, &ColumnValue::Null).unwrap(), "null");
        assert_eq!(
            to_literal(&WireType::Decimal, &ColumnValue::Double(1.5)),
            Err(EncodeError::Unsupported(WireType::Decimal))
        );
        assert_eq!(
            to_literal(&WireType::Counter, &ColumnValue::Counter(3)),
            Err(EncodeError::CounterAssignment)
        );
    }
}
