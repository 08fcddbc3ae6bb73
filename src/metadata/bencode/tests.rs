use super::*;

fn bytes(s: &str) -> BencodeValue {
    BencodeValue::ByteString(s.as_bytes().to_vec())
}

fn dict(entries: &[(&str, BencodeValue)]) -> BencodeValue {
    BencodeValue::Dictionary(
        entries
            .iter()
            .map(|(key, value)| (key.as_bytes().to_vec(), value.clone()))
            .collect(),
    )
}

fn lenient(input: &[u8]) -> Result<BencodeValue> {
    decode(input, false)
}

fn strict(input: &[u8]) -> Result<BencodeValue> {
    decode(input, true)
}

#[test]
fn test_decode_integer() {
    assert_eq!(strict(b"i4e").unwrap(), BencodeValue::Integer(4));
    assert_eq!(strict(b"i0e").unwrap(), BencodeValue::Integer(0));
    assert_eq!(strict(b"i-42e").unwrap(), BencodeValue::Integer(-42));
    assert_eq!(strict(b"i9223372036854775807e").unwrap(), BencodeValue::Integer(i64::MAX));
    assert_eq!(strict(b"i-9223372036854775808e").unwrap(), BencodeValue::Integer(i64::MIN));
}

#[test]
fn test_decode_integer_invalid() {
    for input in [&b"i-0e"[..], b"i04e", b"i-04e", b"ie", b"i-e", b"i1x", b"i+1e"] {
        for result in [strict(input), lenient(input)] {
            assert!(
                matches!(result, Err(DecodeError::InvalidIntegerFormat { .. })),
                "{:?} gave {:?}",
                String::from_utf8_lossy(input),
                result
            );
        }
    }
}

#[test]
fn test_decode_integer_overflow() {
    let err = strict(b"i9223372036854775808e").unwrap_err();
    assert_eq!(err, DecodeError::InvalidIntegerFormat { offset: 0 });
    let err = strict(b"i-9223372036854775809e").unwrap_err();
    assert_eq!(err, DecodeError::InvalidIntegerFormat { offset: 0 });
}

#[test]
fn test_decode_integer_unterminated() {
    assert_eq!(strict(b"i42").unwrap_err(), DecodeError::UnexpectedEof { offset: 3 });
    assert_eq!(strict(b"i").unwrap_err(), DecodeError::UnexpectedEof { offset: 1 });
}

#[test]
fn test_decode_byte_string() {
    assert_eq!(strict(b"4:spam").unwrap(), bytes("spam"));
    assert_eq!(strict(b"0:").unwrap(), bytes(""));
    assert_eq!(
        strict(b"3:\xff\x00\xfe").unwrap(),
        BencodeValue::ByteString(vec![0xff, 0x00, 0xfe])
    );
}

#[test]
fn test_decode_byte_string_too_short() {
    assert_eq!(strict(b"5:spam").unwrap_err(), DecodeError::UnexpectedEof { offset: 6 });
    assert_eq!(lenient(b"5:spam").unwrap_err(), DecodeError::UnexpectedEof { offset: 6 });
}

#[test]
fn test_decode_byte_string_bad_prefix() {
    assert_eq!(strict(b"04:spam").unwrap_err(), DecodeError::InvalidLengthPrefix { offset: 0 });
    assert_eq!(strict(b"4spam").unwrap_err(), DecodeError::InvalidLengthPrefix { offset: 1 });
    assert_eq!(
        strict(b"99999999999999999999999:x").unwrap_err(),
        DecodeError::InvalidLengthPrefix { offset: 0 }
    );
}

#[test]
fn test_decode_list() {
    assert_eq!(
        strict(b"l4:spami42ee").unwrap(),
        BencodeValue::List(vec![bytes("spam"), BencodeValue::Integer(42)])
    );
    assert_eq!(strict(b"le").unwrap(), BencodeValue::List(Vec::new()));
    assert_eq!(strict(b"l4:spam").unwrap_err(), DecodeError::UnexpectedEof { offset: 7 });
}

#[test]
fn test_decode_dictionary_both_modes() {
    let expected = dict(&[("bar", bytes("spam")), ("foo", BencodeValue::Integer(42))]);
    assert_eq!(strict(b"d3:bar4:spam3:fooi42ee").unwrap(), expected);
    assert_eq!(lenient(b"d3:bar4:spam3:fooi42ee").unwrap(), expected);
}

#[test]
fn test_key_order_violation() {
    let input = b"d3:fooi42e3:bar4:spame";
    assert_eq!(
        strict(input).unwrap_err(),
        DecodeError::KeyOrderViolation { offset: 10, key: "bar".to_string() }
    );

    let value = lenient(input).unwrap();
    assert_eq!(value.get(b"bar"), Some(&bytes("spam")));
    assert_eq!(value.get(b"foo"), Some(&BencodeValue::Integer(42)));
    let keys: Vec<&[u8]> = value.as_dict().unwrap().keys().collect();
    assert_eq!(keys, vec![&b"foo"[..], &b"bar"[..]]);
}

#[test]
fn test_duplicate_key() {
    let input = b"d3:fooi1e3:fooi2ee";
    assert_eq!(
        strict(input).unwrap_err(),
        DecodeError::DuplicateKey { offset: 9, key: "foo".to_string() }
    );

    let value = lenient(input).unwrap();
    assert_eq!(value.as_dict().unwrap().len(), 1);
    assert_eq!(value.get(b"foo"), Some(&BencodeValue::Integer(2)));
}

#[test]
fn test_non_bytes_key() {
    let input = b"di1e3:one3:two3:twoe";
    assert_eq!(
        strict(input).unwrap_err(),
        DecodeError::NonBytesKey { offset: 1, found: "an integer" }
    );

    let value = lenient(input).unwrap();
    assert_eq!(value, dict(&[("two", bytes("two"))]));

    let err = strict(b"dl1:ae1:be").unwrap_err();
    assert_eq!(err, DecodeError::NonBytesKey { offset: 1, found: "a list" });
}

#[test]
fn test_trailing_data() {
    let input = b"i42eextra";
    assert_eq!(
        strict(input).unwrap_err(),
        DecodeError::TrailingData { offset: 4, remaining: 5 }
    );
    assert_eq!(lenient(input).unwrap(), BencodeValue::Integer(42));

    let decoded = decode_with(input, &DecodeOptions::lenient()).unwrap();
    assert_eq!(decoded.span, 0..4);
}

#[test]
fn test_unexpected_byte() {
    assert_eq!(strict(b"x").unwrap_err(), DecodeError::UnexpectedByte { offset: 0, byte: b'x' });
    assert_eq!(lenient(b"lxe").unwrap_err(), DecodeError::UnexpectedByte { offset: 1, byte: b'x' });
    assert_eq!(strict(b"").unwrap_err(), DecodeError::UnexpectedEof { offset: 0 });
}

#[test]
fn test_depth_limit() {
    let options = DecodeOptions::strict().with_max_depth(2);
    assert!(decode_with(b"llee", &options).is_ok());
    assert_eq!(
        decode_with(b"llleee", &options).unwrap_err(),
        DecodeError::DepthExceeded { offset: 2, limit: 2 }
    );
    assert_eq!(
        decode_with(b"ld", &options.with_max_depth(1)).unwrap_err(),
        DecodeError::DepthExceeded { offset: 1, limit: 1 }
    );
}

#[test]
fn test_hostile_nesting_is_rejected() {
    let input = vec![b'l'; 1_000_000];
    let err = decode_with(&input, &DecodeOptions::lenient()).unwrap_err();
    assert_eq!(err, DecodeError::DepthExceeded { offset: DEFAULT_MAX_DEPTH, limit: DEFAULT_MAX_DEPTH });
}

fn on_small_stack<T: Send + 'static>(f: impl FnOnce() -> T + Send + 'static) -> T {
    std::thread::Builder::new().stack_size(2 << 20).spawn(f).unwrap().join().unwrap()
}

fn nested(prefix: &[u8], levels: usize, middle: &[u8]) -> Vec<u8> {
    let mut input = prefix.repeat(levels);
    input.extend_from_slice(middle);
    input.extend(std::iter::repeat_n(b'e', levels));
    input
}

#[test]
fn test_deep_dictionaries_fit_small_stack() {
    let result = on_small_stack(|| {
        let input = nested(b"d1:a", DEFAULT_MAX_DEPTH, b"i0e");
        decode_with(&input, &DecodeOptions::strict()).map(|decoded| decoded.span.len())
    });
    assert_eq!(result, Ok(DEFAULT_MAX_DEPTH * 5 + 3));

    let err = on_small_stack(|| {
        let input = nested(b"d1:a", DEFAULT_MAX_DEPTH + 1, b"i0e");
        decode_with(&input, &DecodeOptions::lenient()).unwrap_err()
    });
    assert_eq!(err, DecodeError::DepthExceeded { offset: DEFAULT_MAX_DEPTH * 4, limit: DEFAULT_MAX_DEPTH });
}

#[test]
fn test_deep_non_bytes_keys_fit_small_stack() {
    let err = on_small_stack(|| {
        let input = nested(b"di1e", DEFAULT_MAX_DEPTH + 1, b"i0e");
        decode_with(&input, &DecodeOptions::lenient()).unwrap_err()
    });
    assert_eq!(err, DecodeError::DepthExceeded { offset: DEFAULT_MAX_DEPTH * 4, limit: DEFAULT_MAX_DEPTH });
}

#[test]
fn test_stack_size_for_depth() {
    assert_eq!(stack_size_for_depth(0), 2 << 20);
    assert!(stack_size_for_depth(DEFAULT_MAX_DEPTH * 16) > stack_size_for_depth(DEFAULT_MAX_DEPTH));
    assert_eq!(stack_size_for_depth(usize::MAX), usize::MAX);
}

#[test]
fn test_scalar_accessors() {
    let value = lenient(b"li-7e3:abce").unwrap();
    let items = value.as_list().unwrap();
    assert_eq!(items[0].as_integer(), Some(-7));
    assert_eq!(items[0].as_bytes(), None);
    assert_eq!(items[1].as_bytes(), Some(&b"abc"[..]));
    assert_eq!(items[1].as_integer(), None);
    assert_eq!(value.as_dict(), None);
}

#[test]
fn test_error_offset() {
    let err = strict(b"d3:fooi01ee").unwrap_err();
    assert_eq!(err.offset(), 6);
}

#[test]
fn test_info_span() {
    let input = b"d8:announce3:url4:infod4:name4:testee";
    let decoded = decode_with(input, &DecodeOptions::strict()).unwrap();
    assert_eq!(decoded.info_span, Some(22..36));
    assert_eq!(decoded.info_bytes(input), Some(&b"d4:name4:teste"[..]));
    assert_eq!(decoded.span, 0..input.len());
}

#[test]
fn test_info_span_only_for_top_level() {
    let input = b"d5:outerd4:infod1:ai1eeee";
    let decoded = decode_with(input, &DecodeOptions::strict()).unwrap();
    assert_eq!(decoded.info_span, None);

    let decoded = decode_with(b"d4:info4:texte", &DecodeOptions::strict()).unwrap();
    assert_eq!(decoded.info_span, None);
}

#[test]
fn test_info_span_last_wins_when_lenient() {
    let input = b"d4:infod1:ai1ee4:infod1:bi2eee";
    let decoded = decode_with(input, &DecodeOptions::lenient()).unwrap();
    assert_eq!(decoded.info_bytes(input), Some(&b"d1:bi2ee"[..]));
}

#[test]
fn test_dictionary_insert_keeps_position() {
    let mut items = Dictionary::new();
    assert!(items.insert(b"b".to_vec(), BencodeValue::Integer(1)).is_none());
    assert!(items.insert(b"a".to_vec(), BencodeValue::Integer(2)).is_none());
    assert_eq!(items.insert(b"b".to_vec(), BencodeValue::Integer(3)), Some(BencodeValue::Integer(1)));
    let pairs: Vec<(&[u8], &BencodeValue)> = items.iter().collect();
    assert_eq!(pairs, vec![(&b"b"[..], &BencodeValue::Integer(3)), (&b"a"[..], &BencodeValue::Integer(2))]);
}

#[test]
fn test_display() {
    let value = strict(b"d3:bar4:spam3:fooli1e2:\xff\xfeee").unwrap();
    assert_eq!(value.to_string(), "{bar => spam, foo => [1, FFFE]}");
}
