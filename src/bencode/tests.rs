use std::collections::BTreeMap;

use bytes::Bytes;

use super::*;

#[test]
fn decode_integers() {
    assert_eq!(decode(b"i42e").unwrap(), Value::Int(42));
    assert_eq!(decode(b"i-7e").unwrap(), Value::Int(-7));
    assert_eq!(decode(b"i0e").unwrap(), Value::Int(0));
}

#[test]
fn decode_rejects_bad_integers() {
    assert!(decode(b"i-0e").is_err());
    assert!(decode(b"i042e").is_err());
    assert!(decode(b"ie").is_err());
    assert!(decode(b"i42").is_err());
}

#[test]
fn decode_byte_strings() {
    assert_eq!(
        decode(b"4:spam").unwrap(),
        Value::Bytes(Bytes::from_static(b"spam"))
    );
    assert_eq!(
        decode(b"0:").unwrap(),
        Value::Bytes(Bytes::from_static(b""))
    );
    assert!(decode(b"5:spam").is_err());
    assert!(decode(b"4spam").is_err());
}

#[test]
fn decode_lists() {
    let v = decode(b"l4:spami42ee").unwrap();
    let items = v.as_list().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].as_str(), Some("spam"));
    assert_eq!(items[1].as_int(), Some(42));
}

#[test]
fn decode_dicts() {
    let v = decode(b"d3:cow3:moo4:spam4:eggse").unwrap();
    let entries = v.as_dict().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(v.get(b"cow").and_then(Value::as_str), Some("moo"));
    assert_eq!(v.get(b"spam").and_then(Value::as_str), Some("eggs"));
}

#[test]
fn decode_rejects_non_string_keys() {
    assert!(matches!(
        decode(b"di1e3:mooe"),
        Err(BencodeError::NonStringKey)
    ));
}

#[test]
fn decode_rejects_trailing_data() {
    assert!(matches!(
        decode(b"i42eextra"),
        Err(BencodeError::TrailingData)
    ));
}

#[test]
fn decode_rejects_deep_nesting() {
    let mut data = vec![b'l'; 100];
    data.extend(vec![b'e'; 100]);
    assert!(matches!(decode(&data), Err(BencodeError::TooDeep)));
}

#[test]
fn encode_scalars() {
    assert_eq!(encode(&Value::Int(42)).unwrap(), b"i42e");
    assert_eq!(encode(&Value::Int(-7)).unwrap(), b"i-7e");
    assert_eq!(
        encode(&Value::Bytes(Bytes::from_static(b"spam"))).unwrap(),
        b"4:spam"
    );
}

#[test]
fn encode_containers() {
    let list = Value::List(vec![Value::string("spam"), Value::Int(42)]);
    assert_eq!(encode(&list).unwrap(), b"l4:spami42ee");

    let mut entries = BTreeMap::new();
    entries.insert(Bytes::from_static(b"cow"), Value::string("moo"));
    assert_eq!(encode(&Value::Dict(entries)).unwrap(), b"d3:cow3:mooe");
}

#[test]
fn dict_keys_encode_sorted() {
    let mut entries = BTreeMap::new();
    entries.insert(Bytes::from_static(b"b"), Value::Int(2));
    entries.insert(Bytes::from_static(b"a"), Value::Int(1));
    assert_eq!(encode(&Value::Dict(entries)).unwrap(), b"d1:ai1e1:bi2ee");
}

#[test]
fn roundtrip_nested_message() {
    let wire = b"d1:ad2:id20:abcdefghij0123456789e1:q4:ping1:t2:aa1:y1:qe";
    let decoded = decode(wire).unwrap();
    assert_eq!(encode(&decoded).unwrap(), wire);
}
