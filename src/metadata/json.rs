use serde_json::{Map, Value as JsonValue};

use crate::metadata::bencode::BencodeValue;
use crate::metadata::text::Text;

const PIECES: &[u8] = b"pieces";
const PIECE_HASH_LEN: usize = 20;

/// Mirrors a decoded value as JSON.
///
/// Byte strings become JSON strings through [`Text`], so invalid UTF-8 turns
/// into U+FFFD replacement characters. Any byte string stored under a
/// `pieces` key is replaced by [`pieces_placeholder`]. Object keys come out
/// sorted; two keys that only differ in invalid bytes collapse into one.
pub fn to_json(value: &BencodeValue) -> JsonValue {
    convert(value, false)
}

pub fn pieces_placeholder(num_bytes: usize) -> String {
    format!("<{} bytes, {} pieces>", num_bytes, num_bytes / PIECE_HASH_LEN)
}

fn convert(value: &BencodeValue, under_pieces: bool) -> JsonValue {
    match value {
        BencodeValue::Integer(num) => JsonValue::from(*num),
        BencodeValue::ByteString(bytes) if under_pieces => JsonValue::String(pieces_placeholder(bytes.len())),
        BencodeValue::ByteString(bytes) => JsonValue::String(Text::from_bytes(bytes).into_string()),
        BencodeValue::List(elements) => JsonValue::Array(elements.iter().map(|e| convert(e, false)).collect()),
        BencodeValue::Dictionary(items) => {
            let mut map = Map::new();
            for (key, item) in items.iter() {
                map.insert(Text::from_bytes(key).into_string(), convert(item, key == PIECES));
            }
            JsonValue::Object(map)
        },
    }
}
