use std::collections::HashMap;
use std::fmt;
use std::ops::Range;

use thiserror::Error;
use tracing::debug;

use crate::metadata::info_hash::{InfoHash, compute_info_hash};

/// Nesting ceiling used when the caller does not pick one.
///
/// Small enough that the recursive parser stays within a 2 MiB thread stack
/// even in unoptimized builds.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Upper bound on the stack one nesting level can take, unoptimized.
const STACK_PER_LEVEL: usize = 16 * 1024;

/// Stack a thread needs to decode input nested `max_depth` levels deep.
pub fn stack_size_for_depth(max_depth: usize) -> usize {
    max_depth.saturating_mul(STACK_PER_LEVEL).saturating_add(1 << 20).max(2 << 20)
}

const INFO: &[u8] = b"info";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BencodeValue {
    Integer(i64),
    ByteString(Vec<u8>),
    List(Vec<BencodeValue>),
    Dictionary(Dictionary),
}

/// Dictionary entries in the order they first appeared in the input.
///
/// Keys are raw bytes and are unique: inserting an existing key replaces its
/// value but keeps the original position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dictionary {
    entries: Vec<(Vec<u8>, BencodeValue)>,
    index: HashMap<Vec<u8>, usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Enforce canonical form: byte-string keys, unique and sorted keys, no trailing data.
    pub strict: bool,
    /// Maximum number of nested lists/dictionaries.
    pub max_depth: usize,
}

/// Result of decoding a whole buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub value: BencodeValue,
    /// Bytes occupied by the top-level value.
    pub span: Range<usize>,
    /// Bytes occupied by the top-level `info` dictionary, if there is one.
    pub info_span: Option<Range<usize>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unexpected end of input at byte {offset}")]
    UnexpectedEof { offset: usize },
    #[error("malformed integer at byte {offset}")]
    InvalidIntegerFormat { offset: usize },
    #[error("malformed byte-string length prefix at byte {offset}")]
    InvalidLengthPrefix { offset: usize },
    #[error("unexpected byte 0x{byte:02x} at byte {offset}")]
    UnexpectedByte { offset: usize, byte: u8 },
    #[error("dictionary key at byte {offset} is {found}, not a byte string")]
    NonBytesKey { offset: usize, found: &'static str },
    #[error("duplicate dictionary key {key:?} at byte {offset}")]
    DuplicateKey { offset: usize, key: String },
    #[error("dictionary key {key:?} at byte {offset} is out of order")]
    KeyOrderViolation { offset: usize, key: String },
    #[error("{remaining} bytes of trailing data at byte {offset}")]
    TrailingData { offset: usize, remaining: usize },
    #[error("nesting exceeds {limit} levels at byte {offset}")]
    DepthExceeded { offset: usize, limit: usize },
}

type Result<T> = std::result::Result<T, DecodeError>;

impl DecodeError {
    /// Position in the input where the problem was detected.
    pub fn offset(&self) -> usize {
        match self {
            DecodeError::UnexpectedEof { offset }
            | DecodeError::InvalidIntegerFormat { offset }
            | DecodeError::InvalidLengthPrefix { offset }
            | DecodeError::UnexpectedByte { offset, .. }
            | DecodeError::NonBytesKey { offset, .. }
            | DecodeError::DuplicateKey { offset, .. }
            | DecodeError::KeyOrderViolation { offset, .. }
            | DecodeError::TrailingData { offset, .. }
            | DecodeError::DepthExceeded { offset, .. } => *offset,
        }
    }
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self { strict: false, max_depth: DEFAULT_MAX_DEPTH }
    }
}

impl DecodeOptions {
    pub fn strict() -> Self {
        Self { strict: true, ..Self::default() }
    }

    pub fn lenient() -> Self {
        Self::default()
    }

    pub fn with_max_depth(self, max_depth: usize) -> Self {
        Self { max_depth, ..self }
    }
}

impl Decoded {
    pub fn info_bytes<'a>(&self, buffer: &'a [u8]) -> Option<&'a [u8]> {
        self.info_span.clone().and_then(|span| buffer.get(span))
    }

    /// SHA-1 of the `info` dictionary exactly as it appears in `buffer`.
    pub fn info_hash(&self, buffer: &[u8]) -> Option<InfoHash> {
        self.info_span.clone().and_then(|span| compute_info_hash(buffer, span))
    }
}

/// Decodes one bencoded value from `buffer`.
pub fn decode(buffer: &[u8], strict: bool) -> Result<BencodeValue> {
    let options = DecodeOptions { strict, ..DecodeOptions::default() };
    decode_with(buffer, &options).map(|decoded| decoded.value)
}

/// Decodes one bencoded value and reports where the top-level value and its
/// `info` dictionary sit in `buffer`.
pub fn decode_with(buffer: &[u8], options: &DecodeOptions) -> Result<Decoded> {
    BencodeParser::new(buffer, *options).deserialize()
}

fn write_bytes(bytes: &[u8], f: &mut fmt::Formatter) -> fmt::Result {
    for byte in bytes {
        write!(f, "{:02X}", byte)?;
    }
    Ok(())
}

fn write_byte_string(bytes: &[u8], f: &mut fmt::Formatter) -> fmt::Result {
    if bytes.iter().all(|&byte| (0x20..=0x7e).contains(&byte)) {
        // printable ASCII is always valid UTF-8
        write!(f, "{}", String::from_utf8_lossy(bytes))
    } else {
        write_bytes(bytes, f)
    }
}

impl fmt::Display for BencodeValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BencodeValue::Integer(num) => write!(f, "{}", num),
            BencodeValue::ByteString(bytes) => write_byte_string(bytes, f),
            BencodeValue::List(elements) => {
                write!(f, "[")?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", element)?;
                }
                write!(f, "]")
            }
            BencodeValue::Dictionary(items) => {
                write!(f, "{{")?;
                for (i, (key, value)) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write_byte_string(key, f)?;
                    write!(f, " => {}", value)?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl BencodeValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            BencodeValue::Integer(_) => "an integer",
            BencodeValue::ByteString(_) => "a byte string",
            BencodeValue::List(_) => "a list",
            BencodeValue::Dictionary(_) => "a dictionary",
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            BencodeValue::Integer(num) => Some(*num),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            BencodeValue::ByteString(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[BencodeValue]> {
        match self {
            BencodeValue::List(elements) => Some(elements),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&Dictionary> {
        match self {
            BencodeValue::Dictionary(items) => Some(items),
            _ => None,
        }
    }

    /// Dictionary lookup; `None` for missing keys and for non-dictionaries.
    pub fn get(&self, key: &[u8]) -> Option<&BencodeValue> {
        self.as_dict().and_then(|items| items.get(key))
    }
}

impl Dictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &[u8]) -> Option<&BencodeValue> {
        self.index.get(key).map(|&i| &self.entries[i].1)
    }

    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.index.contains_key(key)
    }

    /// Inserts `value` under `key`, returning the value it replaced.
    pub fn insert(&mut self, key: Vec<u8>, value: BencodeValue) -> Option<BencodeValue> {
        match self.index.get(&key) {
            Some(&i) => Some(std::mem::replace(&mut self.entries[i].1, value)),
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &BencodeValue)> {
        self.entries.iter().map(|(key, value)| (key.as_slice(), value))
    }

    pub fn keys(&self) -> impl Iterator<Item = &[u8]> {
        self.entries.iter().map(|(key, _)| key.as_slice())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn last_key(&self) -> Option<&[u8]> {
        self.entries.last().map(|(key, _)| key.as_slice())
    }
}

impl FromIterator<(Vec<u8>, BencodeValue)> for Dictionary {
    fn from_iter<I: IntoIterator<Item = (Vec<u8>, BencodeValue)>>(iter: I) -> Self {
        let mut dictionary = Dictionary::new();
        for (key, value) in iter {
            dictionary.insert(key, value);
        }
        dictionary
    }
}

// Logging stays out of the recursive parser functions to keep their stack frames small.
#[cold]
fn log_recovery(offset: usize, message: &'static str) {
    debug!(offset, "{}", message);
}

#[cold]
fn log_skipped_key(offset: usize, key_type: &'static str) {
    debug!(offset, key_type, "skipping dictionary entry with a non byte-string key");
}

#[derive(Debug)]
struct BencodeParser<'a> {
    contents: &'a [u8],
    pos: usize,
    options: DecodeOptions,
    info_span: Option<Range<usize>>,
}

impl<'a> BencodeParser<'a> {

    fn new(contents: &'a [u8], options: DecodeOptions) -> Self {
        Self { contents, pos: 0, options, info_span: None }
    }

    fn deserialize(mut self) -> Result<Decoded> {
        let value = self.parse_value(0)?;
        let span = 0..self.pos;
        let remaining = self.contents.len() - self.pos;
        if remaining > 0 {
            if self.options.strict {
                return Err(DecodeError::TrailingData { offset: self.pos, remaining });
            }
            debug!(offset = self.pos, remaining, "ignoring trailing data");
        }
        Ok(Decoded { value, span, info_span: self.info_span })
    }

    /// `depth` is the number of containers enclosing the value at `pos`.
    fn parse_value(&mut self, depth: usize) -> Result<BencodeValue> {
        let first = self.peek()?;
        match first {
            b'i' => self.parse_integer(),
            b'l' => self.parse_list(depth),
            b'd' => self.parse_dictionary(depth),
            b'0'..=b'9' => self.parse_string().map(BencodeValue::ByteString),
            _ => Err(DecodeError::UnexpectedByte { offset: self.pos, byte: first }),
        }
    }

    fn parse_integer(&mut self) -> Result<BencodeValue> {
        let start = self.pos;
        self.pos += 1;
        let negative = self.peek()? == b'-';
        if negative {
            self.pos += 1;
        }
        let digits_start = self.pos;
        let mut value: i64 = 0;
        loop {
            let byte = self.peek()?;
            if !byte.is_ascii_digit() {
                break;
            }
            let digit = i64::from(byte - b'0');
            // accumulate negatives downwards so i64::MIN fits
            value = value
                .checked_mul(10)
                .and_then(|v| if negative { v.checked_sub(digit) } else { v.checked_add(digit) })
                .ok_or(DecodeError::InvalidIntegerFormat { offset: start })?;
            self.pos += 1;
        }
        let digits = &self.contents[digits_start..self.pos];
        if digits.is_empty() || (digits[0] == b'0' && (digits.len() > 1 || negative)) {
            return Err(DecodeError::InvalidIntegerFormat { offset: start });
        }
        if self.peek()? != b'e' {
            return Err(DecodeError::InvalidIntegerFormat { offset: self.pos });
        }
        self.pos += 1;
        Ok(BencodeValue::Integer(value))
    }

    fn parse_string(&mut self) -> Result<Vec<u8>> {
        let start = self.pos;
        let mut length: usize = 0;
        loop {
            let byte = self.peek()?;
            if !byte.is_ascii_digit() {
                break;
            }
            length = length
                .checked_mul(10)
                .and_then(|l| l.checked_add(usize::from(byte - b'0')))
                .ok_or(DecodeError::InvalidLengthPrefix { offset: start })?;
            self.pos += 1;
        }
        let num_digits = self.pos - start;
        if num_digits == 0 || (num_digits > 1 && self.contents[start] == b'0') {
            return Err(DecodeError::InvalidLengthPrefix { offset: start });
        }
        if self.peek()? != b':' {
            return Err(DecodeError::InvalidLengthPrefix { offset: self.pos });
        }
        self.pos += 1;
        if length > self.contents.len() - self.pos {
            return Err(DecodeError::UnexpectedEof { offset: self.contents.len() });
        }
        let bytes = self.contents[self.pos..self.pos + length].to_vec();
        self.pos += length;
        Ok(bytes)
    }

    fn parse_list(&mut self, depth: usize) -> Result<BencodeValue> {
        let depth = self.enter(depth)?;
        self.pos += 1;
        let mut values: Vec<BencodeValue> = Vec::new();
        while self.peek()? != b'e' {
            values.push(self.parse_value(depth)?);
        }
        self.pos += 1;
        Ok(BencodeValue::List(values))
    }

    fn parse_dictionary(&mut self, depth: usize) -> Result<BencodeValue> {
        let top_level = depth == 0;
        let depth = self.enter(depth)?;
        self.pos += 1;
        let mut map = Dictionary::new();
        loop {
            let key_start = self.pos;
            let first = self.peek()?;
            if first == b'e' {
                break;
            }
            if !first.is_ascii_digit() {
                self.skip_non_bytes_key(depth)?;
                continue;
            }
            let key = self.parse_string()?;
            if self.options.strict {
                Self::check_canonical_key(&map, &key, key_start)?;
            }

            let value_start = self.pos;
            let value = self.parse_value(depth)?;
            let value_end = self.pos;
            if top_level && key == INFO {
                self.info_span = matches!(value, BencodeValue::Dictionary(_)).then(|| value_start..value_end);
            }
            if !self.options.strict && map.last_key().is_some_and(|last| key.as_slice() < last) {
                log_recovery(key_start, "tolerating out of order dictionary key");
            }
            if map.insert(key, value).is_some() {
                log_recovery(key_start, "duplicate dictionary key, keeping the last value");
            }
        }
        self.pos += 1;
        Ok(BencodeValue::Dictionary(map))
    }

    fn check_canonical_key(map: &Dictionary, key: &[u8], offset: usize) -> Result<()> {
        if map.contains_key(key) {
            return Err(DecodeError::DuplicateKey { offset, key: String::from_utf8_lossy(key).into_owned() });
        }
        // strict dictionaries are built in order, so the last key is the largest
        if let Some(last) = map.last_key() {
            if key < last {
                return Err(DecodeError::KeyOrderViolation { offset, key: String::from_utf8_lossy(key).into_owned() });
            }
        }
        Ok(())
    }

    /// Lenient mode decodes and drops both the key and its value; strict mode rejects the entry.
    fn skip_non_bytes_key(&mut self, depth: usize) -> Result<()> {
        let offset = self.pos;
        if self.options.strict {
            let found = match self.contents[offset] {
                b'i' => "an integer",
                b'l' => "a list",
                b'd' => "a dictionary",
                byte => return Err(DecodeError::UnexpectedByte { offset, byte }),
            };
            return Err(DecodeError::NonBytesKey { offset, found });
        }
        let key_type = self.parse_value(depth)?.type_name();
        self.parse_value(depth)?;
        log_skipped_key(offset, key_type);
        Ok(())
    }

    fn enter(&self, depth: usize) -> Result<usize> {
        let depth = depth + 1;
        if depth > self.options.max_depth {
            Err(DecodeError::DepthExceeded { offset: self.pos, limit: self.options.max_depth })
        } else {
            Ok(depth)
        }
    }

    fn peek(&self) -> Result<u8> {
        self.contents
            .get(self.pos)
            .copied()
            .ok_or(DecodeError::UnexpectedEof { offset: self.pos })
    }
}

#[cfg(test)]
mod tests;
