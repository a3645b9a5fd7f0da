use std::collections::BTreeMap;

use bytes::Bytes;

use super::error::BencodeError;
use super::value::Value;

const MAX_DEPTH: usize = 64;

/// Decodes exactly one bencode value from `input`.
///
/// Trailing bytes after the value are an error; a datagram carries one
/// message and nothing else.
///
/// # Examples
///
/// ```
/// use mdht::bencode::decode;
///
/// assert_eq!(decode(b"i42e").unwrap().as_int(), Some(42));
/// assert_eq!(decode(b"4:spam").unwrap().as_str(), Some("spam"));
/// assert!(decode(b"i42eextra").is_err());
/// ```
pub fn decode(input: &[u8]) -> Result<Value, BencodeError> {
    let mut parser = Parser { input, pos: 0 };
    let value = parser.value(0)?;

    if parser.pos != input.len() {
        return Err(BencodeError::TrailingData);
    }

    Ok(value)
}

struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Result<u8, BencodeError> {
        self.input
            .get(self.pos)
            .copied()
            .ok_or(BencodeError::Truncated)
    }

    /// Consumes up to (and including) `stop`, returning the bytes before it.
    fn take_until(&mut self, stop: u8) -> Result<&'a [u8], BencodeError> {
        let start = self.pos;
        while self.peek()? != stop {
            self.pos += 1;
        }
        let span = &self.input[start..self.pos];
        self.pos += 1;
        Ok(span)
    }

    fn value(&mut self, depth: usize) -> Result<Value, BencodeError> {
        if depth > MAX_DEPTH {
            return Err(BencodeError::TooDeep);
        }

        match self.peek()? {
            b'i' => self.integer(),
            b'l' => self.list(depth),
            b'd' => self.dict(depth),
            b'0'..=b'9' => self.byte_string(),
            other => Err(BencodeError::UnexpectedByte(other)),
        }
    }

    fn integer(&mut self) -> Result<Value, BencodeError> {
        self.pos += 1;
        let digits = self.take_until(b'e')?;

        let text = std::str::from_utf8(digits)
            .map_err(|_| BencodeError::BadInteger("not ascii".into()))?;

        // i-0e and zero-padded forms are invalid per BEP-3.
        if text.is_empty() || text.starts_with("-0") || (text.len() > 1 && text.starts_with('0')) {
            return Err(BencodeError::BadInteger(text.into()));
        }

        let n: i64 = text
            .parse()
            .map_err(|_| BencodeError::BadInteger(text.into()))?;

        Ok(Value::Int(n))
    }

    fn byte_string(&mut self) -> Result<Value, BencodeError> {
        let digits = self.take_until(b':')?;

        let len: usize = std::str::from_utf8(digits)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or(BencodeError::BadLength)?;

        if self.pos + len > self.input.len() {
            return Err(BencodeError::Truncated);
        }

        let bytes = Bytes::copy_from_slice(&self.input[self.pos..self.pos + len]);
        self.pos += len;

        Ok(Value::Bytes(bytes))
    }

    fn list(&mut self, depth: usize) -> Result<Value, BencodeError> {
        self.pos += 1;
        let mut items = Vec::new();

        while self.peek()? != b'e' {
            items.push(self.value(depth + 1)?);
        }
        self.pos += 1;

        Ok(Value::List(items))
    }

    fn dict(&mut self, depth: usize) -> Result<Value, BencodeError> {
        self.pos += 1;
        let mut entries = BTreeMap::new();

        while self.peek()? != b'e' {
            let key = match self.value(depth + 1)? {
                Value::Bytes(b) => b,
                _ => return Err(BencodeError::NonStringKey),
            };
            let value = self.value(depth + 1)?;
            entries.insert(key, value);
        }
        self.pos += 1;

        Ok(Value::Dict(entries))
    }
}
