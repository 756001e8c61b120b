//! Property-literal syntax used by the store.
//!
//! ```text
//! value  := null | true | false | number | string | list | map
//! number := -?(0|[1-9][0-9]*) ('.' [0-9]+)? ([eE] [+-]? [0-9]+)?
//! string := "'" (char | '\' escape)* "'"
//! list   := '[' (value (',' value)*)? ']'
//! map    := '{' (key ':' value (',' key ':' value)*)? '}'
//! key    := [A-Za-z_][A-Za-z0-9_]* | '`' (char | '``')* '`'
//! ```

use std::fmt::Write as _;

use super::{render_float, CodecError, PropertyMap, Value};

/// Deepest container nesting accepted in either direction.
pub const MAX_DEPTH: usize = 128;

/// Renders `value` in literal syntax.
///
/// Strings that are syntactically integers are written unquoted and read
/// back as integers; every other string is quoted.
pub fn encode_literal(value: &Value) -> Result<String, CodecError> {
    let mut out = String::new();
    write_value(&mut out, value, 0)?;
    Ok(out)
}

/// Renders a property bag as a literal map.
pub fn encode_properties(props: &PropertyMap) -> Result<String, CodecError> {
    let mut out = String::new();
    write_map(&mut out, props, 0)?;
    Ok(out)
}

/// Parses one complete literal. Surrounding whitespace is ignored.
pub fn parse_literal(input: &str) -> Result<Value, CodecError> {
    let mut parser = Parser::new(input);
    let value = parser.value(0)?;
    parser.finish()?;
    Ok(value)
}

/// Parses a literal that must be a map.
pub fn parse_properties(input: &str) -> Result<PropertyMap, CodecError> {
    let mut parser = Parser::new(input);
    parser.skip_ws();
    let start = parser.pos;
    match parser.value(0)? {
        Value::Map(map) => {
            parser.finish()?;
            Ok(map)
        }
        other => Err(CodecError::Parse {
            offset: start,
            reason: format!("expected a map, found {}", other.kind()),
        }),
    }
}

/// Returns the integer a string spells, if it uses the literal integer
/// grammar and fits in an `i64`.
pub fn integer_syntax(s: &str) -> Option<i64> {
    let digits = s.strip_prefix('-').unwrap_or(s);
    let well_formed = match digits.as_bytes() {
        [] => false,
        [b'0'] => true,
        [b'0', ..] => false,
        bytes => bytes.iter().all(u8::is_ascii_digit),
    };
    if well_formed {
        s.parse().ok()
    } else {
        None
    }
}

fn write_value(out: &mut String, value: &Value, depth: usize) -> Result<(), CodecError> {
    if depth > MAX_DEPTH {
        return Err(CodecError::TooDeep(MAX_DEPTH));
    }
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Int(v) => {
            let _ = write!(out, "{v}");
        }
        Value::Float(f) if f.is_finite() => out.push_str(&render_float(*f)),
        Value::Float(f) => return Err(CodecError::NonFinite(*f)),
        Value::String(s) => match integer_syntax(s) {
            Some(v) => {
                let _ = write!(out, "{v}");
            }
            None => write_string(out, s),
        },
        Value::List(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_value(out, item, depth + 1)?;
            }
            out.push(']');
        }
        Value::Map(map) => write_map(out, map, depth)?,
    }
    Ok(())
}

fn write_map(out: &mut String, map: &PropertyMap, depth: usize) -> Result<(), CodecError> {
    out.push('{');
    for (i, (key, value)) in map.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write_key(out, key);
        out.push_str(": ");
        write_value(out, value, depth + 1)?;
    }
    out.push('}');
    Ok(())
}

fn write_string(out: &mut String, s: &str) {
    out.push('\'');
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('\'');
}

fn write_key(out: &mut String, key: &str) {
    if is_identifier(key) {
        out.push_str(key);
    } else {
        out.push('`');
        out.push_str(&key.replace('`', "``"));
        out.push('`');
    }
}

fn is_identifier(key: &str) -> bool {
    let mut bytes = key.bytes();
    match bytes.next() {
        Some(b) if b.is_ascii_alphabetic() || b == b'_' => {}
        _ => return false,
    }
    bytes.all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn error(&self, offset: usize, reason: impl Into<String>) -> CodecError {
        CodecError::Parse {
            offset,
            reason: reason.into(),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\n' | b'\r')) {
            self.pos += 1;
        }
    }

    fn finish(&mut self) -> Result<(), CodecError> {
        self.skip_ws();
        if self.pos < self.src.len() {
            return Err(self.error(self.pos, "unexpected trailing input"));
        }
        Ok(())
    }

    fn expect(&mut self, byte: u8) -> Result<(), CodecError> {
        self.skip_ws();
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(self.pos, format!("expected '{}'", byte as char)))
        }
    }

    fn value(&mut self, depth: usize) -> Result<Value, CodecError> {
        if depth > MAX_DEPTH {
            return Err(CodecError::TooDeep(MAX_DEPTH));
        }
        self.skip_ws();
        match self.peek() {
            None => Err(self.error(self.pos, "unexpected end of input")),
            Some(b'[') => self.list(depth),
            Some(b'{') => self.map(depth),
            Some(b'\'') => self.string().map(Value::String),
            Some(b'-' | b'0'..=b'9') => self.number(),
            Some(b) if b.is_ascii_alphabetic() => self.keyword(),
            Some(_) => Err(self.error(self.pos, "unexpected character")),
        }
    }

    fn keyword(&mut self) -> Result<Value, CodecError> {
        let start = self.pos;
        let word = self.identifier();
        match word {
            "null" => Ok(Value::Null),
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            other => Err(self.error(start, format!("unknown keyword '{other}'"))),
        }
    }

    fn identifier(&mut self) -> &'a str {
        let start = self.pos;
        while matches!(self.peek(), Some(b) if b.is_ascii_alphanumeric() || b == b'_') {
            self.pos += 1;
        }
        &self.src[start..self.pos]
    }

    fn digits(&mut self) -> usize {
        let start = self.pos;
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.pos += 1;
        }
        self.pos - start
    }

    fn number(&mut self) -> Result<Value, CodecError> {
        let start = self.pos;
        if self.peek() == Some(b'-') {
            self.pos += 1;
        }
        let int_start = self.pos;
        match self.digits() {
            0 => return Err(self.error(self.pos, "expected digits")),
            n if n > 1 && self.src.as_bytes()[int_start] == b'0' => {
                return Err(self.error(int_start, "leading zeros are not allowed"));
            }
            _ => {}
        }
        let mut is_float = false;
        if self.peek() == Some(b'.') {
            self.pos += 1;
            if self.digits() == 0 {
                return Err(self.error(self.pos, "expected digits after '.'"));
            }
            is_float = true;
        }
        if matches!(self.peek(), Some(b'e' | b'E')) {
            self.pos += 1;
            if matches!(self.peek(), Some(b'+' | b'-')) {
                self.pos += 1;
            }
            if self.digits() == 0 {
                return Err(self.error(self.pos, "expected exponent digits"));
            }
            is_float = true;
        }
        let text = &self.src[start..self.pos];
        if is_float {
            match text.parse::<f64>() {
                Ok(f) if f.is_finite() => Ok(Value::Float(f)),
                _ => Err(self.error(start, "float out of range")),
            }
        } else {
            text.parse::<i64>()
                .map(Value::Int)
                .map_err(|_| self.error(start, "integer out of range"))
        }
    }

    fn string(&mut self) -> Result<String, CodecError> {
        let open = self.pos;
        self.pos += 1;
        let mut out = String::new();
        loop {
            let rest = &self.src[self.pos..];
            let Some(ch) = rest.chars().next() else {
                return Err(self.error(open, "unterminated string"));
            };
            let at = self.pos;
            self.pos += ch.len_utf8();
            match ch {
                '\'' => return Ok(out),
                '\\' => out.push(self.escape(at)?),
                c => out.push(c),
            }
        }
    }

    fn escape(&mut self, at: usize) -> Result<char, CodecError> {
        let Some(code) = self.peek() else {
            return Err(self.error(at, "unterminated escape"));
        };
        self.pos += 1;
        match code {
            b'\\' => Ok('\\'),
            b'\'' => Ok('\''),
            b'n' => Ok('\n'),
            b'r' => Ok('\r'),
            b't' => Ok('\t'),
            b'u' => {
                let hex = self
                    .src
                    .get(self.pos..self.pos + 4)
                    .filter(|h| h.bytes().all(|b| b.is_ascii_hexdigit()))
                    .ok_or_else(|| self.error(at, "expected four hex digits after \\u"))?;
                self.pos += 4;
                u32::from_str_radix(hex, 16)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or_else(|| self.error(at, "escape is not a valid character"))
            }
            _ => Err(self.error(at, "unknown escape sequence")),
        }
    }

    fn list(&mut self, depth: usize) -> Result<Value, CodecError> {
        self.pos += 1;
        let mut items = Vec::new();
        self.skip_ws();
        if self.peek() == Some(b']') {
            self.pos += 1;
            return Ok(Value::List(items));
        }
        loop {
            items.push(self.value(depth + 1)?);
            self.skip_ws();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b']') => {
                    self.pos += 1;
                    return Ok(Value::List(items));
                }
                _ => return Err(self.error(self.pos, "expected ',' or ']'")),
            }
        }
    }

    fn map(&mut self, depth: usize) -> Result<Value, CodecError> {
        self.pos += 1;
        let mut map = PropertyMap::new();
        self.skip_ws();
        if self.peek() == Some(b'}') {
            self.pos += 1;
            return Ok(Value::Map(map));
        }
        loop {
            self.skip_ws();
            let key_at = self.pos;
            let key = self.key()?;
            self.expect(b':')?;
            let value = self.value(depth + 1)?;
            if map.insert(key.clone(), value).is_some() {
                return Err(self.error(key_at, format!("duplicate key '{key}'")));
            }
            self.skip_ws();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b'}') => {
                    self.pos += 1;
                    return Ok(Value::Map(map));
                }
                _ => return Err(self.error(self.pos, "expected ',' or '}'")),
            }
        }
    }

    fn key(&mut self) -> Result<String, CodecError> {
        match self.peek() {
            Some(b'`') => {
                let open = self.pos;
                self.pos += 1;
                let mut out = String::new();
                loop {
                    let rest = &self.src[self.pos..];
                    let Some(ch) = rest.chars().next() else {
                        return Err(self.error(open, "unterminated quoted key"));
                    };
                    self.pos += ch.len_utf8();
                    if ch == '`' {
                        if self.peek() == Some(b'`') {
                            self.pos += 1;
                            out.push('`');
                        } else {
                            return Ok(out);
                        }
                    } else {
                        out.push(ch);
                    }
                }
            }
            Some(b) if b.is_ascii_alphabetic() || b == b'_' => Ok(self.identifier().to_string()),
            _ => Err(self.error(self.pos, "expected a map key")),
        }
    }
}
