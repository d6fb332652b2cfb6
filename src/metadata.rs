//! Metadata encoding shared by the chunk and vector stores.
//!
//! Metadata is stored as canonical JSON text. Older deployments stored the
//! Python `str(dict)` rendering instead, so decoding falls back to a
//! permissive structural-literal parse when JSON parsing fails. Decoding
//! never errors: anything unreadable, and anything that is not a mapping,
//! collapses to an empty map so a corrupt metadata blob cannot block
//! retrieval of the surrounding record.

use serde_json::{Map, Number, Value};

use crate::document::Metadata;

/// Encode metadata for storage. `None` encodes as `"{}"`.
pub fn serialize_metadata(metadata: Option<&Metadata>) -> String {
    match metadata {
        Some(map) => Value::Object(map.clone()).to_string(),
        None => "{}".to_string(),
    }
}

/// Decode stored metadata, tolerating the legacy non-JSON encoding.
pub fn deserialize_metadata(raw: Option<&str>) -> Metadata {
    let Some(raw) = raw else {
        return Metadata::new();
    };
    if raw.trim().is_empty() {
        return Metadata::new();
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => map,
        Ok(_) => Metadata::new(),
        Err(_) => match parse_literal(raw.trim()) {
            Some(Value::Object(map)) => map,
            _ => Metadata::new(),
        },
    }
}

/// Parse a Python-style structural literal: single- or double-quoted
/// strings, `True`/`False`/`None`, ints, floats, and nested
/// dicts/lists/tuples. Tuples decode as arrays. Returns `None` on anything
/// it does not recognize.
fn parse_literal(input: &str) -> Option<Value> {
    let mut parser = LiteralParser::new(input);
    let value = parser.value()?;
    parser.skip_ws();
    parser.rest().is_empty().then_some(value)
}

struct LiteralParser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> LiteralParser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(|c| c.is_whitespace()) {
            self.bump();
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, word: &str) -> bool {
        if self.rest().starts_with(word) {
            self.pos += word.len();
            true
        } else {
            false
        }
    }

    fn value(&mut self) -> Option<Value> {
        self.skip_ws();
        match self.peek()? {
            '{' => self.dict(),
            '[' => self.sequence(']'),
            '(' => self.sequence(')'),
            '\'' | '"' => self.string().map(Value::String),
            'T' | 'F' | 'N' => self.keyword(),
            c if c == '-' || c == '+' || c == '.' || c.is_ascii_digit() => self.number(),
            _ => None,
        }
    }

    fn keyword(&mut self) -> Option<Value> {
        if self.eat_keyword("True") {
            Some(Value::Bool(true))
        } else if self.eat_keyword("False") {
            Some(Value::Bool(false))
        } else if self.eat_keyword("None") {
            Some(Value::Null)
        } else {
            None
        }
    }

    fn dict(&mut self) -> Option<Value> {
        self.bump();
        let mut map = Map::new();
        self.skip_ws();
        if self.eat('}') {
            return Some(Value::Object(map));
        }
        loop {
            self.skip_ws();
            let key = match self.peek()? {
                '\'' | '"' => self.string()?,
                _ => return None,
            };
            self.skip_ws();
            if !self.eat(':') {
                return None;
            }
            let value = self.value()?;
            map.insert(key, value);
            self.skip_ws();
            if self.eat(',') {
                self.skip_ws();
                if self.eat('}') {
                    return Some(Value::Object(map));
                }
                continue;
            }
            if self.eat('}') {
                return Some(Value::Object(map));
            }
            return None;
        }
    }

    fn sequence(&mut self, close: char) -> Option<Value> {
        self.bump();
        let mut items = Vec::new();
        self.skip_ws();
        if self.eat(close) {
            return Some(Value::Array(items));
        }
        loop {
            items.push(self.value()?);
            self.skip_ws();
            if self.eat(',') {
                self.skip_ws();
                if self.eat(close) {
                    return Some(Value::Array(items));
                }
                continue;
            }
            if self.eat(close) {
                return Some(Value::Array(items));
            }
            return None;
        }
    }

    fn string(&mut self) -> Option<String> {
        let quote = self.bump()?;
        let mut out = String::new();
        loop {
            match self.bump()? {
                '\\' => {
                    let escaped = self.bump()?;
                    out.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        '0' => '\0',
                        other => other,
                    });
                }
                c if c == quote => return Some(out),
                c => out.push(c),
            }
        }
    }

    fn number(&mut self) -> Option<Value> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E' | '_'))
        {
            self.bump();
        }
        let text = self.input[start..self.pos].replace('_', "");
        if let Ok(n) = text.parse::<i64>() {
            return Some(Value::Number(n.into()));
        }
        text.parse::<f64>().ok().and_then(Number::from_f64).map(Value::Number)
    }
}
