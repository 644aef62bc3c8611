//! Parser for the constant literals written after `#` in a `LOAD_CONST`
//! argument.
//!
//! The grammar is closed: integers (decimal, `0x`, `0o`, `0b`, optional sign,
//! `_` separators), floats (`1.5`, `1e3`, `.5`, `inf`, `nan`), strings and
//! byte strings in single or double quotes, `None`, `True`, `False`, and
//! tuples of any of these.

use bytecode::Constant;

/// Parse `text` as exactly one literal.
pub fn parse_constant(text: &str) -> Result<Constant, String> {
    let mut parser = LiteralParser::new(text);
    let value = parser.value()?;
    parser.skip_ws();
    if !parser.at_end() {
        return Err(format!("unexpected text after literal: {}", parser.rest()));
    }
    Ok(value)
}

/// Parse one literal at the start of `text`, returning it with the number of
/// bytes it occupies. Text after the literal is left alone.
pub fn parse_constant_prefix(text: &str) -> Result<(Constant, usize), String> {
    let mut parser = LiteralParser::new(text);
    let value = parser.value()?;
    Ok((value, parser.pos))
}

struct LiteralParser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> LiteralParser<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn value(&mut self) -> Result<Constant, String> {
        match self.peek() {
            None => Err("empty literal".into()),
            Some('(') => self.tuple(),
            Some(q @ ('\'' | '"')) => {
                self.bump();
                self.string(q).map(Constant::Str)
            }
            Some('b') if matches!(self.rest().as_bytes().get(1), Some(b'\'' | b'"')) => {
                self.bump();
                let q = self.bump().unwrap_or('\'');
                self.bytes(q).map(Constant::Bytes)
            }
            Some(c) if c.is_ascii_digit() || matches!(c, '+' | '-' | '.') => self.number(),
            Some(c) if c.is_alphabetic() || c == '_' => self.word(),
            Some(c) => Err(format!("unexpected character {c:?} in literal")),
        }
    }

    fn tuple(&mut self) -> Result<Constant, String> {
        self.eat('(');
        let mut items = Vec::new();
        let mut saw_comma = false;
        loop {
            self.skip_ws();
            if self.eat(')') {
                break;
            }
            items.push(self.value()?);
            self.skip_ws();
            if self.eat(',') {
                saw_comma = true;
                continue;
            }
            if self.eat(')') {
                break;
            }
            return Err("expected ',' or ')' in tuple".into());
        }

        // `(x)` is just a parenthesised `x`
        if items.len() == 1 && !saw_comma {
            return Ok(items.remove(0));
        }
        Ok(Constant::Tuple(items))
    }

    fn word(&mut self) -> Result<Constant, String> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_alphanumeric() || c == '_') {
            self.bump();
        }
        match &self.src[start..self.pos] {
            "None" => Ok(Constant::None),
            "True" => Ok(Constant::Bool(true)),
            "False" => Ok(Constant::Bool(false)),
            "inf" => Ok(Constant::Float(f64::INFINITY)),
            "nan" => Ok(Constant::Float(f64::NAN)),
            other => Err(format!("unknown literal name '{other}'")),
        }
    }

    fn number(&mut self) -> Result<Constant, String> {
        let start = self.pos;
        let negative = if self.eat('-') {
            true
        } else {
            self.eat('+');
            false
        };
        let digits_start = self.pos;

        if self.peek().is_some_and(char::is_alphabetic) {
            return match self.word()? {
                Constant::Float(f) if negative => Ok(Constant::Float(-f)),
                c @ Constant::Float(_) => Ok(c),
                _ => Err(format!("invalid number '{}'", &self.src[start..self.pos])),
            };
        }

        let radix = match self.rest().get(..2).map(str::to_ascii_lowercase).as_deref() {
            Some("0x") => 16,
            Some("0o") => 8,
            Some("0b") => 2,
            _ => 10,
        };

        if radix != 10 {
            self.pos += 2;
            let body_start = self.pos;
            while self.peek().is_some_and(|c| c.is_ascii_alphanumeric() || c == '_') {
                self.bump();
            }
            let body = self.src[body_start..self.pos].replace('_', "");
            let magnitude = i128::from_str_radix(&body, radix)
                .map_err(|_| format!("invalid integer '{}'", &self.src[start..self.pos]))?;
            return signed_int(if negative { -magnitude } else { magnitude }, &self.src[start..self.pos]);
        }

        let mut is_float = false;
        self.digits();
        if self.peek() == Some('.') {
            is_float = true;
            self.bump();
            self.digits();
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            is_float = true;
            self.bump();
            if !self.eat('+') {
                self.eat('-');
            }
            self.digits();
        }

        let text = &self.src[start..self.pos];
        let cleaned = self.src[digits_start..self.pos].replace('_', "");
        if cleaned.is_empty() || cleaned == "." {
            return Err(format!("invalid number '{text}'"));
        }

        if is_float {
            let value: f64 = cleaned
                .parse()
                .map_err(|_| format!("invalid float '{text}'"))?;
            Ok(Constant::Float(if negative { -value } else { value }))
        } else {
            let magnitude: i128 = cleaned
                .parse()
                .map_err(|_| format!("invalid integer '{text}'"))?;
            signed_int(if negative { -magnitude } else { magnitude }, text)
        }
    }

    fn digits(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_digit() || c == '_') {
            self.bump();
        }
    }

    fn string(&mut self, quote: char) -> Result<String, String> {
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err("unterminated string literal".into()),
                Some(c) if c == quote => return Ok(out),
                Some('\\') => out.push(self.escape(false)?),
                Some(c) => out.push(c),
            }
        }
    }

    fn bytes(&mut self, quote: char) -> Result<Vec<u8>, String> {
        let mut out = Vec::new();
        loop {
            match self.bump() {
                None => return Err("unterminated bytes literal".into()),
                Some(c) if c == quote => return Ok(out),
                Some('\\') => out.push(self.escape(true)? as u8),
                Some(c) if c.is_ascii() => out.push(c as u8),
                Some(c) => return Err(format!("non-ASCII character {c:?} in bytes literal")),
            }
        }
    }

    fn escape(&mut self, in_bytes: bool) -> Result<char, String> {
        let c = self.bump().ok_or("unterminated escape sequence")?;
        Ok(match c {
            '\\' | '\'' | '"' => c,
            'n' => '\n',
            'r' => '\r',
            't' => '\t',
            '0' => '\0',
            'x' => self.hex_escape(2)?,
            'u' if !in_bytes => self.hex_escape(4)?,
            'U' if !in_bytes => self.hex_escape(8)?,
            other => return Err(format!("unknown escape sequence \\{other}")),
        })
    }

    fn hex_escape(&mut self, len: usize) -> Result<char, String> {
        let digits = self
            .rest()
            .get(..len)
            .filter(|d| d.chars().all(|c| c.is_ascii_hexdigit()))
            .ok_or_else(|| format!("escape needs {len} hex digits"))?;
        self.pos += len;
        u32::from_str_radix(digits, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| format!("invalid character escape {digits}"))
    }
}

fn signed_int(value: i128, text: &str) -> Result<Constant, String> {
    i64::try_from(value)
        .map(Constant::Int)
        .map_err(|_| format!("integer '{text}' does not fit in 64 bits"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(text: &str) -> Constant {
        parse_constant(text).unwrap()
    }

    #[test]
    fn integers() {
        assert_eq!(lit("0"), Constant::Int(0));
        assert_eq!(lit("-17"), Constant::Int(-17));
        assert_eq!(lit("+5"), Constant::Int(5));
        assert_eq!(lit("1_000"), Constant::Int(1000));
        assert_eq!(lit("0x1F"), Constant::Int(31));
        assert_eq!(lit("-0o17"), Constant::Int(-15));
        assert_eq!(lit("0b101"), Constant::Int(5));
        assert_eq!(lit("-9223372036854775808"), Constant::Int(i64::MIN));
        assert!(parse_constant("9223372036854775808").is_err());
        assert!(parse_constant("0xZZ").is_err());
    }

    #[test]
    fn floats() {
        assert_eq!(lit("1.5"), Constant::Float(1.5));
        assert_eq!(lit(".5"), Constant::Float(0.5));
        assert_eq!(lit("1e3"), Constant::Float(1000.0));
        assert_eq!(lit("1e+16"), Constant::Float(1e16));
        assert_eq!(lit("2.5E-3"), Constant::Float(0.0025));
        assert_eq!(lit("-inf"), Constant::Float(f64::NEG_INFINITY));
        assert_eq!(lit("nan"), Constant::Float(f64::NAN));
        assert!(parse_constant(".").is_err());
    }

    #[test]
    fn keywords() {
        assert_eq!(lit("None"), Constant::None);
        assert_eq!(lit("True"), Constant::Bool(true));
        assert_eq!(lit("False"), Constant::Bool(false));
        assert!(parse_constant("none").is_err());
    }

    #[test]
    fn strings_and_escapes() {
        assert_eq!(lit("'hi there'"), Constant::from("hi there"));
        assert_eq!(lit("\"it's\""), Constant::from("it's"));
        assert_eq!(lit(r"'a\nb\t\\\''"), Constant::from("a\nb\t\\'"));
        assert_eq!(lit(r"'\x41é\0'"), Constant::from("A\u{e9}\0"));
        assert_eq!(lit(r"b'a\xff'"), Constant::Bytes(vec![b'a', 0xff]));
        assert!(parse_constant("'open").is_err());
        assert!(parse_constant(r"'\q'").is_err());
        assert!(parse_constant("b'\u{e9}'").is_err());
    }

    #[test]
    fn tuples() {
        assert_eq!(lit("()"), Constant::Tuple(vec![]));
        assert_eq!(lit("(1,)"), Constant::Tuple(vec![Constant::Int(1)]));
        assert_eq!(lit("(1)"), Constant::Int(1));
        assert_eq!(
            lit("(1, 'a b', (None, 2.0))"),
            Constant::Tuple(vec![
                Constant::Int(1),
                Constant::from("a b"),
                Constant::Tuple(vec![Constant::None, Constant::Float(2.0)]),
            ])
        );
        assert!(parse_constant("(1, 2").is_err());
        assert!(parse_constant("(1 2)").is_err());
    }

    #[test]
    fn reprs_parse_back() {
        let values = [
            Constant::Float(1e16),
            Constant::Float(-1.5e-5),
            Constant::from("quote's \"both\"\n"),
            Constant::Bytes(vec![0, b'"', 0x7f]),
            Constant::Tuple(vec![Constant::Tuple(vec![Constant::None])]),
        ];
        for value in values {
            assert_eq!(parse_constant(&value.repr()), Ok(value));
        }
    }

    #[test]
    fn prefix_stops_after_literal() {
        let (value, len) = parse_constant_prefix("(1, 2) (two)").unwrap();
        assert_eq!(value, Constant::Tuple(vec![Constant::Int(1), Constant::Int(2)]));
        assert_eq!(len, 6);
        assert!(parse_constant("1 2").is_err());
    }
}
