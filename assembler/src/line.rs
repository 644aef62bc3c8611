//! Splits one line of assembly source into its fields.
//!
//! A code line has the layout the disassembler prints:
//!
//! ```text
//! [lineno] ['>>'] [offset] OPNAME [arg ['(' display ')']]
//! ```
//!
//! A lone integer before the opcode is the offset, two are the line number
//! then the offset. The parser knows nothing about opcodes; whether an
//! argument is required is checked later.

use crate::literal::parse_constant_prefix;

/// One parsed source line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceLine<'a> {
    Blank,
    Label(&'a str),
    Code(CodeLine<'a>),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CodeLine<'a> {
    /// Line number as written, if any.
    pub line_number: Option<u32>,
    pub jump_target: bool,
    /// Offset as written, if any.
    pub offset: Option<usize>,
    pub opname: &'a str,
    pub arg: Option<&'a str>,
    /// Text inside the trailing parentheses.
    pub display: Option<&'a str>,
}

pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// Whether `s` is an integer token (`-?[0-9]+`).
pub fn is_integer(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

pub fn parse_line(text: &str) -> Result<SourceLine<'_>, String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(SourceLine::Blank);
    }

    // a label is one token followed by the colon; anything longer may be a
    // code line whose argument ends in ':'
    if let Some(name) = trimmed.strip_suffix(':') {
        let name = name.trim_end();
        if !name.contains(char::is_whitespace) {
            return if is_identifier(name) {
                Ok(SourceLine::Label(name))
            } else {
                Err(format!("invalid label name '{name}'"))
            };
        }
    }

    parse_code(trimmed).map(SourceLine::Code)
}

/// Split off the next whitespace-delimited token.
fn next_token(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start();
    if s.is_empty() {
        return None;
    }
    let end = s.find(char::is_whitespace).unwrap_or(s.len());
    Some((&s[..end], &s[end..]))
}

fn parse_code(text: &str) -> Result<CodeLine<'_>, String> {
    let mut numbers: Vec<&str> = Vec::with_capacity(2);
    let mut jump_target = false;
    let mut rest = text;

    let opname = loop {
        let Some((token, after)) = next_token(rest) else {
            return Err("missing opcode".into());
        };
        rest = after;

        if token == ">>" {
            if jump_target || numbers.len() == 2 {
                return Err("misplaced '>>'".into());
            }
            jump_target = true;
        } else if token.bytes().all(|b| b.is_ascii_digit()) {
            if numbers.len() == 2 {
                return Err(format!("unexpected number '{token}' before opcode"));
            }
            numbers.push(token);
        } else if is_identifier(token) {
            break token;
        } else {
            return Err(format!("expected an opcode name, found '{token}'"));
        }
    };

    let (line_number, offset) = match numbers.as_slice() {
        [] => (None, None),
        [offset] => (None, Some(*offset)),
        [line, offset] => (Some(*line), Some(*offset)),
        _ => return Err("too many numbers before opcode".into()),
    };
    let line_number = line_number
        .map(|n| n.parse::<u32>().map_err(|_| format!("line number '{n}' is too large")))
        .transpose()?;
    let offset = offset
        .map(|n| n.parse::<usize>().map_err(|_| format!("offset '{n}' is too large")))
        .transpose()?;

    let rest = rest.trim_start();
    let (arg, rest) = if rest.is_empty() {
        (None, rest)
    } else if rest.starts_with('(') {
        return Err("display text without an argument".into());
    } else if let Some(literal) = rest.strip_prefix('#') {
        let (_, len) = parse_constant_prefix(literal).map_err(|e| format!("bad literal: {e}"))?;
        let end = 1 + len;
        (Some(&rest[..end]), &rest[end..])
    } else {
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        (Some(&rest[..end]), &rest[end..])
    };

    let rest = rest.trim();
    let display = if rest.is_empty() {
        None
    } else if let Some(inner) = rest.strip_prefix('(').and_then(|r| r.strip_suffix(')')) {
        Some(inner)
    } else {
        return Err(format!("unexpected text after argument: '{rest}'"));
    };

    Ok(CodeLine {
        line_number,
        jump_target,
        offset,
        opname,
        arg,
        display,
    })
}
