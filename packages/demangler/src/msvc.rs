use std::sync::LazyLock;

use regex::Regex;

use crate::node::{CtorKind, DtorKind};
use crate::{Cursor, Node};

/// Decode the name portion of an MSVC mangled symbol (the `?` scheme).
///
/// Only names are decoded: identifier fragments, constructors, destructors,
/// and operator codes. Templated names, numbered namespaces, substitution
/// references, and the data/function encoding tails are recognized but not
/// decoded; symbols that need them return `Ok(None)`.
pub fn demangle_msvc(raw: &str) -> cu::Result<Option<Node>> {
    let mut cursor = Cursor::new(raw);
    cursor.accept("@");
    if !cursor.accept("?") {
        return Ok(None);
    }
    parse_encoding(&mut cursor)
}

static FRAGMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]+@").unwrap());

static HEX_RUN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-P]+@").unwrap());

fn operator_symbol(code: &str) -> Option<&'static str> {
    Some(match code {
        "2" => "new",
        "_U" => "new[]",
        "3" => "delete",
        "_V" => "delete[]",
        "4" => "=",
        "5" => ">>",
        "6" => "<<",
        "7" => "!",
        "8" => "==",
        "9" => "!=",
        "A" => "[]",
        // emitted by MSVC for some compiler-generated members
        "B" => "returntype",
        "C" => "->",
        "D" => "*",
        "E" => "++",
        "F" => "--",
        "G" => "-",
        "H" => "+",
        "I" => "&",
        "J" => "->*",
        "K" => "/",
        "L" => "%",
        "M" => "<",
        "N" => "<=",
        "O" => ">",
        "P" => ">=",
        "Q" => ",",
        "R" => "()",
        "S" => "~",
        "T" => "^",
        "U" => "|",
        "V" => "&&",
        "W" => "||",
        "X" => "*=",
        "Y" => "+=",
        "Z" => "-=",
        "_0" => "/=",
        "_1" => "%=",
        "_2" => ">>=",
        "_3" => "<<=",
        "_4" => "&=",
        "_5" => "|=",
        "_6" => "^=",
        _ => return None,
    })
}

/// `?`-prefixed special name: `0` constructor, `1` destructor, or an
/// operator code (one character, or two with a leading underscore)
fn parse_special_name(cursor: &mut Cursor) -> Option<Node> {
    if cursor.accept("0") {
        return Some(Node::Ctor(CtorKind::Complete));
    }
    if cursor.accept("1") {
        return Some(Node::Dtor(DtorKind::Complete));
    }
    let code = if cursor.starts_with("_") {
        cursor.advance(2)?
    } else {
        cursor.advance(1)?
    };
    let sym = operator_symbol(code)?;
    Some(Node::Oper(sym.to_string()))
}

/// Name fragments come innermost-first and are flipped to source order
/// only once the terminating `@` is reached
fn parse_name(cursor: &mut Cursor) -> cu::Result<Option<Node>> {
    let mut nodes = Vec::new();

    if let Some(caps) = cursor.match_re(&FRAGMENT_RE) {
        let fragment = &caps[0];
        nodes.push(Node::name(&fragment[..fragment.len() - 1]));
    } else if cursor.starts_with("?$") {
        // templated name, not decoded
        return Ok(None);
    } else if cursor.accept("?") {
        let Some(node) = parse_special_name(cursor) else {
            return Ok(None);
        };
        nodes.push(node);
    } else {
        return Ok(None);
    }

    while !cursor.accept("@") {
        let Some(caps) = cursor.match_re(&FRAGMENT_RE) else {
            // templated names, numbered namespaces, and substitution
            // references can appear here; none are decoded
            return Ok(None);
        };
        let fragment = &caps[0];
        nodes.push(Node::name(&fragment[..fragment.len() - 1]));
    }

    nodes.reverse();
    if nodes.len() == 1 {
        return Ok(nodes.pop());
    }
    Ok(Some(Node::QualName(nodes)))
}

fn parse_encoding(cursor: &mut Cursor) -> cu::Result<Option<Node>> {
    let Some(name) = parse_name(cursor)? else {
        return Ok(None);
    };
    if cursor.at_end() {
        return Ok(Some(name));
    }
    match cursor.peek() {
        // data and function encodings are recognized but not decoded; the
        // name on its own is still the useful part
        Some(c) if c.is_ascii_digit() || c.is_ascii_uppercase() => {
            let _ = cursor.advance(1);
            Ok(Some(name))
        }
        _ => Ok(None),
    }
}

/// Decode an MSVC encoded number: `@` is zero, a single digit is that digit
/// plus one, and a run of `A`..`P` terminated by `@` is base 16 with `A` as
/// zero. A leading `?` negates.
pub fn decode_number(cursor: &mut Cursor) -> Option<i64> {
    let negative = cursor.accept("?");
    let num = if cursor.accept("@") {
        0
    } else if matches!(cursor.peek(), Some('0'..='9')) {
        let digit = cursor.advance(1)?;
        cu::parse::<i64>(digit).ok()? + 1
    } else {
        let caps = cursor.match_re(&HEX_RUN_RE)?;
        let run = &caps[0];
        decode_hex_run(&run[..run.len() - 1])?
    };
    Some(if negative { -num } else { num })
}

fn decode_hex_run(run: &str) -> Option<i64> {
    let mut num: i64 = 0;
    for b in run.bytes() {
        if !(b'A'..=b'P').contains(&b) {
            return None;
        }
        num = num.checked_mul(16)?.checked_add(i64::from(b - b'A'))?;
    }
    Some(num)
}

fn special_char(digit: u8) -> Option<char> {
    Some(match digit {
        b'0' => ',',
        b'1' => '/',
        b'2' => '\\',
        b'3' => ':',
        b'4' => '.',
        b'5' => ' ',
        b'6' => '\x0B',
        b'7' => '\n',
        b'8' => '\'',
        b'9' => '-',
        _ => return None,
    })
}

/// Decode one character of an MSVC encoded string: `?$` plus two `A`..`P`
/// nibbles spells a byte, `?` plus a digit is a punctuation sigil, `?` plus
/// a letter is that letter's offset from `A` moved past 127, and anything
/// else stands for itself.
pub fn decode_char(cursor: &mut Cursor) -> Option<char> {
    if cursor.accept("?$") {
        let pair = cursor.advance(2)?;
        let value = decode_hex_run(pair)?;
        return u8::try_from(value).ok().map(char::from);
    }
    if cursor.accept("?") {
        let b = cursor.advance(1)?.bytes().next()?;
        if b.is_ascii_digit() {
            return special_char(b);
        }
        return char::from_u32(u32::from(b.checked_sub(b'A')?) + 128);
    }
    cursor.advance(1)?.chars().next()
}
