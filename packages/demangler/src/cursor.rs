use regex::{Captures, Regex};

use crate::Node;

/// Positioned view over a mangled symbol, plus the substitution table for
/// the parse that owns it.
///
/// A cursor is created per symbol and discarded when the parse returns;
/// nothing is shared between parses. Every operation that can fail leaves
/// the position untouched, so a caller can always tell "did not advance"
/// apart from partial consumption.
pub struct Cursor<'a> {
    raw: &'a str,
    pos: usize,
    substs: Vec<Node>,
}

impl<'a> Cursor<'a> {
    pub fn new(raw: &'a str) -> Self {
        Self {
            raw,
            pos: 0,
            substs: Vec::new(),
        }
    }

    pub fn at_end(&self) -> bool {
        self.pos == self.raw.len()
    }

    /// Next character, without consuming it
    pub fn peek(&self) -> Option<char> {
        self.raw[self.pos..].chars().next()
    }

    /// Whether the remaining input begins with `prefix`, without consuming it
    pub fn starts_with(&self, prefix: &str) -> bool {
        self.raw[self.pos..].starts_with(prefix)
    }

    /// Consume `literal` if it is next, otherwise stay put
    pub fn accept(&mut self, literal: &str) -> bool {
        if self.starts_with(literal) {
            self.pos += literal.len();
            return true;
        }
        false
    }

    /// Consume exactly `amount` bytes. Returns None without advancing if
    /// fewer remain (or the cut would split a character).
    pub fn advance(&mut self, amount: usize) -> Option<&'a str> {
        let result = self.raw.get(self.pos..self.pos + amount)?;
        self.pos += amount;
        Some(result)
    }

    /// Consume up to and including the next `delim`, returning the bytes
    /// before it. Returns None without advancing if `delim` does not occur.
    pub fn advance_until(&mut self, delim: &str) -> Option<&'a str> {
        let raw = self.raw;
        let offset = raw[self.pos..].find(delim)?;
        let result = &raw[self.pos..self.pos + offset];
        self.pos += offset + delim.len();
        Some(result)
    }

    /// Anchored regex match at the current position. `pattern` must be
    /// `^`-anchored; on a match the cursor advances past it and the capture
    /// groups are returned.
    pub fn match_re(&mut self, pattern: &Regex) -> Option<Captures<'a>> {
        let raw = self.raw;
        let caps = pattern.captures(&raw[self.pos..])?;
        let end = caps.get(0).map(|m| m.end()).unwrap_or(0);
        self.pos += end;
        Some(caps)
    }

    /// Record `node` in the substitution table, unless a structurally equal
    /// node is already there. Parsers call this unconditionally after
    /// certain derivations; the dedupe keeps sequence ids aligned.
    pub fn add_subst(&mut self, node: Node) {
        if !self.substs.contains(&node) {
            self.substs.push(node);
        }
    }

    /// Look up a previously recorded substitution by sequence id
    pub fn resolve_subst(&self, seq_id: usize) -> Option<Node> {
        self.substs.get(seq_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::LazyLock;

    static DIGITS_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^(\d+)").unwrap());

    #[test]
    fn test_accept() {
        let mut cursor = Cursor::new("_Z3foo");
        assert!(!cursor.accept("_X"));
        assert!(cursor.accept("_Z"));
        assert!(cursor.starts_with("3foo"));
        assert!(!cursor.at_end());
    }

    #[test]
    fn test_advance_past_end() {
        let mut cursor = Cursor::new("ab");
        assert_eq!(cursor.advance(3), None);
        // failed advance must not move
        assert_eq!(cursor.advance(2), Some("ab"));
        assert!(cursor.at_end());
    }

    #[test]
    fn test_advance_until() {
        let mut cursor = Cursor::new("12_rest");
        assert_eq!(cursor.advance_until("x"), None);
        assert_eq!(cursor.advance_until("_"), Some("12"));
        assert_eq!(cursor.advance_until("_"), None);
        assert!(cursor.starts_with("rest"));
    }

    #[test]
    fn test_match_re_is_anchored() {
        let mut cursor = Cursor::new("ab12");
        assert!(cursor.match_re(&DIGITS_RE).is_none());
        assert!(cursor.accept("ab"));
        let caps = cursor.match_re(&DIGITS_RE).expect("digits");
        assert_eq!(&caps[1], "12");
        assert!(cursor.at_end());
    }

    #[test]
    fn test_subst_dedupe() {
        let mut cursor = Cursor::new("");
        cursor.add_subst(Node::Name("foo".to_string()));
        cursor.add_subst(Node::Name("bar".to_string()));
        cursor.add_subst(Node::Name("foo".to_string()));
        assert_eq!(cursor.resolve_subst(0), Some(Node::Name("foo".to_string())));
        assert_eq!(cursor.resolve_subst(1), Some(Node::Name("bar".to_string())));
        assert_eq!(cursor.resolve_subst(2), None);
    }
}
