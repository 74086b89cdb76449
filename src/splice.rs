//! Range replacement directives.
//!
//! A directive has the form `FROM,TO:TEXT` (replace runes `[FROM, TO)` with
//! `TEXT`) or `AT:TEXT` (insert `TEXT` at `AT`). `TEXT` understands the
//! escapes `\n`, `\t` and `\\`.

use std::str::FromStr;

use thiserror::Error;

use crate::address::Address;
use crate::error::Result;
use crate::runes::Runes;
use crate::store::Slots;

/// A single "replace this range" edit in rune units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Splice {
    pub at: Address,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpliceParseError {
    #[error("missing ':' between address and text in {0:?}")]
    MissingText(String),
    #[error("bad offset {0:?}")]
    BadOffset(String),
    #[error("unknown escape \\{0}")]
    BadEscape(char),
}

impl Splice {
    /// Apply the edit to `runes`, returning the runes written.
    ///
    /// # Errors
    /// Returns an address error if the range does not fit the buffer.
    pub fn apply<S: Slots>(&self, runes: &mut Runes<S>) -> Result<usize> {
        let text: Vec<char> = self.text.chars().collect();
        runes.put(&text, self.at)
    }
}

impl FromStr for Splice {
    type Err = SpliceParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, text) = s
            .split_once(':')
            .ok_or_else(|| SpliceParseError::MissingText(s.to_string()))?;
        let at = match addr.split_once(',') {
            Some((from, to)) => Address::new(parse_offset(from)?, parse_offset(to)?),
            None => Address::point(parse_offset(addr)?),
        };
        Ok(Self {
            at,
            text: unescape(text)?,
        })
    }
}

fn parse_offset(s: &str) -> Result<i64, SpliceParseError> {
    s.trim()
        .parse()
        .map_err(|_| SpliceParseError::BadOffset(s.to_string()))
}

fn unescape(s: &str) -> Result<String, SpliceParseError> {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('\\') | None => out.push('\\'),
            Some(other) => return Err(SpliceParseError::BadEscape(other)),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_range_directive() {
        let s: Splice = "3,7:hello".parse().unwrap();
        assert_eq!(s.at, Address::new(3, 7));
        assert_eq!(s.text, "hello");
    }

    #[test]
    fn test_parse_point_directive_keeps_colons_in_text() {
        let s: Splice = "0:a:b".parse().unwrap();
        assert_eq!(s.at, Address::point(0));
        assert_eq!(s.text, "a:b");
    }

    #[test]
    fn test_parse_escapes() {
        let s: Splice = "1,1:line\\nnext\\t\\\\".parse().unwrap();
        assert_eq!(s.text, "line\nnext\t\\");
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            "12".parse::<Splice>(),
            Err(SpliceParseError::MissingText("12".to_string()))
        );
        assert_eq!(
            "x,2:t".parse::<Splice>(),
            Err(SpliceParseError::BadOffset("x".to_string()))
        );
        assert_eq!(
            "0:\\q".parse::<Splice>(),
            Err(SpliceParseError::BadEscape('q'))
        );
    }

    #[test]
    fn test_apply_replaces_runes() {
        let mut runes = Runes::new(4);
        runes.read_from("hello world".as_bytes()).unwrap();
        let s: Splice = "6,11:世界".parse().unwrap();
        assert_eq!(s.apply(&mut runes).unwrap(), 2);
        let text: String = runes.get(Address::new(0, runes.size())).unwrap().into_iter().collect();
        assert_eq!(text, "hello 世界");
    }

    #[test]
    fn test_apply_out_of_range_fails() {
        let mut runes = Runes::new(4);
        let s: Splice = "0,1:x".parse().unwrap();
        assert_eq!(s.apply(&mut runes).unwrap_err().address(), Some(Address::new(0, 1)));
    }
}
