//! Pattern DSL compiler.

use super::{Atom, Pattern};
use thiserror::Error;

/// Upper bound on the unrolled length of one pattern.
const MAX_PATTERN_LENGTH: usize = 0x10000;

/// Reason a pattern failed to compile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SyntaxErrorKind {
    /// Pattern (or a group) contains no positions.
    #[error("empty pattern")]
    Empty,
    /// `(` without `)` or `)` without `(`.
    #[error("unbalanced group")]
    UnbalancedGroup,
    /// Quantifier or skip count is not a positive decimal number.
    #[error("invalid quantifier")]
    InvalidQuantifier,
    /// Character is neither a hex digit nor the `x` wildcard.
    #[error("invalid nibble")]
    InvalidNibble,
    /// Character in a `%` bit mask is not `0`, `1` or `x`.
    #[error("invalid bit")]
    InvalidBit,
    /// Range bounds contain wildcards or are reversed.
    #[error("invalid range")]
    InvalidRange,
    /// `&` or `|` with nothing after it.
    #[error("dangling operator")]
    DanglingOperator,
    /// Character that cannot start a token.
    #[error("unexpected character")]
    UnexpectedCharacter,
    /// Input ended inside a token.
    #[error("unexpected end of pattern")]
    UnexpectedEnd,
    /// Unrolled pattern is longer than supported.
    #[error("pattern too long")]
    TooLong,
}

/// Compile failure with the byte offset of the offending input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid pattern at offset {offset}: {kind}")]
pub struct PatternSyntaxError {
    /// Byte offset into the pattern text.
    pub offset: usize,
    /// What went wrong.
    pub kind: SyntaxErrorKind,
}

type Result<T> = std::result::Result<T, PatternSyntaxError>;

/// Compile the textual pattern into a fixed-length [`Pattern`].
pub fn compile(text: &str) -> Result<Pattern> {
    let mut parser = Parser {
        text: text.as_bytes(),
        pos: 0,
    };
    let atoms = parser.sequence(None)?;
    if atoms.is_empty() {
        return Err(parser.error_at(0, SyntaxErrorKind::Empty));
    }
    Ok(Pattern::from_atoms(atoms))
}

struct Parser<'a> {
    text: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    /// Parse tokens until end of input (top level) or the `)` closing the group opened at `open`.
    fn sequence(&mut self, open: Option<usize>) -> Result<Vec<Atom>> {
        let mut atoms = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                None => {
                    return match open {
                        Some(start) => Err(self.error_at(start, SyntaxErrorKind::UnbalancedGroup)),
                        None => Ok(atoms),
                    };
                }
                Some(b')') => {
                    if open.is_none() {
                        return Err(self.error(SyntaxErrorKind::UnbalancedGroup));
                    }
                    self.pos += 1;
                    return Ok(atoms);
                }
                Some(b'(') => {
                    let start = self.pos;
                    self.pos += 1;
                    let group = self.sequence(Some(start))?;
                    if group.is_empty() {
                        return Err(self.error_at(start, SyntaxErrorKind::Empty));
                    }
                    let count = self.quantifier()?;
                    self.repeat_into(&mut atoms, &group, count)?;
                }
                Some(b'+') => {
                    let count = self.skip_count()?;
                    self.repeat_into(&mut atoms, &[Atom::Any], count)?;
                }
                Some(_) => {
                    let atom = self.alternation()?;
                    let count = self.quantifier()?;
                    self.repeat_into(&mut atoms, std::slice::from_ref(&atom), count)?;
                }
            }
        }
    }

    fn repeat_into(&self, atoms: &mut Vec<Atom>, group: &[Atom], count: usize) -> Result<()> {
        let total = group
            .len()
            .checked_mul(count)
            .and_then(|len| len.checked_add(atoms.len()))
            .filter(|&len| len <= MAX_PATTERN_LENGTH)
            .ok_or_else(|| self.error(SyntaxErrorKind::TooLong))?;
        atoms.reserve(total - atoms.len());
        for _ in 0..count {
            atoms.extend_from_slice(group);
        }
        Ok(())
    }

    /// Optional `{n}` suffix; absent means one repetition.
    fn quantifier(&mut self) -> Result<usize> {
        self.skip_whitespace();
        if self.peek() != Some(b'{') {
            return Ok(1);
        }
        self.pos += 1;
        let count = self.decimal()?;
        match self.peek() {
            Some(b'}') => {
                self.pos += 1;
                Ok(count)
            }
            Some(_) => Err(self.error(SyntaxErrorKind::InvalidQuantifier)),
            None => Err(self.error(SyntaxErrorKind::UnexpectedEnd)),
        }
    }

    /// `+n+` skip.
    fn skip_count(&mut self) -> Result<usize> {
        self.pos += 1;
        let count = self.decimal()?;
        match self.peek() {
            Some(b'+') => {
                self.pos += 1;
                Ok(count)
            }
            Some(_) => Err(self.error(SyntaxErrorKind::InvalidQuantifier)),
            None => Err(self.error(SyntaxErrorKind::UnexpectedEnd)),
        }
    }

    fn decimal(&mut self) -> Result<usize> {
        let start = self.pos;
        let mut value = 0usize;
        while let Some(ch @ b'0'..=b'9') = self.peek() {
            value = value
                .checked_mul(10)
                .and_then(|v| v.checked_add(usize::from(ch - b'0')))
                .ok_or_else(|| self.error_at(start, SyntaxErrorKind::TooLong))?;
            self.pos += 1;
        }
        if self.pos == start {
            return Err(match self.peek() {
                None => self.error(SyntaxErrorKind::UnexpectedEnd),
                Some(_) => self.error(SyntaxErrorKind::InvalidQuantifier),
            });
        }
        if value == 0 {
            return Err(self.error_at(start, SyntaxErrorKind::InvalidQuantifier));
        }
        Ok(value)
    }

    /// `conj ('|' conj)*`
    fn alternation(&mut self) -> Result<Atom> {
        let mut members = vec![self.conjunction()?];
        while self.operator(b'|')? {
            members.push(self.conjunction()?);
        }
        Ok(collapse(members, Atom::Disjunction))
    }

    /// `single ('&' single)*`
    fn conjunction(&mut self) -> Result<Atom> {
        let mut members = vec![self.single()?];
        while self.operator(b'&')? {
            members.push(self.single()?);
        }
        Ok(collapse(members, Atom::Conjunction))
    }

    /// Consume `op` (surrounded by optional whitespace) if it is next and a
    /// single-position atom follows it.
    fn operator(&mut self, op: u8) -> Result<bool> {
        let saved = self.pos;
        self.skip_whitespace();
        if self.peek() != Some(op) {
            self.pos = saved;
            return Ok(false);
        }
        let op_pos = self.pos;
        self.pos += 1;
        self.skip_whitespace();
        if !self.at_single_start() {
            return Err(self.error_at(op_pos, SyntaxErrorKind::DanglingOperator));
        }
        Ok(true)
    }

    fn at_single_start(&self) -> bool {
        matches!(
            self.peek(),
            Some(b'?' | b'%' | b'\'' | b'x' | b'X' | b'0'..=b'9' | b'a'..=b'f' | b'A'..=b'F')
        )
    }

    fn single(&mut self) -> Result<Atom> {
        match self.peek() {
            None => Err(self.error(SyntaxErrorKind::UnexpectedEnd)),
            Some(b'?') => {
                self.pos += 1;
                Ok(Atom::Any)
            }
            Some(b'%') => {
                self.pos += 1;
                self.bits()
            }
            Some(b'\'') => {
                self.pos += 1;
                match self.peek() {
                    None => Err(self.error(SyntaxErrorKind::UnexpectedEnd)),
                    Some(ch) if ch.is_ascii() => {
                        self.pos += 1;
                        Ok(Atom::exact(ch))
                    }
                    Some(_) => Err(self.error(SyntaxErrorKind::UnexpectedCharacter)),
                }
            }
            Some(_) if self.at_single_start() => self.hex_or_range(),
            Some(_) => Err(self.error(SyntaxErrorKind::UnexpectedCharacter)),
        }
    }

    fn bits(&mut self) -> Result<Atom> {
        let mut value = 0u8;
        let mut mask = 0u8;
        for _ in 0..8 {
            let (bit_value, bit_mask) = match self.peek() {
                None => return Err(self.error(SyntaxErrorKind::UnexpectedEnd)),
                Some(b'0') => (0, 1),
                Some(b'1') => (1, 1),
                Some(b'x' | b'X') => (0, 0),
                Some(_) => return Err(self.error(SyntaxErrorKind::InvalidBit)),
            };
            value = (value << 1) | bit_value;
            mask = (mask << 1) | bit_mask;
            self.pos += 1;
        }
        Ok(Atom::masked(value, mask))
    }

    fn hex_or_range(&mut self) -> Result<Atom> {
        let start = self.pos;
        let (value, mask) = self.hex_byte()?;
        if self.peek() != Some(b'-') {
            return Ok(Atom::masked(value, mask));
        }
        self.pos += 1;
        let (high, high_mask) = self.hex_byte()?;
        if mask != 0xff || high_mask != 0xff || value > high {
            return Err(self.error_at(start, SyntaxErrorKind::InvalidRange));
        }
        Ok(Atom::Range { low: value, high })
    }

    fn hex_byte(&mut self) -> Result<(u8, u8)> {
        let (hi, hi_mask) = self.nibble()?;
        let (lo, lo_mask) = self.nibble()?;
        Ok(((hi << 4) | lo, (hi_mask << 4) | lo_mask))
    }

    fn nibble(&mut self) -> Result<(u8, u8)> {
        let nibble = match self.peek() {
            None => return Err(self.error(SyntaxErrorKind::UnexpectedEnd)),
            Some(b'x' | b'X') => (0, 0),
            Some(ch @ b'0'..=b'9') => (ch - b'0', 0x0f),
            Some(ch @ b'a'..=b'f') => (ch - b'a' + 10, 0x0f),
            Some(ch @ b'A'..=b'F') => (ch - b'A' + 10, 0x0f),
            Some(_) => return Err(self.error(SyntaxErrorKind::InvalidNibble)),
        };
        self.pos += 1;
        Ok(nibble)
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(ch) if ch.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<u8> {
        self.text.get(self.pos).copied()
    }

    fn error(&self, kind: SyntaxErrorKind) -> PatternSyntaxError {
        self.error_at(self.pos, kind)
    }

    fn error_at(&self, offset: usize, kind: SyntaxErrorKind) -> PatternSyntaxError {
        PatternSyntaxError { offset, kind }
    }
}

fn collapse(mut members: Vec<Atom>, combine: fn(Vec<Atom>) -> Atom) -> Atom {
    if members.len() == 1 {
        members.remove(0)
    } else {
        combine(members)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind_of(text: &str) -> SyntaxErrorKind {
        compile(text).unwrap_err().kind
    }

    #[test]
    fn literal_chars_and_hex() {
        let pattern = compile("'Y'M 33 '!").unwrap();
        assert_eq!(
            pattern.atoms(),
            &[Atom::exact(b'Y'), Atom::exact(b'M'), Atom::exact(0x33), Atom::exact(b'!')]
        );
    }

    #[test]
    fn nibble_wildcards() {
        let pattern = compile("4x x5 xx").unwrap();
        assert_eq!(
            pattern.atoms(),
            &[Atom::masked(0x40, 0xf0), Atom::masked(0x05, 0x0f), Atom::Any]
        );
    }

    #[test]
    fn bit_masks() {
        let pattern = compile("%1x0xxxx1").unwrap();
        assert_eq!(pattern.atoms(), &[Atom::Masked { value: 0x81, mask: 0xa1 }]);
    }

    #[test]
    fn ranges_are_single_positions() {
        let pattern = compile("20-7f 00").unwrap();
        assert_eq!(pattern.atoms()[0], Atom::Range { low: 0x20, high: 0x7f });
        assert_eq!(pattern.min_length(), 2);
    }

    #[test]
    fn groups_and_quantifiers_unroll() {
        let pattern = compile("(01 ?){3} ff{2}").unwrap();
        assert_eq!(pattern.min_length(), 8);
        assert_eq!(pattern.atoms()[4], Atom::exact(0x01));
        assert_eq!(pattern.atoms()[5], Atom::Any);
        assert_eq!(pattern.atoms()[7], Atom::exact(0xff));
    }

    #[test]
    fn nested_groups() {
        let pattern = compile("((00){2} 11){2}").unwrap();
        assert_eq!(pattern.min_length(), 6);
    }

    #[test]
    fn skip_is_sugar_for_any() {
        let pattern = compile("60 1a +26+").unwrap();
        assert_eq!(pattern.min_length(), 28);
        assert!(pattern.atoms()[2..].iter().all(|atom| *atom == Atom::Any));
    }

    #[test]
    fn alternation_binds_looser_than_conjunction() {
        let pattern = compile("01 | 02&%xxxxxx1x").unwrap();
        assert_eq!(pattern.min_length(), 1);
        assert_eq!(
            pattern.atoms()[0],
            Atom::Disjunction(vec![
                Atom::exact(1),
                Atom::Conjunction(vec![Atom::exact(2), Atom::masked(0x02, 0x02)]),
            ])
        );
    }

    #[test]
    fn operators_allow_surrounding_whitespace() {
        let pattern = compile("00 & ff  01").unwrap();
        assert_eq!(pattern.min_length(), 2);
        assert_eq!(
            pattern.atoms()[0],
            Atom::Conjunction(vec![Atom::exact(0x00), Atom::exact(0xff)])
        );
    }

    #[test]
    fn syntax_errors_report_offsets() {
        assert_eq!(compile("00 (11").unwrap_err(), PatternSyntaxError {
            offset: 3,
            kind: SyntaxErrorKind::UnbalancedGroup
        });
        assert_eq!(compile("00 )").unwrap_err().offset, 3);
        assert_eq!(compile("0g").unwrap_err(), PatternSyntaxError {
            offset: 1,
            kind: SyntaxErrorKind::InvalidNibble
        });
        assert_eq!(compile("00|").unwrap_err(), PatternSyntaxError {
            offset: 2,
            kind: SyntaxErrorKind::DanglingOperator
        });
    }

    #[test]
    fn syntax_error_kinds() {
        assert_eq!(kind_of(""), SyntaxErrorKind::Empty);
        assert_eq!(kind_of("   "), SyntaxErrorKind::Empty);
        assert_eq!(kind_of("()"), SyntaxErrorKind::Empty);
        assert_eq!(kind_of("00{a}"), SyntaxErrorKind::InvalidQuantifier);
        assert_eq!(kind_of("00{0}"), SyntaxErrorKind::InvalidQuantifier);
        assert_eq!(kind_of("00{2"), SyntaxErrorKind::UnexpectedEnd);
        assert_eq!(kind_of("%01x2xxxx"), SyntaxErrorKind::InvalidBit);
        assert_eq!(kind_of("%01"), SyntaxErrorKind::UnexpectedEnd);
        assert_eq!(kind_of("7f-20"), SyntaxErrorKind::InvalidRange);
        assert_eq!(kind_of("2x-7f"), SyntaxErrorKind::InvalidRange);
        assert_eq!(kind_of("00&"), SyntaxErrorKind::DanglingOperator);
        assert_eq!(kind_of("+x+"), SyntaxErrorKind::InvalidQuantifier);
        assert_eq!(kind_of("zz"), SyntaxErrorKind::UnexpectedCharacter);
        assert_eq!(kind_of("'"), SyntaxErrorKind::UnexpectedEnd);
        assert_eq!(kind_of("(00){99999}(00){99999}"), SyntaxErrorKind::TooLong);
    }
}
