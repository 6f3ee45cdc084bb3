//! Fixed-length binary patterns
//!
//! Format recognizers describe their signatures with a small textual DSL which is
//! compiled once into a [`Pattern`]: one [`Atom`] per byte position. Quantifiers
//! and skips are unrolled while compiling, so every pattern has a single static
//! length and matching is a plain per-position walk.
//!
//! | Syntax      | Meaning                                        |
//! |-------------|------------------------------------------------|
//! | `?`         | any byte                                       |
//! | `4e`, `4x`  | exact byte, `x` is a wildcard nibble           |
//! | `%0101xxxx` | bit mask, `x` is a wildcard bit                |
//! | `'Z`        | literal character                              |
//! | `00-1f`     | inclusive byte range                           |
//! | `(...){n}`  | group repeated `n` times (also `atom{n}`)      |
//! | `+n+`       | `n` arbitrary bytes                            |
//! | `a&b`, `a\|b` | conjunction / disjunction at one position    |
//!
//! ```
//! use chipscan::pattern::Pattern;
//!
//! let pattern = Pattern::compile("'Z'X'A'Y 'E'M'U'L").unwrap();
//! assert_eq!(pattern.min_length(), 8);
//! assert!(pattern.matches(b"ZXAYEMUL\x00\x01"));
//! assert_eq!(pattern.search(b"..ZXAYEMUL"), 2);
//! ```

mod compiler;
pub mod matcher;
#[cfg(test)]
pub(crate) mod strategies;

use std::fmt;
use std::str::FromStr;

pub use compiler::{compile, PatternSyntaxError, SyntaxErrorKind};

/// Match rule for a single byte position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Atom {
    /// Accepts every byte.
    Any,
    /// Accepts `byte` when `byte & mask == value`. `value` never has bits outside `mask`.
    Masked {
        /// Expected bits.
        value: u8,
        /// Bits that take part in the comparison.
        mask: u8,
    },
    /// Accepts bytes in `low..=high`.
    Range {
        /// Lowest accepted byte.
        low: u8,
        /// Highest accepted byte.
        high: u8,
    },
    /// Accepts a byte every member accepts.
    Conjunction(Vec<Atom>),
    /// Accepts a byte any member accepts.
    Disjunction(Vec<Atom>),
}

impl Atom {
    /// Exact byte match.
    pub fn exact(value: u8) -> Self {
        Atom::Masked { value, mask: 0xff }
    }

    /// Masked match; bits of `value` outside `mask` are ignored.
    pub fn masked(value: u8, mask: u8) -> Self {
        if mask == 0 {
            Atom::Any
        } else {
            Atom::Masked {
                value: value & mask,
                mask,
            }
        }
    }

    /// Whether this rule accepts `byte`.
    #[inline]
    pub fn accepts(&self, byte: u8) -> bool {
        match self {
            Atom::Any => true,
            Atom::Masked { value, mask } => byte & mask == *value,
            Atom::Range { low, high } => (*low..=*high).contains(&byte),
            Atom::Conjunction(atoms) => atoms.iter().all(|atom| atom.accepts(byte)),
            Atom::Disjunction(atoms) => atoms.iter().any(|atom| atom.accepts(byte)),
        }
    }

    /// The single byte this rule accepts, if it is an exact match.
    pub fn exact_value(&self) -> Option<u8> {
        match self {
            Atom::Masked { value, mask: 0xff } => Some(*value),
            Atom::Range { low, high } if low == high => Some(*low),
            _ => None,
        }
    }
}

/// Compiled fixed-length byte pattern.
///
/// Immutable once built; share it freely between threads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    atoms: Vec<Atom>,
}

impl Pattern {
    /// Compile `text` using the pattern DSL.
    pub fn compile(text: &str) -> Result<Self, PatternSyntaxError> {
        compile(text)
    }

    /// Built by the compiler, which guarantees a non-empty atom list.
    pub(crate) fn from_atoms(atoms: Vec<Atom>) -> Self {
        debug_assert!(!atoms.is_empty());
        Self { atoms }
    }

    /// Per-position rules.
    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    /// Number of bytes a buffer needs for a match.
    pub fn min_length(&self) -> usize {
        self.atoms.len()
    }

    /// See [`matcher::matches`].
    pub fn matches(&self, data: &[u8]) -> bool {
        matcher::matches(self, data)
    }

    /// See [`matcher::search`].
    pub fn search(&self, data: &[u8]) -> usize {
        matcher::search(self, data)
    }
}

impl FromStr for Pattern {
    type Err = PatternSyntaxError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        compile(text)
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Atom::Any => write!(f, "?"),
            Atom::Masked { value, mask: 0xff } => write!(f, "{value:02x}"),
            Atom::Masked { value, mask } => {
                write!(f, "%")?;
                for bit in (0..8).rev() {
                    let probe = 1u8 << bit;
                    match (mask & probe != 0, value & probe != 0) {
                        (false, _) => write!(f, "x")?,
                        (true, true) => write!(f, "1")?,
                        (true, false) => write!(f, "0")?,
                    }
                }
                Ok(())
            }
            Atom::Range { low, high } => write!(f, "{low:02x}-{high:02x}"),
            Atom::Conjunction(atoms) => write_joined(f, atoms, '&'),
            Atom::Disjunction(atoms) => write_joined(f, atoms, '|'),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, atoms: &[Atom], op: char) -> fmt::Result {
    for (idx, atom) in atoms.iter().enumerate() {
        if idx > 0 {
            write!(f, "{op}")?;
        }
        write!(f, "{atom}")?;
    }
    Ok(())
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, atom) in self.atoms.iter().enumerate() {
            if idx > 0 {
                write!(f, " ")?;
            }
            write!(f, "{atom}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_round_trips_through_compiler() {
        let text = "'S 00-1f %1x0xxxxx ? 01|02&%xxxxxx1x";
        let pattern = Pattern::compile(text).unwrap();
        let rendered = pattern.to_string();
        assert_eq!(Pattern::compile(&rendered).unwrap(), pattern);
    }

    #[test]
    fn masked_constructor_normalizes_value() {
        assert_eq!(Atom::masked(0xff, 0x0f), Atom::Masked { value: 0x0f, mask: 0x0f });
        assert_eq!(Atom::masked(0x12, 0), Atom::Any);
    }

    #[test]
    fn exact_value_only_for_single_byte_rules() {
        assert_eq!(Atom::exact(0x41).exact_value(), Some(0x41));
        assert_eq!(Atom::Range { low: 3, high: 3 }.exact_value(), Some(3));
        assert_eq!(Atom::masked(0x40, 0xf0).exact_value(), None);
        assert_eq!(Atom::Any.exact_value(), None);
    }
}
