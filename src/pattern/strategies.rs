//! Random patterns written in the DSL, each with a buffer it must match.

use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Token {
    Exact(u8),
    Any,
    HighNibble(u8),
    LowNibble(u8),
    Range(u8, u8),
    Char(u8),
    Bits { value: u8, mask: u8 },
    Either(u8, u8),
}

impl Token {
    fn text(&self) -> String {
        match *self {
            Token::Exact(value) => format!("{value:02x}"),
            Token::Any => "?".to_string(),
            Token::HighNibble(high) => format!("{high:x}x"),
            Token::LowNibble(low) => format!("x{low:x}"),
            Token::Range(low, high) => format!("{low:02x}-{high:02x}"),
            Token::Char(ch) => format!("'{}", ch as char),
            Token::Bits { value, mask } => {
                let bits: String = (0..8)
                    .rev()
                    .map(|bit| match ((mask >> bit) & 1, (value >> bit) & 1) {
                        (0, _) => 'x',
                        (_, 0) => '0',
                        _ => '1',
                    })
                    .collect();
                format!("%{bits}")
            }
            Token::Either(a, b) => format!("{a:02x}|{b:02x}"),
        }
    }

    /// A byte the token accepts, picked by `choice`.
    fn instantiate(&self, choice: u8) -> u8 {
        match *self {
            Token::Exact(value) | Token::Char(value) => value,
            Token::Any => choice,
            Token::HighNibble(high) => (high << 4) | (choice & 0x0f),
            Token::LowNibble(low) => (choice & 0xf0) | low,
            Token::Range(low, high) => {
                let span = u16::from(high - low) + 1;
                low + (u16::from(choice) % span) as u8
            }
            Token::Bits { value, mask } => value | (choice & !mask),
            Token::Either(a, b) => {
                if choice & 1 == 0 {
                    a
                } else {
                    b
                }
            }
        }
    }
}

fn token() -> impl Strategy<Value = Token> {
    prop_oneof![
        any::<u8>().prop_map(Token::Exact),
        Just(Token::Any),
        (0u8..16).prop_map(Token::HighNibble),
        (0u8..16).prop_map(Token::LowNibble),
        (any::<u8>(), any::<u8>()).prop_map(|(a, b)| Token::Range(a.min(b), a.max(b))),
        (0x21u8..0x7f).prop_map(Token::Char),
        (any::<u8>(), any::<u8>()).prop_map(|(value, mask)| Token::Bits {
            value: value & mask,
            mask
        }),
        (any::<u8>(), any::<u8>()).prop_map(|(a, b)| Token::Either(a, b)),
    ]
}

/// Pattern text plus one buffer of exactly the pattern's length that matches it.
#[derive(Debug, Clone)]
pub(crate) struct Sample {
    pub(crate) text: String,
    pub(crate) instance: Vec<u8>,
}

pub(crate) fn sample() -> impl Strategy<Value = Sample> {
    proptest::collection::vec((token(), 1usize..=3, any::<u8>()), 1..8).prop_map(|parts| {
        let mut text = String::new();
        let mut instance = Vec::new();
        for (token, count, choice) in parts {
            if !text.is_empty() {
                text.push(' ');
            }
            text.push_str(&token.text());
            if count > 1 {
                text.push_str(&format!("{{{count}}}"));
            }
            instance.extend(std::iter::repeat(token.instantiate(choice)).take(count));
        }
        Sample { text, instance }
    })
}

/// `noise` with `sample.instance` inserted at `at` (clamped to the noise length).
pub(crate) fn plant(noise: &[u8], sample: &Sample, at: usize) -> (Vec<u8>, usize) {
    let at = at % (noise.len() + 1);
    let mut data = noise[..at].to_vec();
    data.extend_from_slice(&sample.instance);
    data.extend_from_slice(&noise[at..]);
    (data, at)
}
