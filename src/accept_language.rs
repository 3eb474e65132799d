//! A single-pass, lazy parser for the `Accept-Language` header.

use std::cmp::Ordering;
use std::iter::Peekable;
use std::str::Chars;

/// A single item of an `Accept-Language` header: a lowercased language tag,
/// or the wildcard `*`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LanguageTag {
    /// A lowercased tag made of letters, digits, and `-`, e.g. `"en-us"`.
    Tag(String),
    /// The wildcard `*`.
    Wildcard,
}

/// The preference rank of one `Accept-Language` item: its `q` weight and
/// its position in the header (used to break ties).
///
/// Ordering is `<` on `weight`, then `>` on `index` — so among equally
/// weighted items, the one that appeared earlier in the header compares
/// greater (wins the tie).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rank {
    /// The parsed `q` value, in `[0.0, 1.0]`. Defaults to `1.0` when absent.
    pub weight: f64,
    /// Zero-based position of this item in the header.
    pub index: u32,
}

impl PartialOrd for Rank {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match self.weight.partial_cmp(&other.weight) {
            Some(Ordering::Equal) => Some(other.index.cmp(&self.index)),
            ord => ord,
        }
    }
}

/// A single-pass iterator over `(LanguageTag, Rank)` pairs parsed from a raw
/// `Accept-Language` header value. Invalid input terminates the iterator
/// (no further items are emitted); items already yielded remain valid.
pub struct AcceptLanguage<'a> {
    chars: Peekable<Chars<'a>>,
    index: u32,
    terminated: bool,
}

impl<'a> AcceptLanguage<'a> {
    /// Build an iterator over the items of `header_value`.
    pub fn new(header_value: &'a str) -> Self {
        AcceptLanguage {
            chars: header_value.chars().peekable(),
            index: 0,
            terminated: false,
        }
    }

    fn skip_ws(&mut self) {
        while matches!(self.chars.peek(), Some(' ') | Some('\t')) {
            self.chars.next();
        }
    }

    fn fail(&mut self) -> Option<(LanguageTag, Rank)> {
        self.terminated = true;
        None
    }
}

impl<'a> Iterator for AcceptLanguage<'a> {
    type Item = (LanguageTag, Rank);

    fn next(&mut self) -> Option<Self::Item> {
        if self.terminated {
            return None;
        }

        // LeadingWs: skip whitespace and item separators between entries.
        loop {
            match self.chars.peek() {
                Some(' ') | Some('\t') | Some(',') => {
                    self.chars.next();
                }
                _ => break,
            }
        }

        // Tag / Wildcard
        let tag = match self.chars.peek().copied() {
            None => {
                self.terminated = true;
                return None;
            }
            Some('*') => {
                self.chars.next();
                LanguageTag::Wildcard
            }
            Some(c) if c.is_ascii_alphanumeric() => {
                let mut s = String::new();
                while let Some(&c) = self.chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '-' {
                        s.push(c.to_ascii_lowercase());
                        self.chars.next();
                    } else {
                        break;
                    }
                }
                LanguageTag::Tag(s)
            }
            _ => return self.fail(),
        };

        self.skip_ws();

        // Semicolon / Q / Equals / IntPart / Dot / Frac*
        let mut weight = 1.0f64;
        if self.chars.peek() == Some(&';') {
            self.chars.next();
            self.skip_ws();
            if self.chars.next() != Some('q') {
                return self.fail();
            }
            self.skip_ws();
            if self.chars.next() != Some('=') {
                return self.fail();
            }
            self.skip_ws();
            let int_digit = match self.chars.next() {
                Some(c @ '0') | Some(c @ '1') => c.to_digit(10).unwrap(),
                _ => return self.fail(),
            };
            let is_one = int_digit == 1;
            weight = int_digit as f64;

            if self.chars.peek() == Some(&'.') {
                self.chars.next();
                let mut frac_digits = 0u32;
                let mut frac_value = 0u32;
                let mut saw_nonzero = false;
                while frac_digits < 3 {
                    match self.chars.peek() {
                        Some(&c) if c.is_ascii_digit() => {
                            let d = c.to_digit(10).unwrap();
                            if d != 0 {
                                saw_nonzero = true;
                            }
                            frac_value = frac_value * 10 + d;
                            frac_digits += 1;
                            self.chars.next();
                        }
                        _ => break,
                    }
                }
                if is_one && saw_nonzero {
                    // after integer 1, fractional digits must all be 0
                    return self.fail();
                }
                if frac_digits > 0 {
                    weight += frac_value as f64 / 10u32.pow(frac_digits) as f64;
                }
            }
        }

        // TrailingWs
        self.skip_ws();
        match self.chars.peek() {
            None | Some(',') => {}
            _ => return self.fail(),
        }

        let rank = Rank {
            weight,
            index: self.index,
        };
        self.index += 1;
        Some((tag, rank))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(input: &str) -> Vec<(LanguageTag, f64, u32)> {
        AcceptLanguage::new(input)
            .map(|(t, r)| (t, r.weight, r.index))
            .collect()
    }

    #[test]
    fn basic() {
        let items = collect("en-US,en;q=0.8,*;q=0.5");
        assert_eq!(
            items,
            vec![
                (LanguageTag::Tag("en-us".into()), 1.0, 0),
                (LanguageTag::Tag("en".into()), 0.8, 1),
                (LanguageTag::Wildcard, 0.5, 2),
            ]
        );
    }

    #[test]
    fn default_weight_is_one() {
        let items = collect("fr");
        assert_eq!(items, vec![(LanguageTag::Tag("fr".into()), 1.0, 0)]);
    }

    #[test]
    fn whitespace_is_tolerated() {
        let items = collect(" en ; q=0.9 , fr ");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].0, LanguageTag::Tag("en".into()));
    }

    #[test]
    fn q_1_with_nonzero_fraction_is_invalid() {
        // Terminates immediately; zero items emitted.
        assert_eq!(collect("en;q=1.500"), vec![]);
    }

    #[test]
    fn q_1_with_zero_fraction_is_valid() {
        let items = collect("en;q=1.000");
        assert_eq!(items[0].1, 1.0);
    }

    #[test]
    fn invalid_input_terminates_without_error() {
        let items = collect("en;q=0.5, !!!, fr");
        // "en" parses fine; the malformed second item halts the iterator
        // before "fr" is ever reached.
        assert_eq!(items, vec![(LanguageTag::Tag("en".into()), 0.5, 0)]);
    }

    #[test]
    fn rank_ordering_breaks_ties_by_earlier_index() {
        let a = Rank { weight: 0.5, index: 0 };
        let b = Rank { weight: 0.5, index: 1 };
        assert!(a > b);
        let c = Rank { weight: 0.9, index: 5 };
        assert!(c > a);
    }
}
