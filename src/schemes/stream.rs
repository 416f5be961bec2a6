use crate::error::SchemeError;
use crate::Real;

/// Whitespace-separated tokens of a scheme string, such as `"cellLimited Gauss linear 1"`.
///
/// Scheme factories consume the tokens they need and leave the rest to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemeStream<'a> {
    tokens: Vec<&'a str>,
    position: usize,
}

impl<'a> SchemeStream<'a> {
    pub fn new(scheme: &'a str) -> Self {
        Self {
            tokens: scheme.split_whitespace().collect(),
            position: 0,
        }
    }

    pub fn peek(&self) -> Option<&'a str> {
        self.tokens.get(self.position).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.position >= self.tokens.len()
    }

    /// The next token, with `expected` describing it in the error if the stream is exhausted.
    pub fn next_word(&mut self, expected: &'static str) -> Result<&'a str, SchemeError> {
        let token = self
            .peek()
            .ok_or(SchemeError::UnexpectedEnd { expected })?;
        self.position += 1;
        Ok(token)
    }

    /// Consumes the next token if it equals `word`.
    pub fn next_if(&mut self, word: &str) -> bool {
        if self.peek() == Some(word) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    /// Whether the next token parses as a number.
    pub fn peek_is_number(&self) -> bool {
        self.peek()
            .map_or(false, |token| token.parse::<f64>().is_ok())
    }

    pub fn read_number<T: Real>(&mut self, expected: &'static str) -> Result<T, SchemeError> {
        let token = self.next_word(expected)?;
        token
            .parse::<f64>()
            .ok()
            .and_then(T::from_f64)
            .ok_or_else(|| SchemeError::InvalidNumber {
                token: token.to_string(),
            })
    }

    /// Reads a coefficient that must lie in `[0, 1]`.
    pub fn read_unit_coefficient<T: Real>(&mut self, coefficient: &'static str) -> Result<T, SchemeError> {
        let value: T = self.read_number(coefficient)?;
        if value < T::zero() || value > T::one() {
            return Err(SchemeError::CoefficientOutOfRange {
                coefficient,
                value: format!("{}", value),
                range: "[0, 1]",
            });
        }
        Ok(value)
    }

    /// The unconsumed tokens, joined by spaces.
    pub fn remaining(&self) -> String {
        self.tokens[self.position.min(self.tokens.len())..].join(" ")
    }

    /// Fails if any tokens are left.
    pub fn finish(&self) -> Result<(), SchemeError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(SchemeError::TrailingTokens {
                tokens: self.remaining(),
            })
        }
    }
}
