//! Runtime transformer filter.
//!
//! The CLI can enable or disable transformers between runs without
//! rebuilding the registry: `all`, `none`, or a comma list of tokens where
//! `name`/`+name` enables and `-name` disables. A list containing any
//! enabling token starts from the empty set; a list of only `-name` tokens
//! subtracts from the full set. Tokens apply left to right, so later
//! tokens win on conflict.

use std::str::FromStr;

use crate::{Error, Result};

/// A parsed transformer filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// Every transformer enabled (the default).
    All,
    /// Every transformer disabled: raw pass-through for everything.
    None,
    /// Explicit token list.
    List(Vec<Token>),
}

/// One filter token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Enable a transformer by name.
    Enable(String),
    /// Disable a transformer by name.
    Disable(String),
}

impl Filter {
    /// Compute the enabled mask for the given transformer names.
    ///
    /// Errors on tokens naming a transformer that does not exist, so typos
    /// surface as usage errors instead of silently matching nothing.
    pub fn enabled_mask(&self, names: &[&str]) -> Result<Vec<bool>> {
        match self {
            Filter::All => Ok(vec![true; names.len()]),
            Filter::None => Ok(vec![false; names.len()]),
            Filter::List(tokens) => {
                let any_enable = tokens.iter().any(|t| matches!(t, Token::Enable(_)));
                let mut mask = vec![!any_enable; names.len()];

                for token in tokens {
                    let (name, value) = match token {
                        Token::Enable(n) => (n, true),
                        Token::Disable(n) => (n, false),
                    };
                    let idx = names
                        .iter()
                        .position(|candidate| candidate.eq_ignore_ascii_case(name))
                        .ok_or_else(|| Error::UnknownTransformer(name.clone()))?;
                    mask[idx] = value;
                }

                Ok(mask)
            }
        }
    }
}

impl FromStr for Filter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("all") {
            return Ok(Filter::All);
        }
        if s.eq_ignore_ascii_case("none") {
            return Ok(Filter::None);
        }

        let mut tokens = Vec::new();
        for raw in s.split(',') {
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }
            let token = if let Some(name) = raw.strip_prefix('+') {
                Token::Enable(name.to_string())
            } else if let Some(name) = raw.strip_prefix('-') {
                Token::Disable(name.to_string())
            } else {
                Token::Enable(raw.to_string())
            };
            tokens.push(token);
        }
        Ok(Filter::List(tokens))
    }
}

impl Default for Filter {
    fn default() -> Self {
        Filter::All
    }
}
