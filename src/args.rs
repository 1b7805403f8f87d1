//! Command-line argument index
//!
//! Interprets a flat token sequence as positional arguments and named
//! switches without a formal grammar. Switches are marked by a leading
//! `-` or `/`; a switch may consume the following token as its value.

use crate::error::{ArgsError, ArgsResult};
use std::cell::RefCell;
use std::collections::HashMap;
use std::env;

/// Strip a single leading switch marker, if present
fn strip_marker(token: &str) -> Option<&str> {
    token
        .strip_prefix('-')
        .or_else(|| token.strip_prefix('/'))
}

/// An ordered sequence of command tokens with cached switch lookups
///
/// The position cache is populated lazily on lookup (misses are cached as
/// "absent") and cleared by every mutation, so a stale position can never
/// be observed.
pub struct ArgList {
    /// Program name, extracted from the tokens or taken from the host
    program_name: Option<String>,
    /// The raw tokens, program name excluded
    tokens: Vec<String>,
    /// Lower-cased switch name -> position; `None` records a known miss
    positions: RefCell<HashMap<String, Option<usize>>>,
}

impl ArgList {
    /// Create an empty argument list
    pub fn new() -> Self {
        ArgList {
            program_name: None,
            tokens: Vec::new(),
            positions: RefCell::new(HashMap::new()),
        }
    }

    /// Create an argument list from a token sequence
    pub fn from_tokens(tokens: Vec<String>, first_is_program_name: bool) -> Self {
        let mut args = ArgList::new();
        args.set_tokens(tokens, first_is_program_name);
        args
    }

    /// Replace the token sequence, clearing the position cache
    ///
    /// If `first_is_program_name` is set the first token becomes the program
    /// name and is removed from the sequence; otherwise the program name is
    /// resolved from the running executable. Safe to call repeatedly.
    pub fn set_tokens(&mut self, tokens: Vec<String>, first_is_program_name: bool) {
        self.tokens = tokens;
        self.positions.get_mut().clear();

        if first_is_program_name {
            if !self.tokens.is_empty() {
                self.program_name = Some(self.tokens.remove(0));
            }
        } else {
            self.program_name = env::current_exe()
                .ok()
                .map(|p| p.display().to_string())
                .or_else(|| env::args().next());
        }
    }

    /// Number of tokens (program name excluded)
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Whether the sequence holds no tokens
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// The token at a position, if in range
    pub fn token_at(&self, index: usize) -> Option<&str> {
        self.tokens.get(index).map(String::as_str)
    }

    /// All tokens in order
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// The resolved program name
    pub fn program_name(&self) -> Option<&str> {
        self.program_name.as_deref()
    }

    /// Find the position of a switch by name (case-insensitive)
    ///
    /// The first matching token wins. Both hits and misses are cached until
    /// the next mutation of the sequence.
    pub fn switch_position(&self, name: &str) -> ArgsResult<Option<usize>> {
        let key = name.trim().to_lowercase();
        if key.is_empty() {
            return Err(ArgsError::EmptyName);
        }

        if let Some(cached) = self.positions.borrow().get(&key) {
            return Ok(*cached);
        }

        let mut found = None;
        for (i, token) in self.tokens.iter().enumerate() {
            if let Some(bare) = strip_marker(token) {
                if bare.to_lowercase() == key {
                    found = Some(i);
                    break;
                }
            }
        }

        self.positions.borrow_mut().insert(key, found);
        Ok(found)
    }

    /// Classify the token at a position, bypassing the cache
    ///
    /// Returns the lower-cased switch name if the token is a switch;
    /// out-of-range positions are not switches.
    pub fn switch_name_at(&self, index: usize) -> Option<String> {
        self.tokens
            .get(index)
            .and_then(|t| strip_marker(t))
            .map(str::to_lowercase)
    }

    /// Whether a switch with the given name is present
    pub fn has_switch(&self, name: &str) -> ArgsResult<bool> {
        Ok(self.switch_position(name)?.is_some())
    }

    /// The value token following a switch, if any
    ///
    /// The token after the switch is its value unless it is the last token
    /// or itself starts with `-`. A value can therefore never look like a
    /// switch marker; this keeps switches self-delimiting, at the cost of
    /// misreading values such as negative numbers as "no value".
    pub fn switch_value(&self, name: &str) -> ArgsResult<Option<&str>> {
        let pos = match self.switch_position(name)? {
            Some(pos) => pos,
            None => return Ok(None),
        };

        match self.tokens.get(pos + 1) {
            Some(value) if !value.starts_with('-') => Ok(Some(value.as_str())),
            _ => Ok(None),
        }
    }

    /// The value of a switch, or a default when absent
    pub fn switch_value_or<'a>(&'a self, name: &str, default: &'a str) -> ArgsResult<&'a str> {
        Ok(self.switch_value(name)?.unwrap_or(default))
    }

    /// The value of a switch parsed as a float
    ///
    /// Absent or malformed values are an error; parsing is locale-independent.
    pub fn switch_value_f64(&self, name: &str) -> ArgsResult<f64> {
        let value = self.switch_value(name)?;
        value
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| ArgsError::InvalidNumber {
                name: name.trim().to_lowercase(),
                value: value.map(str::to_string),
            })
    }

    /// The value of a switch parsed as a float, or a default
    ///
    /// Absent or malformed values silently yield the default.
    pub fn switch_value_f64_or(&self, name: &str, default: f64) -> ArgsResult<f64> {
        Ok(self
            .switch_value(name)?
            .and_then(|v| v.parse().ok())
            .unwrap_or(default))
    }

    /// The value of a switch parsed as an integer
    pub fn switch_value_i64(&self, name: &str) -> ArgsResult<i64> {
        let value = self.switch_value(name)?;
        value
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| ArgsError::InvalidNumber {
                name: name.trim().to_lowercase(),
                value: value.map(str::to_string),
            })
    }

    /// The value of a switch parsed as an integer, or a default
    pub fn switch_value_i64_or(&self, name: &str, default: i64) -> ArgsResult<i64> {
        Ok(self
            .switch_value(name)?
            .and_then(|v| v.parse().ok())
            .unwrap_or(default))
    }

    /// Append a switch (and optional value), normalizing the marker
    ///
    /// With `remove_existing` any prior occurrence of the switch is removed
    /// first (together with its value when the new call carries one), so
    /// re-adding never creates duplicates.
    pub fn add_switch(
        &mut self,
        name: &str,
        value: Option<&str>,
        remove_existing: bool,
    ) -> ArgsResult<()> {
        let (with_marker, bare) = match strip_marker(name) {
            Some(bare) => (name.to_string(), bare.to_string()),
            None => (format!("-{}", name), name.to_string()),
        };
        if bare.trim().is_empty() {
            return Err(ArgsError::EmptyName);
        }

        if remove_existing {
            self.remove_switch(&bare, value.is_some())?;
        }

        self.tokens.push(with_marker);
        if let Some(value) = value {
            self.tokens.push(value.to_string());
        }

        self.positions.get_mut().clear();
        Ok(())
    }

    /// Remove a switch, optionally together with the following token
    ///
    /// Returns whether anything was removed; a missing switch is not an
    /// error. The following token is removed unconditionally when
    /// `remove_value` is set, even if it looks like another switch.
    pub fn remove_switch(&mut self, name: &str, remove_value: bool) -> ArgsResult<bool> {
        let pos = self.switch_position(name)?;

        let removed = if let Some(pos) = pos {
            self.tokens.remove(pos);
            if remove_value && pos < self.tokens.len() {
                self.tokens.remove(pos);
            }
            true
        } else {
            false
        };

        self.positions.get_mut().clear();
        Ok(removed)
    }

    /// Render the sequence back into a single shell-safe string
    ///
    /// Tokens containing whitespace, and empty tokens, are quoted.
    pub fn to_display_string(&self) -> String {
        self.tokens
            .iter()
            .map(|t| {
                if t.is_empty() || t.contains(char::is_whitespace) {
                    format!("\"{}\"", t)
                } else {
                    t.clone()
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Default for ArgList {
    fn default() -> Self {
        Self::new()
    }
}
