//! Unit symbol codes.
//!
//! A symbol code is a fixed 20-character classification string. The core
//! stores and passes it through; interpreting it (colors, icons) belongs to an
//! external symbol service. [`SymbolCode::fields`] only slices it.
//!
//! Any 20 printable ASCII characters are accepted, so letter-based codes
//! padded with `-` or `*` (`SFGPUCI----D--------`) pass through as well as
//! the numeric layout below.
//!
//! ```text
//!  0   1   2   3-4    5-9          10-13          14-16     17-19
//!  std id  ex  domain entity type  specific type  modifier  status
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Friendly armour company, the default for new units.
pub const DEFAULT_SYMBOL_CODE: &str = "10031000151211000020";

pub const SYMBOL_CODE_LEN: usize = 20;

/// A validated 20-character symbol code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SymbolCode(String);

/// Read-only view of the positional fields of a [`SymbolCode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolFields<'a> {
    pub standard: &'a str,
    pub identity: &'a str,
    pub exercise: &'a str,
    pub domain: &'a str,
    pub entity_type: &'a str,
    pub specific_type: &'a str,
    pub modifier: &'a str,
    pub status: &'a str,
}

impl SymbolCode {
    /// Validate a code: exactly 20 printable ASCII characters, no spaces.
    pub fn parse(code: &str) -> Result<Self> {
        let valid = code.len() == SYMBOL_CODE_LEN && code.bytes().all(|b| b.is_ascii_graphic());
        if valid {
            Ok(Self(code.to_string()))
        } else {
            Err(Error::InvalidSymbolCode(code.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Slice the code into its positional fields.
    pub fn fields(&self) -> SymbolFields<'_> {
        let s = self.0.as_str();
        SymbolFields {
            standard: &s[0..1],
            identity: &s[1..2],
            exercise: &s[2..3],
            domain: &s[3..5],
            entity_type: &s[5..10],
            specific_type: &s[10..14],
            modifier: &s[14..17],
            status: &s[17..20],
        }
    }
}

impl Default for SymbolCode {
    fn default() -> Self {
        Self(DEFAULT_SYMBOL_CODE.to_string())
    }
}

impl TryFrom<String> for SymbolCode {
    type Error = Error;

    fn try_from(code: String) -> Result<Self> {
        Self::parse(&code)
    }
}

impl From<SymbolCode> for String {
    fn from(code: SymbolCode) -> Self {
        code.0
    }
}

impl fmt::Display for SymbolCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
