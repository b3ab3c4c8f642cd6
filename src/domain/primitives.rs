//! Domain primitives: Symbol, Side.

use serde::{Deserialize, Serialize};

/// A-share stock code (6 digits, e.g. "600519").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Symbol(pub String);

impl Symbol {
    /// Create a Symbol from a string.
    pub fn new(code: impl Into<String>) -> Self {
        Symbol(code.into())
    }

    /// Get the code as a string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Exchange-prefixed form used by the quote providers: Shanghai codes
    /// start with 6 ("sh600519"), Shenzhen codes with 0 or 3 ("sz000858").
    pub fn exchange_prefixed(&self) -> String {
        if self.0.starts_with('6') {
            format!("sh{}", self.0)
        } else {
            format!("sz{}", self.0)
        }
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Trade side: Buy or Sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Parse from the lowercase wire form used in the ledger and the
    /// decision contract.
    pub fn parse(s: &str) -> Option<Side> {
        match s {
            "buy" => Some(Side::Buy),
            "sell" => Some(Side::Sell),
            _ => None,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}
