//! Multiplicity bounds and their bracketed rendering

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One end of a multiplicity range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawBound", into = "String")]
pub enum Bound {
    Finite(u32),
    Unbounded,
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Finite(n) => write!(f, "{}", n),
            Self::Unbounded => write!(f, "*"),
        }
    }
}

impl FromStr for Bound {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "*" | "-1" => Ok(Self::Unbounded),
            other => other
                .parse::<u32>()
                .map(Self::Finite)
                .map_err(|_| format!("invalid multiplicity bound '{}'", other)),
        }
    }
}

impl From<Bound> for String {
    fn from(bound: Bound) -> Self {
        bound.to_string()
    }
}

/// Bounds arrive either as numbers or as strings ("*" for unbounded)
#[derive(Deserialize)]
#[serde(untagged)]
enum RawBound {
    Number(i64),
    Text(String),
}

impl TryFrom<RawBound> for Bound {
    type Error = String;

    fn try_from(raw: RawBound) -> Result<Self, Self::Error> {
        match raw {
            RawBound::Number(n) if n < 0 => Ok(Self::Unbounded),
            RawBound::Number(n) => u32::try_from(n)
                .map(Self::Finite)
                .map_err(|_| format!("multiplicity bound {} out of range", n)),
            RawBound::Text(s) => s.parse(),
        }
    }
}

/// A raw lower/upper bound pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Multiplicity {
    pub lower: Bound,
    pub upper: Bound,
}

impl Multiplicity {
    pub const ONE: Self = Self::new(Bound::Finite(1), Bound::Finite(1));

    pub const fn new(lower: Bound, upper: Bound) -> Self {
        Self { lower, upper }
    }

    /// Upper bound is exactly 1
    pub fn is_single(&self) -> bool {
        self.upper == Bound::Finite(1)
    }

    /// Upper bound admits more than one value
    pub fn is_to_many(&self) -> bool {
        match self.upper {
            Bound::Unbounded => true,
            Bound::Finite(n) => n > 1,
        }
    }
}

impl Default for Multiplicity {
    fn default() -> Self {
        Self::ONE
    }
}

/// `[n]` when both bounds agree, otherwise `[lower..upper]`
impl fmt::Display for Multiplicity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.lower == self.upper {
            write!(f, "[{}]", self.lower)
        } else {
            write!(f, "[{}..{}]", self.lower, self.upper)
        }
    }
}
