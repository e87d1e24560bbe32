use serde::{Deserialize, Serialize};
use std::fmt;

///
/// QueryStrategy
///
/// Operator requested against one indexed path, or one of the special
/// whole-index strategies.
///
/// IMPORTANT:
/// Codes are exchanged with the host planner and must never change.
///

#[repr(i32)]
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum QueryStrategy {
    Equal = 1,
    GreaterThan = 2,
    GreaterThanEqual = 3,
    LessThan = 4,
    LessThanEqual = 5,
    In = 6,
    NotEqual = 7,
    NotIn = 8,
    Regex = 9,
    Exists = 10,
    Size = 11,
    Type = 12,
    ElemMatch = 14,
    BitsAllClear = 15,
    BitsAnyClear = 16,
    BitsAllSet = 17,
    BitsAnySet = 18,
    Mod = 19,
    OrderBy = 20,
    Range = 24,
    NotGreater = 25,
    NotGreaterEqual = 26,
    NotLess = 27,
    NotLessEqual = 28,
    CompositeQuery = 31,
    UniqueEqual = 32,
    OrderByReverse = 33,
    IsMultiKey = 34,
    HasTruncatedTerms = 35,
    HasCorrelatedReducedTerms = 36,
}

impl QueryStrategy {
    const ALL: [Self; 30] = [
        Self::Equal,
        Self::GreaterThan,
        Self::GreaterThanEqual,
        Self::LessThan,
        Self::LessThanEqual,
        Self::In,
        Self::NotEqual,
        Self::NotIn,
        Self::Regex,
        Self::Exists,
        Self::Size,
        Self::Type,
        Self::ElemMatch,
        Self::BitsAllClear,
        Self::BitsAnyClear,
        Self::BitsAllSet,
        Self::BitsAnySet,
        Self::Mod,
        Self::OrderBy,
        Self::Range,
        Self::NotGreater,
        Self::NotGreaterEqual,
        Self::NotLess,
        Self::NotLessEqual,
        Self::CompositeQuery,
        Self::UniqueEqual,
        Self::OrderByReverse,
        Self::IsMultiKey,
        Self::HasTruncatedTerms,
        Self::HasCorrelatedReducedTerms,
    ];

    #[must_use]
    pub const fn code(self) -> i32 {
        self as i32
    }

    #[must_use]
    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.code() == code)
    }

    /// Strategies answered by a single root sentinel term.
    #[must_use]
    pub const fn is_root_sentinel(self) -> bool {
        matches!(
            self,
            Self::IsMultiKey | Self::HasTruncatedTerms | Self::HasCorrelatedReducedTerms
        )
    }

    #[must_use]
    pub const fn is_order_by(self) -> bool {
        matches!(self, Self::OrderBy | Self::OrderByReverse)
    }
}

impl fmt::Display for QueryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl From<QueryStrategy> for i32 {
    fn from(strategy: QueryStrategy) -> Self {
        strategy.code()
    }
}

impl TryFrom<i32> for QueryStrategy {
    type Error = String;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        Self::from_code(code).ok_or_else(|| format!("unknown query strategy {code}"))
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip() {
        for strategy in QueryStrategy::ALL {
            assert_eq!(QueryStrategy::from_code(strategy.code()), Some(strategy));
        }
    }

    #[test]
    fn gaps_are_unknown() {
        for code in [0, 13, 21, 22, 23, 29, 30, 37] {
            assert_eq!(QueryStrategy::from_code(code), None);
        }
    }
}
