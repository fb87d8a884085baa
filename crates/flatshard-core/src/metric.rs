//! Similarity configuration
//!
//! One enumerated kind, resolved once when an index or engine is built,
//! carries everything the rest of the crate needs to know about a metric:
//! whether vectors are normalized on insert, which direction the shard scan
//! ranks in, and the exact score used for weighted fusion.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::simd::{dot_product, l2_distance, l2_distance_squared};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown similarity function \"{0}\": expected one of cos, dot, l2, l2sq")]
pub struct UnknownSimilarity(pub String);

/// Direction in which raw scan values rank during a shard search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOrder {
    /// Inner-product family: larger is nearer
    HigherIsBetter,
    /// Euclidean family: smaller is nearer
    LowerIsBetter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Similarity {
    #[serde(rename = "cos")]
    Cosine,
    Dot,
    L2,
    #[serde(rename = "l2sq")]
    L2Squared,
}

impl Similarity {
    pub const ALL: [Similarity; 4] = [
        Similarity::Cosine,
        Similarity::Dot,
        Similarity::L2,
        Similarity::L2Squared,
    ];

    /// Cosine indexes store unit-length vectors and expect unit-length queries
    #[inline]
    pub fn normalizes_on_insert(self) -> bool {
        matches!(self, Similarity::Cosine)
    }

    #[inline]
    pub fn scan_order(self) -> ScanOrder {
        match self {
            Similarity::Cosine | Similarity::Dot => ScanOrder::HigherIsBetter,
            Similarity::L2 | Similarity::L2Squared => ScanOrder::LowerIsBetter,
        }
    }

    /// Value compared during a linear scan
    ///
    /// Both Euclidean kinds scan on squared distance; ordering is identical
    /// and the square root is skipped.
    #[inline]
    pub fn scan_value(self, stored: &[f32], query: &[f32]) -> f32 {
        match self {
            Similarity::Cosine | Similarity::Dot => dot_product(stored, query),
            Similarity::L2 | Similarity::L2Squared => l2_distance_squared(stored, query),
        }
    }

    /// Exact similarity used for weighted fusion
    ///
    /// Distances are returned as-is, not negated: fused ranking is always
    /// "higher wins", so distance callers pass negative weights.
    #[inline]
    pub fn score(self, candidate: &[f32], query: &[f32]) -> f32 {
        match self {
            Similarity::Cosine | Similarity::Dot => dot_product(candidate, query),
            Similarity::L2 => l2_distance(candidate, query),
            Similarity::L2Squared => l2_distance_squared(candidate, query),
        }
    }

    #[inline]
    pub fn is_distance(self) -> bool {
        self.scan_order() == ScanOrder::LowerIsBetter
    }

    /// Code stored in shard headers
    pub fn code(self) -> u32 {
        match self {
            Similarity::Cosine => 0,
            Similarity::Dot => 1,
            Similarity::L2 => 2,
            Similarity::L2Squared => 3,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.code() == code)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Similarity::Cosine => "cos",
            Similarity::Dot => "dot",
            Similarity::L2 => "l2",
            Similarity::L2Squared => "l2sq",
        }
    }
}

impl fmt::Display for Similarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Similarity {
    type Err = UnknownSimilarity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cos" => Ok(Similarity::Cosine),
            "dot" => Ok(Similarity::Dot),
            "l2" => Ok(Similarity::L2),
            "l2sq" => Ok(Similarity::L2Squared),
            other => Err(UnknownSimilarity(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names() {
        assert_eq!("cos".parse::<Similarity>().unwrap(), Similarity::Cosine);
        assert_eq!("dot".parse::<Similarity>().unwrap(), Similarity::Dot);
        assert_eq!("l2".parse::<Similarity>().unwrap(), Similarity::L2);
        assert_eq!("l2sq".parse::<Similarity>().unwrap(), Similarity::L2Squared);
        assert!("cosine".parse::<Similarity>().is_err());
    }

    #[test]
    fn test_code_roundtrip() {
        for s in Similarity::ALL {
            assert_eq!(Similarity::from_code(s.code()), Some(s));
            assert_eq!(s.as_str().parse::<Similarity>().unwrap(), s);
        }
        assert_eq!(Similarity::from_code(9), None);
    }

    #[test]
    fn test_only_cosine_normalizes() {
        assert!(Similarity::Cosine.normalizes_on_insert());
        assert!(!Similarity::Dot.normalizes_on_insert());
        assert!(!Similarity::L2.normalizes_on_insert());
        assert!(!Similarity::L2Squared.normalizes_on_insert());
    }

    #[test]
    fn test_scores() {
        let a = [0.0f32, 0.0];
        let b = [3.0f32, 4.0];

        assert!((Similarity::L2.score(&a, &b) - 5.0).abs() < 1e-6);
        assert!((Similarity::L2Squared.score(&a, &b) - 25.0).abs() < 1e-6);
        // Both distance kinds scan on the squared value
        assert!((Similarity::L2.scan_value(&a, &b) - 25.0).abs() < 1e-6);
        assert!((Similarity::Dot.score(&[1.0, 2.0], &[3.0, 4.0]) - 11.0).abs() < 1e-6);
    }

    #[test]
    fn test_scan_order() {
        assert_eq!(Similarity::Dot.scan_order(), ScanOrder::HigherIsBetter);
        assert_eq!(Similarity::Cosine.scan_order(), ScanOrder::HigherIsBetter);
        assert_eq!(Similarity::L2.scan_order(), ScanOrder::LowerIsBetter);
        assert_eq!(Similarity::L2Squared.scan_order(), ScanOrder::LowerIsBetter);
        assert!(Similarity::L2.is_distance());
        assert!(!Similarity::Cosine.is_distance());
    }
}
