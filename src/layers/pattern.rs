//! Pattern blocks
//!
//! A block is one placement of a layer's loop on the bar grid, covering the
//! half-open range `[start, start + length)`.

use serde::{Deserialize, Serialize};

use crate::error::{LoopdeckError, Result};

/// One contiguous placement of a layer's loop on the bar grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "BlockRepr")]
pub struct PatternBlock {
    start: u32,
    length: u32,
}

#[derive(Deserialize)]
struct BlockRepr {
    start: u32,
    length: u32,
}

impl TryFrom<BlockRepr> for PatternBlock {
    type Error = LoopdeckError;

    fn try_from(repr: BlockRepr) -> Result<Self> {
        PatternBlock::new(repr.start, repr.length)
    }
}

impl PatternBlock {
    /// Create a block starting at `start` spanning `length` bars
    ///
    /// # Errors
    /// * `InvalidBlock` - if `length` is zero
    pub fn new(start: u32, length: u32) -> Result<Self> {
        if length == 0 {
            return Err(LoopdeckError::InvalidBlock {
                reason: format!("block at bar {} has zero length", start),
            });
        }
        Ok(Self { start, length })
    }

    /// First bar covered by this block
    pub fn start(&self) -> u32 {
        self.start
    }

    /// Number of bars covered
    pub fn length(&self) -> u32 {
        self.length
    }

    /// One past the last covered bar
    pub fn end(&self) -> u32 {
        self.start.saturating_add(self.length)
    }

    /// Whether `bar` falls inside this block
    pub fn contains(&self, bar: u32) -> bool {
        bar >= self.start && bar < self.end()
    }

    /// Whether the two half-open ranges intersect
    pub fn overlaps(&self, other: &PatternBlock) -> bool {
        self.start < other.end() && other.start < self.end()
    }
}

/// Check the pairwise non-overlap invariant for a set of blocks
pub fn is_non_overlapping(blocks: &[PatternBlock]) -> bool {
    blocks.iter().enumerate().all(|(i, a)| {
        blocks[i + 1..].iter().all(|b| !a.overlaps(b))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn block(start: u32, length: u32) -> PatternBlock {
        PatternBlock::new(start, length).unwrap()
    }

    #[test]
    fn test_zero_length_rejected() {
        assert!(matches!(
            PatternBlock::new(4, 0),
            Err(LoopdeckError::InvalidBlock { .. })
        ));
    }

    #[test]
    fn test_contains_is_half_open() {
        let b = block(10, 4);
        assert!(!b.contains(9));
        assert!(b.contains(10));
        assert!(b.contains(13));
        assert!(!b.contains(14));
        assert_eq!(b.end(), 14);
    }

    #[test_case(0, 4, 4, 4, false ; "adjacent after")]
    #[test_case(4, 4, 0, 4, false ; "adjacent before")]
    #[test_case(0, 4, 3, 2, true ; "tail overlap")]
    #[test_case(2, 1, 0, 8, true ; "nested")]
    #[test_case(0, 1, 0, 1, true ; "identical")]
    fn test_overlap(a_start: u32, a_len: u32, b_start: u32, b_len: u32, expected: bool) {
        let a = block(a_start, a_len);
        let b = block(b_start, b_len);
        assert_eq!(a.overlaps(&b), expected);
        assert_eq!(b.overlaps(&a), expected);
    }

    #[test]
    fn test_deserialize_validates_length() {
        let ok: PatternBlock = serde_json::from_str(r#"{"start":4,"length":2}"#).unwrap();
        assert_eq!(ok, block(4, 2));
        assert!(serde_json::from_str::<PatternBlock>(r#"{"start":4,"length":0}"#).is_err());
    }

    #[test]
    fn test_is_non_overlapping() {
        assert!(is_non_overlapping(&[]));
        assert!(is_non_overlapping(&[block(0, 2), block(2, 2), block(8, 4)]));
        assert!(!is_non_overlapping(&[block(0, 2), block(8, 4), block(1, 1)]));
    }
}
