//! Block prefix sums over the piece list
//!
//! Seeking a byte position or a line walks whole blocks first and only then
//! the pieces of one block, so lookups cost O(blocks + B) instead of
//! O(pieces).

use crate::constants::buffer::LINE_INDEX_BLOCK;

use super::piece::Piece;

/// Byte and newline totals for one block of pieces
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockSum {
    pub bytes: usize,
    pub newlines: usize,
}

/// Sidecar index: `blocks[i]` covers `pieces[i*B .. (i+1)*B)`
#[derive(Debug, Clone, Default)]
pub struct LineIndex {
    blocks: Vec<BlockSum>,
}

impl LineIndex {
    pub fn new() -> Self {
        Self { blocks: Vec::new() }
    }

    /// Recompute block sums for every block touching `pieces[from..]`
    pub fn rebuild_from(&mut self, pieces: &[Piece], from: usize) {
        let from_block = from / LINE_INDEX_BLOCK;
        self.blocks.truncate(from_block);
        for chunk in pieces[from_block * LINE_INDEX_BLOCK..].chunks(LINE_INDEX_BLOCK) {
            let mut sum = BlockSum::default();
            for p in chunk {
                sum.bytes += p.len;
                sum.newlines += p.newlines;
            }
            self.blocks.push(sum);
        }
    }

    /// First piece index of the block containing byte `pos`, with the byte
    /// and newline totals of everything before it. `pos == total` maps to
    /// the final block.
    pub fn seek_byte(&self, pos: usize) -> (usize, usize, usize) {
        let mut bytes = 0;
        let mut newlines = 0;
        for (i, blk) in self.blocks.iter().enumerate() {
            if bytes + blk.bytes > pos {
                return (i * LINE_INDEX_BLOCK, bytes, newlines);
            }
            bytes += blk.bytes;
            newlines += blk.newlines;
        }
        (self.blocks.len() * LINE_INDEX_BLOCK, bytes, newlines)
    }

    /// First piece index of the block containing the `line`-th newline, with
    /// preceding byte and newline totals
    pub fn seek_line(&self, line: usize) -> (usize, usize, usize) {
        let mut bytes = 0;
        let mut newlines = 0;
        for (i, blk) in self.blocks.iter().enumerate() {
            if newlines + blk.newlines >= line {
                return (i * LINE_INDEX_BLOCK, bytes, newlines);
            }
            bytes += blk.bytes;
            newlines += blk.newlines;
        }
        (self.blocks.len() * LINE_INDEX_BLOCK, bytes, newlines)
    }
}
