//! The large-dynamic-memory fixture.
//!
//! `run` allocates many 1 MiB blocks one after another, keeps all of them
//! alive and writes one byte into every Wasm page of every block, so linear
//! memory has to grow to hold the whole set. Under a component runtime this
//! exercises `memory.grow` through the guest allocator.

use alloc::alloc::Layout;
use alloc::vec::Vec;
use core::hint::black_box;

use crate::{MIB, WASM_PAGE_SIZE};

/// Shape of an allocation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationPlan {
    /// Number of blocks allocated in sequence.
    pub blocks: usize,
    /// Size of each block in bytes.
    pub block_size: usize,
    /// Distance between touched bytes inside a block. Zero counts as one.
    pub stride: usize,
}

impl Default for AllocationPlan {
    /// 512 blocks of 1 MiB, touching every Wasm page.
    fn default() -> Self {
        Self {
            blocks: 512,
            block_size: MIB,
            stride: WASM_PAGE_SIZE,
        }
    }
}

impl AllocationPlan {
    /// Bytes the plan allocates when it completes.
    pub fn total_bytes(&self) -> u64 {
        (self.blocks as u64).saturating_mul(self.block_size as u64)
    }
}

/// What a run achieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationReport {
    /// Blocks allocated and touched.
    pub blocks: usize,
    /// Total bytes held at the end of the run.
    pub bytes: u64,
    /// Wrapping sum of every touched byte, read back after all blocks exist.
    pub checksum: u64,
    /// An allocation failed and the run stopped early.
    pub exhausted: bool,
}

/// Execute `plan`.
///
/// A failed allocation ends the run with `exhausted` set instead of aborting,
/// and the report covers the blocks allocated before it.
pub fn run(plan: &AllocationPlan) -> AllocationReport {
    let stride = plan.stride.max(1);
    let mut blocks: Vec<Vec<u8>> = Vec::new();
    let mut exhausted = false;

    for index in 0..plan.blocks {
        let Some(mut block) = zeroed_block(plan.block_size) else {
            exhausted = true;
            break;
        };
        if blocks.try_reserve(1).is_err() {
            exhausted = true;
            break;
        }
        for offset in (0..plan.block_size).step_by(stride) {
            block[offset] = touch_value(index, offset);
        }
        blocks.push(black_box(block));
    }

    let checksum = blocks
        .iter()
        .flat_map(|block| block.iter().step_by(stride))
        .fold(0u64, |sum, &byte| sum.wrapping_add(u64::from(byte)));

    AllocationReport {
        blocks: blocks.len(),
        bytes: blocks.iter().map(|block| block.len() as u64).sum(),
        checksum,
        exhausted,
    }
}

/// Allocate `size` zeroed bytes, or `None` if the allocator refuses.
///
/// Zeroed allocation leaves untouched pages uncommitted on hosts with lazy
/// zero pages; in linear memory it is a plain `memory.grow`.
fn zeroed_block(size: usize) -> Option<Vec<u8>> {
    if size == 0 {
        return Some(Vec::new());
    }
    let layout = Layout::array::<u8>(size).ok()?;
    // SAFETY: `layout` has a non-zero size.
    let ptr = unsafe { alloc::alloc::alloc_zeroed(layout) };
    if ptr.is_null() {
        return None;
    }
    // SAFETY: `ptr` comes from the global allocator with `layout`, which is
    // exactly `size` bytes at alignment 1, and every byte is initialised.
    Some(unsafe { Vec::from_raw_parts(ptr, size, size) })
}

/// Byte written at `offset` of block `index`.
#[inline]
fn touch_value(index: usize, offset: usize) -> u8 {
    (index.wrapping_add(offset / WASM_PAGE_SIZE) % 251) as u8 + 1
}

/// Checksum a completed run of `plan` must report.
pub fn expected_checksum(plan: &AllocationPlan) -> u64 {
    let stride = plan.stride.max(1);
    (0..plan.blocks)
        .flat_map(|index| {
            (0..plan.block_size)
                .step_by(stride)
                .map(move |offset| touch_value(index, offset))
        })
        .fold(0u64, |sum, byte| sum.wrapping_add(u64::from(byte)))
}
