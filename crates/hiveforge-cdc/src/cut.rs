//! Gear-hash cut-point scanner.
//!
//! The scanner looks at one window of at most `max` bytes and picks a single
//! boundary inside it. It evaluates the gear value of each candidate byte
//! against a size-dependent mask, using two tiers (normalized chunking):
//!
//! - while the window is no longer than `normal`, only [`MASK_S`] is used;
//! - otherwise [`MASK_L`] is tried up to `normal`, then [`MASK_S`] beyond it.
//!
//! The result depends only on the window contents and the bounds, so the
//! same bytes always produce the same boundaries.

use std::ops::Range;

use crate::policy::ChunkSizes;

/// Mask used where the scanner is willing to cut early.
pub const MASK_S: u64 = 0x0000_d900_0353_0000;

/// Mask used before `normal` in long windows.
pub const MASK_L: u64 = 0x0000_d900_0310_0000;

/// Per-byte gear value: the byte's bits reversed within a 32-bit word.
#[inline]
pub fn gear(byte: u8) -> u64 {
    u64::from(u32::from(byte).reverse_bits())
}

/// Find the cut offset for `data`, which holds the next unconsumed bytes.
///
/// Returns a length in `1..=min(data.len(), sizes.max)`, or the whole
/// window when it is no longer than `sizes.min`.
pub fn find_cut_point(data: &[u8], sizes: &ChunkSizes) -> usize {
    let mut n = data.len();
    if n <= sizes.min {
        return n;
    }
    if n > sizes.max {
        n = sizes.max;
    }

    let scan_end = n - sizes.min;

    let cut = if n <= sizes.normal {
        first_cut(data, sizes.min..scan_end, MASK_S)
    } else {
        let normal_end = sizes.normal.saturating_sub(sizes.min);
        first_cut(data, sizes.min..normal_end, MASK_L)
            .or_else(|| first_cut(data, sizes.min.max(normal_end)..scan_end, MASK_S))
    };

    cut.unwrap_or(n)
}

fn first_cut(data: &[u8], range: Range<usize>, mask: u64) -> Option<usize> {
    if range.start >= range.end {
        return None;
    }
    data[range.clone()]
        .iter()
        .position(|&b| gear(b) & mask == 0)
        .map(|i| range.start + i + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gear_places_byte_in_high_bits() {
        assert_eq!(gear(0), 0);
        assert_eq!(gear(1), 0x8000_0000);
        assert_eq!(gear(0x80), 0x0100_0000);
        assert_eq!(gear(0xff), 0xff00_0000);
    }

    #[test]
    fn test_short_window_is_taken_whole() {
        let sizes = ChunkSizes::default();
        let data = vec![0u8; sizes.min];
        assert_eq!(find_cut_point(&data, &sizes), sizes.min);
        assert_eq!(find_cut_point(&data[..10], &sizes), 10);
        assert_eq!(find_cut_point(&[], &sizes), 0);
    }

    #[test]
    fn test_zero_bytes_cut_right_after_min() {
        // gear(0) & mask == 0 everywhere, so the first candidate wins.
        let sizes = ChunkSizes::default();
        let data = vec![0u8; sizes.max];
        assert_eq!(find_cut_point(&data, &sizes), sizes.min + 1);
    }

    #[test]
    fn test_no_boundary_cuts_at_max() {
        let sizes = ChunkSizes::default();
        let data = vec![0xffu8; sizes.max * 2];
        assert_eq!(find_cut_point(&data, &sizes), sizes.max);

        let shorter = vec![0xffu8; sizes.normal + 100];
        assert_eq!(find_cut_point(&shorter, &sizes), shorter.len());
    }

    #[test]
    fn test_large_mask_tier_used_before_normal() {
        let sizes = ChunkSizes::default();
        let mut data = vec![0xffu8; sizes.max];
        // 0x40 has bit 6 set, so gear(0x40) = 0x0200_0000 (bit 25): rejected by both masks.
        // 0x20 -> gear bit 26, which neither mask tests: accepted by both.
        data[sizes.min + 10] = 0x40;
        data[sizes.min + 20] = 0x20;
        assert_eq!(find_cut_point(&data, &sizes), sizes.min + 21);
    }

    #[test]
    fn test_small_mask_tier_after_normal() {
        let sizes = ChunkSizes::default();
        let mut data = vec![0xffu8; sizes.max];
        let pos = sizes.normal + 500;
        data[pos] = 0x10;
        assert_eq!(find_cut_point(&data, &sizes), pos + 1);
    }

    #[test]
    fn test_tail_guard_region_never_cut() {
        let sizes = ChunkSizes::default();
        let mut data = vec![0xffu8; sizes.max];
        // Inside the last `min` bytes: ignored.
        data[sizes.max - 10] = 0x00;
        assert_eq!(find_cut_point(&data, &sizes), sizes.max);
    }

    #[test]
    fn test_normal_below_min_skips_large_tier() {
        let sizes = ChunkSizes {
            min: 4096,
            max: 131072,
            normal: 1074,
        };
        let mut data = vec![0xffu8; sizes.max];
        data[5000] = 0x00;
        assert_eq!(find_cut_point(&data, &sizes), 5001);
    }
}
