//! Heap operations - pure functions over `HeapInfo`

use super::heap_data::{HeapEpoch, HeapInfo, HeapInfoUniform};
use crate::constants::heap::{MAX_CAPACITY_EXP, MIN_CAPACITY_EXP};
use crate::error::{HiabError, HiabResult};

/// Size the heap for a viewport: smallest power of two holding
/// `avg_layers_per_pixel * width * height` slots, split into a near-square 2D store
pub fn compute_heap_info(
    width: u32,
    height: u32,
    avg_layers_per_pixel: u32,
    epoch: HeapEpoch,
) -> HiabResult<HeapInfo> {
    let min_size = avg_layers_per_pixel as u64 * width as u64 * height as u64;

    let mut capacity_exp = MIN_CAPACITY_EXP;
    while (1u64 << capacity_exp) < min_size {
        capacity_exp += 1;
        if capacity_exp > MAX_CAPACITY_EXP {
            log::error!(
                "[compute_heap_info] {}x{} at {} layers needs more than 2^{} slots",
                width,
                height,
                avg_layers_per_pixel,
                MAX_CAPACITY_EXP
            );
            return Err(HiabError::HeapTooLarge {
                capacity_exp,
                max_exp: MAX_CAPACITY_EXP,
            });
        }
    }

    let width_exp = (capacity_exp + 1) / 2;
    let height_exp = capacity_exp - width_exp;

    Ok(HeapInfo {
        capacity: 1 << capacity_exp,
        capacity_exp,
        width_exp,
        height_exp,
        x_mask: !(!0u32 << width_exp),
        y_shift: width_exp,
        viewport: (width, height),
        epoch,
    })
}

/// Linear heap index to 2D storage coordinate
#[inline]
pub fn encode(info: &HeapInfo, index: u32) -> (u32, u32) {
    (index & info.x_mask, index >> info.y_shift)
}

/// 2D storage coordinate back to the linear heap index
#[inline]
pub fn decode(info: &HeapInfo, x: u32, y: u32) -> u32 {
    (y << info.y_shift) | x
}

/// Row-major slot of a 2D coordinate inside the backing store
#[inline]
pub fn storage_slot(info: &HeapInfo, (x, y): (u32, u32)) -> usize {
    ((y as usize) << info.width_exp) + x as usize
}

/// Fail hard when a pass is handed storage from another addressing epoch
pub fn ensure_epoch(expected: HeapEpoch, found: HeapEpoch) -> HiabResult<()> {
    if expected != found {
        log::error!(
            "[ensure_epoch] Addressing epoch {} used against storage of epoch {}",
            expected.0,
            found.0
        );
        return Err(HiabError::AddressingEpochMismatch {
            expected: expected.0,
            found: found.0,
        });
    }
    Ok(())
}

/// Shader-side view of the heap configuration
pub fn heap_info_uniform(info: &HeapInfo) -> HeapInfoUniform {
    HeapInfoUniform {
        size: info.capacity,
        width: 1 << info.width_exp,
        x_mask: info.x_mask,
        y_shift: info.y_shift,
    }
}

impl HeapInfo {
    /// Backing store extent `(2^width_exp, 2^height_exp)`
    pub fn storage_extent(&self) -> (u32, u32) {
        (1 << self.width_exp, 1 << self.height_exp)
    }

    /// Slots usable for real nodes (index 0 is the sentinel)
    pub fn usable_slots(&self) -> u32 {
        self.capacity - 1
    }

    pub fn pixel_count(&self) -> usize {
        self.viewport.0 as usize * self.viewport.1 as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_a_sizing() {
        let info = compute_heap_info(100, 100, 2, HeapEpoch(0)).expect("heap info");
        assert_eq!(info.capacity, 32768);
        assert_eq!(info.capacity_exp, 15);
        assert_eq!((info.width_exp, info.height_exp), (8, 7));
        assert_eq!(info.x_mask, 0xFF);
        assert_eq!(info.y_shift, 8);
        assert_eq!(info.storage_extent(), (256, 128));
    }

    #[test]
    fn test_minimum_capacity() {
        let info = compute_heap_info(1, 1, 1, HeapEpoch(0)).expect("heap info");
        assert_eq!(info.capacity, 256);
        assert_eq!((info.width_exp, info.height_exp), (4, 4));
    }

    #[test]
    fn test_exact_power_of_two_is_not_rounded_up() {
        let info = compute_heap_info(256, 256, 1, HeapEpoch(0)).expect("heap info");
        assert_eq!(info.capacity, 65536);
    }

    #[test]
    fn test_too_large_heap_is_rejected() {
        let result = compute_heap_info(16384, 16384, 4, HeapEpoch(0));
        assert!(matches!(result, Err(HiabError::HeapTooLarge { .. })));
    }

    #[test]
    fn test_encode_decode_bijection() {
        let info = compute_heap_info(100, 100, 2, HeapEpoch(0)).expect("heap info");
        let (w, h) = info.storage_extent();
        let mut seen = vec![false; info.capacity as usize];
        for index in 0..info.capacity {
            let (x, y) = encode(&info, index);
            assert!(x < w && y < h);
            assert_eq!(decode(&info, x, y), index);
            let slot = storage_slot(&info, (x, y));
            assert!(!seen[slot], "slot {} hit twice", slot);
            seen[slot] = true;
        }
    }

    #[test]
    fn test_epoch_check() {
        assert!(ensure_epoch(HeapEpoch(2), HeapEpoch(2)).is_ok());
        assert!(matches!(
            ensure_epoch(HeapEpoch(2), HeapEpoch(1)),
            Err(HiabError::AddressingEpochMismatch {
                expected: 2,
                found: 1
            })
        ));
    }

    #[test]
    fn test_uniform_layout() {
        let info = compute_heap_info(100, 100, 2, HeapEpoch(0)).expect("heap info");
        let uniform = heap_info_uniform(&info);
        assert_eq!(uniform.size, 32768);
        assert_eq!(uniform.width, 256);
        assert_eq!(uniform.x_mask, 255);
        assert_eq!(uniform.y_shift, 8);
    }
}
