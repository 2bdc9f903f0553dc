//! Size class table for the random workload.
//!
//! The benchmark only ever requests one of a handful of block sizes, spread
//! from a cache line up to four pages, so that both small-object and
//! page-sized paths of every backend get exercised.

/// Number of size classes the workload draws from.
pub const NUM_SIZE_CLASSES: usize = 5;

/// Largest request the workload ever issues.
pub const MAX_SIZE: usize = 16384;

/// Request size of each class in bytes, smallest first.
pub static SIZE_CLASSES: [usize; NUM_SIZE_CLASSES] = [64, 256, 1024, 4096, MAX_SIZE];

/// Get the request size for a given size class.
///
/// Panics if `cls >= NUM_SIZE_CLASSES`; callers draw `cls` from
/// `0..NUM_SIZE_CLASSES`.
#[inline]
pub fn class_to_size(cls: usize) -> usize {
    SIZE_CLASSES[cls]
}

/// Map a size back to its class index, if it is one of the workload sizes.
#[inline]
pub fn size_to_class(size: usize) -> Option<usize> {
    SIZE_CLASSES.iter().position(|&class_size| class_size == size)
}

/// Mean request size when classes are drawn uniformly.
pub fn mean_size() -> f64 {
    let total: usize = SIZE_CLASSES.iter().sum();
    total as f64 / NUM_SIZE_CLASSES as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workload_sizes() {
        assert_eq!(SIZE_CLASSES, [64, 256, 1024, 4096, 16384]);
    }

    #[test]
    fn test_round_trip_all_classes() {
        for cls in 0..NUM_SIZE_CLASSES {
            let size = class_to_size(cls);
            assert_eq!(size_to_class(size), Some(cls), "round-trip failed for class {}", cls);
        }
    }

    #[test]
    fn test_size_to_class_unknown() {
        assert_eq!(size_to_class(0), None);
        assert_eq!(size_to_class(65), None);
        assert_eq!(size_to_class(MAX_SIZE + 1), None);
    }

    #[test]
    fn test_classes_monotonically_increasing() {
        for i in 1..NUM_SIZE_CLASSES {
            assert!(
                SIZE_CLASSES[i] > SIZE_CLASSES[i - 1],
                "class {} size {} not greater than class {} size {}",
                i,
                SIZE_CLASSES[i],
                i - 1,
                SIZE_CLASSES[i - 1]
            );
        }
    }

    #[test]
    fn test_largest_class_is_max_size() {
        assert_eq!(class_to_size(NUM_SIZE_CLASSES - 1), MAX_SIZE);
    }

    #[test]
    fn test_mean_size() {
        assert_eq!(mean_size(), 4364.8);
    }
}
