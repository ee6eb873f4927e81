//! Pure conversions between byte counts, sample counts, and microseconds.

const USECS_PER_SEC: i64 = 1_000_000;

/// Convert a byte count to playable microseconds.
///
/// `frame_size` is bytes per frame (sample size times channel count) and
/// `sample_rate` is frames per second. Whole frames are counted first,
/// then converted to time, matching how FIFO writes are accounted.
pub fn bytes_to_usecs(bytes: i64, frame_size: i64, sample_rate: i64) -> i64 {
    debug_assert!(frame_size > 0, "frame_size must be > 0");
    debug_assert!(sample_rate > 0, "sample_rate must be > 0");
    (bytes / frame_size) * USECS_PER_SEC / sample_rate
}

/// Convert a frame count to microseconds at the given sample rate.
pub fn samples_to_usecs(samples: i64, sample_rate: i64) -> i64 {
    debug_assert!(sample_rate > 0, "sample_rate must be > 0");
    samples * USECS_PER_SEC / sample_rate
}

/// Convert microseconds to a frame count at the given sample rate.
pub fn usecs_to_samples(usecs: i64, sample_rate: i64) -> i64 {
    debug_assert!(sample_rate > 0, "sample_rate must be > 0");
    usecs * sample_rate / USECS_PER_SEC
}
