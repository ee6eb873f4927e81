//! `elastic-clock` -- monotonic media-clock interpolation for FIFO audio
//! pipelines.
//!
//! If you have a FIFO sink (or source) whose average throughput is
//! expected to be constant, audio playback being the canonical case, this
//! crate turns the buffer writes into a monotonic clock source. A
//! first-order feedback loop scales elapsed wall time by a factor close
//! to 1.0, speeding the clock up or slowing it down based on how data is
//! flowing into the FIFO.
//!
//! - **Interpolator**: [`StreamClock`], the DLL-filtered clock itself
//! - **State machine**: [`TransportState`] (Stopped / Rolling / Paused)
//! - **Time sources**: [`SystemClock`] for production, [`ManualClock`]
//!   for tests and simulation
//! - **Conversions**: [`bytes_to_usecs`], [`samples_to_usecs`],
//!   [`usecs_to_samples`]
//! - **Diagnostics**: [`ClockSnapshot`], a serializable epoch capture
//!
//! # Architecture
//!
//! ```text
//! writer thread                          reader threads
//!   post_buffer(usecs)  ----+     +----  get_stream_usecs()
//!   seek/pause/resume/stop  |     |      usecs_queued/read_pointer
//!                           v     v
//!                     StreamClock (mutex-guarded epoch)
//!                           |
//!                           v
//!                  MonotonicClock (SystemClock / ManualClock)
//! ```
//!
//! # Usage
//!
//! ```rust
//! use elastic_clock::StreamClock;
//!
//! let clock = StreamClock::new();
//! clock.set_latency(2 * 80_000); // twice the FIFO size
//! clock.seek(0);
//!
//! // In the FIFO-filling callback, announce each write:
//! clock.post_buffer(20_000);
//!
//! // From any thread, at any rate:
//! let position = clock.get_stream_usecs();
//! # let _ = position;
//! ```

pub mod clock;
pub mod convert;
pub mod error;
pub mod interpolator;
pub mod state;

// Re-export the primary API at the crate root
pub use clock::{ManualClock, MonotonicClock, SystemClock};
pub use convert::{bytes_to_usecs, samples_to_usecs, usecs_to_samples};
pub use error::ClockError;
pub use interpolator::{ClockSnapshot, StreamClock, DEFAULT_LATENCY_USECS};
pub use state::{TransportInput, TransportState};
