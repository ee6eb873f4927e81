//! The DLL-filtered stream clock.
//!
//! [`StreamClock`] turns discrete "data enqueued" events from a FIFO
//! writer into a smooth, monotonically advancing estimate of the media
//! position currently audible at the output device. A first-order
//! feedback loop, inspired by the paper "Using a DLL to Filter Time"
//! (F. Adriaensen, 2005), drives a time-scale factor `Tf` that pulls the
//! interpolated position toward the ideal position implied by the write
//! pointer and the known end-to-end latency.
//!
//! The interpolated position under the current epoch `(t0, pos0)` is
//!
//! ```text
//! t = pos0 + Tf * (now - t0)
//! ```
//!
//! `Tf` stays near 1.0 and is re-derived on every buffer post. Call
//! [`post_buffer`](StreamClock::post_buffer) at the beginning of each
//! FIFO-filling callback with the playable duration just written; query
//! [`get_stream_usecs`](StreamClock::get_stream_usecs) from any thread at
//! any rate.
//!
//! Empirical stability criteria, carried over from production use:
//!
//! - the configured latency covers all FIFOs between the writer and the
//!   audible output,
//! - individual posts (including aggregated ones) stay under half the
//!   latency,
//! - posts within any latency-sized window sum to roughly the same
//!   amount (within about 5%).
//!
//! Two error conditions are handled inline: an **underrun** (the
//! interpolated position catches up to the write pointer) freezes time,
//! and an **overrun** (more than about twice the latency posted in a
//! short period) abruptly re-pins the epoch.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, trace, warn};

use crate::clock::{MonotonicClock, SystemClock};
use crate::error::ClockError;
use crate::state::{check_transition, TransportInput, TransportState};

/// Default end-to-end latency in microseconds (160 ms).
///
/// The audio latency is typically twice the FIFO size; a common HAL runs
/// 4 x 20 ms buffers. Used whenever [`set_latency`](StreamClock::set_latency)
/// is given a degenerate value.
pub const DEFAULT_LATENCY_USECS: i64 = 20_000 * 4 * 2;

/// Floor for the cold-start offset between the write pointer and the
/// initial interpolated position. Half the latency, but never less than
/// this. Found by trial and error to stabilize the loop within about
/// 2-4 video frames.
const MIN_INITIAL_OFFSET_USECS: i64 = 40_000;

/// Clamp bounds for the time-scale factor while rolling.
const TF_MIN: f64 = 0.5;
const TF_MAX: f64 = 2.0;

/// Posts closer to the previous epoch than `frame_usecs` divided by this
/// are coalesced into `queued` instead of updating the epoch.
const AGGREGATION_DIVISOR: i64 = 4;

/// Epoch state. Lives behind the clock's mutex; every field is in
/// microseconds except `state` and the dimensionless `tf`.
#[derive(Debug)]
struct Epoch {
    state: TransportState,
    /// Time-scale factor: media usecs produced per wall usec.
    tf: f64,
    /// Wall-clock microsecond the current epoch was pinned at.
    t0: i64,
    /// Media microsecond corresponding to `t0`.
    pos0: i64,
    /// Cumulative media usecs written into the FIFO as of the previous post.
    read: i64,
    /// Media usecs announced by the current post, not yet rolled into `read`.
    queued: i64,
    /// End-to-end FIFO latency.
    latency: i64,
    /// Last media time ever reported out, for rewind detection.
    last: i64,
    /// Wall-clock time of `last`.
    now_last: i64,
}

/// Point-in-time capture of the clock's epoch for debug overlays and log
/// dumps. Plain fields for robust serialization.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClockSnapshot {
    /// Transport state at capture time.
    pub state: TransportState,
    /// Time-scale factor (media usecs per wall usec).
    pub time_factor: f64,
    /// Media position at the epoch pin.
    pub position: i64,
    /// Cumulative write position (`read + queued`).
    pub read_pointer: i64,
    /// Usecs announced by the most recent post, not yet rolled in.
    pub queued: i64,
    /// Configured end-to-end latency.
    pub latency: i64,
    /// Last media time reported to any reader.
    pub last_reported: i64,
}

/// Monotonic media-clock interpolator for a constant-throughput FIFO.
///
/// Cheaply cloneable: clones share the same epoch, so the writer side and
/// any number of reader threads can each hold their own handle. All state
/// sits behind a single mutex; no operation performs I/O, sleeps, or
/// blocks on anything but that lock.
///
/// One dedicated writer thread calls [`post_buffer`](Self::post_buffer)
/// and the lifecycle mutators; readers call
/// [`get_stream_usecs`](Self::get_stream_usecs) and the accessors.
pub struct StreamClock<C: MonotonicClock = SystemClock> {
    epoch: Arc<Mutex<Epoch>>,
    clock: C,
}

impl StreamClock<SystemClock> {
    /// Create a clock driven by the OS monotonic clock.
    ///
    /// Starts stopped, with the default latency, pinned at media time 0.
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for StreamClock<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: MonotonicClock + Clone> Clone for StreamClock<C> {
    fn clone(&self) -> Self {
        Self {
            epoch: Arc::clone(&self.epoch),
            clock: self.clock.clone(),
        }
    }
}

impl<C: MonotonicClock> StreamClock<C> {
    /// Create a clock driven by an explicit time source.
    pub fn with_clock(clock: C) -> Self {
        let sc = Self {
            epoch: Arc::new(Mutex::new(Epoch {
                state: TransportState::Stopped,
                tf: 0.0,
                t0: 0,
                pos0: 0,
                read: 0,
                queued: 0,
                latency: DEFAULT_LATENCY_USECS,
                last: 0,
                now_last: 0,
            })),
            clock,
        };
        sc.seek(0);
        sc
    }

    /// Set the end-to-end FIFO latency.
    ///
    /// Non-positive values restore [`DEFAULT_LATENCY_USECS`]. May be
    /// called in any state; takes effect on the next feedback cycle and
    /// never touches the epoch.
    pub fn set_latency(&self, lat_usecs: i64) {
        let mut epoch = self.epoch.lock();
        if lat_usecs > 0 {
            epoch.latency = lat_usecs;
        } else {
            warn!(requested = lat_usecs, "non-positive latency, restoring default");
            epoch.latency = DEFAULT_LATENCY_USECS;
        }
        debug!(latency = epoch.latency, "latency set");
    }

    /// Current interpolated media time in microseconds.
    ///
    /// Never blocks waiting on the producer. While rolling the result is
    /// monotonic and capped at the read pointer; hitting the cap is an
    /// underrun and freezes the clock. While paused the frozen position
    /// is returned unchanged.
    pub fn get_stream_usecs(&self) -> i64 {
        let mut epoch = self.epoch.lock();
        let now = self.clock.now_usecs();

        if epoch.state == TransportState::Paused {
            return epoch.pos0;
        }

        if now < epoch.t0 {
            error!(now, t0 = epoch.t0, "monotonic clock stepped backwards");
        }
        let mut dt = epoch.tf * (now - epoch.t0) as f64;
        if dt < 0.0 {
            dt = 0.0;
        }
        let mut t_media = epoch.pos0 + dt as i64;

        if t_media < epoch.last {
            warn!(
                delta = t_media - epoch.last,
                tf = epoch.tf,
                t0 = epoch.t0,
                pos0 = epoch.pos0,
                now,
                last = epoch.last,
                now_last = epoch.now_last,
                "time is rewinding"
            );
        }
        if t_media >= epoch.read + epoch.queued && epoch.state == TransportState::Rolling {
            t_media = epoch.read + epoch.queued;
            error!(position = t_media, "underrun in get_stream_usecs");
            err_underrun(&mut epoch);
        }

        epoch.last = t_media;
        epoch.now_last = now;

        trace!(
            t_media,
            t0 = epoch.t0,
            pos0 = epoch.pos0,
            tf = epoch.tf,
            read = epoch.read,
            queued = epoch.queued,
            latency = epoch.latency,
            now,
            "stream time query"
        );
        t_media
    }

    /// Re-pin the clock to `media_time`.
    ///
    /// While stopped or paused the clock freezes at `media_time`. While
    /// rolling the write pointer moves to `media_time` and the position
    /// re-pins one latency behind it. The state never changes.
    pub fn seek(&self, media_time: i64) {
        let mut epoch = self.epoch.lock();
        let now = self.clock.now_usecs();
        debug!(media_time, state = %epoch.state, "seek");

        match epoch.state {
            TransportState::Stopped | TransportState::Paused => {
                epoch.pos0 = media_time;
                epoch.read = media_time;
                epoch.queued = 0;
                epoch.t0 = now;
                epoch.tf = 0.0;
                epoch.last = media_time;
                epoch.now_last = 0;
            }
            TransportState::Rolling => {
                epoch.read = media_time;
                epoch.pos0 = media_time - epoch.latency;
                epoch.queued = 0;
                epoch.t0 = now;
                epoch.tf = 1.0;
                epoch.last = epoch.pos0;
                epoch.now_last = 0;
            }
        }
    }

    /// Pause the clock.
    ///
    /// With `flushing_fifo` the FIFOs are being discarded: the clock
    /// stops and re-pins at the end of everything that had been queued
    /// (this is also [`stop`](Self::stop)). Without it, a rolling clock
    /// freezes at the last reported time; in any other state the call is
    /// a no-op.
    pub fn pause(&self, flushing_fifo: bool) {
        let mut seek_to = -1;
        {
            let mut epoch = self.epoch.lock();
            debug!(flushing_fifo, state = %epoch.state, "pause");
            if flushing_fifo {
                set_state(&mut epoch, TransportState::Stopped, TransportInput::Stop);
                seek_to = epoch.read + epoch.queued;
            } else if epoch.state == TransportState::Rolling {
                set_state(&mut epoch, TransportState::Paused, TransportInput::Pause);
                epoch.read += epoch.queued;
                epoch.pos0 = epoch.last;
                epoch.t0 = self.clock.now_usecs();
                epoch.queued = 0;
            }
        }
        // The lock is released before the internal seek reacquires it;
        // the mutex is not re-entrant.
        if seek_to >= 0 {
            self.seek(seek_to);
        }
    }

    /// Stop the clock and flush. Equivalent to `pause(true)`.
    pub fn stop(&self) {
        self.pause(true);
    }

    /// Stop the clock and rewind to media time 0.
    pub fn reset(&self) {
        self.stop();
        self.seek(0);
    }

    /// Resume a paused clock.
    ///
    /// The next [`post_buffer`](Self::post_buffer) drives the transition
    /// back to rolling with a one-cycle unity time factor. Calling this
    /// in any other state logs an error; the epoch write still happens.
    pub fn resume(&self) {
        let mut epoch = self.epoch.lock();
        if epoch.state != TransportState::Paused {
            let e = ClockError::NotPaused { state: epoch.state };
            error!(error = %e, "resume");
        }
        epoch.t0 = self.clock.now_usecs();
        epoch.tf = 1.0;
    }

    /// Announce that `frame_usecs` of playable media was just written
    /// into the FIFO.
    ///
    /// Writer-only; call at the beginning of each FIFO-filling callback.
    /// A cold start pins the epoch half a latency behind the write
    /// pointer; after that every post runs one feedback cycle that
    /// re-derives the time factor from the position error. Posts arriving
    /// faster than a quarter of their nominal cadence are aggregated into
    /// the queue without touching the epoch.
    ///
    /// The value of `frame_usecs` is held in `queued` and rolled into the
    /// cumulative write on the next post: the moment this function is
    /// called says a lot about the timing of the *previous* post, and
    /// nothing yet about the data being announced now.
    pub fn post_buffer(&self, frame_usecs: i64) {
        let mut epoch = self.epoch.lock();
        let mut set_tf_to_unity = false;

        // Startup / resumption paths.
        if epoch.state != TransportState::Rolling {
            if epoch.state == TransportState::Paused {
                set_state(&mut epoch, TransportState::Rolling, TransportInput::PostBuffer);
                set_tf_to_unity = true;
            }

            if epoch.state == TransportState::Stopped {
                let mut initial_offset = epoch.latency / 2;
                if epoch.queued != 0 {
                    warn!(queued = epoch.queued, "cold start with queued data");
                }
                epoch.t0 = self.clock.now_usecs();
                set_state(&mut epoch, TransportState::Rolling, TransportInput::PostBuffer);
                epoch.read += frame_usecs;
                if initial_offset < MIN_INITIAL_OFFSET_USECS {
                    initial_offset = MIN_INITIAL_OFFSET_USECS;
                }
                epoch.pos0 = epoch.read - initial_offset;
                epoch.queued = 0;
                epoch.tf = 1.0;
                return;
            }
        }

        let t1 = self.clock.now_usecs();
        let dt = t1 - epoch.t0;

        if epoch.state == TransportState::Rolling && dt < frame_usecs / AGGREGATION_DIVISOR {
            // This call is hard on the heels of the previous one; combine
            // the data and treat both as a single post.
            epoch.queued += frame_usecs;
            trace!(queued = epoch.queued, dt, "aggregated post");
            return;
        }

        // Feedback cycle: roll the previous post into the cumulative
        // write, project the position forward monotonically, and steer
        // the time factor toward the ideal position `read - latency`.
        epoch.read += epoch.queued;
        let pos1 = (epoch.pos0 as f64 + epoch.tf * dt as f64) as i64;
        let pos1_desired = epoch.read - epoch.latency;
        let mut e = (pos1 - pos1_desired) as f64;

        if pos1 < epoch.last && epoch.last > 0 {
            // Ignored at the start of playback.
            warn!(
                pos1,
                last = epoch.last,
                delta = pos1 - epoch.last,
                "this cycle will cause a rewind"
            );
        }
        if set_tf_to_unity {
            trace!(e, "unity re-lock, error discarded");
            e = 0.0;
            epoch.tf = 1.0;
        } else {
            epoch.tf = 1.0 - e / epoch.latency as f64;
        }

        epoch.pos0 = pos1;
        epoch.t0 = t1;
        let posted_this_time = epoch.queued;
        epoch.queued = frame_usecs;

        if epoch.tf >= TF_MAX {
            epoch.tf = TF_MAX;
            error!(read = epoch.read, pos0 = epoch.pos0, "overrun detected");
            err_overrun(&mut epoch, self.clock.now_usecs());
        } else if epoch.tf < TF_MIN {
            epoch.tf = TF_MIN;
        }

        if epoch.pos0 >= epoch.read {
            error!(pos0 = epoch.pos0, read = epoch.read, "underrun in post_buffer");
            err_underrun(&mut epoch);
        }

        trace!(
            t0 = epoch.t0,
            dt,
            tf = epoch.tf,
            pos0 = epoch.pos0,
            read = epoch.read,
            queued = epoch.queued,
            posted_this_time,
            latency = epoch.latency,
            e,
            "feedback cycle"
        );
    }

    /// Media microseconds announced by the most recent post but not yet
    /// rolled into the cumulative write.
    pub fn usecs_queued(&self) -> i64 {
        self.epoch.lock().queued
    }

    /// Current cumulative write position in media time (`read + queued`).
    pub fn read_pointer(&self) -> i64 {
        let epoch = self.epoch.lock();
        epoch.read + epoch.queued
    }

    /// Current transport state.
    pub fn state(&self) -> TransportState {
        self.epoch.lock().state
    }

    /// Configured end-to-end latency in microseconds.
    pub fn latency(&self) -> i64 {
        self.epoch.lock().latency
    }

    /// Current time-scale factor.
    pub fn time_factor(&self) -> f64 {
        self.epoch.lock().tf
    }

    /// Override the cumulative write position when an outside party has
    /// authoritative knowledge of the FIFO write pointer.
    ///
    /// Adjusts `read` so that [`read_pointer`](Self::read_pointer) equals
    /// `rp`; the rest of the epoch is untouched.
    pub fn forcibly_update_read_pointer(&self, rp: i64) {
        let mut epoch = self.epoch.lock();
        epoch.read = rp - epoch.queued;
        debug!(read = epoch.read, queued = epoch.queued, "read pointer forcibly updated");
    }

    /// Capture a serializable snapshot of the epoch for diagnostics.
    pub fn snapshot(&self) -> ClockSnapshot {
        let epoch = self.epoch.lock();
        ClockSnapshot {
            state: epoch.state,
            time_factor: epoch.tf,
            position: epoch.pos0,
            read_pointer: epoch.read + epoch.queued,
            queued: epoch.queued,
            latency: epoch.latency,
            last_reported: epoch.last,
        }
    }
}

/// Apply a state change. Taking `&mut Epoch` encodes that the caller
/// already holds the lock. Same-state requests are ignored; an illegal
/// (from, to, input) triple is logged but the new state is still applied.
fn set_state(epoch: &mut Epoch, to: TransportState, input: TransportInput) {
    trace!(from = %epoch.state, to = %to, input = %input, "transport transition");
    if epoch.state == to {
        debug!(state = %to, input = %input, "state change requested to current state");
        return;
    }
    if let Err(e) = check_transition(epoch.state, to, input) {
        error!(error = %e, "transport logic error");
    }
    epoch.state = to;
}

/// The interpolated position caught up to the writer: freeze time at the
/// read pointer and stop. Lock must already be held.
fn err_underrun(epoch: &mut Epoch) {
    epoch.tf = 0.0;
    epoch.read += epoch.queued;
    epoch.pos0 = epoch.read;
    epoch.queued = 0;
    set_state(epoch, TransportState::Stopped, TransportInput::ErrUnderrun);
}

/// The interpolated position fell about two latencies behind the writer:
/// abruptly re-pin the epoch at the ideal position. Lock must already be
/// held. The time factor was already clamped by the caller.
fn err_overrun(epoch: &mut Epoch, now: i64) {
    if epoch.state == TransportState::Rolling {
        epoch.pos0 = epoch.read - epoch.latency;
        epoch.t0 = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn clock_with_latency(latency: i64) -> (StreamClock<ManualClock>, ManualClock) {
        let time = ManualClock::new();
        let sc = StreamClock::with_clock(time.clone());
        sc.set_latency(latency);
        (sc, time)
    }

    #[test]
    fn new_clock_is_stopped_at_zero() {
        let sc = StreamClock::new();
        assert_eq!(sc.state(), TransportState::Stopped);
        assert_eq!(sc.latency(), DEFAULT_LATENCY_USECS);
        assert_eq!(sc.read_pointer(), 0);
        assert_eq!(sc.usecs_queued(), 0);
    }

    #[test]
    fn stopped_clock_is_frozen() {
        let (sc, time) = clock_with_latency(100_000);
        assert_eq!(sc.get_stream_usecs(), 0);
        time.advance(5_000_000);
        assert_eq!(sc.get_stream_usecs(), 0);
    }

    #[test]
    fn set_latency_restores_default_on_degenerate_value() {
        let (sc, _time) = clock_with_latency(100_000);
        assert_eq!(sc.latency(), 100_000);
        sc.set_latency(0);
        assert_eq!(sc.latency(), DEFAULT_LATENCY_USECS);
        sc.set_latency(-5);
        assert_eq!(sc.latency(), DEFAULT_LATENCY_USECS);
    }

    #[test]
    fn cold_start_pins_half_latency_behind() {
        let (sc, _time) = clock_with_latency(200_000);
        sc.post_buffer(20_000);

        let snap = sc.snapshot();
        assert_eq!(snap.state, TransportState::Rolling);
        assert_eq!(snap.read_pointer, 20_000);
        assert_eq!(snap.queued, 0);
        assert_eq!(snap.position, 20_000 - 100_000);
        assert!((snap.time_factor - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn cold_start_offset_has_a_floor() {
        // latency/2 below 40ms gets floored at 40ms
        let (sc, _time) = clock_with_latency(50_000);
        sc.post_buffer(20_000);
        assert_eq!(sc.snapshot().position, 20_000 - 40_000);
    }

    #[test]
    fn rolling_time_advances_with_unity_factor() {
        let (sc, time) = clock_with_latency(100_000);
        sc.post_buffer(20_000);
        let t0 = sc.get_stream_usecs();
        time.advance(10_000);
        let t1 = sc.get_stream_usecs();
        assert_eq!(t1 - t0, 10_000);
    }

    #[test]
    fn aggregation_coalesces_rapid_posts() {
        let (sc, time) = clock_with_latency(100_000);
        sc.post_buffer(40_000);
        time.advance(40_000);
        sc.post_buffer(40_000);
        let before = sc.snapshot();

        // 5ms after the previous post, under the 10ms aggregation window
        time.advance(5_000);
        sc.post_buffer(40_000);

        let after = sc.snapshot();
        assert_eq!(after.queued, before.queued + 40_000);
        assert_eq!(after.position, before.position);
        assert_eq!(after.time_factor, before.time_factor);
    }

    #[test]
    fn underrun_via_query_freezes_at_read_pointer() {
        let (sc, time) = clock_with_latency(100_000);
        sc.post_buffer(20_000);
        time.advance(10_000_000);

        let t = sc.get_stream_usecs();
        assert_eq!(t, 20_000);
        assert_eq!(sc.state(), TransportState::Stopped);
        assert_eq!(sc.time_factor(), 0.0);

        // Frozen from here on
        time.advance(1_000_000);
        assert_eq!(sc.get_stream_usecs(), 20_000);
    }

    #[test]
    fn underrun_via_post_buffer() {
        let (sc, time) = clock_with_latency(100_000);
        sc.post_buffer(20_000);
        // Long stall: the projection passes the write pointer even after
        // the queued data is rolled in.
        time.advance(400_000);
        sc.post_buffer(20_000);

        let snap = sc.snapshot();
        assert_eq!(snap.state, TransportState::Stopped);
        assert_eq!(snap.time_factor, 0.0);
        assert_eq!(snap.position, snap.read_pointer);
        assert_eq!(snap.queued, 0);
    }

    #[test]
    fn pause_freezes_at_last_reported_time() {
        let (sc, time) = clock_with_latency(100_000);
        sc.post_buffer(20_000);
        time.advance(5_000);
        let last = sc.get_stream_usecs();

        sc.pause(false);
        assert_eq!(sc.state(), TransportState::Paused);

        time.advance(1_000_000);
        assert_eq!(sc.get_stream_usecs(), last);
        assert_eq!(sc.get_stream_usecs(), last);
    }

    #[test]
    fn pause_folds_queued_into_read() {
        let (sc, time) = clock_with_latency(100_000);
        sc.post_buffer(20_000);
        time.advance(20_000);
        sc.post_buffer(20_000);
        assert_eq!(sc.usecs_queued(), 20_000);

        sc.pause(false);
        assert_eq!(sc.usecs_queued(), 0);
        assert_eq!(sc.read_pointer(), 40_000);
    }

    #[test]
    fn pause_when_not_rolling_is_a_no_op() {
        let (sc, _time) = clock_with_latency(100_000);
        let before = sc.snapshot();
        sc.pause(false);
        assert_eq!(sc.snapshot(), before);
    }

    #[test]
    fn resume_then_post_relocks_at_unity() {
        let (sc, time) = clock_with_latency(100_000);
        sc.post_buffer(20_000);
        time.advance(20_000);
        sc.post_buffer(20_000);
        time.advance(5_000);
        sc.get_stream_usecs();

        sc.pause(false);
        time.advance(3_000_000);
        sc.resume();
        assert_eq!(sc.state(), TransportState::Paused);

        time.advance(20_000);
        sc.post_buffer(20_000);
        assert_eq!(sc.state(), TransportState::Rolling);
        // One-cycle re-lock: the accumulated pause error is discarded
        assert!((sc.time_factor() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn resume_when_not_paused_still_writes_epoch() {
        let (sc, time) = clock_with_latency(100_000);
        time.advance(1_000);
        sc.resume();
        // Logged as a programmer error, but the write happens anyway
        assert_eq!(sc.state(), TransportState::Stopped);
        assert!((sc.time_factor() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn seek_while_stopped_pins_everything_at_target() {
        let (sc, _time) = clock_with_latency(100_000);
        sc.seek(1_000_000);
        let snap = sc.snapshot();
        assert_eq!(snap.position, 1_000_000);
        assert_eq!(snap.read_pointer, 1_000_000);
        assert_eq!(snap.time_factor, 0.0);
        assert_eq!(sc.get_stream_usecs(), 1_000_000);
    }

    #[test]
    fn seek_while_rolling_repins_one_latency_behind() {
        let (sc, time) = clock_with_latency(100_000);
        sc.post_buffer(20_000);
        time.advance(20_000);
        sc.post_buffer(20_000);

        sc.seek(5_000_000);
        let snap = sc.snapshot();
        assert_eq!(snap.state, TransportState::Rolling);
        assert_eq!(snap.read_pointer, 5_000_000);
        assert_eq!(snap.position, 5_000_000 - 100_000);
        assert!((snap.time_factor - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn stop_repins_at_end_of_queued_data() {
        let (sc, time) = clock_with_latency(100_000);
        sc.post_buffer(20_000);
        time.advance(20_000);
        sc.post_buffer(20_000);
        assert_eq!(sc.read_pointer(), 40_000);

        sc.stop();
        let snap = sc.snapshot();
        assert_eq!(snap.state, TransportState::Stopped);
        assert_eq!(snap.position, 40_000);
        assert_eq!(snap.read_pointer, 40_000);
        assert_eq!(sc.get_stream_usecs(), 40_000);
    }

    #[test]
    fn reset_rewinds_to_zero() {
        let (sc, time) = clock_with_latency(100_000);
        sc.post_buffer(20_000);
        time.advance(20_000);
        sc.post_buffer(20_000);

        sc.reset();
        assert_eq!(sc.state(), TransportState::Stopped);
        assert_eq!(sc.read_pointer(), 0);
        assert_eq!(sc.get_stream_usecs(), 0);
    }

    #[test]
    fn stop_after_negative_seek_keeps_position() {
        // The deferred internal seek only runs for non-negative targets.
        let (sc, _time) = clock_with_latency(100_000);
        sc.seek(-100);
        sc.stop();
        assert_eq!(sc.get_stream_usecs(), -100);
    }

    #[test]
    fn forcibly_update_read_pointer_preserves_queued() {
        let (sc, time) = clock_with_latency(100_000);
        sc.post_buffer(20_000);
        time.advance(20_000);
        sc.post_buffer(20_000);
        assert_eq!(sc.usecs_queued(), 20_000);

        sc.forcibly_update_read_pointer(90_000);
        assert_eq!(sc.read_pointer(), 90_000);
        assert_eq!(sc.usecs_queued(), 20_000);
    }

    #[test]
    fn clones_share_the_epoch() {
        let (sc, time) = clock_with_latency(100_000);
        let reader = sc.clone();

        sc.post_buffer(20_000);
        time.advance(10_000);
        assert_eq!(reader.state(), TransportState::Rolling);
        assert_eq!(reader.get_stream_usecs(), sc.get_stream_usecs());
    }

    #[test]
    fn snapshot_serialize_deserialize_roundtrip() {
        let (sc, time) = clock_with_latency(100_000);
        sc.post_buffer(20_000);
        time.advance(20_000);
        sc.post_buffer(20_000);

        let snap = sc.snapshot();
        let json = serde_json::to_string(&snap).unwrap();
        let back: ClockSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snap);
    }
}
