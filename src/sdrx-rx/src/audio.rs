// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Audio device abstraction and the sinks that ship with the receiver.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use sdrx_core::{RadioError, RadioResult};

// ---------------------------------------------------------------------------
// Device interface
// ---------------------------------------------------------------------------

/// Anything that plays or captures mono `f32` audio at a fixed rate.
///
/// `send` and `recv` never block when `when_ready` is set: they transfer
/// nothing and return 0 if the device cannot take or give `len` samples.
pub trait AudioIfc: Send {
    fn sample_rate(&self) -> u32;

    fn send(&mut self, samples: &[f32], when_ready: bool) -> RadioResult<usize>;

    /// Room for `len` more samples on the output side?
    fn send_buffer_ready(&self, len: usize) -> bool;

    /// Samples accepted by `send` but not yet played. `None` when the
    /// device cannot tell, which turns clock-drift correction off.
    fn send_backlog(&self) -> Option<usize> {
        None
    }

    fn recv(&mut self, buf: &mut [f32], when_ready: bool) -> RadioResult<usize>;

    fn recv_buffer_ready(&self, len: usize) -> bool;

    /// Pause playback, e.g. while the receiver is muted.
    fn sleep_out(&mut self);
    fn wake_out(&mut self);
    /// Pause capture and drop whatever was buffered.
    fn sleep_in(&mut self);
    fn wake_in(&mut self);

    fn set_out_gain(&mut self, gain: f32) -> bool;
    fn out_gain(&self) -> f32;
    fn set_in_gain(&mut self, gain: f32) -> bool;
    fn in_gain(&self) -> f32;

    fn playback_state(&self) -> &'static str {
        "UNKNOWN"
    }

    fn capture_state(&self) -> &'static str {
        "UNKNOWN"
    }
}

fn running_state(asleep: bool) -> &'static str {
    if asleep {
        "SLEEPING"
    } else {
        "RUNNING"
    }
}

/// Shared gain and sleep flags used by the sinks below.
#[derive(Debug, Clone, Copy)]
struct Controls {
    out_gain: f32,
    in_gain: f32,
    out_asleep: bool,
    in_asleep: bool,
}

impl Default for Controls {
    fn default() -> Self {
        Self {
            out_gain: 1.0,
            in_gain: 1.0,
            out_asleep: false,
            in_asleep: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Null device
// ---------------------------------------------------------------------------

/// Discards audio but drains its queue in real time, so the receiver sees
/// the same backlog behaviour as with a sound card.
pub struct NullAudio {
    sample_rate: u32,
    queue_limit: usize,
    started: Option<Instant>,
    sent: u64,
    controls: Controls,
}

impl NullAudio {
    /// `queue_limit` is the device-side buffer depth in samples.
    pub fn new(sample_rate: u32, queue_limit: usize) -> Self {
        Self {
            sample_rate,
            queue_limit,
            started: None,
            sent: 0,
            controls: Controls::default(),
        }
    }

    pub fn samples_sent(&self) -> u64 {
        self.sent
    }

    fn played(&self) -> u64 {
        self.started.map_or(0, |t| {
            (t.elapsed().as_secs_f64() * self.sample_rate as f64) as u64
        })
    }

    fn backlog(&self) -> usize {
        self.sent.saturating_sub(self.played()) as usize
    }
}

impl AudioIfc for NullAudio {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn send(&mut self, samples: &[f32], when_ready: bool) -> RadioResult<usize> {
        if when_ready && !self.send_buffer_ready(samples.len()) {
            return Ok(0);
        }
        if self.controls.out_asleep {
            return Ok(0);
        }
        if self.started.is_none() {
            self.started = Some(Instant::now());
        }
        // An underrun restarts the clock rather than letting the backlog
        // go negative.
        if self.backlog() == 0 && self.sent > 0 {
            self.started = Some(Instant::now());
            self.sent = 0;
        }
        self.sent += samples.len() as u64;
        Ok(samples.len())
    }

    fn send_buffer_ready(&self, len: usize) -> bool {
        self.backlog() + len <= self.queue_limit
    }

    fn send_backlog(&self) -> Option<usize> {
        Some(self.backlog())
    }

    fn recv(&mut self, buf: &mut [f32], when_ready: bool) -> RadioResult<usize> {
        if when_ready && !self.recv_buffer_ready(buf.len()) {
            return Ok(0);
        }
        buf.fill(0.0);
        Ok(buf.len())
    }

    fn recv_buffer_ready(&self, _len: usize) -> bool {
        !self.controls.in_asleep
    }

    fn sleep_out(&mut self) {
        self.controls.out_asleep = true;
    }

    fn wake_out(&mut self) {
        self.controls.out_asleep = false;
        self.started = None;
        self.sent = 0;
    }

    fn sleep_in(&mut self) {
        self.controls.in_asleep = true;
    }

    fn wake_in(&mut self) {
        self.controls.in_asleep = false;
    }

    fn set_out_gain(&mut self, gain: f32) -> bool {
        self.controls.out_gain = gain;
        true
    }

    fn out_gain(&self) -> f32 {
        self.controls.out_gain
    }

    fn set_in_gain(&mut self, gain: f32) -> bool {
        self.controls.in_gain = gain;
        true
    }

    fn in_gain(&self) -> f32 {
        self.controls.in_gain
    }

    fn playback_state(&self) -> &'static str {
        running_state(self.controls.out_asleep)
    }

    fn capture_state(&self) -> &'static str {
        running_state(self.controls.in_asleep)
    }
}

// ---------------------------------------------------------------------------
// In-memory capture
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct CaptureState {
    samples: Vec<f32>,
    sends: usize,
    backlog: Option<usize>,
    input: Vec<f32>,
}

/// Records everything sent into a buffer shared with a [`CaptureHandle`].
pub struct CaptureAudio {
    sample_rate: u32,
    state: Arc<Mutex<CaptureState>>,
    controls: Controls,
}

/// Reader side of a [`CaptureAudio`].
#[derive(Clone)]
pub struct CaptureHandle {
    state: Arc<Mutex<CaptureState>>,
}

fn lock_state(state: &Mutex<CaptureState>) -> MutexGuard<'_, CaptureState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

impl CaptureAudio {
    pub fn new(sample_rate: u32) -> (Self, CaptureHandle) {
        let state = Arc::new(Mutex::new(CaptureState::default()));
        (
            Self {
                sample_rate,
                state: Arc::clone(&state),
                controls: Controls::default(),
            },
            CaptureHandle { state },
        )
    }
}

impl CaptureHandle {
    pub fn samples(&self) -> Vec<f32> {
        lock_state(&self.state).samples.clone()
    }

    /// Number of `send` calls that delivered audio.
    pub fn send_count(&self) -> usize {
        lock_state(&self.state).sends
    }

    pub fn clear(&self) {
        let mut state = lock_state(&self.state);
        state.samples.clear();
        state.sends = 0;
    }

    /// Make the device report a fixed playback backlog.
    pub fn set_backlog(&self, backlog: Option<usize>) {
        lock_state(&self.state).backlog = backlog;
    }

    /// Queue samples for `recv` to return.
    pub fn push_input(&self, samples: &[f32]) {
        lock_state(&self.state).input.extend_from_slice(samples);
    }
}

impl AudioIfc for CaptureAudio {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn send(&mut self, samples: &[f32], _when_ready: bool) -> RadioResult<usize> {
        if self.controls.out_asleep {
            return Ok(0);
        }
        let mut state = lock_state(&self.state);
        state.samples.extend_from_slice(samples);
        state.sends += 1;
        Ok(samples.len())
    }

    fn send_buffer_ready(&self, _len: usize) -> bool {
        !self.controls.out_asleep
    }

    fn send_backlog(&self) -> Option<usize> {
        lock_state(&self.state).backlog
    }

    fn recv(&mut self, buf: &mut [f32], when_ready: bool) -> RadioResult<usize> {
        let mut state = lock_state(&self.state);
        if when_ready && state.input.len() < buf.len() {
            return Ok(0);
        }
        let n = buf.len().min(state.input.len());
        buf[..n].copy_from_slice(&state.input[..n]);
        state.input.drain(..n);
        Ok(n)
    }

    fn recv_buffer_ready(&self, len: usize) -> bool {
        lock_state(&self.state).input.len() >= len
    }

    fn sleep_out(&mut self) {
        self.controls.out_asleep = true;
    }

    fn wake_out(&mut self) {
        self.controls.out_asleep = false;
    }

    fn sleep_in(&mut self) {
        self.controls.in_asleep = true;
        lock_state(&self.state).input.clear();
    }

    fn wake_in(&mut self) {
        self.controls.in_asleep = false;
    }

    fn set_out_gain(&mut self, gain: f32) -> bool {
        self.controls.out_gain = gain;
        true
    }

    fn out_gain(&self) -> f32 {
        self.controls.out_gain
    }

    fn set_in_gain(&mut self, gain: f32) -> bool {
        self.controls.in_gain = gain;
        true
    }

    fn in_gain(&self) -> f32 {
        self.controls.in_gain
    }

    fn playback_state(&self) -> &'static str {
        running_state(self.controls.out_asleep)
    }
}

// ---------------------------------------------------------------------------
// Raw file sink
// ---------------------------------------------------------------------------

/// Writes audio as raw little-endian `f32` samples.
pub struct FileAudio {
    sample_rate: u32,
    writer: BufWriter<File>,
    written: u64,
    controls: Controls,
}

impl FileAudio {
    pub fn create(path: &Path, sample_rate: u32) -> RadioResult<Self> {
        let file = File::create(path)
            .map_err(|e| RadioError::Audio(format!("cannot create {}: {}", path.display(), e)))?;
        Ok(Self {
            sample_rate,
            writer: BufWriter::new(file),
            written: 0,
            controls: Controls::default(),
        })
    }

    pub fn samples_written(&self) -> u64 {
        self.written
    }

    pub fn flush(&mut self) -> RadioResult<()> {
        self.writer
            .flush()
            .map_err(|e| RadioError::Audio(e.to_string()))
    }
}

impl AudioIfc for FileAudio {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn send(&mut self, samples: &[f32], _when_ready: bool) -> RadioResult<usize> {
        if self.controls.out_asleep {
            return Ok(0);
        }
        for s in samples {
            self.writer
                .write_all(&(s * self.controls.out_gain).to_le_bytes())
                .map_err(|e| RadioError::Audio(e.to_string()))?;
        }
        self.written += samples.len() as u64;
        Ok(samples.len())
    }

    fn send_buffer_ready(&self, _len: usize) -> bool {
        !self.controls.out_asleep
    }

    fn recv(&mut self, _buf: &mut [f32], _when_ready: bool) -> RadioResult<usize> {
        Ok(0)
    }

    fn recv_buffer_ready(&self, _len: usize) -> bool {
        false
    }

    fn sleep_out(&mut self) {
        self.controls.out_asleep = true;
    }

    fn wake_out(&mut self) {
        self.controls.out_asleep = false;
    }

    fn sleep_in(&mut self) {
        self.controls.in_asleep = true;
    }

    fn wake_in(&mut self) {
        self.controls.in_asleep = false;
    }

    fn set_out_gain(&mut self, gain: f32) -> bool {
        self.controls.out_gain = gain;
        true
    }

    fn out_gain(&self) -> f32 {
        self.controls.out_gain
    }

    fn set_in_gain(&mut self, _gain: f32) -> bool {
        false
    }

    fn in_gain(&self) -> f32 {
        self.controls.in_gain
    }

    fn playback_state(&self) -> &'static str {
        running_state(self.controls.out_asleep)
    }
}

impl Drop for FileAudio {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}
