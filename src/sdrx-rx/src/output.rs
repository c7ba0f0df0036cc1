// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Pooled audio buffers on their way to the audio device.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use sdrx_core::{BufferPool, RadioResult, RealPooledBuf};
use tracing::debug;

use crate::audio::AudioIfc;

/// Owns the audio device and a bounded FIFO of buffers waiting for it.
///
/// Buffers are handed to the device as soon as it has room; the queue only
/// fills while the device is behind. When it is full the oldest buffer is
/// discarded.
pub struct AudioOutput {
    device: Box<dyn AudioIfc>,
    pool: BufferPool<f32>,
    ready: Mutex<VecDeque<RealPooledBuf>>,
    max_ready: usize,
    buffer_len: usize,
    log_buffer_len: f32,
    level: f32,
    sent: u64,
    overflowed: u64,
}

impl AudioOutput {
    pub fn new(device: Box<dyn AudioIfc>, buffer_len: usize, max_ready: usize) -> Self {
        let buffer_len = buffer_len.max(1);
        Self {
            device,
            pool: BufferPool::with_buffers(buffer_len, max_ready.max(1)),
            ready: Mutex::new(VecDeque::with_capacity(max_ready)),
            max_ready: max_ready.max(1),
            buffer_len,
            log_buffer_len: (buffer_len as f32).log10(),
            level: -200.0,
            sent: 0,
            overflowed: 0,
        }
    }

    fn ready(&self) -> MutexGuard<'_, VecDeque<RealPooledBuf>> {
        self.ready.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn device(&self) -> &dyn AudioIfc {
        self.device.as_ref()
    }

    pub fn device_mut(&mut self) -> &mut dyn AudioIfc {
        self.device.as_mut()
    }

    pub fn buffer_len(&self) -> usize {
        self.buffer_len
    }

    /// A full-length buffer from the pool; contents are stale.
    pub fn buffer(&self) -> RealPooledBuf {
        self.pool.get()
    }

    /// Latest level estimate in dB, relative to the gain it was taken at.
    pub fn level(&self) -> f32 {
        self.level
    }

    pub fn sent(&self) -> u64 {
        self.sent
    }

    pub fn overflowed(&self) -> u64 {
        self.overflowed
    }

    pub fn ready_len(&self) -> usize {
        self.ready().len()
    }

    pub fn pool_allocated(&self) -> usize {
        self.pool.allocated()
    }

    /// Meter a finished buffer, queue it and push what the device takes.
    pub fn pend(&mut self, buf: RealPooledBuf, gain: f32) -> RadioResult<()> {
        let sumsq: f32 = 1.0e-19 + buf.as_slice().iter().map(|x| x * x).sum::<f32>();
        self.level = 10.0 * ((sumsq / gain.max(f32::MIN_POSITIVE)).log10() - self.log_buffer_len);
        {
            let mut ready = self.ready.lock().unwrap_or_else(|e| e.into_inner());
            if ready.len() >= self.max_ready {
                ready.pop_front();
                self.overflowed += 1;
            }
            ready.push_back(buf);
        }
        self.drain()?;
        Ok(())
    }

    /// Queue `count` buffers of silence.
    pub fn pend_silence(&mut self, count: usize) -> RadioResult<()> {
        for _ in 0..count {
            let mut buf = self.pool.get();
            buf.as_mut_slice().fill(0.0);
            self.pend(buf, 1.0)?;
        }
        Ok(())
    }

    /// Send queued buffers while the device has room. Returns the number
    /// of buffers delivered.
    pub fn drain(&mut self) -> RadioResult<usize> {
        let mut delivered = 0;
        loop {
            let Some(buf) = self.ready().pop_front() else {
                break;
            };
            if !self.device.send_buffer_ready(buf.len()) {
                self.ready().push_front(buf);
                break;
            }
            if self.device.send(buf.as_slice(), true)? == 0 {
                self.ready().push_front(buf);
                break;
            }
            delivered += 1;
            self.sent += 1;
        }
        Ok(delivered)
    }

    /// Throw away everything not yet delivered.
    pub fn flush(&self) -> usize {
        let mut ready = self.ready();
        let n = ready.len();
        ready.clear();
        if n > 0 {
            debug!("flushed {} audio buffer(s)", n);
        }
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::CaptureAudio;

    #[test]
    fn test_pend_delivers_and_meters() {
        let (audio, handle) = CaptureAudio::new(48_000);
        let mut out = AudioOutput::new(Box::new(audio), 4, 8);
        let mut buf = out.buffer();
        buf.as_mut_slice().copy_from_slice(&[1.0, -1.0, 1.0, -1.0]);
        out.pend(buf, 1.0).unwrap();
        assert_eq!(handle.samples(), vec![1.0, -1.0, 1.0, -1.0]);
        assert_eq!(out.sent(), 1);
        assert_eq!(out.ready_len(), 0);
        // Unit power: 10 * (log10(4) - log10(4)).
        assert!(out.level().abs() < 1e-4);
    }

    #[test]
    fn test_queue_holds_while_device_sleeps_and_flushes() {
        let (audio, handle) = CaptureAudio::new(48_000);
        let mut out = AudioOutput::new(Box::new(audio), 4, 3);
        out.device_mut().sleep_out();
        out.pend_silence(5).unwrap();
        assert_eq!(out.ready_len(), 3);
        assert_eq!(out.overflowed(), 2);
        assert!(handle.samples().is_empty());

        out.device_mut().wake_out();
        assert_eq!(out.drain().unwrap(), 3);
        assert_eq!(handle.samples().len(), 12);

        out.device_mut().sleep_out();
        out.pend_silence(2).unwrap();
        assert_eq!(out.flush(), 2);
        assert_eq!(out.ready_len(), 0);
    }

    #[test]
    fn test_buffers_return_to_pool() {
        let (audio, _handle) = CaptureAudio::new(48_000);
        let mut out = AudioOutput::new(Box::new(audio), 16, 2);
        out.pend_silence(50).unwrap();
        assert!(out.pool_allocated() <= 2);
    }
}
