// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! IF sample sources feeding the `rx` mailbox.

use std::f64::consts::TAU;
use std::fs::File;
use std::io::{BufReader, ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use num_complex::Complex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use sdrx_core::{
    BufferPool, Command, ComplexPooledBuf, Mailbox, MailboxRegistry, RadioError, RadioResult,
    Stage, Subscriber, CMD_MAILBOX, POLL_INTERVAL,
};

use crate::RX_MAILBOX;

/// Bytes per interleaved little-endian `f32` I/Q pair.
const CF32_BYTES: usize = 8;

/// Something that produces complex baseband samples.
pub trait IqSource: Send {
    /// Fill `out` from the front. Returns the number of samples written;
    /// fewer than `out.len()` means the source is exhausted.
    fn read_into(&mut self, out: &mut [Complex<f32>]) -> RadioResult<usize>;

    fn describe(&self) -> String;
}

/// All-zero samples, forever.
#[derive(Debug, Default)]
pub struct SilenceSource;

impl IqSource for SilenceSource {
    fn read_into(&mut self, out: &mut [Complex<f32>]) -> RadioResult<usize> {
        out.fill(Complex::new(0.0, 0.0));
        Ok(out.len())
    }

    fn describe(&self) -> String {
        "silence".to_string()
    }
}

/// A single complex exponential at a fixed offset from the tuned centre.
#[derive(Debug)]
pub struct ToneSource {
    offset_hz: f64,
    amplitude: f32,
    step: f64,
    phase: f64,
}

impl ToneSource {
    pub fn new(sample_rate: u32, offset_hz: f64, amplitude: f32) -> Self {
        Self {
            offset_hz,
            amplitude,
            step: TAU * offset_hz / sample_rate.max(1) as f64,
            phase: 0.0,
        }
    }
}

impl IqSource for ToneSource {
    fn read_into(&mut self, out: &mut [Complex<f32>]) -> RadioResult<usize> {
        for s in out.iter_mut() {
            *s = Complex::from_polar(self.amplitude, self.phase as f32);
            self.phase = (self.phase + self.step) % TAU;
        }
        Ok(out.len())
    }

    fn describe(&self) -> String {
        format!("tone at {:+} Hz, amplitude {}", self.offset_hz, self.amplitude)
    }
}

/// Raw interleaved `f32` little-endian I/Q, as written by most SDR
/// recorders.
pub struct FileSource<R> {
    path: PathBuf,
    reader: R,
    looped: bool,
    raw: Vec<u8>,
}

impl FileSource<BufReader<File>> {
    pub fn open(path: &Path, looped: bool) -> RadioResult<Self> {
        let file = File::open(path).map_err(|e| {
            RadioError::runtime("FileSource", format!("{}: {}", path.display(), e))
        })?;
        Ok(Self::from_reader(path, BufReader::new(file), looped))
    }
}

impl<R: Read + Seek + Send> FileSource<R> {
    pub fn from_reader(path: &Path, reader: R, looped: bool) -> Self {
        Self {
            path: path.to_path_buf(),
            reader,
            looped,
            raw: Vec::new(),
        }
    }

    fn io_error(&self, e: std::io::Error) -> RadioError {
        RadioError::runtime("FileSource", format!("{}: {}", self.path.display(), e))
    }

    /// Read as many whole bytes as possible into `buf`; a short count
    /// means end of file.
    fn fill(&mut self, buf_len: usize) -> RadioResult<usize> {
        let mut got = 0;
        while got < buf_len {
            match self.reader.read(&mut self.raw[got..buf_len]) {
                Ok(0) => break,
                Ok(n) => got += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(self.io_error(e)),
            }
        }
        Ok(got)
    }
}

impl<R: Read + Seek + Send> IqSource for FileSource<R> {
    fn read_into(&mut self, out: &mut [Complex<f32>]) -> RadioResult<usize> {
        let want = out.len() * CF32_BYTES;
        if self.raw.len() < want {
            self.raw.resize(want, 0);
        }
        let mut written = 0;
        let mut rewound = false;
        while written < out.len() {
            let chunk = (out.len() - written) * CF32_BYTES;
            let got = self.fill(chunk)? / CF32_BYTES;
            for (slot, b) in out[written..written + got]
                .iter_mut()
                .zip(self.raw.chunks_exact(CF32_BYTES))
            {
                let re = f32::from_le_bytes([b[0], b[1], b[2], b[3]]);
                let im = f32::from_le_bytes([b[4], b[5], b[6], b[7]]);
                *slot = Complex::new(re, im);
            }
            written += got;
            if written == out.len() {
                break;
            }
            // An empty file would spin forever on rewind.
            if !self.looped || (rewound && got == 0) {
                break;
            }
            self.reader
                .seek(SeekFrom::Start(0))
                .map_err(|e| self.io_error(e))?;
            rewound = true;
            debug!("{}: looping", self.path.display());
        }
        Ok(written)
    }

    fn describe(&self) -> String {
        format!(
            "file {}{}",
            self.path.display(),
            if self.looped { " (looped)" } else { "" }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Silence,
    Tone,
    File,
}

/// `[source]` settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    pub kind: SourceKind,
    /// Tone offset from the tuned centre in Hz.
    pub tone_offset: f64,
    pub tone_amplitude: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(rename = "loop")]
    pub looped: bool,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            kind: SourceKind::Silence,
            tone_offset: 1500.0,
            tone_amplitude: 0.5,
            path: None,
            looped: true,
        }
    }
}

impl SourceSettings {
    pub fn open(&self, sample_rate: u32) -> RadioResult<Box<dyn IqSource>> {
        let source: Box<dyn IqSource> = match self.kind {
            SourceKind::Silence => Box::new(SilenceSource),
            SourceKind::Tone => Box::new(ToneSource::new(
                sample_rate,
                self.tone_offset,
                self.tone_amplitude,
            )),
            SourceKind::File => {
                let Some(path) = &self.path else {
                    return Err(RadioError::runtime(
                        "FileSource",
                        "source kind 'file' needs a path",
                    ));
                };
                Box::new(FileSource::open(path, self.looped)?)
            }
        };
        Ok(source)
    }
}

/// Publishes fixed-size RF buffers on the `rx` mailbox at the RF rate.
pub struct IfSourceStage {
    name: String,
    source: Box<dyn IqSource>,
    pool: BufferPool<Complex<f32>>,
    block_len: usize,
    period: Duration,
    published: u64,
    cmd: Option<Subscriber<Command>>,
    rf: Option<Arc<Mailbox<ComplexPooledBuf>>>,
}

impl IfSourceStage {
    pub fn new(source: Box<dyn IqSource>, sample_rate: u32, block_len: usize) -> RadioResult<Self> {
        if sample_rate == 0 || block_len == 0 {
            return Err(RadioError::runtime(
                "IFSource",
                format!("bad geometry: {block_len} samples at {sample_rate} Hz"),
            ));
        }
        Ok(Self {
            name: "IFSource".to_string(),
            source,
            pool: BufferPool::new(block_len),
            block_len,
            period: Duration::from_secs_f64(block_len as f64 / sample_rate as f64),
            published: 0,
            cmd: None,
            rf: None,
        })
    }

    pub fn published(&self) -> u64 {
        self.published
    }

    /// Read and publish one block. Returns false once the source is dry.
    fn publish_block(&mut self, rf: &Mailbox<ComplexPooledBuf>) -> RadioResult<bool> {
        let mut buf = self.pool.get();
        let got = self.source.read_into(buf.as_mut_slice())?;
        if got == 0 {
            return Ok(false);
        }
        buf.set_len(got);
        rf.put(buf);
        self.published += 1;
        Ok(got == self.block_len)
    }
}

impl Stage for IfSourceStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn subscribe(&mut self, mailboxes: &MailboxRegistry) -> RadioResult<()> {
        let cmd = mailboxes.get::<Command>(CMD_MAILBOX)?;
        self.cmd = Some(Subscriber::attach(&cmd));
        self.rf = Some(mailboxes.get::<ComplexPooledBuf>(RX_MAILBOX)?);
        Ok(())
    }

    fn run(&mut self) -> RadioResult<()> {
        let (Some(cmd_rx), Some(rf)) = (self.cmd.take(), self.rf.take()) else {
            return Err(RadioError::runtime(self.name.clone(), "missing a stream connection"));
        };
        info!("{}: {}", self.name, self.source.describe());
        let mut next = Instant::now();
        let mut live = true;
        loop {
            if let Some(cmd) = cmd_rx.get() {
                if self.handle_command(&cmd) {
                    break;
                }
                continue;
            }
            let now = Instant::now();
            if live && now >= next {
                live = self.publish_block(&rf)?;
                if !live {
                    info!("{}: source exhausted after {} buffers", self.name, self.published);
                }
                next += self.period;
                // Fell far behind: resynchronise instead of bursting.
                if now > next + self.period * 4 {
                    warn!("{}: {} ms behind, resyncing", self.name, (now - next).as_millis());
                    next = now;
                }
                continue;
            }
            thread::sleep(POLL_INTERVAL);
        }
        debug!("{}: published {} buffers", self.name, self.published);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdrx_core::{StageOutcome, ThreadRegistry};
    use std::io::Cursor;

    fn cf32_bytes(samples: &[(f32, f32)]) -> Vec<u8> {
        samples
            .iter()
            .flat_map(|(re, im)| re.to_le_bytes().into_iter().chain(im.to_le_bytes()))
            .collect()
    }

    #[test]
    fn test_tone_source_has_constant_envelope_and_rotation() {
        let mut src = ToneSource::new(48_000, 12_000.0, 0.5);
        let mut out = vec![Complex::new(0.0, 0.0); 8];
        assert_eq!(src.read_into(&mut out).unwrap(), 8);
        for x in &out {
            assert!((x.norm() - 0.5).abs() < 1e-6);
        }
        // A quarter turn per sample.
        assert!((out[1] - Complex::new(0.0, 0.5)).norm() < 1e-5);
        assert!((out[2] - Complex::new(-0.5, 0.0)).norm() < 1e-5);
    }

    #[test]
    fn test_file_source_reads_and_stops_at_eof() {
        let data = cf32_bytes(&[(1.0, -1.0), (0.5, 0.25), (2.0, 3.0)]);
        let mut src = FileSource::from_reader(Path::new("mem"), Cursor::new(data), false);
        let mut out = vec![Complex::new(9.0, 9.0); 2];
        assert_eq!(src.read_into(&mut out).unwrap(), 2);
        assert_eq!(out, vec![Complex::new(1.0, -1.0), Complex::new(0.5, 0.25)]);
        assert_eq!(src.read_into(&mut out).unwrap(), 1);
        assert_eq!(out[0], Complex::new(2.0, 3.0));
        assert_eq!(src.read_into(&mut out).unwrap(), 0);
    }

    #[test]
    fn test_file_source_loops() {
        let data = cf32_bytes(&[(1.0, 0.0), (2.0, 0.0)]);
        let mut src = FileSource::from_reader(Path::new("mem"), Cursor::new(data), true);
        let mut out = vec![Complex::new(0.0, 0.0); 5];
        assert_eq!(src.read_into(&mut out).unwrap(), 5);
        let re: Vec<f32> = out.iter().map(|x| x.re).collect();
        assert_eq!(re, vec![1.0, 2.0, 1.0, 2.0, 1.0]);
    }

    #[test]
    fn test_empty_looped_file_does_not_spin() {
        let mut src = FileSource::from_reader(Path::new("mem"), Cursor::new(Vec::new()), true);
        let mut out = vec![Complex::new(0.0, 0.0); 4];
        assert_eq!(src.read_into(&mut out).unwrap(), 0);
    }

    #[test]
    fn test_file_kind_needs_path() {
        let settings = SourceSettings {
            kind: SourceKind::File,
            ..Default::default()
        };
        assert!(settings.open(48_000).is_err());
    }

    #[test]
    fn test_stage_paces_blocks_until_stop() {
        let mailboxes = MailboxRegistry::new();
        let cmd = mailboxes.create::<Command>(CMD_MAILBOX).unwrap();
        let rf = mailboxes.create::<ComplexPooledBuf>(RX_MAILBOX).unwrap();
        let rf_rx = Subscriber::attach(&rf);

        // 10 ms per block.
        let stage = IfSourceStage::new(Box::new(SilenceSource), 48_000, 480).unwrap();
        let mut registry = ThreadRegistry::new();
        registry.add(Box::new(stage));
        registry.subscribe_all(&mailboxes).unwrap();
        registry.start_all().unwrap();

        thread::sleep(Duration::from_millis(200));
        let outcomes = registry.shutdown(&cmd);
        assert_eq!(outcomes, vec![("IFSource".to_string(), StageOutcome::Completed)]);

        let blocks = rf_rx.pending();
        assert!((5..=40).contains(&blocks), "{blocks} blocks in 200 ms");
        let first = rf_rx.get().unwrap();
        assert_eq!(first.len(), 480);
    }
}
