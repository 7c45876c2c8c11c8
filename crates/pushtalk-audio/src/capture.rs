//! Microphone capture engine.
//!
//! The cpal stream is owned by a dedicated `audio-capture` thread (cpal
//! streams are not `Send`). The stream callback converts whatever the
//! device produces to 16 kHz mono i16 and pushes it into an SPSC ring;
//! the collector loop on the same thread drains the ring, appends to the
//! session buffer, and assembles fixed 20 ms frames for the silence
//! detector tap. The buffer leaves the thread exactly once, through
//! `stop`.
//!
//! When the ring is momentarily full, `push_slice` keeps whatever fits
//! and the overrun is counted; the collector's drain cadence makes that
//! a pathological case rather than a steady-state one.

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{SampleFormat, SampleRate, Stream, StreamConfig};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapRb};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use pushtalk_foundation::AudioError;

use crate::device::DeviceManager;
use crate::engine::{AudioFrame, CaptureEngine, FRAME_MS, FRAME_SIZE_SAMPLES, SAMPLE_RATE_HZ};

/// Ring capacity in samples; ~4 s of headroom at 16 kHz against collector
/// stalls.
const RING_CAPACITY_SAMPLES: usize = 65_536;

/// Tap channel depth: ~1.3 s of 20 ms frames. Tap frames are shed when
/// the consumer lags; the primary buffer is unaffected.
const TAP_CAPACITY: usize = 64;

/// Collector poll interval.
const DRAIN_INTERVAL: Duration = Duration::from_millis(10);

/// Reopen backoff schedule after a mid-stream device error.
const REOPEN_BACKOFF: [Duration; 3] = [
    Duration::from_millis(50),
    Duration::from_millis(150),
    Duration::from_millis(450),
];

#[derive(Debug, Default)]
pub struct CaptureStats {
    pub frames_captured: AtomicU64,
    pub samples_captured: AtomicU64,
    pub ring_overflows: AtomicU64,
    pub tap_frames_dropped: AtomicU64,
    pub stream_errors: AtomicU64,
    pub reopens: AtomicU64,
}

pub struct MicCapture {
    device_name: Option<String>,
    stats: Arc<CaptureStats>,
    error_slot: Arc<Mutex<Option<AudioError>>>,
    worker: Option<WorkerHandle>,
    tap_rx: Option<Receiver<AudioFrame>>,
    finished: Option<Vec<i16>>,
}

struct WorkerHandle {
    handle: JoinHandle<Vec<i16>>,
    shutdown: Arc<AtomicBool>,
}

impl MicCapture {
    pub fn new(device_name: Option<String>) -> Self {
        Self {
            device_name,
            stats: Arc::new(CaptureStats::default()),
            error_slot: Arc::new(Mutex::new(None)),
            worker: None,
            tap_rx: None,
            finished: None,
        }
    }

    pub fn stats(&self) -> Arc<CaptureStats> {
        Arc::clone(&self.stats)
    }

    fn join_worker(&mut self) -> Vec<i16> {
        match self.worker.take() {
            Some(worker) => {
                worker.shutdown.store(true, Ordering::SeqCst);
                worker.handle.join().unwrap_or_else(|_| {
                    tracing::error!("audio-capture thread panicked");
                    Vec::new()
                })
            }
            None => Vec::new(),
        }
    }
}

impl CaptureEngine for MicCapture {
    fn start(&mut self) -> Result<(), AudioError> {
        if self.worker.is_some() {
            return Err(AudioError::DeviceBusy("capture already running".to_string()));
        }
        self.finished = None;
        *self.error_slot.lock() = None;

        let (tap_tx, tap_rx) = bounded::<AudioFrame>(TAP_CAPACITY);
        let (ready_tx, ready_rx) = bounded::<Result<(), AudioError>>(1);
        let shutdown = Arc::new(AtomicBool::new(false));

        let ctx = WorkerCtx {
            device_name: self.device_name.clone(),
            shutdown: Arc::clone(&shutdown),
            restart_needed: Arc::new(AtomicBool::new(false)),
            error_slot: Arc::clone(&self.error_slot),
            stats: Arc::clone(&self.stats),
            tap_tx,
        };

        let handle = std::thread::Builder::new()
            .name("audio-capture".to_string())
            .spawn(move || capture_worker(ctx, ready_tx))
            .map_err(|e| AudioError::Fatal(format!("failed to spawn capture thread: {}", e)))?;

        match ready_rx.recv_timeout(Duration::from_secs(5)) {
            Ok(Ok(())) => {
                self.worker = Some(WorkerHandle { handle, shutdown });
                self.tap_rx = Some(tap_rx);
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                shutdown.store(true, Ordering::SeqCst);
                let _ = handle.join();
                Err(AudioError::Fatal(
                    "capture thread did not report readiness".to_string(),
                ))
            }
        }
    }

    fn stop(&mut self) -> Vec<i16> {
        if self.worker.is_some() {
            let buffer = self.join_worker();
            self.tap_rx = None;
            tracing::debug!(samples = buffer.len(), "capture stopped");
            self.finished = Some(buffer);
        }
        self.finished.clone().unwrap_or_default()
    }

    fn discard(&mut self) {
        if self.worker.is_some() {
            let dropped = self.join_worker();
            self.tap_rx = None;
            tracing::debug!(samples = dropped.len(), "capture discarded");
        }
        self.finished = None;
    }

    fn poll_frames(&mut self) -> Vec<AudioFrame> {
        match &self.tap_rx {
            Some(rx) => rx.try_iter().collect(),
            None => Vec::new(),
        }
    }

    fn take_error(&mut self) -> Option<AudioError> {
        self.error_slot.lock().take()
    }
}

impl Drop for MicCapture {
    fn drop(&mut self) {
        self.discard();
    }
}

struct WorkerCtx {
    device_name: Option<String>,
    shutdown: Arc<AtomicBool>,
    restart_needed: Arc<AtomicBool>,
    error_slot: Arc<Mutex<Option<AudioError>>>,
    stats: Arc<CaptureStats>,
    tap_tx: Sender<AudioFrame>,
}

/// Stream plus the consumer half of its ring. Rebuilt wholesale on
/// reopen; pending samples survive outside it.
struct StreamSession {
    _stream: Stream,
    consumer: HeapCons<i16>,
}

fn capture_worker(ctx: WorkerCtx, ready_tx: Sender<Result<(), AudioError>>) -> Vec<i16> {
    let manager = DeviceManager::new();

    let mut session = match open_stream(&manager, &ctx) {
        Ok(session) => {
            let _ = ready_tx.send(Ok(()));
            Some(session)
        }
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return Vec::new();
        }
    };

    let mut buffer: Vec<i16> = Vec::new();
    let mut pending: Vec<i16> = Vec::with_capacity(FRAME_SIZE_SAMPLES * 4);
    let mut scratch = vec![0i16; FRAME_SIZE_SAMPLES * 4];

    while !ctx.shutdown.load(Ordering::SeqCst) {
        if let Some(active) = session.as_mut() {
            drain(&mut active.consumer, &mut scratch, &mut pending);
            flush_frames(&mut pending, &mut buffer, &ctx.tap_tx, &ctx.stats);
        }

        if ctx.restart_needed.swap(false, Ordering::SeqCst) {
            tracing::warn!("capture stream error; attempting reopen");
            session = None;
            let mut last_err = AudioError::DeviceError("stream failed".to_string());
            for delay in REOPEN_BACKOFF {
                std::thread::sleep(delay);
                ctx.stats.reopens.fetch_add(1, Ordering::Relaxed);
                match open_stream(&manager, &ctx) {
                    Ok(reopened) => {
                        tracing::info!("capture stream reopened");
                        session = Some(reopened);
                        break;
                    }
                    Err(e) => {
                        tracing::warn!("capture reopen failed: {}", e);
                        last_err = e;
                    }
                }
            }
            if session.is_none() {
                *ctx.error_slot.lock() = Some(last_err);
                break;
            }
        }

        std::thread::sleep(DRAIN_INTERVAL);
    }

    // Final drain, then flush the partial frame into the buffer.
    if let Some(active) = session.as_mut() {
        drain(&mut active.consumer, &mut scratch, &mut pending);
    }
    flush_frames(&mut pending, &mut buffer, &ctx.tap_tx, &ctx.stats);
    buffer.extend_from_slice(&pending);

    buffer
}

fn drain(consumer: &mut HeapCons<i16>, scratch: &mut [i16], pending: &mut Vec<i16>) {
    loop {
        let n = consumer.pop_slice(scratch);
        if n == 0 {
            break;
        }
        pending.extend_from_slice(&scratch[..n]);
    }
}

/// Move whole 320-sample frames from `pending` into the session buffer,
/// offering a copy of each to the tap.
fn flush_frames(
    pending: &mut Vec<i16>,
    buffer: &mut Vec<i16>,
    tap_tx: &Sender<AudioFrame>,
    stats: &CaptureStats,
) {
    let mut offset = 0;
    while pending.len() - offset >= FRAME_SIZE_SAMPLES {
        let frame = &pending[offset..offset + FRAME_SIZE_SAMPLES];
        buffer.extend_from_slice(frame);
        stats.frames_captured.fetch_add(1, Ordering::Relaxed);
        stats
            .samples_captured
            .fetch_add(FRAME_SIZE_SAMPLES as u64, Ordering::Relaxed);

        let tap_frame = AudioFrame {
            samples: frame.to_vec(),
            frame_ms: FRAME_MS,
        };
        match tap_tx.try_send(tap_frame) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                stats.tap_frames_dropped.fetch_add(1, Ordering::Relaxed);
            }
            Err(TrySendError::Disconnected(_)) => {}
        }

        offset += FRAME_SIZE_SAMPLES;
    }
    if offset > 0 {
        pending.drain(..offset);
    }
}

fn open_stream(manager: &DeviceManager, ctx: &WorkerCtx) -> Result<StreamSession, AudioError> {
    let device = manager.open_device(ctx.device_name.as_deref())?;
    if let Ok(name) = device.name() {
        tracing::info!(device = %name, host = ?manager.host_id(), "opening input device");
    }

    let (config, sample_format) = select_config(&device)?;
    let channels = config.channels as usize;

    let (producer, consumer) = HeapRb::<i16>::new(RING_CAPACITY_SAMPLES).split();
    let producer = Arc::new(Mutex::new(producer));

    let stats = Arc::clone(&ctx.stats);
    let restart = Arc::clone(&ctx.restart_needed);
    let err_stats = Arc::clone(&ctx.stats);
    let err_fn = move |err: cpal::StreamError| {
        tracing::error!("audio stream error: {}", err);
        err_stats.stream_errors.fetch_add(1, Ordering::Relaxed);
        restart.store(true, Ordering::SeqCst);
    };

    // Convert to mono i16 and push into the ring from the device thread.
    // A full ring keeps what fits; the shortfall is counted as an
    // overrun.
    let handle_interleaved = move |data: &[i16], mono: &mut Vec<i16>| {
        mono.clear();
        downmix_to_mono(data, channels, mono);
        let pushed = producer.lock().push_slice(mono);
        if pushed < mono.len() {
            stats.ring_overflows.fetch_add(1, Ordering::Relaxed);
        }
    };

    let stream = match sample_format {
        SampleFormat::I16 => {
            let mut mono = Vec::new();
            device.build_input_stream(
                &config,
                move |data: &[i16], _: &_| handle_interleaved(data, &mut mono),
                err_fn,
                None,
            )?
        }
        SampleFormat::U16 => {
            let mut mono = Vec::new();
            let mut converted = Vec::new();
            device.build_input_stream(
                &config,
                move |data: &[u16], _: &_| {
                    converted.clear();
                    converted.extend(data.iter().map(|&s| (s as i32 - 32768) as i16));
                    handle_interleaved(&converted, &mut mono);
                },
                err_fn,
                None,
            )?
        }
        SampleFormat::F32 => {
            let mut mono = Vec::new();
            let mut converted = Vec::new();
            device.build_input_stream(
                &config,
                move |data: &[f32], _: &_| {
                    converted.clear();
                    converted.extend(
                        data.iter()
                            .map(|&s| (s.clamp(-1.0, 1.0) * 32767.0).round() as i16),
                    );
                    handle_interleaved(&converted, &mut mono);
                },
                err_fn,
                None,
            )?
        }
        other => {
            return Err(AudioError::FormatNotSupported {
                format: format!("{:?}", other),
            });
        }
    };

    stream.play()?;
    Ok(StreamSession {
        _stream: stream,
        consumer,
    })
}

/// Pick a supported config that can stream at exactly 16 kHz, preferring
/// fewer channels and a cheaper sample format. Resampling is out of
/// scope, so a device that cannot do 16 kHz is rejected.
fn select_config(device: &cpal::Device) -> Result<(StreamConfig, SampleFormat), AudioError> {
    let mut candidates: Vec<(u16, SampleFormat)> = Vec::new();
    for range in device.supported_input_configs()? {
        if range.min_sample_rate().0 <= SAMPLE_RATE_HZ && range.max_sample_rate().0 >= SAMPLE_RATE_HZ
        {
            candidates.push((range.channels(), range.sample_format()));
        }
    }

    candidates.sort_by_key(|(channels, format)| {
        let format_rank = match format {
            SampleFormat::I16 => 0u8,
            SampleFormat::F32 => 1,
            SampleFormat::U16 => 2,
            _ => 3,
        };
        (*channels, format_rank)
    });

    candidates
        .into_iter()
        .find(|(_, format)| {
            matches!(
                format,
                SampleFormat::I16 | SampleFormat::U16 | SampleFormat::F32
            )
        })
        .map(|(channels, format)| {
            (
                StreamConfig {
                    channels,
                    sample_rate: SampleRate(SAMPLE_RATE_HZ),
                    buffer_size: cpal::BufferSize::Default,
                },
                format,
            )
        })
        .ok_or(AudioError::FormatNotSupported {
            format: "no 16 kHz-capable input config".to_string(),
        })
}

/// Average interleaved channels down to mono. `channels == 1` copies.
fn downmix_to_mono(interleaved: &[i16], channels: usize, out: &mut Vec<i16>) {
    if channels <= 1 {
        out.extend_from_slice(interleaved);
        return;
    }
    out.reserve(interleaved.len() / channels);
    for group in interleaved.chunks_exact(channels) {
        let sum: i32 = group.iter().map(|&s| s as i32).sum();
        out.push((sum / channels as i32) as i16);
    }
}
