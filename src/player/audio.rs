//! Audio output backends.
//!
//! The worker owns one [`AudioOutput`] for its whole life. The decoder opens
//! it when a song starts (re-opening on a format change), writes interleaved
//! f32 samples into it, and the worker closes it on a close-audio command.
//!
//! - [`NullOutput`]: discards samples, optionally sleeping for their duration
//!   so playback advances in real time without sound hardware.
//! - `CpalOutput` (feature `cpal-output`): real device output through cpal.

use std::thread;
use std::time::Duration;

use super::error::OutputError;
use crate::config::{AudioConfig, OutputKind};

/// Outcome of offering samples to an output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Accepted,
    /// The device did not drain in time. Check for commands, then offer the
    /// same samples again.
    Busy,
}

/// Sample format handed to an output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioFormat {
    /// Playback length of an interleaved sample slice.
    pub fn duration_of(&self, samples: usize) -> Duration {
        if self.sample_rate == 0 || self.channels == 0 {
            return Duration::ZERO;
        }
        let frames = samples as f64 / f64::from(self.channels);
        Duration::from_secs_f64(frames / f64::from(self.sample_rate))
    }
}

/// Device output driven by the decoder.
pub trait AudioOutput: Send {
    /// Open (or re-open) the device for `format`.
    fn open(&mut self, format: AudioFormat) -> Result<(), OutputError>;

    /// Format the output is currently open with.
    fn format(&self) -> Option<AudioFormat>;

    /// Write interleaved samples. Blocks for a bounded time while the device
    /// buffer is full and reports [`Delivery::Busy`] if it stays full.
    fn play(&mut self, samples: &[f32]) -> Result<Delivery, OutputError>;

    /// Stop consuming samples until the next `play`.
    fn pause(&mut self) {}

    /// Drop anything buffered but not yet played.
    fn cancel(&mut self) {}

    /// Release the device.
    fn close(&mut self);

    fn is_open(&self) -> bool {
        self.format().is_some()
    }
}

/// Output that discards samples.
#[derive(Debug, Default)]
pub struct NullOutput {
    format: Option<AudioFormat>,
    paced: bool,
}

impl NullOutput {
    pub fn new(paced: bool) -> Self {
        Self {
            format: None,
            paced,
        }
    }
}

impl AudioOutput for NullOutput {
    fn open(&mut self, format: AudioFormat) -> Result<(), OutputError> {
        tracing::debug!(
            sample_rate = format.sample_rate,
            channels = format.channels,
            "null output opened"
        );
        self.format = Some(format);
        Ok(())
    }

    fn format(&self) -> Option<AudioFormat> {
        self.format
    }

    fn play(&mut self, samples: &[f32]) -> Result<Delivery, OutputError> {
        let format = self.format.ok_or(OutputError::NotOpen)?;
        if self.paced {
            thread::sleep(format.duration_of(samples.len()));
        }
        Ok(Delivery::Accepted)
    }

    fn close(&mut self) {
        if self.format.take().is_some() {
            tracing::debug!("null output closed");
        }
    }
}

/// Build the output selected in the config. The device itself is opened
/// lazily when the first song starts.
pub fn create_output(config: &AudioConfig) -> Result<Box<dyn AudioOutput>, OutputError> {
    match config.output {
        OutputKind::Null => Ok(Box::new(NullOutput::new(config.paced))),
        #[cfg(feature = "cpal-output")]
        OutputKind::Cpal => Ok(Box::new(CpalOutput::new(config.output_device.clone()))),
        #[cfg(not(feature = "cpal-output"))]
        OutputKind::Cpal => Err(OutputError::Unavailable("cpal")),
    }
}

/// List available audio output devices.
#[cfg(feature = "cpal-output")]
pub fn list_devices() -> Result<Vec<String>, OutputError> {
    use cpal::traits::{DeviceTrait, HostTrait};
    let host = cpal::default_host();
    let devices = host
        .output_devices()
        .map_err(|e| OutputError::Stream(e.to_string()))?;
    Ok(devices.filter_map(|d| d.name().ok()).collect())
}

/// List available audio output devices.
#[cfg(not(feature = "cpal-output"))]
pub fn list_devices() -> Result<Vec<String>, OutputError> {
    Err(OutputError::Unavailable("cpal"))
}

#[cfg(feature = "cpal-output")]
pub use device::CpalOutput;

#[cfg(feature = "cpal-output")]
mod device {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread::{self, JoinHandle};
    use std::time::Duration;

    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
    use cpal::{Device, SampleFormat, Stream, StreamConfig};
    use crossbeam_channel::{Receiver, SendTimeoutError, Sender, bounded};

    use super::{AudioFormat, AudioOutput, Delivery, OutputError};

    /// Chunks buffered between the decoder and the device callback.
    const CHUNK_QUEUE: usize = 8;

    /// Longest a single `play` waits for room in the chunk queue.
    const SEND_TIMEOUT: Duration = Duration::from_millis(100);

    /// Sound card output.
    ///
    /// `cpal::Stream` is not `Send` on every platform, so the stream lives on
    /// its own thread and samples are handed over through a bounded channel.
    pub struct CpalOutput {
        device_name: String,
        format: Option<AudioFormat>,
        stream: Option<StreamThread>,
    }

    struct StreamThread {
        samples_tx: Sender<Vec<f32>>,
        samples_rx: Receiver<Vec<f32>>,
        paused: Arc<AtomicBool>,
        shutdown_tx: Sender<()>,
        thread: JoinHandle<()>,
    }

    impl CpalOutput {
        /// `device_name` empty selects the system default device.
        pub fn new(device_name: String) -> Self {
            Self {
                device_name,
                format: None,
                stream: None,
            }
        }
    }

    impl AudioOutput for CpalOutput {
        fn open(&mut self, format: AudioFormat) -> Result<(), OutputError> {
            if self.format == Some(format) {
                return Ok(());
            }
            self.close();

            let (ready_tx, ready_rx) = bounded::<Result<(), OutputError>>(1);
            let (samples_tx, samples_rx) = bounded::<Vec<f32>>(CHUNK_QUEUE);
            let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
            let paused = Arc::new(AtomicBool::new(false));

            let device_name = self.device_name.clone();
            let callback_rx = samples_rx.clone();
            let callback_paused = Arc::clone(&paused);
            let thread = thread::Builder::new()
                .name("audio-output".to_string())
                .spawn(move || {
                    let stream = match build_output(&device_name, format, callback_rx, callback_paused) {
                        Ok(stream) => stream,
                        Err(e) => {
                            let _ = ready_tx.send(Err(e));
                            return;
                        }
                    };
                    if let Err(e) = stream.play() {
                        let _ = ready_tx.send(Err(OutputError::Stream(e.to_string())));
                        return;
                    }
                    let _ = ready_tx.send(Ok(()));
                    // Keep the stream alive until close() (or the handle is dropped)
                    let _ = shutdown_rx.recv();
                    drop(stream);
                })
                .map_err(|e| OutputError::Stream(e.to_string()))?;

            match ready_rx.recv() {
                Ok(Ok(())) => {
                    let device = if self.device_name.is_empty() {
                        "default"
                    } else {
                        self.device_name.as_str()
                    };
                    tracing::info!(
                        device,
                        sample_rate = format.sample_rate,
                        channels = format.channels,
                        "audio output opened"
                    );
                    self.format = Some(format);
                    self.stream = Some(StreamThread {
                        samples_tx,
                        samples_rx,
                        paused,
                        shutdown_tx,
                        thread,
                    });
                    Ok(())
                }
                Ok(Err(e)) => {
                    let _ = thread.join();
                    Err(e)
                }
                Err(_) => {
                    let _ = thread.join();
                    Err(OutputError::Stream("output thread exited".to_string()))
                }
            }
        }

        fn format(&self) -> Option<AudioFormat> {
            self.format
        }

        fn play(&mut self, samples: &[f32]) -> Result<Delivery, OutputError> {
            let stream = self.stream.as_ref().ok_or(OutputError::NotOpen)?;
            stream.paused.store(false, Ordering::Relaxed);
            match stream.samples_tx.send_timeout(samples.to_vec(), SEND_TIMEOUT) {
                Ok(()) => Ok(Delivery::Accepted),
                Err(SendTimeoutError::Timeout(_)) => {
                    tracing::trace!("output device not draining");
                    Ok(Delivery::Busy)
                }
                Err(SendTimeoutError::Disconnected(_)) => {
                    Err(OutputError::Stream("output stream stopped".to_string()))
                }
            }
        }

        fn pause(&mut self) {
            if let Some(stream) = self.stream.as_ref() {
                stream.paused.store(true, Ordering::Relaxed);
            }
        }

        fn cancel(&mut self) {
            if let Some(stream) = self.stream.as_ref() {
                while stream.samples_rx.try_recv().is_ok() {}
            }
        }

        fn close(&mut self) {
            let Some(stream) = self.stream.take() else {
                return;
            };
            self.format = None;
            let StreamThread {
                samples_tx,
                shutdown_tx,
                thread,
                ..
            } = stream;
            drop(samples_tx);
            let _ = shutdown_tx.send(());
            if thread.join().is_err() {
                tracing::error!("audio output thread panicked");
            }
            tracing::info!("audio output closed");
        }
    }

    impl Drop for CpalOutput {
        fn drop(&mut self) {
            self.close();
        }
    }

    fn select_device(host: &cpal::Host, name: &str) -> Result<Device, OutputError> {
        if name.is_empty() {
            return host.default_output_device().ok_or(OutputError::NoDevice);
        }
        let devices = host
            .output_devices()
            .map_err(|e| OutputError::Stream(e.to_string()))?;
        for device in devices {
            if device.name().is_ok_and(|n| n == name) {
                return Ok(device);
            }
        }
        Err(OutputError::DeviceNotFound(name.to_string()))
    }

    fn build_output(
        device_name: &str,
        format: AudioFormat,
        samples_rx: Receiver<Vec<f32>>,
        paused: Arc<AtomicBool>,
    ) -> Result<Stream, OutputError> {
        let host = cpal::default_host();
        let device = select_device(&host, device_name)?;

        let supported = device
            .supported_output_configs()
            .map_err(|e| OutputError::Stream(e.to_string()))?
            .find(|range| {
                range.channels() == format.channels
                    && range.min_sample_rate().0 <= format.sample_rate
                    && range.max_sample_rate().0 >= format.sample_rate
            })
            .ok_or_else(|| {
                OutputError::UnsupportedFormat(format!(
                    "{}Hz / {}ch",
                    format.sample_rate, format.channels
                ))
            })?
            .with_sample_rate(cpal::SampleRate(format.sample_rate));

        let config = StreamConfig {
            channels: format.channels,
            sample_rate: supported.sample_rate(),
            buffer_size: cpal::BufferSize::Default,
        };

        let stream = match supported.sample_format() {
            SampleFormat::F32 => build_stream::<f32>(&device, &config, samples_rx, paused),
            SampleFormat::I16 => build_stream::<i16>(&device, &config, samples_rx, paused),
            SampleFormat::U16 => build_stream::<u16>(&device, &config, samples_rx, paused),
            other => {
                return Err(OutputError::UnsupportedFormat(format!("{other:?}")));
            }
        };
        stream.map_err(|e| OutputError::Stream(e.to_string()))
    }

    fn build_stream<T>(
        device: &Device,
        config: &StreamConfig,
        samples_rx: Receiver<Vec<f32>>,
        paused: Arc<AtomicBool>,
    ) -> Result<Stream, cpal::BuildStreamError>
    where
        T: cpal::SizedSample + cpal::FromSample<f32>,
    {
        let silence = T::from_sample(0.0f32);
        // Chunk being drained and the read position inside it
        let mut pending: Option<(Vec<f32>, usize)> = None;

        device.build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                if paused.load(Ordering::Relaxed) {
                    data.fill(silence);
                    return;
                }

                let mut out_pos = 0;
                while out_pos < data.len() {
                    if pending.is_none() {
                        match samples_rx.try_recv() {
                            Ok(chunk) => pending = Some((chunk, 0)),
                            Err(_) => {
                                // Underrun
                                data[out_pos..].fill(silence);
                                return;
                            }
                        }
                    }

                    if let Some((chunk, chunk_pos)) = pending.as_mut() {
                        let to_copy = (chunk.len() - *chunk_pos).min(data.len() - out_pos);
                        for (dst, src) in data[out_pos..out_pos + to_copy]
                            .iter_mut()
                            .zip(&chunk[*chunk_pos..*chunk_pos + to_copy])
                        {
                            *dst = T::from_sample(*src);
                        }
                        *chunk_pos += to_copy;
                        out_pos += to_copy;
                        if *chunk_pos >= chunk.len() {
                            pending = None;
                        }
                    }
                }
            },
            |err| {
                tracing::error!("Audio stream error: {}", err);
            },
            None,
        )
    }
}
