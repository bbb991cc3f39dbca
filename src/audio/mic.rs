// Microphone capture via cpal
//
// cpal streams are not Send, so the stream lives on a dedicated OS thread
// for the duration of the session. The device callback downmixes to mono,
// decimates to the target rate, and assembles fixed-size blocks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleFormat;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info};

use super::backend::{AudioBlock, CaptureBackend, CaptureConfig, CaptureError};

pub struct MicBackend {
    config: CaptureConfig,
    stop_flag: Arc<AtomicBool>,
    thread: Option<std::thread::JoinHandle<()>>,
    capturing: bool,
}

impl MicBackend {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            stop_flag: Arc::new(AtomicBool::new(false)),
            thread: None,
            capturing: false,
        }
    }
}

#[async_trait::async_trait]
impl CaptureBackend for MicBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioBlock>, CaptureError> {
        if self.capturing {
            return Err(CaptureError::Other("already capturing".into()));
        }

        let (block_tx, block_rx) = mpsc::channel(32);
        let (ready_tx, ready_rx) = oneshot::channel();

        self.stop_flag = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&self.stop_flag);
        let config = self.config.clone();

        let thread = std::thread::spawn(move || {
            run_capture_thread(config, block_tx, ready_tx, stop_flag);
        });

        match ready_rx.await {
            Ok(Ok(())) => {
                self.thread = Some(thread);
                self.capturing = true;
                info!("Microphone capture started");
                Ok(block_rx)
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(CaptureError::Other("capture thread exited early".into()))
            }
        }
    }

    async fn stop(&mut self) -> Result<()> {
        if !self.capturing {
            return Ok(());
        }

        self.stop_flag.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            // The thread only sleeps in 50ms slices; join off the runtime.
            tokio::task::spawn_blocking(move || {
                let _ = thread.join();
            })
            .await
            .ok();
        }

        self.capturing = false;
        info!("Microphone capture stopped");
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing
    }

    fn name(&self) -> &str {
        "microphone"
    }
}

fn run_capture_thread(
    config: CaptureConfig,
    block_tx: mpsc::Sender<AudioBlock>,
    ready_tx: oneshot::Sender<Result<(), CaptureError>>,
    stop_flag: Arc<AtomicBool>,
) {
    let host = cpal::default_host();

    let device = match host.default_input_device() {
        Some(device) => device,
        None => {
            let _ = ready_tx.send(Err(CaptureError::DeviceAbsent));
            return;
        }
    };

    let supported = match device.default_input_config() {
        Ok(supported) => supported,
        Err(e) => {
            let _ = ready_tx.send(Err(classify_config_error(e)));
            return;
        }
    };

    let device_rate = supported.sample_rate();
    let device_channels = supported.channels() as usize;
    let sample_format = supported.sample_format();
    let stream_config: cpal::StreamConfig = supported.into();

    info!(
        "Input device opened: {} Hz, {} channels, {:?}",
        device_rate, device_channels, sample_format
    );

    let mut assembler = BlockAssembler::new(
        config.block_size,
        device_channels,
        device_rate,
        config.sample_rate,
        block_tx,
    );

    let err_fn = |err| error!("Audio stream error: {}", err);

    let stream = match sample_format {
        SampleFormat::F32 => device.build_input_stream(
            &stream_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| assembler.push(data),
            err_fn,
            None,
        ),
        SampleFormat::I16 => device.build_input_stream(
            &stream_config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                let floats: Vec<f32> = data.iter().map(|&s| s as f32 / 32768.0).collect();
                assembler.push(&floats);
            },
            err_fn,
            None,
        ),
        SampleFormat::U16 => device.build_input_stream(
            &stream_config,
            move |data: &[u16], _: &cpal::InputCallbackInfo| {
                let floats: Vec<f32> = data
                    .iter()
                    .map(|&s| (s as f32 - 32768.0) / 32768.0)
                    .collect();
                assembler.push(&floats);
            },
            err_fn,
            None,
        ),
        other => {
            let _ = ready_tx.send(Err(CaptureError::Other(format!(
                "unsupported sample format {other:?}"
            ))));
            return;
        }
    };

    let stream = match stream {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready_tx.send(Err(classify_build_error(e)));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = ready_tx.send(Err(CaptureError::Other(e.to_string())));
        return;
    }

    let _ = ready_tx.send(Ok(()));

    while !stop_flag.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(50));
    }

    drop(stream);
}

/// Downmixes interleaved device samples to mono, decimates to the target
/// rate, and emits fixed-size blocks in capture order.
struct BlockAssembler {
    block_size: usize,
    channels: usize,
    /// Keep one mono sample out of every `stride`
    stride: usize,
    phase: usize,
    buffer: Vec<f32>,
    block_tx: mpsc::Sender<AudioBlock>,
}

impl BlockAssembler {
    fn new(
        block_size: usize,
        channels: usize,
        device_rate: u32,
        target_rate: u32,
        block_tx: mpsc::Sender<AudioBlock>,
    ) -> Self {
        let stride = if device_rate > target_rate {
            (device_rate / target_rate).max(1) as usize
        } else {
            1
        };

        Self {
            block_size,
            channels: channels.max(1),
            stride,
            phase: 0,
            buffer: Vec::with_capacity(block_size),
            block_tx,
        }
    }

    fn push(&mut self, data: &[f32]) {
        for frame in data.chunks_exact(self.channels) {
            let keep = self.phase == 0;
            self.phase = (self.phase + 1) % self.stride;
            if !keep {
                continue;
            }

            let mono = frame.iter().sum::<f32>() / self.channels as f32;
            self.buffer.push(mono);

            if self.buffer.len() == self.block_size {
                let samples = std::mem::replace(&mut self.buffer, Vec::with_capacity(self.block_size));
                // Runs on the realtime audio thread: never block. A full
                // channel means the consumer stopped; drop the block.
                let _ = self.block_tx.try_send(AudioBlock { samples });
            }
        }
    }
}

fn classify_config_error(e: cpal::DefaultStreamConfigError) -> CaptureError {
    match e {
        cpal::DefaultStreamConfigError::DeviceNotAvailable => CaptureError::DeviceBusy,
        cpal::DefaultStreamConfigError::StreamTypeNotSupported => {
            CaptureError::Other("input stream type not supported".into())
        }
        cpal::DefaultStreamConfigError::BackendSpecific { err } => classify_message(err.description),
    }
}

fn classify_build_error(e: cpal::BuildStreamError) -> CaptureError {
    match e {
        cpal::BuildStreamError::DeviceNotAvailable => CaptureError::DeviceBusy,
        cpal::BuildStreamError::BackendSpecific { err } => classify_message(err.description),
        other => CaptureError::Other(other.to_string()),
    }
}

fn classify_message(message: String) -> CaptureError {
    let lower = message.to_lowercase();
    if lower.contains("permission") || lower.contains("denied") || lower.contains("not authorized") {
        CaptureError::PermissionDenied
    } else {
        CaptureError::Other(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn assembler_emits_fixed_size_blocks_in_order() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut assembler = BlockAssembler::new(4, 1, 44100, 44100, tx);

        assembler.push(&[0.1, 0.2, 0.3]);
        assert!(rx.try_recv().is_err());

        assembler.push(&[0.4, 0.5]);
        let block = rx.try_recv().unwrap();
        assert_eq!(block.samples, vec![0.1, 0.2, 0.3, 0.4]);
    }

    #[tokio::test]
    async fn assembler_downmixes_stereo() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut assembler = BlockAssembler::new(2, 2, 44100, 44100, tx);

        assembler.push(&[0.0, 1.0, -1.0, -1.0]);
        let block = rx.try_recv().unwrap();
        assert_eq!(block.samples, vec![0.5, -1.0]);
    }

    #[tokio::test]
    async fn assembler_decimates_higher_device_rates() {
        let (tx, mut rx) = mpsc::channel(8);
        // 88200 Hz device, 44100 Hz target: keep every other sample
        let mut assembler = BlockAssembler::new(2, 1, 88200, 44100, tx);

        assembler.push(&[0.1, 0.2, 0.3, 0.4]);
        let block = rx.try_recv().unwrap();
        assert_eq!(block.samples, vec![0.1, 0.3]);
    }

    #[test]
    fn permission_messages_classify_as_denied() {
        assert!(matches!(
            classify_message("Access denied by user".into()),
            CaptureError::PermissionDenied
        ));
        assert!(matches!(
            classify_message("something else".into()),
            CaptureError::Other(_)
        ));
    }
}
