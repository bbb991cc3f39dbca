// Synthesized tone source, standing in for a microphone when none is
// available (development, CI).

use std::f32::consts::TAU;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

use super::backend::{AudioBlock, CaptureBackend, CaptureConfig, CaptureError};

const TONE_HZ: f32 = 440.0;

pub struct ToneBackend {
    config: CaptureConfig,
    task: Option<JoinHandle<()>>,
    capturing: bool,
}

impl ToneBackend {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            task: None,
            capturing: false,
        }
    }
}

#[async_trait::async_trait]
impl CaptureBackend for ToneBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioBlock>, CaptureError> {
        if self.capturing {
            return Err(CaptureError::Other("already capturing".into()));
        }

        let (block_tx, block_rx) = mpsc::channel(32);
        let block_size = self.config.block_size;
        let sample_rate = self.config.sample_rate;

        // Emit blocks at the cadence a real device would deliver them.
        let block_interval =
            Duration::from_secs_f64(block_size as f64 / sample_rate as f64);

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(block_interval);
            let mut position: u64 = 0;

            loop {
                interval.tick().await;

                let samples: Vec<f32> = (0..block_size)
                    .map(|i| {
                        let t = (position + i as u64) as f32 / sample_rate as f32;
                        (TAU * TONE_HZ * t).sin() * 0.25
                    })
                    .collect();
                position += block_size as u64;

                if block_tx.send(AudioBlock { samples }).await.is_err() {
                    break;
                }
            }
        });

        self.task = Some(task);
        self.capturing = true;
        info!("Tone source started ({} Hz sine)", TONE_HZ);
        Ok(block_rx)
    }

    async fn stop(&mut self) -> Result<()> {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.capturing = false;
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing
    }

    fn name(&self) -> &str {
        "tone"
    }
}
