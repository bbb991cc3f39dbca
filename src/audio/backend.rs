use anyhow::Result;
use cpal::traits::{DeviceTrait, HostTrait};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::warn;

/// A fixed-size block of mono float samples in [-1.0, 1.0] produced by a
/// capture backend while a session is active.
#[derive(Debug, Clone)]
pub struct AudioBlock {
    pub samples: Vec<f32>,
}

/// Capture failure categories surfaced to the user.
///
/// The display strings are shown verbatim in the status line, prefixed by
/// the controller with "Error accessing microphone: ".
#[derive(Debug, Clone, Error)]
pub enum CaptureError {
    #[error("Permission denied. Please allow microphone access.")]
    PermissionDenied,

    #[error("No microphone found.")]
    DeviceAbsent,

    #[error("Microphone is already in use by another application.")]
    DeviceBusy,

    #[error("{0}")]
    Other(String),
}

/// Configuration for capture backends
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Target sample rate (device input is decimated if higher)
    pub sample_rate: u32,
    /// Target channel count (input is downmixed to mono)
    pub channels: u16,
    /// Samples per delivered block
    pub block_size: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            channels: 1,
            block_size: 4096,
        }
    }
}

/// Audio capture backend trait
///
/// Implementations:
/// - `MicBackend`: default input device via cpal
/// - `ToneBackend`: synthesized tone, for running without a microphone
#[async_trait::async_trait]
pub trait CaptureBackend: Send {
    /// Acquire the capture device and start delivering blocks.
    ///
    /// Returns a channel receiver that yields one `AudioBlock` per
    /// `block_size` captured samples, in capture order.
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioBlock>, CaptureError>;

    /// Stop capturing and release the device.
    async fn stop(&mut self) -> Result<()>;

    /// Whether the backend is currently capturing
    fn is_capturing(&self) -> bool;

    /// Backend name for logging
    fn name(&self) -> &str;
}

/// Audio source selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureSource {
    /// Default microphone input
    Microphone,
    /// Synthesized test tone
    Tone,
}

/// Capture backend factory
pub struct CaptureBackendFactory;

impl CaptureBackendFactory {
    pub fn create(source: CaptureSource, config: CaptureConfig) -> Box<dyn CaptureBackend> {
        match source {
            CaptureSource::Microphone => Box::new(super::mic::MicBackend::new(config)),
            CaptureSource::Tone => Box::new(super::tone::ToneBackend::new(config)),
        }
    }
}

/// Result of up-front feature detection, checked once before any capture
/// attempt. Missing capture or processing support permanently disables the
/// start control; an insecure transport is advisory only.
#[derive(Debug, Clone, Copy)]
pub struct CapabilityReport {
    /// Transport URL uses a TLS scheme
    pub secure_transport: bool,
    /// An audio host is available and input devices can be enumerated
    pub capture: bool,
    /// At least one input device advertises a usable stream config
    pub processing: bool,
}

impl CapabilityReport {
    /// Probe platform audio support and the transport URL scheme.
    pub fn probe(transport_url: &str) -> Self {
        let secure_transport = is_secure_url(transport_url);

        let host = cpal::default_host();
        let (capture, processing) = match host.input_devices() {
            Ok(devices) => {
                let mut usable = false;
                for device in devices {
                    let has_config = device
                        .supported_input_configs()
                        .map(|mut configs| configs.next().is_some())
                        .unwrap_or(false);
                    if has_config {
                        usable = true;
                        break;
                    }
                }
                (true, usable)
            }
            Err(e) => {
                warn!("Input device enumeration failed: {}", e);
                (false, false)
            }
        };

        Self {
            secure_transport,
            capture,
            processing,
        }
    }

    /// A report for environments where probing is not wanted (tone source,
    /// tests).
    pub fn assume_available(secure_transport: bool) -> Self {
        Self {
            secure_transport,
            capture: true,
            processing: true,
        }
    }

    /// Whether capture can ever be started in this process
    pub fn capture_supported(&self) -> bool {
        self.capture && self.processing
    }
}

fn is_secure_url(url: &str) -> bool {
    url.starts_with("tls://") || url.starts_with("nats+tls://") || url.starts_with("wss://")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secure_transport_schemes() {
        assert!(is_secure_url("tls://nats.example.com:4222"));
        assert!(is_secure_url("nats+tls://nats.example.com:4222"));
        assert!(!is_secure_url("nats://localhost:4222"));
    }

    #[test]
    fn capability_gate_requires_both_capture_and_processing() {
        let report = CapabilityReport {
            secure_transport: true,
            capture: true,
            processing: false,
        };
        assert!(!report.capture_supported());

        let report = CapabilityReport::assume_available(false);
        assert!(report.capture_supported());
    }
}
