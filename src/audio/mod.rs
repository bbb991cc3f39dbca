pub mod backend;
pub mod mic;
pub mod pcm;
pub mod tone;

pub use backend::{
    AudioBlock, CapabilityReport, CaptureBackend, CaptureBackendFactory, CaptureConfig,
    CaptureError, CaptureSource,
};
