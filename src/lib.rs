pub mod audio;
pub mod config;
pub mod controller;
pub mod transport;
pub mod ui;

pub use audio::{
    AudioBlock, CapabilityReport, CaptureBackend, CaptureBackendFactory, CaptureConfig,
    CaptureError, CaptureSource,
};
pub use config::Config;
pub use controller::{Command, ControllerHandle, SessionPhase, SessionStats, StreamController};
pub use transport::{ClientEvent, NatsTransport, ServerEvent, Transport};
pub use ui::{ConsoleUi, ControlState, StatusLine, UiSurface};
