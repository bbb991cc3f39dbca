use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::state::SessionPhase;
use crate::audio::{pcm, AudioBlock, CapabilityReport, CaptureBackend, CaptureError};
use crate::transport::{ClientEvent, ServerEvent, Transport};
use crate::ui::{ControlState, StatusLine, UiSurface};

/// External control commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
    Shutdown,
}

/// Statistics reported when the controller shuts down
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub duration_secs: f64,
    pub blocks_streamed: u64,
    pub results_received: u64,
}

/// Everything the dispatch loop reacts to, funneled through one channel so
/// processing stays strictly sequential.
enum LoopEvent {
    Command(Command),
    Server(ServerEvent),
    Resolved(Resolution),
    Block(AudioBlock),
}

/// Outcome of a permission/capture acquisition. The backend travels with it
/// so the controller regains ownership whether or not the grant is kept.
struct Resolution {
    backend: Box<dyn CaptureBackend>,
    outcome: Result<mpsc::Receiver<AudioBlock>, CaptureError>,
}

/// Handle for driving a running controller
#[derive(Clone)]
pub struct ControllerHandle {
    commands: mpsc::Sender<Command>,
    phase_rx: watch::Receiver<SessionPhase>,
}

impl ControllerHandle {
    pub async fn start(&self) -> Result<()> {
        self.commands
            .send(Command::Start)
            .await
            .context("Controller is not running")
    }

    pub async fn stop(&self) -> Result<()> {
        self.commands
            .send(Command::Stop)
            .await
            .context("Controller is not running")
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.commands
            .send(Command::Shutdown)
            .await
            .context("Controller is not running")
    }

    pub fn phase(&self) -> SessionPhase {
        *self.phase_rx.borrow()
    }

    /// Watch receiver for phase changes (composition, tests)
    pub fn phases(&self) -> watch::Receiver<SessionPhase> {
        self.phase_rx.clone()
    }
}

/// The capture & streaming controller: owns the session state machine and
/// processes commands, server events, and audio blocks on a single task.
pub struct StreamController<U: UiSurface> {
    session_id: String,
    capability: CapabilityReport,
    transport: Arc<dyn Transport>,
    ui: U,

    phase: SessionPhase,
    has_permission: bool,
    backend: Option<Box<dyn CaptureBackend>>,
    block_task: Option<JoinHandle<()>>,

    commands_rx: mpsc::Receiver<Command>,
    server_rx: mpsc::Receiver<ServerEvent>,
    internal_tx: mpsc::Sender<LoopEvent>,
    internal_rx: mpsc::Receiver<LoopEvent>,
    phase_tx: watch::Sender<SessionPhase>,

    started_at: DateTime<Utc>,
    blocks_streamed: u64,
    results_received: u64,
}

impl<U: UiSurface> StreamController<U> {
    pub fn new(
        session_id: String,
        capability: CapabilityReport,
        backend: Box<dyn CaptureBackend>,
        transport: Arc<dyn Transport>,
        server_rx: mpsc::Receiver<ServerEvent>,
        ui: U,
    ) -> (Self, ControllerHandle) {
        let (commands_tx, commands_rx) = mpsc::channel(16);
        let (internal_tx, internal_rx) = mpsc::channel(256);
        let (phase_tx, phase_rx) = watch::channel(SessionPhase::Idle);

        let controller = Self {
            session_id,
            capability,
            transport,
            ui,
            phase: SessionPhase::Idle,
            has_permission: false,
            backend: Some(backend),
            block_task: None,
            commands_rx,
            server_rx,
            internal_tx,
            internal_rx,
            phase_tx,
            started_at: Utc::now(),
            blocks_streamed: 0,
            results_received: 0,
        };

        let handle = ControllerHandle {
            commands: commands_tx,
            phase_rx,
        };

        (controller, handle)
    }

    /// Run the dispatch loop until shutdown. All session state is mutated
    /// here and nowhere else.
    pub async fn run(mut self) -> Result<SessionStats> {
        info!("Controller started: {}", self.session_id);

        self.apply_capability_gate();

        // Funnel the external channels into the internal one so the loop
        // body stays a single sequential consumer.
        let commands_forwarder = {
            let tx = self.internal_tx.clone();
            let mut rx = std::mem::replace(&mut self.commands_rx, mpsc::channel(1).1);
            tokio::spawn(async move {
                while let Some(cmd) = rx.recv().await {
                    let is_shutdown = cmd == Command::Shutdown;
                    if tx.send(LoopEvent::Command(cmd)).await.is_err() {
                        return;
                    }
                    if is_shutdown {
                        return;
                    }
                }
                // All handles dropped: treat as shutdown.
                let _ = tx.send(LoopEvent::Command(Command::Shutdown)).await;
            })
        };

        let server_forwarder = {
            let tx = self.internal_tx.clone();
            let mut rx = std::mem::replace(&mut self.server_rx, mpsc::channel(1).1);
            tokio::spawn(async move {
                while let Some(event) = rx.recv().await {
                    if tx.send(LoopEvent::Server(event)).await.is_err() {
                        return;
                    }
                }
                // Transport dropped its sender: surface as a disconnect.
                let _ = tx.send(LoopEvent::Server(ServerEvent::Disconnect)).await;
            })
        };

        while let Some(event) = self.internal_rx.recv().await {
            match event {
                LoopEvent::Command(Command::Start) => self.handle_start().await,
                LoopEvent::Command(Command::Stop) => self.handle_stop().await,
                LoopEvent::Command(Command::Shutdown) => {
                    self.handle_stop().await;
                    break;
                }
                LoopEvent::Server(event) => self.handle_server_event(event).await,
                LoopEvent::Resolved(resolution) => self.handle_resolution(resolution).await,
                LoopEvent::Block(block) => self.handle_block(block).await,
            }
        }

        commands_forwarder.abort();
        server_forwarder.abort();

        info!("Controller stopped: {}", self.session_id);
        Ok(self.stats())
    }

    fn stats(&self) -> SessionStats {
        let duration = Utc::now().signed_duration_since(self.started_at);
        SessionStats {
            session_id: self.session_id.clone(),
            started_at: self.started_at,
            duration_secs: duration.num_milliseconds() as f64 / 1000.0,
            blocks_streamed: self.blocks_streamed,
            results_received: self.results_received,
        }
    }

    /// Up-front feature detection, checked once at startup. Missing capture
    /// or processing support disables the controls for the whole run;
    /// an insecure transport only warns.
    fn apply_capability_gate(&mut self) {
        if !self.capability.secure_transport {
            self.ui.set_status(StatusLine::new(
                "Warning: audio is streaming over an unencrypted transport",
            ));
        }

        if !self.capability.capture {
            self.ui
                .set_status(StatusLine::new("Error: no audio capture support on this system"));
            self.ui.set_controls(ControlState::DISABLED);
        } else if !self.capability.processing {
            self.ui.set_status(StatusLine::new(
                "Error: no usable audio input configuration found",
            ));
            self.ui.set_controls(ControlState::DISABLED);
        } else {
            self.ui.set_controls(ControlState::idle());
        }
    }

    fn set_phase(&mut self, phase: SessionPhase) {
        self.phase = phase;
        self.phase_tx.send_replace(phase);
    }

    async fn handle_start(&mut self) {
        if !self.capability.capture_supported() {
            self.ui
                .set_status(StatusLine::new("Error: audio capture is unavailable"));
            return;
        }

        let next = match self.phase.request_permission() {
            Ok(next) => next,
            Err(rejected) => {
                debug!("Start ignored: {}", rejected);
                return;
            }
        };

        let Some(mut backend) = self.backend.take() else {
            // Unreachable while the phase guard holds; keep the state sane.
            warn!("Start ignored: backend handle missing");
            return;
        };

        if self.has_permission {
            debug!("Permission already granted, reopening capture without prompting");
        } else {
            info!("Requesting microphone access...");
        }

        self.set_phase(next);

        let tx = self.internal_tx.clone();
        tokio::spawn(async move {
            let outcome = backend.start().await;
            let _ = tx.send(LoopEvent::Resolved(Resolution { backend, outcome })).await;
        });
    }

    async fn handle_resolution(&mut self, resolution: Resolution) {
        let Resolution { backend, outcome } = resolution;

        match self.phase.begin_recording() {
            Ok(next) => match outcome {
                Ok(audio_rx) => {
                    self.has_permission = true;
                    self.backend = Some(backend);
                    self.spawn_block_forwarder(audio_rx);
                    self.phase = next;

                    if let Err(e) = self.transport.emit(ClientEvent::StartStream).await {
                        error!("Failed to emit start_stream: {:#}", e);
                    }

                    info!("Started recording");
                    self.ui.set_controls(ControlState::recording());
                    self.ui.set_status(StatusLine::new("Recording..."));

                    // Publish last: observers of the phase may rely on the
                    // start notification having gone out.
                    self.phase_tx.send_replace(self.phase);
                }
                Err(e) => {
                    self.has_permission = false;
                    self.backend = Some(backend);
                    self.phase = SessionPhase::Idle;

                    error!("Error starting recording: {}", e);
                    self.ui.set_controls(ControlState::idle());
                    self.ui
                        .set_status(StatusLine::new(format!("Error accessing microphone: {}", e)));
                    self.phase_tx.send_replace(self.phase);
                }
            },
            Err(_) => {
                // A stop was requested while the acquisition was pending;
                // discard the late grant and release the device.
                let mut backend = backend;
                match outcome {
                    Ok(audio_rx) => {
                        info!("Discarding capture grant resolved after stop");
                        self.has_permission = true;
                        drop(audio_rx);
                        if let Err(e) = backend.stop().await {
                            error!("Failed to release discarded capture: {:#}", e);
                        }
                    }
                    Err(e) => {
                        self.has_permission = false;
                        debug!("Capture acquisition failed after stop: {}", e);
                    }
                }
                self.backend = Some(backend);
            }
        }
    }

    fn spawn_block_forwarder(&mut self, mut audio_rx: mpsc::Receiver<AudioBlock>) {
        let tx = self.internal_tx.clone();
        self.block_task = Some(tokio::spawn(async move {
            while let Some(block) = audio_rx.recv().await {
                if tx.send(LoopEvent::Block(block)).await.is_err() {
                    break;
                }
            }
        }));
    }

    async fn handle_block(&mut self, block: AudioBlock) {
        // Teardown race: a block can still be in flight when the session
        // ends. Drop it silently.
        if !self.phase.accepts_blocks() {
            return;
        }

        let pcm = pcm::convert_block(&block.samples);
        let payload = pcm::encode_block(&pcm);

        match self.transport.emit(ClientEvent::AudioData { payload }).await {
            Ok(()) => self.blocks_streamed += 1,
            Err(e) => error!("Failed to emit audio_data: {:#}", e),
        }
    }

    async fn handle_stop(&mut self) {
        match self.phase {
            SessionPhase::Idle => {}
            SessionPhase::RequestingPermission => {
                // The pending acquisition resolves into an Idle phase and
                // gets discarded there; nothing was streamed yet.
                info!("Stop requested while permission request pending");
                self.phase = SessionPhase::Idle;
                self.ui.set_controls(ControlState::idle());
                self.phase_tx.send_replace(self.phase);
            }
            SessionPhase::Recording => {
                info!("Stopping recording");

                // Flip the phase before anything else so in-flight blocks
                // observe it and get dropped.
                self.phase = SessionPhase::Idle;

                if let Some(task) = self.block_task.take() {
                    task.abort();
                }

                if let Err(e) = self.transport.emit(ClientEvent::StopStream).await {
                    error!("Failed to emit stop_stream: {:#}", e);
                }

                if let Some(backend) = self.backend.as_mut() {
                    if let Err(e) = backend.stop().await {
                        error!("Failed to stop capture backend: {:#}", e);
                    }
                }

                self.ui.set_controls(ControlState::idle());
                self.ui.set_status(StatusLine::new("Recording stopped"));
                self.phase_tx.send_replace(self.phase);
            }
        }
    }

    async fn handle_server_event(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::Connect => {
                info!("Connected to server");
                self.ui.set_status(StatusLine::new("Connected to server"));
            }
            ServerEvent::Disconnect => {
                info!("Disconnected from server");
                self.ui
                    .set_status(StatusLine::new("Disconnected from server"));
                // A lost transport implies the stream ended.
                self.handle_stop().await;
            }
            ServerEvent::RecognitionResult { text, translation } => {
                self.results_received += 1;
                if let Some(text) = text {
                    self.ui.set_transcription(&text);
                }
                if let Some(translation) = translation {
                    self.ui.set_translation(&translation);
                }
            }
            ServerEvent::Status { message } => {
                info!("Status update: {}", message);
                self.ui.set_status(StatusLine::new(message));
            }
            ServerEvent::Error { message } => {
                error!("Server error: {}", message);
                self.ui
                    .set_status(StatusLine::new(format!("Error: {}", message)));
            }
        }
    }
}
