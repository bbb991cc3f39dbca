use std::io::Write;

/// A status line plus its error styling, recomputed on every update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub message: String,
    pub is_error: bool,
}

impl StatusLine {
    /// Classify the message: anything containing "error" (case-insensitive)
    /// gets the error style.
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        let is_error = message.to_lowercase().contains("error");
        Self { message, is_error }
    }
}

/// Enabled state of the start/stop controls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlState {
    pub start_enabled: bool,
    pub stop_enabled: bool,
}

impl ControlState {
    /// Both controls disabled, permanently (capability gate)
    pub const DISABLED: Self = Self {
        start_enabled: false,
        stop_enabled: false,
    };

    pub fn idle() -> Self {
        Self {
            start_enabled: true,
            stop_enabled: false,
        }
    }

    pub fn recording() -> Self {
        Self {
            start_enabled: false,
            stop_enabled: true,
        }
    }
}

/// The user-facing surface the controller writes to. It reads and writes
/// the surface but does not own its rendering.
pub trait UiSurface: Send {
    fn set_status(&mut self, status: StatusLine);
    fn set_transcription(&mut self, text: &str);
    fn set_translation(&mut self, text: &str);
    fn set_controls(&mut self, controls: ControlState);
}

/// Terminal rendering of the surface. Error statuses are shown in red.
pub struct ConsoleUi;

impl UiSurface for ConsoleUi {
    fn set_status(&mut self, status: StatusLine) {
        let mut stdout = std::io::stdout();
        if status.is_error {
            let _ = writeln!(stdout, "\x1b[31m[status] {}\x1b[0m", status.message);
        } else {
            let _ = writeln!(stdout, "[status] {}", status.message);
        }
        let _ = stdout.flush();
    }

    fn set_transcription(&mut self, text: &str) {
        println!("[transcript] {}", text);
    }

    fn set_translation(&mut self, text: &str) {
        println!("[translation] {}", text);
    }

    fn set_controls(&mut self, controls: ControlState) {
        tracing::debug!(
            "Controls: start={} stop={}",
            controls.start_enabled,
            controls.stop_enabled
        );
    }
}
