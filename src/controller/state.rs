use serde::Serialize;
use thiserror::Error;

/// Session phase, replacing the implicit `isRecording`/permission flag pair
/// with explicit transitions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    #[default]
    Idle,
    /// Permission request in flight; a stop in this phase returns to Idle
    /// and a late grant is discarded.
    RequestingPermission,
    Recording,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid transition: {from:?} -> {to}")]
pub struct InvalidTransition {
    pub from: SessionPhase,
    pub to: &'static str,
}

impl SessionPhase {
    /// Idle -> RequestingPermission. Rejected from any other phase, which is
    /// what makes a redundant start a no-op.
    pub fn request_permission(self) -> Result<Self, InvalidTransition> {
        match self {
            Self::Idle => Ok(Self::RequestingPermission),
            from => Err(InvalidTransition {
                from,
                to: "requesting_permission",
            }),
        }
    }

    /// RequestingPermission -> Recording. Rejected from Idle, which is what
    /// discards a grant that resolves after a stop.
    pub fn begin_recording(self) -> Result<Self, InvalidTransition> {
        match self {
            Self::RequestingPermission => Ok(Self::Recording),
            from => Err(InvalidTransition {
                from,
                to: "recording",
            }),
        }
    }

    /// Any -> Idle. Always legal; stop is idempotent.
    pub fn stop(self) -> Self {
        Self::Idle
    }

    /// Blocks are processed only while recording; anything delivered in
    /// another phase is dropped silently.
    pub fn accepts_blocks(self) -> bool {
        matches!(self, Self::Recording)
    }
}
