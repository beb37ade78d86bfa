use std::fmt;

use crate::props::ObjectId;

/// Result alias that carries the custom [`VisualiserError`] type.
pub type Result<T> = std::result::Result<T, VisualiserError>;

/// Lifecycle hook a callback failure originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookStage {
    /// One-time hook run right after creation.
    Init,
    /// A reactive update rule, including the bootstrap pass.
    Update,
    /// The per-frame custom render hook.
    Render,
}

impl fmt::Display for HookStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            HookStage::Init => "init",
            HookStage::Update => "update",
            HookStage::Render => "render",
        };
        f.write_str(label)
    }
}

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum VisualiserError {
    /// A descriptor or configuration file is unusable. Raised at build or
    /// load time, never while frames are running.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// The creation factory for an object failed or resolved to nothing.
    #[error("failed to create object `{id}`: {reason}")]
    Creation { id: ObjectId, reason: String },
    /// A user callback returned an error while reconciling `id`.
    #[error("{stage} hook for object `{id}` failed")]
    Hook {
        id: ObjectId,
        stage: HookStage,
        #[source]
        source: Box<VisualiserError>,
    },
    /// No audio source is attached, or the attached source cannot deliver
    /// samples for this pass.
    #[error("audio unavailable: {0}")]
    AudioUnavailable(String),
    /// Free-form error, mostly produced by user callbacks.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Malformed JSON configuration or preset.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    /// Spectrum transform failure.
    #[error("{0}")]
    Fft(#[from] realfft::FftError),
}

impl VisualiserError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub fn configuration<T: Into<String>>(msg: T) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn creation<T: Into<String>>(id: &ObjectId, reason: T) -> Self {
        Self::Creation {
            id: id.clone(),
            reason: reason.into(),
        }
    }

    pub(crate) fn hook(id: &ObjectId, stage: HookStage, source: VisualiserError) -> Self {
        Self::Hook {
            id: id.clone(),
            stage,
            source: Box::new(source),
        }
    }

    /// Returns the object id this error is attributed to, if any.
    pub fn object_id(&self) -> Option<&ObjectId> {
        match self {
            Self::Creation { id, .. } | Self::Hook { id, .. } => Some(id),
            _ => None,
        }
    }
}

impl From<&str> for VisualiserError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for VisualiserError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
