//! Error types for capture operations.

use std::time::Duration;

/// Boxed error returned by frame callbacks and listeners.
pub type CallbackError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error reported by a [`FrameSource`](super::FrameSource) or its session.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// No graphics adapter exists at the requested index
    #[error("adapter {0} not found")]
    AdapterNotFound(u32),
    /// The adapter has no output at the requested index
    #[error("display {display} not found on adapter {adapter}")]
    DisplayNotFound { display: u32, adapter: u32 },
    /// The session lost access to the display (mode change, secure desktop, ...)
    #[error("access to the display was lost: {0}")]
    AccessLost(String),
    /// Any other platform failure
    #[error("{message}")]
    Platform {
        message: String,
        #[source]
        source: Option<CallbackError>,
    },
}

impl SourceError {
    /// Platform failure with an underlying cause.
    pub fn platform(message: impl Into<String>, source: impl Into<CallbackError>) -> Self {
        SourceError::Platform {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Platform failure without an underlying cause.
    pub fn other(message: impl Into<String>) -> Self {
        SourceError::Platform {
            message: message.into(),
            source: None,
        }
    }
}

/// Error type for capture operations.
///
/// Variants that wrap another error repeat its message and expose it through
/// [`std::error::Error::source`].
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// Opening the capture session failed; no frames were produced this cycle
    #[error("capture source unavailable for display {display} on adapter {adapter}: {source}")]
    SourceUnavailable {
        display: u32,
        adapter: u32,
        #[source]
        source: SourceError,
    },
    /// No frame became ready within the allowed time
    #[error("no frame became ready within {0:?}")]
    AcquireTimeout(Duration),
    /// The session failed while acquiring a frame
    #[error("frame acquisition failed: {0}")]
    AcquireFatal(#[source] SourceError),
    /// The source handed out a buffer that does not match its description
    #[error("invalid frame: {0}")]
    InvalidFrame(String),
    /// A frame callback or listener returned an error; the message is the
    /// callback's own
    #[error("{0}")]
    CallbackFailed(#[source] CallbackError),
    /// A frame callback or listener panicked
    #[error("frame callback panicked: {0}")]
    CallbackPanicked(String),
    /// The frame source panicked while opening, acquiring or closing
    #[error("capture source panicked: {0}")]
    SourcePanicked(String),
    /// A pipeline thread panicked outside of user callbacks
    #[error("{0} thread panicked")]
    ThreadPanicked(&'static str),
    /// The OS refused to spawn a pipeline thread
    #[error("failed to spawn capture thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Extract a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_callback_failure_preserves_message_and_source() {
        let original: CallbackError = "listener exploded".into();
        let err = CaptureError::CallbackFailed(original);

        assert_eq!(err.to_string(), "listener exploded");
        assert_eq!(err.source().map(|s| s.to_string()), Some("listener exploded".to_string()));
    }

    #[test]
    fn test_source_unavailable_chain() {
        let err = CaptureError::SourceUnavailable {
            display: 2,
            adapter: 0,
            source: SourceError::DisplayNotFound { display: 2, adapter: 0 },
        };

        assert!(err.to_string().contains("display 2 not found on adapter 0"));
        let source = err.source().expect("source");
        assert!(source.downcast_ref::<SourceError>().is_some());
    }

    #[test]
    fn test_platform_error_keeps_cause() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "device removed");
        let err = SourceError::platform("duplication failed", io);

        assert_eq!(err.to_string(), "duplication failed");
        assert_eq!(err.source().map(|s| s.to_string()), Some("device removed".to_string()));
    }

    #[test]
    fn test_panic_message_variants() {
        let borrowed: Box<dyn std::any::Any + Send> = Box::new("static");
        let owned: Box<dyn std::any::Any + Send> = Box::new(String::from("owned"));
        let other: Box<dyn std::any::Any + Send> = Box::new(7u32);

        assert_eq!(panic_message(borrowed.as_ref()), "static");
        assert_eq!(panic_message(owned.as_ref()), "owned");
        assert_eq!(panic_message(other.as_ref()), "non-string panic payload");
    }
}
