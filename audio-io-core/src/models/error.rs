use serde::Serialize;
use thiserror::Error;

/// Errors produced by the audio I/O manager and its collaborators.
///
/// Output failures travel inside [`AudioEvent::OutputItemError`]; input
/// failures before the capture device is open end the session.
///
/// [`AudioEvent::OutputItemError`]: crate::models::event::AudioEvent::OutputItemError
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum AudioIoError {
    #[error("permission denied")]
    PermissionDenied,

    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("i/o error: {0}")]
    Io(String),

    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),
}

impl From<std::io::Error> for AudioIoError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_convert() {
        let err: AudioIoError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert_eq!(err, AudioIoError::Io("gone".into()));
    }

    #[test]
    fn serializes_with_kind_tag() {
        let json = serde_json::to_value(AudioIoError::Decode("bad header".into())).unwrap();
        assert_eq!(json["kind"], "decode");
        assert_eq!(json["detail"], "bad header");

        let json = serde_json::to_value(AudioIoError::PermissionDenied).unwrap();
        assert_eq!(json["kind"], "permission_denied");
    }
}
