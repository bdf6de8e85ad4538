use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid video id: {id}")]
    InvalidVideoId { id: String },

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream returned status {status}")]
    Status { status: reqwest::StatusCode },

    #[error("unparsable {what}")]
    Parse { what: &'static str },

    #[error("video unavailable")]
    VideoUnavailable,

    #[error("video is unplayable: {reason}")]
    VideoUnplayable { reason: String },

    #[error("video requires sign-in: {reason}")]
    SignInRequired { reason: String },

    #[error("video requires purchase")]
    VideoRequiresPurchase { preview: Option<String> },

    #[error("video has no live stream manifest")]
    NotLiveStream,

    #[error("no recognizable codecs in {mime:?}")]
    CodecExtraction { mime: String },

    #[error("descrambler exceeded its evaluation budget")]
    ScriptTimeout,

    #[error("descrambler evaluation failed: {message}")]
    Script { message: String },

    #[error("player script does not contain a descrambler")]
    DescramblerNotFound,

    #[error("resolution cancelled")]
    Cancelled,

    #[error("resolution deadline exceeded")]
    DeadlineExceeded,
}

impl Error {
    /// Transient failures are the only ones the transport retry wrapper
    /// replays: connect/timeout errors, 5xx, and 429.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Error::Status { status } => {
                status.is_server_error() || *status == reqwest::StatusCode::TOO_MANY_REQUESTS
            }
            _ => false,
        }
    }

    /// Fatal errors abort the whole resolution instead of moving on to the
    /// next persona. Sign-in gates stay persona-scoped: another persona
    /// may still serve the video.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::VideoRequiresPurchase { .. }
                | Error::VideoUnplayable { .. }
                | Error::Cancelled
                | Error::DeadlineExceeded
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_transient() {
        let err = Error::Status {
            status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
        };
        assert!(err.is_transient());

        let err = Error::Status {
            status: reqwest::StatusCode::TOO_MANY_REQUESTS,
        };
        assert!(err.is_transient());
    }

    #[test]
    fn client_errors_are_not_transient() {
        let err = Error::Status {
            status: reqwest::StatusCode::FORBIDDEN,
        };
        assert!(!err.is_transient());

        let err = Error::Status {
            status: reqwest::StatusCode::NOT_FOUND,
        };
        assert!(!err.is_transient());
    }

    #[test]
    fn purchase_and_unplayable_are_fatal() {
        assert!(
            Error::VideoRequiresPurchase {
                preview: Some("abc12345678".into())
            }
            .is_fatal()
        );
        assert!(
            Error::VideoUnplayable {
                reason: "This video has been removed by the uploader".into()
            }
            .is_fatal()
        );
        assert!(!Error::NotLiveStream.is_fatal());
        assert!(!Error::DescramblerNotFound.is_fatal());
    }

    #[test]
    fn sign_in_gates_are_persona_scoped() {
        let err = Error::SignInRequired {
            reason: "Sign in to confirm your age".into(),
        };
        assert!(!err.is_fatal());
        assert!(!err.is_transient());
    }
}
