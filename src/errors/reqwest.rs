use reqwest::StatusCode;

/// Error for a [`reqwest::RequestBuilder`] that cannot be cloned via [`RequestBuilder::try_clone`][reqwest::RequestBuilder::try_clone]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, thiserror::Error)]
#[error("cannot clone request")]
pub struct CantCloneError;

/// Everything that can end an [`EventSource`][crate::EventSource] or [`subscribe`][crate::reqwest::subscribe] call.
///
/// Once one of these is returned no further events are delivered.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The request could not be completed
    #[error("request failed: {0}")]
    Request(#[source] reqwest::Error),

    /// Reading the response body failed part way through
    #[error("response body failed: {0}")]
    Body(#[source] reqwest::Error),

    /// The server answered with a non-success status
    #[error("response has non-success status {0}")]
    Status(StatusCode),

    /// The response was not an event stream; holds the content type that was sent, if any
    #[error("response does not have text/event-stream Content-Type")]
    ContentType(Option<String>),

    /// The resume cursor cannot be sent as a header value
    #[error("last event id {0:?} is not a valid header value")]
    InvalidLastEventId(String),

    #[error(transparent)]
    CantClone(#[from] CantCloneError),
}

impl Error {
    /// Connection level failure, either before or during the response
    pub fn is_transport_err(&self) -> bool {
        matches!(self, Error::Request(_) | Error::Body(_))
    }

    /// The server responded, but not with something we can read events from
    pub fn is_response_err(&self) -> bool {
        matches!(self, Error::Status(_) | Error::ContentType(_))
    }

    /// Status code of a rejected response
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Status(status) => Some(*status),
            Error::Request(e) | Error::Body(e) => e.status(),
            _ => None,
        }
    }
}
