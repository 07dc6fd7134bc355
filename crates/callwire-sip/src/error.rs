use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Twirp error codes returned by the control plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TwirpCode {
    Canceled,
    Unknown,
    InvalidArgument,
    Malformed,
    DeadlineExceeded,
    NotFound,
    BadRoute,
    AlreadyExists,
    PermissionDenied,
    Unauthenticated,
    ResourceExhausted,
    FailedPrecondition,
    Aborted,
    OutOfRange,
    Unimplemented,
    Internal,
    Unavailable,
    Dataloss,
}

impl TwirpCode {
    /// Parses the wire form of a code. Unrecognised codes map to `Unknown`.
    pub fn parse(code: &str) -> Self {
        match code {
            "canceled" => Self::Canceled,
            "invalid_argument" => Self::InvalidArgument,
            "malformed" => Self::Malformed,
            "deadline_exceeded" => Self::DeadlineExceeded,
            "not_found" => Self::NotFound,
            "bad_route" => Self::BadRoute,
            "already_exists" => Self::AlreadyExists,
            "permission_denied" => Self::PermissionDenied,
            "unauthenticated" => Self::Unauthenticated,
            "resource_exhausted" => Self::ResourceExhausted,
            "failed_precondition" => Self::FailedPrecondition,
            "aborted" => Self::Aborted,
            "out_of_range" => Self::OutOfRange,
            "unimplemented" => Self::Unimplemented,
            "internal" => Self::Internal,
            "unavailable" => Self::Unavailable,
            "dataloss" => Self::Dataloss,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Canceled => "canceled",
            Self::Unknown => "unknown",
            Self::InvalidArgument => "invalid_argument",
            Self::Malformed => "malformed",
            Self::DeadlineExceeded => "deadline_exceeded",
            Self::NotFound => "not_found",
            Self::BadRoute => "bad_route",
            Self::AlreadyExists => "already_exists",
            Self::PermissionDenied => "permission_denied",
            Self::Unauthenticated => "unauthenticated",
            Self::ResourceExhausted => "resource_exhausted",
            Self::FailedPrecondition => "failed_precondition",
            Self::Aborted => "aborted",
            Self::OutOfRange => "out_of_range",
            Self::Unimplemented => "unimplemented",
            Self::Internal => "internal",
            Self::Unavailable => "unavailable",
            Self::Dataloss => "dataloss",
        }
    }

    /// Code implied by an HTTP status when the body carries no Twirp error.
    pub fn from_http_status(status: u16) -> Self {
        match status {
            400 => Self::Malformed,
            401 => Self::Unauthenticated,
            403 => Self::PermissionDenied,
            404 => Self::NotFound,
            408 => Self::DeadlineExceeded,
            409 => Self::AlreadyExists,
            412 => Self::FailedPrecondition,
            429 => Self::ResourceExhausted,
            501 => Self::Unimplemented,
            503 => Self::Unavailable,
            500..=599 => Self::Internal,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for TwirpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Telephony-layer status attached to a failed call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SipStatus {
    pub code: u16,
    pub reason: String,
}

impl SipStatus {
    /// Operator guidance for statuses that have a well known meaning.
    pub fn hint(&self) -> Option<&'static [&'static str]> {
        match self.code {
            486 => Some(&[
                "The phone is busy or rejecting the call",
                "Try calling a different number",
                "Check if the number can receive calls",
            ]),
            _ => None,
        }
    }
}

impl fmt::Display for SipStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.code, self.reason)
    }
}

/// Structured error returned by the control plane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TwirpError {
    pub code: TwirpCode,
    pub msg: String,
    pub meta: HashMap<String, String>,
}

impl TwirpError {
    pub fn new(code: TwirpCode, msg: impl Into<String>) -> Self {
        Self {
            code,
            msg: msg.into(),
            meta: HashMap::new(),
        }
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    /// Telephony status from `sip_status_code` / `sip_status` metadata, if both are present.
    pub fn sip_status(&self) -> Option<SipStatus> {
        let code = self.meta.get("sip_status_code")?.trim().parse().ok()?;
        let reason = self.meta.get("sip_status")?.clone();
        Some(SipStatus { code, reason })
    }
}

impl fmt::Display for TwirpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.msg)
    }
}

#[derive(Error, Debug)]
pub enum SipError {
    #[error("LiveKit access token error: {0}")]
    Token(#[from] livekit_api::access_token::AccessTokenError),

    #[error("control plane request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("control plane error {0}")]
    Twirp(TwirpError),

    #[error("unexpected control plane response: {0}")]
    Decode(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl SipError {
    pub fn code(&self) -> Option<TwirpCode> {
        match self {
            Self::Twirp(e) => Some(e.code),
            _ => None,
        }
    }

    pub fn is_already_exists(&self) -> bool {
        self.code() == Some(TwirpCode::AlreadyExists)
    }

    pub fn sip_status(&self) -> Option<SipStatus> {
        match self {
            Self::Twirp(e) => e.sip_status(),
            _ => None,
        }
    }
}

impl From<TwirpError> for SipError {
    fn from(err: TwirpError) -> Self {
        Self::Twirp(err)
    }
}
