//! Operator-facing descriptions of failed control-plane operations.

use crate::error::{SipError, SipStatus, TwirpCode};
use std::fmt;

/// Categorised view of a failure, suitable for printing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureReport {
    pub code: Option<TwirpCode>,
    pub message: String,
    pub sip_status: Option<SipStatus>,
}

impl FailureReport {
    pub fn from_error(err: &SipError) -> Self {
        match err {
            SipError::Twirp(e) => Self {
                code: Some(e.code),
                message: e.msg.clone(),
                sip_status: e.sip_status(),
            },
            other => Self {
                code: None,
                message: other.to_string(),
                sip_status: None,
            },
        }
    }

    /// True when the telephony layer rejected the call, as opposed to an
    /// API, authentication or network failure.
    pub fn is_telephony_failure(&self) -> bool {
        self.sip_status.is_some()
    }

    pub fn hint(&self) -> Option<&'static [&'static str]> {
        self.sip_status.as_ref().and_then(SipStatus::hint)
    }
}

impl fmt::Display for FailureReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(code) = self.code {
            writeln!(f, "Error code: {}", code)?;
        }
        write!(f, "Message: {}", self.message)?;

        if let Some(status) = &self.sip_status {
            write!(f, "\nSIP Status: {}", status)?;
            if let Some(lines) = status.hint() {
                write!(f, "\nSIP status '{}' typically means:", status.code)?;
                for line in lines {
                    write!(f, "\n  - {}", line)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TwirpError;

    fn call_failure(code: &str, reason: &str) -> SipError {
        TwirpError::new(TwirpCode::Unavailable, "twirp error unknown: call failed")
            .with_meta("sip_status_code", code)
            .with_meta("sip_status", reason)
            .into()
    }

    #[test]
    fn busy_status_carries_explanation() {
        let report = FailureReport::from_error(&call_failure("486", "Busy Here"));
        assert!(report.is_telephony_failure());
        assert!(report.hint().is_some());

        let text = report.to_string();
        assert!(text.contains("SIP Status: 486 - Busy Here"));
        assert!(text.contains("busy"));
    }

    #[test]
    fn other_status_is_reported_generically() {
        let report = FailureReport::from_error(&call_failure("480", "Temporarily Unavailable"));
        assert!(report.is_telephony_failure());
        assert!(report.hint().is_none());

        let text = report.to_string();
        assert!(text.contains("SIP Status: 480 - Temporarily Unavailable"));
        assert!(!text.contains("typically means"));
    }

    #[test]
    fn non_twirp_errors_have_no_code() {
        let report = FailureReport::from_error(&SipError::Config("LiveKit URL is empty".into()));
        assert_eq!(report.code, None);
        assert!(!report.is_telephony_failure());
        assert_eq!(report.to_string(), "Message: invalid configuration: LiveKit URL is empty");
    }
}
