use std::fmt;

/// Errors a collaborator (license service, node source, state store, sink)
/// may return. The reconciler decides per call site whether they are fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollaboratorError {
    /// Network or transport failure.
    Transport(String),
    /// The remote side answered with an application-level error.
    Api { status: Option<u16>, message: String },
    /// A response or stored record could not be decoded.
    Decode(String),
    /// Required configuration or metadata is missing.
    Config(String),
    /// The requested object does not exist.
    NotFound(String),
}

impl fmt::Display for CollaboratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollaboratorError::Transport(msg) => write!(f, "transport error: {msg}"),
            CollaboratorError::Api {
                status: Some(s),
                message,
            } => write!(f, "api error status={s}: {message}"),
            CollaboratorError::Api {
                status: None,
                message,
            } => write!(f, "api error: {message}"),
            CollaboratorError::Decode(msg) => write!(f, "decode error: {msg}"),
            CollaboratorError::Config(msg) => write!(f, "config error: {msg}"),
            CollaboratorError::NotFound(msg) => write!(f, "not found: {msg}"),
        }
    }
}

impl std::error::Error for CollaboratorError {}

/// Failures that abort a reconciliation pass.
///
/// Check-in, extend, availability, and state-store failures never surface
/// here; the pass compensates for them in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    /// No valid license grant could be fetched.
    LicenseUnavailable(CollaboratorError),
    /// The node count could not be determined.
    MetricsUnavailable(CollaboratorError),
    /// The license service rejected the checkout.
    CheckoutFailed(CollaboratorError),
    /// The compliance report could not be published.
    OutputUnavailable(CollaboratorError),
}

impl ReconcileError {
    pub fn kind(&self) -> &'static str {
        match self {
            ReconcileError::LicenseUnavailable(_) => "license_unavailable",
            ReconcileError::MetricsUnavailable(_) => "metrics_unavailable",
            ReconcileError::CheckoutFailed(_) => "checkout_failed",
            ReconcileError::OutputUnavailable(_) => "output_unavailable",
        }
    }
}

impl fmt::Display for ReconcileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileError::LicenseUnavailable(e) => write!(f, "unable to get license: {e}"),
            ReconcileError::MetricsUnavailable(e) => {
                write!(f, "unable to determine number of active nodes: {e}")
            }
            ReconcileError::CheckoutFailed(e) => write!(f, "unable to checkout licenses: {e}"),
            ReconcileError::OutputUnavailable(e) => {
                write!(f, "unable to publish compliance output: {e}")
            }
        }
    }
}

impl std::error::Error for ReconcileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReconcileError::LicenseUnavailable(e)
            | ReconcileError::MetricsUnavailable(e)
            | ReconcileError::CheckoutFailed(e)
            | ReconcileError::OutputUnavailable(e) => Some(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collaborator_error_display_api_with_status() {
        let err = CollaboratorError::Api {
            status: Some(409),
            message: "over entitlement limit".to_string(),
        };
        assert_eq!(err.to_string(), "api error status=409: over entitlement limit");
    }

    #[test]
    fn reconcile_error_display_wraps_cause() {
        let err = ReconcileError::CheckoutFailed(CollaboratorError::Transport(
            "connection refused".to_string(),
        ));
        assert_eq!(
            err.to_string(),
            "unable to checkout licenses: transport error: connection refused"
        );
        assert_eq!(err.kind(), "checkout_failed");
    }

    #[test]
    fn reconcile_error_exposes_source() {
        use std::error::Error;
        let err = ReconcileError::MetricsUnavailable(CollaboratorError::Decode("bad".to_string()));
        assert_eq!(err.source().unwrap().to_string(), "decode error: bad");
    }
}
