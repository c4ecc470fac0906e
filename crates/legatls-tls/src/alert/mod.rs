//! Alert protocol helpers on top of the shared alert types.

pub use legatls_types::{Alert, AlertDescription, AlertLevel};
use legatls_types::TlsError;

/// Decode an alert record body.
pub fn parse_alert(fragment: &[u8]) -> Result<Alert, TlsError> {
    if fragment.len() != 2 {
        return Err(TlsError::DecodeError(format!(
            "alert body must be 2 bytes, got {}",
            fragment.len()
        )));
    }
    Alert::from_bytes(fragment)
        .ok_or_else(|| TlsError::DecodeError(format!("unknown alert {:?}", fragment)))
}

/// The fatal alert to send before tearing a connection down on `err`, if
/// the error is one the peer should hear about.
pub fn fatal_alert_for(err: &TlsError) -> Option<Alert> {
    err.alert_description().map(Alert::fatal)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_alert() {
        let alert = parse_alert(&[2, 20]).unwrap();
        assert!(alert.is_fatal());
        assert_eq!(alert.description, AlertDescription::BadRecordMac);
        assert_eq!(parse_alert(&[1, 0]).unwrap().description, AlertDescription::CloseNotify);
    }

    #[test]
    fn test_parse_alert_rejects_garbage() {
        assert!(matches!(parse_alert(&[2]), Err(TlsError::DecodeError(_))));
        assert!(matches!(parse_alert(&[2, 20, 0]), Err(TlsError::DecodeError(_))));
        assert!(matches!(parse_alert(&[3, 20]), Err(TlsError::DecodeError(_))));
        assert!(matches!(parse_alert(&[2, 255]), Err(TlsError::DecodeError(_))));
    }

    #[test]
    fn test_fatal_alert_for() {
        let alert = fatal_alert_for(&TlsError::BadRecordMac).unwrap();
        assert_eq!(alert.level, AlertLevel::Fatal);
        assert_eq!(alert.description, AlertDescription::BadRecordMac);
        assert_eq!(
            fatal_alert_for(&TlsError::UnexpectedMessage("x".into()))
                .unwrap()
                .description,
            AlertDescription::UnexpectedMessage
        );
        assert!(fatal_alert_for(&TlsError::TruncatedStream).is_none());
        assert!(fatal_alert_for(&TlsError::AlertReceived(Alert::fatal(
            AlertDescription::HandshakeFailure
        )))
        .is_none());
    }
}
