//! Legal handshake message orderings per role.
//!
//! Checked before an inbound message is decoded, so a rejected message
//! never touches negotiation state.

use super::{HandshakeState, HandshakeType};
use crate::TlsRole;
use legatls_types::TlsError;

/// What just arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Incoming {
    Handshake(HandshakeType),
    ChangeCipherSpec,
}

/// The slice of connection state the ordering rules depend on.
#[derive(Debug, Clone, Copy)]
pub struct TransitionView {
    pub state: HandshakeState,
    pub last_received: Option<HandshakeType>,
    pub last_sent: Option<HandshakeType>,
    pub resumed: bool,
    pub ccs_received: bool,
    pub cert_requested: bool,
    pub peer_cert_nonempty: bool,
}

/// Check whether `incoming` may be processed next.
pub fn check_transition(role: TlsRole, view: &TransitionView, incoming: Incoming) -> Result<(), TlsError> {
    let legal = match view.state {
        HandshakeState::Failed | HandshakeState::Finished => false,
        HandshakeState::None | HandshakeState::Started => match role {
            TlsRole::Client => client_allows(view, incoming),
            TlsRole::Server => server_allows(view, incoming),
        },
    };
    if legal {
        Ok(())
    } else {
        Err(TlsError::UnexpectedMessage(format!(
            "{incoming:?} not allowed after {:?} ({role:?}, {:?})",
            view.last_received, view.state
        )))
    }
}

fn client_allows(v: &TransitionView, incoming: Incoming) -> bool {
    use HandshakeType as T;
    match incoming {
        Incoming::Handshake(T::HelloRequest) => true,
        Incoming::Handshake(T::ServerHello) => {
            v.last_received.is_none() && v.last_sent == Some(T::ClientHello)
        }
        Incoming::Handshake(T::Certificate) => {
            !v.resumed && v.last_received == Some(T::ServerHello)
        }
        Incoming::Handshake(T::CertificateRequest) => v.last_received == Some(T::Certificate),
        Incoming::Handshake(T::ServerHelloDone) => matches!(
            v.last_received,
            Some(T::Certificate) | Some(T::CertificateRequest)
        ),
        Incoming::ChangeCipherSpec if v.ccs_received => false,
        Incoming::ChangeCipherSpec if v.resumed => v.last_received == Some(T::ServerHello),
        Incoming::ChangeCipherSpec => {
            v.last_received == Some(T::ServerHelloDone) && v.last_sent == Some(T::Finished)
        }
        Incoming::Handshake(T::Finished) => v.ccs_received && v.last_received != Some(T::Finished),
        Incoming::Handshake(_) => false,
    }
}

fn server_allows(v: &TransitionView, incoming: Incoming) -> bool {
    use HandshakeType as T;
    match incoming {
        Incoming::Handshake(T::ClientHello) => v.last_received.is_none(),
        Incoming::Handshake(T::Certificate) => {
            !v.resumed
                && v.cert_requested
                && v.last_received == Some(T::ClientHello)
                && v.last_sent == Some(T::ServerHelloDone)
        }
        Incoming::Handshake(T::ClientKeyExchange) => {
            !v.resumed
                && v.last_sent == Some(T::ServerHelloDone)
                && if v.cert_requested {
                    v.last_received == Some(T::Certificate)
                } else {
                    v.last_received == Some(T::ClientHello)
                }
        }
        Incoming::Handshake(T::CertificateVerify) => {
            v.peer_cert_nonempty && v.last_received == Some(T::ClientKeyExchange)
        }
        Incoming::ChangeCipherSpec if v.ccs_received => false,
        Incoming::ChangeCipherSpec if v.resumed => {
            v.last_received == Some(T::ClientHello) && v.last_sent == Some(T::Finished)
        }
        // A client that sent a certificate must prove possession of its key.
        Incoming::ChangeCipherSpec if v.peer_cert_nonempty => {
            v.last_received == Some(T::CertificateVerify)
        }
        Incoming::ChangeCipherSpec => v.last_received == Some(T::ClientKeyExchange),
        Incoming::Handshake(T::Finished) => v.ccs_received && v.last_received != Some(T::Finished),
        Incoming::Handshake(_) => false,
    }
}
