//! Per-connection security context: negotiation progress, sequence numbers,
//! the security-parameter slots and the handshake transcript.

use crate::crypt::key_schedule::{compute_key_block, KeyBlock};
use crate::crypt::transcript::Transcript;
use crate::crypt::CipherSuiteParams;
use crate::handshake::transitions::TransitionView;
use crate::handshake::{HandshakeState, HandshakeType};
use crate::record::encryption::CipherState;
use crate::session::CachedSession;
use crate::{Direction, ProtocolVersion, TlsRole};
use legatls_types::TlsError;
use rsa::RsaPublicKey;
use tracing::debug;
use zeroize::Zeroize;

/// Key material for one negotiated suite.
///
/// Lives in the `negotiating` slot while it is being assembled and moves to
/// `pending` once `compute_keys` has filled the key block.
pub struct SecurityParameters {
    pub params: &'static CipherSuiteParams,
    pub version: ProtocolVersion,
    pub master_secret: Vec<u8>,
    pub keys: Option<KeyBlock>,
}

impl SecurityParameters {
    pub fn new(params: &'static CipherSuiteParams, version: ProtocolVersion) -> Self {
        Self {
            params,
            version,
            master_secret: Vec::new(),
            keys: None,
        }
    }
}

impl Drop for SecurityParameters {
    fn drop(&mut self) {
        self.master_secret.zeroize();
    }
}

impl std::fmt::Debug for SecurityParameters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityParameters")
            .field("suite", &self.params.name)
            .field("version", &self.version)
            .field("has_keys", &self.keys.is_some())
            .finish_non_exhaustive()
    }
}

/// Mutable state of one connection.
pub struct SecurityContext {
    pub role: TlsRole,
    /// Version stamped on outgoing records; the negotiated one once
    /// `version_negotiated` is set.
    pub version: ProtocolVersion,
    pub version_negotiated: bool,
    /// Version carried in the ClientHello (sent or received); the RSA
    /// pre-master secret embeds it.
    pub client_hello_version: u16,
    pub state: HandshakeState,
    pub last_received: Option<HandshakeType>,
    pub last_sent: Option<HandshakeType>,
    pub read_seq: u64,
    pub write_seq: u64,
    pub negotiating: Option<SecurityParameters>,
    pub pending: Option<SecurityParameters>,
    pub current_read: Option<CipherState>,
    pub current_write: Option<CipherState>,
    pub transcript: Transcript,
    pub client_random: [u8; 32],
    pub server_random: [u8; 32],
    pub session_id: Vec<u8>,
    pub resumed: bool,
    /// Client: the cached session offered in the ClientHello.
    pub resume_candidate: Option<CachedSession>,
    pub cert_requested: bool,
    pub peer_certificates: Vec<Vec<u8>>,
    pub peer_public_key: Option<RsaPublicKey>,
    pub ccs_received: bool,
    pub sent_connection_end: bool,
    pub received_connection_end: bool,
    /// Handshake bytes not yet forming a complete message.
    pub(crate) hs_buf: Vec<u8>,
}

impl SecurityContext {
    pub fn new(role: TlsRole, initial_version: ProtocolVersion) -> Self {
        Self {
            role,
            version: initial_version,
            version_negotiated: false,
            client_hello_version: initial_version.to_u16(),
            state: HandshakeState::None,
            last_received: None,
            last_sent: None,
            read_seq: 0,
            write_seq: 0,
            negotiating: None,
            pending: None,
            current_read: None,
            current_write: None,
            transcript: Transcript::new(),
            client_random: [0; 32],
            server_random: [0; 32],
            session_id: Vec::new(),
            resumed: false,
            resume_candidate: None,
            cert_requested: false,
            peer_certificates: Vec::new(),
            peer_public_key: None,
            ccs_received: false,
            sent_connection_end: false,
            received_connection_end: false,
            hs_buf: Vec::new(),
        }
    }

    /// Fix the suite and version for this handshake.
    pub fn negotiate(&mut self, params: &'static CipherSuiteParams, version: ProtocolVersion) {
        self.version = version;
        self.version_negotiated = true;
        self.negotiating = Some(SecurityParameters::new(params, version));
    }

    pub fn set_master_secret(&mut self, master_secret: Vec<u8>) -> Result<(), TlsError> {
        let slot = self
            .negotiating
            .as_mut()
            .ok_or_else(|| TlsError::HandshakeFailed("no cipher suite negotiated".into()))?;
        slot.master_secret = master_secret;
        Ok(())
    }

    /// Master secret of the session being negotiated or just completed.
    pub fn master_secret(&self) -> Option<&[u8]> {
        self.negotiating
            .as_ref()
            .or(self.pending.as_ref())
            .map(|p| p.master_secret.as_slice())
            .filter(|ms| !ms.is_empty())
    }

    /// Suite parameters of the session being negotiated or just completed.
    pub fn params(&self) -> Option<&'static CipherSuiteParams> {
        self.negotiating
            .as_ref()
            .or(self.pending.as_ref())
            .map(|p| p.params)
    }

    /// Expand the master secret into the key block and promote the
    /// negotiating parameters to pending.
    pub fn compute_keys(&mut self) -> Result<(), TlsError> {
        let mut slot = self
            .negotiating
            .take()
            .ok_or_else(|| TlsError::HandshakeFailed("no cipher suite negotiated".into()))?;
        if slot.master_secret.is_empty() {
            self.negotiating = Some(slot);
            return Err(TlsError::HandshakeFailed("master secret not computed".into()));
        }
        let keys = compute_key_block(
            slot.version,
            slot.params,
            &slot.master_secret,
            &self.client_random,
            &self.server_random,
        )?;
        slot.keys = Some(keys);
        debug!(suite = slot.params.name, version = %slot.version, "key block computed");
        self.pending = Some(slot);
        Ok(())
    }

    fn pending_state(&self, direction: Direction) -> Result<CipherState, TlsError> {
        let pending = self
            .pending
            .as_ref()
            .ok_or_else(|| TlsError::UnexpectedMessage("ChangeCipherSpec before keys are ready".into()))?;
        let keys = pending
            .keys
            .as_ref()
            .ok_or_else(|| TlsError::HandshakeFailed("pending keys missing".into()))?;
        CipherState::new(pending.version, pending.params, keys, self.role, direction)
    }

    /// A ChangeCipherSpec was received: switch reads to the pending keys.
    pub fn activate_read(&mut self) -> Result<(), TlsError> {
        self.current_read = Some(self.pending_state(Direction::Read)?);
        self.read_seq = 0;
        self.ccs_received = true;
        Ok(())
    }

    /// A ChangeCipherSpec was sent: switch writes to the pending keys.
    pub fn activate_write(&mut self) -> Result<(), TlsError> {
        self.current_write = Some(self.pending_state(Direction::Write)?);
        self.write_seq = 0;
        Ok(())
    }

    pub fn transition_view(&self) -> TransitionView {
        TransitionView {
            state: self.state,
            last_received: self.last_received,
            last_sent: self.last_sent,
            resumed: self.resumed,
            ccs_received: self.ccs_received,
            cert_requested: self.cert_requested,
            peer_cert_nonempty: !self.peer_certificates.is_empty(),
        }
    }

    /// Whether application data may still be exchanged.
    pub fn is_usable(&self) -> bool {
        self.state == HandshakeState::Finished && !self.sent_connection_end && !self.received_connection_end
    }
}

impl std::fmt::Debug for SecurityContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityContext")
            .field("role", &self.role)
            .field("version", &self.version)
            .field("state", &self.state)
            .field("last_received", &self.last_received)
            .field("last_sent", &self.last_sent)
            .field("read_seq", &self.read_seq)
            .field("write_seq", &self.write_seq)
            .field("resumed", &self.resumed)
            .finish_non_exhaustive()
    }
}
