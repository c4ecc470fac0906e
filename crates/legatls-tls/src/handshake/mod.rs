//! Handshake protocol: message types, codec, legal orderings and the
//! per-role flows.

pub mod client;
pub mod codec;
pub mod messages;
pub mod server;
pub mod transitions;

use crate::crypt::key_schedule::compute_verify_data;
use crate::crypt::keylog::log_master_secret;
use crate::crypt::provider::random_bytes;
use crate::protocol::RecordProtocol;
use crate::session::{now_secs, CachedSession};
use crate::TlsRole;
use legatls_types::TlsError;
use messages::{Finished, HandshakeMessage};
use subtle::ConstantTimeEq;
use tracing::debug;

/// Handshake message types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum HandshakeType {
    HelloRequest = 0,
    ClientHello = 1,
    ServerHello = 2,
    Certificate = 11,
    ServerKeyExchange = 12,
    CertificateRequest = 13,
    ServerHelloDone = 14,
    CertificateVerify = 15,
    ClientKeyExchange = 16,
    Finished = 20,
}

impl HandshakeType {
    pub fn from_u8(v: u8) -> Result<Self, TlsError> {
        match v {
            0 => Ok(HandshakeType::HelloRequest),
            1 => Ok(HandshakeType::ClientHello),
            2 => Ok(HandshakeType::ServerHello),
            11 => Ok(HandshakeType::Certificate),
            12 => Ok(HandshakeType::ServerKeyExchange),
            13 => Ok(HandshakeType::CertificateRequest),
            14 => Ok(HandshakeType::ServerHelloDone),
            15 => Ok(HandshakeType::CertificateVerify),
            16 => Ok(HandshakeType::ClientKeyExchange),
            20 => Ok(HandshakeType::Finished),
            _ => Err(TlsError::UnexpectedMessage(format!(
                "unknown handshake type {v}"
            ))),
        }
    }
}

/// Overall handshake progress of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// No handshake has begun.
    None,
    /// Hellos are being exchanged.
    Started,
    /// Both Finished messages verified; application data may flow.
    Finished,
    /// Aborted; every further operation fails.
    Failed,
}

/// A hello random: `gmt_unix_time(4) || random_bytes(28)`.
pub(crate) fn hello_random() -> Result<[u8; 32], TlsError> {
    let mut random = [0u8; 32];
    random_bytes(&mut random[4..])?;
    random[..4].copy_from_slice(&(now_secs() as u32).to_be_bytes());
    Ok(random)
}

fn master_secret(proto: &RecordProtocol) -> Result<Vec<u8>, TlsError> {
    proto
        .ctx
        .master_secret()
        .map(<[u8]>::to_vec)
        .ok_or_else(|| TlsError::HandshakeFailed("master secret not available".into()))
}

/// Install `master_secret`, expand it into keys and log it.
pub(crate) fn install_master_secret(proto: &mut RecordProtocol, master_secret: Vec<u8>) -> Result<(), TlsError> {
    log_master_secret(proto.config(), &proto.ctx.client_random, &master_secret);
    proto.ctx.set_master_secret(master_secret)?;
    proto.ctx.compute_keys()
}

/// Send our Finished over the transcript so far.
pub(crate) fn send_finished(proto: &mut RecordProtocol) -> Result<(), TlsError> {
    let ms = master_secret(proto)?;
    let verify_data = compute_verify_data(proto.ctx.version, &ms, proto.role(), proto.ctx.transcript.messages())?;
    proto.send_handshake(&HandshakeMessage::Finished(Finished { verify_data }))
}

/// Check the peer's Finished against the transcript before it, then add
/// it to the transcript.
pub(crate) fn verify_peer_finished(proto: &mut RecordProtocol, fin: &Finished, raw: &[u8]) -> Result<(), TlsError> {
    let ms = master_secret(proto)?;
    let expected = compute_verify_data(
        proto.ctx.version,
        &ms,
        proto.role().peer(),
        proto.ctx.transcript.messages(),
    )?;
    if !bool::from(expected.ct_eq(&fin.verify_data)) {
        return Err(TlsError::HandshakeFailed("Finished verify data mismatch".into()));
    }
    proto.ctx.transcript.update(raw);
    Ok(())
}

/// Both Finished messages are verified: the connection is usable, and a
/// fresh session is cached for later resumption.
pub(crate) fn complete(proto: &mut RecordProtocol) -> Result<(), TlsError> {
    proto.ctx.state = HandshakeState::Finished;
    proto.ctx.hs_buf.clear();
    proto.ctx.resume_candidate = None;
    let params = proto
        .ctx
        .params()
        .ok_or_else(|| TlsError::HandshakeFailed("no cipher suite negotiated".into()))?;
    debug!(
        role = ?proto.role(),
        version = %proto.ctx.version,
        suite = params.name,
        resumed = proto.ctx.resumed,
        "handshake complete"
    );
    if proto.ctx.resumed || proto.ctx.session_id.is_empty() {
        return Ok(());
    }
    if let Some(cache) = proto.config().resumption_cache() {
        let server_name = match proto.role() {
            TlsRole::Client => proto.config().server_name.clone(),
            TlsRole::Server => None,
        };
        cache.insert(CachedSession {
            id: proto.ctx.session_id.clone(),
            cipher_suite: params.suite,
            version: proto.ctx.version,
            master_secret: master_secret(proto)?,
            created_at: now_secs(),
            server_name,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handshake_type_codes() {
        for t in [
            HandshakeType::HelloRequest,
            HandshakeType::ClientHello,
            HandshakeType::ServerHello,
            HandshakeType::Certificate,
            HandshakeType::ServerKeyExchange,
            HandshakeType::CertificateRequest,
            HandshakeType::ServerHelloDone,
            HandshakeType::CertificateVerify,
            HandshakeType::ClientKeyExchange,
            HandshakeType::Finished,
        ] {
            assert_eq!(HandshakeType::from_u8(t as u8).unwrap(), t);
        }
        assert!(matches!(
            HandshakeType::from_u8(4),
            Err(TlsError::UnexpectedMessage(_))
        ));
    }
}
