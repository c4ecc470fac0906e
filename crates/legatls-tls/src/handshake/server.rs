//! Server side of the SSL 3.0 / TLS 1.0 handshake.

use super::messages::{
    CertificateMsg, CertificateRequest, ClientHello, HandshakeMessage, ServerHello, CERT_TYPE_RSA_SIGN,
    COMPRESSION_NULL,
};
use super::{complete, hello_random, install_master_secret, send_finished, verify_peer_finished};
use crate::crypt::key_schedule::{compute_cert_verify_hash, compute_master_secret};
use crate::crypt::pkcs1::{decrypt_pre_master_secret, verify_digest};
use crate::crypt::provider::random_bytes;
use crate::crypt::CipherSuiteParams;
use crate::protocol::RecordProtocol;
use crate::session::CachedSession;
use crate::{CipherSuite, ProtocolVersion};
use legatls_types::TlsError;
use tracing::debug;
use zeroize::Zeroize;

/// Apply one client handshake message (already order-checked).
pub(crate) fn handle(proto: &mut RecordProtocol, msg: HandshakeMessage, raw: &[u8]) -> Result<(), TlsError> {
    match msg {
        HandshakeMessage::ClientHello(ch) => {
            proto.ctx.transcript.update(raw);
            process_client_hello(proto, ch)
        }
        HandshakeMessage::Certificate(cert) => {
            proto.ctx.transcript.update(raw);
            process_client_certificate(proto, cert)
        }
        HandshakeMessage::ClientKeyExchange(cke) => {
            proto.ctx.transcript.update(raw);
            let pre_master_secret = recover_pre_master_secret(proto, &cke.encrypted_pre_master_secret)?;
            let master_secret = compute_master_secret(
                proto.ctx.version,
                &pre_master_secret,
                &proto.ctx.client_random,
                &proto.ctx.server_random,
            );
            let mut pre_master_secret = pre_master_secret;
            pre_master_secret.zeroize();
            install_master_secret(proto, master_secret?)
        }
        HandshakeMessage::CertificateVerify(cv) => {
            let key = proto
                .ctx
                .peer_public_key
                .as_ref()
                .ok_or_else(|| TlsError::HandshakeFailed("CertificateVerify without a certificate".into()))?;
            let ms = proto
                .ctx
                .master_secret()
                .ok_or_else(|| TlsError::HandshakeFailed("master secret not available".into()))?;
            let hash = compute_cert_verify_hash(proto.ctx.version, ms, proto.ctx.transcript.messages())?;
            verify_digest(key, &hash, &cv.signature)
                .map_err(|_| TlsError::CertVerifyFailed("CertificateVerify signature mismatch".into()))?;
            proto.ctx.transcript.update(raw);
            Ok(())
        }
        HandshakeMessage::Finished(fin) => {
            verify_peer_finished(proto, &fin, raw)?;
            if !proto.ctx.resumed {
                proto.send_change_cipher_spec()?;
                send_finished(proto)?;
            }
            complete(proto)
        }
        other => Err(TlsError::UnexpectedMessage(format!(
            "server cannot handle {:?}",
            other.msg_type()
        ))),
    }
}

/// Highest common version, or `UnsupportedVersion`.
fn select_version(proto: &RecordProtocol, client_version: u16) -> Result<ProtocolVersion, TlsError> {
    let config = proto.config();
    let offered = ProtocolVersion::clamp_offer(client_version).ok_or(TlsError::UnsupportedVersion)?;
    let version = offered.min(config.max_version);
    if version < config.min_version {
        return Err(TlsError::UnsupportedVersion);
    }
    Ok(version)
}

/// First suite in server preference order the client also offers.
fn select_suite(proto: &RecordProtocol, offered: &[CipherSuite]) -> Result<CipherSuite, TlsError> {
    proto
        .config()
        .cipher_suites
        .iter()
        .find(|s| offered.contains(s))
        .copied()
        .ok_or(TlsError::NoSharedCipherSuite)
}

fn find_resumable(proto: &RecordProtocol, ch: &ClientHello, version: ProtocolVersion) -> Option<CachedSession> {
    if ch.session_id.is_empty() {
        return None;
    }
    let cache = proto.config().resumption_cache()?;
    cache.get(&ch.session_id).filter(|s| {
        s.version == version
            && ch.cipher_suites.contains(&s.cipher_suite)
            && proto.config().cipher_suites.contains(&s.cipher_suite)
    })
}

fn process_client_hello(proto: &mut RecordProtocol, ch: ClientHello) -> Result<(), TlsError> {
    let version = select_version(proto, ch.client_version)?;
    if !ch.compression_methods.contains(&COMPRESSION_NULL) {
        return Err(TlsError::HandshakeFailed("client does not offer null compression".into()));
    }
    proto.ctx.client_hello_version = ch.client_version;
    proto.ctx.client_random = ch.random;

    let resumed = find_resumable(proto, &ch, version);
    let suite = match &resumed {
        Some(cached) => cached.cipher_suite,
        None => select_suite(proto, &ch.cipher_suites)?,
    };
    let params = CipherSuiteParams::from_suite(suite)?;

    proto.ctx.server_random = hello_random()?;
    proto.ctx.negotiate(params, version);
    proto.ctx.session_id = match &resumed {
        Some(cached) => cached.id.clone(),
        None if proto.config().resumption_cache().is_some() => {
            let mut id = vec![0u8; 32];
            random_bytes(&mut id)?;
            id
        }
        None => Vec::new(),
    };
    debug!(%version, suite = params.name, resumed = resumed.is_some(), "ClientHello accepted");

    let server_hello = HandshakeMessage::ServerHello(ServerHello {
        server_version: version.to_u16(),
        random: proto.ctx.server_random,
        session_id: proto.ctx.session_id.clone(),
        cipher_suite: suite,
        compression_method: COMPRESSION_NULL,
    });
    proto.send_handshake(&server_hello)?;

    if let Some(cached) = resumed {
        proto.ctx.resumed = true;
        install_master_secret(proto, cached.master_secret.clone())?;
        proto.send_change_cipher_spec()?;
        return send_finished(proto);
    }

    let chain = proto.config().certificate_chain.clone();
    proto.send_handshake(&HandshakeMessage::Certificate(CertificateMsg {
        certificate_list: chain,
    }))?;
    if proto.config().verify_client_cert {
        proto.ctx.cert_requested = true;
        proto.send_handshake(&HandshakeMessage::CertificateRequest(CertificateRequest {
            certificate_types: vec![CERT_TYPE_RSA_SIGN],
            certificate_authorities: Vec::new(),
        }))?;
    }
    proto.send_handshake(&HandshakeMessage::ServerHelloDone)
}

fn process_client_certificate(proto: &mut RecordProtocol, cert: CertificateMsg) -> Result<(), TlsError> {
    if cert.certificate_list.is_empty() {
        if proto.config().require_client_cert {
            return Err(TlsError::HandshakeFailed("client certificate required".into()));
        }
        debug!("client sent no certificate");
        return Ok(());
    }
    let key = proto.config().verifier.verify_chain(&cert.certificate_list, None)?;
    proto.ctx.peer_public_key = Some(key);
    proto.ctx.peer_certificates = cert.certificate_list;
    Ok(())
}

/// Decrypt the RSA pre-master secret. Any failure (bad padding, wrong
/// length, version mismatch) yields a random secret instead so the
/// handshake fails at Finished without revealing which check tripped.
fn recover_pre_master_secret(proto: &RecordProtocol, encrypted: &[u8]) -> Result<Vec<u8>, TlsError> {
    let key = proto
        .config()
        .private_key
        .as_ref()
        .ok_or_else(|| TlsError::InvalidConfig("server has no private key".into()))?;
    let expected_version = proto.ctx.client_hello_version.to_be_bytes();
    match decrypt_pre_master_secret(key, encrypted) {
        Ok(pms) if pms.len() == 48 && pms[..2] == expected_version => Ok(pms),
        Ok(mut pms) => {
            pms.zeroize();
            debug!("pre-master secret rejected, substituting random");
            random_pre_master_secret(expected_version)
        }
        Err(_) => {
            debug!("pre-master secret decryption failed, substituting random");
            random_pre_master_secret(expected_version)
        }
    }
}

fn random_pre_master_secret(version: [u8; 2]) -> Result<Vec<u8>, TlsError> {
    let mut pms = vec![0u8; 48];
    pms[..2].copy_from_slice(&version);
    random_bytes(&mut pms[2..])?;
    Ok(pms)
}
