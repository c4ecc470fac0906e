//! Client side of the SSL 3.0 / TLS 1.0 handshake.

use super::messages::{
    CertificateMsg, CertificateVerify, ClientHello, ClientKeyExchange, HandshakeMessage, ServerHello,
    COMPRESSION_NULL,
};
use super::{complete, hello_random, install_master_secret, send_finished, verify_peer_finished};
use crate::crypt::key_schedule::{compute_cert_verify_hash, compute_master_secret};
use crate::crypt::pkcs1::{encrypt_pre_master_secret, sign_digest};
use crate::crypt::provider::random_bytes;
use crate::crypt::CipherSuiteParams;
use crate::protocol::RecordProtocol;
use crate::ProtocolVersion;
use legatls_types::TlsError;
use tracing::debug;
use zeroize::Zeroize;

/// Queue the ClientHello, offering a cached session for the configured
/// server name when one is available.
pub(crate) fn start(proto: &mut RecordProtocol) -> Result<(), TlsError> {
    let config = proto.config();
    let offered = config.max_version;
    let cipher_suites = config.cipher_suites.clone();

    let candidate = match (config.resumption_cache(), config.server_name.as_deref()) {
        (Some(cache), Some(host)) => cache.get_by_host(host).filter(|s| {
            config.supports_version(s.version) && cipher_suites.contains(&s.cipher_suite)
        }),
        _ => None,
    };
    let session_id = candidate.as_ref().map(|s| s.id.clone()).unwrap_or_default();
    if candidate.is_some() {
        debug!(id_len = session_id.len(), "offering cached session");
    }

    let random = hello_random()?;
    proto.ctx.client_random = random;
    proto.ctx.client_hello_version = offered.to_u16();
    proto.ctx.resume_candidate = candidate;

    proto.send_handshake(&HandshakeMessage::ClientHello(ClientHello {
        client_version: offered.to_u16(),
        random,
        session_id,
        cipher_suites,
        compression_methods: vec![COMPRESSION_NULL],
    }))
}

/// Apply one server handshake message (already order-checked).
pub(crate) fn handle(proto: &mut RecordProtocol, msg: HandshakeMessage, raw: &[u8]) -> Result<(), TlsError> {
    match msg {
        HandshakeMessage::ServerHello(sh) => {
            proto.ctx.transcript.update(raw);
            process_server_hello(proto, sh)
        }
        HandshakeMessage::Certificate(cert) => {
            proto.ctx.transcript.update(raw);
            if cert.certificate_list.is_empty() {
                return Err(TlsError::CertVerifyFailed("server sent no certificate".into()));
            }
            let key = proto
                .config()
                .verifier
                .verify_chain(&cert.certificate_list, proto.config().server_name.as_deref())?;
            proto.ctx.peer_public_key = Some(key);
            proto.ctx.peer_certificates = cert.certificate_list;
            Ok(())
        }
        HandshakeMessage::CertificateRequest(_) => {
            proto.ctx.transcript.update(raw);
            proto.ctx.cert_requested = true;
            Ok(())
        }
        HandshakeMessage::ServerHelloDone => {
            proto.ctx.transcript.update(raw);
            send_key_exchange_flight(proto)
        }
        HandshakeMessage::Finished(fin) => {
            verify_peer_finished(proto, &fin, raw)?;
            if proto.ctx.resumed {
                proto.send_change_cipher_spec()?;
                send_finished(proto)?;
            }
            complete(proto)
        }
        other => Err(TlsError::UnexpectedMessage(format!(
            "client cannot handle {:?}",
            other.msg_type()
        ))),
    }
}

fn process_server_hello(proto: &mut RecordProtocol, sh: ServerHello) -> Result<(), TlsError> {
    let config = proto.config();
    let version = ProtocolVersion::from_u16(sh.server_version)
        .filter(|v| config.supports_version(*v))
        .ok_or(TlsError::UnsupportedVersion)?;
    if !config.cipher_suites.contains(&sh.cipher_suite) {
        return Err(TlsError::HandshakeFailed(format!(
            "server selected unoffered cipher suite {}",
            sh.cipher_suite
        )));
    }
    if sh.compression_method != COMPRESSION_NULL {
        return Err(TlsError::HandshakeFailed(format!(
            "server selected compression method {}",
            sh.compression_method
        )));
    }
    let params = CipherSuiteParams::from_suite(sh.cipher_suite)?;

    proto.ctx.server_random = sh.random;
    proto.ctx.negotiate(params, version);
    proto.ctx.session_id = sh.session_id;
    debug!(%version, suite = params.name, "ServerHello accepted");

    let candidate = proto.ctx.resume_candidate.take();
    if let Some(cached) = candidate.filter(|c| !c.id.is_empty() && c.id == proto.ctx.session_id) {
        if cached.version != version || cached.cipher_suite != sh.cipher_suite {
            return Err(TlsError::HandshakeFailed(
                "resumed session parameters do not match the cache".into(),
            ));
        }
        proto.ctx.resumed = true;
        debug!("server resumed cached session");
        install_master_secret(proto, cached.master_secret.clone())?;
    }
    Ok(())
}

/// After ServerHelloDone: [Certificate], ClientKeyExchange,
/// [CertificateVerify], ChangeCipherSpec, Finished.
fn send_key_exchange_flight(proto: &mut RecordProtocol) -> Result<(), TlsError> {
    let version = proto.ctx.version;

    if proto.ctx.cert_requested {
        let chain = proto.config().client_certificate_chain.clone();
        proto.send_handshake(&HandshakeMessage::Certificate(CertificateMsg {
            certificate_list: chain,
        }))?;
    }

    let server_key = proto
        .ctx
        .peer_public_key
        .clone()
        .ok_or_else(|| TlsError::HandshakeFailed("no server public key".into()))?;
    let mut pre_master_secret = vec![0u8; 48];
    pre_master_secret[..2].copy_from_slice(&proto.ctx.client_hello_version.to_be_bytes());
    random_bytes(&mut pre_master_secret[2..])?;
    let encrypted = encrypt_pre_master_secret(&server_key, &pre_master_secret);
    let master_secret = compute_master_secret(
        version,
        &pre_master_secret,
        &proto.ctx.client_random,
        &proto.ctx.server_random,
    );
    pre_master_secret.zeroize();
    let (encrypted, master_secret) = (encrypted?, master_secret?);

    proto.send_handshake(&HandshakeMessage::ClientKeyExchange(ClientKeyExchange {
        encrypted_pre_master_secret: encrypted,
    }))?;
    install_master_secret(proto, master_secret)?;

    let signing_key = proto.config().client_private_key.clone();
    if proto.ctx.cert_requested && !proto.config().client_certificate_chain.is_empty() {
        let key = signing_key
            .ok_or_else(|| TlsError::InvalidConfig("client certificate without a private key".into()))?;
        let ms = proto
            .ctx
            .master_secret()
            .ok_or_else(|| TlsError::HandshakeFailed("master secret not available".into()))?;
        let hash = compute_cert_verify_hash(version, ms, proto.ctx.transcript.messages())?;
        let signature = sign_digest(&key, &hash)?;
        proto.send_handshake(&HandshakeMessage::CertificateVerify(CertificateVerify { signature }))?;
    }

    proto.send_change_cipher_spec()?;
    send_finished(proto)
}
