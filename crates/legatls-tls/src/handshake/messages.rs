//! SSL 3.0 / TLS 1.0 handshake messages (RFC 2246 §7.4).

use super::codec::{put_vec16, put_vec24, put_vec8, wrap_handshake, Reader};
use super::HandshakeType;
use crate::{CipherSuite, ProtocolVersion};
use legatls_types::TlsError;

/// Only the null compression method is supported.
pub const COMPRESSION_NULL: u8 = 0;

/// CertificateRequest certificate type `rsa_sign`.
pub const CERT_TYPE_RSA_SIGN: u8 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientHello {
    pub client_version: u16,
    pub random: [u8; 32],
    pub session_id: Vec<u8>,
    pub cipher_suites: Vec<CipherSuite>,
    pub compression_methods: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerHello {
    pub server_version: u16,
    pub random: [u8; 32],
    pub session_id: Vec<u8>,
    pub cipher_suite: CipherSuite,
    pub compression_method: u8,
}

/// Certificate chain, DER-encoded, leaf first. May be empty (client).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateMsg {
    pub certificate_list: Vec<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateRequest {
    pub certificate_types: Vec<u8>,
    pub certificate_authorities: Vec<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateVerify {
    pub signature: Vec<u8>,
}

/// RSA-encrypted pre-master secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientKeyExchange {
    pub encrypted_pre_master_secret: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finished {
    pub verify_data: Vec<u8>,
}

/// A decoded handshake message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeMessage {
    HelloRequest,
    ClientHello(ClientHello),
    ServerHello(ServerHello),
    Certificate(CertificateMsg),
    CertificateRequest(CertificateRequest),
    ServerHelloDone,
    CertificateVerify(CertificateVerify),
    ClientKeyExchange(ClientKeyExchange),
    Finished(Finished),
}

impl HandshakeMessage {
    pub fn msg_type(&self) -> HandshakeType {
        match self {
            HandshakeMessage::HelloRequest => HandshakeType::HelloRequest,
            HandshakeMessage::ClientHello(_) => HandshakeType::ClientHello,
            HandshakeMessage::ServerHello(_) => HandshakeType::ServerHello,
            HandshakeMessage::Certificate(_) => HandshakeType::Certificate,
            HandshakeMessage::CertificateRequest(_) => HandshakeType::CertificateRequest,
            HandshakeMessage::ServerHelloDone => HandshakeType::ServerHelloDone,
            HandshakeMessage::CertificateVerify(_) => HandshakeType::CertificateVerify,
            HandshakeMessage::ClientKeyExchange(_) => HandshakeType::ClientKeyExchange,
            HandshakeMessage::Finished(_) => HandshakeType::Finished,
        }
    }

    /// Encode the message, header included.
    ///
    /// `version` only matters for ClientKeyExchange, whose encrypted secret
    /// carries a length prefix in TLS 1.0 but not in SSL 3.0.
    pub fn encode(&self, version: ProtocolVersion) -> Vec<u8> {
        let mut body = Vec::new();
        match self {
            HandshakeMessage::HelloRequest | HandshakeMessage::ServerHelloDone => {}
            HandshakeMessage::ClientHello(ch) => {
                body.extend_from_slice(&ch.client_version.to_be_bytes());
                body.extend_from_slice(&ch.random);
                put_vec8(&mut body, &ch.session_id);
                let suites: Vec<u8> = ch.cipher_suites.iter().flat_map(|s| s.0.to_be_bytes()).collect();
                put_vec16(&mut body, &suites);
                put_vec8(&mut body, &ch.compression_methods);
            }
            HandshakeMessage::ServerHello(sh) => {
                body.extend_from_slice(&sh.server_version.to_be_bytes());
                body.extend_from_slice(&sh.random);
                put_vec8(&mut body, &sh.session_id);
                body.extend_from_slice(&sh.cipher_suite.0.to_be_bytes());
                body.push(sh.compression_method);
            }
            HandshakeMessage::Certificate(cert) => {
                let mut list = Vec::new();
                for c in &cert.certificate_list {
                    put_vec24(&mut list, c);
                }
                put_vec24(&mut body, &list);
            }
            HandshakeMessage::CertificateRequest(req) => {
                put_vec8(&mut body, &req.certificate_types);
                let mut cas = Vec::new();
                for dn in &req.certificate_authorities {
                    put_vec16(&mut cas, dn);
                }
                put_vec16(&mut body, &cas);
            }
            HandshakeMessage::CertificateVerify(cv) => put_vec16(&mut body, &cv.signature),
            HandshakeMessage::ClientKeyExchange(cke) => match version {
                ProtocolVersion::Tls10 => put_vec16(&mut body, &cke.encrypted_pre_master_secret),
                ProtocolVersion::Ssl30 => body.extend_from_slice(&cke.encrypted_pre_master_secret),
            },
            HandshakeMessage::Finished(fin) => body.extend_from_slice(&fin.verify_data),
        }
        wrap_handshake(self.msg_type(), &body)
    }

    /// Decode a body of the given type.
    pub fn parse(msg_type: HandshakeType, body: &[u8], version: ProtocolVersion) -> Result<Self, TlsError> {
        match msg_type {
            HandshakeType::HelloRequest => {
                Reader::new(body, "HelloRequest").finish()?;
                Ok(HandshakeMessage::HelloRequest)
            }
            HandshakeType::ClientHello => parse_client_hello(body).map(HandshakeMessage::ClientHello),
            HandshakeType::ServerHello => parse_server_hello(body).map(HandshakeMessage::ServerHello),
            HandshakeType::Certificate => parse_certificate(body).map(HandshakeMessage::Certificate),
            HandshakeType::CertificateRequest => {
                parse_certificate_request(body).map(HandshakeMessage::CertificateRequest)
            }
            HandshakeType::ServerHelloDone => {
                Reader::new(body, "ServerHelloDone").finish()?;
                Ok(HandshakeMessage::ServerHelloDone)
            }
            HandshakeType::CertificateVerify => {
                let mut r = Reader::new(body, "CertificateVerify");
                let signature = r.vec16()?.to_vec();
                r.finish()?;
                Ok(HandshakeMessage::CertificateVerify(CertificateVerify { signature }))
            }
            HandshakeType::ClientKeyExchange => {
                let mut r = Reader::new(body, "ClientKeyExchange");
                let encrypted_pre_master_secret = match version {
                    ProtocolVersion::Tls10 => r.vec16()?.to_vec(),
                    ProtocolVersion::Ssl30 => r.rest().to_vec(),
                };
                r.finish()?;
                Ok(HandshakeMessage::ClientKeyExchange(ClientKeyExchange {
                    encrypted_pre_master_secret,
                }))
            }
            HandshakeType::Finished => Ok(HandshakeMessage::Finished(Finished {
                verify_data: body.to_vec(),
            })),
            HandshakeType::ServerKeyExchange => Err(TlsError::UnexpectedMessage(
                "ServerKeyExchange is not used by RSA key exchange".into(),
            )),
        }
    }
}

fn parse_client_hello(body: &[u8]) -> Result<ClientHello, TlsError> {
    let mut r = Reader::new(body, "ClientHello");
    let client_version = r.u16()?;
    let random = r.array::<32>()?;
    let session_id = r.vec8()?;
    if session_id.len() > 32 {
        return Err(TlsError::DecodeError("session id longer than 32 bytes".into()));
    }
    let suites = r.vec16()?;
    if suites.is_empty() || suites.len() % 2 != 0 {
        return Err(TlsError::DecodeError("malformed cipher suite list".into()));
    }
    let compression_methods = r.vec8()?;
    if compression_methods.is_empty() {
        return Err(TlsError::DecodeError("empty compression method list".into()));
    }
    // Hello extensions (if any) are ignored.
    r.rest();
    Ok(ClientHello {
        client_version,
        random,
        session_id: session_id.to_vec(),
        cipher_suites: suites
            .chunks_exact(2)
            .map(|c| CipherSuite(u16::from_be_bytes([c[0], c[1]])))
            .collect(),
        compression_methods: compression_methods.to_vec(),
    })
}

fn parse_server_hello(body: &[u8]) -> Result<ServerHello, TlsError> {
    let mut r = Reader::new(body, "ServerHello");
    let server_version = r.u16()?;
    let random = r.array::<32>()?;
    let session_id = r.vec8()?;
    if session_id.len() > 32 {
        return Err(TlsError::DecodeError("session id longer than 32 bytes".into()));
    }
    let cipher_suite = CipherSuite(r.u16()?);
    let compression_method = r.u8()?;
    r.rest();
    Ok(ServerHello {
        server_version,
        random,
        session_id: session_id.to_vec(),
        cipher_suite,
        compression_method,
    })
}

fn parse_certificate(body: &[u8]) -> Result<CertificateMsg, TlsError> {
    let mut r = Reader::new(body, "Certificate");
    let mut list = Reader::new(r.vec24()?, "certificate list");
    r.finish()?;
    let mut certificate_list = Vec::new();
    while !list.is_empty() {
        let cert = list.vec24()?;
        if cert.is_empty() {
            return Err(TlsError::DecodeError("empty certificate entry".into()));
        }
        certificate_list.push(cert.to_vec());
    }
    Ok(CertificateMsg { certificate_list })
}

fn parse_certificate_request(body: &[u8]) -> Result<CertificateRequest, TlsError> {
    let mut r = Reader::new(body, "CertificateRequest");
    let certificate_types = r.vec8()?.to_vec();
    if certificate_types.is_empty() {
        return Err(TlsError::DecodeError("no certificate types requested".into()));
    }
    let mut cas = Reader::new(r.vec16()?, "certificate authorities");
    r.finish()?;
    let mut certificate_authorities = Vec::new();
    while !cas.is_empty() {
        certificate_authorities.push(cas.vec16()?.to_vec());
    }
    Ok(CertificateRequest {
        certificate_types,
        certificate_authorities,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handshake::codec::parse_handshake_header;

    fn reparse(msg: &HandshakeMessage, version: ProtocolVersion) -> HandshakeMessage {
        let wire = msg.encode(version);
        let (t, body, total) = parse_handshake_header(&wire).unwrap().unwrap();
        assert_eq!(total, wire.len());
        HandshakeMessage::parse(HandshakeType::from_u8(t).unwrap(), body, version).unwrap()
    }

    #[test]
    fn test_client_hello_wire_layout() {
        let ch = HandshakeMessage::ClientHello(ClientHello {
            client_version: 0x0301,
            random: [0xAA; 32],
            session_id: vec![],
            cipher_suites: vec![CipherSuite::TLS_RSA_WITH_AES_128_CBC_SHA],
            compression_methods: vec![COMPRESSION_NULL],
        });
        let wire = ch.encode(ProtocolVersion::Tls10);
        // type, len(3), version(2), random(32), sid_len, suites_len(2), suite, comp_len, comp
        assert_eq!(wire.len(), 4 + 2 + 32 + 1 + 2 + 2 + 1 + 1);
        assert_eq!(&wire[..6], &[1, 0, 0, 41, 3, 1]);
        assert_eq!(&wire[38..], &[0, 0, 2, 0x00, 0x2F, 1, 0]);
        assert_eq!(reparse(&ch, ProtocolVersion::Tls10), ch);
    }

    #[test]
    fn test_client_hello_ignores_extensions() {
        let ch = ClientHello {
            client_version: 0x0303,
            random: [1; 32],
            session_id: vec![7; 32],
            cipher_suites: vec![CipherSuite(0xC02F), CipherSuite::TLS_RSA_WITH_NULL_MD5],
            compression_methods: vec![1, 0],
        };
        let mut wire = HandshakeMessage::ClientHello(ch.clone()).encode(ProtocolVersion::Tls10);
        let body_len = wire.len() - 4 + 6;
        wire.extend_from_slice(&[0, 4, 0xff, 0x01, 0, 0]);
        wire[1..4].copy_from_slice(&(body_len as u32).to_be_bytes()[1..]);
        let (_, body, _) = parse_handshake_header(&wire).unwrap().unwrap();
        let parsed = HandshakeMessage::parse(HandshakeType::ClientHello, body, ProtocolVersion::Tls10).unwrap();
        assert_eq!(parsed, HandshakeMessage::ClientHello(ch));
    }

    #[test]
    fn test_client_hello_rejects_malformed() {
        let mut body = vec![3, 1];
        body.extend_from_slice(&[0; 32]);
        body.push(0); // no session id
        body.extend_from_slice(&[0, 3, 0, 0x2F, 0]); // odd suite list
        body.extend_from_slice(&[1, 0]);
        assert!(matches!(
            HandshakeMessage::parse(HandshakeType::ClientHello, &body, ProtocolVersion::Tls10),
            Err(TlsError::DecodeError(_))
        ));
        assert!(HandshakeMessage::parse(HandshakeType::ClientHello, &[3, 1, 0], ProtocolVersion::Tls10).is_err());
    }

    #[test]
    fn test_server_messages() {
        let sh = HandshakeMessage::ServerHello(ServerHello {
            server_version: 0x0300,
            random: [3; 32],
            session_id: vec![9; 32],
            cipher_suite: CipherSuite::TLS_RSA_WITH_3DES_EDE_CBC_SHA,
            compression_method: 0,
        });
        assert_eq!(reparse(&sh, ProtocolVersion::Ssl30), sh);

        let cert = HandshakeMessage::Certificate(CertificateMsg {
            certificate_list: vec![vec![0x30, 1, 2], vec![0x30, 3]],
        });
        let wire = cert.encode(ProtocolVersion::Tls10);
        assert_eq!(&wire[4..7], &[0, 0, 11]);
        assert_eq!(reparse(&cert, ProtocolVersion::Tls10), cert);

        let empty = HandshakeMessage::Certificate(CertificateMsg {
            certificate_list: vec![],
        });
        assert_eq!(empty.encode(ProtocolVersion::Tls10), vec![11, 0, 0, 3, 0, 0, 0]);
        assert_eq!(reparse(&empty, ProtocolVersion::Tls10), empty);

        let req = HandshakeMessage::CertificateRequest(CertificateRequest {
            certificate_types: vec![CERT_TYPE_RSA_SIGN],
            certificate_authorities: vec![b"CN=test".to_vec()],
        });
        assert_eq!(reparse(&req, ProtocolVersion::Tls10), req);

        assert_eq!(
            HandshakeMessage::ServerHelloDone.encode(ProtocolVersion::Tls10),
            vec![14, 0, 0, 0]
        );
        assert_eq!(
            HandshakeMessage::HelloRequest.encode(ProtocolVersion::Tls10),
            vec![0, 0, 0, 0]
        );
    }

    #[test]
    fn test_client_key_exchange_version_framing() {
        let cke = HandshakeMessage::ClientKeyExchange(ClientKeyExchange {
            encrypted_pre_master_secret: vec![0x42; 128],
        });
        let tls = cke.encode(ProtocolVersion::Tls10);
        let ssl = cke.encode(ProtocolVersion::Ssl30);
        assert_eq!(tls.len(), 4 + 2 + 128);
        assert_eq!(&tls[4..6], &[0, 128]);
        assert_eq!(ssl.len(), 4 + 128);
        assert_eq!(reparse(&cke, ProtocolVersion::Tls10), cke);
        assert_eq!(reparse(&cke, ProtocolVersion::Ssl30), cke);
    }

    #[test]
    fn test_certificate_verify_and_finished() {
        let cv = HandshakeMessage::CertificateVerify(CertificateVerify {
            signature: vec![5; 128],
        });
        assert_eq!(reparse(&cv, ProtocolVersion::Ssl30), cv);
        let fin = HandshakeMessage::Finished(Finished {
            verify_data: vec![1; 12],
        });
        assert_eq!(fin.encode(ProtocolVersion::Tls10).len(), 16);
        assert_eq!(reparse(&fin, ProtocolVersion::Tls10), fin);
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        assert!(HandshakeMessage::parse(HandshakeType::ServerHelloDone, &[0], ProtocolVersion::Tls10).is_err());
        assert!(HandshakeMessage::parse(HandshakeType::CertificateVerify, &[0, 1, 9, 9], ProtocolVersion::Tls10).is_err());
        assert!(matches!(
            HandshakeMessage::parse(HandshakeType::ServerKeyExchange, &[], ProtocolVersion::Tls10),
            Err(TlsError::UnexpectedMessage(_))
        ));
    }
}
