//! Per-record MAC computation.
//!
//! ```text
//! SSL 3.0: hash(MAC_write_secret + pad_2 +
//!               hash(MAC_write_secret + pad_1 + seq_num + type + length + content))
//! TLS 1.0: HMAC_hash(MAC_write_secret, seq_num + type + version + length + content)
//! ```

use super::key_schedule::{ssl3_pad, KeyBlock};
use super::provider::{digest_parts, hmac_hash};
use crate::record::ContentType;
use crate::{Direction, ProtocolVersion, TlsRole};
use legatls_types::{HashAlgId, TlsError};

/// MAC over one record fragment with an explicit key.
pub fn compute_record_mac(
    version: ProtocolVersion,
    alg: HashAlgId,
    mac_key: &[u8],
    seq: u64,
    content_type: ContentType,
    fragment: &[u8],
) -> Result<Vec<u8>, TlsError> {
    let seq_bytes = seq.to_be_bytes();
    let type_byte = [content_type as u8];
    let length = u16::try_from(fragment.len())
        .map_err(|_| TlsError::RecordOverflow)?
        .to_be_bytes();
    match version {
        ProtocolVersion::Ssl30 => {
            let inner = digest_parts(
                alg,
                &[mac_key, &ssl3_pad(alg, 0x36), &seq_bytes, &type_byte, &length, fragment],
            )?;
            digest_parts(alg, &[mac_key, &ssl3_pad(alg, 0x5c), &inner])
        }
        ProtocolVersion::Tls10 => hmac_hash(
            alg,
            mac_key,
            &[&seq_bytes, &type_byte, &version.to_u16().to_be_bytes(), &length, fragment],
        ),
    }
}

/// The endpoint whose write MAC key protects traffic in `direction` for `role`.
///
/// Client write and server read use the client key; server write and client
/// read use the server key.
pub fn mac_writer(role: TlsRole, direction: Direction) -> TlsRole {
    match direction {
        Direction::Write => role,
        Direction::Read => role.peer(),
    }
}

/// MAC of a record written by the client.
pub fn compute_client_record_mac(
    version: ProtocolVersion,
    alg: HashAlgId,
    keys: &KeyBlock,
    seq: u64,
    content_type: ContentType,
    fragment: &[u8],
) -> Result<Vec<u8>, TlsError> {
    compute_record_mac(version, alg, keys.mac_key(TlsRole::Client), seq, content_type, fragment)
}

/// MAC of a record written by the server.
pub fn compute_server_record_mac(
    version: ProtocolVersion,
    alg: HashAlgId,
    keys: &KeyBlock,
    seq: u64,
    content_type: ContentType,
    fragment: &[u8],
) -> Result<Vec<u8>, TlsError> {
    compute_record_mac(version, alg, keys.mac_key(TlsRole::Server), seq, content_type, fragment)
}

/// MAC of a record written by `writer`, as picked by [`mac_writer`].
pub fn compute_writer_record_mac(
    writer: TlsRole,
    version: ProtocolVersion,
    alg: HashAlgId,
    keys: &KeyBlock,
    seq: u64,
    content_type: ContentType,
    fragment: &[u8],
) -> Result<Vec<u8>, TlsError> {
    match writer {
        TlsRole::Client => compute_client_record_mac(version, alg, keys, seq, content_type, fragment),
        TlsRole::Server => compute_server_record_mac(version, alg, keys, seq, content_type, fragment),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypt::key_schedule::compute_key_block;
    use crate::crypt::CipherSuiteParams;
    use crate::CipherSuite;

    fn hex(s: &str) -> Vec<u8> {
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }

    #[test]
    fn test_record_mac_known_answers() {
        let tls = compute_record_mac(
            ProtocolVersion::Tls10,
            HashAlgId::Sha1,
            &[0x0b; 20],
            1,
            ContentType::ApplicationData,
            b"ping",
        )
        .unwrap();
        assert_eq!(tls, hex("faeb63282768153ef0146009e0ae22dbcb3a6360"));

        let ssl3 = compute_record_mac(
            ProtocolVersion::Ssl30,
            HashAlgId::Md5,
            &[0x01; 16],
            0,
            ContentType::Handshake,
            b"x",
        )
        .unwrap();
        assert_eq!(ssl3, hex("7660599ead8eafe05b99fad92853ec3f"));
    }

    #[test]
    fn test_mac_writer_selection() {
        assert_eq!(mac_writer(TlsRole::Client, Direction::Write), TlsRole::Client);
        assert_eq!(mac_writer(TlsRole::Server, Direction::Read), TlsRole::Client);
        assert_eq!(mac_writer(TlsRole::Server, Direction::Write), TlsRole::Server);
        assert_eq!(mac_writer(TlsRole::Client, Direction::Read), TlsRole::Server);
    }

    #[test]
    fn test_tls10_mac_is_hmac_over_header() {
        let key = [0xABu8; 20];
        let mac = compute_record_mac(
            ProtocolVersion::Tls10,
            HashAlgId::Sha1,
            &key,
            3,
            ContentType::ApplicationData,
            b"ping",
        )
        .unwrap();
        let expected = hmac_hash(
            HashAlgId::Sha1,
            &key,
            &[&[0, 0, 0, 0, 0, 0, 0, 3, 23, 3, 1, 0, 4], b"ping"],
        )
        .unwrap();
        assert_eq!(mac, expected);
    }

    #[test]
    fn test_ssl3_mac_construction() {
        let key = [0x01u8; 16];
        let mac = compute_record_mac(
            ProtocolVersion::Ssl30,
            HashAlgId::Md5,
            &key,
            0,
            ContentType::Handshake,
            b"x",
        )
        .unwrap();
        let inner = digest_parts(
            HashAlgId::Md5,
            &[&key, &[0x36; 48], &[0u8; 8], &[22, 0, 1], b"x"],
        )
        .unwrap();
        let expected = digest_parts(HashAlgId::Md5, &[&key, &[0x5c; 48], &inner]).unwrap();
        assert_eq!(mac, expected);
        assert_eq!(mac.len(), 16);
    }

    #[test]
    fn test_mac_depends_on_seq_and_type() {
        let key = [0x33u8; 20];
        let base = compute_record_mac(
            ProtocolVersion::Tls10,
            HashAlgId::Sha1,
            &key,
            0,
            ContentType::ApplicationData,
            b"data",
        )
        .unwrap();
        let next = compute_record_mac(
            ProtocolVersion::Tls10,
            HashAlgId::Sha1,
            &key,
            1,
            ContentType::ApplicationData,
            b"data",
        )
        .unwrap();
        let other_type = compute_record_mac(
            ProtocolVersion::Tls10,
            HashAlgId::Sha1,
            &key,
            0,
            ContentType::Handshake,
            b"data",
        )
        .unwrap();
        assert_ne!(base, next);
        assert_ne!(base, other_type);
    }

    #[test]
    fn test_client_and_server_macs_differ() {
        let params = CipherSuiteParams::from_suite(CipherSuite::TLS_RSA_WITH_NULL_SHA).unwrap();
        let kb = compute_key_block(ProtocolVersion::Tls10, params, &[4u8; 48], &[1; 32], &[2; 32])
            .unwrap();
        let c = compute_client_record_mac(
            ProtocolVersion::Tls10,
            params.mac,
            &kb,
            0,
            ContentType::ApplicationData,
            b"ping",
        )
        .unwrap();
        let s = compute_server_record_mac(
            ProtocolVersion::Tls10,
            params.mac,
            &kb,
            0,
            ContentType::ApplicationData,
            b"ping",
        )
        .unwrap();
        assert_ne!(c, s);

        // A server reading verifies with the client's key.
        let verified = compute_writer_record_mac(
            mac_writer(TlsRole::Server, Direction::Read),
            ProtocolVersion::Tls10,
            params.mac,
            &kb,
            0,
            ContentType::ApplicationData,
            b"ping",
        )
        .unwrap();
        assert_eq!(verified, c);
    }
}
