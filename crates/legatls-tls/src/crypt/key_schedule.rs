//! Master secret, key block, Finished and CertificateVerify derivations
//! for SSL 3.0 and TLS 1.0.

use super::prf::{ssl3_prf, tls10_prf};
use super::provider::digest_parts;
use super::CipherSuiteParams;
use crate::{ProtocolVersion, TlsRole};
use legatls_types::{HashAlgId, TlsError};
use zeroize::Zeroize;

pub const MASTER_SECRET_LEN: usize = 48;
pub const TLS10_VERIFY_DATA_LEN: usize = 12;
pub const SSL3_VERIFY_DATA_LEN: usize = 36;

const SSL3_PAD1: u8 = 0x36;
const SSL3_PAD2: u8 = 0x5c;
const SSL3_SENDER_CLIENT: &[u8; 4] = b"CLNT";
const SSL3_SENDER_SERVER: &[u8; 4] = b"SRVR";

pub(crate) fn ssl3_pad(alg: HashAlgId, byte: u8) -> Vec<u8> {
    vec![byte; alg.ssl3_pad_len()]
}

/// Key material sliced out of the key block.
///
/// For null-cipher suites the write keys and IVs are empty.
#[derive(Clone)]
pub struct KeyBlock {
    pub client_write_mac_key: Vec<u8>,
    pub server_write_mac_key: Vec<u8>,
    pub client_write_key: Vec<u8>,
    pub server_write_key: Vec<u8>,
    pub client_write_iv: Vec<u8>,
    pub server_write_iv: Vec<u8>,
}

impl Drop for KeyBlock {
    fn drop(&mut self) {
        self.client_write_mac_key.zeroize();
        self.server_write_mac_key.zeroize();
        self.client_write_key.zeroize();
        self.server_write_key.zeroize();
        self.client_write_iv.zeroize();
        self.server_write_iv.zeroize();
    }
}

impl KeyBlock {
    /// MAC key used on records written by `writer`.
    pub fn mac_key(&self, writer: TlsRole) -> &[u8] {
        match writer {
            TlsRole::Client => &self.client_write_mac_key,
            TlsRole::Server => &self.server_write_mac_key,
        }
    }

    pub fn write_key(&self, writer: TlsRole) -> &[u8] {
        match writer {
            TlsRole::Client => &self.client_write_key,
            TlsRole::Server => &self.server_write_key,
        }
    }

    pub fn write_iv(&self, writer: TlsRole) -> &[u8] {
        match writer {
            TlsRole::Client => &self.client_write_iv,
            TlsRole::Server => &self.server_write_iv,
        }
    }
}

/// Derive the 48-byte master secret.
///
/// ```text
/// TLS 1.0: PRF(pre_master_secret, "master secret", client_random + server_random)[0..47]
/// SSL 3.0: ssl3_prf(pre_master_secret, client_random + server_random)[0..47]
/// ```
pub fn compute_master_secret(
    version: ProtocolVersion,
    pre_master_secret: &[u8],
    client_random: &[u8; 32],
    server_random: &[u8; 32],
) -> Result<Vec<u8>, TlsError> {
    let mut seed = Vec::with_capacity(64);
    seed.extend_from_slice(client_random);
    seed.extend_from_slice(server_random);
    match version {
        ProtocolVersion::Tls10 => tls10_prf(pre_master_secret, "master secret", &seed, MASTER_SECRET_LEN),
        ProtocolVersion::Ssl30 => ssl3_prf(pre_master_secret, &seed, MASTER_SECRET_LEN),
    }
}

/// Expand the master secret into the key block and slice it.
///
/// The expansion seed is `server_random + client_random`, reversed from the
/// master secret derivation. Slices are taken in order: client MAC key,
/// server MAC key, client key, server key, client IV, server IV.
pub fn compute_key_block(
    version: ProtocolVersion,
    params: &CipherSuiteParams,
    master_secret: &[u8],
    client_random: &[u8; 32],
    server_random: &[u8; 32],
) -> Result<KeyBlock, TlsError> {
    let mut seed = Vec::with_capacity(64);
    seed.extend_from_slice(server_random);
    seed.extend_from_slice(client_random);

    let total_len = params.key_block_len();
    let mut key_block = match version {
        ProtocolVersion::Tls10 => tls10_prf(master_secret, "key expansion", &seed, total_len)?,
        ProtocolVersion::Ssl30 => ssl3_prf(master_secret, &seed, total_len)?,
    };

    let mut offset = 0;
    let mut take = |len: usize| {
        let out = key_block[offset..offset + len].to_vec();
        offset += len;
        out
    };
    let block = KeyBlock {
        client_write_mac_key: take(params.mac_len),
        server_write_mac_key: take(params.mac_len),
        client_write_key: take(params.key_len),
        server_write_key: take(params.key_len),
        client_write_iv: take(params.iv_len),
        server_write_iv: take(params.iv_len),
    };
    key_block.zeroize();
    Ok(block)
}

fn ssl3_nested_hash(
    alg: HashAlgId,
    master_secret: &[u8],
    handshake_messages: &[u8],
    sender: &[u8],
) -> Result<Vec<u8>, TlsError> {
    let inner = digest_parts(
        alg,
        &[handshake_messages, sender, master_secret, &ssl3_pad(alg, SSL3_PAD1)],
    )?;
    digest_parts(alg, &[master_secret, &ssl3_pad(alg, SSL3_PAD2), &inner])
}

fn md5_sha1(handshake_messages: &[u8]) -> Result<Vec<u8>, TlsError> {
    let mut out = digest_parts(HashAlgId::Md5, &[handshake_messages])?;
    out.extend_from_slice(&digest_parts(HashAlgId::Sha1, &[handshake_messages])?);
    Ok(out)
}

/// Compute the Finished verify data sent by `sender`.
///
/// `handshake_messages` is every handshake message exchanged before this
/// Finished. TLS 1.0 yields 12 bytes, SSL 3.0 yields 36.
pub fn compute_verify_data(
    version: ProtocolVersion,
    master_secret: &[u8],
    sender: TlsRole,
    handshake_messages: &[u8],
) -> Result<Vec<u8>, TlsError> {
    match version {
        ProtocolVersion::Tls10 => {
            let label = match sender {
                TlsRole::Client => "client finished",
                TlsRole::Server => "server finished",
            };
            let hash = md5_sha1(handshake_messages)?;
            tls10_prf(master_secret, label, &hash, TLS10_VERIFY_DATA_LEN)
        }
        ProtocolVersion::Ssl30 => {
            let sender: &[u8] = match sender {
                TlsRole::Client => SSL3_SENDER_CLIENT,
                TlsRole::Server => SSL3_SENDER_SERVER,
            };
            let mut out = ssl3_nested_hash(HashAlgId::Md5, master_secret, handshake_messages, sender)?;
            out.extend_from_slice(&ssl3_nested_hash(
                HashAlgId::Sha1,
                master_secret,
                handshake_messages,
                sender,
            )?);
            Ok(out)
        }
    }
}

/// The 36-byte MD5 + SHA-1 digest signed in a CertificateVerify.
pub fn compute_cert_verify_hash(
    version: ProtocolVersion,
    master_secret: &[u8],
    handshake_messages: &[u8],
) -> Result<Vec<u8>, TlsError> {
    match version {
        ProtocolVersion::Tls10 => md5_sha1(handshake_messages),
        ProtocolVersion::Ssl30 => {
            let mut out = ssl3_nested_hash(HashAlgId::Md5, master_secret, handshake_messages, &[])?;
            out.extend_from_slice(&ssl3_nested_hash(
                HashAlgId::Sha1,
                master_secret,
                handshake_messages,
                &[],
            )?);
            Ok(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CipherSuite;

    const CR: [u8; 32] = [0x11; 32];
    const SR: [u8; 32] = [0x22; 32];

    fn hex(s: &str) -> Vec<u8> {
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }

    #[test]
    fn test_master_secret_known_answers() {
        let pms = [0x03u8; 48];
        let tls = compute_master_secret(ProtocolVersion::Tls10, &pms, &CR, &SR).unwrap();
        assert_eq!(
            tls,
            hex(concat!(
                "ffb77675db7aa5e645e5de96b26bc47127b3986d3b0d93831b190d4efec383c6",
                "43c795445e09068ffe2158baca9239d5",
            ))
        );
        let ssl = compute_master_secret(ProtocolVersion::Ssl30, &pms, &CR, &SR).unwrap();
        assert_eq!(
            ssl,
            hex(concat!(
                "d0c042500ba62d668320fde7f1f4bfd6498c70e2c6daaeee122a2073ce7a7568",
                "46601f762a84b096865ebf120951809b",
            ))
        );
    }

    #[test]
    fn test_verify_data_known_answers() {
        let ms = [7u8; 48];
        let hs = b"handshake transcript";
        let tls_client = compute_verify_data(ProtocolVersion::Tls10, &ms, TlsRole::Client, hs).unwrap();
        assert_eq!(tls_client, hex("2e93c87682bb0eff617debb1"));
        let tls_server = compute_verify_data(ProtocolVersion::Tls10, &ms, TlsRole::Server, hs).unwrap();
        assert_eq!(tls_server, hex("d091903cad6730a00695e1b5"));
        let ssl_client = compute_verify_data(ProtocolVersion::Ssl30, &ms, TlsRole::Client, hs).unwrap();
        assert_eq!(
            ssl_client,
            hex(concat!(
                "6ffee40d6058a6b219fd945b21b36bac",
                "c078ed84cb3bddf904f6a7476d9dd988577d1560",
            ))
        );
    }

    #[test]
    fn test_master_secret_length_and_determinism() {
        for version in [ProtocolVersion::Tls10, ProtocolVersion::Ssl30] {
            let pms = [0x03u8; 48];
            let ms1 = compute_master_secret(version, &pms, &CR, &SR).unwrap();
            let ms2 = compute_master_secret(version, &pms, &CR, &SR).unwrap();
            assert_eq!(ms1.len(), MASTER_SECRET_LEN);
            assert_eq!(ms1, ms2);
            // Randoms are not interchangeable
            let swapped = compute_master_secret(version, &pms, &SR, &CR).unwrap();
            assert_ne!(ms1, swapped);
        }
    }

    #[test]
    fn test_versions_derive_differently() {
        let pms = [0x03u8; 48];
        let tls = compute_master_secret(ProtocolVersion::Tls10, &pms, &CR, &SR).unwrap();
        let ssl = compute_master_secret(ProtocolVersion::Ssl30, &pms, &CR, &SR).unwrap();
        assert_ne!(tls, ssl);
    }

    #[test]
    fn test_key_block_slicing_tls10() {
        let params = CipherSuiteParams::from_suite(CipherSuite::TLS_RSA_WITH_AES_128_CBC_SHA).unwrap();
        let ms = [0x5au8; 48];
        let kb = compute_key_block(ProtocolVersion::Tls10, params, &ms, &CR, &SR).unwrap();

        let mut seed = SR.to_vec();
        seed.extend_from_slice(&CR);
        let raw = tls10_prf(&ms, "key expansion", &seed, params.key_block_len()).unwrap();

        let mut joined = Vec::new();
        for part in [
            &kb.client_write_mac_key,
            &kb.server_write_mac_key,
            &kb.client_write_key,
            &kb.server_write_key,
            &kb.client_write_iv,
            &kb.server_write_iv,
        ] {
            joined.extend_from_slice(part);
        }
        assert_eq!(joined, raw);
        assert_eq!(kb.client_write_mac_key.len(), 20);
        assert_eq!(kb.server_write_key.len(), 16);
        assert_eq!(kb.server_write_iv.len(), 16);
        assert_eq!(kb.mac_key(TlsRole::Server), &raw[20..40]);
    }

    #[test]
    fn test_key_block_null_suite_ssl3() {
        let params = CipherSuiteParams::from_suite(CipherSuite::TLS_RSA_WITH_NULL_MD5).unwrap();
        let kb = compute_key_block(ProtocolVersion::Ssl30, params, &[1u8; 48], &CR, &SR).unwrap();
        assert_eq!(kb.client_write_mac_key.len(), 16);
        assert_eq!(kb.server_write_mac_key.len(), 16);
        assert!(kb.client_write_key.is_empty());
        assert!(kb.server_write_iv.is_empty());
        assert_ne!(kb.client_write_mac_key, kb.server_write_mac_key);
    }

    #[test]
    fn test_verify_data_lengths() {
        let ms = [7u8; 48];
        let hs = b"handshake transcript";
        let c = compute_verify_data(ProtocolVersion::Tls10, &ms, TlsRole::Client, hs).unwrap();
        let s = compute_verify_data(ProtocolVersion::Tls10, &ms, TlsRole::Server, hs).unwrap();
        assert_eq!(c.len(), TLS10_VERIFY_DATA_LEN);
        assert_ne!(c, s);

        let c = compute_verify_data(ProtocolVersion::Ssl30, &ms, TlsRole::Client, hs).unwrap();
        let s = compute_verify_data(ProtocolVersion::Ssl30, &ms, TlsRole::Server, hs).unwrap();
        assert_eq!(c.len(), SSL3_VERIFY_DATA_LEN);
        assert_ne!(c, s);
    }

    #[test]
    fn test_ssl3_finished_construction() {
        let ms = [9u8; 48];
        let hs = b"msgs";
        let inner = digest_parts(HashAlgId::Md5, &[hs, b"CLNT", &ms, &[0x36; 48]]).unwrap();
        let md5 = digest_parts(HashAlgId::Md5, &[&ms, &[0x5c; 48], &inner]).unwrap();
        let out = compute_verify_data(ProtocolVersion::Ssl30, &ms, TlsRole::Client, hs).unwrap();
        assert_eq!(&out[..16], &md5[..]);
    }

    #[test]
    fn test_cert_verify_hash() {
        let hs = b"messages so far";
        let tls = compute_cert_verify_hash(ProtocolVersion::Tls10, &[0u8; 48], hs).unwrap();
        assert_eq!(tls.len(), 36);
        assert_eq!(&tls[..16], &digest_parts(HashAlgId::Md5, &[hs]).unwrap()[..]);
        let ssl = compute_cert_verify_hash(ProtocolVersion::Ssl30, &[0u8; 48], hs).unwrap();
        assert_eq!(ssl.len(), 36);
        assert_ne!(tls, ssl);
    }
}
