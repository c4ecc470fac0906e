//! Cipher suite descriptors and the SSL 3.0 / TLS 1.0 key schedule.
//!
//! Bridges the protocol code with the primitives in [`provider`].

pub mod keylog;
pub mod key_schedule;
pub mod mac;
pub mod pkcs1;
pub mod prf;
pub mod provider;
pub mod transcript;

use crate::CipherSuite;
use legatls_types::{BulkCipherAlgId, HashAlgId, TlsError};

/// Key exchange algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyExchangeAlg {
    /// RSA-encrypted pre-master secret.
    Rsa,
}

/// Immutable description of a cipher suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CipherSuiteParams {
    pub suite: CipherSuite,
    pub name: &'static str,
    pub kx_alg: KeyExchangeAlg,
    pub cipher: BulkCipherAlgId,
    pub mac: HashAlgId,
    /// Bulk encryption key length (0 for null).
    pub key_len: usize,
    /// CBC IV length, equal to the block size (0 for null).
    pub iv_len: usize,
    /// MAC key length and MAC output length.
    pub mac_len: usize,
    pub exportable: bool,
}

const fn suite(
    suite: CipherSuite,
    name: &'static str,
    cipher: BulkCipherAlgId,
    mac: HashAlgId,
) -> CipherSuiteParams {
    CipherSuiteParams {
        suite,
        name,
        kx_alg: KeyExchangeAlg::Rsa,
        cipher,
        mac,
        key_len: cipher.key_len(),
        iv_len: cipher.block_len(),
        mac_len: mac.output_len(),
        exportable: false,
    }
}

static SUPPORTED_SUITES: [CipherSuiteParams; 5] = [
    suite(
        CipherSuite::TLS_RSA_WITH_AES_256_CBC_SHA,
        "TLS_RSA_WITH_AES_256_CBC_SHA",
        BulkCipherAlgId::Aes256Cbc,
        HashAlgId::Sha1,
    ),
    suite(
        CipherSuite::TLS_RSA_WITH_AES_128_CBC_SHA,
        "TLS_RSA_WITH_AES_128_CBC_SHA",
        BulkCipherAlgId::Aes128Cbc,
        HashAlgId::Sha1,
    ),
    suite(
        CipherSuite::TLS_RSA_WITH_3DES_EDE_CBC_SHA,
        "TLS_RSA_WITH_3DES_EDE_CBC_SHA",
        BulkCipherAlgId::TdesEdeCbc,
        HashAlgId::Sha1,
    ),
    suite(
        CipherSuite::TLS_RSA_WITH_NULL_SHA,
        "TLS_RSA_WITH_NULL_SHA",
        BulkCipherAlgId::Null,
        HashAlgId::Sha1,
    ),
    suite(
        CipherSuite::TLS_RSA_WITH_NULL_MD5,
        "TLS_RSA_WITH_NULL_MD5",
        BulkCipherAlgId::Null,
        HashAlgId::Md5,
    ),
];

impl CipherSuiteParams {
    /// Look up parameters for a supported cipher suite.
    pub fn from_suite(suite: CipherSuite) -> Result<&'static Self, TlsError> {
        SUPPORTED_SUITES
            .iter()
            .find(|p| p.suite == suite)
            .ok_or(TlsError::UnsupportedCipherSuite(suite.0))
    }

    /// Every supported suite, strongest first.
    pub fn all() -> &'static [CipherSuiteParams] {
        &SUPPORTED_SUITES
    }

    pub fn is_block_cipher(&self) -> bool {
        self.cipher != BulkCipherAlgId::Null
    }

    /// Key block length: `2 * mac_len + 2 * key_len + 2 * iv_len`.
    pub fn key_block_len(&self) -> usize {
        2 * self.mac_len + 2 * self.key_len + 2 * self.iv_len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suite_lookup() {
        let p = CipherSuiteParams::from_suite(CipherSuite::TLS_RSA_WITH_AES_128_CBC_SHA).unwrap();
        assert_eq!(p.key_len, 16);
        assert_eq!(p.iv_len, 16);
        assert_eq!(p.mac_len, 20);
        assert_eq!(p.key_block_len(), 104);
        assert!(p.is_block_cipher());
        assert!(!p.exportable);

        let p = CipherSuiteParams::from_suite(CipherSuite::TLS_RSA_WITH_3DES_EDE_CBC_SHA).unwrap();
        assert_eq!((p.key_len, p.iv_len), (24, 8));
        assert_eq!(p.key_block_len(), 104);

        let p = CipherSuiteParams::from_suite(CipherSuite::TLS_RSA_WITH_NULL_MD5).unwrap();
        assert_eq!(p.key_block_len(), 32);
        assert!(!p.is_block_cipher());
        assert_eq!(provider::new_digest(p.mac).output_size(), p.mac_len);
    }

    #[test]
    fn test_unknown_suite_is_config_error() {
        // TLS_RSA_WITH_RC4_128_MD5 is intentionally absent
        assert!(matches!(
            CipherSuiteParams::from_suite(CipherSuite(0x0004)),
            Err(TlsError::UnsupportedCipherSuite(0x0004))
        ));
        assert!(matches!(
            CipherSuiteParams::from_suite(CipherSuite(0xC02F)),
            Err(TlsError::UnsupportedCipherSuite(0xC02F))
        ));
    }

    #[test]
    fn test_all_suites_unique() {
        let all = CipherSuiteParams::all();
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                assert_ne!(a.suite, b.suite);
            }
        }
    }
}
