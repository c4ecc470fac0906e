//! RSA PKCS#1 v1.5 key transport and signatures.
//!
//! Signatures are over the raw 36-byte MD5 + SHA-1 digest with no
//! DigestInfo prefix, as SSL 3.0 / TLS 1.0 CertificateVerify requires.

use legatls_types::{CryptoError, TlsError};
use rand::rngs::OsRng;
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs8::{DecodePublicKey, EncodePublicKey};
use rsa::{Pkcs1v15Encrypt, Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};

/// Encrypt the pre-master secret to the server's key.
pub fn encrypt_pre_master_secret(key: &RsaPublicKey, pre_master_secret: &[u8]) -> Result<Vec<u8>, TlsError> {
    key.encrypt(&mut OsRng, Pkcs1v15Encrypt, pre_master_secret)
        .map_err(|_| TlsError::CryptoError(CryptoError::RsaEncryptFail))
}

/// Decrypt an encrypted pre-master secret.
pub fn decrypt_pre_master_secret(key: &RsaPrivateKey, ciphertext: &[u8]) -> Result<Vec<u8>, TlsError> {
    key.decrypt(Pkcs1v15Encrypt, ciphertext)
        .map_err(|_| TlsError::CryptoError(CryptoError::RsaInvalidPadding))
}

/// Sign a pre-hashed MD5 + SHA-1 digest.
pub fn sign_digest(key: &RsaPrivateKey, digest: &[u8]) -> Result<Vec<u8>, TlsError> {
    key.sign(Pkcs1v15Sign::new_unprefixed(), digest)
        .map_err(|_| TlsError::CryptoError(CryptoError::RsaSignFail))
}

/// Verify a signature over a pre-hashed MD5 + SHA-1 digest.
pub fn verify_digest(key: &RsaPublicKey, digest: &[u8], signature: &[u8]) -> Result<(), TlsError> {
    key.verify(Pkcs1v15Sign::new_unprefixed(), digest, signature)
        .map_err(|_| TlsError::CryptoError(CryptoError::RsaVerifyFail))
}

/// Parse an RSA public key from DER, either SubjectPublicKeyInfo or PKCS#1.
pub fn public_key_from_der(der: &[u8]) -> Result<RsaPublicKey, TlsError> {
    RsaPublicKey::from_public_key_der(der)
        .or_else(|_| RsaPublicKey::from_pkcs1_der(der))
        .map_err(|_| TlsError::CertVerifyFailed("no RSA public key in certificate".into()))
}

/// Encode an RSA public key as SubjectPublicKeyInfo DER.
pub fn public_key_to_der(key: &RsaPublicKey) -> Result<Vec<u8>, TlsError> {
    key.to_public_key_der()
        .map(|doc| doc.as_bytes().to_vec())
        .map_err(|_| TlsError::CryptoError(CryptoError::InvalidKey))
}
