//! Key derivation functions for TLS 1.0 (RFC 2246 §5) and SSL 3.0.
//!
//! ```text
//! TLS 1.0:
//!   PRF(secret, label, seed) = P_MD5(S1, label + seed) XOR P_SHA-1(S2, label + seed)
//!   P_hash(secret, seed) = HMAC_hash(secret, A(1) + seed) ||
//!                          HMAC_hash(secret, A(2) + seed) || ...
//!   A(0) = seed, A(i) = HMAC_hash(secret, A(i-1))
//!
//! SSL 3.0:
//!   out = MD5(secret + SHA(`A` + secret + seed)) ||
//!         MD5(secret + SHA(`BB` + secret + seed)) ||
//!         MD5(secret + SHA(`CCC` + secret + seed)) || ...
//! ```

use super::provider::{digest_parts, hmac_hash};
use legatls_types::{HashAlgId, TlsError};

/// P_hash expansion function.
fn p_hash(alg: HashAlgId, secret: &[u8], seed: &[u8], output_len: usize) -> Result<Vec<u8>, TlsError> {
    let mut result = Vec::with_capacity(output_len + alg.output_len());

    // A(1) = HMAC_hash(secret, A(0))
    let mut a = hmac_hash(alg, secret, &[seed])?;
    while result.len() < output_len {
        let block = hmac_hash(alg, secret, &[&a, seed])?;
        result.extend_from_slice(&block);
        a = hmac_hash(alg, secret, &[&a])?;
    }

    result.truncate(output_len);
    Ok(result)
}

/// TLS 1.0 PRF: derive `output_len` bytes from `secret`, `label` and `seed`.
///
/// The secret is split into two halves that share the middle byte when its
/// length is odd.
pub fn tls10_prf(secret: &[u8], label: &str, seed: &[u8], output_len: usize) -> Result<Vec<u8>, TlsError> {
    let mut label_seed = Vec::with_capacity(label.len() + seed.len());
    label_seed.extend_from_slice(label.as_bytes());
    label_seed.extend_from_slice(seed);

    let half = secret.len().div_ceil(2);
    let s1 = &secret[..half];
    let s2 = &secret[secret.len() - half..];

    let mut out = p_hash(HashAlgId::Md5, s1, &label_seed, output_len)?;
    let sha = p_hash(HashAlgId::Sha1, s2, &label_seed, output_len)?;
    for (o, s) in out.iter_mut().zip(sha.iter()) {
        *o ^= s;
    }
    Ok(out)
}

/// SSL 3.0 MD5/SHA-1 expansion used for both the master secret and the key block.
pub fn ssl3_prf(secret: &[u8], seed: &[u8], output_len: usize) -> Result<Vec<u8>, TlsError> {
    // Labels run from "A" to "Z" repeated 26 times.
    if output_len > 26 * HashAlgId::Md5.output_len() {
        return Err(TlsError::RecordError(format!(
            "SSL 3.0 key expansion cannot produce {output_len} bytes"
        )));
    }
    let mut out = Vec::with_capacity(output_len + 16);
    let mut i = 0u8;
    while out.len() < output_len {
        let label = vec![b'A' + i; usize::from(i) + 1];
        let inner = digest_parts(HashAlgId::Sha1, &[&label, secret, seed])?;
        out.extend_from_slice(&digest_parts(HashAlgId::Md5, &[secret, &inner])?);
        i += 1;
    }
    out.truncate(output_len);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(s: &str) -> Vec<u8> {
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }

    #[test]
    fn test_tls10_prf_known_answer() {
        // Published TLS 1.0/1.1 PRF test vector.
        let out = tls10_prf(&[0xab; 48], "PRF Testvector", &[0xcd; 64], 104).unwrap();
        let expected = hex(concat!(
            "d3d4d1e349b5d515044666d51de32bab258cb521b6b053463e354832fd976754",
            "443bcf9a296519bc289abcbc1187e4ebd31e602353776c408aafb74cbc85eff6",
            "9255f9788faa184cbb957a9819d84a5d7eb006eb459d3ae8de9810454b8b2d8f",
            "1afbc655a8c9a013",
        ));
        assert_eq!(out, expected);
    }

    #[test]
    fn test_tls10_prf_deterministic() {
        let out1 = tls10_prf(b"secret", "test label", b"seed", 100).unwrap();
        let out2 = tls10_prf(b"secret", "test label", b"seed", 100).unwrap();
        assert_eq!(out1.len(), 100);
        assert_eq!(out1, out2);

        let out3 = tls10_prf(b"secret", "other label", b"seed", 100).unwrap();
        assert_ne!(out1, out3);

        // A shorter request is a prefix of a longer one
        let short = tls10_prf(b"secret", "test label", b"seed", 12).unwrap();
        assert_eq!(&out1[..12], &short[..]);
    }

    #[test]
    fn test_tls10_prf_first_block_matches_definition() {
        // Odd-length secret: S1 and S2 share the middle byte.
        let secret = [0x0bu8, 0x0c, 0x0d, 0x0e, 0x0f];
        let s1 = &secret[..3];
        let s2 = &secret[2..];
        let label_seed = b"key expansionseed".to_vec();

        let a1_md5 = hmac_hash(HashAlgId::Md5, s1, &[&label_seed]).unwrap();
        let md5_block = hmac_hash(HashAlgId::Md5, s1, &[&a1_md5, &label_seed]).unwrap();
        let a1_sha = hmac_hash(HashAlgId::Sha1, s2, &[&label_seed]).unwrap();
        let sha_block = hmac_hash(HashAlgId::Sha1, s2, &[&a1_sha, &label_seed]).unwrap();

        let expected: Vec<u8> = md5_block.iter().zip(&sha_block).map(|(a, b)| a ^ b).collect();
        let out = tls10_prf(&secret, "key expansion", b"seed", 16).unwrap();
        assert_eq!(out, expected);
    }

    #[test]
    fn test_ssl3_prf_first_block_matches_definition() {
        let secret = [0x42u8; 48];
        let seed = [0x17u8; 64];
        let inner = digest_parts(HashAlgId::Sha1, &[b"A", &secret, &seed]).unwrap();
        let block_a = digest_parts(HashAlgId::Md5, &[&secret, &inner]).unwrap();
        let inner = digest_parts(HashAlgId::Sha1, &[b"BB", &secret, &seed]).unwrap();
        let block_b = digest_parts(HashAlgId::Md5, &[&secret, &inner]).unwrap();

        let out = ssl3_prf(&secret, &seed, 24).unwrap();
        assert_eq!(&out[..16], &block_a[..]);
        assert_eq!(&out[16..], &block_b[..8]);
    }

    #[test]
    fn test_ssl3_prf_limit() {
        assert_eq!(ssl3_prf(b"s", b"seed", 416).unwrap().len(), 416);
        assert!(ssl3_prf(b"s", b"seed", 417).is_err());
    }
}
