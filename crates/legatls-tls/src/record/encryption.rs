//! Per-direction record protection: MAC-then-encrypt with CBC or the null
//! cipher (RFC 2246 §6.2.3, SSL 3.0 §5.2.3).
//!
//! ```text
//! fragment = encrypt(plaintext || MAC || padding || padding_length)
//! ```
//!
//! The CBC IV for the first record comes from the key block; every later
//! record chains from the last ciphertext block of the previous one.

use super::{ContentType, MAX_CIPHERTEXT_LENGTH, MAX_PLAINTEXT_LENGTH};
use crate::crypt::key_schedule::KeyBlock;
use crate::crypt::mac::{compute_writer_record_mac, mac_writer};
use crate::crypt::provider::{new_block_cipher, BlockCipher};
use crate::crypt::CipherSuiteParams;
use crate::{Direction, ProtocolVersion, TlsRole};
use legatls_types::TlsError;
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

/// Build CBC padding: `padding_length + 1` bytes, all equal to `padding_length`.
///
/// Valid for both versions; SSL 3.0 only inspects the final byte.
fn build_cbc_padding(data_len: usize, block_size: usize) -> Vec<u8> {
    let padding_length = (block_size - ((data_len + 1) % block_size)) % block_size;
    vec![padding_length as u8; padding_length + 1]
}

fn cbc_encrypt(cipher: &dyn BlockCipher, iv: &mut [u8], data: &mut [u8]) -> Result<(), TlsError> {
    let bs = cipher.block_size();
    for chunk in data.chunks_mut(bs) {
        for (b, v) in chunk.iter_mut().zip(iv.iter()) {
            *b ^= v;
        }
        cipher.encrypt_block(chunk)?;
        iv.copy_from_slice(chunk);
    }
    Ok(())
}

fn cbc_decrypt(cipher: &dyn BlockCipher, iv: &mut [u8], data: &mut [u8]) -> Result<(), TlsError> {
    let bs = cipher.block_size();
    let mut ct_copy = vec![0u8; bs];
    for chunk in data.chunks_mut(bs) {
        ct_copy.copy_from_slice(chunk);
        cipher.decrypt_block(chunk)?;
        for (b, v) in chunk.iter_mut().zip(iv.iter()) {
            *b ^= v;
        }
        iv.copy_from_slice(&ct_copy);
    }
    Ok(())
}

/// Active protection for one direction of one connection.
///
/// Sequence numbers are owned by the security context and passed in.
pub struct CipherState {
    version: ProtocolVersion,
    params: &'static CipherSuiteParams,
    keys: KeyBlock,
    writer: TlsRole,
    cipher: Option<Box<dyn BlockCipher>>,
    iv: Vec<u8>,
}

impl Drop for CipherState {
    fn drop(&mut self) {
        self.iv.zeroize();
    }
}

impl std::fmt::Debug for CipherState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CipherState")
            .field("version", &self.version)
            .field("suite", &self.params.name)
            .finish_non_exhaustive()
    }
}

impl CipherState {
    /// Build the state `role` uses for traffic in `direction`.
    pub fn new(
        version: ProtocolVersion,
        params: &'static CipherSuiteParams,
        keys: &KeyBlock,
        role: TlsRole,
        direction: Direction,
    ) -> Result<Self, TlsError> {
        let writer = mac_writer(role, direction);
        let cipher = if params.is_block_cipher() {
            Some(new_block_cipher(params.cipher, keys.write_key(writer))?)
        } else {
            None
        };
        Ok(Self {
            version,
            params,
            keys: keys.clone(),
            writer,
            cipher,
            iv: keys.write_iv(writer).to_vec(),
        })
    }

    fn record_mac(&self, seq: u64, content_type: ContentType, fragment: &[u8]) -> Result<Vec<u8>, TlsError> {
        compute_writer_record_mac(
            self.writer,
            self.version,
            self.params.mac,
            &self.keys,
            seq,
            content_type,
            fragment,
        )
    }

    pub fn params(&self) -> &'static CipherSuiteParams {
        self.params
    }

    /// MAC, pad and encrypt one plaintext fragment.
    pub fn seal(&mut self, seq: u64, content_type: ContentType, plaintext: &[u8]) -> Result<Vec<u8>, TlsError> {
        if plaintext.len() > MAX_PLAINTEXT_LENGTH {
            return Err(TlsError::RecordOverflow);
        }
        let mac = self.record_mac(seq, content_type, plaintext)?;

        let mut data = Vec::with_capacity(plaintext.len() + mac.len() + 16);
        data.extend_from_slice(plaintext);
        data.extend_from_slice(&mac);

        if let Some(cipher) = &self.cipher {
            data.extend_from_slice(&build_cbc_padding(data.len(), cipher.block_size()));
            cbc_encrypt(cipher.as_ref(), &mut self.iv, &mut data)?;
        }
        Ok(data)
    }

    /// Decrypt one fragment, check padding and MAC, and return the plaintext.
    ///
    /// Padding and MAC failures are indistinguishable: both are `BadRecordMac`.
    pub fn open(&mut self, seq: u64, content_type: ContentType, fragment: &[u8]) -> Result<Vec<u8>, TlsError> {
        if fragment.len() > MAX_CIPHERTEXT_LENGTH {
            return Err(TlsError::RecordOverflow);
        }
        let mac_len = self.params.mac_len;

        let Some(cipher) = &self.cipher else {
            if fragment.len() < mac_len {
                return Err(TlsError::BadRecordMac);
            }
            let content_len = fragment.len() - mac_len;
            let expected = self.record_mac(seq, content_type, &fragment[..content_len])?;
            if fragment[content_len..].ct_eq(&expected).unwrap_u8() != 1 {
                return Err(TlsError::BadRecordMac);
            }
            return check_plaintext_len(fragment[..content_len].to_vec());
        };

        let bs = cipher.block_size();
        let min_len = (mac_len + 1).div_ceil(bs) * bs;
        if fragment.len() % bs != 0 || fragment.len() < min_len {
            return Err(TlsError::DecryptionFailed);
        }

        let mut decrypted = fragment.to_vec();
        cbc_decrypt(cipher.as_ref(), &mut self.iv, &mut decrypted)?;

        let padding_length = decrypted[decrypted.len() - 1] as usize;
        let total_overhead = padding_length + 1 + mac_len;
        let mut good = u8::from(total_overhead <= decrypted.len());
        match self.version {
            ProtocolVersion::Ssl30 => {
                good &= u8::from(padding_length < bs);
            }
            ProtocolVersion::Tls10 => {
                let pad_start = decrypted.len().saturating_sub(padding_length + 1);
                for &b in &decrypted[pad_start..] {
                    good &= b.ct_eq(&(padding_length as u8)).unwrap_u8();
                }
            }
        }

        let content_len = if good == 1 {
            decrypted.len() - total_overhead
        } else {
            0
        };

        // Always compute the MAC so padding failures cost the same.
        let expected = self.record_mac(seq, content_type, &decrypted[..content_len])?;
        let mac_slice = if good == 1 {
            &decrypted[content_len..content_len + mac_len]
        } else {
            &decrypted[..mac_len]
        };
        let mac_ok = mac_slice.ct_eq(expected.as_slice()).unwrap_u8();

        if good & mac_ok != 1 {
            return Err(TlsError::BadRecordMac);
        }
        decrypted.truncate(content_len);
        check_plaintext_len(decrypted)
    }
}

fn check_plaintext_len(plaintext: Vec<u8>) -> Result<Vec<u8>, TlsError> {
    if plaintext.len() > MAX_PLAINTEXT_LENGTH {
        return Err(TlsError::RecordOverflow);
    }
    Ok(plaintext)
}
