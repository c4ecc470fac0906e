//! Hash, HMAC, block cipher and RNG primitives behind object-safe traits.
//!
//! The protocol code never names a concrete algorithm type; it asks for a
//! boxed [`Digest`] or [`BlockCipher`] by [`HashAlgId`] / [`BulkCipherAlgId`]
//! and the RustCrypto implementations are plugged in here.

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt, BlockSizeUser, KeyInit};
use hmac::{Hmac, Mac};
use legatls_types::{BulkCipherAlgId, CryptoError, HashAlgId, TlsError};
use sha1::digest::FixedOutputReset;

/// A hash / message digest algorithm.
pub trait Digest: Send + Sync {
    /// The output size in bytes.
    fn output_size(&self) -> usize;

    /// The internal block size in bytes.
    fn block_size(&self) -> usize;

    /// Feed data into the hash state.
    fn update(&mut self, data: &[u8]) -> Result<(), CryptoError>;

    /// Finalize the hash and write the digest to `out`, then reset.
    /// The length of `out` must be at least `output_size()`.
    fn finish(&mut self, out: &mut [u8]) -> Result<(), CryptoError>;

    /// Reset the hash state to process a new message.
    fn reset(&mut self);
}

struct RustCryptoDigest<D>(D);

impl<D> Digest for RustCryptoDigest<D>
where
    D: sha1::Digest + FixedOutputReset + BlockSizeUser + Send + Sync,
{
    fn output_size(&self) -> usize {
        <D as sha1::Digest>::output_size()
    }

    fn block_size(&self) -> usize {
        <D as BlockSizeUser>::block_size()
    }

    fn update(&mut self, data: &[u8]) -> Result<(), CryptoError> {
        sha1::Digest::update(&mut self.0, data);
        Ok(())
    }

    fn finish(&mut self, out: &mut [u8]) -> Result<(), CryptoError> {
        let need = <D as sha1::Digest>::output_size();
        if out.len() < need {
            return Err(CryptoError::BufferTooSmall {
                need,
                got: out.len(),
            });
        }
        let digest = sha1::Digest::finalize_reset(&mut self.0);
        out[..need].copy_from_slice(&digest);
        Ok(())
    }

    fn reset(&mut self) {
        sha1::Digest::reset(&mut self.0);
    }
}

/// Create a new digest context for `alg`.
pub fn new_digest(alg: HashAlgId) -> Box<dyn Digest> {
    match alg {
        HashAlgId::Md5 => Box::new(RustCryptoDigest(<md5::Md5 as sha1::Digest>::new())),
        HashAlgId::Sha1 => Box::new(RustCryptoDigest(<sha1::Sha1 as sha1::Digest>::new())),
    }
}

/// One-shot hash over the concatenation of `parts`.
pub fn digest_parts(alg: HashAlgId, parts: &[&[u8]]) -> Result<Vec<u8>, TlsError> {
    let mut ctx = new_digest(alg);
    for part in parts {
        ctx.update(part)?;
    }
    let mut out = vec![0u8; ctx.output_size()];
    ctx.finish(&mut out)?;
    Ok(out)
}

/// HMAC over the concatenation of `parts`.
pub fn hmac_hash(alg: HashAlgId, key: &[u8], parts: &[&[u8]]) -> Result<Vec<u8>, TlsError> {
    fn run<M: Mac + KeyInit>(key: &[u8], parts: &[&[u8]]) -> Result<Vec<u8>, TlsError> {
        let mut mac = <M as KeyInit>::new_from_slice(key).map_err(|_| CryptoError::InvalidKey)?;
        for part in parts {
            mac.update(part);
        }
        Ok(mac.finalize().into_bytes().to_vec())
    }
    match alg {
        HashAlgId::Md5 => run::<Hmac<md5::Md5>>(key, parts),
        HashAlgId::Sha1 => run::<Hmac<sha1::Sha1>>(key, parts),
    }
}

/// A block cipher operating on single blocks in place.
pub trait BlockCipher: Send + Sync {
    /// Block size in bytes.
    fn block_size(&self) -> usize;

    /// Encrypt a single block in-place.
    fn encrypt_block(&self, block: &mut [u8]) -> Result<(), CryptoError>;

    /// Decrypt a single block in-place.
    fn decrypt_block(&self, block: &mut [u8]) -> Result<(), CryptoError>;
}

struct RustCryptoBlockCipher<C>(C);

impl<C> BlockCipher for RustCryptoBlockCipher<C>
where
    C: BlockEncrypt + BlockDecrypt + Send + Sync,
{
    fn block_size(&self) -> usize {
        <C as BlockSizeUser>::block_size()
    }

    fn encrypt_block(&self, block: &mut [u8]) -> Result<(), CryptoError> {
        if block.len() != self.block_size() {
            return Err(CryptoError::NotBlockAligned);
        }
        self.0.encrypt_block(GenericArray::from_mut_slice(block));
        Ok(())
    }

    fn decrypt_block(&self, block: &mut [u8]) -> Result<(), CryptoError> {
        if block.len() != self.block_size() {
            return Err(CryptoError::NotBlockAligned);
        }
        self.0.decrypt_block(GenericArray::from_mut_slice(block));
        Ok(())
    }
}

fn keyed<C>(alg: BulkCipherAlgId, key: &[u8]) -> Result<Box<dyn BlockCipher>, TlsError>
where
    C: KeyInit + BlockEncrypt + BlockDecrypt + Send + Sync + 'static,
{
    let cipher = C::new_from_slice(key).map_err(|_| CryptoError::InvalidKeyLength {
        expected: alg.key_len(),
        got: key.len(),
    })?;
    Ok(Box::new(RustCryptoBlockCipher(cipher)))
}

/// Instantiate the block cipher behind `alg` with `key`.
pub fn new_block_cipher(alg: BulkCipherAlgId, key: &[u8]) -> Result<Box<dyn BlockCipher>, TlsError> {
    match alg {
        BulkCipherAlgId::Aes128Cbc => keyed::<aes::Aes128>(alg, key),
        BulkCipherAlgId::Aes256Cbc => keyed::<aes::Aes256>(alg, key),
        BulkCipherAlgId::TdesEdeCbc => keyed::<des::TdesEde3>(alg, key),
        BulkCipherAlgId::Null => Err(TlsError::UnsupportedAlgorithm(
            "null cipher has no block transform".into(),
        )),
    }
}

/// Fill `buf` from the operating system RNG.
pub fn random_bytes(buf: &mut [u8]) -> Result<(), TlsError> {
    getrandom::getrandom(buf).map_err(|_| TlsError::CryptoError(CryptoError::RandFail))
}
