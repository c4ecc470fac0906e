//! Algorithm identifiers and their fixed sizes.

use std::fmt;

/// Hash algorithm identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgId {
    Md5,
    Sha1,
}

impl HashAlgId {
    /// Digest output length in bytes.
    pub const fn output_len(self) -> usize {
        match self {
            HashAlgId::Md5 => 16,
            HashAlgId::Sha1 => 20,
        }
    }

    /// Length of the SSL 3.0 MAC pads (`pad1`/`pad2`) for this hash.
    pub const fn ssl3_pad_len(self) -> usize {
        match self {
            HashAlgId::Md5 => 48,
            HashAlgId::Sha1 => 40,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            HashAlgId::Md5 => "MD5",
            HashAlgId::Sha1 => "SHA1",
        }
    }
}

impl fmt::Display for HashAlgId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Bulk cipher identifiers (algorithm + mode).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BulkCipherAlgId {
    Null,
    TdesEdeCbc,
    Aes128Cbc,
    Aes256Cbc,
}

impl BulkCipherAlgId {
    pub const fn key_len(self) -> usize {
        match self {
            BulkCipherAlgId::Null => 0,
            BulkCipherAlgId::TdesEdeCbc => 24,
            BulkCipherAlgId::Aes128Cbc => 16,
            BulkCipherAlgId::Aes256Cbc => 32,
        }
    }

    /// Block size in bytes; 0 for the null cipher.
    pub const fn block_len(self) -> usize {
        match self {
            BulkCipherAlgId::Null => 0,
            BulkCipherAlgId::TdesEdeCbc => 8,
            BulkCipherAlgId::Aes128Cbc | BulkCipherAlgId::Aes256Cbc => 16,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            BulkCipherAlgId::Null => "NULL",
            BulkCipherAlgId::TdesEdeCbc => "DES-EDE3-CBC",
            BulkCipherAlgId::Aes128Cbc => "AES-128-CBC",
            BulkCipherAlgId::Aes256Cbc => "AES-256-CBC",
        }
    }
}

impl fmt::Display for BulkCipherAlgId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_names() {
        assert_eq!(HashAlgId::Md5.to_string(), "MD5");
        assert_eq!(HashAlgId::Sha1.to_string(), "SHA1");
    }

    #[test]
    fn test_hash_sizes() {
        assert_eq!(HashAlgId::Md5.output_len(), 16);
        assert_eq!(HashAlgId::Sha1.output_len(), 20);
        assert_eq!(HashAlgId::Md5.ssl3_pad_len(), 48);
        assert_eq!(HashAlgId::Sha1.ssl3_pad_len(), 40);
    }

    #[test]
    fn test_cipher_names_and_sizes() {
        assert_eq!(BulkCipherAlgId::TdesEdeCbc.to_string(), "DES-EDE3-CBC");
        assert_eq!(BulkCipherAlgId::Aes256Cbc.name(), "AES-256-CBC");
        assert_eq!(BulkCipherAlgId::Null.block_len(), 0);
        assert_eq!(BulkCipherAlgId::TdesEdeCbc.block_len(), 8);
        assert_eq!(BulkCipherAlgId::Aes128Cbc.key_len(), 16);
    }
}
