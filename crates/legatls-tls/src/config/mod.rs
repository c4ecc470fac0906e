//! TLS configuration with builder pattern.

use std::fmt;
use std::sync::Arc;

use crate::crypt::pkcs1::public_key_from_der;
use crate::crypt::CipherSuiteParams;
use crate::session::SessionCache;
use crate::{CipherSuite, ProtocolVersion, TlsRole};
use legatls_types::TlsError;
use rsa::RsaPrivateKey;
use rsa::RsaPublicKey;

/// Callback receiving NSS key log lines.
pub type KeyLogCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Validates a peer's certificate chain and yields the leaf's RSA key.
///
/// X.509 path validation lives outside this crate; plug an implementation
/// in here.
pub trait CertificateVerifier: Send + Sync {
    /// `chain` is DER, leaf first. `server_name` is the name the client
    /// connected to (client side only).
    fn verify_chain(&self, chain: &[Vec<u8>], server_name: Option<&str>) -> Result<RsaPublicKey, TlsError>;
}

/// Accepts any chain whose leaf entry is a bare RSA public key
/// (SubjectPublicKeyInfo or PKCS#1 DER). Performs no trust decision.
#[derive(Debug, Default, Clone, Copy)]
pub struct LeafKeyVerifier;

impl CertificateVerifier for LeafKeyVerifier {
    fn verify_chain(&self, chain: &[Vec<u8>], _server_name: Option<&str>) -> Result<RsaPublicKey, TlsError> {
        let leaf = chain
            .first()
            .ok_or_else(|| TlsError::CertVerifyFailed("empty certificate chain".into()))?;
        public_key_from_der(leaf)
    }
}

/// Accepts only leaf keys from a fixed set.
#[derive(Debug, Clone)]
pub struct PinnedKeyVerifier {
    keys: Vec<RsaPublicKey>,
}

impl PinnedKeyVerifier {
    pub fn new(keys: Vec<RsaPublicKey>) -> Self {
        Self { keys }
    }
}

impl CertificateVerifier for PinnedKeyVerifier {
    fn verify_chain(&self, chain: &[Vec<u8>], server_name: Option<&str>) -> Result<RsaPublicKey, TlsError> {
        let key = LeafKeyVerifier.verify_chain(chain, server_name)?;
        if self.keys.contains(&key) {
            Ok(key)
        } else {
            Err(TlsError::CertVerifyFailed("leaf key is not pinned".into()))
        }
    }
}

/// TLS configuration.
#[derive(Clone)]
pub struct TlsConfig {
    /// Minimum supported protocol version.
    pub min_version: ProtocolVersion,
    /// Maximum supported protocol version.
    pub max_version: ProtocolVersion,
    /// Enabled cipher suites (in preference order).
    pub cipher_suites: Vec<CipherSuite>,
    /// The role (client or server).
    pub role: TlsRole,
    /// Server name the client connects to; also the client's session cache key.
    pub server_name: Option<String>,
    /// Peer certificate validation.
    pub verifier: Arc<dyn CertificateVerifier>,
    /// Server certificate chain (DER-encoded, leaf first).
    pub certificate_chain: Vec<Vec<u8>>,
    /// Server private key for the RSA key exchange.
    pub private_key: Option<RsaPrivateKey>,
    /// Client certificate chain (DER-encoded, leaf first).
    pub client_certificate_chain: Vec<Vec<u8>>,
    /// Client private key for CertificateVerify signing.
    pub client_private_key: Option<RsaPrivateKey>,
    /// Server: send a CertificateRequest.
    pub verify_client_cert: bool,
    /// Server: fail the handshake when the client sends no certificate.
    pub require_client_cert: bool,
    /// Offer (client) or accept (server) abbreviated handshakes.
    pub session_resumption: bool,
    /// Shared session cache. Required for resumption.
    pub session_cache: Option<Arc<SessionCache>>,
    /// Skip sending close_notify on close.
    pub quiet_shutdown: bool,
    /// NSS key log callback.
    pub key_log_callback: Option<KeyLogCallback>,
}

impl fmt::Debug for TlsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsConfig")
            .field("min_version", &self.min_version)
            .field("max_version", &self.max_version)
            .field("cipher_suites", &self.cipher_suites)
            .field("role", &self.role)
            .field("server_name", &self.server_name)
            .field("certificate_chain_len", &self.certificate_chain.len())
            .field("private_key", &self.private_key.as_ref().map(|_| "<rsa key>"))
            .field("verify_client_cert", &self.verify_client_cert)
            .field("require_client_cert", &self.require_client_cert)
            .field("session_resumption", &self.session_resumption)
            .field(
                "key_log_callback",
                &self.key_log_callback.as_ref().map(|_| "<callback>"),
            )
            .finish_non_exhaustive()
    }
}

impl TlsConfig {
    /// Create a builder for TLS configuration.
    pub fn builder() -> TlsConfigBuilder {
        TlsConfigBuilder::default()
    }

    /// Whether `version` lies in the configured range.
    pub fn supports_version(&self, version: ProtocolVersion) -> bool {
        self.min_version <= version && version <= self.max_version
    }

    /// The session cache, when resumption is enabled.
    pub fn resumption_cache(&self) -> Option<&Arc<SessionCache>> {
        if self.session_resumption {
            self.session_cache.as_ref()
        } else {
            None
        }
    }
}

/// Builder for `TlsConfig`.
pub struct TlsConfigBuilder {
    config: TlsConfig,
}

impl Default for TlsConfigBuilder {
    fn default() -> Self {
        Self {
            config: TlsConfig {
                min_version: ProtocolVersion::Tls10,
                max_version: ProtocolVersion::Tls10,
                cipher_suites: vec![
                    CipherSuite::TLS_RSA_WITH_AES_256_CBC_SHA,
                    CipherSuite::TLS_RSA_WITH_AES_128_CBC_SHA,
                    CipherSuite::TLS_RSA_WITH_3DES_EDE_CBC_SHA,
                ],
                role: TlsRole::Client,
                server_name: None,
                verifier: Arc::new(LeafKeyVerifier),
                certificate_chain: Vec::new(),
                private_key: None,
                client_certificate_chain: Vec::new(),
                client_private_key: None,
                verify_client_cert: false,
                require_client_cert: false,
                session_resumption: true,
                session_cache: None,
                quiet_shutdown: false,
                key_log_callback: None,
            },
        }
    }
}

impl fmt::Debug for TlsConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsConfigBuilder")
            .field("role", &self.config.role)
            .field("cipher_suites", &self.config.cipher_suites)
            .finish_non_exhaustive()
    }
}

impl TlsConfigBuilder {
    pub fn min_version(mut self, version: ProtocolVersion) -> Self {
        self.config.min_version = version;
        self
    }

    pub fn max_version(mut self, version: ProtocolVersion) -> Self {
        self.config.max_version = version;
        self
    }

    pub fn cipher_suites(mut self, suites: &[CipherSuite]) -> Self {
        self.config.cipher_suites = suites.to_vec();
        self
    }

    pub fn role(mut self, role: TlsRole) -> Self {
        self.config.role = role;
        self
    }

    pub fn server_name(mut self, name: &str) -> Self {
        self.config.server_name = Some(name.to_string());
        self
    }

    pub fn verifier(mut self, verifier: Arc<dyn CertificateVerifier>) -> Self {
        self.config.verifier = verifier;
        self
    }

    pub fn certificate_chain(mut self, certs: Vec<Vec<u8>>) -> Self {
        self.config.certificate_chain = certs;
        self
    }

    pub fn private_key(mut self, key: RsaPrivateKey) -> Self {
        self.config.private_key = Some(key);
        self
    }

    pub fn client_certificate_chain(mut self, certs: Vec<Vec<u8>>) -> Self {
        self.config.client_certificate_chain = certs;
        self
    }

    pub fn client_private_key(mut self, key: RsaPrivateKey) -> Self {
        self.config.client_private_key = Some(key);
        self
    }

    pub fn verify_client_cert(mut self, enabled: bool) -> Self {
        self.config.verify_client_cert = enabled;
        self
    }

    pub fn require_client_cert(mut self, required: bool) -> Self {
        self.config.require_client_cert = required;
        self
    }

    pub fn session_resumption(mut self, enabled: bool) -> Self {
        self.config.session_resumption = enabled;
        self
    }

    pub fn session_cache(mut self, cache: Arc<SessionCache>) -> Self {
        self.config.session_cache = Some(cache);
        self
    }

    pub fn quiet_shutdown(mut self, quiet: bool) -> Self {
        self.config.quiet_shutdown = quiet;
        self
    }

    pub fn key_log(mut self, cb: KeyLogCallback) -> Self {
        self.config.key_log_callback = Some(cb);
        self
    }

    /// Validate and build the configuration.
    ///
    /// Unknown cipher suites and incomplete server credentials are rejected
    /// here, before any record is sent.
    pub fn build(self) -> Result<TlsConfig, TlsError> {
        let config = self.config;
        if config.min_version > config.max_version {
            return Err(TlsError::InvalidConfig(
                "min_version is above max_version".into(),
            ));
        }
        if config.cipher_suites.is_empty() {
            return Err(TlsError::InvalidConfig("no cipher suites configured".into()));
        }
        for suite in &config.cipher_suites {
            CipherSuiteParams::from_suite(*suite)?;
        }
        if config.role == TlsRole::Server
            && (config.certificate_chain.is_empty() || config.private_key.is_none())
        {
            return Err(TlsError::InvalidConfig(
                "server requires a certificate chain and private key".into(),
            ));
        }
        if config.require_client_cert && !config.verify_client_cert {
            return Err(TlsError::InvalidConfig(
                "require_client_cert needs verify_client_cert".into(),
            ));
        }
        if !config.client_certificate_chain.is_empty() && config.client_private_key.is_none() {
            return Err(TlsError::InvalidConfig(
                "client certificate chain without a private key".into(),
            ));
        }
        Ok(config)
    }
}
