//! NSS Key Log Format support (SSLKEYLOGFILE).
//!
//! SSL 3.0 and TLS 1.0 sessions are logged as
//! `CLIENT_RANDOM <client_random_hex> <master_secret_hex>`.

use crate::config::TlsConfig;

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Log the master secret through `config.key_log_callback`, if set.
pub fn log_master_secret(config: &TlsConfig, client_random: &[u8; 32], master_secret: &[u8]) {
    if let Some(cb) = &config.key_log_callback {
        let line = format!(
            "CLIENT_RANDOM {} {}",
            to_hex(client_random),
            to_hex(master_secret)
        );
        cb(&line);
    }
}
