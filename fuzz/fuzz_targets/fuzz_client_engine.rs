#![no_main]
use std::sync::{Arc, OnceLock};

use legatls_tls::{RecordProtocol, TlsConfig, TlsRole};
use libfuzzer_sys::fuzz_target;

fn config() -> Arc<TlsConfig> {
    static CONFIG: OnceLock<Arc<TlsConfig>> = OnceLock::new();
    CONFIG
        .get_or_init(|| {
            let config = TlsConfig::builder()
                .role(TlsRole::Client)
                .min_version(legatls_tls::ProtocolVersion::Ssl30)
                .build()
                .unwrap();
            Arc::new(config)
        })
        .clone()
}

// Feed server-side bytes to a client that has sent its ClientHello.
fuzz_target!(|data: &[u8]| {
    let mut client = RecordProtocol::new(config()).unwrap();
    if client.start_handshake().is_err() {
        return;
    }
    let mut rest = data;
    while let Ok(Some((consumed, _))) = client.receive_record(rest) {
        rest = &rest[consumed..];
        if consumed == 0 {
            break;
        }
    }
});
