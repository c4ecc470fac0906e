#![no_main]
use legatls_tls::handshake::codec::parse_handshake_header;
use legatls_tls::handshake::messages::HandshakeMessage;
use legatls_tls::handshake::HandshakeType;
use legatls_tls::ProtocolVersion;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(Some((msg_type, body, _))) = parse_handshake_header(data) else {
        return;
    };
    let Ok(msg_type) = HandshakeType::from_u8(msg_type) else {
        return;
    };
    for version in [ProtocolVersion::Ssl30, ProtocolVersion::Tls10] {
        if let Ok(msg) = HandshakeMessage::parse(msg_type, body, version) {
            let _ = msg.encode(version);
        }
    }
});
