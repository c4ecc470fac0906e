#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut rest = data;
    while let Ok(Some((_, consumed))) = legatls_tls::record::parse_record(rest) {
        rest = &rest[consumed..];
    }
    let _ = legatls_tls::alert::parse_alert(data);
});
