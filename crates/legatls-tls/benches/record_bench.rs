//! Key schedule and record protection benchmarks.
//!
//! Run with: cargo bench -p legatls-tls

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use legatls_tls::crypt::key_schedule::{compute_key_block, compute_master_secret};
use legatls_tls::crypt::CipherSuiteParams;
use legatls_tls::record::encryption::CipherState;
use legatls_tls::record::ContentType;
use legatls_tls::{CipherSuite, Direction, ProtocolVersion, TlsRole};

const CLIENT_RANDOM: [u8; 32] = [0x11; 32];
const SERVER_RANDOM: [u8; 32] = [0x22; 32];

fn bench_key_schedule(c: &mut Criterion) {
    let mut group = c.benchmark_group("key_schedule");
    let pre_master_secret = [0x03u8; 48];
    let params = CipherSuiteParams::from_suite(CipherSuite::TLS_RSA_WITH_AES_256_CBC_SHA).unwrap();

    for version in [ProtocolVersion::Ssl30, ProtocolVersion::Tls10] {
        group.bench_with_input(BenchmarkId::new("master_and_keys", version), &version, |bench, &v| {
            bench.iter(|| {
                let ms = compute_master_secret(v, &pre_master_secret, &CLIENT_RANDOM, &SERVER_RANDOM).unwrap();
                compute_key_block(v, params, &ms, &CLIENT_RANDOM, &SERVER_RANDOM).unwrap()
            });
        });
    }

    group.finish();
}

fn bench_record_seal(c: &mut Criterion) {
    let mut group = c.benchmark_group("record_seal");
    let plaintext = vec![0x5Au8; 16 * 1024];
    group.throughput(Throughput::Bytes(plaintext.len() as u64));

    for suite in [
        CipherSuite::TLS_RSA_WITH_AES_128_CBC_SHA,
        CipherSuite::TLS_RSA_WITH_AES_256_CBC_SHA,
        CipherSuite::TLS_RSA_WITH_3DES_EDE_CBC_SHA,
    ] {
        let params = CipherSuiteParams::from_suite(suite).unwrap();
        for version in [ProtocolVersion::Ssl30, ProtocolVersion::Tls10] {
            let keys = compute_key_block(version, params, &[7u8; 48], &CLIENT_RANDOM, &SERVER_RANDOM).unwrap();
            let mut state = CipherState::new(version, params, &keys, TlsRole::Client, Direction::Write).unwrap();
            let mut seq = 0u64;
            group.bench_function(BenchmarkId::new(params.name, version), |bench| {
                bench.iter(|| {
                    seq += 1;
                    state.seal(seq, ContentType::ApplicationData, &plaintext).unwrap()
                });
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_key_schedule, bench_record_seal);
criterion_main!(benches);
