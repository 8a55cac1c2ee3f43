use qrseal_core::config::{MIN_ARGON2_MEMORY_KIB, MIN_PBKDF2_ITERATIONS};
use qrseal_core::EncryptionConfig;
use qrseal_crypto::{AeadCipher, AesGcmCipher, DerivedKey, KeyDerivation, PasswordKdf};
use secrecy::SecretString;

fn make_data(size: usize) -> Vec<u8> {
    (0..size)
        .map(|i| (i.wrapping_mul(7) ^ (i >> 3)) as u8)
        .collect()
}

#[divan::bench(args = [64, 1024, 2900])]
fn bench_encrypt(bencher: divan::Bencher, size: usize) {
    let key = DerivedKey::from_bytes([0xABu8; 32]);
    let nonce = [7u8; 12];
    let data = make_data(size);
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| {
            AesGcmCipher
                .encrypt(
                    divan::black_box(&key),
                    divan::black_box(&nonce),
                    divan::black_box(&data),
                )
                .unwrap()
        });
}

#[divan::bench(args = [64, 1024, 2900])]
fn bench_decrypt(bencher: divan::Bencher, size: usize) {
    let key = DerivedKey::from_bytes([0xABu8; 32]);
    let nonce = [7u8; 12];
    let sealed = AesGcmCipher.encrypt(&key, &nonce, &make_data(size)).unwrap();
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| {
            AesGcmCipher
                .decrypt(
                    divan::black_box(&key),
                    divan::black_box(&nonce),
                    divan::black_box(&sealed.ciphertext),
                    divan::black_box(&sealed.tag),
                )
                .unwrap()
        });
}

#[divan::bench(sample_count = 10)]
fn bench_derive_argon2id_default(bencher: divan::Bencher) {
    let password = SecretString::from("Tr0ub4dor&3".to_string());
    let config = EncryptionConfig::argon2id();
    let salt = vec![1u8; config.salt_length];
    bencher.bench(|| PasswordKdf.derive(&password, &salt, divan::black_box(&config)).unwrap());
}

#[divan::bench(sample_count = 10)]
fn bench_derive_pbkdf2_default(bencher: divan::Bencher) {
    let password = SecretString::from("Tr0ub4dor&3".to_string());
    let config = EncryptionConfig::pbkdf2();
    let salt = vec![1u8; config.salt_length];
    bencher.bench(|| PasswordKdf.derive(&password, &salt, divan::black_box(&config)).unwrap());
}

#[divan::bench(sample_count = 20)]
fn bench_derive_minimum_cost(bencher: divan::Bencher) {
    let password = SecretString::from("Tr0ub4dor&3".to_string());
    let argon = EncryptionConfig {
        iterations: 1,
        memory_cost_kib: MIN_ARGON2_MEMORY_KIB,
        parallelism: 1,
        ..EncryptionConfig::argon2id()
    };
    let pbkdf2 = EncryptionConfig {
        iterations: MIN_PBKDF2_ITERATIONS,
        ..EncryptionConfig::pbkdf2()
    };
    let salt = vec![1u8; 32];
    bencher.bench(|| {
        PasswordKdf.derive(&password, &salt, &argon).unwrap();
        PasswordKdf.derive(&password, &salt, &pbkdf2).unwrap();
    });
}

fn main() {
    divan::main();
}
