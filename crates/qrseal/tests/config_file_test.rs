//! Orchestrators built from a `qrseal.toml` on disk.

use std::io::Write;

use qrseal::{EncryptionOrchestrator, ErrorCorrectionLevel, QrSealConfig};
use secrecy::SecretString;

const CONFIG: &str = r#"
[encryption]
kdf = "PBKDF2-SHA256"
iterations = 100000
salt_length = 16
nonce_length = 12

[lockout]
threshold = 2
duration_secs = 10

[qr]
error_correction = "H"

[decoy]
rotation = ["Table 12 menu"]
extra_denylist = ["vault"]
"#;

#[test]
fn orchestrator_from_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(CONFIG.as_bytes()).unwrap();

    let config = QrSealConfig::load(file.path()).unwrap();
    let o = EncryptionOrchestrator::new(config).unwrap();

    assert!(o.validate_decoy_text("the vault opens at noon").is_err());

    let password = SecretString::from("abcdefgh".to_string());
    let sealed = o.seal("from file", &password, None).unwrap();
    assert_eq!(sealed.requested_level, ErrorCorrectionLevel::H);
    assert_eq!(
        o.peek_payload_info(&sealed.payload).decoy_text.as_deref(),
        Some("Table 12 menu")
    );

    let wrong = SecretString::from("zzzzzzzz".to_string());
    o.decrypt_qr_payload(&sealed.payload, &wrong, "kiosk");
    o.decrypt_qr_payload(&sealed.payload, &wrong, "kiosk");
    let status = o.lockout_status("kiosk");
    assert!(!status.allowed);
    assert_eq!(status.retry_after_seconds, 10);
}

#[test]
fn missing_config_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = QrSealConfig::load(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(config, QrSealConfig::default());
    EncryptionOrchestrator::new(config).unwrap();
}
