//! Payload wire format
//!
//! ```json
//! {
//!   "version": "1.0",
//!   "algorithm": "AES-256-GCM",
//!   "kdf": "Argon2id", "iterations": 3, "memoryKib": 65536, "parallelism": 4,
//!   "salt": "<base64>", "iv": "<base64>", "ciphertext": "<base64>",
//!   "tag": "<base64>",
//!   "disguise": "<plain text>"
//! }
//! ```
//!
//! `kdf`/`iterations`/`memoryKib`/`parallelism` and `tag` are optional on
//! input. Without `tag`, the last 16 bytes of `ciphertext` are the tag.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use qrseal_core::config::{
    validate_kdf_params, MAX_SALT_LENGTH, MIN_SALT_LENGTH, SUPPORTED_NONCE_LENGTHS,
};
use qrseal_core::{
    CipherAlgorithm, EncryptedPayload, EncryptionConfig, KdfAlgorithm, KdfParams, PayloadInfo,
    QrSealError, QrSealResult, PAYLOAD_VERSION,
};
use qrseal_crypto::TAG_SIZE;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Keys that must be present for a string to count as an encrypted payload
pub const MANDATORY_FIELDS: [&str; 6] =
    ["version", "algorithm", "salt", "iv", "ciphertext", "disguise"];

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePayload {
    version: String,
    algorithm: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    kdf: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    iterations: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    memory_kib: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parallelism: Option<u32>,
    salt: String,
    iv: String,
    ciphertext: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tag: Option<String>,
    disguise: String,
}

pub fn serialize(payload: &EncryptedPayload) -> QrSealResult<String> {
    let wire = WirePayload {
        version: payload.version.clone(),
        algorithm: payload.algorithm.id().to_string(),
        kdf: payload.kdf.map(|k| k.algorithm.id().to_string()),
        iterations: payload.kdf.map(|k| k.iterations),
        memory_kib: payload.kdf.map(|k| k.memory_kib),
        parallelism: payload.kdf.map(|k| k.parallelism),
        salt: STANDARD.encode(&payload.salt),
        iv: STANDARD.encode(&payload.nonce),
        ciphertext: STANDARD.encode(&payload.ciphertext),
        tag: payload.tag.as_ref().map(|t| STANDARD.encode(t)),
        disguise: payload.decoy_text.clone(),
    };
    serde_json::to_string(&wire)
        .map_err(|_| QrSealError::Validation("payload could not be serialized".into()))
}

/// Parse and validate a scanned payload string.
///
/// Order of checks: JSON object → `version` → mandatory keys → `algorithm`
/// → field types → KDF parameters → base64 and minimum lengths. Nothing is
/// base64-decoded for an unsupported version or algorithm.
pub fn deserialize(raw: &str) -> QrSealResult<EncryptedPayload> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|_| QrSealError::Malformed("payload is not valid JSON".into()))?;
    let object = value
        .as_object()
        .ok_or_else(|| QrSealError::Malformed("payload is not a JSON object".into()))?;

    let version = string_field(object, "version")?;
    if version != PAYLOAD_VERSION {
        return Err(QrSealError::UnsupportedVersion(version.to_string()));
    }

    if let Some(missing) = MANDATORY_FIELDS.iter().find(|k| !object.contains_key(**k)) {
        return Err(QrSealError::Malformed(format!("missing field '{missing}'")));
    }

    let algorithm_id = string_field(object, "algorithm")?;
    let algorithm = CipherAlgorithm::from_id(algorithm_id)
        .ok_or_else(|| QrSealError::UnsupportedAlgorithm(algorithm_id.to_string()))?;

    let wire: WirePayload = serde_json::from_value(value)
        .map_err(|_| QrSealError::Malformed("payload fields have the wrong type".into()))?;

    let kdf = kdf_params(&wire)?;

    let salt = decode_field("salt", &wire.salt)?;
    if !(MIN_SALT_LENGTH..=MAX_SALT_LENGTH).contains(&salt.len()) {
        return Err(QrSealError::Malformed(format!(
            "salt is {} bytes, expected {MIN_SALT_LENGTH}..={MAX_SALT_LENGTH}",
            salt.len()
        )));
    }

    let nonce = decode_field("iv", &wire.iv)?;
    if !SUPPORTED_NONCE_LENGTHS.contains(&nonce.len()) {
        return Err(QrSealError::Malformed(format!(
            "iv is {} bytes, expected one of {SUPPORTED_NONCE_LENGTHS:?}",
            nonce.len()
        )));
    }

    let ciphertext = decode_field("ciphertext", &wire.ciphertext)?;
    let tag = match &wire.tag {
        Some(encoded) => {
            let tag = decode_field("tag", encoded)?;
            if tag.len() != TAG_SIZE {
                return Err(QrSealError::Malformed(format!(
                    "tag is {} bytes, expected {TAG_SIZE}",
                    tag.len()
                )));
            }
            if ciphertext.is_empty() {
                return Err(QrSealError::Malformed("ciphertext is empty".into()));
            }
            Some(tag)
        }
        None => {
            if ciphertext.len() <= TAG_SIZE {
                return Err(QrSealError::Malformed(format!(
                    "ciphertext with appended tag must exceed {TAG_SIZE} bytes, got {}",
                    ciphertext.len()
                )));
            }
            None
        }
    };

    Ok(EncryptedPayload {
        version: wire.version,
        algorithm,
        kdf,
        salt,
        nonce,
        ciphertext,
        tag,
        decoy_text: wire.disguise,
    })
}

/// Cheap structural check: a JSON object carrying every mandatory key.
///
/// Never errors; anything else (URLs, plain text, other JSON) is `false`.
pub fn is_encrypted_payload(raw: &str) -> bool {
    parse_object(raw).is_some_and(|o| MANDATORY_FIELDS.iter().all(|k| o.contains_key(*k)))
}

/// Password-free metadata for a scanned string. Decodes no binary field.
pub fn inspect(raw: &str) -> PayloadInfo {
    let byte_size = raw.len();
    let object = parse_object(raw)
        .filter(|o| MANDATORY_FIELDS.iter().all(|k| o.contains_key(*k)));

    match object {
        Some(o) => {
            let text = |k: &str| o.get(k).and_then(Value::as_str).map(str::to_string);
            PayloadInfo {
                is_encrypted: true,
                version: text("version"),
                algorithm: text("algorithm"),
                decoy_text: text("disguise"),
                byte_size,
            }
        }
        None => PayloadInfo {
            is_encrypted: false,
            version: None,
            algorithm: None,
            decoy_text: None,
            byte_size,
        },
    }
}

/// Exact serialized size of `payload` in bytes. A payload that cannot be
/// serialized is an error, never a size of zero.
pub fn estimate_serialized_size(payload: &EncryptedPayload) -> QrSealResult<usize> {
    serialize(payload).map(|s| s.len())
}

/// Serialized size a plaintext of `plaintext_len` bytes will have once
/// sealed with `config` and `decoy_text`, computed without running the KDF.
pub fn estimate_sealed_size(
    plaintext_len: usize,
    decoy_text: &str,
    config: &EncryptionConfig,
) -> QrSealResult<usize> {
    let placeholder = EncryptedPayload {
        version: PAYLOAD_VERSION.to_string(),
        algorithm: config.algorithm,
        kdf: Some(config.kdf_params()),
        salt: vec![0u8; config.salt_length],
        nonce: vec![0u8; config.nonce_length],
        ciphertext: vec![0u8; plaintext_len],
        tag: Some(vec![0u8; TAG_SIZE]),
        decoy_text: decoy_text.to_string(),
    };
    estimate_serialized_size(&placeholder)
}

fn parse_object(raw: &str) -> Option<Map<String, Value>> {
    if !raw.trim_start().starts_with('{') {
        return None;
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(o)) => Some(o),
        _ => None,
    }
}

fn string_field<'a>(object: &'a Map<String, Value>, key: &str) -> QrSealResult<&'a str> {
    match object.get(key) {
        Some(Value::String(s)) => Ok(s.as_str()),
        Some(_) => Err(QrSealError::Malformed(format!("field '{key}' is not a string"))),
        None => Err(QrSealError::Malformed(format!("missing field '{key}'"))),
    }
}

fn kdf_params(wire: &WirePayload) -> QrSealResult<Option<KdfParams>> {
    let Some(name) = &wire.kdf else {
        if wire.iterations.is_some() || wire.memory_kib.is_some() || wire.parallelism.is_some() {
            return Err(QrSealError::Malformed(
                "KDF cost parameters given without 'kdf'".into(),
            ));
        }
        return Ok(None);
    };

    let algorithm = KdfAlgorithm::from_id(name)
        .ok_or_else(|| QrSealError::Malformed(format!("unknown kdf '{name}'")))?;
    let iterations = wire
        .iterations
        .ok_or_else(|| QrSealError::Malformed("missing field 'iterations'".into()))?;

    let params = match algorithm {
        KdfAlgorithm::Pbkdf2Sha256 => KdfParams {
            algorithm,
            iterations,
            memory_kib: wire.memory_kib.unwrap_or(0),
            parallelism: wire.parallelism.unwrap_or(1),
        },
        KdfAlgorithm::Argon2id => KdfParams {
            algorithm,
            iterations,
            memory_kib: wire
                .memory_kib
                .ok_or_else(|| QrSealError::Malformed("missing field 'memoryKib'".into()))?,
            parallelism: wire
                .parallelism
                .ok_or_else(|| QrSealError::Malformed("missing field 'parallelism'".into()))?,
        },
    };

    validate_kdf_params(&params).map_err(|e| match e {
        QrSealError::Validation(msg) => QrSealError::Malformed(msg),
        other => other,
    })?;
    Ok(Some(params))
}

fn decode_field(name: &str, encoded: &str) -> QrSealResult<Vec<u8>> {
    STANDARD
        .decode(encoded)
        .map_err(|_| QrSealError::Malformed(format!("field '{name}' is not valid base64")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> EncryptedPayload {
        EncryptedPayload {
            version: PAYLOAD_VERSION.to_string(),
            algorithm: CipherAlgorithm::Aes256Gcm,
            kdf: Some(EncryptionConfig::argon2id().kdf_params()),
            salt: vec![1u8; 32],
            nonce: vec![2u8; 12],
            ciphertext: vec![3u8; 20],
            tag: Some(vec![4u8; 16]),
            decoy_text: "欢迎访问我们的官方网站".to_string(),
        }
    }

    fn sample_json() -> Value {
        serde_json::from_str(&serialize(&sample()).unwrap()).unwrap()
    }

    #[test]
    fn test_serialize_roundtrip() {
        let raw = serialize(&sample()).unwrap();
        assert_eq!(deserialize(&raw).unwrap(), sample());
    }

    #[test]
    fn test_version_is_first_field() {
        let raw = serialize(&sample()).unwrap();
        assert!(raw.starts_with(r#"{"version":"1.0","algorithm":"AES-256-GCM""#));
    }

    #[test]
    fn test_minimal_payload_without_optional_fields() {
        let raw = r#"{"version":"1.0","algorithm":"AES-256-GCM",
            "salt":"AAAAAAAAAAAAAAAAAAAAAA==","iv":"AAAAAAAAAAAAAAAA",
            "ciphertext":"AAAAAAAAAAAAAAAAAAAAAAAA","disguise":"hi"}"#;
        let payload = deserialize(raw).unwrap();
        assert_eq!(payload.kdf, None);
        assert_eq!(payload.tag, None);
        assert_eq!(payload.salt.len(), 16);
        assert_eq!(payload.nonce.len(), 12);
        assert_eq!(payload.ciphertext.len(), 18);
    }

    #[test]
    fn test_not_json_is_malformed() {
        assert!(matches!(deserialize("hello"), Err(QrSealError::Malformed(_))));
        assert!(matches!(
            deserialize("https://example.com"),
            Err(QrSealError::Malformed(_))
        ));
        assert!(matches!(deserialize("[1,2]"), Err(QrSealError::Malformed(_))));
    }

    #[test]
    fn test_missing_fields_are_malformed() {
        for field in MANDATORY_FIELDS.iter().filter(|f| **f != "version") {
            let mut json = sample_json();
            json.as_object_mut().unwrap().remove(*field);
            let result = deserialize(&json.to_string());
            assert!(
                matches!(result, Err(QrSealError::Malformed(_))),
                "missing {field} must be malformed, got {result:?}"
            );
        }
        let mut json = sample_json();
        json.as_object_mut().unwrap().remove("version");
        assert!(matches!(
            deserialize(&json.to_string()),
            Err(QrSealError::Malformed(_))
        ));
    }

    #[test]
    fn test_unknown_version_checked_before_binary_fields() {
        let raw = r#"{"version":"2.0","algorithm":"AES-256-GCM",
            "salt":"!!not base64!!","iv":7,"ciphertext":null,"disguise":"x"}"#;
        assert_eq!(
            deserialize(raw).unwrap_err(),
            QrSealError::UnsupportedVersion("2.0".into())
        );
    }

    #[test]
    fn test_unknown_algorithm_checked_before_binary_fields() {
        let raw = r#"{"version":"1.0","algorithm":"ChaCha20-Poly1305",
            "salt":"!!not base64!!","iv":"%%","ciphertext":"??","disguise":"x"}"#;
        assert_eq!(
            deserialize(raw).unwrap_err(),
            QrSealError::UnsupportedAlgorithm("ChaCha20-Poly1305".into())
        );
    }

    #[test]
    fn test_bad_base64_is_malformed() {
        let mut json = sample_json();
        json["salt"] = Value::String("not*base64".into());
        assert!(matches!(
            deserialize(&json.to_string()),
            Err(QrSealError::Malformed(_))
        ));
    }

    #[test]
    fn test_short_fields_are_malformed() {
        let mut short_salt = sample();
        short_salt.salt = vec![0u8; 15];
        let mut short_iv = sample();
        short_iv.nonce = vec![0u8; 8];
        let mut empty_ct = sample();
        empty_ct.ciphertext = Vec::new();
        let mut short_tag = sample();
        short_tag.tag = Some(vec![0u8; 12]);
        let mut appended_too_short = sample();
        appended_too_short.tag = None;
        appended_too_short.ciphertext = vec![0u8; 16];

        for payload in [short_salt, short_iv, empty_ct, short_tag, appended_too_short] {
            let raw = serialize(&payload).unwrap();
            assert!(
                matches!(deserialize(&raw), Err(QrSealError::Malformed(_))),
                "{payload:?} must be malformed"
            );
        }
    }

    #[test]
    fn test_wrong_field_type_is_malformed() {
        let mut json = sample_json();
        json["disguise"] = Value::from(42);
        assert!(matches!(
            deserialize(&json.to_string()),
            Err(QrSealError::Malformed(_))
        ));
    }

    #[test]
    fn test_hostile_kdf_cost_is_malformed() {
        let mut json = sample_json();
        json["memoryKib"] = Value::from(u32::MAX);
        assert!(matches!(
            deserialize(&json.to_string()),
            Err(QrSealError::Malformed(_))
        ));

        let mut json = sample_json();
        json["kdf"] = Value::String("bcrypt".into());
        assert!(matches!(
            deserialize(&json.to_string()),
            Err(QrSealError::Malformed(_))
        ));

        let mut json = sample_json();
        json.as_object_mut().unwrap().remove("kdf");
        assert!(matches!(
            deserialize(&json.to_string()),
            Err(QrSealError::Malformed(_))
        ));
    }

    #[test]
    fn test_is_encrypted_payload() {
        assert!(is_encrypted_payload(&serialize(&sample()).unwrap()));
        assert!(!is_encrypted_payload("WIFI:S:cafe;T:WPA;P:pass;;"));
        assert!(!is_encrypted_payload(r#"{"version":"1.0"}"#));
        assert!(!is_encrypted_payload("{not json"));
        assert!(!is_encrypted_payload(""));
    }

    #[test]
    fn test_is_encrypted_payload_is_structural_only() {
        // unsupported version still has the shape
        let mut json = sample_json();
        json["version"] = Value::String("9.9".into());
        assert!(is_encrypted_payload(&json.to_string()));
    }

    #[test]
    fn test_inspect() {
        let raw = serialize(&sample()).unwrap();
        let info = inspect(&raw);
        assert!(info.is_encrypted);
        assert_eq!(info.version.as_deref(), Some("1.0"));
        assert_eq!(info.algorithm.as_deref(), Some("AES-256-GCM"));
        assert_eq!(info.decoy_text.as_deref(), Some("欢迎访问我们的官方网站"));
        assert_eq!(info.byte_size, raw.len());

        let plain = inspect("just some text");
        assert!(!plain.is_encrypted);
        assert_eq!(plain.decoy_text, None);
        assert_eq!(plain.byte_size, 14);
    }

    #[test]
    fn test_estimate_sealed_size_is_exact() {
        let config = EncryptionConfig::argon2id();
        let decoy = "Scan to view today's menu";
        let payload = EncryptedPayload {
            version: PAYLOAD_VERSION.to_string(),
            algorithm: config.algorithm,
            kdf: Some(config.kdf_params()),
            salt: vec![0x5Au8; config.salt_length],
            nonce: vec![0xA5u8; config.nonce_length],
            ciphertext: vec![0xFFu8; 37],
            tag: Some(vec![0x11u8; TAG_SIZE]),
            decoy_text: decoy.to_string(),
        };
        assert_eq!(
            estimate_sealed_size(37, decoy, &config).unwrap(),
            estimate_serialized_size(&payload).unwrap()
        );
    }

    #[test]
    fn test_size_estimates_report_real_lengths() {
        let config = EncryptionConfig::pbkdf2();
        let payload = EncryptedPayload {
            version: PAYLOAD_VERSION.to_string(),
            algorithm: config.algorithm,
            kdf: None,
            salt: vec![1u8; config.salt_length],
            nonce: vec![2u8; config.nonce_length],
            ciphertext: vec![3u8; 5],
            tag: None,
            decoy_text: String::new(),
        };
        let size = estimate_serialized_size(&payload).unwrap();
        assert!(size > 0);
        assert_eq!(size, serialize(&payload).unwrap().len());

        let empty = estimate_sealed_size(0, "", &config).unwrap();
        assert!(empty > 0, "even an empty body has a JSON envelope");
    }

    mod proptest_suite {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn deserialize_never_panics(raw in ".{0,256}") {
                let _ = deserialize(&raw);
                let _ = is_encrypted_payload(&raw);
                let _ = inspect(&raw);
            }

            #[test]
            fn serialized_size_matches_estimate(len in 1usize..2048, decoy in "\\PC{0,40}") {
                let config = EncryptionConfig::pbkdf2();
                let payload = EncryptedPayload {
                    version: PAYLOAD_VERSION.to_string(),
                    algorithm: config.algorithm,
                    kdf: Some(config.kdf_params()),
                    salt: vec![9u8; config.salt_length],
                    nonce: vec![8u8; config.nonce_length],
                    ciphertext: vec![7u8; len],
                    tag: Some(vec![6u8; TAG_SIZE]),
                    decoy_text: decoy.clone(),
                };
                prop_assert_eq!(
                    estimate_sealed_size(len, &decoy, &config).unwrap(),
                    serialize(&payload).unwrap().len()
                );
            }
        }
    }
}
