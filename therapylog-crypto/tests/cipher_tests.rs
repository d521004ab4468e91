use serde::{Deserialize, Serialize};
use therapylog_crypto::{
    decrypt, decrypt_json, encrypt, encrypt_json, generate_random_key, CryptoError, Envelope,
};

#[test]
fn encrypt_decrypt_roundtrip() {
    let key = generate_random_key();
    let plaintext = b"Hello, World!";
    let encrypted = encrypt(&key, plaintext).unwrap();
    let decrypted = decrypt(&key, &encrypted).unwrap();
    assert_eq!(decrypted, plaintext);
}

#[test]
fn encrypt_decrypt_empty() {
    let key = generate_random_key();
    let encrypted = encrypt(&key, b"").unwrap();
    let decrypted = decrypt(&key, &encrypted).unwrap();
    assert_eq!(decrypted, b"");
}

#[test]
fn wrong_key_fails_decryption() {
    let key1 = generate_random_key();
    let key2 = generate_random_key();
    let encrypted = encrypt(&key1, b"Secret").unwrap();
    assert!(matches!(
        decrypt(&key2, &encrypted),
        Err(CryptoError::Decryption(_))
    ));
}

#[test]
fn every_flipped_ciphertext_byte_is_detected() {
    let key = generate_random_key();
    let encrypted = encrypt(&key, b"session note").unwrap();
    for pos in 0..encrypted.ciphertext.len() {
        let mut tampered = encrypted.clone();
        tampered.ciphertext[pos] ^= 0x01;
        assert!(
            matches!(decrypt(&key, &tampered), Err(CryptoError::Decryption(_))),
            "flip at {pos} went undetected"
        );
    }
}

#[test]
fn truncated_ciphertext_fails() {
    let key = generate_random_key();
    let mut encrypted = encrypt(&key, b"Secret").unwrap();
    encrypted.ciphertext.truncate(4);
    assert!(decrypt(&key, &encrypted).is_err());
}

#[test]
fn same_plaintext_produces_different_envelopes() {
    let key = generate_random_key();
    let e1 = encrypt(&key, b"Same").unwrap();
    let e2 = encrypt(&key, b"Same").unwrap();
    assert_ne!(e1.nonce, e2.nonce);
    assert_ne!(e1, e2);
}

// ── Envelope ─────────────────────────────────────────────────────

#[test]
fn envelope_ciphertext_carries_tag() {
    let key = generate_random_key();
    let encrypted = encrypt(&key, b"test").unwrap();
    assert_eq!(encrypted.ciphertext.len(), 4 + 16);
}

#[test]
fn envelope_from_parts_checks_nonce_length() {
    assert!(matches!(
        Envelope::from_parts(&[0u8; 8], vec![1, 2, 3]),
        Err(CryptoError::InvalidNonceLength {
            expected: 12,
            actual: 8
        })
    ));
    assert!(Envelope::from_parts(&[0u8; 12], vec![1, 2, 3]).is_ok());
}

#[test]
fn envelope_serializes_as_base64() {
    let envelope = Envelope::from_parts(&[0u8; 12], vec![0xff, 0xfe]).unwrap();
    let json = serde_json::to_value(&envelope).unwrap();
    assert_eq!(json["nonce"], "AAAAAAAAAAAAAAAA");
    assert_eq!(json["ciphertext"], "//4=");
    let back: Envelope = serde_json::from_value(json).unwrap();
    assert_eq!(back, envelope);
}

#[test]
fn envelope_with_short_nonce_fails_to_deserialize() {
    let json = serde_json::json!({ "nonce": "AAAA", "ciphertext": "AAAA" });
    assert!(serde_json::from_value::<Envelope>(json).is_err());
}

// ── JSON records ─────────────────────────────────────────────────

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Note {
    id: String,
    body: String,
}

#[test]
fn json_record_roundtrip() {
    let key = generate_random_key();
    let note = Note {
        id: "20240101-01".into(),
        body: "記錄 notes".into(),
    };
    let envelope = encrypt_json(&key, &note).unwrap();
    let back: Note = decrypt_json(&key, &envelope).unwrap();
    assert_eq!(back, note);
}

#[test]
fn json_ciphertext_does_not_contain_plaintext() {
    let key = generate_random_key();
    let note = Note {
        id: "x".into(),
        body: "very-recognizable-plaintext".into(),
    };
    let envelope = encrypt_json(&key, &note).unwrap();
    let needle = b"very-recognizable-plaintext";
    assert!(!envelope
        .ciphertext
        .windows(needle.len())
        .any(|w| w == needle));
}
