use aes_gcm::{ aead::{ Aead, AeadCore, KeyInit, OsRng }, Aes256Gcm, Nonce };

use crate::error::{ AppError, Result };

const NONCE_LEN: usize = 12;

/// AES-256-GCM at-rest encryption for credential fields.
///
/// Ciphertexts are hex encoded as `nonce || ciphertext`.
pub struct Encryptor {
    cipher: Aes256Gcm,
}

impl Encryptor {
    pub fn new(key: &[u8]) -> Result<Self> {
        if key.len() != 32 {
            return Err(AppError::Encryption("Encryption key must be 32 bytes".to_string()));
        }

        let cipher = Aes256Gcm::new_from_slice(key).map_err(|e|
            AppError::Encryption(e.to_string())
        )?;

        Ok(Self { cipher })
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

        let ciphertext = self.cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| AppError::Encryption(e.to_string()))?;

        let mut combined = nonce.to_vec();
        combined.extend_from_slice(&ciphertext);

        Ok(hex::encode(combined))
    }

    pub fn decrypt(&self, encrypted_hex: &str) -> Result<String> {
        let combined = hex
            ::decode(encrypted_hex.trim())
            .map_err(|e| AppError::Encryption(format!("Invalid hex: {}", e)))?;

        if combined.len() < NONCE_LEN {
            return Err(AppError::Encryption("Encrypted data too short".to_string()));
        }

        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext = self.cipher
            .decrypt(nonce, ciphertext)
            .map_err(|e| AppError::Encryption(e.to_string()))?;

        String::from_utf8(plaintext).map_err(|e|
            AppError::Encryption(format!("Invalid UTF-8: {}", e))
        )
    }
}
