use std::sync::Arc;

use crate::db::entity::api_key;
use crate::enums::AssetKind;
use crate::error::{ AppError, Result };
use crate::exchange::ExchangeKeys;

use super::Encryptor;

/// Plaintext view of a credential, held only for the duration of one pipeline run.
#[derive(Debug, Clone)]
pub struct UnlockedCredential {
    pub keys: ExchangeKeys,
    pub asset: AssetKind,
    pub wallet_address: String,
}

/// Decrypt-on-demand access to credential secrets. Plaintext is never written back.
pub struct CredentialVault {
    encryptor: Arc<Encryptor>,
}

impl CredentialVault {
    pub fn new(encryptor: Arc<Encryptor>) -> Self {
        Self { encryptor }
    }

    /// Decrypt the exchange key pair only.
    pub fn open_keys(&self, credential: &api_key::Model) -> Result<ExchangeKeys> {
        let access_key = self.reveal(&credential.access_key, "access key")?;
        let secret_key = self.reveal(&credential.secret_key, "secret key")?;

        Ok(ExchangeKeys::new(access_key, secret_key))
    }

    /// Decrypt the key pair plus the destination address for the configured asset.
    pub fn unlock(&self, credential: &api_key::Model) -> Result<UnlockedCredential> {
        let asset: AssetKind = credential.cryptocurrency_type.parse()?;

        let encrypted_address = match asset {
            AssetKind::Base => credential.btc_wallet_address.as_deref(),
            AssetKind::Alt => credential.eth_wallet_address.as_deref(),
        };

        let encrypted_address = encrypted_address.ok_or_else(||
            AppError::Credential(format!("No {} wallet address configured", asset))
        )?;

        let wallet_address = self.reveal(encrypted_address, "wallet address")?;
        let keys = self.open_keys(credential)?;

        Ok(UnlockedCredential { keys, asset, wallet_address })
    }

    fn reveal(&self, ciphertext: &str, field: &str) -> Result<String> {
        let plaintext = self.encryptor
            .decrypt(ciphertext)
            .map_err(|e| AppError::Credential(format!("Failed to decrypt {}: {}", field, e)))?;

        if plaintext.trim().is_empty() {
            return Err(AppError::Credential(format!("Decrypted {} is empty", field)));
        }

        Ok(plaintext)
    }
}
