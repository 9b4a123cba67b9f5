mod encryption;
mod vault;

pub use encryption::Encryptor;
pub use vault::{ CredentialVault, UnlockedCredential };
