//! Credential storage implementations.

pub mod file;
pub mod keyring;
pub mod memory;
pub mod trait_def;

// Re-exports
pub use file::FileCredentialStore;
pub use memory::MemoryCredentialStore;
pub use trait_def::CredentialStore;

#[cfg(feature = "system-keyring")]
pub use keyring::KeyringCredentialStore;
