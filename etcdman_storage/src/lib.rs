pub mod cipher;
pub mod errors;
pub mod profile;
pub mod store;
pub mod validation;

// re‑export ergonomic entry points
pub use cipher::VaultKey;
pub use errors::VaultError;
pub use profile::{ConnectionProfile, ConnectionStatus, ProfileUpdate};
pub use store::ConnectionVault;
