//! # Secret store library
//!
//! Abstraction over the secret store used by the rotation worker, with a
//! Google Secret Manager implementation.
//!
//! The store is the source of truth for a secret's identity and labels, and
//! the destination for rotated material. Writes always append a new version;
//! history is never mutated, which keeps redelivered rotations safe.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use secret_store::{GoogleSecretManagerFactory, SecretStoreFactory};
//!
//! let factory = GoogleSecretManagerFactory::new(auth);
//! let store = factory.open()?;
//! let record = store.get_secret("projects/p/secrets/s").await?;
//! ```

mod error;
mod google;
mod store;

pub use error::SecretStoreError;
pub use google::{GoogleSecretManager, GoogleSecretManagerFactory};
pub use store::{SecretRecord, SecretStore, SecretStoreFactory};
