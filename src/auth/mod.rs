//! Credential hashing and account authentication.

mod hasher;
mod service;


pub use hasher::{CredentialError, CredentialHasher, SALT_LEN};
pub use service::{AuthError, AuthResult, AuthService, MIN_PASSWORD_LEN, NewRegistration};
