//! Keygen command handler.

use toolgate_session::{ENCRYPTION_KEY_ENV, EncryptionKey};

/// Print a fresh encryption key in `.env` form.
///
/// Needs no context: the key is what a context is later built from.
pub fn execute() {
    println!("{ENCRYPTION_KEY_ENV}={}", EncryptionKey::generate().to_base64());
}
