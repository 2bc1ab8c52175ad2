//! Trigger signing key commands.
//!
//! # Usage
//!
//! ```bash
//! postaction keys generate > trigger-key.pem
//! ```
//!
//! The server reads the key from `POSTACTION_SIGNING_KEY`. Every replica of a
//! deployment must share one key, otherwise trigger ids minted by one replica
//! fail verification on another.

use postaction_server::trigger::StaticSigningKey;
use secrecy::ExposeSecret;
use tracing::info;

/// Print a freshly generated P-256 key as PKCS#8 PEM.
///
/// # Errors
///
/// Returns an error if the key cannot be encoded.
pub fn generate() -> Result<(), Box<dyn std::error::Error>> {
    let pem = StaticSigningKey::generate().to_pem()?;

    #[allow(clippy::print_stdout)]
    {
        print!("{}", pem.expose_secret());
    }

    info!("Generated trigger signing key");
    Ok(())
}
