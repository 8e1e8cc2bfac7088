//! Keygen command implementation.

use std::path::PathBuf;

use anyhow::{bail, Result};
use colored::Colorize;
use tracing::info;

use crate::utils::KeyFile;

/// Execute the keygen command.
pub fn execute(output: PathBuf, quiet: bool) -> Result<()> {
    if output.exists() {
        bail!(
            "Refusing to overwrite existing key file: {}",
            output.display()
        );
    }

    let key_file = KeyFile::generate();
    key_file.save(&output)?;

    info!(path = %output.display(), key_id = %key_file.key_id, "Keypair generated");

    if !quiet {
        println!();
        println!("{}", "Ed25519 keypair generated!".green().bold());
        println!();
        println!("   {} {}", "Key file:".dimmed(), output.display());
        println!("   {} {}", "Key id:".dimmed(), key_file.key_id);
        println!();
        println!(
            "{}",
            "Keep this file private: it contains the signing key. Share only \
             the keyId and publicKey fields with verifiers."
                .yellow()
        );
    }

    Ok(())
}
