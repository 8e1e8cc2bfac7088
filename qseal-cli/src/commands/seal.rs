//! Seal command implementation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tracing::{debug, info};

use qseal_core::{
    AttestationSigner, IdentityBlock, ImageHashProvider, LocalSigner, SealPipeline, SealPlacement,
    SealSession,
};

use crate::remote::RemoteSigner;
use crate::utils::{build_sealed_path, KeyFile};

/// Service name stamped into locally signed attestations.
const LOCAL_SERVICE_NAME: &str = "qs";

#[derive(Args)]
pub struct SealArgs {
    /// Path to the image to seal (PNG, JPEG, GIF or WebP)
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Identity provider code (for example "g" for Google, "email")
    #[arg(long)]
    pub provider: String,

    /// Identity identifier, typically an email address
    #[arg(long)]
    pub identifier: String,

    /// Horizontal seal position as a percentage of image width
    #[arg(long, default_value_t = 90.0)]
    pub x_pct: f64,

    /// Vertical seal position as a percentage of image height
    #[arg(long, default_value_t = 90.0)]
    pub y_pct: f64,

    /// Seal size as a percentage of the smaller image dimension
    #[arg(long, default_value_t = 20.0)]
    pub size_pct: f64,

    /// Optional URL to embed alongside the attestation
    #[arg(long)]
    pub url: Option<String>,

    /// Sign locally with a key file generated by `qseal keygen`
    #[arg(long, value_name = "KEY_FILE", conflicts_with = "server")]
    pub key: Option<PathBuf>,

    /// Sign through a remote signing service
    #[arg(long, value_name = "URL", requires = "token")]
    pub server: Option<String>,

    /// Bearer token for the remote signing service
    #[arg(long)]
    pub token: Option<String>,

    /// Output path (defaults to <FILE>.sealed.png)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Execute the seal command.
pub async fn execute(args: SealArgs, quiet: bool) -> Result<()> {
    let content = std::fs::read(&args.file)
        .with_context(|| format!("Failed to read file: {}", args.file.display()))?;

    info!(path = %args.file.display(), bytes = content.len(), "Read file");

    let placement = SealPlacement::new(args.x_pct, args.y_pct, args.size_pct);
    let identity = IdentityBlock {
        provider: args.provider.clone(),
        identifier: args.identifier.clone(),
    };
    let mut session = SealSession::new(content, placement, identity);
    if let Some(url) = &args.url {
        session = session.with_user_url(url.clone());
    }

    let sealed = match (&args.key, &args.server) {
        (Some(key_path), None) => {
            let key_file = KeyFile::load(key_path)?;
            debug!(key_id = %key_file.key_id, "Signing locally");
            let signer = LocalSigner::new(
                LOCAL_SERVICE_NAME,
                key_file.key_id.clone(),
                key_file.signing_key()?,
            );
            run_pipeline(session, signer).await?
        }
        (None, Some(server)) => {
            // clap guarantees token is present when server is
            let token = args.token.clone().unwrap_or_default();
            debug!(server = %server, "Signing through remote service");
            let signer = RemoteSigner::new(server.clone(), token);
            run_pipeline(session, signer).await?
        }
        _ => anyhow::bail!("provide either --key for local signing or --server with --token"),
    };

    let output = args.output.unwrap_or_else(|| build_sealed_path(&args.file));
    std::fs::write(&output, &sealed.image_png)
        .with_context(|| format!("Failed to write sealed image: {}", output.display()))?;

    info!(
        path = %output.display(),
        key_id = %sealed.attestation.service.key_id,
        payload_len = sealed.payload.len(),
        "Document sealed"
    );

    if !quiet {
        println!();
        println!("{}", "Document sealed!".green().bold());
        println!();
        println!("   {} {}", "Sealed image:".dimmed(), output.display());
        println!(
            "   {} {}",
            "Signing key:".dimmed(),
            sealed.attestation.service.key_id
        );
        println!(
            "   {} {}",
            "Content hash:".dimmed(),
            &sealed.attestation.hashes.cryptographic[..16]
        );
        println!(
            "   {} {}x{} at ({}, {})",
            "Seal area:".dimmed(),
            sealed.geometry.exclusion.width,
            sealed.geometry.exclusion.height,
            sealed.geometry.exclusion.x,
            sealed.geometry.exclusion.y
        );
        println!(
            "   {} {} characters",
            "QR payload:".dimmed(),
            sealed.payload.len()
        );
    }

    Ok(())
}

async fn run_pipeline<S: AttestationSigner>(
    session: SealSession,
    signer: S,
) -> Result<qseal_core::SealedDocument> {
    SealPipeline::new(ImageHashProvider, signer)
        .seal(session)
        .await
        .map_err(Into::into)
}
