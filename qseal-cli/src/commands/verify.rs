//! Verify command implementation.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use tracing::{debug, error, info};

use qseal_core::{
    AttestationData, ImageHashProvider, KeyResolver, StaticKeyResolver, VerificationChecks,
    VerificationEngine, VerificationOutcome, VerificationSession, VerifyFailure,
};

use crate::remote::HttpKeyResolver;
use crate::utils::{parse_region, KeyFile};

#[derive(Args)]
pub struct VerifyArgs {
    /// Path to the image to verify
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Verify offline against a key file (private key not required)
    #[arg(long, value_name = "KEY_FILE", conflicts_with = "server")]
    pub public_key: Option<PathBuf>,

    /// Resolve the signing key through a remote key service
    #[arg(long, value_name = "URL")]
    pub server: Option<String>,

    /// Manual-assist QR search region as "X,Y,WIDTH,HEIGHT" in pixels
    #[arg(long, value_name = "RECT")]
    pub region: Option<String>,
}

/// Execute the verify command.
pub async fn execute(args: VerifyArgs, quiet: bool) -> Result<()> {
    let content = std::fs::read(&args.file)
        .with_context(|| format!("Failed to read file: {}", args.file.display()))?;

    info!(path = %args.file.display(), bytes = content.len(), "Read file");

    let mut session = VerificationSession::new(content);
    if let Some(region) = &args.region {
        session = session.with_region(parse_region(region)?);
    }

    let outcome = match (&args.public_key, &args.server) {
        (Some(key_path), None) => {
            let key_file = KeyFile::load(key_path)?;
            debug!(key_id = %key_file.key_id, "Verifying against local key file");
            let resolver = StaticKeyResolver::single(key_file.key_id.clone(), key_file.verifying_key()?);
            run_engine(session, resolver).await
        }
        (None, Some(server)) => {
            debug!(server = %server, "Resolving signing key remotely");
            run_engine(session, HttpKeyResolver::new(server.clone())).await
        }
        _ => bail!("provide either --public-key for offline verification or --server"),
    };

    report(&outcome, quiet)
}

async fn run_engine<R: KeyResolver>(
    session: VerificationSession,
    resolver: R,
) -> VerificationOutcome {
    VerificationEngine::new(ImageHashProvider, resolver)
        .verify(session)
        .await
}

fn report(outcome: &VerificationOutcome, quiet: bool) -> Result<()> {
    match outcome {
        VerificationOutcome::Verified { attestation, checks } if checks.signature_valid => {
            info!(
                identity = %attestation.identity.identifier,
                key_id = %attestation.service.key_id,
                "Verification successful"
            );
            if !quiet {
                print_banner("VERIFIED", true);
                print_checks(checks);
                print_attestation(attestation);
                println!();
                println!("   {}", outcome.message());
            }
            Ok(())
        }
        VerificationOutcome::Verified { checks, .. } => {
            error!("Content matches but the signature could not be authenticated");
            if !quiet {
                print_banner("UNPROVEN", false);
                print_checks(checks);
                println!();
                println!("   {}", outcome.message());
            }
            bail!("Verification failed: {}", outcome.message())
        }
        VerificationOutcome::Modified { attestation, checks } => {
            error!(
                identity = %attestation.identity.identifier,
                signature_valid = checks.signature_valid,
                "Document has been modified since sealing"
            );
            if !quiet {
                print_banner("MODIFIED", false);
                print_checks(checks);
                print_attestation(attestation);
                println!();
                println!("   {}", outcome.message());
            }
            bail!("Verification failed: document has been modified since sealing")
        }
        VerificationOutcome::HashMismatch { attestation, checks } => {
            error!(
                identity = %attestation.identity.identifier,
                signature_valid = checks.signature_valid,
                "Document content does not match the sealed version"
            );
            if !quiet {
                print_banner("TAMPERED", false);
                print_checks(checks);
                print_attestation(attestation);
                println!();
                println!("   {}", outcome.message());
            }
            bail!("Verification failed: document content has been altered")
        }
        VerificationOutcome::Error { kind, message } => {
            error!(kind = kind.as_str(), %message, "Verification could not complete");
            if !quiet {
                print_banner("ERROR", false);
                println!("   {} {}", "Reason:".dimmed(), message);
                println!("   {} {}", "Advice:".dimmed(), kind.advice());
            }
            match kind {
                VerifyFailure::MissingData => bail!(
                    "Verification failed: {}; the document may not be sealed at all",
                    message
                ),
                VerifyFailure::NetworkError => {
                    bail!("network connectivity failure: {}", message)
                }
                VerifyFailure::ServerError => {
                    bail!("verification backend unavailable: {}", message)
                }
            }
        }
    }
}

fn print_banner(label: &str, ok: bool) {
    let top = "╔════════════════════════════════════════╗";
    let bottom = "╚════════════════════════════════════════╝";
    let line = format!("║{:^40}║", label);
    println!();
    if ok {
        println!("{}", top.green());
        println!("{}", line.green().bold());
        println!("{}", bottom.green());
    } else {
        println!("{}", top.red());
        println!("{}", line.red().bold());
        println!("{}", bottom.red());
    }
    println!();
}

fn print_checks(checks: &VerificationChecks) {
    let mark = |ok: bool| {
        if ok {
            "pass".green()
        } else {
            "FAIL".red()
        }
    };
    println!(
        "   {} {}",
        "Cryptographic hash:".dimmed(),
        mark(checks.cryptographic_match)
    );
    println!(
        "   {} {}",
        "Perceptual match:".dimmed(),
        mark(checks.perceptual_match)
    );
    println!(
        "   {} {}",
        "Signature:".dimmed(),
        mark(checks.signature_valid)
    );
}

fn print_attestation(attestation: &AttestationData) {
    println!(
        "   {} {} ({})",
        "Sealed by:".dimmed(),
        attestation.identity.identifier,
        attestation.identity.provider
    );
    println!(
        "   {} {}",
        "Sealed at:".dimmed(),
        attestation.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!(
        "   {} {} / {}",
        "Service:".dimmed(),
        attestation.service.name,
        attestation.service.key_id
    );
    if let Some(url) = &attestation.user_url {
        println!("   {} {}", "URL:".dimmed(), url);
    }
}
