///
/// This module implements the CLI interface for font-library: command parsing,
/// store selection, and the user-visible summary of a run.
///
/// All pipeline logic (download, scan, upload, rollback) lives in the
/// [`font-library-core`] crate. This module only wires it together.
///
/// ## Commands
/// - `drive`: mirror the configured Google Drive folder, then upload its files
/// - `local`: scan a local folder tree for font files, then upload them
/// - `files`: upload an explicit list of files
///
/// Every command accepts `--dry-run`, which checks existence against the site
/// (when credentials are available) but writes nothing.
///
/// [`font-library-core`]: ../../font-library-core/
use crate::frappe::FrappeClient;
use crate::load_config::{load_config, load_credentials, CliConfig};
use anyhow::Result;
use clap::{Parser, Subcommand};
use font_library_core::contract::{Downloader, FontStore};
use font_library_core::download::DriveDownloader;
use font_library_core::memory::{DryRunStore, MemoryStore};
use font_library_core::scan::{list_files, scan_fonts};
use font_library_core::uploader::{upload_directory, upload_files, UploadReport};
use std::path::PathBuf;

/// CLI for font-library: bulk-create Font Library records from font files.
#[derive(Parser)]
#[clap(
    name = "font-library",
    version,
    about = "Upload font files from a Google Drive folder or a local directory into a Font Library doctype"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Download a shared Google Drive folder and upload every file in it
    Drive {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Folder link to use instead of drive.folder_url
        #[clap(long)]
        folder_url: Option<String>,
        /// Check existence but do not write anything
        #[clap(long)]
        dry_run: bool,
    },
    /// Recursively scan a local folder and upload every font file found
    Local {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Folder to scan instead of local.fonts_path
        #[clap(long)]
        path: Option<PathBuf>,
        /// Check existence but do not write anything
        #[clap(long)]
        dry_run: bool,
    },
    /// Upload the given files
    Files {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Check existence but do not write anything
        #[clap(long)]
        dry_run: bool,
        #[clap(required = true)]
        paths: Vec<PathBuf>,
    },
}

fn build_store(config: &CliConfig, dry_run: bool) -> Result<Box<dyn FontStore>> {
    let credentials = load_credentials();
    let store: Box<dyn FontStore> = match (dry_run, credentials) {
        (false, Ok(creds)) => Box::new(FrappeClient::new(
            &config.site.url,
            &creds,
            config.library.clone(),
        )?),
        (false, Err(e)) => return Err(e),
        (true, Ok(creds)) => Box::new(DryRunStore::new(FrappeClient::new(
            &config.site.url,
            &creds,
            config.library.clone(),
        )?)),
        (true, Err(_)) => {
            tracing::warn!("No credentials for dry run, existence checks only see this run");
            Box::new(DryRunStore::new(MemoryStore::new()))
        }
    };
    Ok(store)
}

fn print_report(report: &UploadReport, dry_run: bool) {
    if dry_run {
        println!("Dry run: nothing was written.");
    }
    for font in &report.uploaded {
        println!("Uploaded and linked: {} -> {}", font.font_name, font.file_url);
    }
    for skip in &report.skipped {
        println!(
            "Skipping {}: record already exists ({})",
            skip.font_name, skip.existing_record
        );
    }
    for failed in &report.failed {
        println!("Error processing {}: {}", failed.path.display(), failed.error);
        if !failed.rolled_back {
            println!("  rollback incomplete, a partial record may remain");
        }
    }
    println!(
        "All files processed: {} uploaded, {} skipped, {} failed.",
        report.uploaded.len(),
        report.skipped.len(),
        report.failed.len()
    );
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Drive {
            config,
            folder_url,
            dry_run,
        } => {
            let config = load_config(config)?;
            let store = build_store(&config, dry_run)?;
            let folder_url = folder_url.unwrap_or_else(|| config.drive.folder_url.clone());
            tracing::info!(command = "drive", folder_url = %folder_url, "Starting drive upload");

            let downloader = DriveDownloader::new();
            let folder = downloader
                .download_folder(&folder_url)
                .await
                .map_err(|e| anyhow::anyhow!("Could not create download directory: {e}"))?;
            let on_disk = list_files(folder.path())?.len();
            if on_disk == 0 {
                println!("No files downloaded. Please check Drive link or permissions.");
                anyhow::bail!("no files downloaded from {folder_url}");
            }
            println!("Found {on_disk} files to upload.");

            let report = upload_directory(store.as_ref(), &config.library, folder.path()).await?;
            print_report(&report, dry_run);
            tracing::info!(command = "drive", "Drive upload complete");
            Ok(())
        }
        Commands::Local {
            config,
            path,
            dry_run,
        } => {
            let config = load_config(config)?;
            let store = build_store(&config, dry_run)?;
            let root = path.unwrap_or_else(|| config.local.fonts_path.clone());
            tracing::info!(command = "local", root = %root.display(), "Starting local upload");

            println!("Scanning folder: {}", root.display());
            let files = scan_fonts(&root, &config.library.valid_extensions);
            println!("Found {} font files to process.", files.len());

            let report = upload_files(store.as_ref(), &config.library, &files).await;
            print_report(&report, dry_run);
            tracing::info!(command = "local", "Local upload complete");
            Ok(())
        }
        Commands::Files {
            config,
            dry_run,
            paths,
        } => {
            let config = load_config(config)?;
            let store = build_store(&config, dry_run)?;
            tracing::info!(command = "files", count = paths.len(), "Starting file upload");

            let report = upload_files(store.as_ref(), &config.library, &paths).await;
            print_report(&report, dry_run);
            Ok(())
        }
    }
}
