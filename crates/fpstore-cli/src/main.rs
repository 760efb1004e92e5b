//! fpstore - fingerprint database administration
//!
//! Usage:
//!   fpstore [--config config.toml] setup
//!   fpstore reset --yes
//!   fpstore import song.json
//!   fpstore match clip.json --top 5

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::TryStreamExt;
use fpstore_cli::input::{self, SongImport};
use fpstore_cli::output::{print_json, tally};
use fpstore_db::{FingerprintDatabase, Song, StoreConfig};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "fpstore")]
#[command(about = "Store audio fingerprints and match clips against them", long_about = None)]
struct Args {
    /// Path to configuration file (TOML)
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create missing tables and purge interrupted imports
    Setup,
    /// Drop and recreate all tables
    Reset {
        /// Confirm that all data should be destroyed
        #[arg(long)]
        yes: bool,
    },
    /// Delete songs that were never fully fingerprinted
    Purge,
    /// Print song and fingerprint counts
    Stats,
    /// List fingerprinted songs
    Songs,
    /// Import a song's fingerprints from a JSON file
    Import { file: PathBuf },
    /// Match a clip's hashes from a JSON file
    Match {
        file: PathBuf,
        /// Number of alignments to print
        #[arg(long, default_value = "5")]
        top: usize,
    },
}

#[derive(Serialize)]
struct Stats {
    songs: i64,
    fingerprints: i64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let config = StoreConfig::load(&args.config)
        .with_context(|| format!("Failed to load configuration {}", args.config.display()))?;
    let db = FingerprintDatabase::open(&config)
        .await
        .context("Failed to open fingerprint database")?;

    match args.command {
        Command::Setup => {
            db.setup().await?;
            log::info!("Database ready");
        }
        Command::Reset { yes } => {
            if !yes {
                anyhow::bail!("Refusing to reset without --yes");
            }
            db.reset_all().await?;
            log::info!("Database reset");
        }
        Command::Purge => {
            let purged = db.purge_abandoned_songs().await?;
            println!("{}", purged);
        }
        Command::Stats => {
            let stats = Stats {
                songs: db.count_fingerprinted_songs().await?,
                fingerprints: db.count_fingerprints().await?,
            };
            print_json(&stats);
        }
        Command::Songs => {
            let songs: Vec<Song> = db.fingerprinted_songs().try_collect().await?;
            print_json(&songs);
        }
        Command::Import { file } => import_song(&db, &file).await?,
        Command::Match { file, top } => match_clip(&db, &file, top).await?,
    }

    Ok(())
}

async fn import_song(db: &FingerprintDatabase, path: &Path) -> Result<()> {
    let song = SongImport::load(path)?;
    log::info!(
        "Importing {:?} ({} fingerprints)",
        song.name,
        song.fingerprints.len()
    );

    let song_id = db
        .register_song(&song.name, &song.file_sha1)
        .await
        .with_context(|| format!("Failed to register {:?}", song.name))?;

    let written = db
        .insert_fingerprints(song_id, song.pairs())
        .await
        .with_context(|| format!("Failed to store fingerprints for {:?}", song.name))?;

    // The fingerprints are durable either way; the next setup purges the song
    // if it stays pending
    if let Err(e) = db.mark_fingerprinted(song_id).await {
        log::warn!("Could not mark song {} as fingerprinted: {}", song_id, e);
    }

    log::info!("Stored {} fingerprints for song {}", written, song_id);
    println!("{}", song_id);
    Ok(())
}

async fn match_clip(db: &FingerprintDatabase, path: &Path, top: usize) -> Result<()> {
    let query = input::load_query(path)?;
    log::info!("Matching {} hashes from {}", query.len(), path.display());

    let matches = db
        .collect_matches(query.iter().map(|q| (q.hash.as_str(), q.offset)))
        .await?;
    log::info!("{} raw hits", matches.len());

    print_json(&tally(&matches, top));
    Ok(())
}
