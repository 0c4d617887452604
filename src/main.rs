//! disctool - tag and organize audio files with Discogs release metadata
//!
//! Release data is cached in a local SQLite database so that repeated runs do
//! not hit the Discogs API.

use anyhow::{bail, Context};
use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use disctool::cache::CacheKey;
use disctool::cli::{CacheCommand, Cli, Command, RenameArgs};
use disctool::collection::read_collection;
use disctool::config::Config;
use disctool::files::{collect_audio_files, organize, OrganizeOutcome};
use disctool::session::Session;
use disctool::tags::{LoftyTags, TagField, TagStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over -v
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_filter().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = Config::from_env();
    if let Some(dir) = &cli.data_dir {
        config = config.with_data_dir(dir);
    }
    info!(data_dir = %config.data_dir.display(), "Configuration loaded");

    let mut session = Session::open(config).context("Failed to open cache")?;
    let result = run(&mut session, cli.command).await;
    finish(result, session.close())
}

/// Combines the command's outcome with closing the cache; the command's own
/// error takes precedence
fn finish<E>(result: anyhow::Result<()>, closed: Result<(), E>) -> anyhow::Result<()>
where
    E: std::error::Error + Send + Sync + 'static,
{
    match (result, closed) {
        (Err(e), Err(close)) => {
            warn!(error = %close, "Failed to close cache");
            Err(e)
        }
        (Err(e), Ok(())) => Err(e),
        (Ok(()), Err(close)) => Err(anyhow::Error::new(close).context("Failed to close cache")),
        (Ok(()), Ok(())) => Ok(()),
    }
}

/// Executes one subcommand against an open session
async fn run(session: &mut Session, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Auth => {
            session.authorize().await?;
            println!("Authorization saved");
        }
        Command::Show { release_id } => {
            let release = session.release(release_id).await?;
            println!("{release}");
            for track in release.tracks() {
                println!("  {:>2}. {}", track.number(), track);
            }
        }
        Command::Tag { release_id, files } => {
            let release = session.release(release_id).await?;
            if files.len() != release.total_tracks() {
                warn!(
                    files = files.len(),
                    tracks = release.total_tracks(),
                    "File count does not match the release"
                );
            }
            for (index, path) in files.iter().enumerate() {
                let mut tags = LoftyTags::open(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                session
                    .tag(&mut tags, &release, index)
                    .await
                    .with_context(|| format!("Failed to tag {}", path.display()))?;
                for field in TagField::ALL {
                    if let Some(value) = tags.get_field(field) {
                        debug!(path = %path.display(), %field, value = %value, "Wrote tag");
                    }
                }
                println!("{}: {}", path.display(), release.track(index)?);
            }
        }
        Command::Retag { paths } => {
            let mut failed = 0;
            for path in collect_audio_files(&paths)? {
                if let Err(e) = session.retag_file(&path).await {
                    warn!(path = %path.display(), error = %e, "Retag failed");
                    failed += 1;
                }
            }
            if failed > 0 {
                bail!("{failed} file(s) could not be retagged");
            }
        }
        Command::Rename(args) => rename(&args)?,
        Command::Collection { csv, fetch } => {
            for item in read_collection(&csv)? {
                println!("{}", serde_json::to_string(&item)?);
                if fetch {
                    match session.release(item.release_id).await {
                        Ok(release) => info!(release = item.release_id, "{release}"),
                        Err(e) => warn!(release = item.release_id, error = %e, "Fetch failed"),
                    }
                }
            }
        }
        Command::Stats {
            release_id,
            max_age,
        } => {
            let max_age = max_age.unwrap_or(session.config().max_age_days);
            let record = session.stats(release_id, max_age).await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Command::Cache(CacheCommand::Get { release_id }) => {
            let key = CacheKey::Release(release_id);
            let Some(cached) = session.cache().get(&key)? else {
                bail!("{key} is not cached");
            };
            eprintln!("{key} last updated {}", cached.last_update);
            println!("{}", serde_json::to_string_pretty(&cached.payload)?);
        }
        Command::Cache(CacheCommand::Delete { release_id }) => {
            let key = CacheKey::Release(release_id);
            session.cache().delete(&key)?;
            println!("Deleted {key}");
        }
    }
    Ok(())
}

/// Copies or moves every audio file under the given paths
fn rename(args: &RenameArgs) -> anyhow::Result<()> {
    let options = args.options()?;
    for path in collect_audio_files(&args.paths)? {
        let tags = LoftyTags::open(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        match organize(&path, &tags, &options)? {
            OrganizeOutcome::Copied(target)
            | OrganizeOutcome::Moved(target)
            | OrganizeOutcome::DryRun(target) => {
                println!("{} --> {}", path.display(), target.display());
            }
            OrganizeOutcome::Unchanged(_) | OrganizeOutcome::NoGenre => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    fn close_error() -> Result<(), io::Error> {
        Err(io::Error::other("database is locked"))
    }

    #[test]
    fn test_command_error_wins_over_close_error() {
        let err = finish(Err(anyhow::anyhow!("release-1 is not cached")), close_error()).unwrap_err();
        assert_eq!(err.to_string(), "release-1 is not cached");
    }

    #[test]
    fn test_close_error_reported_after_success() {
        let err = finish(Ok(()), close_error()).unwrap_err();
        assert_eq!(err.to_string(), "Failed to close cache");
        assert_eq!(err.root_cause().to_string(), "database is locked");
    }

    #[test]
    fn test_clean_finish() {
        assert!(finish(Ok(()), Ok::<(), io::Error>(())).is_ok());
    }
}
