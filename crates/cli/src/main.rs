//! `certgen`: generate participation certificates from the command line.
//!
//! ```text
//! certgen batch  --job job.json --roster people.csv --out ./out [--batch-size N] [--config cfg.json]
//! certgen single --job job.json --roster people.csv --participant u42 --out ./out
//! ```
//!
//! Set `RUST_LOG` to control verbosity (defaults to `info`).

mod job;

use anyhow::{bail, Context, Result};
use certgen_core::{
    parse_roster, ArchivePackager, BatchOptions, BatchOrchestrator, CancellationToken,
    GenerationResult, GeneratorConfig, Participant,
};
use clap::{Args, Parser, Subcommand};
use job::Job;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "Generate participation certificates from a roster")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate certificates for everyone in the roster and write one ZIP archive
    Batch {
        #[command(flatten)]
        common: CommonArgs,

        /// Certificates composed concurrently per chunk (defaults by roster size)
        #[arg(long)]
        batch_size: Option<usize>,
    },
    /// Generate one participant's certificate as a PDF
    Single {
        #[command(flatten)]
        common: CommonArgs,

        /// Id of the participant in the roster
        #[arg(short, long)]
        participant: String,
    },
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// Job file describing the event, organisation and template
    #[arg(short, long)]
    job: PathBuf,

    /// Roster CSV with id/name (and optional email) columns
    #[arg(short, long)]
    roster: PathBuf,

    /// Output directory
    #[arg(short, long, default_value = ".")]
    out: PathBuf,

    /// Optional generator configuration (JSON, partial files allowed)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    if std::env::var_os("RUST_LOG").is_none() {
        std::env::set_var("RUST_LOG", "info");
    }
    certgen_core::init_logging();

    let cli = Cli::parse();
    match cli.command {
        Command::Batch { common, batch_size } => run_batch(&common, batch_size).await,
        Command::Single {
            common,
            participant,
        } => run_single(&common, &participant).await,
    }
}

fn load_config(path: Option<&Path>) -> Result<GeneratorConfig> {
    match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            Ok(GeneratorConfig::from_json(&text)?)
        }
        None => Ok(GeneratorConfig::default()),
    }
}

fn load_roster(path: &Path) -> Result<Vec<Participant>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading roster {}", path.display()))?;
    let parsed = parse_roster(&text)?;
    for issue in &parsed.issues {
        warn!("Roster {}: skipped {}", path.display(), issue);
    }
    if parsed.participants.is_empty() {
        bail!("roster {} has no usable participants", path.display());
    }
    info!(
        "Loaded {} participant(s) from {}",
        parsed.participants.len(),
        path.display()
    );
    Ok(parsed.participants)
}

async fn run_batch(args: &CommonArgs, batch_size: Option<usize>) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let (job, base) = Job::load(&args.job)?;
    let template = job.template.into_template(&base)?;
    let participants = load_roster(&args.roster)?;
    std::fs::create_dir_all(&args.out)
        .with_context(|| format!("creating {}", args.out.display()))?;

    let orchestrator = BatchOrchestrator::new(config)?;
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current chunk");
            on_interrupt.cancel();
        }
    });

    let mut options = BatchOptions::default().with_cancel(cancel);
    if let Some(size) = batch_size {
        options = options.with_batch_size(size);
    }

    let output = orchestrator
        .run(
            &participants,
            &job.event,
            &job.org,
            &template,
            options,
            |progress| {
                info!(
                    "[{:>3.0}%] {}/{} {}",
                    progress.percentage,
                    progress.completed,
                    progress.total,
                    progress.current_participant.as_deref().unwrap_or_default()
                );
            },
        )
        .await?;

    let path = args.out.join(&output.archive.file_name);
    std::fs::write(&path, &output.archive.bytes)
        .with_context(|| format!("writing {}", path.display()))?;

    for failed in &output.failed {
        warn!(
            "No certificate for {} ({}): {}",
            failed.participant_name, failed.participant_id, failed.error
        );
    }
    println!(
        "Wrote {} ({} succeeded, {} failed, {:.2?})",
        path.display(),
        output.succeeded,
        output.failed.len(),
        output.total_duration
    );
    Ok(())
}

async fn run_single(args: &CommonArgs, participant_id: &str) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let (job, base) = Job::load(&args.job)?;
    let template = job.template.into_template(&base)?;
    let participants = load_roster(&args.roster)?;
    let Some(participant) = participants.iter().find(|p| p.id == participant_id) else {
        bail!(
            "participant '{}' not found in {}",
            participant_id,
            args.roster.display()
        );
    };
    std::fs::create_dir_all(&args.out)
        .with_context(|| format!("creating {}", args.out.display()))?;

    let packager = ArchivePackager::new(config.archive.clone());
    let orchestrator = BatchOrchestrator::new(config)?;
    let pdf = orchestrator
        .generate_single(participant, &job.event, &job.org, &template)
        .await?;

    let result = GenerationResult::success(participant, pdf);
    let path = args.out.join(packager.entry_name(&result));
    if let Ok(bytes) = &result.outcome {
        std::fs::write(&path, bytes).with_context(|| format!("writing {}", path.display()))?;
    }
    println!("Wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use tempfile::TempDir;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_batch_arguments() {
        let cli = Cli::try_parse_from([
            "certgen", "batch", "--job", "job.json", "--roster", "people.csv", "--out", "out",
            "--batch-size", "7",
        ])
        .unwrap();
        match cli.command {
            Command::Batch { common, batch_size } => {
                assert_eq!(common.job, PathBuf::from("job.json"));
                assert_eq!(common.out, PathBuf::from("out"));
                assert_eq!(batch_size, Some(7));
                assert!(common.config.is_none());
            }
            _ => panic!("Expected Batch"),
        }
    }

    #[test]
    fn test_single_requires_participant() {
        let result =
            Cli::try_parse_from(["certgen", "single", "--job", "j.json", "--roster", "r.csv"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_partial_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cfg.json");
        std::fs::write(&path, r#"{ "batch": { "batch_size": 3 } }"#).unwrap();
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.batch.batch_size, Some(3));
        assert!(load_config(None).is_ok());
    }

    #[test]
    fn test_load_roster_rejects_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("people.csv");
        std::fs::write(&path, "id,name\n,\n").unwrap();
        assert!(load_roster(&path).is_err());

        std::fs::write(&path, "id,name\nu1,John Doe\n").unwrap();
        assert_eq!(load_roster(&path).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_single_writes_pdf() {
        let dir = TempDir::new().unwrap();
        let job = dir.path().join("job.json");
        std::fs::write(
            &job,
            r#"{
                "event": { "id": "e1", "title": "Workshop", "date": "2025-01-02", "location": "Online" },
                "org": { "name": "Guild" },
                "template": { "name_box": { "x": 100, "y": 300, "width": 900, "height": 120 } }
            }"#,
        )
        .unwrap();
        let roster = dir.path().join("people.csv");
        std::fs::write(&roster, "id,name\nu1,John Doe\n").unwrap();
        let out = dir.path().join("out");

        let args = CommonArgs {
            job,
            roster,
            out: out.clone(),
            config: None,
        };
        run_single(&args, "u1").await.unwrap();

        let pdf = std::fs::read(out.join("certificate-john-doe-u1.pdf")).unwrap();
        assert!(pdf.starts_with(b"%PDF-"));
        assert!(run_single(&args, "nobody").await.is_err());
    }

    #[tokio::test]
    async fn test_batch_writes_archive() {
        let dir = TempDir::new().unwrap();
        let job = dir.path().join("job.json");
        std::fs::write(
            &job,
            r#"{
                "event": { "id": "e1", "title": "Workshop", "date": "2025-01-02", "location": "Online" },
                "org": { "name": "Guild" },
                "template": { "name_box": { "x": 100, "y": 300, "width": 900, "height": 120 } }
            }"#,
        )
        .unwrap();
        let roster = dir.path().join("people.csv");
        std::fs::write(&roster, "id,name\nu1,John Doe\nu2,Ana Lima\n").unwrap();
        let out = dir.path().join("out");

        let args = CommonArgs {
            job,
            roster,
            out: out.clone(),
            config: None,
        };
        run_batch(&args, Some(1)).await.unwrap();

        let archives: Vec<_> = std::fs::read_dir(&out)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|x| x == "zip"))
            .collect();
        assert_eq!(archives.len(), 1);
        let name = archives[0].file_name().to_string_lossy().into_owned();
        assert!(name.starts_with("certificates-workshop-"));
    }
}
