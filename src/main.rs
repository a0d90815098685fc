use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task::LocalSet;
use tracing::warn;

mod client;
mod config;
mod error;
mod models;
mod normalize;
mod page;
mod relay;
mod render;
mod resolve;
mod watch;

use client::RatingsClient;
use config::Settings;
use models::FetchOutcome;
use page::PageDocument;
use watch::{Enricher, MutationBatch, MutationWatcher, WatchMode};

#[derive(Parser)]
#[command(name = "prof-ratings")]
#[command(about = "Enrich course-search results with professor ratings", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enrich a saved results page in one pass
    Enrich {
        #[arg(long)]
        input: PathBuf,
        #[arg(long, default_value = "enriched.html")]
        out: PathBuf,
        #[arg(long)]
        institution: Option<String>,
        #[arg(long)]
        page_url: Option<String>,
    },
    /// Follow a results page file and enrich content as it is appended
    Watch {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long, default_value_t = 500)]
        poll_ms: u64,
        #[arg(long)]
        institution: Option<String>,
        #[arg(long)]
        page_url: Option<String>,
    },
    /// Look up a single instructor name and print the outcome
    Lookup {
        name: String,
        #[arg(long)]
        institution: Option<String>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Enrich {
            input,
            out,
            institution,
            page_url,
        } => {
            if skip_inactive_page(page_url.as_deref()) {
                return Ok(());
            }
            let settings = Settings::from_env(institution)?;
            let html = std::fs::read_to_string(&input)
                .with_context(|| format!("failed to read {}", input.display()))?;

            let doc = Rc::new(RefCell::new(PageDocument::new()));
            doc.borrow_mut().insert_fragment(html);
            let mut watcher = MutationWatcher::new(
                Rc::clone(&doc),
                Rc::new(build_enricher(&settings)),
                WatchMode::OneShot,
            );

            let (tx, rx) = mpsc::unbounded_channel();
            drop(tx);
            let local = LocalSet::new();
            local.run_until(watcher.start(rx)).await;
            local.await;

            let (total, enriched) = {
                let doc = doc.borrow();
                (doc.cell_count(), doc.enriched_count())
            };
            std::fs::write(&out, doc.borrow().to_html())
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!(
                "Enriched {enriched} of {total} instructor rows; wrote {}.",
                out.display()
            );
        }
        Commands::Watch {
            input,
            out,
            poll_ms,
            institution,
            page_url,
        } => {
            if skip_inactive_page(page_url.as_deref()) {
                return Ok(());
            }
            let settings = Settings::from_env(institution)?;
            let doc = Rc::new(RefCell::new(PageDocument::new()));
            let mut watcher = MutationWatcher::new(
                Rc::clone(&doc),
                Rc::new(build_enricher(&settings)),
                WatchMode::Continuous,
            );

            let (tx, rx) = mpsc::unbounded_channel();
            let local = LocalSet::new();
            local
                .run_until(async {
                    let feeder = tokio::task::spawn_local(follow_file(
                        input.clone(),
                        Duration::from_millis(poll_ms.max(1)),
                        Rc::clone(&doc),
                        tx,
                    ));
                    watcher.start(rx).await;
                    let _ = feeder.await;
                })
                .await;
            local.await;

            let (total, enriched) = {
                let doc = doc.borrow();
                (doc.cell_count(), doc.enriched_count())
            };
            if let Some(out) = out {
                std::fs::write(&out, doc.borrow().to_html())
                    .with_context(|| format!("failed to write {}", out.display()))?;
                println!(
                    "Enriched {enriched} of {total} instructor rows; wrote {}.",
                    out.display()
                );
            } else {
                println!("Enriched {enriched} of {total} instructor rows.");
            }
        }
        Commands::Lookup { name, institution } => {
            let settings = Settings::from_env(institution)?;
            let Some(canonical) = normalize::canonical_name(&name) else {
                println!("No usable name in {name:?}.");
                return Ok(());
            };
            let client = RatingsClient::new(Rc::new(relay::Relay::new(
                settings.proxy_url.clone(),
                settings.api_token.clone(),
            )));

            match client.fetch(&canonical).await {
                FetchOutcome::Success(records) => {
                    println!("{} candidate(s) for {}:", records.len(), canonical.query());
                    for record in &records {
                        let rating = record
                            .avg_rating
                            .map(|r| format!("{r:.1}"))
                            .unwrap_or_else(|| "N/A".to_string());
                        println!(
                            "- {} ({}) rating {}",
                            record.full_name(),
                            record.school.name,
                            rating
                        );
                    }
                    match resolve::resolve(&records, &settings.institution) {
                        Some(record) => println!(
                            "Matched {} at {}.",
                            record.full_name(),
                            settings.institution
                        ),
                        None => println!("No candidate at {}.", settings.institution),
                    }
                }
                FetchOutcome::NotFound => {
                    println!("No professor found for {}.", canonical.query())
                }
                FetchOutcome::TransportError(detail) => println!("Boundary unreachable: {detail}"),
                FetchOutcome::ServiceError { status, detail } => {
                    println!("Service error {status}: {detail}")
                }
            }
        }
    }

    Ok(())
}

fn build_enricher(settings: &Settings) -> Enricher {
    let relay = Rc::new(relay::Relay::new(
        settings.proxy_url.clone(),
        settings.api_token.clone(),
    ));
    Enricher {
        client: RatingsClient::new(relay),
        institution: settings.institution.clone(),
    }
}

fn skip_inactive_page(page_url: Option<&str>) -> bool {
    match page_url {
        Some(url) if !config::is_results_page(url) => {
            println!("Not a class-search results page; nothing to enrich.");
            true
        }
        _ => false,
    }
}

/// Tails the input file; every chunk of appended markup becomes one
/// mutation batch. Ends on ctrl-c, closing the watcher's channel.
async fn follow_file(
    path: PathBuf,
    poll: Duration,
    doc: Rc<RefCell<PageDocument>>,
    batches: UnboundedSender<MutationBatch>,
) {
    let mut offset = 0usize;
    let mut ticker = tokio::time::interval(poll);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match read_appended(&path, &mut offset) {
                    Ok(Some(chunk)) => {
                        let subtree = doc.borrow_mut().insert_fragment(chunk);
                        if batches.send(vec![subtree]).is_err() {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(err) => warn!("poll of {} failed: {err}", path.display()),
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
}

fn read_appended(path: &Path, offset: &mut usize) -> std::io::Result<Option<String>> {
    let bytes = std::fs::read(path)?;
    if bytes.len() < *offset {
        // truncated and rewritten; treat the whole file as new content
        *offset = 0;
    }
    if bytes.len() == *offset {
        return Ok(None);
    }
    let chunk = String::from_utf8_lossy(&bytes[*offset..]).into_owned();
    *offset = bytes.len();
    Ok(Some(chunk))
}
