use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use engine::keywords::{KeywordIndex, KeywordParams};
use engine::similarity::{SimilarityIndex, SimilarityParams};
use engine::score::SECONDS_PER_DAY;
use engine::{Index, ItemId, Timestamp, Token};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, EnvFilter};

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One line of the ingestion stream.
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Event {
    Add {
        id: ItemId,
        tokens: Vec<Token>,
        timestamp: Timestamp,
    },
    Delete {
        id: ItemId,
    },
    AddSpecial {
        id: ItemId,
        tokens: Vec<Token>,
        timestamp: Timestamp,
    },
    DeleteSpecial {
        id: ItemId,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
struct Config {
    similarity: SimilarityParams,
    keywords: KeywordParams,
    /// Sweep when the collection spans more than this many days.
    trigger_days: i64,
    /// Records younger than this many days survive a sweep.
    keep_days: i64,
    /// Flush dirty records every this many events.
    flush_every: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            similarity: SimilarityParams::default(),
            keywords: KeywordParams::default(),
            trigger_days: 45,
            keep_days: 30,
            flush_every: 100,
        }
    }
}

/// Per-flush marker next to the shard trees, for operator inspection.
#[derive(Debug, Serialize)]
struct MetaFile {
    num_topics: usize,
    num_special_topics: usize,
    flushed_at: String,
}

#[derive(Parser)]
#[command(name = "ingestor")]
#[command(about = "Apply thread events to the related-discussion index", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply a JSONL event stream (file, or '-' for stdin) to the
    /// persisted index
    Run {
        /// Event stream path
        #[arg(long)]
        events: String,
        /// Root directory for the persisted index
        #[arg(long, default_value = "./data")]
        data_dir: PathBuf,
        /// JSON config file; defaults apply when omitted
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Score ad-hoc tokens against the persisted collection without
    /// mutating it
    Probe {
        /// Root directory for the persisted index
        #[arg(long, default_value = "./data")]
        data_dir: PathBuf,
        /// JSON config file; defaults apply when omitted
        #[arg(long)]
        config: Option<PathBuf>,
        /// Tokens to score
        tokens: Vec<Token>,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            events,
            data_dir,
            config,
        } => run(&events, &data_dir, load_config(config.as_deref())?),
        Commands::Probe {
            data_dir,
            config,
            tokens,
        } => probe(&data_dir, load_config(config.as_deref())?, &tokens),
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => {
            let body = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_str(&body)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => Config::default(),
    };
    config.similarity.validate()?;
    anyhow::ensure!(config.flush_every > 0, "flush_every must be positive");
    Ok(config)
}

fn topics_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("topics")
}

fn specials_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("specials")
}

fn run(events: &str, data_dir: &Path, config: Config) -> Result<()> {
    let similarity = Arc::new(RwLock::new(SimilarityIndex::new(config.similarity.clone())));
    similarity.write().load(&topics_dir(data_dir))?;
    let mut keywords = KeywordIndex::new(config.keywords.clone(), similarity.clone());
    keywords.load(&specials_dir(data_dir))?;

    let reader: Box<dyn BufRead> = if events == "-" {
        Box::new(BufReader::new(io::stdin()))
    } else {
        Box::new(BufReader::new(
            File::open(events).with_context(|| format!("opening event stream {events}"))?,
        ))
    };

    let mut applied = 0usize;
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let event: Event = match serde_json::from_str(&line) {
            Ok(event) => event,
            Err(err) => {
                tracing::error!(line = line_no + 1, error = %err, "skipping malformed event");
                continue;
            }
        };
        apply_event(event, &similarity, &mut keywords, &config);
        applied += 1;
        if applied % config.flush_every == 0 {
            flush(data_dir, &similarity, &mut keywords)?;
        }
    }
    flush(data_dir, &similarity, &mut keywords)?;
    tracing::info!(applied, "event stream drained");
    Ok(())
}

fn apply_event(
    event: Event,
    similarity: &Arc<RwLock<SimilarityIndex>>,
    keywords: &mut KeywordIndex,
    config: &Config,
) {
    match event {
        Event::Add {
            id,
            tokens,
            timestamp,
        } => {
            // Re-adding an id is a full content replacement: tear the
            // old record out cleanly before indexing the new one.
            if similarity.read().contains(id) {
                keywords.update_on_delete_topic(id);
                similarity.write().delete(id);
            }
            similarity.write().add(id, tokens.clone(), timestamp);
            keywords.update_on_new_topic(id, &tokens, timestamp);
            sweep_if_due(similarity, keywords, config);
        }
        Event::Delete { id } => {
            keywords.update_on_delete_topic(id);
            similarity.write().delete(id);
        }
        Event::AddSpecial {
            id,
            tokens,
            timestamp,
        } => {
            if keywords.get(id).is_some() {
                keywords.delete(id);
            }
            keywords.add(id, tokens, timestamp);
        }
        Event::DeleteSpecial { id } => keywords.delete(id),
    }
}

/// Retention: once the collection spans more than `trigger_days`,
/// drop everything older than `keep_days` before the newest record.
fn sweep_if_due(
    similarity: &Arc<RwLock<SimilarityIndex>>,
    keywords: &mut KeywordIndex,
    config: &Config,
) {
    let span = {
        let guard = similarity.read();
        match (guard.oldest_timestamp(), guard.latest_timestamp()) {
            (Some(oldest), Some(latest)) => Some((latest - oldest, latest)),
            _ => None,
        }
    };
    let Some((span, latest)) = span else { return };
    let day = SECONDS_PER_DAY as Timestamp;
    if span <= config.trigger_days * day {
        return;
    }
    let cutoff = latest - config.keep_days * day;
    let removed = similarity.write().remove_before(cutoff);
    for id in &removed {
        keywords.update_on_delete_topic(*id);
    }
    tracing::info!(removed = removed.len(), cutoff, "retention sweep finished");
}

fn flush(
    data_dir: &Path,
    similarity: &Arc<RwLock<SimilarityIndex>>,
    keywords: &mut KeywordIndex,
) -> Result<()> {
    let topics_written = similarity.write().save(&topics_dir(data_dir))?;
    let specials_written = keywords.save(&specials_dir(data_dir))?;

    let meta = MetaFile {
        num_topics: similarity.read().len(),
        num_special_topics: keywords.len(),
        flushed_at: time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_default(),
    };
    fs::write(
        data_dir.join("meta.json"),
        serde_json::to_vec_pretty(&meta)?,
    )?;
    tracing::info!(topics_written, specials_written, "flush complete");
    Ok(())
}

fn probe(data_dir: &Path, config: Config, tokens: &[Token]) -> Result<()> {
    let mut similarity = SimilarityIndex::new(config.similarity);
    similarity.load(&topics_dir(data_dir))?;
    let hits = similarity.find_most_similar(tokens);

    #[derive(Serialize)]
    struct Hit {
        topic_id: ItemId,
        score: f64,
    }
    let hits: Vec<Hit> = hits
        .iter()
        .map(|(topic_id, score)| Hit { topic_id, score })
        .collect();
    println!("{}", serde_json::to_string_pretty(&hits)?);
    Ok(())
}
