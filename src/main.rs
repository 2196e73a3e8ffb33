use album_recommender::config::{AppConfig, CliConfig, FileConfig};
use album_recommender::evaluation::{EvaluationReport, EvaluationSettings, HoldoutEvaluator};
use album_recommender::recommender::{RankingSignal, Recommendation, Recommender, TrainingOutcome};
use album_recommender::store::{CatalogSeed, GenreId, ItemId, RecommenderStore, UserId};
use album_recommender::SqliteRecommenderStore;
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn parse_path(s: &str) -> Result<PathBuf> {
    let original_path = PathBuf::from(s);
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
#[command(name = "recommender", about = "Hybrid album recommender")]
struct CliArgs {
    /// Path to a TOML config file. Values found there override the flags.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Path to the SQLite database file. Created if missing.
    #[clap(long, value_parser = parse_path)]
    pub db: Option<PathBuf>,

    /// Number of recommendations when a command does not ask for a count.
    #[clap(long)]
    pub top_k: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Loads genres and albums from a JSON catalog file.
    ImportCatalog {
        #[clap(value_parser = parse_path)]
        path: PathBuf,
    },

    /// Registers a user with the genres they like, most liked first.
    CreateUser {
        #[clap(long)]
        name: Option<String>,

        /// Comma separated genre ids.
        #[clap(long, value_delimiter = ',')]
        genres: Vec<GenreId>,
    },

    /// Records a purchase and retrains the similarity model.
    Purchase { user_id: UserId, item_id: ItemId },

    /// Shows recommendations for a user.
    Recommend {
        user_id: UserId,

        #[clap(short)]
        k: Option<usize>,

        /// Print JSON instead of text.
        #[clap(long)]
        json: bool,
    },

    /// Rebuilds the item-item similarity model.
    Train,

    /// Runs the temporal hold-out evaluation.
    Evaluate {
        /// Share of each user's most recent purchases held out.
        #[clap(long, default_value_t = 0.2)]
        test_proportion: f64,

        /// Minimum number of purchases for a user to be evaluated.
        #[clap(long, default_value_t = 5)]
        min_history: usize,

        #[clap(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    let file_config = match &cli_args.config {
        Some(path) => Some(FileConfig::load(path)?),
        None => None,
    };
    let config = AppConfig::resolve(
        &CliConfig {
            db_path: cli_args.db.clone(),
            top_k: cli_args.top_k,
        },
        file_config,
    )?;

    info!("Opening SQLite database at {:?}...", config.db_path);
    let store = Arc::new(SqliteRecommenderStore::new(&config.db_path)?);
    let recommender = Recommender::new(store, config.recommender.clone());

    if !matches!(cli_args.command, Command::ImportCatalog { .. } | Command::Train) {
        if let Err(e) = recommender.train() {
            error!("Startup training failed: {}", e);
        }
    }

    match cli_args.command {
        Command::ImportCatalog { path } => import_catalog(&recommender, &path),
        Command::CreateUser { name, genres } => {
            let user_id = recommender.create_user(name, genres)?;
            println!("{}", user_id);
            Ok(())
        }
        Command::Purchase { user_id, item_id } => {
            if !recommender.record_purchase(user_id, item_id) {
                bail!(
                    "Could not record purchase of item {} by user {}",
                    item_id,
                    user_id
                );
            }
            println!("Recorded purchase of item {} by user {}", item_id, user_id);
            Ok(())
        }
        Command::Recommend { user_id, k, json } => {
            if !recommender.user_exists(user_id)? {
                bail!("Unknown user id {}", user_id);
            }
            let k = k.unwrap_or(recommender.settings().default_top_k);
            let recommendations = recommender.recommend(user_id, k);
            if json {
                println!("{}", serde_json::to_string_pretty(&recommendations)?);
            } else {
                print_recommendations(user_id, &recommendations);
            }
            Ok(())
        }
        Command::Train => {
            match recommender.train()? {
                TrainingOutcome::Skipped => println!("No purchases, model left unchanged"),
                TrainingOutcome::Trained(report) => println!(
                    "Model v{}: {} pairs over {} items and {} users",
                    report.model_version, report.pairs, report.items, report.users
                ),
            }
            Ok(())
        }
        Command::Evaluate {
            test_proportion,
            min_history,
            json,
        } => {
            let report = HoldoutEvaluator::new(
                &recommender,
                EvaluationSettings {
                    test_proportion,
                    min_history,
                },
            )
            .run()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
            Ok(())
        }
    }
}

fn import_catalog(recommender: &Recommender, path: &Path) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read catalog file: {:?}", path))?;
    let seed: CatalogSeed = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse catalog file: {:?}", path))?;
    let imported = recommender.store().import_catalog(&seed)?;
    println!(
        "Imported {} genres and {} items",
        seed.genres.len(),
        imported
    );
    Ok(())
}

fn print_recommendations(user_id: UserId, recommendations: &[Recommendation]) {
    if recommendations.is_empty() {
        println!("No recommendations for user {}", user_id);
        return;
    }
    for (rank, recommendation) in recommendations.iter().enumerate() {
        let signal = match recommendation.signal {
            RankingSignal::Hybrid { score } => format!("score {:.4}", score),
            RankingSignal::Popularity { sales } => format!("{} sales", sales),
        };
        match &recommendation.details {
            Some(details) => {
                let year = details
                    .release_year
                    .map(|y| format!(" ({})", y))
                    .unwrap_or_default();
                println!(
                    "{:>2}. {} - {}{}  [{}]",
                    rank + 1,
                    details.artist,
                    details.title,
                    year,
                    signal
                );
            }
            None => println!(
                "{:>2}. item {} (not in catalog)  [{}]",
                rank + 1,
                recommendation.item_id,
                signal
            ),
        }
    }
}

fn print_report(report: &EvaluationReport) {
    println!("Users evaluated:      {}", report.users_evaluated);
    println!("Mean Jaccard index:   {:.4}", report.mean_jaccard);
    println!("Hit rate:             {:.4}", report.hit_rate);
    println!(
        "Genre precision:      {:.4} (over {} users with preferences)",
        report.genre_precision, report.users_with_genre_preferences
    );
    println!(
        "Catalog coverage:     {:.2}% ({} of {} items)",
        report.catalog_coverage_percent, report.distinct_recommended_items, report.catalog_size
    );
    println!(
        "Latency (ms):         mean {:.2}, min {:.2}, max {:.2}",
        report.latency.mean_ms, report.latency.min_ms, report.latency.max_ms
    );
}
