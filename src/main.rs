use std::{error::Error, process};

use clap::{Parser, ValueHint};
use log::{debug, error, info, LevelFilter};

use ymnow::{
    config::Config,
    resolver::{NowPlaying, Resolver},
    token::Token,
};

/// Profile to display when not built in release mode.
#[cfg(debug_assertions)]
const BUILD_PROFILE: &str = "debug";
/// Profile to display when built in release mode.
#[cfg(not(debug_assertions))]
const BUILD_PROFILE: &str = "release";

/// Group name for mutually exclusive logging options.
const ARGS_GROUP_LOGGING: &str = "logging";

/// Command line arguments as parsed by `clap`.
#[derive(Clone, Debug, Default, Hash, PartialEq, Eq, PartialOrd, Ord, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Secrets file
    ///
    /// Ensure that this file is kept secure and not shared publicly, as it
    /// contains a token that grants access to your Yandex Music account.
    #[arg(short, long, value_name = "FILE", value_hint = ValueHint::FilePath, default_value_t = String::from("secrets.toml"))]
    secrets_file: String,

    /// Search the catalog instead of resolving the current track
    #[arg(short = 'q', long, value_name = "QUERY")]
    search: Option<String>,

    /// Prefer the lowest bitrate instead of the highest
    #[arg(long, default_value_t = false)]
    low_quality: bool,

    /// Suppresses all output except warnings and errors.
    #[arg(long, default_value_t = false, group = ARGS_GROUP_LOGGING)]
    quiet: bool,

    /// Enable verbose logging
    ///
    /// Specify twice for trace logging.
    #[arg(short, long, action = clap::ArgAction::Count, group = ARGS_GROUP_LOGGING)]
    verbose: u8,
}

/// Initializes the logger facade.
///
/// The logging level is determined as follows, in order of precedence from
/// highest to lowest:
/// 1. Command line arguments
/// 2. `RUST_LOG` environment variable
/// 3. Hard coded default
fn init_logger(config: &Args) {
    let mut logger = env_logger::Builder::from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );

    if config.quiet || config.verbose > 0 {
        let level = match config.verbose {
            0 => {
                // Quiet and verbose are mutually exclusive, and `verbose` is 0
                // by default. So this arm means: quiet mode.
                LevelFilter::Warn
            }
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };

        // Filter log messages of external crates.
        logger.filter_module(module_path!(), level);
    }

    logger.init();
}

fn print_outcome(outcome: &NowPlaying) {
    match outcome {
        NowPlaying::Playing {
            track,
            paused,
            progress,
            duration,
            ..
        } => {
            let state = if *paused { "paused" } else { "playing" };
            println!("{track} [{state}]");
            println!(
                "  {}:{:02} / {}:{:02} @ {} kbps",
                progress.as_secs() / 60,
                progress.as_secs() % 60,
                duration.as_secs() / 60,
                duration.as_secs() % 60,
                track.bitrate_kbps,
            );
            println!("  {}", track.url);
        }
        NowPlaying::NotPlaying => println!("nothing is playing"),
        NowPlaying::Failed { kind, detail } => eprintln!("failed ({kind}): {detail}"),
    }
}

async fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let token = Token::from_file(&args.secrets_file)?;

    let mut config = Config::new();
    config.prefer_high_quality = !args.low_quality;

    let resolver = Resolver::new(config)?;

    if let Some(query) = args.search.as_deref() {
        let tracks = resolver.search(&token, query).await?;
        if tracks.is_empty() {
            println!("no results for {query:?}");
        }
        for track in tracks {
            println!("{}: {} - {}", track.id, track.artist_names(), track.title);
        }
        return Ok(());
    }

    let outcome = resolver.now_playing(&token).await;
    print_outcome(&outcome);

    if matches!(outcome, NowPlaying::Failed { .. }) {
        process::exit(2);
    }

    Ok(())
}

/// Main entry point of the application.
#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logger(&args);

    // Dump command line arguments before we do anything more.
    // This aids in debugging of whatever comes next.
    debug!("Command {:#?}", args);

    info!(
        "starting {}/{}; {BUILD_PROFILE}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    if let Err(e) = run(args).await {
        error!("{e}");
        process::exit(1);
    }
}
