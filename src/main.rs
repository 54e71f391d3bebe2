use clap::Parser;
use link_walker::utils::minutes_seconds;
use link_walker::{CheckerConfig, DriverKind, LinkChecker, SeedStatus};
use std::error::Error;
use std::fs::OpenOptions;
use tokio_util::sync::CancellationToken;

mod args;
use args::Args;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Parse command-line arguments
    let args = Args::parse();

    init_logging(&args)?;

    let mut config = match &args.config {
        Some(path) => CheckerConfig::from_file(path)?,
        None => CheckerConfig::default(),
    };
    args.apply(&mut config);

    if config.driver == DriverKind::WebDriver {
        println!("Note: checking requires a WebDriver server (e.g., ChromeDriver).");
        println!(
            "Set WEBDRIVER_URL or --webdriver-url if not using {}",
            config.webdriver_url
        );
    }

    // Ctrl-C stops the run between articles; reports gathered so far are kept
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ::log::warn!("Interrupted, finishing the current article");
            on_signal.cancel();
        }
    });

    let summary = LinkChecker::new(args.seeds.clone())
        .with_config(config)
        .with_cancellation(cancel)
        .run()
        .await?;

    for report in &summary.seeds {
        match &report.status {
            SeedStatus::Saved(path) => println!(
                "{}: {} broken links saved to {}",
                report.seed,
                report.records,
                path.display()
            ),
            SeedStatus::Empty => println!("{}: nothing to save", report.seed),
            SeedStatus::Failed(reason) => println!("{}: failed ({})", report.seed, reason),
            SeedStatus::Cancelled(Some(path)) => println!(
                "{}: cancelled, partial results saved to {}",
                report.seed,
                path.display()
            ),
            SeedStatus::Cancelled(None) => println!("{}: cancelled", report.seed),
        }
    }

    let (minutes, seconds) = minutes_seconds(summary.elapsed);
    println!("Run time: {} min {} s", minutes, seconds);

    Ok(())
}

/// Initialize env_logger; `-v` raises the default level, RUST_LOG still wins
fn init_logging(args: &Args) -> Result<(), Box<dyn Error>> {
    let default_level = match args.verbose {
        0 => "link_walker=info,warn",
        1 => "link_walker=debug,info",
        _ => "link_walker=trace,debug",
    };
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level));

    if let Some(path) = &args.log_file {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }

    builder.init();
    Ok(())
}
