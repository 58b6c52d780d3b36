use anyhow::Result;
use chrono::Utc;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use cartita::access::AccessGuard;
use cartita::cli::{parse_args, print_help};
use cartita::config::Config;
use cartita::message::weekly_summary;
use cartita::status::{StatusBoard, StatusServer};
use cartita::watcher::run_status_watch;
use cartita::HoursEvaluator;

#[tokio::main]
async fn main() -> Result<()> {
    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(2);
        }
    };

    if args.help {
        print_help();
        return Ok(());
    }

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("cartita=info".parse()?),
        )
        .init();

    info!("Cartita status service v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = Config::from_env()?;
    info!("Configuration loaded");
    info!("  Venue file: {:?}", config.venue_file);
    info!("  Locale: {:?}", config.locale);
    match config.status_port {
        Some(port) => info!("  Status port: {}", port),
        None => info!("  Status server disabled"),
    }

    // Handle --validate mode
    if args.validate {
        info!("Validating configuration...");
        match config.validate() {
            Ok(()) => {
                info!("Configuration is valid");
                return Ok(());
            }
            Err(e) => {
                error!("{}", e);
                std::process::exit(1);
            }
        }
    }

    let store = config.venue_store();
    let evaluator = HoursEvaluator::new(config.locale);

    if args.week {
        let venue = store.load()?;
        println!("{} ({})", venue.name, venue.timezone);
        for line in weekly_summary(&venue.schedule, venue.week_start, config.locale) {
            println!("  {}", line);
        }
        return Ok(());
    }

    // Single evaluation (now or at --at) printed as JSON
    if args.once {
        let venue = store.load()?;
        let now = args.at.unwrap_or_else(Utc::now);
        let result = venue.evaluate(&evaluator, now)?;
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    let board = Arc::new(StatusBoard::new());
    let cancel_token = CancellationToken::new();

    // Start status server if configured
    let mut server_handle = None;
    if let Some(port) = config.status_port {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let guard = AccessGuard::new(config.staff_token.clone());
        let server = StatusServer::bind(addr, board.clone(), guard).await?;
        server_handle = Some(tokio::spawn(server.serve(cancel_token.clone())));
    }

    let watcher_handle = tokio::spawn(run_status_watch(
        store,
        evaluator,
        board,
        config.idle_recheck,
        cancel_token.clone(),
    ));

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");
    cancel_token.cancel();

    if let Err(e) = watcher_handle.await {
        error!("Watcher task error: {}", e);
    }
    if let Some(handle) = server_handle {
        if let Err(e) = handle.await {
            error!("Status server task error: {}", e);
        }
    }

    Ok(())
}
