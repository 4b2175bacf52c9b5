//! docwarden binary entry point.

use std::process::ExitCode;
use std::sync::Arc;

use docwarden::cli::{self, Args};
use docwarden::config::Config;
use docwarden::{
    logging, reaper, CloseReason, NativeProcessController, OpenOutcome, OpenRequest,
    SessionManager, WorkflowReport,
};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    let args = match cli::parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {e}");
            eprintln!("Run 'docwarden --help' for usage.");
            return ExitCode::from(2);
        }
    };

    if args.help {
        cli::print_help();
        return ExitCode::SUCCESS;
    }
    if args.version {
        cli::print_version();
        return ExitCode::SUCCESS;
    }

    let config = match Config::load(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(2);
        }
    };
    let _ = logging::init_with_level(config.log_filter());

    if args.files.is_empty() {
        eprintln!("error: no documents given");
        eprintln!("Run 'docwarden --help' for usage.");
        return ExitCode::from(2);
    }

    info!("docwarden v{}", env!("CARGO_PKG_VERSION"));
    let manager = Arc::new(SessionManager::new(
        NativeProcessController::new(config.to_launch_config()),
        config.to_manager_config(),
    ));

    let opened = {
        let manager = Arc::clone(&manager);
        let args = args.clone();
        tokio::task::spawn_blocking(move || open_requested(&manager, &args)).await
    };
    match opened {
        Ok(Ok(0)) => {
            error!("No document could be opened");
            return ExitCode::FAILURE;
        }
        Ok(Ok(count)) => info!(count, "Documents open"),
        Ok(Err(e)) => {
            error!(error = %e, "Failed to open documents");
            return ExitCode::FAILURE;
        }
        Err(e) => {
            error!(error = %e, "Open task panicked");
            return ExitCode::FAILURE;
        }
    }

    match manager.status() {
        Ok(status) => print!("{status}"),
        Err(e) => warn!(error = %e, "Status unavailable"),
    }

    let sweeper = config
        .sweep_interval()
        .map(|every| reaper::spawn_periodic(Arc::clone(&manager), every));

    info!("Press Ctrl-C to close all documents and exit");
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl-C");
    }
    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }

    info!("Shutting down");
    let closed = tokio::task::spawn_blocking(move || manager.close_all(CloseReason::Shutdown)).await;
    match closed {
        Ok(Ok(closed)) => {
            let leaked = closed.iter().filter(|c| c.leak_suspected()).count();
            if leaked > 0 {
                warn!(leaked, "Some processes could not be confirmed stopped");
            }
            info!(closed = closed.len(), "All sessions closed");
            ExitCode::SUCCESS
        }
        Ok(Err(e)) => {
            error!(error = %e, "Failed to close sessions");
            ExitCode::FAILURE
        }
        Err(e) => {
            error!(error = %e, "Shutdown task panicked");
            ExitCode::FAILURE
        }
    }
}

/// Open what the command line asked for. Returns how many documents are open.
fn open_requested(manager: &SessionManager, args: &Args) -> docwarden::Result<usize> {
    if args.compare {
        let report = manager.open_for_comparison(&args.files, "cli")?;
        log_workflow("comparison", &report);
        return Ok(report.opened.len());
    }
    if let Some(client) = &args.client {
        let report = manager.open_client_portfolio(&args.files, client)?;
        log_workflow("client portfolio", &report);
        return Ok(report.opened.len());
    }

    let mut count = 0;
    for file in &args.files {
        let mut request = OpenRequest::new(file);
        if args.background {
            request = request.background();
        }
        if let Some(priority) = args.priority {
            request = request.priority(priority);
        }
        if let Some(context) = args.context {
            request = request.context(context);
        }

        match manager.open(request) {
            Ok(OpenOutcome::Opened { key, pid, displaced }) => {
                info!(resource = %key, pid, displaced = displaced.len(), "Opened");
                count += 1;
            }
            Ok(OpenOutcome::AlreadyOpen { key }) => {
                info!(resource = %key, "Already open");
            }
            Err(e) => error!(file = %file.display(), error = %e, "Could not open document"),
        }
    }
    Ok(count)
}

fn log_workflow(name: &str, report: &WorkflowReport) {
    for (key, reason) in &report.failed {
        warn!(resource = %key, error = %reason, "{name}: document failed to open");
    }
    match report.group_id() {
        Some(id) => info!(group = %id, opened = report.opened.len(), "{name} ready"),
        None => warn!(opened = report.opened.len(), "{name}: no group formed"),
    }
}
