use super::CliError;
use crate::bridge::Bridge;
use crate::config::BridgeConfig;
use crate::retriever::LogView;
use std::io::Write;
use tokio_util::sync::CancellationToken;

pub struct ShowArgs<'a> {
    pub name: &'a str,
    pub step: Option<&'a str>,
    pub complete: bool,
    pub offset: usize,
}

/// Print a build's (or step's) log from the store.
///
/// Completeness goes to stderr so stdout carries only log text.
pub async fn run(config: &BridgeConfig, args: ShowArgs<'_>) -> Result<(), CliError> {
    let bridge = Bridge::from_config(config)?;
    let cancel = CancellationToken::new();

    let interrupt = cancel.clone();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    let view = match args.step {
        Some(step) => {
            bridge
                .step_log(args.name, step, args.complete, &cancel)
                .await
        }
        None => bridge.overall_log(args.name, args.complete, &cancel).await,
    };
    watcher.abort();

    if let LogView::Broken(broken) = &view {
        return Err(CliError::Unavailable(broken.reason.clone()));
    }

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(view.bytes_from(args.offset))?;
    stdout.flush()?;

    if args.complete {
        eprintln!(
            "{}",
            if view.is_complete() {
                "log complete"
            } else {
                "log not yet complete, try again later"
            }
        );
    }
    Ok(())
}
