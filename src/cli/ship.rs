use super::CliError;
use crate::bridge::Bridge;
use crate::config::BridgeConfig;
use tokio::io::{AsyncReadExt, BufReader};
use tracing::info;

/// Read stdin and ship every line to the build's log (or one step's).
pub async fn run(config: &BridgeConfig, name: &str, step: Option<&str>) -> Result<(), CliError> {
    let bridge = Bridge::from_config(config)?;
    let emitter = match step {
        Some(step) => bridge.logger_for_step(name, step)?,
        None => bridge.logger_for(name)?,
    };

    info!(key = %emitter.key(), node = ?emitter.node(), "Shipping stdin");

    let mut stdin = BufReader::new(tokio::io::stdin());
    let mut writer = emitter.line_writer();
    let mut buf = vec![0u8; 8192];
    let mut lines = 0usize;

    loop {
        let n = tokio::select! {
            read = stdin.read(&mut buf) => read?,
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, closing log stream");
                break;
            }
        };
        if n == 0 {
            break;
        }
        lines += writer.write(&buf[..n]).await?;
    }
    writer.finish().await?;
    emitter.close().await?;

    info!(
        lines,
        watermark = bridge.tracker().latest(emitter.key()),
        "Finished shipping"
    );
    Ok(())
}
