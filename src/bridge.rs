use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};

use crate::accessories::CharacteristicSink;
use crate::platform::{HomeworksPlatform, run_command_writer};
use crate::protocol::client::{HomeworksClient, HomeworksClientError, HomeworksOptions};
use crate::settings::Settings;

/// Registers every configured output, connects to the processor and keeps state in sync
/// until Ctrl-C.
pub async fn start_bridge(
    options: HomeworksOptions,
    settings: Settings,
    sink: Arc<dyn CharacteristicSink>,
) -> Result<()> {
    let (platform, commands) = HomeworksPlatform::new(settings.fade());
    let platform = Arc::new(platform);
    for device in &settings.devices {
        platform.register(device, sink.clone());
    }
    if settings.devices.is_empty() {
        warn!("No devices configured, only processor traffic will be logged");
    }

    let client = HomeworksClient::connect(options, platform.clone())
        .await
        .context("Failed to connect to processor")?;
    let client = Arc::new(client);

    info!("Querying {} outputs", platform.accessories().len());
    for query in platform.initial_queries() {
        client
            .send(&query)
            .await
            .with_context(|| format!("Failed to query output {}", query.integration_id()))?;
    }

    let mut writer = tokio::spawn(run_command_writer(commands, client.clone()));
    let outcome = tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Shutting down");
            Ok(())
        }
        _ = client.closed() => {
            error!("Processor connection lost");
            Err(HomeworksClientError::Closed.into())
        }
        result = &mut writer => match result {
            Ok(Ok(())) => {
                info!("Command writer stopped");
                Ok(())
            }
            Ok(Err(e)) => {
                error!("Command writer failed: {e}");
                Err(e)
            }
            Err(e) => {
                error!("Command writer panicked: {e}");
                Err(e.into())
            }
        },
    };
    writer.abort();
    let _ = writer.await;

    match Arc::try_unwrap(client) {
        Ok(client) => match client.disconnect().await {
            Ok(()) | Err(HomeworksClientError::Closed) => {}
            Err(e) => warn!("Failed to disconnect client: {e}"),
        },
        Err(_) => warn!("Client still in use, dropping connection"),
    }
    outcome
}
