use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info, warn};

use crate::accessories::state::Brightness;
use crate::accessories::{CharacteristicSink, CharacteristicUpdate, HomeworksAccessory};
use crate::protocol::client::{HomeworksClient, HomeworksClientError, StatusUpdate};
use crate::protocol::messages::{OutputCommand, OutputReport};
use crate::settings::DeviceConfig;

/// Registry of every output exposed to the control surface, keyed by integration id.
pub struct HomeworksPlatform {
    accessories: DashMap<String, Arc<HomeworksAccessory>>,
    commands: UnboundedSender<OutputCommand>,
    fade: Option<Duration>,
}

impl HomeworksPlatform {
    /// Returns the platform and the queue of commands to forward to the processor.
    pub fn new(fade: Option<Duration>) -> (Self, UnboundedReceiver<OutputCommand>) {
        let (commands, receiver) = mpsc::unbounded_channel();
        (
            Self {
                accessories: DashMap::new(),
                commands,
                fade,
            },
            receiver,
        )
    }

    pub fn register(
        &self,
        device: &DeviceConfig,
        sink: Arc<dyn CharacteristicSink>,
    ) -> Arc<HomeworksAccessory> {
        let commands = self.commands.clone();
        let fade = self.fade;
        let accessory = HomeworksAccessory::new(device.identity())
            .with_desired_state_handler(
                move |level: Brightness, dimmable: bool, accessory: &HomeworksAccessory| {
                    let command = OutputCommand::Set {
                        integration_id: accessory.integration_id().to_string(),
                        level,
                        fade: if dimmable { fade } else { None },
                    };
                    debug!("Queueing command {command} for {}", accessory.name());
                    if commands.send(command).is_err() {
                        error!(
                            "Command queue closed, dropping {level} for {}",
                            accessory.name()
                        );
                    }
                },
            )
            .with_characteristic_sink(sink);
        let accessory = Arc::new(accessory);

        if self
            .accessories
            .insert(device.integration_id.clone(), accessory.clone())
            .is_some()
        {
            warn!(
                "Output {} registered twice, replacing previous accessory",
                device.integration_id
            );
        }
        let information = accessory.accessory_information();
        info!(
            "Registered {} ({}) as {} {}",
            information.name, information.serial_number, information.manufacturer, information.model
        );
        accessory
    }

    pub fn accessory(&self, integration_id: &str) -> Option<Arc<HomeworksAccessory>> {
        self.accessories.get(integration_id).map(|a| a.value().clone())
    }

    pub fn accessories(&self) -> Vec<Arc<HomeworksAccessory>> {
        let mut accessories: Vec<_> = self.accessories.iter().map(|a| a.value().clone()).collect();
        accessories.sort_by(|a, b| a.integration_id().cmp(b.integration_id()));
        accessories
    }

    /// One level query per output, sent after connecting to learn the current state.
    pub fn initial_queries(&self) -> Vec<OutputCommand> {
        self.accessories()
            .iter()
            .map(|a| OutputCommand::Query {
                integration_id: a.integration_id().to_string(),
            })
            .collect()
    }
}

#[async_trait]
impl StatusUpdate for HomeworksPlatform {
    async fn status_update(&self, report: &OutputReport) {
        if let Some(accessory) = self.accessory(&report.integration_id) {
            accessory.update_brightness(report.level);
        } else {
            warn!(
                "Received update for unknown output {}",
                report.integration_id
            );
        }
    }
}

/// Forwards queued commands to the processor until the queue or the connection closes.
pub async fn run_command_writer(
    mut commands: UnboundedReceiver<OutputCommand>,
    client: Arc<HomeworksClient>,
) -> Result<()> {
    while let Some(command) = commands.recv().await {
        match client.send(&command).await {
            Ok(()) => {}
            Err(HomeworksClientError::Closed) => {
                return Err(HomeworksClientError::Closed.into());
            }
            Err(e) => error!("Failed to send {command}: {e}"),
        }
    }
    info!("Command queue closed");
    Ok(())
}

/// Control surface stand-in that only logs reported state.
pub struct LoggingSink;

impl CharacteristicSink for LoggingSink {
    fn update_characteristic(&self, accessory: &HomeworksAccessory, update: CharacteristicUpdate) {
        let value = match update {
            CharacteristicUpdate::On(on) => on.to_string(),
            CharacteristicUpdate::Brightness(brightness) => brightness.to_string(),
        };
        info!("{}: {} -> {value}", accessory.name(), update.characteristic());
    }
}
