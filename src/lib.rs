pub mod accessories;
pub mod bridge;
pub mod logging;
pub mod platform;
pub mod protocol;
pub mod settings;

pub use accessories::state::{Brightness, DimmerState};
pub use accessories::{
    AccessoryError, AccessoryIdentity, AccessoryInformation, Characteristic, CharacteristicSink, CharacteristicUpdate,
    DesiredStateHandler, HomeworksAccessory,
};
pub use platform::{HomeworksPlatform, LoggingSink, run_command_writer};
pub use protocol::client::{HomeworksClient, HomeworksClientError, HomeworksOptions, StatusUpdate};
pub use protocol::messages::{MessageError, OutputCommand, OutputReport, ProcessorMessage};
pub use settings::{DeviceConfig, Settings};
