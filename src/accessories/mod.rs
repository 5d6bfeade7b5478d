mod characteristic;
mod homeworks_accessory;
mod identity;
pub mod state;

pub use characteristic::{
    Characteristic, CharacteristicSink, CharacteristicUpdate, DesiredStateHandler,
};
pub use homeworks_accessory::{AccessoryError, HomeworksAccessory};
pub use identity::{AccessoryIdentity, AccessoryInformation, derive_uuid};
