use std::fmt;

use crate::accessories::HomeworksAccessory;
use crate::accessories::state::Brightness;

/// Characteristics a lightbulb service exposes to the control surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Characteristic {
    On,
    Brightness,
}

impl fmt::Display for Characteristic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Characteristic::On => write!(f, "On"),
            Characteristic::Brightness => write!(f, "Brightness"),
        }
    }
}

/// Value pushed back to the control surface after the processor reported a change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CharacteristicUpdate {
    On(bool),
    Brightness(Brightness),
}

impl CharacteristicUpdate {
    pub fn characteristic(&self) -> Characteristic {
        match self {
            CharacteristicUpdate::On(_) => Characteristic::On,
            CharacteristicUpdate::Brightness(_) => Characteristic::Brightness,
        }
    }
}

/// Receives reported state for the control surface characteristic model.
pub trait CharacteristicSink: Send + Sync {
    fn update_characteristic(&self, accessory: &HomeworksAccessory, update: CharacteristicUpdate);
}

/// Receives every desired state change so it can be sent to the processor.
pub trait DesiredStateHandler: Send + Sync {
    fn on_desired_state(&self, brightness: Brightness, dimmable: bool, accessory: &HomeworksAccessory);
}

impl<F> DesiredStateHandler for F
where
    F: Fn(Brightness, bool, &HomeworksAccessory) + Send + Sync,
{
    fn on_desired_state(&self, brightness: Brightness, dimmable: bool, accessory: &HomeworksAccessory) {
        self(brightness, dimmable, accessory)
    }
}
