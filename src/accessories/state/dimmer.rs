use std::fmt;

use serde::{Deserialize, Serialize};

use crate::accessories::AccessoryError;

pub const FULLY_ON: u8 = 100;
pub const FULLY_OFF: u8 = 0;

/// Output level in percent, always within `0..=100`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Brightness(u8);

impl Brightness {
    pub const OFF: Brightness = Brightness(FULLY_OFF);
    pub const FULL: Brightness = Brightness(FULLY_ON);

    pub fn new(value: u8) -> Result<Self, AccessoryError> {
        if value > FULLY_ON {
            return Err(AccessoryError::BrightnessOutOfRange(i64::from(value)));
        }
        Ok(Self(value))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn is_on(self) -> bool {
        self.0 > FULLY_OFF
    }
}

impl TryFrom<i64> for Brightness {
    type Error = AccessoryError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if !(FULLY_OFF as i64..=FULLY_ON as i64).contains(&value) {
            return Err(AccessoryError::BrightnessOutOfRange(value));
        }
        Ok(Self(value as u8))
    }
}

impl TryFrom<f64> for Brightness {
    type Error = AccessoryError;

    /// Processor levels carry two decimals (`45.00`), round to the nearest percent.
    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if !value.is_finite() {
            return Err(AccessoryError::InvalidValue(value.to_string()));
        }
        Brightness::try_from(value.round() as i64)
    }
}

impl From<Brightness> for u8 {
    fn from(value: Brightness) -> Self {
        value.0
    }
}

impl fmt::Display for Brightness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// On/off plus level of a single output. `on` is true exactly when the level is above zero.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DimmerState {
    on: bool,
    brightness: Brightness,
}

impl DimmerState {
    pub fn on(&self) -> bool {
        self.on
    }

    pub fn brightness(&self) -> Brightness {
        self.brightness
    }

    /// Moves to the given level and derives the on flag from it.
    pub(crate) fn apply(&mut self, brightness: Brightness) {
        self.brightness = brightness;
        self.on = brightness.is_on();
    }

    pub(crate) fn switch(&mut self, on: bool) {
        self.apply(if on { Brightness::FULL } else { Brightness::OFF });
    }
}
