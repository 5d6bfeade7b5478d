pub(crate) mod dimmer;

pub use dimmer::{Brightness, DimmerState};
