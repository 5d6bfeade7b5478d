use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::accessories::characteristic::{
    Characteristic, CharacteristicSink, CharacteristicUpdate, DesiredStateHandler,
};
use crate::accessories::identity::{AccessoryIdentity, AccessoryInformation};
use crate::accessories::state::{Brightness, DimmerState};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum AccessoryError {
    #[error("Brightness {0} is outside 0..=100")]
    BrightnessOutOfRange(i64),
    #[error("Invalid characteristic value: {0}")]
    InvalidValue(String),
    #[error("Characteristic {0} is not exposed by this accessory")]
    UnsupportedCharacteristic(Characteristic),
}

/// State adapter for a single Homeworks output exposed as a lightbulb.
///
/// Control surface requests (`set_on`, `set_brightness`) change the desired state and are
/// forwarded to the registered [`DesiredStateHandler`]. Levels reported by the processor
/// arrive through [`HomeworksAccessory::update_brightness`] and are pushed to every
/// [`CharacteristicSink`], never back to the processor.
///
/// Each transition and the notifications it emits run under one emission guard, so
/// concurrent callers reach the processor and the sinks in the order their state changes
/// were applied. Handlers and sinks may call back into the accessory from the same thread.
pub struct HomeworksAccessory {
    identity: AccessoryIdentity,
    emission: ReentrantMutex<()>,
    state: Mutex<DimmerState>,
    desired_state_handler: Option<Arc<dyn DesiredStateHandler>>,
    sinks: Vec<Arc<dyn CharacteristicSink>>,
}

impl HomeworksAccessory {
    pub fn new(identity: AccessoryIdentity) -> Self {
        Self {
            identity,
            emission: ReentrantMutex::new(()),
            state: Mutex::new(DimmerState::default()),
            desired_state_handler: None,
            sinks: Vec::new(),
        }
    }

    pub fn with_desired_state_handler(mut self, handler: impl DesiredStateHandler + 'static) -> Self {
        self.set_desired_state_handler(handler);
        self
    }

    pub fn with_characteristic_sink(mut self, sink: Arc<dyn CharacteristicSink>) -> Self {
        self.add_characteristic_sink(sink);
        self
    }

    pub fn set_desired_state_handler(&mut self, handler: impl DesiredStateHandler + 'static) {
        self.desired_state_handler = Some(Arc::new(handler));
    }

    pub fn add_characteristic_sink(&mut self, sink: Arc<dyn CharacteristicSink>) {
        self.sinks.push(sink);
    }

    pub fn identity(&self) -> &AccessoryIdentity {
        &self.identity
    }

    pub fn integration_id(&self) -> &str {
        self.identity.integration_id()
    }

    pub fn name(&self) -> &str {
        self.identity.name()
    }

    pub fn uuid(&self) -> Uuid {
        self.identity.uuid()
    }

    pub fn is_dimmable(&self) -> bool {
        self.identity.is_dimmable()
    }

    pub fn accessory_information(&self) -> AccessoryInformation {
        AccessoryInformation::from(&self.identity)
    }

    pub fn state(&self) -> DimmerState {
        *self.state.lock()
    }

    /// Characteristics registered with the control surface. Brightness only for dimmers.
    pub fn characteristics(&self) -> Vec<Characteristic> {
        if self.is_dimmable() {
            vec![Characteristic::On, Characteristic::Brightness]
        } else {
            vec![Characteristic::On]
        }
    }

    pub fn set_on(&self, on: bool) {
        let _emission = self.emission.lock();
        let brightness = {
            let mut state = self.state.lock();
            state.switch(on);
            state.brightness()
        };
        debug!(
            name = self.name(),
            dimmable = self.is_dimmable(),
            "[Accessory] setOn: {on}"
        );
        self.notify_desired_state(brightness);
    }

    pub fn get_on(&self) -> bool {
        let on = self.state.lock().on();
        debug!(
            "[Accessory] Get Characteristic isOn -> {} {}",
            if on { "ON" } else { "OFF" },
            self.name()
        );
        on
    }

    /// Non-dimmable outputs only know full on and off: any request while on, or any
    /// non-zero request, resolves to full brightness.
    pub fn set_brightness(&self, requested: Brightness) {
        debug!(
            "[Accessory] Set Characteristic Brightness -> {} {}",
            requested.value(),
            self.name()
        );
        let _emission = self.emission.lock();
        let resolved = {
            let mut state = self.state.lock();
            let resolved = if self.is_dimmable() {
                requested
            } else if state.on() || requested.is_on() {
                Brightness::FULL
            } else {
                Brightness::OFF
            };
            state.apply(resolved);
            resolved
        };
        self.notify_desired_state(resolved);
    }

    pub fn get_brightness(&self) -> Brightness {
        let brightness = self.state.lock().brightness();
        debug!(
            "[Accessory] Get Characteristic Brightness -> {} {}",
            brightness.value(),
            self.name()
        );
        brightness
    }

    /// Reflects a level reported by the processor into the control surface.
    pub fn update_brightness(&self, reported: Brightness) {
        debug!(
            "[Accessory] Update Characteristic Brightness -> {} {}",
            reported.value(),
            self.name()
        );
        let _emission = self.emission.lock();
        let state = {
            let mut state = self.state.lock();
            state.apply(reported);
            *state
        };
        for sink in &self.sinks {
            sink.update_characteristic(self, CharacteristicUpdate::On(state.on()));
            sink.update_characteristic(self, CharacteristicUpdate::Brightness(state.brightness()));
        }
    }

    pub fn handle_read(&self, characteristic: Characteristic) -> Result<Value, AccessoryError> {
        self.ensure_exposed(characteristic)?;
        Ok(match characteristic {
            Characteristic::On => Value::Bool(self.get_on()),
            Characteristic::Brightness => Value::from(self.get_brightness().value()),
        })
    }

    pub fn handle_write(&self, characteristic: Characteristic, value: &Value) -> Result<(), AccessoryError> {
        self.ensure_exposed(characteristic)?;
        match characteristic {
            Characteristic::On => {
                let on = value
                    .as_bool()
                    .ok_or_else(|| AccessoryError::InvalidValue(value.to_string()))?;
                self.set_on(on);
            }
            Characteristic::Brightness => {
                let level = match (value.as_i64(), value.as_f64()) {
                    (Some(level), _) => Brightness::try_from(level)?,
                    (None, Some(level)) => Brightness::try_from(level)?,
                    _ => return Err(AccessoryError::InvalidValue(value.to_string())),
                };
                self.set_brightness(level);
            }
        }
        Ok(())
    }

    fn ensure_exposed(&self, characteristic: Characteristic) -> Result<(), AccessoryError> {
        if characteristic == Characteristic::Brightness && !self.is_dimmable() {
            return Err(AccessoryError::UnsupportedCharacteristic(characteristic));
        }
        Ok(())
    }

    fn notify_desired_state(&self, brightness: Brightness) {
        if let Some(handler) = &self.desired_state_handler {
            handler.on_desired_state(brightness, self.is_dimmable(), self);
        } else {
            warn!(
                "No desired state handler for {} ({}), {brightness} not sent",
                self.name(),
                self.integration_id()
            );
        }
    }
}

impl std::fmt::Debug for HomeworksAccessory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HomeworksAccessory")
            .field("identity", &self.identity)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    type DesiredCall = (u8, bool, String);

    #[derive(Default)]
    struct RecordingSink {
        updates: Mutex<Vec<CharacteristicUpdate>>,
    }

    impl CharacteristicSink for RecordingSink {
        fn update_characteristic(&self, _accessory: &HomeworksAccessory, update: CharacteristicUpdate) {
            self.updates.lock().push(update);
        }
    }

    fn create_test_accessory(
        dimmable: bool,
    ) -> (HomeworksAccessory, Arc<Mutex<Vec<DesiredCall>>>, Arc<RecordingSink>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let recorded = calls.clone();
        let sink = Arc::new(RecordingSink::default());
        let accessory = HomeworksAccessory::new(AccessoryIdentity::for_output(
            "Living room",
            "[01:01:00:02:04]",
            dimmable,
        ))
        .with_desired_state_handler(move |b: Brightness, dim: bool, acc: &HomeworksAccessory| {
            recorded
                .lock()
                .push((b.value(), dim, acc.integration_id().to_string()));
        })
        .with_characteristic_sink(sink.clone());
        (accessory, calls, sink)
    }

    fn brightness(value: u8) -> Brightness {
        Brightness::new(value).unwrap()
    }

    fn assert_consistent(accessory: &HomeworksAccessory) {
        let state = accessory.state();
        assert_eq!(state.on(), state.brightness().value() > 0);
    }

    #[test]
    fn test_initial_state_is_off() {
        let (accessory, calls, _) = create_test_accessory(true);
        assert!(!accessory.get_on());
        assert_eq!(accessory.get_brightness(), Brightness::OFF);
        assert!(calls.lock().is_empty());
    }

    #[test]
    fn test_set_on_drives_full_brightness() {
        let (accessory, calls, _) = create_test_accessory(true);
        accessory.set_on(true);
        assert!(accessory.get_on());
        assert_eq!(accessory.get_brightness(), Brightness::FULL);

        accessory.set_on(false);
        assert!(!accessory.get_on());
        assert_eq!(accessory.get_brightness(), Brightness::OFF);

        let calls = calls.lock();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], (100, true, "[01:01:00:02:04]".to_string()));
        assert_eq!(calls[1], (0, true, "[01:01:00:02:04]".to_string()));
    }

    #[test]
    fn test_set_on_after_dimming_resets_to_full() {
        let (accessory, _, _) = create_test_accessory(true);
        accessory.set_brightness(brightness(40));
        accessory.set_on(true);
        assert_eq!(accessory.get_brightness(), Brightness::FULL);
    }

    #[test]
    fn test_dimmable_set_brightness() {
        let (accessory, calls, _) = create_test_accessory(true);
        accessory.set_brightness(brightness(60));
        assert_eq!(accessory.get_brightness().value(), 60);
        assert!(accessory.get_on());

        accessory.set_brightness(brightness(1));
        assert_eq!(accessory.get_brightness().value(), 1);
        assert!(accessory.get_on());

        accessory.set_brightness(Brightness::OFF);
        assert_eq!(accessory.get_brightness(), Brightness::OFF);
        assert!(!accessory.get_on());

        let levels: Vec<u8> = calls.lock().iter().map(|c| c.0).collect();
        assert_eq!(levels, vec![60, 1, 0]);
    }

    #[test]
    fn test_non_dimmable_set_brightness_while_off() {
        let (accessory, _, _) = create_test_accessory(false);
        accessory.set_brightness(Brightness::OFF);
        assert_eq!(accessory.get_brightness(), Brightness::OFF);
        assert!(!accessory.get_on());

        accessory.set_brightness(brightness(1));
        assert_eq!(accessory.get_brightness(), Brightness::FULL);
        assert!(accessory.get_on());
    }

    #[test]
    fn test_non_dimmable_set_brightness_while_on() {
        let (accessory, calls, _) = create_test_accessory(false);
        accessory.set_on(true);
        accessory.set_brightness(brightness(20));
        assert_eq!(accessory.get_brightness(), Brightness::FULL);
        assert!(accessory.get_on());

        // still on, so a zero request keeps the output at full
        accessory.set_brightness(Brightness::OFF);
        assert_eq!(accessory.get_brightness(), Brightness::FULL);
        assert!(calls.lock().iter().all(|c| c.0 == 100 && !c.1));
    }

    #[test]
    fn test_non_dimmable_scenario() {
        let (accessory, calls, _) = create_test_accessory(false);
        accessory.set_brightness(brightness(45));
        assert_eq!(accessory.get_brightness(), Brightness::FULL);
        assert!(accessory.get_on());

        accessory.set_on(false);
        assert_eq!(accessory.get_brightness(), Brightness::OFF);
        assert!(!accessory.get_on());

        let calls = calls.lock();
        assert_eq!(
            *calls,
            vec![
                (100, false, "[01:01:00:02:04]".to_string()),
                (0, false, "[01:01:00:02:04]".to_string()),
            ]
        );
    }

    #[test]
    fn test_update_brightness_notifies_control_surface_only() {
        let (accessory, calls, sink) = create_test_accessory(true);
        accessory.update_brightness(brightness(30));

        assert!(accessory.get_on());
        assert_eq!(accessory.get_brightness().value(), 30);
        assert!(calls.lock().is_empty());

        let updates = sink.updates.lock();
        assert_eq!(updates.len(), 2);
        assert!(updates.contains(&CharacteristicUpdate::On(true)));
        assert!(updates.contains(&CharacteristicUpdate::Brightness(brightness(30))));
    }

    #[test]
    fn test_update_brightness_is_idempotent() {
        let (accessory, calls, sink) = create_test_accessory(true);
        accessory.update_brightness(brightness(75));
        let first = accessory.state();
        accessory.update_brightness(brightness(75));
        assert_eq!(accessory.state(), first);

        accessory.update_brightness(Brightness::OFF);
        assert!(!accessory.get_on());
        assert!(calls.lock().is_empty());
        assert_eq!(
            sink.updates.lock().last(),
            Some(&CharacteristicUpdate::Brightness(Brightness::OFF))
        );
    }

    #[test]
    fn test_state_stays_consistent() {
        for dimmable in [true, false] {
            let (accessory, _, _) = create_test_accessory(dimmable);
            assert_consistent(&accessory);
            for level in [0u8, 1, 45, 100, 0, 99] {
                accessory.set_brightness(brightness(level));
                assert_consistent(&accessory);
                accessory.update_brightness(brightness(level));
                assert_consistent(&accessory);
                accessory.set_on(level % 2 == 0);
                assert_consistent(&accessory);
            }
        }
    }

    #[test]
    fn test_set_without_handler_still_applies_state() {
        let accessory =
            HomeworksAccessory::new(AccessoryIdentity::for_output("Porch", "7", true));
        accessory.set_brightness(brightness(10));
        assert_eq!(accessory.get_brightness().value(), 10);
        assert!(accessory.get_on());
    }

    #[test]
    fn test_characteristics_follow_dimmability() {
        let (dimmer, _, _) = create_test_accessory(true);
        let (switch, _, _) = create_test_accessory(false);
        assert_eq!(
            dimmer.characteristics(),
            vec![Characteristic::On, Characteristic::Brightness]
        );
        assert_eq!(switch.characteristics(), vec![Characteristic::On]);
    }

    #[test]
    fn test_handle_write_validates_values() {
        let (accessory, calls, _) = create_test_accessory(true);
        accessory
            .handle_write(Characteristic::Brightness, &Value::from(60))
            .unwrap();
        assert_eq!(
            accessory.handle_read(Characteristic::Brightness).unwrap(),
            Value::from(60)
        );
        assert_eq!(
            accessory.handle_read(Characteristic::On).unwrap(),
            Value::Bool(true)
        );

        assert_eq!(
            accessory.handle_write(Characteristic::Brightness, &Value::from(150)),
            Err(AccessoryError::BrightnessOutOfRange(150))
        );
        assert!(matches!(
            accessory.handle_write(Characteristic::On, &Value::from(1)),
            Err(AccessoryError::InvalidValue(_))
        ));
        assert!(matches!(
            accessory.handle_write(Characteristic::Brightness, &Value::from("50")),
            Err(AccessoryError::InvalidValue(_))
        ));
        assert_eq!(accessory.get_brightness().value(), 60);
        assert_eq!(calls.lock().len(), 1);

        accessory
            .handle_write(Characteristic::On, &Value::Bool(false))
            .unwrap();
        assert!(!accessory.get_on());
    }

    #[test]
    fn test_handle_write_accepts_float_levels() {
        let (accessory, calls, _) = create_test_accessory(true);
        accessory
            .handle_write(Characteristic::Brightness, &Value::from(50.0))
            .unwrap();
        assert_eq!(accessory.get_brightness().value(), 50);
        accessory
            .handle_write(Characteristic::Brightness, &Value::from(33.6))
            .unwrap();
        assert_eq!(accessory.get_brightness().value(), 34);
        assert_eq!(
            accessory.handle_write(Characteristic::Brightness, &Value::from(150.0)),
            Err(AccessoryError::BrightnessOutOfRange(150))
        );
        assert_eq!(accessory.get_brightness().value(), 34);
        assert_eq!(calls.lock().len(), 2);
    }

    #[test]
    fn test_concurrent_sets_reach_handler_in_state_order() {
        let (entered_tx, entered_rx) = mpsc::channel::<()>();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let entered_tx = Mutex::new(entered_tx);
        let release_rx = Mutex::new(release_rx);
        let sent = Arc::new(Mutex::new(Vec::new()));
        let recorded = sent.clone();

        let accessory = Arc::new(
            HomeworksAccessory::new(AccessoryIdentity::for_output("Stairs", "21", true))
                .with_desired_state_handler(
                    move |b: Brightness, _dim: bool, acc: &HomeworksAccessory| {
                        // handlers may read the accessory while emitting
                        assert_eq!(acc.get_brightness(), b);
                        if b == Brightness::FULL {
                            entered_tx.lock().send(()).unwrap();
                            release_rx.lock().recv().unwrap();
                        }
                        recorded.lock().push(b.value());
                    },
                ),
        );

        let first = {
            let accessory = accessory.clone();
            thread::spawn(move || accessory.set_on(true))
        };
        entered_rx.recv().unwrap();

        let second = {
            let accessory = accessory.clone();
            thread::spawn(move || accessory.set_on(false))
        };
        thread::sleep(Duration::from_millis(100));
        // the second call waits for the first emission to finish
        assert!(!second.is_finished());
        assert_eq!(accessory.get_brightness(), Brightness::FULL);

        release_tx.send(()).unwrap();
        first.join().unwrap();
        second.join().unwrap();

        assert_eq!(*sent.lock(), vec![100, 0]);
        assert!(!accessory.get_on());
        assert_eq!(accessory.get_brightness(), Brightness::OFF);
    }

    #[test]
    fn test_update_waits_for_pending_emission() {
        let (entered_tx, entered_rx) = mpsc::channel::<()>();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let entered_tx = Mutex::new(entered_tx);
        let release_rx = Mutex::new(release_rx);
        let sink = Arc::new(RecordingSink::default());

        let accessory = Arc::new(
            HomeworksAccessory::new(AccessoryIdentity::for_output("Stairs", "21", true))
                .with_desired_state_handler(
                    move |_b: Brightness, _dim: bool, _acc: &HomeworksAccessory| {
                        entered_tx.lock().send(()).unwrap();
                        release_rx.lock().recv().unwrap();
                    },
                )
                .with_characteristic_sink(sink.clone()),
        );

        let request = {
            let accessory = accessory.clone();
            thread::spawn(move || accessory.set_brightness(brightness(60)))
        };
        entered_rx.recv().unwrap();

        let report = {
            let accessory = accessory.clone();
            thread::spawn(move || accessory.update_brightness(brightness(20)))
        };
        thread::sleep(Duration::from_millis(100));
        assert!(sink.updates.lock().is_empty());

        release_tx.send(()).unwrap();
        request.join().unwrap();
        report.join().unwrap();

        assert_eq!(accessory.get_brightness().value(), 20);
        assert_eq!(
            sink.updates.lock().last(),
            Some(&CharacteristicUpdate::Brightness(brightness(20)))
        );
    }

    #[test]
    fn test_accessory_information() {
        let (accessory, _, _) = create_test_accessory(true);
        let information = accessory.accessory_information();
        assert_eq!(information.name, "Living room");
        assert_eq!(information.serial_number, "[01:01:00:02:04]");
    }

    #[test]
    fn test_handle_write_rejects_brightness_on_switch() {
        let (accessory, calls, _) = create_test_accessory(false);
        assert_eq!(
            accessory.handle_write(Characteristic::Brightness, &Value::from(50)),
            Err(AccessoryError::UnsupportedCharacteristic(
                Characteristic::Brightness
            ))
        );
        assert!(accessory.handle_read(Characteristic::Brightness).is_err());
        assert!(calls.lock().is_empty());
    }
}
