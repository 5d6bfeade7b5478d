use uuid::Uuid;

/// Namespace for identities derived from processor integration ids.
const HOMEWORKS_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2a4e_8d3b_4f0a_9c5e_1b7d_2e8f_4a60);

/// Fixed description of one processor output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessoryIdentity {
    name: String,
    uuid: Uuid,
    integration_id: String,
    dimmable: bool,
}

impl AccessoryIdentity {
    pub fn new(name: &str, uuid: Uuid, integration_id: &str, dimmable: bool) -> Self {
        Self {
            name: name.to_string(),
            uuid,
            integration_id: integration_id.to_string(),
            dimmable,
        }
    }

    /// Identity whose uuid is derived from the integration id, stable across restarts.
    pub fn for_output(name: &str, integration_id: &str, dimmable: bool) -> Self {
        Self::new(name, derive_uuid(integration_id), integration_id, dimmable)
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn integration_id(&self) -> &str {
        self.integration_id.as_str()
    }

    pub fn is_dimmable(&self) -> bool {
        self.dimmable
    }
}

/// Descriptive fields the control surface shows for an accessory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessoryInformation {
    pub name: String,
    pub manufacturer: String,
    pub model: String,
    pub serial_number: String,
    pub firmware_revision: String,
}

impl From<&AccessoryIdentity> for AccessoryInformation {
    fn from(identity: &AccessoryIdentity) -> Self {
        let model = if identity.is_dimmable() {
            "Homeworks Dimmer"
        } else {
            "Homeworks Switch"
        };
        Self {
            name: identity.name().to_string(),
            manufacturer: "Lutron".to_string(),
            model: model.to_string(),
            serial_number: identity.integration_id().to_string(),
            firmware_revision: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

pub fn derive_uuid(integration_id: &str) -> Uuid {
    Uuid::new_v5(&HOMEWORKS_NAMESPACE, integration_id.as_bytes())
}
