//! Save states.
//!
//! Only memory is owned by this crate. CPU, RSP and RDP state come from the
//! interpreters and are carried through as opaque JSON values. Byte buffers
//! are stored as base64 strings so the file stays valid JSON.

use crate::memory::AddressSpace;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum SaveStateError {
    #[error("malformed save state: {0}")]
    Json(#[from] serde_json::Error),
}

/// Persistent memory: RDRAM and cartridge save RAM. Registers are excluded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryState {
    #[serde(with = "base64_bytes")]
    pub rdram: Vec<u8>,
    #[serde(default, with = "base64_opt_bytes")]
    pub cartridge_ram: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveState {
    #[serde(default)]
    pub cpu_state: serde_json::Value,
    pub memory_state: MemoryState,
    #[serde(default)]
    pub rsp_state: serde_json::Value,
    #[serde(default)]
    pub rdp_state: serde_json::Value,
    pub frame_count: u64,
    pub cycle_count: u64,
}

impl SaveState {
    /// Snapshot the bus alongside interpreter state supplied by the caller
    pub fn capture(
        bus: &AddressSpace,
        cpu_state: serde_json::Value,
        rsp_state: serde_json::Value,
        rdp_state: serde_json::Value,
        frame_count: u64,
        cycle_count: u64,
    ) -> Self {
        Self {
            cpu_state,
            memory_state: bus.get_state(),
            rsp_state,
            rdp_state,
            frame_count,
            cycle_count,
        }
    }

    /// Restore memory. Interpreter state is left for the caller to apply.
    pub fn restore(&self, bus: &mut AddressSpace) {
        debug!(
            "Restoring save state at frame {} (cycle {})",
            self.frame_count, self.cycle_count
        );
        bus.set_state(&self.memory_state);
    }

    pub fn to_json(&self) -> Result<String, SaveStateError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, SaveStateError> {
        Ok(serde_json::from_str(json)?)
    }
}

mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(de::Error::custom)
    }
}

mod base64_opt_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(
        bytes: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(bytes) => serializer.serialize_some(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|encoded| STANDARD.decode(encoded).map_err(de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::RomCartridge;
    use serde_json::json;

    #[test]
    fn field_names_are_preserved() {
        let state = SaveState {
            cpu_state: json!({ "pc": 0xA400_0040u32 }),
            memory_state: MemoryState {
                rdram: vec![1, 2, 3],
                cartridge_ram: None,
            },
            rsp_state: json!(null),
            rdp_state: json!(null),
            frame_count: 12,
            cycle_count: 1 << 40,
        };
        let value: serde_json::Value =
            serde_json::from_str(&state.to_json().unwrap()).unwrap();

        for key in [
            "cpuState",
            "memoryState",
            "rspState",
            "rdpState",
            "frameCount",
            "cycleCount",
        ] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
        assert_eq!(value["memoryState"]["rdram"], "AQID");
        assert_eq!(value["memoryState"]["cartridgeRam"], serde_json::Value::Null);
        assert_eq!(value["cycleCount"], 1u64 << 40);
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let json = r#"{
            "version": 3,
            "cpuState": {},
            "memoryState": { "rdram": "AAAA", "cartridgeRam": "/w==" },
            "rspState": {},
            "rdpState": {},
            "frameCount": 1,
            "cycleCount": 2
        }"#;
        let state = SaveState::from_json(json).unwrap();
        assert_eq!(state.memory_state.rdram, vec![0, 0, 0]);
        assert_eq!(state.memory_state.cartridge_ram, Some(vec![0xFF]));
    }

    #[test]
    fn bad_base64_is_an_error() {
        let json = r#"{"memoryState":{"rdram":"!!"},"frameCount":0,"cycleCount":0}"#;
        assert!(matches!(
            SaveState::from_json(json),
            Err(SaveStateError::Json(_))
        ));
    }

    #[test]
    fn capture_and_restore_through_json() {
        let mut bus = AddressSpace::new(Box::new(RomCartridge::new(vec![], Some(32))));
        bus.write32(0x8000_0100, 0x1234_5678);
        bus.write32(0xA800_0000, 0xFEED_FACE);

        let json = SaveState::capture(&bus, json!({}), json!({}), json!({}), 60, 93_750_000)
            .to_json()
            .unwrap();

        bus.reset();
        bus.write32(0xA800_0000, 0);
        assert_eq!(bus.read32(0x100), 0);

        SaveState::from_json(&json).unwrap().restore(&mut bus);
        assert_eq!(bus.read32(0x100), 0x1234_5678);
        assert_eq!(bus.read32(0x0800_0000), 0xFEED_FACE);
    }
}
