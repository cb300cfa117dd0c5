use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

pub const DUPLICATE_SERIAL: &str = "REGISTRY/DUPLICATE_SERIAL";
pub const DUPLICATE_ASSET_TAG: &str = "REGISTRY/DUPLICATE_ASSET_TAG";
pub const DUPLICATE_BOTH: &str = "REGISTRY/DUPLICATE_BOTH";

/// One piece of equipment as stored locally and mirrored outwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct AssetRecord {
    pub brand: String,
    pub serial_number: String,
    pub asset_tag: String,
    pub model: String,
    #[serde(rename = "ram", alias = "ramSpec")]
    pub ram_spec: String,
    pub processor: String,
    pub motherboard: String,
    pub storage: String,
    pub location: String,
    #[serde(default)]
    pub sector: String,
    #[serde(default)]
    pub registered_at: String,
}

impl AssetRecord {
    pub(crate) fn from_input(input: AssetInput, registered_at: String) -> Self {
        let AssetInput {
            brand,
            serial_number,
            asset_tag,
            model,
            ram_spec,
            processor,
            motherboard,
            storage,
            location,
            sector,
        } = input;
        AssetRecord {
            brand,
            serial_number,
            asset_tag,
            model,
            ram_spec,
            processor,
            motherboard,
            storage,
            location,
            sector,
            registered_at,
        }
    }

    /// Header row and cell values in wire order, used by the workbook export.
    pub fn columns() -> [&'static str; 11] {
        [
            "brand",
            "serialNumber",
            "assetTag",
            "model",
            "ram",
            "processor",
            "motherboard",
            "storage",
            "location",
            "sector",
            "registeredAt",
        ]
    }

    pub fn cells(&self) -> [&str; 11] {
        [
            self.brand.as_str(),
            self.serial_number.as_str(),
            self.asset_tag.as_str(),
            self.model.as_str(),
            self.ram_spec.as_str(),
            self.processor.as_str(),
            self.motherboard.as_str(),
            self.storage.as_str(),
            self.location.as_str(),
            self.sector.as_str(),
            self.registered_at.as_str(),
        ]
    }
}

/// Raw form submission. Every field defaults to empty so a partially filled
/// form still deserializes and the validator can name what is missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase", default)]
#[ts(export)]
pub struct AssetForm {
    pub brand: String,
    pub serial_number: String,
    pub asset_tag: String,
    pub model: String,
    #[serde(rename = "ram", alias = "ramSpec")]
    pub ram_spec: String,
    pub processor: String,
    pub motherboard: String,
    pub storage: String,
    pub location: String,
    pub sector: String,
}

impl From<&AssetRecord> for AssetForm {
    fn from(record: &AssetRecord) -> Self {
        AssetForm {
            brand: record.brand.clone(),
            serial_number: record.serial_number.clone(),
            asset_tag: record.asset_tag.clone(),
            model: record.model.clone(),
            ram_spec: record.ram_spec.clone(),
            processor: record.processor.clone(),
            motherboard: record.motherboard.clone(),
            storage: record.storage.clone(),
            location: record.location.clone(),
            sector: record.sector.clone(),
        }
    }
}

/// A form that passed [`crate::validation::validate_form`]. Only the validator
/// constructs it, so the registry never sees unchecked input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetInput {
    pub(crate) brand: String,
    pub(crate) serial_number: String,
    pub(crate) asset_tag: String,
    pub(crate) model: String,
    pub(crate) ram_spec: String,
    pub(crate) processor: String,
    pub(crate) motherboard: String,
    pub(crate) storage: String,
    pub(crate) location: String,
    pub(crate) sector: String,
}

impl AssetInput {
    pub fn serial_number(&self) -> &str {
        &self.serial_number
    }

    pub fn asset_tag(&self) -> &str {
        &self.asset_tag
    }

    pub fn location(&self) -> &str {
        &self.location
    }
}

/// Which unique field(s) a rejected record collided on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum DuplicateKind {
    #[error("An item is already registered with this serial number.")]
    SerialNumber,
    #[error("An item is already registered with this asset tag.")]
    AssetTag,
    #[error("An item is already registered with this serial number and asset tag.")]
    Both,
}

impl DuplicateKind {
    pub fn classify(serial_taken: bool, asset_tag_taken: bool) -> Option<Self> {
        match (serial_taken, asset_tag_taken) {
            (true, true) => Some(DuplicateKind::Both),
            (true, false) => Some(DuplicateKind::SerialNumber),
            (false, true) => Some(DuplicateKind::AssetTag),
            (false, false) => None,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            DuplicateKind::SerialNumber => DUPLICATE_SERIAL,
            DuplicateKind::AssetTag => DUPLICATE_ASSET_TAG,
            DuplicateKind::Both => DUPLICATE_BOTH,
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            DUPLICATE_SERIAL => Some(DuplicateKind::SerialNumber),
            DUPLICATE_ASSET_TAG => Some(DuplicateKind::AssetTag),
            DUPLICATE_BOTH => Some(DuplicateKind::Both),
            _ => None,
        }
    }
}
