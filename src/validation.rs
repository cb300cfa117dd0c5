use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::{
    catalog::{self, CatalogEntry, MODEL_TYPES, RAM_SPECS},
    model::{AssetForm, AssetInput},
    AppError,
};

pub const VALIDATION_MISSING_FIELD: &str = "VALIDATION/MISSING_FIELD";
pub const VALIDATION_ASSET_TAG_NOT_NUMERIC: &str = "VALIDATION/ASSET_TAG_NOT_NUMERIC";
pub const VALIDATION_NOT_IN_CATALOG: &str = "VALIDATION/NOT_IN_CATALOG";
pub const VALIDATION_SERIAL_IMMUTABLE: &str = "VALIDATION/SERIAL_IMMUTABLE";

static ASSET_TAG_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d*$").expect("asset tag pattern to compile"));

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("The {0} field is required.")]
    MissingField(&'static str),
    #[error("The asset tag may only contain digits.")]
    AssetTagNotNumeric(String),
    #[error("{value:?} is not a valid {field}.")]
    NotInCatalog { field: &'static str, value: String },
    #[error("The serial number of a registered item cannot change.")]
    SerialImmutable { expected: String, submitted: String },
}

impl ValidationError {
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::MissingField(_) => VALIDATION_MISSING_FIELD,
            ValidationError::AssetTagNotNumeric(_) => VALIDATION_ASSET_TAG_NOT_NUMERIC,
            ValidationError::NotInCatalog { .. } => VALIDATION_NOT_IN_CATALOG,
            ValidationError::SerialImmutable { .. } => VALIDATION_SERIAL_IMMUTABLE,
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(error: ValidationError) -> Self {
        let app = AppError::new(error.code(), error.to_string());
        match error {
            ValidationError::MissingField(field) => app.with_context("field", field),
            ValidationError::AssetTagNotNumeric(value) => app
                .with_context("field", "assetTag")
                .with_context("value", value),
            ValidationError::NotInCatalog { field, value } => app
                .with_context("field", field)
                .with_context("value", value),
            ValidationError::SerialImmutable {
                expected,
                submitted,
            } => app
                .with_context("expected", expected)
                .with_context("submitted", submitted),
        }
    }
}

/// Keystroke-level check the form applies to the asset tag input.
pub fn is_numeric_tag(value: &str) -> bool {
    ASSET_TAG_PATTERN.is_match(value)
}

pub(crate) fn required(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ValidationError::MissingField(field))
    } else {
        Ok(trimmed.to_string())
    }
}

fn from_catalog(
    field: &'static str,
    catalog: &[CatalogEntry],
    value: String,
) -> Result<String, ValidationError> {
    match catalog::find_value(catalog, &value) {
        Some(_) => Ok(value),
        None => Err(ValidationError::NotInCatalog { field, value }),
    }
}

/// Check a submitted form and turn it into registry input.
///
/// Fields are checked in form order so the first complaint matches the first
/// offending input. The location is normalised to its display name.
pub fn validate_form(form: &AssetForm) -> Result<AssetInput, ValidationError> {
    let brand = required("brand", &form.brand)?;
    let serial_number = required("serialNumber", &form.serial_number)?;

    let asset_tag = required("assetTag", &form.asset_tag)?;
    if !is_numeric_tag(&asset_tag) {
        return Err(ValidationError::AssetTagNotNumeric(asset_tag));
    }

    let model = from_catalog("model", MODEL_TYPES, required("model", &form.model)?)?;
    let ram_spec = from_catalog("ram", RAM_SPECS, required("ram", &form.ram_spec)?)?;
    let processor = required("processor", &form.processor)?;
    let motherboard = required("motherboard", &form.motherboard)?;
    let storage = required("storage", &form.storage)?;

    let submitted_location = required("location", &form.location)?;
    let location = catalog::resolve_location(&submitted_location)
        .ok_or(ValidationError::NotInCatalog {
            field: "location",
            value: submitted_location,
        })?
        .to_string();

    let sector = required("sector", &form.sector)?;

    Ok(AssetInput {
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
    })
}

/// Validation for an edit of the record stored under `serial_number`.
pub fn validate_edit(serial_number: &str, form: &AssetForm) -> Result<AssetInput, ValidationError> {
    let input = validate_form(form)?;
    if input.serial_number != serial_number {
        return Err(ValidationError::SerialImmutable {
            expected: serial_number.to_string(),
            submitted: input.serial_number,
        });
    }
    Ok(input)
}
