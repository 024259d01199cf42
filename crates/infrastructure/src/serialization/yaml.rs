//! YAML reading.

use serde::de::DeserializeOwned;

use super::SerializationError;

/// Deserializes YAML text. An empty document reads as `T::default()`.
///
/// # Errors
///
/// Returns an error if the YAML is invalid or doesn't match the expected type.
pub fn from_yaml<T: DeserializeOwned + Default>(text: &str) -> Result<T, SerializationError> {
    if text.trim().is_empty() {
        return Ok(T::default());
    }
    Ok(serde_yaml::from_str(text)?)
}
