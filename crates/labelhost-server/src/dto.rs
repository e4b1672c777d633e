//! Data transfer objects for HTTP message serialization.

use serde::Serialize;

/// Response from the health check.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Version of a single component.
#[derive(Debug, Clone, Serialize)]
pub struct ComponentVersion {
    pub version: &'static str,
    pub package: &'static str,
}

/// Platform version information.
#[derive(Debug, Clone, Serialize)]
pub struct VersionInfo {
    pub release: &'static str,
    pub edition: String,
    #[serde(rename = "labelhost-server")]
    pub server: ComponentVersion,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings: Option<serde_json::Value>,
}

/// `$system` block reported alongside feature flags.
#[derive(Debug, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct FlagSystemInfo {
    pub feature_flags_default_value: bool,
    pub feature_flags_from_file: bool,
    pub feature_flags_file: String,
    pub version_edition: String,
    pub cloud_instance: Option<bool>,
}
