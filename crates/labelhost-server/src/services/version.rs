//! Version collection for the version endpoints.

use labelhost_config::ServerConfig;

use crate::dto::{ComponentVersion, VersionInfo};

/// Collects version info for the running server.
pub fn collect_versions(config: &ServerConfig) -> VersionInfo {
    VersionInfo {
        release: env!("CARGO_PKG_VERSION"),
        edition: config.version_edition.clone(),
        server: ComponentVersion {
            version: env!("CARGO_PKG_VERSION"),
            package: env!("CARGO_PKG_NAME"),
        },
        settings: None,
    }
}

/// Settings safe to show superusers on the version page.
///
/// The database location is left out.
pub fn visible_settings(config: &ServerConfig) -> serde_json::Value {
    serde_json::json!({
        "BIND_ADDR": config.bind_addr,
        "VERSION_EDITION": config.version_edition,
        "LOCAL_FILES_SERVING_ENABLED": config.local_files.serving_enabled,
        "LOCAL_FILES_DOCUMENT_ROOT": config.local_files.document_root.display().to_string(),
        "FEATURE_FLAGS_FROM_FILE": config.feature_flags.from_file,
        "FEATURE_FLAGS_FILE": config.feature_flags.file.display().to_string(),
        "FEATURE_FLAGS_DEFAULT_VALUE": config.feature_flags.default_value,
    })
}
