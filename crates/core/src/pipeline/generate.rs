//! Generated runtime configuration modules
//!
//! Both files register constants on an existing Angular module so the front-end can
//! read backend coordinates and build identity at runtime.

use std::path::{Path, PathBuf};

use serde_json::{json, Value};

use crate::configs::env::ResolvedConfig;
use crate::release::BuildMetadata;
use crate::types::{MarshalError, MarshalResult};

pub const CONFIG_FILE: &str = "config.js";
pub const FE_BUILD_FILE: &str = "fe_build_version.js";

/// Render `angular.module(<module>)` with one `.constant` call per entry, in order
pub fn angular_constants(module: &str, constants: &[(&str, Value)]) -> MarshalResult<String> {
    let mut out = format!("angular.module({})\n", to_json(&Value::from(module))?);
    for (name, value) in constants {
        out.push_str(&format!(
            "\n.constant({}, {})\n",
            to_json(&Value::from(*name))?,
            to_json(value)?
        ));
    }
    out.push_str("\n;\n");
    Ok(out)
}

/// Backend coordinates exposed to the front-end
pub fn config_constants(config: &ResolvedConfig) -> Vec<(&'static str, Value)> {
    vec![
        ("SERVICE_URL", json!(config.service_url)),
        ("PROTOCOL_BE", json!(config.api_protocol)),
        ("HOST_BE", json!(config.api_host)),
        ("PORT_BE", json!(config.api_port)),
        ("DOMAIN_BE", json!(config.api_domain)),
        ("HOST_BE_FULL", json!(config.host_full)),
        ("session_timeout", json!(config.session_timeout_seconds)),
    ]
}

/// The `FE_BUILD` constant
pub fn fe_build_constants(metadata: &BuildMetadata) -> Vec<(&'static str, Value)> {
    vec![(
        "FE_BUILD",
        json!({
            "commit_id": metadata.commit_id,
            "branch": metadata.branch,
            "name": metadata.project_name,
            "time": metadata.build_time,
            "build_number": metadata.version_triple,
            "build_type": metadata.build_type,
        }),
    )]
}

/// Write `config.js` into `js_dir`
pub async fn write_config(js_dir: &Path, module: &str, config: &ResolvedConfig) -> MarshalResult<PathBuf> {
    write_module(js_dir.join(CONFIG_FILE), module, &config_constants(config)).await
}

/// Write `fe_build_version.js` into `js_dir`
pub async fn write_fe_build_version(
    js_dir: &Path,
    module: &str,
    metadata: &BuildMetadata,
) -> MarshalResult<PathBuf> {
    write_module(js_dir.join(FE_BUILD_FILE), module, &fe_build_constants(metadata)).await
}

async fn write_module(path: PathBuf, module: &str, constants: &[(&str, Value)]) -> MarshalResult<PathBuf> {
    let content = angular_constants(module, constants)?;
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&path, content).await?;
    Ok(path)
}

fn to_json(value: &Value) -> MarshalResult<String> {
    serde_json::to_string(value)
        .map_err(|e| MarshalError::Config(format!("Failed to serialize constant: {}", e)))
}
