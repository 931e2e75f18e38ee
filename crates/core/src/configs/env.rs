//! Runtime configuration resolution
//!
//! Every value is looked up independently: the process environment wins, then the
//! parsed `.env` file, then a literal default. Empty strings count as unset. Derived
//! values such as the service URL are only computed once all leaf values are known.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::server::middleware::{HistoryFallback, MiddlewareFactory};
use crate::types::{MarshalError, MarshalResult};

pub const DEFAULT_API_PROTOCOL: &str = "http://";
pub const DEFAULT_API_HOST: &str = "localhost";
pub const DEFAULT_API_PORT: &str = "9090";
pub const DEFAULT_MANAGEMENT_PORT: &str = "9090";
pub const DEFAULT_API_DOMAIN: &str = "rest";
pub const DEFAULT_SERVER_HOST: &str = "localhost";
pub const DEFAULT_DEV_PORT: u16 = 3000;
pub const DEFAULT_TEST_PORT: u16 = 8080;
pub const DEFAULT_PROD_PORT: u16 = 9090;
pub const DEFAULT_LIVERELOAD_PORT: u16 = 35720;
pub const DEFAULT_SESSION_TIMEOUT: u64 = 1800;

/// Settle delay applied to the servers that serve the deploy build
const BUILD_SERVER_WAIT_MILLIS: u64 = 1000;

/// The two raw configuration sources, queried key by key
#[derive(Debug, Clone, Default)]
pub struct EnvSources {
    process: HashMap<String, String>,
    dotenv: HashMap<String, String>,
}

impl EnvSources {
    pub fn new(process: HashMap<String, String>, dotenv: HashMap<String, String>) -> Self {
        Self { process, dotenv }
    }

    /// Capture the current process environment and the `.env` file under `root`
    pub fn from_process(root: &Path) -> MarshalResult<Self> {
        let dotenv = load_dotenv(&root.join(".env"))?;
        Ok(Self::new(std::env::vars().collect(), dotenv))
    }

    /// First non-empty value from the process environment or `.env`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.process
            .get(key)
            .filter(|v| !v.is_empty())
            .or_else(|| self.dotenv.get(key).filter(|v| !v.is_empty()))
            .map(String::as_str)
    }

    /// Value with a literal fallback
    pub fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or(default).to_string()
    }

    /// Value that must come from one of the sources or an explicit default;
    /// `None` makes the key mandatory
    pub fn require(&self, key: &str, default: Option<&str>) -> MarshalResult<String> {
        self.get(key)
            .or(default)
            .map(str::to_string)
            .ok_or_else(|| MarshalError::ConfigurationMissing(key.to_string()))
    }
}

/// Parse a `.env` file without touching the process environment.
///
/// A missing file is not an error; the resolver then works from the process
/// environment and defaults only.
pub fn load_dotenv(path: &Path) -> MarshalResult<HashMap<String, String>> {
    if !path.exists() {
        debug!(path = %path.display(), "No .env file found");
        return Ok(HashMap::new());
    }

    let iter = dotenvy::from_path_iter(path).map_err(|e| {
        MarshalError::Config(format!("Failed to read {}: {}", path.display(), e))
    })?;

    let mut values = HashMap::new();
    for item in iter {
        let (key, value) = item.map_err(|e| {
            MarshalError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        values.insert(key, value);
    }
    Ok(values)
}

/// Named server environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProfileName {
    Dev,
    Test,
    Prod,
}

impl ProfileName {
    pub const ALL: [ProfileName; 3] = [ProfileName::Dev, ProfileName::Test, ProfileName::Prod];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileName::Dev => "dev",
            ProfileName::Test => "test",
            ProfileName::Prod => "prod",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            ProfileName::Dev => DEFAULT_DEV_PORT,
            ProfileName::Test => DEFAULT_TEST_PORT,
            ProfileName::Prod => DEFAULT_PROD_PORT,
        }
    }

    fn env_prefix(&self) -> &'static str {
        match self {
            ProfileName::Dev => "LIVE_SERVER_DEV",
            ProfileName::Test => "LIVE_SERVER_TEST",
            ProfileName::Prod => "LIVE_SERVER_PROD",
        }
    }
}

impl fmt::Display for ProfileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProfileName {
    type Err = MarshalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dev" => Ok(ProfileName::Dev),
            "test" => Ok(ProfileName::Test),
            "prod" => Ok(ProfileName::Prod),
            other => Err(MarshalError::Config(format!(
                "Unknown server profile '{}' (expected dev, test or prod)",
                other
            ))),
        }
    }
}

/// Static server settings for one environment
#[derive(Debug, Clone)]
pub struct ServerProfile {
    pub name: ProfileName,
    pub host: String,
    pub port: u16,
    /// Searched in order; the first root containing a path serves it
    pub document_roots: Vec<PathBuf>,
    /// Delay between bind and reported readiness
    pub wait_millis: Option<u64>,
    pub live_reload_enabled: bool,
    pub middleware: Arc<dyn MiddlewareFactory>,
}

/// Fully resolved runtime configuration, computed once per process
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub api_protocol: String,
    pub api_host: String,
    pub api_port: String,
    pub management_port: String,
    pub api_domain: String,
    pub service_url: String,
    pub host_full: String,
    pub session_timeout_seconds: u64,
    pub livereload_port: u16,
    pub dev: ServerProfile,
    pub test: ServerProfile,
    pub prod: ServerProfile,
}

impl ResolvedConfig {
    /// Resolve from the live process environment and `<root>/.env`
    pub fn from_process(root: &Path) -> MarshalResult<Self> {
        Self::from_sources(&EnvSources::from_process(root)?)
    }

    pub fn from_sources(sources: &EnvSources) -> MarshalResult<Self> {
        // Leaf values first
        let api_protocol = sources.require("API_PROTOCOL", Some(DEFAULT_API_PROTOCOL))?;
        let api_host = sources.require("API_HOST", Some(DEFAULT_API_HOST))?;
        let api_port = sources.require("API_PORT", Some(DEFAULT_API_PORT))?;
        let management_port = sources.require("MANAGEMENT_PORT", Some(DEFAULT_MANAGEMENT_PORT))?;
        let api_domain = sources.require("API_DOMAIN", Some(DEFAULT_API_DOMAIN))?;
        let session_timeout_seconds =
            parse_or_default(sources, "SESSION_TIMEOUT", DEFAULT_SESSION_TIMEOUT);
        let livereload_port = parse_port(sources, "LIVERLOAD_PORT", DEFAULT_LIVERELOAD_PORT);

        let dev = resolve_profile(sources, ProfileName::Dev, vec![PathBuf::from("dist")], None)?;
        let test = resolve_profile(
            sources,
            ProfileName::Test,
            vec![PathBuf::from("build")],
            Some(BUILD_SERVER_WAIT_MILLIS),
        )?;
        let prod = resolve_profile(
            sources,
            ProfileName::Prod,
            vec![PathBuf::from("build")],
            Some(BUILD_SERVER_WAIT_MILLIS),
        )?;

        // Derived values
        let service_url = format!("{}{}:{}/{}", api_protocol, api_host, api_port, api_domain);
        let host_full = format!("{}{}:{}", api_protocol, api_host, management_port);

        Ok(Self {
            api_protocol,
            api_host,
            api_port,
            management_port,
            api_domain,
            service_url,
            host_full,
            session_timeout_seconds,
            livereload_port,
            dev,
            test,
            prod,
        })
    }

    pub fn profile(&self, name: ProfileName) -> &ServerProfile {
        match name {
            ProfileName::Dev => &self.dev,
            ProfileName::Test => &self.test,
            ProfileName::Prod => &self.prod,
        }
    }

    /// Rebase every profile's relative document roots onto `root`
    pub fn with_root(mut self, root: &Path) -> Self {
        for profile in [&mut self.dev, &mut self.test, &mut self.prod] {
            profile.document_roots = profile
                .document_roots
                .iter()
                .map(|dir| if dir.is_relative() { root.join(dir) } else { dir.clone() })
                .collect();
        }
        self
    }
}

/// Shorthand for [`ResolvedConfig::from_sources`] over two plain maps
pub fn resolve(
    process_env: &HashMap<String, String>,
    dotenv_values: &HashMap<String, String>,
) -> MarshalResult<ResolvedConfig> {
    ResolvedConfig::from_sources(&EnvSources::new(process_env.clone(), dotenv_values.clone()))
}

fn resolve_profile(
    sources: &EnvSources,
    name: ProfileName,
    document_roots: Vec<PathBuf>,
    wait_millis: Option<u64>,
) -> MarshalResult<ServerProfile> {
    let prefix = name.env_prefix();
    Ok(ServerProfile {
        name,
        host: sources.require(&format!("{}_HOST", prefix), Some(DEFAULT_SERVER_HOST))?,
        port: parse_port(sources, &format!("{}_PORT", prefix), name.default_port()),
        document_roots,
        wait_millis,
        live_reload_enabled: false,
        middleware: Arc::new(HistoryFallback::default()),
    })
}

fn parse_port(sources: &EnvSources, key: &str, default: u16) -> u16 {
    match sources.get(key).map(|raw| raw.trim().parse::<u16>()) {
        Some(Ok(port)) if port > 0 => port,
        Some(_) => {
            warn!(key, default, "Ignoring invalid port value");
            default
        }
        None => default,
    }
}

fn parse_or_default(sources: &EnvSources, key: &str, default: u64) -> u64 {
    match sources.get(key).map(|raw| raw.trim().parse::<u64>()) {
        Some(Ok(value)) => value,
        Some(Err(_)) => {
            warn!(key, default, "Ignoring non-numeric value");
            default
        }
        None => default,
    }
}
