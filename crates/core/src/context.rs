//! Shared state for built-in tasks
//!
//! A [`BuildContext`] is created once per process and handed to every built-in task
//! through an `Arc`. It carries the resolved configuration, the build layout, the
//! memoised build metadata and the background services tasks leave running.

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock, Weak};

use tokio::sync::{Mutex, OnceCell};
use tracing::info;

use crate::configs::build::{BuildConfig, BuildTarget, OutputPaths};
use crate::configs::env::{EnvSources, ResolvedConfig};
use crate::registry::TaskRegistry;
use crate::release::BuildMetadata;
use crate::server::{LiveReload, ServerHandle};
use crate::types::{MarshalError, MarshalResult};
use crate::watch::WatchHandle;

pub struct BuildContext {
    root: PathBuf,
    pub config: ResolvedConfig,
    pub build: BuildConfig,
    pub env: EnvSources,
    pub livereload: LiveReload,
    metadata: OnceCell<BuildMetadata>,
    servers: Mutex<Vec<ServerHandle>>,
    watchers: Mutex<Vec<WatchHandle>>,
    registry: OnceLock<Weak<TaskRegistry>>,
}

impl BuildContext {
    pub fn new(root: &Path, env: EnvSources, build: BuildConfig) -> MarshalResult<Self> {
        let config = ResolvedConfig::from_sources(&env)?.with_root(root);
        Ok(Self {
            root: root.to_path_buf(),
            config,
            build,
            env,
            livereload: LiveReload::default(),
            metadata: OnceCell::new(),
            servers: Mutex::new(Vec::new()),
            watchers: Mutex::new(Vec::new()),
            registry: OnceLock::new(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// A path relative to the project root
    pub fn path(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.root.join(relative)
    }

    pub fn output(&self, target: BuildTarget) -> &OutputPaths {
        self.build.output(target)
    }

    /// Build metadata, gathered on first use and shared by every later task
    pub async fn build_metadata(&self) -> BuildMetadata {
        self.metadata
            .get_or_init(|| async {
                let metadata = BuildMetadata::collect(&self.root, &self.env).await;
                info!(
                    commit = %metadata.commit_id,
                    branch = %metadata.branch,
                    version = %metadata.version_triple,
                    "Collected build info"
                );
                metadata
            })
            .await
            .clone()
    }

    /// Make the registry reachable from tasks that start new runs (the watcher).
    ///
    /// Held weakly because the registry owns the tasks that own this context.
    pub fn attach_registry(&self, registry: &Arc<TaskRegistry>) {
        let _ = self.registry.set(Arc::downgrade(registry));
    }

    pub fn registry(&self) -> MarshalResult<Arc<TaskRegistry>> {
        self.registry
            .get()
            .and_then(Weak::upgrade)
            .ok_or_else(|| MarshalError::Config("Task registry is not available".to_string()))
    }

    pub async fn register_server(&self, handle: ServerHandle) {
        self.servers.lock().await.push(handle);
    }

    pub async fn take_servers(&self) -> Vec<ServerHandle> {
        std::mem::take(&mut *self.servers.lock().await)
    }

    pub async fn register_watcher(&self, handle: WatchHandle) {
        self.watchers.lock().await.push(handle);
    }

    pub async fn take_watchers(&self) -> Vec<WatchHandle> {
        std::mem::take(&mut *self.watchers.lock().await)
    }

    /// Whether a task left a server or watcher running
    pub async fn has_background_work(&self) -> bool {
        !self.servers.lock().await.is_empty() || !self.watchers.lock().await.is_empty()
    }
}
