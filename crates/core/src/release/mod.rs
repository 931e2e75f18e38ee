//! Release packaging
//!
//! Stages a build output together with a version manifest and the extra release
//! files, then compresses the staging folder into a zip archive next to it.

pub mod metadata;

use std::fmt::Display;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

pub use metadata::BuildMetadata;

use crate::configs::build::ReleaseConfig;
use crate::fsutil::{collect_files, copy_dir_all, remove_path, walk_files};
use crate::types::{MarshalError, MarshalResult};

/// Name of the generated manifest inside the release folder
pub const MANIFEST_FILE: &str = "version.txt";

/// Turns a staging folder into an archive file
pub trait Archiver: Send + Sync {
    fn archive(&self, source_dir: &Path, destination: &Path) -> MarshalResult<()>;
}

/// Deflate zip with every entry under the staging folder's name
#[derive(Debug, Default, Clone, Copy)]
pub struct ZipArchiver;

impl Archiver for ZipArchiver {
    fn archive(&self, source_dir: &Path, destination: &Path) -> MarshalResult<()> {
        let prefix = source_dir
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();

        let mut writer = ZipWriter::new(File::create(destination)?);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for path in walk_files(source_dir)? {
            let relative = path.strip_prefix(source_dir).unwrap_or(&path);
            let entry = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            writer
                .start_file(format!("{}/{}", prefix, entry), options)
                .map_err(packaging("Failed to add archive entry"))?;
            let mut file = File::open(&path)?;
            std::io::copy(&mut file, &mut writer)?;
        }

        writer
            .finish()
            .map_err(packaging("Failed to finish archive"))?;
        Ok(())
    }
}

/// Where one release is staged and archived
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingLayout {
    /// `<deploy>/<FOLDER_ZIP>`, the folder that gets archived
    pub folder_dir: PathBuf,
    /// `<folder>/<FOLDER_ZIP_RELEASE>`
    pub release_dir: PathBuf,
    /// `<release>/build`, a copy of the production output
    pub build_dir: PathBuf,
    /// `<deploy>/<FOLDER_ZIP>.zip`
    pub archive_path: PathBuf,
}

pub struct ReleasePackager {
    root: PathBuf,
    config: ReleaseConfig,
    archiver: Arc<dyn Archiver>,
}

impl ReleasePackager {
    pub fn new(root: &Path, config: &ReleaseConfig) -> Self {
        Self {
            root: root.to_path_buf(),
            config: config.clone(),
            archiver: Arc::new(ZipArchiver),
        }
    }

    pub fn with_archiver(mut self, archiver: Arc<dyn Archiver>) -> Self {
        self.archiver = archiver;
        self
    }

    pub fn layout(&self, metadata: &BuildMetadata) -> StagingLayout {
        let deploy_dir = self.root.join(&self.config.deploy_dir);
        let folder = metadata.folder_zip_name();
        let folder_dir = deploy_dir.join(&folder);
        let release_dir = folder_dir.join(metadata.folder_zip_release_name());
        StagingLayout {
            build_dir: release_dir.join("build"),
            archive_path: deploy_dir.join(format!("{}.zip", folder)),
            folder_dir,
            release_dir,
        }
    }

    /// Copy the production output into the staging `build` folder
    pub async fn create_deploy_folder(
        &self,
        out_dir: &Path,
        metadata: &BuildMetadata,
    ) -> MarshalResult<StagingLayout> {
        if !out_dir.is_dir() {
            return Err(MarshalError::PackagingFailed(format!(
                "Build output '{}' does not exist",
                out_dir.display()
            )));
        }

        let layout = self.layout(metadata);
        let copied = copy_dir_all(out_dir, &layout.build_dir)
            .await
            .map_err(packaging("Failed to stage build output"))?;
        info!(files = copied, folder = %layout.folder_dir.display(), "Staged build output");
        Ok(layout)
    }

    /// Write `version.txt` into the release folder
    pub async fn create_version_file(&self, metadata: &BuildMetadata) -> MarshalResult<PathBuf> {
        let layout = self.layout(metadata);
        tokio::fs::create_dir_all(&layout.release_dir)
            .await
            .map_err(packaging("Failed to create release folder"))?;
        let path = layout.release_dir.join(MANIFEST_FILE);
        tokio::fs::write(&path, metadata.manifest())
            .await
            .map_err(packaging("Failed to write version file"))?;
        Ok(path)
    }

    /// Copy the configured extra files, flattened, into the release folder.
    /// A file named like the manifest is skipped.
    pub async fn copy_release_files(&self, metadata: &BuildMetadata) -> MarshalResult<usize> {
        let layout = self.layout(metadata);
        let files = collect_files(&self.root, &self.config.extra_files)?;
        tokio::fs::create_dir_all(&layout.release_dir)
            .await
            .map_err(packaging("Failed to create release folder"))?;

        let mut copied = 0;
        for file in &files {
            let Some(name) = file.file_name() else {
                continue;
            };
            if name == MANIFEST_FILE {
                warn!(file = %file.display(), "Skipping extra file that collides with the manifest");
                continue;
            }
            tokio::fs::copy(file, layout.release_dir.join(name))
                .await
                .map_err(packaging(&format!("Failed to copy '{}'", file.display())))?;
            copied += 1;
        }
        Ok(copied)
    }

    /// Archive the staging folder, removing it only once the archive exists
    pub async fn compress(&self, metadata: &BuildMetadata) -> MarshalResult<PathBuf> {
        let layout = self.layout(metadata);
        let archiver = Arc::clone(&self.archiver);
        let source = layout.folder_dir.clone();
        let destination = layout.archive_path.clone();

        let result = tokio::task::spawn_blocking(move || archiver.archive(&source, &destination))
            .await
            .map_err(packaging("Archiver panicked"))?;

        if let Err(e) = result {
            warn!(folder = %layout.folder_dir.display(), "Archiving failed, staging folder kept");
            if layout.archive_path.is_file() {
                remove_path(&layout.archive_path).await?;
            }
            return Err(match e {
                MarshalError::PackagingFailed(_) => e,
                other => MarshalError::PackagingFailed(format!(
                    "Failed to archive '{}': {}",
                    layout.folder_dir.display(),
                    other
                )),
            });
        }

        remove_path(&layout.folder_dir).await?;
        info!(archive = %layout.archive_path.display(), "Release archive created");
        Ok(layout.archive_path)
    }

    /// Stage, describe, and archive one release
    pub async fn package(&self, out_dir: &Path, metadata: &BuildMetadata) -> MarshalResult<PathBuf> {
        self.create_deploy_folder(out_dir, metadata).await?;
        self.create_version_file(metadata).await?;
        self.copy_release_files(metadata).await?;
        self.compress(metadata).await
    }
}

fn packaging<E: Display>(context: &str) -> impl FnOnce(E) -> MarshalError + '_ {
    move |e| MarshalError::PackagingFailed(format!("{}: {}", context, e))
}
