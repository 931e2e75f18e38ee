use std::path::Path;

use chrono::{DateTime, Local};
use tracing::warn;

use crate::configs::env::EnvSources;
use crate::execution::command::CommandExecutor;

/// Build identity used for release naming, the manifest and `fe_build_version.js`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildMetadata {
    pub commit_id: String,
    pub branch: String,
    /// Human-readable build date, `dd/mm/yyyy`
    pub build_time: String,
    /// Date used in folder names, `yyyymmdd`
    pub build_date: String,
    pub version_triple: String,
    pub build_type: String,
    pub project_name: String,
    pub release_name: String,
    /// `FOLDER_ZIP`, when the CI already decided the folder name
    pub folder_zip_override: Option<String>,
    /// `FOLDER_ZIP_RELEASE`, likewise
    pub folder_zip_release_override: Option<String>,
}

impl BuildMetadata {
    /// Gather metadata from the environment, asking git for whatever is not set
    pub async fn collect(root: &Path, env: &EnvSources) -> Self {
        let executor = CommandExecutor::new(root);
        let commit_id = match env.get("COMMIT_ID") {
            Some(commit) => commit.to_string(),
            None => git(&executor, &["rev-parse", "--short", "HEAD"]).await,
        };
        let branch = match env.get("BRANCH") {
            Some(branch) => branch.to_string(),
            None => git(&executor, &["rev-parse", "--abbrev-ref", "HEAD"]).await,
        };
        Self::from_env(env, commit_id, branch, Local::now())
    }

    pub fn from_env(env: &EnvSources, commit_id: String, branch: String, now: DateTime<Local>) -> Self {
        let version_triple = format!(
            "{}.{}.{}",
            env.get_or("MAJOR", "0"),
            env.get_or("MINOR", "0"),
            env.get_or("POINT", "0")
        );

        Self {
            commit_id,
            branch,
            build_time: env
                .get("BUILD_TIME")
                .map(str::to_string)
                .unwrap_or_else(|| now.format("%d/%m/%Y").to_string()),
            build_date: now.format("%Y%m%d").to_string(),
            version_triple,
            build_type: env.get_or("BUILD_TYPE", ""),
            project_name: env.get_or("PROJECT_NAME", ""),
            release_name: env.get_or("RELEASE_NAME", ""),
            folder_zip_override: env.get("FOLDER_ZIP").map(str::to_string),
            folder_zip_release_override: env.get("FOLDER_ZIP_RELEASE").map(str::to_string),
        }
    }

    /// `<project>-frontend-<release>-<yyyymmdd>-build-<version>-<type>`
    pub fn folder_zip_release_name(&self) -> String {
        if let Some(name) = &self.folder_zip_release_override {
            return name.clone();
        }
        format!(
            "{}-frontend-{}-{}-build-{}-{}",
            self.project_name, self.release_name, self.build_date, self.version_triple, self.build_type
        )
    }

    /// The release name followed by `-Rev-<commit>`
    pub fn folder_zip_name(&self) -> String {
        if let Some(name) = &self.folder_zip_override {
            return name.clone();
        }
        format!("{}-Rev-{}", self.folder_zip_release_name(), self.commit_id)
    }

    /// Contents of `version.txt`
    pub fn manifest(&self) -> String {
        format!(
            "Build Time: {}\nBuild Number: {}\nBuild Type: {}\nBranch: {}\nGit Commit Id: {}\n",
            self.build_time, self.version_triple, self.build_type, self.branch, self.commit_id
        )
    }
}

async fn git(executor: &CommandExecutor<'_>, args: &[&str]) -> String {
    match executor.capture("git", args).await {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "Could not read git metadata");
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> EnvSources {
        EnvSources::new(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            HashMap::new(),
        )
    }

    fn fixed_now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 7, 10, 30, 0).unwrap()
    }

    #[test]
    fn test_folder_names() {
        let env = env(&[
            ("MAJOR", "1"),
            ("MINOR", "4"),
            ("POINT", "2"),
            ("BUILD_TYPE", "RC"),
            ("PROJECT_NAME", "linear"),
            ("RELEASE_NAME", "spring"),
        ]);
        let meta = BuildMetadata::from_env(&env, "a1b2c3d".into(), "main".into(), fixed_now());

        assert_eq!(meta.version_triple, "1.4.2");
        assert_eq!(meta.build_time, "07/03/2024");
        assert_eq!(
            meta.folder_zip_release_name(),
            "linear-frontend-spring-20240307-build-1.4.2-RC"
        );
        assert_eq!(
            meta.folder_zip_name(),
            "linear-frontend-spring-20240307-build-1.4.2-RC-Rev-a1b2c3d"
        );
    }

    #[test]
    fn test_overrides_from_environment() {
        let env = env(&[
            ("FOLDER_ZIP", "custom-Rev-1"),
            ("FOLDER_ZIP_RELEASE", "custom"),
            ("BUILD_TIME", "01/01/2030"),
        ]);
        let meta = BuildMetadata::from_env(&env, "1".into(), "dev".into(), fixed_now());
        assert_eq!(meta.folder_zip_name(), "custom-Rev-1");
        assert_eq!(meta.folder_zip_release_name(), "custom");
        assert_eq!(meta.build_time, "01/01/2030");
        assert_eq!(meta.version_triple, "0.0.0");
    }

    #[test]
    fn test_manifest_lines() {
        let meta = BuildMetadata::from_env(
            &env(&[("BUILD_TYPE", "GA"), ("MAJOR", "2")]),
            "ffff".into(),
            "release/2.0".into(),
            fixed_now(),
        );
        let lines: Vec<_> = meta.manifest().lines().map(str::to_string).collect();
        assert_eq!(
            lines,
            vec![
                "Build Time: 07/03/2024",
                "Build Number: 2.0.0",
                "Build Type: GA",
                "Branch: release/2.0",
                "Git Commit Id: ffff",
            ]
        );
    }

    #[tokio::test]
    async fn test_collect_prefers_environment_over_git() {
        let dir = tempfile::tempdir().unwrap();
        let meta = BuildMetadata::collect(
            dir.path(),
            &env(&[("COMMIT_ID", "abc1234"), ("BRANCH", "feature/x")]),
        )
        .await;
        assert_eq!(meta.commit_id, "abc1234");
        assert_eq!(meta.branch, "feature/x");
    }
}
