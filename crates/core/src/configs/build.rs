use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::types::MarshalResult;

/// Location of the optional build configuration relative to the project root
pub const BUILD_CONFIG_PATH: &str = ".marshal/build.yml";

/// Which output tree a pipeline task writes into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildTarget {
    /// Unminified development tree served by the dev server
    Dev,
    /// Minified tree that gets packaged for release
    Prod,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BuildConfig {
    #[serde(default)]
    pub src: SourcePaths,
    #[serde(default = "OutputPaths::dev")]
    pub dev: OutputPaths,
    #[serde(default = "OutputPaths::prod")]
    pub prod: OutputPaths,
    /// Vendor scripts concatenated into `linear-lib.js`, in order
    #[serde(default)]
    pub vendor_js: Vec<String>,
    /// Vendor stylesheets concatenated into `vendor.css`, in order
    #[serde(default)]
    pub vendor_css: Vec<String>,
    /// Standalone scripts copied into `js/polyfill/`
    #[serde(default = "default_polyfills")]
    pub polyfills: Vec<String>,
    /// Glob patterns (relative to `src.appJs`) concatenated into `linear.js`, in order
    #[serde(default = "default_app_js_order")]
    pub app_js_order: Vec<String>,
    /// Angular module the generated constant files attach to
    #[serde(default = "default_angular_module")]
    pub angular_module: String,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub release: ReleaseConfig,
    #[serde(default = "default_watch_interval")]
    pub watch_interval_millis: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct SourcePaths {
    pub index: String,
    pub app_js: String,
    pub app_views: String,
    pub app_scss: String,
    pub common_js: String,
    pub common_views: String,
    pub images: String,
    pub fonts: String,
}

/// An output tree; the subdirectories are relative to `root`
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct OutputPaths {
    pub root: String,
    pub js: String,
    pub css: String,
    pub views: String,
    pub images: String,
    pub fonts: String,
}

/// External tool command lines.
///
/// Placeholders `{input}`, `{output}` and `{path}` are substituted with shell-quoted
/// paths before the command runs through `sh -c`.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct ToolsConfig {
    pub sass: Option<String>,
    pub lint: Option<String>,
    pub minify_js: Option<String>,
    pub minify_css: Option<String>,
    pub test_runner: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct ReleaseConfig {
    pub deploy_dir: String,
    /// Globs (relative to the project root) copied next to `version.txt`
    pub extra_files: Vec<String>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            src: SourcePaths::default(),
            dev: OutputPaths::dev(),
            prod: OutputPaths::prod(),
            vendor_js: Vec::new(),
            vendor_css: Vec::new(),
            polyfills: default_polyfills(),
            app_js_order: default_app_js_order(),
            angular_module: default_angular_module(),
            tools: ToolsConfig::default(),
            release: ReleaseConfig::default(),
            watch_interval_millis: default_watch_interval(),
        }
    }
}

impl Default for SourcePaths {
    fn default() -> Self {
        Self {
            index: "src/index.html".to_string(),
            app_js: "src/app/js/".to_string(),
            app_views: "src/app/views/".to_string(),
            app_scss: "src/app/scss/screen.scss".to_string(),
            common_js: "src/common/js/".to_string(),
            common_views: "src/common/views/".to_string(),
            images: "src/images/".to_string(),
            fonts: "src/fonts/".to_string(),
        }
    }
}

impl Default for OutputPaths {
    fn default() -> Self {
        Self::dev()
    }
}

impl OutputPaths {
    pub fn dev() -> Self {
        Self::rooted("dist")
    }

    pub fn prod() -> Self {
        Self::rooted("build")
    }

    fn rooted(root: &str) -> Self {
        Self {
            root: root.to_string(),
            js: "js".to_string(),
            css: "css".to_string(),
            views: "views".to_string(),
            images: "images".to_string(),
            fonts: "fonts".to_string(),
        }
    }

    pub fn root_dir(&self, project_root: &Path) -> PathBuf {
        project_root.join(&self.root)
    }

    pub fn js_dir(&self, project_root: &Path) -> PathBuf {
        self.root_dir(project_root).join(&self.js)
    }

    pub fn css_dir(&self, project_root: &Path) -> PathBuf {
        self.root_dir(project_root).join(&self.css)
    }

    pub fn views_dir(&self, project_root: &Path) -> PathBuf {
        self.root_dir(project_root).join(&self.views)
    }

    pub fn images_dir(&self, project_root: &Path) -> PathBuf {
        self.root_dir(project_root).join(&self.images)
    }

    pub fn fonts_dir(&self, project_root: &Path) -> PathBuf {
        self.root_dir(project_root).join(&self.fonts)
    }
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        Self {
            deploy_dir: "deploy".to_string(),
            extra_files: vec![
                "release/*".to_string(),
                "release/.env".to_string(),
            ],
        }
    }
}

impl BuildConfig {
    pub fn output(&self, target: BuildTarget) -> &OutputPaths {
        match target {
            BuildTarget::Dev => &self.dev,
            BuildTarget::Prod => &self.prod,
        }
    }
}

fn default_polyfills() -> Vec<String> {
    vec![
        "node_modules/respond.js/src/respond.js".to_string(),
        "node_modules/xdomain/dist/xdomain.js".to_string(),
    ]
}

fn default_app_js_order() -> Vec<String> {
    [
        "app.js",
        "constants/*.js",
        "mains/*.js",
        "controllers/*.js",
        "directives/*.js",
        "services/*.js",
        "resources/*.js",
        "routers.js",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_angular_module() -> String {
    "linear".to_string()
}

fn default_watch_interval() -> u64 {
    1000
}

pub fn parse_build_config(yaml_str: &str) -> MarshalResult<BuildConfig> {
    let config: BuildConfig = serde_yaml::from_str(yaml_str)?;
    Ok(config)
}

/// Load `.marshal/build.yml`, falling back to defaults when it does not exist
pub fn load_build_config(project_root: &Path) -> MarshalResult<BuildConfig> {
    let path = project_root.join(BUILD_CONFIG_PATH);
    if !path.exists() {
        return Ok(BuildConfig::default());
    }
    let content = std::fs::read_to_string(&path)?;
    parse_build_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_build_config(dir.path()).unwrap();
        assert_eq!(config.dev.root, "dist");
        assert_eq!(config.prod.root, "build");
        assert_eq!(config.angular_module, "linear");
        assert_eq!(config.release.deploy_dir, "deploy");
        assert!(config.tools.sass.is_none());
    }

    #[test]
    fn test_partial_config_keeps_other_defaults() {
        let config = parse_build_config(
            r#"
vendorJs:
  - node_modules/angular/angular.js
tools:
  sass: "sass {input} {output}"
prod:
  root: public
"#,
        )
        .unwrap();

        assert_eq!(config.vendor_js, vec!["node_modules/angular/angular.js"]);
        assert_eq!(config.tools.sass.as_deref(), Some("sass {input} {output}"));
        assert_eq!(config.prod.root, "public");
        assert_eq!(config.prod.js, "js");
        assert_eq!(config.dev.root, "dist");
        assert_eq!(config.src.index, "src/index.html");
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        assert!(parse_build_config("outputDir: dist\n").is_err());
    }

    #[test]
    fn test_output_dirs() {
        let config = BuildConfig::default();
        let root = Path::new("/project");
        assert_eq!(
            config.output(BuildTarget::Prod).js_dir(root),
            PathBuf::from("/project/build/js")
        );
        assert_eq!(
            config.output(BuildTarget::Dev).views_dir(root),
            PathBuf::from("/project/dist/views")
        );
    }
}
