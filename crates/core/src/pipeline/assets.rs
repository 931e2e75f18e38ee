//! Asset operations behind the copy, bundle and stylesheet tasks
//!
//! Copying and concatenation happen in-process. Sass, lint and minification run the
//! external commands configured under `tools`; when a tool is not configured the step
//! is logged and skipped.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::configs::build::BuildTarget;
use crate::context::BuildContext;
use crate::execution::command::{render_tool_command, CommandExecutor};
use crate::fsutil::{collect_files, concat_files, copy_dir_all, copy_files_into, remove_path};
use crate::types::{MarshalError, MarshalResult};

pub const VENDOR_BUNDLE: &str = "linear-lib.js";
pub const APP_BUNDLE: &str = "linear.js";
pub const VENDOR_CSS: &str = "vendor.css";
pub const POLYFILL_DIR: &str = "polyfill";

/// Remove the generated trees of a target.
///
/// The dev clean keeps images and fonts; the deploy clean empties the whole output.
pub async fn clean(ctx: &BuildContext, target: BuildTarget) -> MarshalResult<()> {
    let out = ctx.output(target);
    match target {
        BuildTarget::Dev => {
            for dir in [out.js_dir(ctx.root()), out.css_dir(ctx.root()), out.views_dir(ctx.root())] {
                remove_path(&dir).await?;
            }
        }
        BuildTarget::Prod => remove_path(&out.root_dir(ctx.root())).await?,
    }
    Ok(())
}

pub async fn copy_views(ctx: &BuildContext, target: BuildTarget) -> MarshalResult<usize> {
    let src = ctx.path(&ctx.build.src.app_views);
    let dst = ctx.output(target).views_dir(ctx.root());
    copy_dir_all(&src, &dst).await
}

/// Shared views land in `views/common/`
pub async fn copy_views_common(ctx: &BuildContext, target: BuildTarget) -> MarshalResult<usize> {
    let base = &ctx.build.src.common_views;
    let files = collect_files(ctx.root(), &[under(base, "**/*.html")])?;
    let dst = ctx.output(target).views_dir(ctx.root()).join("common");
    copy_files_into(&files, &ctx.path(base), &dst).await
}

pub async fn copy_images(ctx: &BuildContext, target: BuildTarget) -> MarshalResult<usize> {
    let dst = ctx.output(target).images_dir(ctx.root());
    copy_dir_all(&ctx.path(&ctx.build.src.images), &dst).await
}

pub async fn copy_fonts(ctx: &BuildContext, target: BuildTarget) -> MarshalResult<usize> {
    let dst = ctx.output(target).fonts_dir(ctx.root());
    copy_dir_all(&ctx.path(&ctx.build.src.fonts), &dst).await
}

/// Copy the index page to the root of the output tree
pub async fn copy_index(ctx: &BuildContext, target: BuildTarget) -> MarshalResult<PathBuf> {
    let src = ctx.path(&ctx.build.src.index);
    let file_name = src.file_name().ok_or_else(|| {
        MarshalError::Config(format!("Index path '{}' has no file name", src.display()))
    })?;
    let dst = ctx.output(target).root_dir(ctx.root()).join(file_name);
    if let Some(parent) = dst.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::copy(&src, &dst).await?;
    Ok(dst)
}

/// Concatenate vendor stylesheets into `vendor.css`, minified for deploy
pub async fn vendor_css(ctx: &BuildContext, target: BuildTarget) -> MarshalResult<PathBuf> {
    let files = collect_files(ctx.root(), &ctx.build.vendor_css)?;
    let dest = ctx.output(target).css_dir(ctx.root()).join(VENDOR_CSS);
    concat_files(&files, &dest).await?;
    if target == BuildTarget::Prod {
        minify(ctx, ctx.build.tools.minify_css.as_deref(), &dest).await?;
    }
    Ok(dest)
}

/// Vendor bundle plus the standalone polyfills
pub async fn build_js_vendor(ctx: &BuildContext, target: BuildTarget) -> MarshalResult<Vec<PathBuf>> {
    let js_dir = ctx.output(target).js_dir(ctx.root());
    let mut outputs = Vec::new();

    let vendor = collect_files(ctx.root(), &ctx.build.vendor_js)?;
    let bundle = js_dir.join(VENDOR_BUNDLE);
    concat_files(&vendor, &bundle).await?;
    outputs.push(bundle);

    let polyfills = collect_files(ctx.root(), &ctx.build.polyfills)?;
    let polyfill_dir = js_dir.join(POLYFILL_DIR);
    for polyfill in &polyfills {
        let Some(name) = polyfill.file_name() else {
            continue;
        };
        let dest = polyfill_dir.join(name);
        concat_files(std::slice::from_ref(polyfill), &dest).await?;
        outputs.push(dest);
    }

    if target == BuildTarget::Prod {
        for output in &outputs {
            minify(ctx, ctx.build.tools.minify_js.as_deref(), output).await?;
        }
    }
    Ok(outputs)
}

/// Application bundle in `appJsOrder` order
pub async fn build_js_app(ctx: &BuildContext, target: BuildTarget) -> MarshalResult<PathBuf> {
    let app_js = &ctx.build.src.app_js;
    let patterns: Vec<String> = ctx
        .build
        .app_js_order
        .iter()
        .map(|pattern| under(app_js, pattern))
        .collect();
    let files = collect_files(ctx.root(), &patterns)?;
    let dest = ctx.output(target).js_dir(ctx.root()).join(APP_BUNDLE);
    concat_files(&files, &dest).await?;
    info!(files = files.len(), bundle = %dest.display(), "Bundled application scripts");

    if target == BuildTarget::Prod {
        minify(ctx, ctx.build.tools.minify_js.as_deref(), &dest).await?;
    }
    Ok(dest)
}

/// Compile the main stylesheet; `screen` in the file stem becomes `linear`
pub async fn sass(ctx: &BuildContext, target: BuildTarget) -> MarshalResult<Option<PathBuf>> {
    let Some(template) = ctx.build.tools.sass.as_deref() else {
        info!("No sass command configured, skipping");
        return Ok(None);
    };

    let input = ctx.path(&ctx.build.src.app_scss);
    let output = ctx
        .output(target)
        .css_dir(ctx.root())
        .join(stylesheet_name(&input));
    if let Some(parent) = output.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let command = render_tool_command(template, &[("input", &input), ("output", &output)]);
    CommandExecutor::new(ctx.root())
        .execute_shell_command(&command)
        .await?;
    Ok(Some(output))
}

/// Run the configured linter with fixes over a source directory
pub async fn lint_fix(ctx: &BuildContext, source_dir: &str) -> MarshalResult<()> {
    let Some(template) = ctx.build.tools.lint.as_deref() else {
        info!(path = source_dir, "No lint command configured, skipping");
        return Ok(());
    };
    let path = ctx.path(source_dir);
    let command = render_tool_command(template, &[("path", &path)]);
    CommandExecutor::new(ctx.root())
        .execute_shell_command(&command)
        .await
}

async fn minify(ctx: &BuildContext, tool: Option<&str>, file: &Path) -> MarshalResult<()> {
    let Some(template) = tool else {
        return Ok(());
    };
    let command = render_tool_command(template, &[("input", file), ("output", file)]);
    CommandExecutor::new(ctx.root())
        .execute_shell_command(&command)
        .await
}

/// `screen.scss` -> `linear.css`
pub fn stylesheet_name(input: &Path) -> String {
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_default();
    format!("{}.css", stem.replace("screen", "linear"))
}

fn under(dir: &str, pattern: &str) -> String {
    format!("{}/{}", dir.trim_end_matches('/'), pattern)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configs::build::BuildConfig;
    use crate::configs::env::EnvSources;

    fn touch(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn context(root: &Path, build: BuildConfig) -> BuildContext {
        BuildContext::new(root, EnvSources::default(), build).unwrap()
    }

    #[test]
    fn test_stylesheet_name() {
        assert_eq!(stylesheet_name(Path::new("src/app/scss/screen.scss")), "linear.css");
        assert_eq!(stylesheet_name(Path::new("print.scss")), "print.css");
    }

    #[tokio::test]
    async fn test_app_bundle_follows_configured_order() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(root, "src/app/js/routers.js", "// routers");
        touch(root, "src/app/js/app.js", "// app");
        touch(root, "src/app/js/controllers/home.js", "// home");
        touch(root, "src/app/js/constants/keys.js", "// keys");

        let ctx = context(root, BuildConfig::default());
        let bundle = build_js_app(&ctx, BuildTarget::Dev).await.unwrap();

        assert_eq!(bundle, root.join("dist/js/linear.js"));
        assert_eq!(
            std::fs::read_to_string(bundle).unwrap(),
            "// app\n// keys\n// home\n// routers\n"
        );
    }

    #[tokio::test]
    async fn test_vendor_bundle_and_polyfills() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(root, "node_modules/angular/angular.js", "angular");
        touch(root, "node_modules/xdomain/dist/xdomain.js", "xdomain");

        let build = BuildConfig {
            vendor_js: vec!["node_modules/angular/angular.js".into()],
            ..BuildConfig::default()
        };
        let ctx = context(root, build);
        let outputs = build_js_vendor(&ctx, BuildTarget::Prod).await.unwrap();

        assert_eq!(
            outputs,
            vec![
                root.join("build/js/linear-lib.js"),
                root.join("build/js/polyfill/xdomain.js"),
            ]
        );
    }

    #[tokio::test]
    async fn test_views_and_index_copy() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(root, "src/index.html", "<html>");
        touch(root, "src/app/views/home/main.html", "main");
        touch(root, "src/common/views/header.html", "header");
        touch(root, "src/common/views/readme.md", "skip");

        let ctx = context(root, BuildConfig::default());
        copy_views(&ctx, BuildTarget::Dev).await.unwrap();
        assert_eq!(copy_views_common(&ctx, BuildTarget::Dev).await.unwrap(), 1);
        copy_index(&ctx, BuildTarget::Dev).await.unwrap();

        assert!(root.join("dist/views/home/main.html").is_file());
        assert!(root.join("dist/views/common/header.html").is_file());
        assert!(!root.join("dist/views/common/readme.md").exists());
        assert!(root.join("dist/index.html").is_file());
    }

    #[tokio::test]
    async fn test_dev_clean_keeps_static_assets() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(root, "dist/js/linear.js", "");
        touch(root, "dist/images/logo.png", "");

        let ctx = context(root, BuildConfig::default());
        clean(&ctx, BuildTarget::Dev).await.unwrap();
        assert!(!root.join("dist/js").exists());
        assert!(root.join("dist/images/logo.png").is_file());
    }

    #[tokio::test]
    async fn test_sass_runs_configured_tool() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(root, "src/app/scss/screen.scss", "body {}");

        let mut build = BuildConfig::default();
        build.tools.sass = Some("cp {input} {output}".into());
        let ctx = context(root, build);

        let output = sass(&ctx, BuildTarget::Dev).await.unwrap();
        assert_eq!(output, Some(root.join("dist/css/linear.css")));
        assert!(root.join("dist/css/linear.css").is_file());
    }

    #[tokio::test]
    async fn test_missing_tool_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), BuildConfig::default());
        assert_eq!(sass(&ctx, BuildTarget::Dev).await.unwrap(), None);
        lint_fix(&ctx, "src/app/js/").await.unwrap();
    }
}
