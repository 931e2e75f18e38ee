//! Built-in build pipeline
//!
//! Registers the front-end tasks: asset copies and bundles for the dev tree (`dist`)
//! and their `-deploy` variants for the production tree (`build`), the generated
//! runtime configuration, servers, the watcher, release packaging, and the composite
//! `build`, `deploy` and `default` flows.

pub mod assets;
pub mod generate;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use colored::*;
use tracing::{info, warn};

use crate::configs::build::BuildTarget;
use crate::configs::env::ProfileName;
use crate::context::BuildContext;
use crate::execution::command::CommandExecutor;
use crate::execution::spec::RunSpec;
use crate::fsutil::remove_path;
use crate::registry::{Task, TaskRegistry};
use crate::release::ReleasePackager;
use crate::server;
use crate::types::MarshalResult;
use crate::watch;

/// Dev tasks run side by side by `default` after `clean`
pub const DEV_PARALLEL_TASKS: [&str; 13] = [
    "copy-views",
    "copy-views-common",
    "copy-fonts",
    "copy-images",
    "lint-app:fix",
    "lint-common:fix",
    "index",
    "build-js-vendor",
    "build-js-linear",
    "make-config",
    "make-fe-build-version",
    "sass",
    "vendor-css",
];

/// Deploy tasks grouped under `common-deploy`
pub const COMMON_DEPLOY_TASKS: [&str; 6] = [
    "sass-deploy",
    "copy-images-deploy",
    "copy-views-deploy",
    "copy-views-common-deploy",
    "copy-fonts-deploy",
    "index-deploy",
];

/// Register every built-in task
pub fn register_builtin_tasks(registry: &mut TaskRegistry, ctx: &Arc<BuildContext>) -> MarshalResult<()> {
    register(registry, step(ctx, "get-build-info", "Collect commit, branch and version info", |ctx| async move {
        ctx.build_metadata().await;
        Ok(())
    }))?;

    register_target_tasks(registry, ctx, BuildTarget::Dev)?;
    register_target_tasks(registry, ctx, BuildTarget::Prod)?;

    register(registry, step(ctx, "lint-app:fix", "Lint and fix application scripts", |ctx| async move {
        assets::lint_fix(&ctx, &ctx.build.src.app_js).await
    }))?;
    register(registry, step(ctx, "lint-common:fix", "Lint and fix shared scripts", |ctx| async move {
        assets::lint_fix(&ctx, &ctx.build.src.common_js).await
    }))?;

    register(registry, step(ctx, "unit-tests", "Run the unit test suite", |ctx| async move {
        match ctx.build.tools.test_runner.as_deref() {
            Some(command) => {
                CommandExecutor::new(ctx.root())
                    .with_env("MARSHAL_TASK", "unit-tests")
                    .execute_shell_command(command)
                    .await
            }
            None => {
                warn!("No test runner configured, skipping unit tests");
                Ok(())
            }
        }
    }))?;

    register_server_tasks(registry, ctx)?;
    register_release_tasks(registry, ctx)?;

    register(registry, step(ctx, "watch", "Rebuild on source changes and notify live reload", |ctx| async move {
        start_watch(ctx).await
    }))?;

    register(
        registry,
        Task::composite("common-deploy", RunSpec::new().parallel(COMMON_DEPLOY_TASKS))
            .with_description("Stylesheets, views, images, fonts and index for deploy"),
    )?;
    register(
        registry,
        Task::composite(
            "build",
            RunSpec::new()
                .then("common-deploy")
                .then("vendor-css-deploy")
                .then("build-js-vendor-deploy")
                .then("build-js-linear-deploy")
                .then("make-config-deploy")
                .then("make-fe-build-version-deploy"),
        )
        .with_dependencies(["clean-deploy"])
        .with_description("Production build into the deploy tree"),
    )?;
    register(
        registry,
        Task::composite(
            "deploy",
            RunSpec::new()
                .then("build")
                .then("unit-tests")
                .then("zip-build-folder"),
        )
        .with_description("Build, test and package a release archive"),
    )?;
    register(
        registry,
        Task::composite(
            "default",
            RunSpec::new()
                .then("clean")
                .parallel(DEV_PARALLEL_TASKS)
                .then("server-dev-start")
                .then("watch"),
        )
        .with_description("Development build, dev server and watcher"),
    )?;

    Ok(())
}

fn register_target_tasks(
    registry: &mut TaskRegistry,
    ctx: &Arc<BuildContext>,
    target: BuildTarget,
) -> MarshalResult<()> {
    let suffix = match target {
        BuildTarget::Dev => "",
        BuildTarget::Prod => "-deploy",
    };
    let name = |base: &str| format!("{}{}", base, suffix);

    register(registry, step(ctx, &name("clean"), "Remove generated output", move |ctx| async move {
        assets::clean(&ctx, target).await
    }))?;
    register(registry, step(ctx, &name("copy-views"), "Copy application views", move |ctx| async move {
        assets::copy_views(&ctx, target).await.map(drop)
    }))?;
    register(registry, step(ctx, &name("copy-views-common"), "Copy shared views", move |ctx| async move {
        assets::copy_views_common(&ctx, target).await.map(drop)
    }))?;
    register(registry, step(ctx, &name("copy-images"), "Copy images", move |ctx| async move {
        assets::copy_images(&ctx, target).await.map(drop)
    }))?;
    register(registry, step(ctx, &name("copy-fonts"), "Copy fonts", move |ctx| async move {
        assets::copy_fonts(&ctx, target).await.map(drop)
    }))?;
    register(registry, step(ctx, &name("index"), "Copy the index page", move |ctx| async move {
        assets::copy_index(&ctx, target).await.map(drop)
    }))?;
    register(registry, step(ctx, &name("build-js-vendor"), "Bundle vendor scripts and polyfills", move |ctx| async move {
        assets::build_js_vendor(&ctx, target).await.map(drop)
    }))?;
    register(registry, step(ctx, &name("build-js-linear"), "Bundle application scripts", move |ctx| async move {
        assets::build_js_app(&ctx, target).await.map(drop)
    }))?;
    register(registry, step(ctx, &name("vendor-css"), "Bundle vendor stylesheets", move |ctx| async move {
        assets::vendor_css(&ctx, target).await.map(drop)
    }))?;
    register(registry, step(ctx, &name("sass"), "Compile the main stylesheet", move |ctx| async move {
        assets::sass(&ctx, target).await.map(drop)
    }))?;
    register(registry, step(ctx, &name("make-config"), "Generate config.js", move |ctx| async move {
        let js_dir = ctx.output(target).js_dir(ctx.root());
        generate::write_config(&js_dir, &ctx.build.angular_module, &ctx.config)
            .await
            .map(drop)
    }))?;
    register(registry, step(ctx, &name("del-config-file"), "Delete config.js", move |ctx| async move {
        remove_path(&ctx.output(target).js_dir(ctx.root()).join(generate::CONFIG_FILE)).await
    }))?;
    register(registry, step(ctx, &name("del-fe-build-file"), "Delete fe_build_version.js", move |ctx| async move {
        remove_path(&ctx.output(target).js_dir(ctx.root()).join(generate::FE_BUILD_FILE)).await
    }))?;
    register(
        registry,
        step(ctx, &name("make-fe-build-version"), "Generate fe_build_version.js", move |ctx| async move {
            let metadata = ctx.build_metadata().await;
            let js_dir = ctx.output(target).js_dir(ctx.root());
            generate::write_fe_build_version(&js_dir, &ctx.build.angular_module, &metadata)
                .await
                .map(drop)
        })
        .with_dependencies([name("del-fe-build-file"), "get-build-info".to_string()]),
    )?;

    Ok(())
}

fn register_server_tasks(registry: &mut TaskRegistry, ctx: &Arc<BuildContext>) -> MarshalResult<()> {
    for profile in ProfileName::ALL {
        let server_task = format!("{}-server", profile);
        register(
            registry,
            step(ctx, &server_task, "Serve the profile's document roots", move |ctx| async move {
                start_server(ctx, profile).await
            }),
        )?;
        register(
            registry,
            Task::composite(
                format!("server-{}-start", profile),
                RunSpec::new()
                    .then(server_task)
                    .on_complete(report_server_start),
            )
            .with_description(format!("Start the {} server and report the outcome", profile)),
        )?;
    }
    Ok(())
}

fn register_release_tasks(registry: &mut TaskRegistry, ctx: &Arc<BuildContext>) -> MarshalResult<()> {
    register(
        registry,
        step(ctx, "create-deploy-folder", "Stage the production build", |ctx| async move {
            let metadata = ctx.build_metadata().await;
            let out_dir = ctx.output(BuildTarget::Prod).root_dir(ctx.root());
            packager(&ctx)
                .create_deploy_folder(&out_dir, &metadata)
                .await
                .map(drop)
        })
        .with_dependencies(["get-build-info"]),
    )?;
    register(
        registry,
        step(ctx, "create-version-file", "Write version.txt into the staging folder", |ctx| async move {
            let metadata = ctx.build_metadata().await;
            packager(&ctx).create_version_file(&metadata).await.map(drop)
        })
        .with_dependencies(["create-deploy-folder"]),
    )?;
    register(
        registry,
        step(ctx, "copy-file-deploy", "Copy extra release files into the staging folder", |ctx| async move {
            let metadata = ctx.build_metadata().await;
            packager(&ctx).copy_release_files(&metadata).await.map(drop)
        })
        .with_dependencies(["create-deploy-folder"]),
    )?;
    register(
        registry,
        step(ctx, "zip-build-folder", "Archive the staging folder", |ctx| async move {
            let metadata = ctx.build_metadata().await;
            let archive = packager(&ctx).compress(&metadata).await?;
            println!("{} {}", "Release archive:".green(), archive.display());
            Ok(())
        })
        .with_dependencies(["create-deploy-folder", "create-version-file", "copy-file-deploy"]),
    )?;
    Ok(())
}

fn register(registry: &mut TaskRegistry, task: Task) -> MarshalResult<()> {
    registry.register(task)
}

/// A task whose step receives the shared context
fn step<F, Fut>(ctx: &Arc<BuildContext>, name: &str, description: &str, action: F) -> Task
where
    F: Fn(Arc<BuildContext>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = MarshalResult<()>> + Send + 'static,
{
    let ctx = Arc::clone(ctx);
    Task::new(name, move || action(Arc::clone(&ctx))).with_description(description)
}

fn packager(ctx: &BuildContext) -> ReleasePackager {
    ReleasePackager::new(ctx.root(), &ctx.build.release)
}

async fn start_server(ctx: Arc<BuildContext>, name: ProfileName) -> MarshalResult<()> {
    let profile = ctx.config.profile(name);
    let handle = server::serve(profile, &ctx.livereload).await?;
    handle.ready().await;
    println!(
        "{} {} on http://{}",
        "Serving".green().bold(),
        name,
        handle.local_addr()
    );
    ctx.register_server(handle).await;
    Ok(())
}

async fn start_watch(ctx: Arc<BuildContext>) -> MarshalResult<()> {
    let registry = ctx.registry()?;
    let rules = watch::watch_rules(ctx.root(), &ctx.build);
    let handle = watch::spawn(
        rules,
        Duration::from_millis(ctx.build.watch_interval_millis),
        Arc::downgrade(&registry),
        ctx.livereload.clone(),
    )?;
    ctx.register_watcher(handle).await;

    // The dev server mounts the endpoint itself when live reload is enabled there
    if !ctx.config.dev.live_reload_enabled {
        let listener =
            server::listen_livereload(&ctx.config.dev.host, ctx.config.livereload_port, &ctx.livereload)
                .await?;
        info!(addr = %listener.local_addr(), "Live reload listening");
        ctx.register_server(listener).await;
    }
    Ok(())
}

fn report_server_start(result: &MarshalResult<()>) {
    match result {
        Ok(()) => println!("{}", "Server ran successfully!".green()),
        Err(e) => {
            println!("{}", "Sorry! Server could not be ran. Please try to again".red());
            println!("{}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configs::build::BuildConfig;
    use crate::configs::env::EnvSources;
    use crate::execution::{TaskRunner, TaskRunnerConfig};
    use std::collections::HashMap;
    use std::path::Path;

    fn touch(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn project() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(root, "src/index.html", "<html></html>");
        touch(root, "src/app/js/app.js", "angular.module('linear', []);");
        touch(root, "src/app/js/routers.js", "// routes");
        touch(root, "src/app/views/home.html", "<div></div>");
        touch(root, "src/images/logo.png", "png");
        touch(root, "release/run.sh", "#!/bin/sh");
        dir
    }

    fn setup(root: &Path) -> (Arc<BuildContext>, Arc<TaskRegistry>) {
        let env = EnvSources::new(
            [
                ("COMMIT_ID", "abc1234"),
                ("BRANCH", "main"),
                ("PROJECT_NAME", "linear"),
                ("RELEASE_NAME", "r1"),
                ("BUILD_TYPE", "GA"),
                ("MAJOR", "1"),
                ("MINOR", "2"),
                ("POINT", "3"),
            ]
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
            HashMap::new(),
        );
        let ctx = Arc::new(BuildContext::new(root, env, BuildConfig::default()).unwrap());
        let mut registry = TaskRegistry::new();
        register_builtin_tasks(&mut registry, &ctx).unwrap();
        let registry = Arc::new(registry);
        ctx.attach_registry(&registry);
        (ctx, registry)
    }

    fn runner(registry: &Arc<TaskRegistry>) -> TaskRunner {
        TaskRunner::with_config(
            Arc::clone(registry),
            TaskRunnerConfig {
                show_headers: false,
            },
        )
    }

    #[test]
    fn test_builtin_tasks_are_consistent() {
        let dir = tempfile::tempdir().unwrap();
        let (_ctx, registry) = setup(dir.path());
        registry.validate_references().unwrap();

        for name in [
            "default",
            "build",
            "deploy",
            "common-deploy",
            "server-dev-start",
            "server-test-start",
            "server-prod-start",
            "zip-build-folder",
            "make-fe-build-version-deploy",
            "watch",
        ] {
            assert!(registry.contains(name), "{} is missing", name);
        }
    }

    #[test]
    fn test_deploy_order() {
        let dir = tempfile::tempdir().unwrap();
        let (_ctx, registry) = setup(dir.path());
        let order = registry.execution_order("deploy").unwrap();
        let position = |name: &str| order.iter().position(|n| n == name).unwrap();

        assert!(position("clean-deploy") < position("build"));
        assert!(position("build") < position("deploy"));
        assert!(position("create-deploy-folder") < position("create-version-file"));
        assert!(position("copy-file-deploy") < position("zip-build-folder"));
        assert!(position("get-build-info") < position("make-fe-build-version-deploy"));
    }

    #[tokio::test]
    async fn test_build_writes_production_tree() {
        let dir = project();
        let root = dir.path();
        let (_ctx, registry) = setup(root);

        runner(&registry).run("build").await.unwrap();

        assert!(root.join("build/index.html").is_file());
        assert!(root.join("build/views/home.html").is_file());
        assert!(root.join("build/images/logo.png").is_file());
        assert!(root.join("build/js/linear.js").is_file());
        let config = std::fs::read_to_string(root.join("build/js/config.js")).unwrap();
        assert!(config.contains("http://localhost:9090/rest"));
        let fe_build = std::fs::read_to_string(root.join("build/js/fe_build_version.js")).unwrap();
        assert!(fe_build.contains("\"build_number\":\"1.2.3\""));
        assert!(fe_build.contains("\"commit_id\":\"abc1234\""));
    }

    #[tokio::test]
    async fn test_deploy_produces_archive() {
        let dir = project();
        let root = dir.path();
        let (ctx, registry) = setup(root);

        runner(&registry).run("deploy").await.unwrap();

        let metadata = ctx.build_metadata().await;
        let folder = metadata.folder_zip_name();
        assert!(root.join("deploy").join(format!("{}.zip", folder)).is_file());
        assert!(!root.join("deploy").join(&folder).exists());
    }

    #[tokio::test]
    async fn test_failing_test_runner_stops_deploy() {
        let dir = project();
        let root = dir.path();
        let env = EnvSources::new(
            HashMap::from([("COMMIT_ID".to_string(), "abc".to_string())]),
            HashMap::new(),
        );
        let mut build = BuildConfig::default();
        build.tools.test_runner = Some("exit 1".into());
        let ctx = Arc::new(BuildContext::new(root, env, build).unwrap());
        let mut registry = TaskRegistry::new();
        register_builtin_tasks(&mut registry, &ctx).unwrap();
        let registry = Arc::new(registry);

        let err = runner(&registry).run("deploy").await.unwrap_err();
        assert!(err.to_string().contains("unit-tests"));
        assert!(!root.join("deploy").exists());
    }

    #[tokio::test]
    async fn test_watch_starts_livereload_listener_on_configured_port() {
        let dir = project();
        let root = dir.path();
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let env = EnvSources::new(
            HashMap::from([
                ("LIVE_SERVER_DEV_HOST".to_string(), "127.0.0.1".to_string()),
                ("LIVERLOAD_PORT".to_string(), port.to_string()),
            ]),
            HashMap::new(),
        );
        let ctx = Arc::new(BuildContext::new(root, env, BuildConfig::default()).unwrap());
        assert!(!ctx.config.dev.live_reload_enabled);
        let mut registry = TaskRegistry::new();
        register_builtin_tasks(&mut registry, &ctx).unwrap();
        let registry = Arc::new(registry);
        ctx.attach_registry(&registry);

        runner(&registry).run("watch").await.unwrap();

        let servers = ctx.take_servers().await;
        assert_eq!(servers.len(), 1);
        assert_eq!(servers[0].name(), "livereload");
        assert_eq!(servers[0].local_addr().port(), port);

        for watcher in ctx.take_watchers().await {
            watcher.stop();
        }
        for server in servers {
            server.shutdown().await.unwrap();
        }
    }
}
