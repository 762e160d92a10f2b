//! Build command - scaffold a package if needed and build it

use crate::cache::BuildCoordinator;
use crate::cli::args::BuildArgs;
use crate::cli::commands::configure;
use crate::config::Config;
use crate::error::PrebuildResult;
use crate::package::{DirectoryWorkspace, PackageBuilder, CONSOLE_PACKAGE};
use crate::ui::{self, TaskSpinner, UiContext};
use std::sync::Arc;
use tracing::debug;

/// Execute the build command
pub async fn execute(args: BuildArgs, config: &Config) -> PrebuildResult<()> {
    let ctx = UiContext::detect();
    let builder = package_builder(&args, config, Arc::new(BuildCoordinator::new()))?;
    debug!("Package settings: {:?}", builder);

    let package = builder.get_package().await?;
    ui::header(&ctx, package.name());
    ui::key_value(&ctx, "Directory", &package.directory().display().to_string());

    if args.force && package.is_cached() {
        ui::step_info(&ctx, "Ignoring the cached build (--force)");
    }

    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start(&format!("Building {}...", package.name()));

    let result = if args.force {
        package.build().await
    } else {
        package.get_or_create_workspace().await.map(|_| ())
    };

    if let Err(e) = result {
        spinner.stop_error(&format!("Build failed for {}", package.name()));
        return Err(e);
    }

    match package.last_build() {
        Some(record) if record.from_cache => {
            spinner.stop(&format!("{} is up to date", package.name()))
        }
        _ => spinner.stop(&format!("Built {}", package.name())),
    }

    print_summary(&ctx, &package).await
}

/// Settings from the command line layered over the configured defaults
fn package_builder(
    args: &BuildArgs,
    config: &Config,
    coordinator: Arc<BuildCoordinator>,
) -> PrebuildResult<PackageBuilder> {
    let mut builder = if args.name == CONSOLE_PACKAGE && args.template.is_none() {
        PackageBuilder::console_package(coordinator, true)
    } else {
        let mut builder = PackageBuilder::new(&args.name, coordinator);
        builder
            .use_template(args.template.as_deref().unwrap_or(&config.package.template))
            .enable_build(true);
        builder
    };

    if let Some(language) = args.language.as_ref().or(config.package.language.as_ref()) {
        builder.use_language(language);
    }
    if let Some(version) = &args.language_version {
        builder.set_language_version(version);
    }
    for (name, version) in &args.packages {
        builder.add_package_reference(name, version.as_deref());
    }
    if let Some(dir) = &args.dir {
        builder.directory(dir);
    }

    configure(&mut builder, config)?;
    Ok(builder)
}

async fn print_summary(ctx: &UiContext, package: &DirectoryWorkspace) -> PrebuildResult<()> {
    ui::key_value(ctx, "State", &package.state().to_string());

    if let Some(record) = package.last_build() {
        ui::key_value(ctx, "Manifest", &record.manifest.display().to_string());
        let origin = if record.from_cache { "cache" } else { "fresh build" };
        ui::key_value(
            ctx,
            "Loaded",
            &format!("{} ({})", record.built_at.format("%Y-%m-%d %H:%M:%S"), origin),
        );
    }

    if let Some(workspace) = package.workspace() {
        let documents: usize = workspace.projects().iter().map(|p| p.documents.len()).sum();
        ui::key_value(
            ctx,
            "Projects",
            &format!("{} ({} documents)", workspace.projects().len(), documents),
        );
    }

    if let Some(framework) = package.target_framework().await? {
        ui::key_value(ctx, "Target framework", &framework);
    }
    if let Some(entry) = package.entry_point_path().await? {
        ui::key_value_status(
            ctx,
            "Entry point",
            &entry.display().to_string(),
            entry.exists(),
        );
    }

    Ok(())
}
