//! Workspace command - load a package and print its compilation units

use crate::cache::BuildCoordinator;
use crate::cli::args::{OutputFormat, WorkspaceArgs};
use crate::cli::commands::{configure, locate_package};
use crate::config::Config;
use crate::error::PrebuildResult;
use crate::package::{PackageBuilder, CONSOLE_PACKAGE};
use crate::ui::{self, TaskSpinner, UiContext};
use crate::workspace::{CompilationUnit, CompilationWorkspace};
use console::style;
use std::sync::Arc;

/// Execute the workspace command
pub async fn execute(args: WorkspaceArgs, config: &Config) -> PrebuildResult<()> {
    let builder = package_builder(&args, config, Arc::new(BuildCoordinator::new()))?;
    let package = builder.get_package().await?;

    let workspace = match args.format {
        OutputFormat::Table => {
            let ctx = UiContext::detect();
            let mut spinner = TaskSpinner::new(&ctx);
            spinner.start(&format!("Loading {}...", package.name()));
            if !package.is_cached() {
                spinner.message(&format!("Building {}...", package.name()));
            }
            match package.get_or_create_workspace().await {
                Ok(workspace) => {
                    spinner.stop(&format!("Loaded {}", package.name()));
                    workspace
                }
                Err(e) => {
                    spinner.stop_error(&format!("Could not load {}", package.name()));
                    return Err(e);
                }
            }
        }
        _ => package.get_or_create_workspace().await?,
    };

    match args.format {
        OutputFormat::Table => print_table(&workspace),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&*workspace)?),
        OutputFormat::Plain => print_plain(&workspace),
    }

    Ok(())
}

fn package_builder(
    args: &WorkspaceArgs,
    config: &Config,
    coordinator: Arc<BuildCoordinator>,
) -> PrebuildResult<PackageBuilder> {
    let mut builder = if args.name == CONSOLE_PACKAGE {
        PackageBuilder::console_package(coordinator, args.build)
    } else {
        let mut builder = PackageBuilder::new(&args.name, coordinator);
        builder
            .use_template(&config.package.template)
            .enable_build(args.build);
        if let Some(language) = &config.package.language {
            builder.use_language(language);
        }
        builder
    };

    // Without --build the package must already exist under one of the roots.
    match (&args.dir, args.build) {
        (Some(dir), _) => {
            builder.directory(dir);
        }
        (None, false) => {
            builder.directory(locate_package(&args.name, None));
        }
        (None, true) => {}
    }

    configure(&mut builder, config)?;
    Ok(builder)
}

fn print_table(workspace: &CompilationWorkspace) {
    let ctx = UiContext::detect();

    for unit in workspace.compilation_units() {
        print_unit(&ctx, &unit);
    }
}

fn print_unit(ctx: &UiContext, unit: &CompilationUnit<'_>) {
    let project = unit.project;
    let settings = &project.settings;

    println!();
    ui::header(ctx, &project.name);
    ui::key_value(ctx, "Project file", &project.file_path.display().to_string());
    ui::key_value(ctx, "Output kind", &settings.output_kind.to_string());
    if let Some(output) = &project.output_path {
        ui::key_value(ctx, "Output", &output.display().to_string());
    }
    if let Some(version) = &settings.language_version {
        ui::key_value(ctx, "Language version", version);
    }
    if !settings.preprocessor_symbols.is_empty() {
        let symbols: Vec<&str> = settings
            .preprocessor_symbols
            .iter()
            .map(String::as_str)
            .collect();
        ui::key_value(ctx, "Symbols", &symbols.join(";"));
    }

    if unit.documents.is_empty() {
        ui::step_warn(ctx, "No source documents found on disk");
    }

    println!();
    println!("  {:<10} {}", style("KIND").bold(), style("PATH").bold());
    println!("  {}", "-".repeat(60));
    for document in unit.documents {
        println!("  {:<10} {}", "source", document.path.display());
    }
    for reference in &unit.project_references {
        println!("  {:<10} {}", "project", reference.file_path.display());
    }
    for reference in &unit.references {
        println!("  {:<10} {}", "binary", reference.display());
    }
    for analyzer in &unit.analyzers {
        println!("  {:<10} {}", "analyzer", analyzer.display());
    }

    println!();
    println!(
        "  {} document(s), {} reference(s), {} analyzer(s)",
        unit.documents.len(),
        unit.references.len() + unit.project_references.len(),
        unit.analyzers.len()
    );
}

fn print_plain(workspace: &CompilationWorkspace) {
    for unit in workspace.compilation_units() {
        for document in unit.documents {
            println!("{}", document.path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::args::{Cli, Commands};
    use clap::Parser;

    fn workspace_args(argv: &[&str]) -> WorkspaceArgs {
        let mut full = vec!["prebuild", "workspace"];
        full.extend_from_slice(argv);
        match Cli::parse_from(full).command {
            Commands::Workspace(args) => args,
            _ => panic!("expected Workspace command"),
        }
    }

    #[tokio::test]
    async fn missing_prebuild_is_reported() {
        let temp = tempfile::TempDir::new().unwrap();
        let dir = temp.path().join("tools");
        let args = workspace_args(&["tools", "--dir", dir.to_str().unwrap()]);

        let coordinator = Arc::new(BuildCoordinator::new());
        let builder = package_builder(&args, &Config::default(), coordinator).unwrap();
        let err = builder.get_package().await.unwrap_err();
        assert!(err.is_configuration());
        assert!(!dir.exists());
    }
}
