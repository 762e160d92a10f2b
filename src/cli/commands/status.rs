//! Status command - inspect a package directory without building

use crate::cli::args::{OutputFormat, StatusArgs};
use crate::cli::commands::locate_package;
use crate::config::Config;
use crate::error::PrebuildResult;
use crate::package::{PackageStatus, WorkspaceState};
use crate::toolchain::create_toolchain;
use crate::ui::{self, UiContext};

/// Execute the status command
pub async fn execute(args: StatusArgs, config: &Config) -> PrebuildResult<()> {
    let toolchain = create_toolchain(&config.toolchain)?;
    let directory = locate_package(&args.name, args.dir.as_deref());
    let status = PackageStatus::inspect(&args.name, &directory, toolchain.project_extension())?;

    match args.format {
        OutputFormat::Table => print_table(&status),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&status)?),
        OutputFormat::Plain => println!("{}", status.state()),
    }

    Ok(())
}

fn print_table(status: &PackageStatus) {
    let ctx = UiContext::detect();
    ui::header(&ctx, &status.name);

    let state = status.state();
    ui::key_value_status(&ctx, "State", &state.to_string(), state == WorkspaceState::Cached);

    ui::key_value_status(
        &ctx,
        "Directory",
        &status.directory.display().to_string(),
        status.exists,
    );
    ui::key_value(&ctx, "Project", &display_or_none(status.project_file.as_deref()));
    ui::key_value_status(
        &ctx,
        "Manifest",
        &display_or_none(status.manifest.as_deref()),
        status.fresh,
    );

    if status.locked {
        ui::step_warn_hint(
            &ctx,
            "Directory is locked",
            "Another process may be building this package",
        );
    }

    if let Some(error) = &status.last_error {
        let last_line = error.lines().rev().find(|l| !l.trim().is_empty());
        ui::step_error_detail(&ctx, "Last build failed", last_line.unwrap_or("(no output)"));
    }

    match state {
        WorkspaceState::Uninitialized | WorkspaceState::NeedsBuild | WorkspaceState::Failed => {
            ui::remark(&ctx, &format!("Run: prebuild build {}", status.name));
        }
        _ => {}
    }
}

fn display_or_none(path: Option<&std::path::Path>) -> String {
    path.map(|p| p.display().to_string())
        .unwrap_or_else(|| "none".to_string())
}
