//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Prebuild - cached builds of scaffolded project packages
///
/// Scaffolds a package directory from a template, builds it once with the
/// external toolchain, and reuses the build manifest until the project
/// file changes.
#[derive(Parser, Debug)]
#[command(name = "prebuild")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "PREBUILD_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scaffold a package if needed and build it
    Build(BuildArgs),

    /// Inspect a package directory without building
    Status(StatusArgs),

    /// Load a package and print its compilation units
    Workspace(WorkspaceArgs),

    /// Show or initialize configuration
    Config(ConfigArgs),
}

/// Arguments for the build command
#[derive(Parser, Debug)]
pub struct BuildArgs {
    /// Package name
    #[arg(default_value = "console")]
    pub name: String,

    /// Template used when the directory is empty (default: from config)
    #[arg(short, long)]
    pub template: Option<String>,

    /// Language passed to the template
    #[arg(short, long)]
    pub language: Option<String>,

    /// Language version written into the project file
    #[arg(long)]
    pub language_version: Option<String>,

    /// Package dependency to add after scaffolding (ID or ID@VERSION)
    #[arg(short, long = "package", value_parser = parse_package_spec)]
    pub packages: Vec<(String, Option<String>)>,

    /// Package directory (default: under the packages root)
    #[arg(short, long)]
    pub dir: Option<PathBuf>,

    /// Rebuild even if a fresh manifest exists
    #[arg(short, long)]
    pub force: bool,
}

/// Arguments for the status command
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// Package name
    #[arg(default_value = "console")]
    pub name: String,

    /// Package directory (default: looked up under the package roots)
    #[arg(short, long)]
    pub dir: Option<PathBuf>,

    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the workspace command
#[derive(Parser, Debug)]
pub struct WorkspaceArgs {
    /// Package name
    #[arg(default_value = "console")]
    pub name: String,

    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,

    /// Scaffold and build the package if no fresh manifest exists
    #[arg(short, long)]
    pub build: bool,

    /// Package directory (default: under the package roots)
    #[arg(short, long)]
    pub dir: Option<PathBuf>,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

/// Output format for status and workspace listings
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}

/// Parse a package dependency in ID or ID@VERSION format
fn parse_package_spec(s: &str) -> Result<(String, Option<String>), String> {
    let (name, version) = match s.split_once('@') {
        Some((name, version)) => (name, Some(version)),
        None => (s, None),
    };

    if name.is_empty() {
        return Err(format!("invalid package '{s}': missing package ID"));
    }
    if version.is_some_and(str::is_empty) {
        return Err(format!("invalid package '{s}': empty version after '@'"));
    }

    Ok((name.to_string(), version.map(str::to_string)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_package_spec_plain() {
        let (name, version) = parse_package_spec("Humanizer").unwrap();
        assert_eq!(name, "Humanizer");
        assert_eq!(version, None);
    }

    #[test]
    fn parse_package_spec_with_version() {
        let (name, version) = parse_package_spec("Newtonsoft.Json@13.0.1").unwrap();
        assert_eq!(name, "Newtonsoft.Json");
        assert_eq!(version.as_deref(), Some("13.0.1"));
    }

    #[test]
    fn parse_package_spec_invalid() {
        assert!(parse_package_spec("@1.0").is_err());
        assert!(parse_package_spec("Humanizer@").is_err());
    }

    #[test]
    fn cli_parses_build() {
        let cli = Cli::parse_from([
            "prebuild",
            "build",
            "tools",
            "--template",
            "classlib",
            "--package",
            "Newtonsoft.Json@13.0.1",
            "-p",
            "Humanizer",
            "--language-version",
            "12",
            "--force",
        ]);
        match cli.command {
            Commands::Build(args) => {
                assert_eq!(args.name, "tools");
                assert_eq!(args.template.as_deref(), Some("classlib"));
                assert_eq!(args.language_version.as_deref(), Some("12"));
                assert_eq!(
                    args.packages,
                    vec![
                        ("Newtonsoft.Json".to_string(), Some("13.0.1".to_string())),
                        ("Humanizer".to_string(), None),
                    ]
                );
                assert!(args.force);
                assert!(args.dir.is_none());
            }
            _ => panic!("expected Build command"),
        }
    }

    #[test]
    fn cli_build_defaults_to_console() {
        let cli = Cli::parse_from(["prebuild", "build"]);
        match cli.command {
            Commands::Build(args) => {
                assert_eq!(args.name, "console");
                assert!(args.packages.is_empty());
                assert!(!args.force);
            }
            _ => panic!("expected Build command"),
        }
    }

    #[test]
    fn cli_parses_workspace_format() {
        let cli = Cli::parse_from(["prebuild", "workspace", "console", "--format", "json", "-b"]);
        match cli.command {
            Commands::Workspace(args) => {
                assert!(matches!(args.format, OutputFormat::Json));
                assert!(args.build);
            }
            _ => panic!("expected Workspace command"),
        }
    }

    #[test]
    fn cli_parses_global_flags() {
        let cli = Cli::parse_from(["prebuild", "-vv", "status", "--config", "/tmp/p.toml"]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/p.toml")));
        assert!(matches!(cli.command, Commands::Status(_)));
    }

    #[test]
    fn cli_parses_config_init() {
        let cli = Cli::parse_from(["prebuild", "config", "init", "--force"]);
        match cli.command {
            Commands::Config(ConfigArgs {
                action: Some(ConfigAction::Init { force }),
            }) => assert!(force),
            _ => panic!("expected Config Init command"),
        }
    }
}
