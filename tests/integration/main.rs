//! Integration tests for prebuild

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use tempfile::TempDir;

    fn prebuild() -> Command {
        cargo_bin_cmd!("prebuild")
    }

    /// Command isolated from the user's config and package roots
    fn isolated(temp: &TempDir) -> Command {
        let mut cmd = prebuild();
        cmd.env("PREBUILD_CONFIG", temp.path().join("config.toml"))
            .env("PREBUILD_PACKAGES_PATH", temp.path().join("packages"))
            .env("PREBUILD_PREBUILDS_PATH", temp.path().join("prebuilds"));
        cmd
    }

    #[test]
    fn help_displays() {
        prebuild()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("scaffolded project packages"));
    }

    #[test]
    fn version_displays() {
        prebuild()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("prebuild"));
    }

    #[test]
    fn config_path_follows_flag() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("custom.toml");

        prebuild()
            .args(["config", "path", "--config"])
            .arg(&path)
            .assert()
            .success()
            .stdout(predicate::str::contains("custom.toml"));
    }

    #[test]
    fn config_show_defaults() {
        let temp = TempDir::new().unwrap();
        isolated(&temp)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[toolchain]"))
            .stdout(predicate::str::contains("debounce_ms = 500"));
    }

    #[test]
    fn config_init_then_invalid_edit_fails() {
        let temp = TempDir::new().unwrap();
        isolated(&temp).args(["config", "init"]).assert().success();
        assert!(temp.path().join("config.toml").exists());

        std::fs::write(temp.path().join("config.toml"), "[build]\ndebounce_ms = \"x\"").unwrap();
        isolated(&temp)
            .args(["config", "show"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid configuration"));
    }

    #[test]
    fn status_of_missing_package() {
        let temp = TempDir::new().unwrap();
        isolated(&temp)
            .args(["status", "tools", "--format", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::diff("uninitialized\n"));
    }

    #[test]
    fn status_reports_failed_build() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("prebuilds").join("tools");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("tools.csproj"), "<Project />").unwrap();
        std::fs::write(dir.join(".prebuild-builderror"), "error CS1002: ; expected").unwrap();

        isolated(&temp)
            .args(["status", "tools", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("CS1002"))
            .stdout(predicate::str::contains("\"fresh\": false"));
    }

    #[test]
    fn workspace_without_build_needs_prebuild() {
        let temp = TempDir::new().unwrap();
        isolated(&temp)
            .args(["workspace", "tools"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Prebuild not found"))
            .stderr(predicate::str::contains("Hint:"));
    }

    #[test]
    fn unknown_toolchain_is_rejected() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("config.toml"), "[toolchain]\nkind = \"make\"\n").unwrap();

        isolated(&temp)
            .args(["status", "tools"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Unsupported toolchain: make"));
    }
}
