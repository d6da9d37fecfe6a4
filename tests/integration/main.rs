//! Integration tests for xcache

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use tempfile::TempDir;

    fn xcache() -> Command {
        cargo_bin_cmd!("xcache")
    }

    #[test]
    fn help_displays() {
        xcache()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("Xcode DerivedData"));
    }

    #[test]
    fn version_displays() {
        xcache()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("xcache"));
    }

    #[test]
    fn config_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("custom.toml");
        xcache()
            .args(["config", "path", "--config"])
            .arg(&path)
            .assert()
            .success()
            .stdout(predicate::str::contains("custom.toml"));
    }

    #[test]
    fn config_show() {
        let temp = TempDir::new().unwrap();
        xcache()
            .args(["config", "show", "--config"])
            .arg(temp.path().join("none.toml"))
            .assert()
            .success()
            .stdout(predicate::str::contains("[cache]"))
            .stdout(predicate::str::contains("use_default_mtime_targets = true"));
    }

    #[test]
    fn config_init_writes_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested/config.toml");
        xcache()
            .args(["config", "init", "--config"])
            .arg(&path)
            .assert()
            .success()
            .stdout(predicate::str::contains("Configuration initialized"));

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("[swiftpm]"));

        xcache()
            .args(["config", "init", "--config"])
            .arg(&path)
            .assert()
            .success()
            .stdout(predicate::str::contains("already exists"));
    }

    #[test]
    fn invalid_config_file_fails() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("broken.toml");
        std::fs::write(&path, "[cache\n").unwrap();
        xcache()
            .args(["config", "show", "--config"])
            .arg(&path)
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid configuration"));
    }

    #[test]
    fn restore_without_key_fails() {
        let temp = TempDir::new().unwrap();
        xcache()
            .current_dir(temp.path())
            .env_remove("XCACHE_KEY")
            .args(["restore", "--config"])
            .arg(temp.path().join("none.toml"))
            .assert()
            .failure()
            .stderr(predicate::str::contains("Missing required input: key"))
            .stderr(predicate::str::contains("Hint:"));
    }
}

#[cfg(any(target_os = "macos", target_os = "linux"))]
mod round_trip_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use filetime::FileTime;
    use predicates::prelude::*;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    const ISOLATED_ENV: &[&str] = &[
        "XCACHE_CONFIG",
        "XCACHE_KEY",
        "XCACHE_RESTORE_KEYS",
        "XCACHE_SOURCEPACKAGES_DIRECTORY",
        "XCACHE_RESTORE_MTIME_TARGETS",
        "XCACHE_SWIFTPM_CACHE_KEY",
        "XCACHE_SWIFTPM_CACHE_RESTORE_KEYS",
        "XCACHE_USE_DEFAULT_MTIME_TARGETS",
        "XCACHE_DELETE_USED_DERIVEDDATA_CACHE",
        "XCACHE_TOKEN",
        "XCACHE_CACHE_READ_ONLY",
        "XCACHE_BACKEND",
        "XCACHE_STATE",
        "XCACHE_NESTED_STRATEGY",
        "XCACHE_LOG",
    ];

    struct Fixture {
        root: TempDir,
        workspace: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let root = TempDir::new().unwrap();
            let workspace = root.path().join("workspace");

            fs::create_dir_all(workspace.join("Sources")).unwrap();
            fs::write(workspace.join("Sources/App.swift"), "print(\"app\")").unwrap();
            fs::write(workspace.join("Sources/Edited.swift"), "let v = 1").unwrap();

            let project = workspace.join("DerivedData/App-abc");
            fs::create_dir_all(project.join("Build")).unwrap();
            fs::write(project.join("Build/App.o"), "object").unwrap();
            let checkout = project.join("SourcePackages/checkouts/swift-log");
            fs::create_dir_all(&checkout).unwrap();
            fs::write(checkout.join("Package.swift"), "// swift-tools-version:5.9").unwrap();

            set_mtime(&workspace.join("Sources/App.swift"), 1_600_000_000, 123_456_789);
            set_mtime(&workspace.join("Sources/Edited.swift"), 1_600_000_000, 0);

            Self { root, workspace }
        }

        fn store_dir(&self) -> PathBuf {
            self.root.path().join("store")
        }

        fn state_file(&self) -> PathBuf {
            self.root.path().join("state.json")
        }

        fn cmd(&self, phase: &str, key: &str) -> Command {
            let mut cmd = cargo_bin_cmd!("xcache");
            for var in ISOLATED_ENV {
                cmd.env_remove(var);
            }
            cmd.current_dir(&self.workspace)
                .arg(phase)
                .args(["--key", key, "--deriveddata-directory", "DerivedData"])
                .arg("--backend-root")
                .arg(self.store_dir())
                .arg("--state-file")
                .arg(self.state_file())
                .arg("--temp-directory")
                .arg(self.root.path().join("tmp"))
                .arg("--config")
                .arg(self.root.path().join("none.toml"));
            cmd
        }

        fn stored_entries(&self) -> Vec<String> {
            let mut names: Vec<String> = fs::read_dir(self.store_dir())
                .unwrap()
                .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                .filter(|n| n.ends_with(".tar"))
                .collect();
            names.sort();
            names
        }

        /// Wipe DerivedData and touch sources, like a fresh CI checkout
        fn fresh_checkout(&self) {
            fs::remove_dir_all(self.workspace.join("DerivedData")).unwrap();
            set_mtime(&self.workspace.join("Sources/App.swift"), 1_700_000_000, 0);
            fs::write(self.workspace.join("Sources/Edited.swift"), "let v = 2").unwrap();
            set_mtime(&self.workspace.join("Sources/Edited.swift"), 1_700_000_000, 0);
        }
    }

    fn set_mtime(path: &Path, seconds: i64, nanos: u32) {
        let time = FileTime::from_unix_time(seconds, nanos);
        filetime::set_file_times(path, time, time).unwrap();
    }

    fn mtime(path: &Path) -> (i64, u32) {
        let time = FileTime::from_last_modification_time(&fs::metadata(path).unwrap());
        (time.unix_seconds(), time.nanoseconds())
    }

    fn entry_name(key: &str) -> String {
        format!("{}.tar", hex::encode(key))
    }

    #[test]
    fn store_then_restore_rewinds_unchanged_sources() {
        let fixture = Fixture::new();

        fixture
            .cmd("store", "deriveddata-1")
            .assert()
            .success()
            .stdout(predicate::str::contains("DerivedData saved as deriveddata-1"))
            .stdout(predicate::str::contains("SourcePackages saved as xcache-sourcepackages-"));

        let manifest = fs::read_to_string(fixture.workspace.join("DerivedData/xcache-mtime.json")).unwrap();
        assert!(manifest.contains("Sources/App.swift"));
        assert!(manifest.contains("1600000000.123456789"));
        assert!(!manifest.contains("checkouts"));
        assert_eq!(fixture.stored_entries().len(), 2);

        fixture.fresh_checkout();

        fixture
            .cmd("restore", "deriveddata-1")
            .assert()
            .success()
            .stdout(predicate::str::contains("DerivedData restored from deriveddata-1"))
            .stdout(predicate::str::contains("SourcePackages restored from xcache-sourcepackages-"));

        let workspace = &fixture.workspace;
        assert!(workspace.join("DerivedData/App-abc/Build/App.o").is_file());
        assert!(workspace
            .join("DerivedData/App-abc/SourcePackages/checkouts/swift-log/Package.swift")
            .is_file());
        assert_eq!(mtime(&workspace.join("Sources/App.swift")), (1_600_000_000, 123_456_789));
        assert_eq!(mtime(&workspace.join("Sources/Edited.swift")), (1_700_000_000, 0));

        let state = fs::read_to_string(fixture.state_file()).unwrap();
        assert!(state.contains("deriveddata-1"));
    }

    #[test]
    fn exact_restore_skips_next_save() {
        let fixture = Fixture::new();
        fixture.cmd("store", "deriveddata-1").assert().success();
        fixture.fresh_checkout();
        fixture.cmd("restore", "deriveddata-1").assert().success();

        fixture
            .cmd("store", "deriveddata-1")
            .assert()
            .success()
            .stdout(predicate::str::contains("DerivedData up to date (deriveddata-1)"))
            .stdout(predicate::str::contains("SourcePackages up to date"));
        assert_eq!(fixture.stored_entries().len(), 2);
    }

    #[test]
    fn fallback_restore_saves_new_key_and_prunes_used_entry() {
        let fixture = Fixture::new();
        fixture.cmd("store", "deriveddata-1").assert().success();
        fixture.fresh_checkout();

        fixture
            .cmd("restore", "deriveddata-2")
            .args(["--restore-keys", "deriveddata-"])
            .assert()
            .success()
            .stdout(predicate::str::contains("DerivedData restored from deriveddata-1"));

        fixture
            .cmd("store", "deriveddata-2")
            .args(["--delete-used-deriveddata-cache", "true"])
            .assert()
            .success()
            .stdout(predicate::str::contains("DerivedData saved as deriveddata-2"));

        let entries = fixture.stored_entries();
        assert!(entries.contains(&entry_name("deriveddata-2")));
        assert!(!entries.contains(&entry_name("deriveddata-1")));
    }

    fn archive_members(archive: &Path) -> Vec<String> {
        let output = std::process::Command::new("tar").arg("-tf").arg(archive).output().unwrap();
        assert!(output.status.success());
        String::from_utf8(output.stdout)
            .unwrap()
            .lines()
            .map(|line| line.trim_end_matches('/').to_string())
            .collect()
    }

    #[test]
    fn nested_strategies_keep_source_packages_out_of_deriveddata() {
        for strategy in ["relocate", "exclude"] {
            let fixture = Fixture::new();
            fixture
                .cmd("store", "deriveddata-1")
                .args(["--nested-strategy", strategy])
                .assert()
                .success()
                .stdout(predicate::str::contains("DerivedData saved as deriveddata-1"));

            let members = archive_members(&fixture.store_dir().join(entry_name("deriveddata-1")));
            assert!(members.iter().any(|m| m == "DerivedData/App-abc/Build/App.o"), "{strategy}");
            let nested: Vec<_> = members.iter().filter(|m| m.contains("SourcePackages")).collect();
            assert_eq!(nested, vec!["DerivedData/App-abc/SourcePackages"], "{strategy}");

            let checkout = fixture
                .workspace
                .join("DerivedData/App-abc/SourcePackages/checkouts/swift-log/Package.swift");
            assert!(checkout.is_file(), "{strategy}");

            fixture.fresh_checkout();
            fixture
                .cmd("restore", "deriveddata-1")
                .args(["--nested-strategy", strategy])
                .assert()
                .success()
                .stdout(predicate::str::contains("SourcePackages restored from"));
            assert!(checkout.is_file(), "{strategy}");
        }
    }

    #[test]
    fn read_only_never_writes() {
        let fixture = Fixture::new();
        fixture
            .cmd("store", "deriveddata-1")
            .args(["--cache-read-only", "true"])
            .assert()
            .success()
            .stdout(predicate::str::contains("not saved (read-only)"));
        assert!(!fixture.store_dir().exists());
    }

    #[test]
    fn restore_miss_is_not_an_error() {
        let fixture = Fixture::new();
        fixture.fresh_checkout();
        fixture
            .cmd("restore", "deriveddata-1")
            .assert()
            .success()
            .stdout(predicate::str::contains("DerivedData not restored"));
        assert_eq!(mtime(&fixture.workspace.join("Sources/App.swift")), (1_700_000_000, 0));
    }
}
