//! CLI integration tests for cbridge.
//!
//! These tests exercise the commands that do not need a C compiler: flag
//! folding, link planning over saved artifacts, and argument handling.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use assert_cmd::prelude::*;
use cbridge::core::link_directive::LinkDirective;
use cbridge::core::package::StubSymbol;
use cbridge::PackageArtifact;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get the cbridge binary command.
fn cbridge() -> Command {
    let mut cmd = Command::cargo_bin("cbridge").unwrap();
    for var in ["CGO_CFLAGS", "CGO_CPPFLAGS", "CGO_CXXFLAGS", "CGO_LDFLAGS", "GOOS", "GOARCH"] {
        cmd.env_remove(var);
    }
    cmd
}

/// Create a temporary directory for test projects.
fn temp_dir() -> TempDir {
    TempDir::new().unwrap()
}

fn save_artifact(root: &Path, artifact: &PackageArtifact) -> PathBuf {
    let dir = root.join(artifact.import_path.replace('/', "_"));
    fs::create_dir_all(&dir).unwrap();
    artifact.save(&dir).unwrap();
    dir
}

fn artifact(path: &str, imports: &[&str], uses_bridge: bool) -> PackageArtifact {
    let mut a = PackageArtifact::new(path);
    a.imports = imports.iter().map(|s| s.to_string()).collect();
    a.uses_bridge = uses_bridge;
    a
}

// ============================================================================
// cbridge --help
// ============================================================================

#[test]
fn test_help_lists_commands() {
    cbridge()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("generate"))
        .stdout(predicate::str::contains("linkplan"))
        .stdout(predicate::str::contains("dynimport"));
}

// ============================================================================
// cbridge flags
// ============================================================================

#[test]
fn test_flags_keep_declaration_order() {
    let tmp = temp_dir();
    fs::write(
        tmp.path().join("a.go"),
        "package png\n\n// #cgo LDFLAGS: -lpng\nimport \"C\"\n",
    )
    .unwrap();
    fs::write(
        tmp.path().join("b.go"),
        "package png\n\n// #cgo LDFLAGS: -lcairo\n// #cgo CFLAGS: -DPNG_DEBUG=1\nimport \"C\"\n",
    )
    .unwrap();

    cbridge()
        .args(["flags"])
        .arg(tmp.path())
        .current_dir(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("LDFLAGS: -lpng -lcairo"))
        .stdout(predicate::str::contains("CFLAGS: -DPNG_DEBUG=1"));
}

#[test]
fn test_flags_honor_conditions_and_env() {
    let tmp = temp_dir();
    fs::write(
        tmp.path().join("m.go"),
        "package m\n\n\
         // #cgo linux LDFLAGS: -lrt\n\
         // #cgo darwin LDFLAGS: -framework CoreFoundation\n\
         import \"C\"\n",
    )
    .unwrap();

    cbridge()
        .args(["flags", "--link"])
        .arg(tmp.path())
        .current_dir(tmp.path())
        .env("GOOS", "linux")
        .env("CGO_LDFLAGS", "-lextra")
        .assert()
        .success()
        .stdout(predicate::str::contains("LDFLAGS: -lrt -lextra"))
        .stdout(predicate::str::contains("CoreFoundation").not());
}

#[test]
fn test_flags_bad_directive_points_at_line() {
    let tmp = temp_dir();
    fs::write(
        tmp.path().join("m.go"),
        "package m\n\n// #cgo LDFLAGS -lpng\nimport \"C\"\n",
    )
    .unwrap();

    cbridge()
        .args(["flags"])
        .arg(tmp.path())
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing colon"));
}

// ============================================================================
// cbridge linkplan
// ============================================================================

#[test]
fn test_linkplan_plain_packages_link_internally() {
    let tmp = temp_dir();
    let dirs = vec![
        save_artifact(tmp.path(), &artifact("main", &["net"], false)),
        save_artifact(tmp.path(), &artifact("net", &[], true)),
    ];

    cbridge()
        .args(["linkplan", "--main", "main"])
        .args(&dirs)
        .current_dir(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Link mode: internal"));
}

#[test]
fn test_linkplan_non_plain_package_forces_external() {
    let tmp = temp_dir();
    let mut png = artifact("example.com/png", &[], true);
    png.directives.push(LinkDirective::LdFlag {
        arg: "-lpng".to_string(),
    });
    let dirs = vec![
        save_artifact(tmp.path(), &artifact("main", &["net", "example.com/png"], false)),
        save_artifact(tmp.path(), &artifact("net", &[], true)),
        save_artifact(tmp.path(), &png),
    ];

    cbridge()
        .args(["linkplan", "--main", "main"])
        .args(&dirs)
        .current_dir(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Link mode: external"))
        .stdout(predicate::str::contains("example.com/png"))
        .stdout(predicate::str::contains("cgo_ldflag \"-lpng\""));
}

#[test]
fn test_linkplan_reports_stub_collision() {
    let tmp = temp_dir();
    let mut a = artifact("a", &[], true);
    a.stubs.push(StubSymbol {
        name: "_cgo_0123456789ab_Cfunc_f".to_string(),
        content: "one".to_string(),
    });
    let mut b = artifact("b", &[], true);
    b.stubs.push(StubSymbol {
        name: "_cgo_0123456789ab_Cfunc_f".to_string(),
        content: "two".to_string(),
    });
    let dirs = vec![
        save_artifact(tmp.path(), &artifact("main", &["a", "b"], false)),
        save_artifact(tmp.path(), &a),
        save_artifact(tmp.path(), &b),
    ];

    cbridge()
        .args(["linkplan", "--main", "main"])
        .args(&dirs)
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("_cgo_0123456789ab_Cfunc_f"));
}

#[test]
fn test_linkplan_rejects_unknown_mode() {
    let tmp = temp_dir();
    let dir = save_artifact(tmp.path(), &artifact("main", &[], false));

    cbridge()
        .args(["linkplan", "--main", "main", "--linkmode", "static"])
        .arg(&dir)
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid link mode"));
}

// ============================================================================
// cbridge link
// ============================================================================

#[test]
fn test_link_internal_writes_plan() {
    let tmp = temp_dir();
    let dirs = vec![
        save_artifact(tmp.path(), &artifact("main", &["os/user"], false)),
        save_artifact(tmp.path(), &artifact("os/user", &[], true)),
    ];
    let out = tmp.path().join("plan.json");

    cbridge()
        .args(["link", "--main", "main", "--managed-object", "go.o", "-o"])
        .arg(&out)
        .args(&dirs)
        .current_dir(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("internal link plan"));

    let plan = fs::read_to_string(&out).unwrap();
    assert!(plan.contains("\"mode\": \"internal\""));
}

// ============================================================================
// cbridge generate / dynimport
// ============================================================================

#[test]
fn test_generate_package_without_bridge() {
    let tmp = temp_dir();
    fs::write(
        tmp.path().join("util.go"),
        "package util\n\nimport \"strings\"\n\nfunc Up(s string) string { return strings.ToUpper(s) }\n",
    )
    .unwrap();
    let objdir = tmp.path().join("obj");

    cbridge()
        .args(["generate", "--objdir"])
        .arg(&objdir)
        .arg(tmp.path().join("util.go"))
        .current_dir(tmp.path())
        .assert()
        .success();

    let artifact = PackageArtifact::load(&objdir).unwrap();
    assert!(!artifact.uses_bridge);
    assert_eq!(artifact.imports, vec!["strings".to_string()]);
}

#[test]
fn test_generate_missing_input() {
    let tmp = temp_dir();
    cbridge()
        .args(["generate", "nope.go"])
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("no such file"));
}

#[test]
fn test_dynimport_rejects_non_object() {
    let tmp = temp_dir();
    let path = tmp.path().join("notes.txt");
    fs::write(&path, "not an executable").unwrap();

    cbridge()
        .arg("dynimport")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read dynamic imports"));
}
