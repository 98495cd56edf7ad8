//! Behaviour-driven tests for the package build pipeline.
//!
//! The toolchain is replaced by `StubExecutor`, so these scenarios cover
//! discovery, ordering, failure propagation and manifest generation without
//! invoking `cargo` or `wasm-tools`.

#![expect(clippy::expect_used, reason = "tests fail fast with a message on unexpected errors")]

mod support;

use camino::Utf8PathBuf;
use pkgsmith::component::CompilerConfig;
use pkgsmith::error::PackagerError;
use pkgsmith::manifest::{BUNDLE_FILE, ManifestGenerator, ManifestOutput, TABLE_FILE};
use pkgsmith::orchestrator::{BuildPlan, Orchestrator};
use pkgsmith::test_utils::StubExecutor;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use std::fs;
use support::{Sandbox, write_package};

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

struct PipelineWorld {
    sandbox: Sandbox,
    executor: StubExecutor,
    result: Option<Result<ManifestOutput, PackagerError>>,
}

#[fixture]
fn world() -> PipelineWorld {
    let sandbox = Sandbox::new();
    fs::create_dir_all(sandbox.root.join("wit")).expect("mkdir wit");
    fs::write(sandbox.root.join("wit/process.wit"), "world process {}").expect("write wit");
    fs::write(sandbox.root.join("adapter.wasm"), b"adapter").expect("write adapter");
    PipelineWorld {
        sandbox,
        executor: StubExecutor::succeeding(),
        result: None,
    }
}

impl PipelineWorld {
    fn packages_dir(&self) -> Utf8PathBuf {
        self.sandbox.root.join("packages")
    }

    fn target_dir(&self) -> Utf8PathBuf {
        self.sandbox.root.join("target")
    }

    fn plan(&self) -> BuildPlan {
        BuildPlan {
            packages_dir: self.packages_dir(),
            frontends: Vec::new(),
            skip_frontend: true,
            compiler: CompilerConfig {
                wit_dir: self.sandbox.root.join("wit"),
                adapter: self.sandbox.root.join("adapter.wasm"),
                wasm_target: "wasm32-wasi".to_owned(),
                world: "process".to_owned(),
                features: Vec::new(),
                force_rebuild: false,
            },
        }
    }

    fn error(&mut self) -> PackagerError {
        self.result
            .take()
            .expect("build ran")
            .expect_err("build failed")
    }
}

// ---------------------------------------------------------------------------
// Step definitions
// ---------------------------------------------------------------------------

#[given("a package \"{name}\" published by \"{publisher}\"")]
fn given_package(world: &mut PipelineWorld, name: String, publisher: String) {
    let pkg = write_package(&world.packages_dir(), &name, &name, &publisher);
    fs::create_dir_all(pkg.join("src")).expect("mkdir src");
    fs::write(pkg.join("Cargo.toml"), format!("[package]\nname = \"{name}\"\n"))
        .expect("write manifest");
    fs::write(pkg.join("src/lib.rs"), "").expect("write source");
}

#[given("a package directory \"{name}\" without metadata")]
fn given_broken_package(world: &mut PipelineWorld, name: String) {
    fs::create_dir_all(world.packages_dir().join(name).join("pkg")).expect("mkdir");
}

#[given("the toolchain fails on call {call}")]
fn given_failing_toolchain(world: &mut PipelineWorld, call: usize) {
    world.executor = StubExecutor::failing_at(call - 1, "error: could not compile");
}

#[when("the packages are built")]
fn when_built(world: &mut PipelineWorld) {
    let plan = world.plan();
    let result = Orchestrator::new(&plan, &world.executor)
        .quiet(true)
        .run(&mut Vec::new())
        .and_then(|built| ManifestGenerator::new(world.target_dir()).generate(&built));
    world.result = Some(result);
}

#[then("the bootstrap table lists \"{first}\" then \"{second}\"")]
fn then_table_order(world: &mut PipelineWorld, first: String, second: String) {
    let output = world
        .result
        .as_ref()
        .expect("build ran")
        .as_ref()
        .expect("build succeeded");
    let names: Vec<&str> = output
        .entries
        .iter()
        .map(|entry| entry.archive_filename.as_str())
        .collect();
    assert_eq!(names, vec![first.as_str(), second.as_str()]);

    let table = fs::read_to_string(&output.table_path).expect("table written");
    let first_at = table.find(&format!("\"{first}\"")).expect("first row");
    let second_at = table.find(&format!("\"{second}\"")).expect("second row");
    assert!(first_at < second_at);
}

#[then("the aggregate bundle exists")]
fn then_bundle_exists(world: &mut PipelineWorld) {
    assert!(world.target_dir().join(BUNDLE_FILE).is_file());
}

#[then("the build fails naming process \"{process}\"")]
fn then_fails_naming_process(world: &mut PipelineWorld, process: String) {
    let err = world.error();
    assert!(
        matches!(err, PackagerError::ToolInvocation { process: ref p, .. } if p.as_str() == process),
        "unexpected error: {err}"
    );
}

#[then("no bootstrap table or bundle is written")]
fn then_nothing_written(world: &mut PipelineWorld) {
    assert!(!world.target_dir().join("packages").join(TABLE_FILE).exists());
    assert!(!world.target_dir().join(BUNDLE_FILE).exists());
}

#[then("the build fails with missing metadata")]
fn then_missing_metadata(world: &mut PipelineWorld) {
    let err = world.error();
    assert!(matches!(err, PackagerError::MissingMetadata { .. }), "unexpected error: {err}");
}

#[then("no toolchain command was run")]
fn then_no_commands(world: &mut PipelineWorld) {
    assert!(world.executor.calls().is_empty());
}

// ---------------------------------------------------------------------------
// Scenario bindings
// ---------------------------------------------------------------------------

#[scenario(
    path = "tests/features/pipeline.feature",
    name = "Bootstrap table lists every package in order"
)]
fn scenario_table_order(world: PipelineWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/pipeline.feature",
    name = "A failing toolchain call aborts the batch"
)]
fn scenario_toolchain_failure(world: PipelineWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/pipeline.feature",
    name = "Missing metadata fails before building"
)]
fn scenario_missing_metadata(world: PipelineWorld) {
    let _ = world;
}
