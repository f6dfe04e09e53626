//! Test helpers for `sup` CLI behavioral specifications.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Resolve the `sup` binary: debug target first, falling back to a path
/// relative to the test binary itself (works under `cargo llvm-cov` too,
/// whose test binaries land in a different target directory).
fn binary_path(name: &str) -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));

    let standard = manifest_dir.join("target/debug").join(name);
    if standard.exists() {
        return standard;
    }

    if let Ok(exe) = std::env::current_exe() {
        if let Some(debug_dir) = exe.parent().and_then(|d| d.parent()) {
            let fallback = debug_dir.join(name);
            if fallback.exists() {
                return fallback;
            }
        }
    }

    standard
}

fn sup_binary() -> PathBuf {
    binary_path("sup")
}

pub fn cli() -> CliBuilder {
    CliBuilder::new()
}

pub struct CliBuilder {
    args: Vec<String>,
    state_dir: Option<PathBuf>,
}

impl CliBuilder {
    fn new() -> Self {
        Self {
            args: Vec::new(),
            state_dir: None,
        }
    }

    pub fn args(mut self, args: &[&str]) -> Self {
        self.args.extend(args.iter().map(|s| s.to_string()));
        self
    }

    pub fn state_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.state_dir = Some(path.into());
        self
    }

    fn command(self) -> Command {
        let mut cmd = Command::new(sup_binary());
        cmd.args(&self.args);
        cmd.env_remove("SUP_CONFIG_PATH");
        if let Some(state_dir) = self.state_dir {
            cmd.env("SUP_STATE_DIR", state_dir);
        }
        cmd
    }

    pub fn passes(self) -> RunAssert {
        let mut cmd = self.command();
        let output = cmd.output().expect("command should run");
        assert!(
            output.status.success(),
            "expected command to pass, got exit code {:?}\nstdout: {}\nstderr: {}",
            output.status.code(),
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        RunAssert { output }
    }

    pub fn fails(self) -> RunAssert {
        let mut cmd = self.command();
        let output = cmd.output().expect("command should run");
        assert!(
            !output.status.success(),
            "expected command to fail, but it passed\nstdout: {}",
            String::from_utf8_lossy(&output.stdout)
        );
        RunAssert { output }
    }
}

pub struct RunAssert {
    output: Output,
}

impl RunAssert {
    pub fn stdout(&self) -> String {
        String::from_utf8_lossy(&self.output.stdout).into_owned()
    }

    pub fn stderr(&self) -> String {
        String::from_utf8_lossy(&self.output.stderr).into_owned()
    }

    pub fn stdout_has(self, expected: &str) -> Self {
        let stdout = self.stdout();
        assert!(
            stdout.contains(expected),
            "stdout does not contain '{expected}'\nstdout: {stdout}"
        );
        self
    }

    pub fn stderr_has(self, expected: &str) -> Self {
        let stderr = self.stderr();
        assert!(
            stderr.contains(expected),
            "stderr does not contain '{expected}'\nstderr: {stderr}"
        );
        self
    }
}

/// An isolated `SUP_STATE_DIR`, pre-seeded with a one-cluster
/// `clusters.toml` so `sup` commands have somewhere to admit jobs.
pub struct Project {
    state_dir: tempfile::TempDir,
}

pub const TEST_CLUSTER: &str = "testcluster";

const CLUSTER_TOML: &str = r#"
[hpc.testcluster]
ip = "testcluster.example.edu"
port = 22
root_path = "/scratch/sup"
job_pool_capacity = 2
is_community_account = true
community_login = "supuser"

[hpc.testcluster.slurm_input_rules]
nodes = 8
tasks = 8
cpus_per_task = 16
memory_per_cpu_bytes = 4000000000
memory_total_bytes = 32000000000
gpus = 4
walltime_secs = 36000

[hpc.testcluster.slurm_global_cap]
nodes = 50
tasks = 50
cpus_per_task = 50
memory_per_cpu_bytes = 10000000000
memory_total_bytes = 50000000000
gpus = 20
walltime_secs = 36000
"#;

impl Project {
    pub fn new() -> Self {
        let state_dir = tempfile::tempdir().unwrap();
        std::fs::write(state_dir.path().join("clusters.toml"), CLUSTER_TOML).unwrap();
        Self { state_dir }
    }

    pub fn sup(&self) -> CliBuilder {
        cli().state_dir(self.state_dir.path())
    }
}
