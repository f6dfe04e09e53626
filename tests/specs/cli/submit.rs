//! `sup submit`.

use crate::prelude::*;

#[test]
fn submit_prints_a_job_id() {
    let project = Project::new();
    let run = project
        .sup()
        .args(&[
            "submit",
            "--hpc",
            TEST_CLUSTER,
            "--user",
            "alice",
            "--maintainer",
            "plain-slurm",
            "--slurm",
            "nodes=1",
            "--slurm",
            "walltime=00:10:00",
        ])
        .passes();
    assert!(!run.stdout().trim().is_empty());
}

#[test]
fn submit_to_unconfigured_cluster_fails() {
    let project = Project::new();
    project
        .sup()
        .args(&[
            "submit",
            "--hpc",
            "nonexistent",
            "--user",
            "alice",
            "--maintainer",
            "plain-slurm",
        ])
        .fails()
        .stderr_has("unconfigured cluster");
}
