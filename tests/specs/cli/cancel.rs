//! `sup cancel`.
//!
//! These tests never run the admission ticker, so a submitted job never
//! leaves the `Queued` phase — cancellation of a queued job is a
//! documented no-op (spec.md §9), surfaced here as the CLI reporting
//! that the job is not currently running.

use crate::prelude::*;

#[test]
fn cancel_of_still_queued_job_fails() {
    let project = Project::new();
    let submitted = project
        .sup()
        .args(&[
            "submit",
            "--hpc",
            TEST_CLUSTER,
            "--user",
            "alice",
            "--maintainer",
            "plain-slurm",
        ])
        .passes();
    let job_id = submitted.stdout().trim().to_string();

    project
        .sup()
        .args(&["cancel", "--job-id", &job_id])
        .fails()
        .stderr_has("not currently running");
}

#[test]
fn cancel_of_unknown_job_fails() {
    let project = Project::new();
    project
        .sup()
        .args(&["cancel", "--job-id", "does-not-exist"])
        .fails()
        .stderr_has("not currently running");
}
