//! `sup status`.

use crate::prelude::*;

fn submit_job(project: &Project) -> String {
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
        ])
        .passes();
    run.stdout().trim().to_string()
}

#[test]
fn status_reports_queued_phase_after_submit() {
    let project = Project::new();
    let job_id = submit_job(&project);

    project
        .sup()
        .args(&["status", "--job-id", &job_id])
        .passes()
        .stdout_has(&format!("id:       {job_id}"))
        .stdout_has("phase:    queued")
        .stdout_has(&format!("hpc:      {TEST_CLUSTER}"));
}

#[test]
fn status_for_unknown_job_fails() {
    let project = Project::new();
    project
        .sup()
        .args(&["status", "--job-id", "does-not-exist"])
        .fails();
}
