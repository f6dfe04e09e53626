//! `sup --help` and unknown-argument behavior.

use crate::prelude::*;

#[test]
fn help_shows_subcommands() {
    cli()
        .args(&["--help"])
        .passes()
        .stdout_has("submit")
        .stdout_has("status")
        .stdout_has("cancel");
}

#[test]
fn unknown_subcommand_fails() {
    cli().args(&["bogus"]).fails().stderr_has("error");
}

#[test]
fn submit_without_required_args_fails() {
    let project = Project::new();
    project.sup().args(&["submit"]).fails();
}
