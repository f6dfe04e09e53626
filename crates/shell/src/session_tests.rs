use super::*;

#[test]
fn exec_result_success_checks_exit_code_zero() {
    let ok = ExecResult {
        stdout: String::new(),
        stderr: String::new(),
        exit_code: 0,
    };
    assert!(ok.success());

    let failed = ExecResult {
        stdout: String::new(),
        stderr: "boom".to_string(),
        exit_code: 1,
    };
    assert!(!failed.success());
}
