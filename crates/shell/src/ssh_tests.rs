use super::*;

#[test]
fn fresh_shell_is_not_connected() {
    let shell = SshShell::new();
    assert!(!shell.is_connected());
}

#[tokio::test]
async fn exec_before_connect_is_not_connected_error() {
    let shell = SshShell::new();
    let err = shell.exec("echo hi").await.unwrap_err();
    assert!(matches!(err, ShellError::NotConnected));
}

#[tokio::test]
async fn dispose_before_connect_is_a_noop() {
    let mut shell = SshShell::new();
    shell.dispose().await;
    assert!(!shell.is_connected());
}
