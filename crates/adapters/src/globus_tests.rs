use super::*;

#[tokio::test]
async fn init_transfer_starts_active_and_records_call() {
    let adapter = FakeGlobusAdapter::new();
    let id = adapter
        .init_transfer("src#ep", "/data/a", "dst#ep", "/scratch/a")
        .await
        .unwrap();

    assert_eq!(
        adapter.query_status(&id).await.unwrap(),
        TransferStatus::Active
    );
    assert_eq!(
        adapter.calls(),
        vec![
            GlobusCall::InitTransfer {
                endpoint_src: "src#ep".to_string(),
                endpoint_dst: "dst#ep".to_string(),
            },
            GlobusCall::QueryStatus { id: id.clone() },
        ]
    );
}

#[tokio::test]
async fn monitor_transfer_returns_scripted_terminal_status() {
    let adapter = FakeGlobusAdapter::new();
    let id = adapter
        .init_transfer("src#ep", "/data/a", "dst#ep", "/scratch/a")
        .await
        .unwrap();
    adapter.set_status(&id, TransferStatus::Succeeded);

    let status = adapter.monitor_transfer(&id).await.unwrap();
    assert_eq!(status, TransferStatus::Succeeded);
}

#[tokio::test]
async fn query_status_of_unknown_transfer_is_not_found() {
    let adapter = FakeGlobusAdapter::new();
    let err = adapter
        .query_status(&TransferId("nope".to_string()))
        .await
        .unwrap_err();
    assert!(matches!(err, GlobusError::NotFound(_)));
}
