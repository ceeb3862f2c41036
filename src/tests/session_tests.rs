//! Wallet session lifecycle tests

#[cfg(test)]
mod session_tests {
    use crate::classifier::{ErrorKind, RawFailure};
    use crate::gateway::LedgerGateway;
    use crate::history::{HistoryStatus, RecordType};
    use crate::session::{ConnectionState, Notification, SessionOptions, WalletSession};
    use crate::signer::{Signer, WalletAccount};
    use crate::store::{MemoryStore, SessionStore};
    use crate::test_utils::{mock_session, MockGateway, MockSigner, MOCK_ADDRESS};
    use std::sync::Arc;
    use std::time::Duration;

    fn session_with_store(
        options: SessionOptions,
        gateway: &MockGateway,
        signer: &MockSigner,
        store: &Arc<MemoryStore>,
    ) -> Arc<WalletSession> {
        Arc::new(WalletSession::new(
            options,
            Arc::new(gateway.clone()) as Arc<dyn LedgerGateway>,
            Some(Arc::new(signer.clone()) as Arc<dyn Signer>),
            store.clone() as Arc<dyn SessionStore>,
        ))
    }

    #[tokio::test]
    async fn test_connect_normalizes_and_persists_address() {
        let gateway = MockGateway::new();
        let signer = MockSigner::new();
        signer
            .set_account(Ok(WalletAccount {
                address: "0xA11C".to_string(),
                public_key: None,
            }))
            .await;
        let store = Arc::new(MemoryStore::new());
        let session = session_with_store(SessionOptions::default(), &gateway, &signer, &store);
        let mut notifications = session.subscribe();

        let account = session.connect().await.unwrap();

        assert_eq!(account.address, MOCK_ADDRESS);
        assert_eq!(session.address().as_deref(), Some(MOCK_ADDRESS));
        assert_eq!(store.persisted_address().unwrap().as_deref(), Some(MOCK_ADDRESS));

        let snapshot = session.snapshot();
        assert_eq!(snapshot.state, ConnectionState::Connected);
        assert!(snapshot.connected);

        assert_eq!(
            notifications.try_recv().unwrap(),
            Notification::WalletConnected {
                address: MOCK_ADDRESS.to_string()
            }
        );

        // Connecting again reuses the account
        session.connect().await.unwrap();
        assert_eq!(signer.get_connect_count().await, 1);
    }

    #[tokio::test]
    async fn test_connect_without_signer() {
        let gateway = MockGateway::new();
        let session = mock_session(SessionOptions::default(), &gateway, None);
        let mut notifications = session.subscribe();

        let err = session.connect().await.unwrap_err();

        assert_eq!(err.kind, ErrorKind::WalletUnavailable);
        assert_eq!(session.snapshot().state, ConnectionState::Disconnected);
        assert!(notifications.try_recv().unwrap().is_error());
    }

    #[tokio::test]
    async fn test_connect_rejected_by_user() {
        let gateway = MockGateway::new();
        let signer = MockSigner::new();
        signer
            .set_account(Err(RawFailure::from("User rejected the request")))
            .await;
        let session = mock_session(SessionOptions::default(), &gateway, Some(&signer));

        let err = session.connect().await.unwrap_err();

        assert_eq!(err.kind, ErrorKind::PermissionDenied);
        assert!(session.address().is_none());
    }

    #[tokio::test]
    async fn test_disconnect_clears_session() {
        let gateway = MockGateway::new();
        let signer = MockSigner::new();
        let store = Arc::new(MemoryStore::new());
        let session = session_with_store(SessionOptions::default(), &gateway, &signer, &store);
        session.connect().await.unwrap();
        session.add_transaction_to_history(
            RecordType::Sample,
            "Sample Registration",
            "Registered sample: plasma",
            "0x1",
            HistoryStatus::Success,
            None,
        );
        let mut notifications = session.subscribe();

        session.disconnect().await;

        assert!(session.address().is_none());
        assert!(session.transaction_history().is_empty());
        assert_eq!(store.persisted_address().unwrap(), None);
        assert_eq!(signer.get_disconnect_count().await, 1);
        assert_eq!(
            notifications.try_recv().unwrap(),
            Notification::WalletDisconnected { external: false }
        );

        // Stored history survives and comes back on reconnect
        session.connect().await.unwrap();
        assert_eq!(session.transaction_history().len(), 1);
    }

    #[tokio::test]
    async fn test_restore_requires_network_and_signer() {
        let gateway = MockGateway::new();
        let signer = MockSigner::new();
        let store = Arc::new(MemoryStore::new());
        store.persist_address(MOCK_ADDRESS).unwrap();

        let session = session_with_store(SessionOptions::default(), &gateway, &signer, &store);
        assert!(!session.restore().await, "signer not connected");

        signer.set_connected(true).await;
        gateway.set_reachable(false).await;
        assert!(!session.restore().await, "network unreachable");
        assert!(!session.snapshot().network_connected);

        gateway.set_reachable(true).await;
        assert!(session.restore().await);
        assert_eq!(session.address().as_deref(), Some(MOCK_ADDRESS));
        assert_eq!(signer.get_connect_count().await, 0, "restore never prompts");
    }

    #[tokio::test]
    async fn test_restore_without_persisted_address() {
        let gateway = MockGateway::new();
        let signer = MockSigner::new();
        signer.set_connected(true).await;
        let session = mock_session(SessionOptions::default(), &gateway, Some(&signer));

        assert!(!session.restore().await);
        assert_eq!(session.snapshot().state, ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_liveness_detects_external_disconnect() {
        let gateway = MockGateway::new();
        let signer = MockSigner::new();
        let session = mock_session(SessionOptions::default(), &gateway, Some(&signer));
        session.connect().await.unwrap();
        let mut notifications = session.subscribe();

        let report = session.check_liveness().await;
        assert!(report.network_reachable);
        assert!(report.wallet_connected);

        signer.set_connected(false).await;
        let report = session.check_liveness().await;

        assert!(!report.wallet_connected);
        assert!(session.address().is_none());
        assert_eq!(
            notifications.try_recv().unwrap(),
            Notification::WalletDisconnected { external: true }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_liveness_monitor_runs_until_shutdown() {
        let gateway = MockGateway::new();
        let signer = MockSigner::new();
        let options = SessionOptions {
            liveness_interval: Duration::from_secs(30),
            ..SessionOptions::default()
        };
        let session = mock_session(options, &gateway, Some(&signer));
        session.connect().await.unwrap();

        let monitor = session.spawn_liveness_monitor();
        signer.set_connected(false).await;
        gateway.set_reachable(false).await;

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert!(session.address().is_none());
        assert!(!session.snapshot().network_connected);

        session.shutdown();
        tokio::time::timeout(Duration::from_secs(1), monitor)
            .await
            .expect("monitor should stop after shutdown")
            .unwrap();
    }

    #[tokio::test]
    async fn test_history_requires_connection() {
        let gateway = MockGateway::new();
        let signer = MockSigner::new();
        let session = mock_session(SessionOptions::default(), &gateway, Some(&signer));

        assert!(session
            .add_transaction_to_history(
                RecordType::Data,
                "Data Submission",
                "Submitted experiment",
                "0x2",
                HistoryStatus::Success,
                None,
            )
            .is_none());

        session.connect().await.unwrap();
        let first = session
            .add_transaction_to_history(
                RecordType::Data,
                "Data Submission",
                "Submitted experiment",
                "0x2",
                HistoryStatus::Success,
                None,
            )
            .unwrap();
        session.add_transaction_to_history(
            RecordType::Access,
            "Access Grant",
            "Granted read access",
            "0x3",
            HistoryStatus::Pending,
            None,
        );

        let history = session.transaction_history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].transaction_hash, "0x3", "newest first");
        assert_eq!(history[1], first);
        assert_eq!(first.wallet_address, MOCK_ADDRESS);
    }

    #[test]
    fn test_explorer_url() {
        let gateway = MockGateway::new();
        let options = SessionOptions {
            explorer_url: "https://explorer.aptoslabs.com/txn/".to_string(),
            network_name: "testnet".to_string(),
            ..SessionOptions::default()
        };
        let session = mock_session(options, &gateway, None);

        assert_eq!(
            session.explorer_url("0xabc"),
            "https://explorer.aptoslabs.com/txn/0xabc?network=testnet"
        );
    }

    #[test]
    fn test_failure_notification_is_actionable() {
        let notification = Notification::Failed {
            title: "Sample Registration".to_string(),
            error: crate::classifier::classify("SEQUENCE_NUMBER_TOO_OLD"),
        };
        let text = notification.to_string();
        assert!(text.contains("SequenceNumberConflict"));
        assert!(text.contains("Wait a few seconds"));
    }
}
