//! Domain contract writes end to end: registry, submit, confirm, history and
//! notifications

#[cfg(test)]
mod contract_tests {
    use crate::classifier::ErrorKind;
    use crate::contracts::{
        AccessControl, AccessLevel, ExperimentalDataAuditTrail, IntellectualPropertyAttribution,
        ReceiptStatus, SampleProvenance, TaskDraft, TaskStatus, WorkflowAutomation,
    };
    use crate::encoding::text_arg;
    use crate::history::{HistoryStatus, RecordType};
    use crate::session::{Notification, SessionOptions, WalletSession};
    use crate::submitter::{RegistryInitState, SIMULATION_ALREADY_EXISTS_PREFIX};
    use crate::test_utils::{
        connected_session, ConfirmationScript, MockGateway, MockSigner, MOCK_ADDRESS,
    };
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::broadcast::{self, error::TryRecvError};

    const CONTRACT: &str = "0x8";

    async fn setup(options: SessionOptions) -> (MockGateway, MockSigner, Arc<WalletSession>) {
        let gateway = MockGateway::new();
        let signer = MockSigner::new();
        let session = connected_session(options, &gateway, &signer).await;
        (gateway, signer, session)
    }

    /// The single notification a write produced
    fn only_notification(rx: &mut broadcast::Receiver<Notification>) -> Notification {
        let notification = rx.try_recv().expect("one notification");
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)), "more than one notification");
        notification
    }

    #[tokio::test(start_paused = true)]
    async fn test_register_sample_initializes_registry_first() {
        let (_gateway, signer, session) = setup(SessionOptions::default()).await;
        let samples = SampleProvenance::new(session.clone(), CONTRACT);
        let mut notifications = session.subscribe();

        let receipt = samples.register_sample("Blood sample A").await.unwrap();

        assert_eq!(receipt.status, ReceiptStatus::Confirmed);
        assert!(receipt.confirmation.as_ref().unwrap().success);

        let payloads = signer.get_payloads().await;
        assert_eq!(payloads.len(), 2);
        assert_eq!(payloads[0].function, "0x8::SampleProvenance::initialize_registry");
        assert_eq!(payloads[1].function, "0x8::SampleProvenance::register_sample");
        assert_eq!(payloads[1].arguments, vec![text_arg("Blood sample A")]);
        assert_eq!(
            session.registry_state("SampleProvenance"),
            RegistryInitState::Initialized
        );

        let history = session.transaction_history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].record_type, RecordType::Sample);
        assert_eq!(history[0].title, "Sample Registration");
        assert_eq!(history[0].transaction_hash, receipt.hash);
        assert_eq!(history[0].status, HistoryStatus::Success);
        assert_eq!(receipt.history.as_ref(), Some(&history[0]));

        assert_eq!(
            only_notification(&mut notifications),
            Notification::Success {
                title: "Sample Registration".to_string(),
                hash: receipt.hash.clone(),
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_existing_record_reports_already_completed() {
        let (gateway, signer, session) = setup(SessionOptions::default()).await;
        gateway.publish("0x8::SampleProvenance::SampleRegistry").await;
        gateway
            .set_simulation(Ok(MockGateway::simulation_failure(
                "Move abort in 0x8::SampleProvenance: RESOURCE_ALREADY_EXISTS(0x80001)",
            )))
            .await;
        let samples = SampleProvenance::new(session.clone(), CONTRACT);
        let mut notifications = session.subscribe();

        let receipt = samples.register_sample("Blood sample A").await.unwrap();

        assert_eq!(receipt.status, ReceiptStatus::AlreadyCompleted);
        assert!(receipt.confirmation.is_none());
        assert_eq!(signer.get_sign_count().await, 0);
        assert!(session.transaction_history().is_empty());
        assert_eq!(
            only_notification(&mut notifications),
            Notification::AlreadyCompleted {
                title: "Sample Registration".to_string()
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_registration_is_idempotent() {
        let (gateway, signer, session) = setup(SessionOptions::default()).await;
        gateway.publish("0x8::SampleProvenance::SampleRegistry").await;
        let samples = SampleProvenance::new(session.clone(), CONTRACT);
        let mut notifications = session.subscribe();

        let first = samples.register_sample("Blood sample A").await.unwrap();
        assert_eq!(first.status, ReceiptStatus::Confirmed);
        assert!(matches!(
            only_notification(&mut notifications),
            Notification::Success { .. }
        ));

        // The ledger now holds the record, so the resubmission aborts in simulation
        gateway
            .set_simulation(Ok(MockGateway::simulation_failure(
                "Move abort in 0x8::SampleProvenance: RESOURCE_ALREADY_EXISTS(0x80001)",
            )))
            .await;
        let second = samples.register_sample("Blood sample A").await.unwrap();

        assert_eq!(second.status, ReceiptStatus::AlreadyCompleted);
        assert!(second.hash.starts_with(SIMULATION_ALREADY_EXISTS_PREFIX));
        assert_ne!(second.hash, first.hash);
        assert_eq!(signer.get_sign_count().await, 1);
        assert_eq!(session.transaction_history().len(), 1);
        assert_eq!(
            only_notification(&mut notifications),
            Notification::AlreadyCompleted {
                title: "Sample Registration".to_string()
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_unconfirmed_write_is_pending() {
        let options = SessionOptions {
            confirmation_timeout: Duration::from_secs(4),
            ..SessionOptions::default()
        };
        let (gateway, _signer, session) = setup(options).await;
        gateway.publish("0x8::ExperimentalDataAuditTrail::DataRegistry").await;
        gateway.set_confirmation(ConfirmationScript::AlwaysPending).await;
        let data = ExperimentalDataAuditTrail::new(session.clone(), CONTRACT);
        let mut notifications = session.subscribe();

        let receipt = data
            .submit_experiment_data(b"raw plate reader output", "Plate 7")
            .await
            .unwrap();

        assert_eq!(receipt.status, ReceiptStatus::Pending);
        assert!(receipt.confirmation.as_ref().unwrap().is_timeout());
        let history = session.transaction_history();
        assert_eq!(history[0].status, HistoryStatus::Pending);
        assert_eq!(history[0].record_type, RecordType::Data);
        assert!(matches!(
            only_notification(&mut notifications),
            Notification::Pending { .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_registry_failure_invalidates_state() {
        let (gateway, signer, session) = setup(SessionOptions::default()).await;
        gateway.publish("0x8::AccessControlPermission::PermissionRegistry").await;
        gateway
            .set_confirmation(ConfirmationScript::failure_on_poll(
                1,
                "Move abort in 0x8::AccessControlPermission: ENOT_INITIALIZED(0x60001)",
            ))
            .await;
        let access = AccessControl::new(session.clone(), CONTRACT);
        let mut notifications = session.subscribe();

        let err = access
            .grant_permission("0xb0b", 14, AccessLevel::Write)
            .await
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::ResourceNotFound);
        assert_eq!(
            session.registry_state("AccessControlPermission"),
            RegistryInitState::Unknown
        );
        assert!(session.transaction_history().is_empty());
        assert!(only_notification(&mut notifications).is_error());

        let payload = &signer.get_payloads().await[0];
        assert_eq!(
            payload.arguments,
            vec![
                json!("0x0000000000000000000000000000000000000000000000000000000000000b0b"),
                json!(14),
                json!(2)
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_argument_notifies_once() {
        let (_gateway, signer, session) = setup(SessionOptions::default()).await;
        let samples = SampleProvenance::new(session.clone(), CONTRACT);
        let mut notifications = session.subscribe();

        let err = samples
            .record_transfer(3, "not-an-address", "courier")
            .await
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::InvalidArgument);
        assert_eq!(signer.get_sign_count().await, 0);
        assert!(only_notification(&mut notifications).is_error());
    }

    #[tokio::test(start_paused = true)]
    async fn test_workflow_argument_layout() {
        let (gateway, signer, session) = setup(SessionOptions::default()).await;
        gateway
            .publish("0x8::WorkflowAutomationCompliance::WorkflowRegistry")
            .await;
        let workflow = WorkflowAutomation::new(session.clone(), CONTRACT);

        let draft = TaskDraft {
            description: "Review assay".to_string(),
            deadline: Some("2026-11-01".to_string()),
            priority: None,
        };
        workflow.create_task(&draft, MOCK_ADDRESS).await.unwrap();
        workflow.update_task_status(4, TaskStatus::Approved).await.unwrap();

        let payloads = signer.get_payloads().await;
        assert_eq!(
            payloads[0].arguments,
            vec![
                text_arg(r#"{"description":"Review assay","deadline":"2026-11-01"}"#),
                json!(MOCK_ADDRESS)
            ]
        );
        assert_eq!(payloads[1].arguments, vec![json!(4), json!(3)]);
        assert_eq!(session.transaction_history().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ip_registration_arguments() {
        let (gateway, signer, session) = setup(SessionOptions::default()).await;
        gateway
            .publish("0x8::IntellectualPropertyAttribution::IPRegistry")
            .await;
        let ip = IntellectualPropertyAttribution::new(session.clone(), CONTRACT);

        let receipt = ip
            .register_contribution("Assay v2", "Improved buffer", "author", "protocol design")
            .await
            .unwrap();

        assert_eq!(receipt.status, ReceiptStatus::Confirmed);
        let payloads = signer.get_payloads().await;
        assert_eq!(
            payloads[0].function,
            "0x8::IntellectualPropertyAttribution::register_contribution"
        );
        assert_eq!(payloads[0].arguments.len(), 4);
        assert_eq!(session.transaction_history()[0].record_type, RecordType::Ip);
    }

    #[tokio::test]
    async fn test_views_are_best_effort() {
        let (gateway, _signer, session) = setup(SessionOptions::default()).await;
        gateway
            .set_view(
                "get_sample",
                Ok(vec![json!({
                    "id": "3",
                    "description": "0x426c6f6f64",
                    "owner": "0xabc",
                    "timestamp": "1700000000",
                    "history": []
                })]),
            )
            .await;
        gateway.set_view("get_sample_count", Ok(vec![json!("12")])).await;
        let samples = SampleProvenance::new(session.clone(), CONTRACT);

        let sample = samples.get_sample(3).await.unwrap();
        assert_eq!(sample.description, "Blood");
        assert_eq!(samples.get_sample_count().await, Some(12));

        // Unscripted views fail and read as empty
        assert!(samples.get_all_samples().await.is_empty());

        let calls = gateway.get_view_calls().await;
        assert_eq!(calls[0].function_name, "get_sample");
        assert_eq!(calls[0].arguments, vec![json!("3")]);
    }
}
