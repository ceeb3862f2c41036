//! REST gateway tests against a local mock node

use bioledger::classifier::ErrorKind;
use bioledger::gateway::{HttpLedgerGateway, LedgerGateway, TransactionRecord};
use bioledger::submitter::TransactionRequest;
use mockito::Matcher;
use serde_json::json;
use std::time::Duration;

const SENDER: &str = "0x000000000000000000000000000000000000000000000000000000000000a11c";

fn gateway(server: &mockito::ServerGuard) -> HttpLedgerGateway {
    HttpLedgerGateway::new(&server.url(), Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_sequence_number_from_account() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", format!("/v1/accounts/{SENDER}").as_str())
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "sequence_number": "42", "authentication_key": "0x1" }).to_string())
        .create_async()
        .await;

    let sequence = gateway(&server).sequence_number(SENDER).await.unwrap();

    assert_eq!(sequence, 42);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_missing_account_is_classified() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", format!("/v1/accounts/{SENDER}").as_str())
        .with_status(404)
        .with_body(
            json!({
                "message": "Account not found by Address",
                "error_code": "account_not_found",
                "vm_error_code": null
            })
            .to_string(),
        )
        .create_async()
        .await;

    let err = gateway(&server).sequence_number(SENDER).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::ResourceNotFound);
}

#[tokio::test]
async fn test_resource_exists_maps_not_found_to_false() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", Matcher::Regex(r"^/v1/accounts/0x1/resource/.*DataRegistry$".into()))
        .with_status(404)
        .with_body(json!({ "error_code": "resource_not_found", "message": "Resource not found" }).to_string())
        .create_async()
        .await;
    server
        .mock("GET", Matcher::Regex(r"^/v1/accounts/0x1/resource/.*SampleRegistry$".into()))
        .with_status(200)
        .with_body(json!({ "type": "0x8::SampleProvenance::SampleRegistry", "data": {} }).to_string())
        .create_async()
        .await;

    let gateway = gateway(&server);
    assert!(gateway
        .resource_exists("0x1", "0x8::SampleProvenance::SampleRegistry")
        .await
        .unwrap());
    assert!(!gateway
        .resource_exists("0x1", "0x8::ExperimentalDataAuditTrail::DataRegistry")
        .await
        .unwrap());
}

#[tokio::test]
async fn test_simulate_posts_entry_function() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", format!("/v1/accounts/{SENDER}").as_str())
        .with_status(200)
        .with_body(json!({ "sequence_number": "3" }).to_string())
        .create_async()
        .await;
    let simulate = server
        .mock("POST", "/v1/transactions/simulate")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("estimate_gas_unit_price".into(), "true".into()),
            Matcher::UrlEncoded("estimate_max_gas_amount".into(), "true".into()),
        ]))
        .match_body(Matcher::PartialJson(json!({
            "sender": SENDER,
            "sequence_number": "3",
            "payload": {
                "function": "0x8::SampleProvenance::register_sample",
                "arguments": ["0x6869"]
            }
        })))
        .with_status(200)
        .with_body(
            json!([{
                "success": true,
                "vm_status": "Executed successfully",
                "gas_used": "600",
                "gas_unit_price": "100",
                "max_gas_amount": "1000"
            }])
            .to_string(),
        )
        .create_async()
        .await;

    let request = TransactionRequest::new("0x8", "SampleProvenance", "register_sample")
        .with_arguments(vec![json!("0x6869")]);
    let outcome = gateway(&server).simulate(&request, SENDER).await.unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.max_gas_amount, Some(1000));
    assert_eq!(outcome.gas_unit_price, Some(100));
    simulate.assert_async().await;
}

#[tokio::test]
async fn test_transaction_by_hash_states() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/v1/transactions/by_hash/0xpending")
        .with_status(200)
        .with_body(json!({ "type": "pending_transaction", "hash": "0xpending" }).to_string())
        .create_async()
        .await;
    server
        .mock("GET", "/v1/transactions/by_hash/0xdone")
        .with_status(200)
        .with_body(
            json!({
                "type": "user_transaction",
                "hash": "0xdone",
                "success": true,
                "vm_status": "Executed successfully",
                "gas_used": "12",
                "events": []
            })
            .to_string(),
        )
        .create_async()
        .await;
    server
        .mock("GET", "/v1/transactions/by_hash/0xunknown")
        .with_status(404)
        .with_body(json!({ "error_code": "transaction_not_found" }).to_string())
        .create_async()
        .await;

    let gateway = gateway(&server);
    assert_eq!(
        gateway.transaction_by_hash("0xpending").await.unwrap(),
        Some(TransactionRecord::Pending {
            hash: "0xpending".to_string()
        })
    );
    assert!(matches!(
        gateway.transaction_by_hash("0xdone").await.unwrap(),
        Some(TransactionRecord::Committed { success: true, .. })
    ));
    assert_eq!(gateway.transaction_by_hash("0xunknown").await.unwrap(), None);
}

#[tokio::test]
async fn test_view_returns_values() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/v1/view")
        .match_body(Matcher::PartialJson(json!({
            "function": "0x8::SampleProvenance::get_sample_count",
            "arguments": []
        })))
        .with_status(200)
        .with_body(json!(["5"]).to_string())
        .create_async()
        .await;

    let request = TransactionRequest::new("0x8", "SampleProvenance", "get_sample_count");
    let values = gateway(&server).view(&request).await.unwrap();
    assert_eq!(values, vec![json!("5")]);
}

#[tokio::test]
async fn test_view_abort_is_classified() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/v1/view")
        .with_status(400)
        .with_body(
            json!({
                "message": "Move abort in 0x8::SampleProvenance: ENOT_INITIALIZED(0x60001)",
                "error_code": "invalid_input",
                "vm_error_code": 4016
            })
            .to_string(),
        )
        .create_async()
        .await;

    let request = TransactionRequest::new("0x8", "SampleProvenance", "get_all_samples");
    let err = gateway(&server).view(&request).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::ResourceNotFound);
}

#[tokio::test]
async fn test_network_reachability() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/v1")
        .with_status(200)
        .with_body(json!({ "chain_id": 4, "ledger_version": "100" }).to_string())
        .create_async()
        .await;
    assert!(gateway(&server).is_network_reachable().await);

    let unreachable = HttpLedgerGateway::new("http://127.0.0.1:1", Duration::from_millis(500)).unwrap();
    assert!(!unreachable.is_network_reachable().await);
}
