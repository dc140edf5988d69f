// SPDX-FileCopyrightText: 2026 Fitslot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests: a real gateway on a loopback port, driven over HTTP.
//!
//! Each test creates an isolated TestHarness with temp SQLite and the
//! scripted payment verifier.

use std::sync::Arc;
use std::time::Duration;

use fitslot_booking::BookingService;
use fitslot_config::model::StorageConfig;
use fitslot_core::StorageAdapter;
use fitslot_core::types::{BookingParty, NewBooking};
use fitslot_gateway::{Gateway, GatewayOptions};
use fitslot_storage::SqliteStorage;
use fitslot_test_utils::TestHarness;
use serde_json::{Value, json};
use serial_test::serial;
use tokio_util::sync::CancellationToken;

const TOKEN: &str = "e2e-secret-token";

fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

struct Running {
    base: String,
    cancel: CancellationToken,
    task: tokio::task::JoinHandle<Result<(), fitslot_core::FitslotError>>,
}

async fn start(harness: &TestHarness) -> Running {
    let port = free_port();
    let service = BookingService::new(harness.storage_adapter(), harness.config.booking.clone())
        .with_payments(harness.payment_verifier())
        .with_studio_name("Karen Boxing Club");
    let gateway = Gateway::new(
        GatewayOptions {
            host: "127.0.0.1".into(),
            port,
            bearer_token: Some(TOKEN.into()),
            prometheus_render: None,
        },
        Arc::new(service),
    );
    let cancel = CancellationToken::new();
    let task = tokio::spawn(gateway.run(cancel.clone()));
    let base = format!("http://127.0.0.1:{port}");

    // Wait until the listener is up.
    let client = reqwest::Client::new();
    for _ in 0..50 {
        if client.get(format!("{base}/health")).send().await.is_ok() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    Running { base, cancel, task }
}

async fn post(client: &reqwest::Client, url: String, body: Value) -> (u16, Value) {
    let resp = client
        .post(url)
        .bearer_auth(TOKEN)
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap_or(Value::Null))
}

#[tokio::test]
#[serial]
async fn concurrent_http_bookings_never_overfill() {
    let harness = TestHarness::builder().build().await.unwrap();
    let slot = harness.seed_slot(4, 0).await.unwrap();
    let running = start(&harness).await;
    let client = reqwest::Client::new();

    let mut handles = Vec::new();
    for i in 0..16 {
        let client = client.clone();
        let url = format!("{}/v1/bookings", running.base);
        let slot_id = slot.id.clone();
        handles.push(tokio::spawn(async move {
            post(
                &client,
                url,
                json!({
                    "time_slot_id": slot_id,
                    "party": {"kind": "registered", "user_id": format!("member-{i}")},
                }),
            )
            .await
            .0
        }));
    }
    let mut created = 0;
    let mut full = 0;
    for handle in handles {
        match handle.await.unwrap() {
            201 => created += 1,
            409 => full += 1,
            other => panic!("unexpected status {other}"),
        }
    }
    assert_eq!(created, 4);
    assert_eq!(full, 12);

    let availability: Value = client
        .get(format!("{}/v1/slots/{}/availability", running.base, slot.id))
        .bearer_auth(TOKEN)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(availability["remaining"], 0);

    running.cancel.cancel();
    running.task.await.unwrap().unwrap();
}

#[tokio::test]
#[serial]
async fn payment_flow_over_http() {
    let harness = TestHarness::builder().build().await.unwrap();
    let slot = harness.seed_slot(10, 1200).await.unwrap();
    let running = start(&harness).await;
    let client = reqwest::Client::new();

    let (status, booking) = post(
        &client,
        format!("{}/v1/bookings", running.base),
        json!({
            "time_slot_id": slot.id,
            "party": {"kind": "guest", "name": "Njeri", "phone": "+254 712 000 111"},
        }),
    )
    .await;
    assert_eq!(status, 201);
    let id = booking["id"].as_str().unwrap().to_string();

    let (status, pending) = post(
        &client,
        format!("{}/v1/bookings/{id}/pay", running.base),
        json!({}),
    )
    .await;
    assert_eq!(status, 202);
    let checkout = pending["checkout_request_id"].as_str().unwrap().to_string();

    // Daraja posts without credentials.
    let callback = json!({
        "Body": {"stkCallback": {
            "MerchantRequestID": "mr-1",
            "CheckoutRequestID": checkout,
            "ResultCode": 0,
            "ResultDesc": "The service request is processed successfully.",
            "CallbackMetadata": {"Item": [
                {"Name": "Amount", "Value": 1200},
                {"Name": "MpesaReceiptNumber", "Value": "RKT4ZQ81PL"}
            ]}
        }}
    });
    let ack: Value = client
        .post(format!("{}/v1/mpesa/callback", running.base))
        .json(&callback)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(ack["ResultCode"], 0);

    // Cancelling afterwards leaves the money owed back.
    let (status, cancelled) = post(
        &client,
        format!("{}/v1/bookings/{id}/cancel", running.base),
        json!({}),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(cancelled["status"], "cancelled");
    assert_eq!(cancelled["payment_status"], "refund_due");
    assert_eq!(cancelled["payment_reference"], "RKT4ZQ81PL");

    running.cancel.cancel();
    running.task.await.unwrap().unwrap();
}

#[tokio::test]
async fn capacity_survives_reopen() {
    let dir = tempfile::TempDir::new().unwrap();
    let config = StorageConfig {
        database_path: dir.path().join("reopen.db").to_string_lossy().into_owned(),
        ..StorageConfig::default()
    };

    let first = SqliteStorage::new(config.clone());
    first.initialize().await.unwrap();
    let harness_slot = {
        let service = BookingService::new(Arc::new(first), Default::default());
        let schedule = service
            .create_schedule(fitslot_booking::NewSchedule {
                date: "2026-12-01".into(),
                title: None,
            })
            .await
            .unwrap();
        let session = service
            .create_session(fitslot_booking::NewSession {
                name: "Boxing".into(),
                description: None,
            })
            .await
            .unwrap();
        let slot = service
            .create_time_slot(fitslot_booking::NewTimeSlot {
                schedule_id: schedule.id,
                session_id: session.id,
                start_time: "06:00".into(),
                end_time: "07:00".into(),
                capacity: Some(1),
                price_kes: 0,
            })
            .await
            .unwrap();
        service
            .create_booking(member(&slot.id, "u-1"))
            .await
            .unwrap();
        service.storage().close().await.unwrap();
        slot
    };

    let second = SqliteStorage::new(config);
    second.initialize().await.unwrap();
    let service = BookingService::new(Arc::new(second), Default::default());
    let err = service
        .create_booking(member(&harness_slot.id, "u-2"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        fitslot_core::FitslotError::CapacityExceeded { .. }
    ));
}

fn member(slot_id: &str, user_id: &str) -> NewBooking {
    NewBooking {
        time_slot_id: slot_id.to_string(),
        group_id: None,
        party: BookingParty::Registered {
            user_id: user_id.to_string(),
        },
        idempotency_key: None,
    }
}
