use deskpay::gateways::flutterwave::FlutterwaveAdapter;
use deskpay::gateways::mock::MockAdapter;
use deskpay::gateways::paystack::PaystackAdapter;
use deskpay::gateways::{CanonicalEventKind, GatewayAdapter};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha512;

fn paystack(secret: &str) -> PaystackAdapter {
    PaystackAdapter {
        base_url: "https://api.paystack.test".to_string(),
        secret_key: secret.to_string(),
        timeout_ms: 2500,
        client: reqwest::Client::new(),
    }
}

fn flutterwave(hash: &str) -> FlutterwaveAdapter {
    FlutterwaveAdapter {
        base_url: "https://api.flutterwave.test".to_string(),
        secret_key: "sk_test".to_string(),
        verif_hash: hash.to_string(),
        timeout_ms: 2500,
        client: reqwest::Client::new(),
    }
}

fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac = Hmac::<Sha512>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

#[test]
fn paystack_accepts_a_valid_signature() {
    let adapter = paystack("sk_test_secret");
    let body = br#"{"event":"charge.success","data":{"reference":"pay_abc"}}"#;
    let signature = sign("sk_test_secret", body);
    assert!(adapter.verify_signature(body, &signature));
}

#[test]
fn paystack_rejects_a_tampered_body() {
    let adapter = paystack("sk_test_secret");
    let body = br#"{"event":"charge.success","data":{"reference":"pay_abc"}}"#;
    let signature = sign("sk_test_secret", body);
    let tampered = br#"{"event":"charge.success","data":{"reference":"pay_xyz"}}"#;
    assert!(!adapter.verify_signature(tampered, &signature));
}

#[test]
fn paystack_rejects_wrong_secret_and_garbage() {
    let adapter = paystack("sk_test_secret");
    let body = br#"{"event":"charge.success"}"#;
    assert!(!adapter.verify_signature(body, &sign("other_secret", body)));
    assert!(!adapter.verify_signature(body, ""));
    assert!(!adapter.verify_signature(body, "deadbeef"));
}

#[test]
fn flutterwave_compares_the_configured_hash() {
    let adapter = flutterwave("my-verif-hash");
    assert!(adapter.verify_signature(b"{}", "my-verif-hash"));
    assert!(!adapter.verify_signature(b"{}", "other-hash"));
    assert!(!adapter.verify_signature(b"{}", ""));
}

#[test]
fn flutterwave_with_empty_configured_hash_rejects_everything() {
    let adapter = flutterwave("");
    assert!(!adapter.verify_signature(b"{}", ""));
    assert!(!adapter.verify_signature(b"{}", "anything"));
}

#[test]
fn paystack_event_mapping() {
    let adapter = paystack("sk");
    let cases = [
        ("charge.success", CanonicalEventKind::ChargeCompleted),
        ("charge.failed", CanonicalEventKind::ChargeFailed),
        ("transfer.success", CanonicalEventKind::TransferCompleted),
        ("transfer.failed", CanonicalEventKind::TransferFailed),
        ("transfer.reversed", CanonicalEventKind::TransferFailed),
    ];
    for (provider_event, expected) in cases {
        let payload = json!({
            "event": provider_event,
            "data": {"reference": "ref_1", "id": 42, "amount": 150000, "currency": "NGN"}
        });
        let event = adapter.normalize_event(&payload).unwrap();
        assert_eq!(event.kind, expected, "for {provider_event}");
        assert_eq!(event.reference, "ref_1");
    }
}

#[test]
fn paystack_amounts_are_kobo() {
    let adapter = paystack("sk");
    let payload = json!({
        "event": "charge.success",
        "data": {"reference": "ref_1", "amount": 150000}
    });
    let event = adapter.normalize_event(&payload).unwrap();
    assert_eq!(event.amount, Some("1500.00".parse().unwrap()));
}

#[test]
fn paystack_unknown_event_is_rejected() {
    let adapter = paystack("sk");
    let payload = json!({"event": "subscription.create", "data": {"reference": "r"}});
    assert!(adapter.normalize_event(&payload).is_err());
}

#[test]
fn paystack_event_id_prefers_reference_then_id() {
    let adapter = paystack("sk");
    let with_reference = json!({"data": {"reference": "ref_9", "id": 7}});
    assert_eq!(adapter.extract_event_id(&with_reference).as_deref(), Some("ref_9"));

    let id_only = json!({"data": {"id": 7}});
    assert_eq!(adapter.extract_event_id(&id_only).as_deref(), Some("7"));

    let neither = json!({"data": {}});
    assert_eq!(adapter.extract_event_id(&neither), None);
}

#[test]
fn flutterwave_charge_completed_splits_on_data_status() {
    let adapter = flutterwave("h");
    let ok = json!({
        "event": "charge.completed",
        "data": {"tx_ref": "ref_1", "id": 9, "status": "successful", "amount": 1500.0, "currency": "NGN"}
    });
    assert_eq!(
        adapter.normalize_event(&ok).unwrap().kind,
        CanonicalEventKind::ChargeCompleted
    );

    let failed = json!({
        "event": "charge.completed",
        "data": {"tx_ref": "ref_1", "status": "failed"}
    });
    assert_eq!(
        adapter.normalize_event(&failed).unwrap().kind,
        CanonicalEventKind::ChargeFailed
    );
}

#[test]
fn flutterwave_bank_transfer_maps_to_charge_completed() {
    let adapter = flutterwave("h");
    let payload = json!({
        "event": "BANK_TRANSFER_TRANSACTION",
        "data": {"tx_ref": "ref_2", "amount": 200.5, "currency": "NGN"}
    });
    let event = adapter.normalize_event(&payload).unwrap();
    assert_eq!(event.kind, CanonicalEventKind::ChargeCompleted);
    assert_eq!(event.amount, Some("200.50".parse().unwrap()));
}

#[test]
fn flutterwave_transfer_completed_splits_on_data_status() {
    let adapter = flutterwave("h");
    let ok = json!({
        "event": "transfer.completed",
        "data": {"reference": "wdl_1", "status": "SUCCESSFUL"}
    });
    assert_eq!(
        adapter.normalize_event(&ok).unwrap().kind,
        CanonicalEventKind::TransferCompleted
    );

    let failed = json!({
        "event": "transfer.completed",
        "data": {"reference": "wdl_1", "status": "FAILED"}
    });
    assert_eq!(
        adapter.normalize_event(&failed).unwrap().kind,
        CanonicalEventKind::TransferFailed
    );
}

#[test]
fn flutterwave_event_id_falls_back_through_fields() {
    let adapter = flutterwave("h");
    let tx_ref = json!({"data": {"tx_ref": "t1", "flw_ref": "f1", "id": 3}});
    assert_eq!(adapter.extract_event_id(&tx_ref).as_deref(), Some("t1"));

    let flw_ref = json!({"data": {"flw_ref": "f1", "id": 3}});
    assert_eq!(adapter.extract_event_id(&flw_ref).as_deref(), Some("f1"));

    let numeric = json!({"data": {"id": 3}});
    assert_eq!(adapter.extract_event_id(&numeric).as_deref(), Some("3"));

    assert_eq!(adapter.extract_event_id(&json!({"data": {}})), None);
}

#[test]
fn mock_adapter_uses_the_secret_verbatim() {
    let adapter = MockAdapter::new("hunter2");
    assert!(adapter.verify_signature(b"{}", "hunter2"));
    assert!(!adapter.verify_signature(b"{}", "hunter3"));

    let payload = json!({"event": "transfer_completed", "reference": "wdl_1"});
    let event = adapter.normalize_event(&payload).unwrap();
    assert_eq!(event.kind, CanonicalEventKind::TransferCompleted);
    assert_eq!(adapter.extract_event_id(&payload).as_deref(), Some("wdl_1"));
}
