//! Unit tests for bulk request encoding and response decoding

use bulk_lister::source::http::decode_bulk_response;
use bulk_lister::source::response::ensure_ok;
use bulk_lister::source::{ApiError, BulkInput, BulkResponse, ResponseStatus};
use bulk_lister::{Cursor, Filters, SessionExpiry};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize, PartialEq)]
struct Customer {
    id: u64,
    #[serde(rename = "fullName")]
    full_name: String,
}

#[test]
fn test_sub_request_encoding() {
    let mut filters = Filters::new();
    filters.insert("searchName".to_string(), json!("smith"));

    let input = BulkInput::new("getCustomers", Cursor::new(100, 3).apply(&filters));
    let encoded = serde_json::to_value(&input).unwrap();

    assert_eq!(
        encoded,
        json!({
            "requestName": "getCustomers",
            "searchName": "smith",
            "recordsOnPage": 100,
            "pageNo": 3
        })
    );
}

#[test]
fn test_typed_records_decode() {
    let body = r#"{
        "status": {"request": "", "responseStatus": "ok", "errorCode": 0},
        "requests": [
            {"status": {"requestName": "getCustomers", "responseStatus": "ok", "recordsTotal": 2},
             "records": [{"id": 1, "fullName": "Ann"}, {"id": 2, "fullName": "Bob"}]}
        ]
    }"#;

    let response: BulkResponse<Customer> = decode_bulk_response(body).unwrap();

    assert_eq!(response.records_total(), 2);
    assert_eq!(
        response.items[0].records,
        vec![
            Customer { id: 1, full_name: "Ann".to_string() },
            Customer { id: 2, full_name: "Bob".to_string() },
        ]
    );
}

#[test]
fn test_sub_request_failure_fails_whole_call() {
    let body = r#"{
        "status": {"responseStatus": "ok"},
        "requests": [
            {"status": {"requestName": "getCustomers", "responseStatus": "ok"}, "records": []},
            {"status": {"requestName": "getCustomers", "responseStatus": "error", "errorCode": 1006, "errorField": "pageNo"}}
        ]
    }"#;

    let result: Result<BulkResponse<Customer>, _> = decode_bulk_response(body);

    match result {
        Err(ApiError::Status { code, request, .. }) => {
            assert_eq!(code, 1006);
            assert_eq!(request, "getCustomers");
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn test_expired_session_is_classified() {
    let status = ResponseStatus {
        request: "getCustomers".to_string(),
        response_status: "error".to_string(),
        error_code: 1054,
        ..Default::default()
    };

    let response: BulkResponse<Customer> = BulkResponse {
        status,
        items: Vec::new(),
    };
    let err = ensure_ok(&response).unwrap_err();

    assert!(err.is_session_expired());
}
