use kiln_core::{ErrorKind, OperationError};

#[test]
fn not_found_carries_404() {
    let err = OperationError::not_found("No user found with the given criteria");
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(err.status(), 404);
    assert!(err.is_not_found());
}

#[test]
fn explicit_status_is_kept() {
    let err = OperationError::with_status(ErrorKind::NonSuccessResponse, 502, "bad gateway");
    assert_eq!(err.status(), 502);
    assert_eq!(err.status_code(), Some(http::StatusCode::BAD_GATEWAY));
}

#[test]
fn serializes_status_and_message() {
    let err = OperationError::scan_failed();
    let json = serde_json::to_value(&err).unwrap();
    assert_eq!(json["status_code"], 500);
    assert_eq!(json["message"], "Failed to scan row");
    assert_eq!(json.as_object().unwrap().len(), 2);
}

#[test]
fn display_includes_kind_status_and_message() {
    let err = OperationError::begin_failed();
    assert_eq!(
        err.to_string(),
        "transaction_begin_failed (500): Failed to begin transaction"
    );
    assert_eq!(format!("{err:?}"), err.to_string());
}
