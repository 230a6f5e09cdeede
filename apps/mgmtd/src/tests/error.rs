use crate::error::MgmtdError;

use mgmt_core::config::DaemonConfig;
use mgmt_core::error::transport::TransportError;

use common::ErrorLocation;

use std::path::Path;

#[test]
fn given_config_error_when_converted_then_config_variant_keeps_message() {
    let config_error = DaemonConfig::parse("[server]\nbacklog = 0\n", Path::new("bad.toml"))
        .expect_err("zero backlog must fail");
    let expected = config_error.to_string();

    let error = MgmtdError::from(config_error);

    match error {
        MgmtdError::Config { message, .. } => assert_eq!(message, expected),
        other => panic!("Expected Config variant, got {other:?}"),
    }
}

#[test]
fn given_transport_error_when_converted_then_startup_variant() {
    let transport_error = TransportError::Bind {
        name: "mgmt".to_string(),
        message: "Address already in use".to_string(),
        location: ErrorLocation::caller(),
    };

    let error = MgmtdError::from(transport_error);

    assert!(matches!(error, MgmtdError::Startup { .. }));
    assert!(error.to_string().contains("Address already in use"));
}

#[test]
fn given_error_when_displayed_then_location_included() {
    let error = MgmtdError::Signal {
        message: "no handler".to_string(),
        location: ErrorLocation::caller(),
    };

    let text = error.to_string();

    assert!(text.starts_with("Signal Error: no handler ["));
    assert!(text.contains("error.rs"));
}
