// Unit tests for request routing and response envelope rules.

use crate::codec::{Mode, Op, RESPONSE_HEADER_SIZE, Request, Response};
use crate::driver::{DriverTable, ShowQuery, StaticDriver};
use crate::registry::{IoType, TargetState};
use crate::router::Controller;
use crate::tests::support::{HookCall, RecordingDriver, SharedRegistry};

use common::Errno;

use std::sync::{Arc, Mutex};

const CAPACITY: usize = 4096;
const HEADER: u32 = RESPONSE_HEADER_SIZE as u32;

struct Fixture {
    controller: Controller,
    registry: SharedRegistry,
    calls: Arc<Mutex<Vec<HookCall>>>,
}

impl Fixture {
    /// Index 0: "iscsi", a driver with every hook. Index 1: "plain", no hooks.
    fn new(configure: impl FnOnce(&mut RecordingDriver)) -> Self {
        let mut driver = RecordingDriver::new("iscsi");
        configure(&mut driver);
        let calls = Arc::clone(&driver.calls);

        let mut drivers = DriverTable::new();
        drivers.register(Box::new(driver)).expect("register iscsi");
        drivers
            .register(Box::new(StaticDriver::new("plain")))
            .expect("register plain");

        let registry = SharedRegistry::default();
        let controller = Controller::new(Box::new(registry.clone()), drivers);

        Self {
            controller,
            registry,
            calls,
        }
    }

    fn send(&mut self, request: Request) -> Response {
        self.controller.process(&request, CAPACITY)
    }

    fn calls(&self) -> Vec<HookCall> {
        self.calls.lock().expect("call log poisoned").clone()
    }
}

fn target(driver: &str, op: Op, target_id: i32) -> Request {
    Request::new(driver, Mode::Target, op).with_target(target_id)
}

fn assert_empty(response: &Response, error_code: i32) {
    assert_eq!(response.error_code, error_code);
    assert_eq!(response.total_length, HEADER);
    assert!(response.payload.is_empty());
}

/// **VALUE**: Creating a target succeeds with a bare envelope and runs the driver companion.
///
/// **BUG THIS CATCHES**: Would catch if the create path stopped calling the driver's
/// `target_create` hook or forwarded the wrong parameter bytes.
#[test]
fn given_new_target_when_registry_accepts_then_envelope_is_header_only() {
    // GIVEN: A controller with a hook-rich driver
    let mut fixture = Fixture::new(|_| {});

    // WHEN: Creating target 5 with parameters
    let response = fixture.send(target("iscsi", Op::New, 5).with_payload(b"name=t5".to_vec()));

    // THEN: Success, no payload, registry record and companion call present
    assert_empty(&response, 0);
    assert_eq!(fixture.registry.inner().target_count(), 1);
    assert_eq!(
        fixture.calls(),
        vec![HookCall::TargetCreate {
            target_id: 5,
            params: b"name=t5".to_vec()
        }]
    );
}

/// **VALUE**: A failing `target_create` companion hook does not fail the request.
///
/// **WHY THIS MATTERS**: The registry record already exists when the hook runs. Reporting
/// the hook's failure would tell the client the target doesn't exist when it does.
#[test]
fn given_failing_create_companion_when_creating_target_then_request_still_succeeds() {
    let mut fixture = Fixture::new(|driver| driver.companion_error = Some(Errno::EIO));

    let response = fixture.send(target("iscsi", Op::New, 7));

    assert_empty(&response, 0);
    assert_eq!(fixture.registry.inner().target_state(7), Some(TargetState::Ready));
}

#[test]
fn given_failing_destroy_companion_when_deleting_target_then_request_still_succeeds() {
    let mut fixture = Fixture::new(|driver| driver.companion_error = Some(Errno::EIO));
    fixture.send(target("iscsi", Op::New, 7));

    let response = fixture.send(target("iscsi", Op::Delete, 7));

    assert_empty(&response, 0);
    assert_eq!(fixture.registry.inner().target_count(), 0);
    assert!(
        fixture
            .calls()
            .contains(&HookCall::TargetDestroy { target_id: 7 })
    );
}

/// **VALUE**: A registry failure on create is reported and the companion is skipped.
#[test]
fn given_existing_target_when_creating_again_then_negative_errno_and_no_companion() {
    let mut fixture = Fixture::new(|_| {});
    fixture.send(target("iscsi", Op::New, 5));

    let response = fixture.send(target("iscsi", Op::New, 5));

    assert_empty(&response, Errno::EEXIST.negated());
    assert_eq!(fixture.calls().len(), 1, "Companion must only run on success");
}

#[test]
fn given_driver_without_companions_when_creating_target_then_succeeds() {
    let mut fixture = Fixture::new(|_| {});

    let response = fixture.send(target("plain", Op::New, 1));

    assert_empty(&response, 0);
    assert!(fixture.calls().is_empty());
}

/// **VALUE**: Listing all targets puts the listing in the payload and counts it in the length.
#[test]
fn given_targets_when_showing_with_negative_id_then_listing_is_returned() {
    let mut fixture = Fixture::new(|_| {});
    fixture.send(target("iscsi", Op::New, 5));
    fixture.send(target("iscsi", Op::New, 6));

    let response = fixture.send(target("iscsi", Op::Show, -1));

    let listing = String::from_utf8(response.payload.clone()).expect("listing is text");
    assert_eq!(response.error_code, 0);
    assert_eq!(response.total_length, HEADER + response.payload.len() as u32);
    assert!(listing.contains("Target 5:"));
    assert!(listing.contains("Target 6:"));
}

#[test]
fn given_state_key_when_updating_target_then_state_setter_gets_value() {
    let mut fixture = Fixture::new(|_| {});
    fixture.send(target("iscsi", Op::New, 5));
    fixture.send(target("iscsi", Op::Update, 5).with_payload(b"state\0offline".to_vec()));

    let response = fixture.send(target("iscsi", Op::Update, 5).with_payload(b"state\0ready".to_vec()));

    assert_empty(&response, 0);
    assert_eq!(fixture.registry.inner().target_state(5), Some(TargetState::Ready));
    assert!(
        !fixture
            .calls()
            .iter()
            .any(|c| matches!(c, HookCall::TargetUpdate { .. })),
        "state is handled by the core, not the driver"
    );
}

#[test]
fn given_iotype_key_when_updating_target_then_iotype_setter_gets_value() {
    let mut fixture = Fixture::new(|_| {});
    fixture.send(target("iscsi", Op::New, 5));

    let response =
        fixture.send(target("iscsi", Op::Update, 5).with_payload(b"iotype\0passthrough\0".to_vec()));

    assert_empty(&response, 0);
    assert_eq!(
        fixture.registry.inner().target_iotype(5),
        Some(IoType::Passthrough)
    );
}

#[test]
fn given_bad_state_value_when_updating_target_then_einval() {
    let mut fixture = Fixture::new(|_| {});
    fixture.send(target("iscsi", Op::New, 5));

    let response = fixture.send(target("iscsi", Op::Update, 5).with_payload(b"state\0sleepy".to_vec()));

    assert_empty(&response, Errno::EINVAL.negated());
}

/// **VALUE**: Keys the core doesn't own are forwarded verbatim to the driver.
///
/// **BUG THIS CATCHES**: Would catch if the payload were split or trimmed before
/// reaching `target_update`, which would break driver-specific parameter parsing.
#[test]
fn given_driver_key_when_updating_target_then_payload_forwarded_verbatim() {
    let mut fixture = Fixture::new(|_| {});
    fixture.send(target("iscsi", Op::New, 5));
    let payload = b"MaxRecvDataSegmentLength\08192\0".to_vec();

    let response = fixture.send(target("iscsi", Op::Update, 5).with_payload(payload.clone()));

    assert_empty(&response, 0);
    assert!(fixture.calls().contains(&HookCall::TargetUpdate {
        target_id: 5,
        params: payload
    }));
}

#[test]
fn given_driver_update_failure_when_updating_target_then_error_is_reported() {
    let mut fixture = Fixture::new(|driver| driver.update_error = Some(Errno::ENOSPC));
    fixture.send(target("iscsi", Op::New, 5));

    let response = fixture.send(target("iscsi", Op::Update, 5).with_payload(b"Alias\0x".to_vec()));

    assert_empty(&response, Errno::ENOSPC.negated());
}

#[test]
fn given_driver_without_update_hook_when_updating_unknown_key_then_einval() {
    let mut fixture = Fixture::new(|_| {});
    fixture.send(target("plain", Op::New, 5));

    let response = fixture.send(target("plain", Op::Update, 5).with_payload(b"Alias\0x".to_vec()));

    assert_empty(&response, Errno::EINVAL.negated());
}

#[test]
fn given_bind_when_target_exists_then_host_is_recorded() {
    let mut fixture = Fixture::new(|_| {});
    fixture.send(target("iscsi", Op::New, 5));

    let response = fixture.send(target("iscsi", Op::Bind, 5).with_host(3));

    assert_empty(&response, 0);
    assert_eq!(fixture.registry.inner().target_hosts(5), Some(&[3u32][..]));
}

#[test]
fn given_bind_under_other_driver_when_binding_then_einval() {
    let mut fixture = Fixture::new(|_| {});
    fixture.send(target("iscsi", Op::New, 5));

    let response = fixture.send(target("plain", Op::Bind, 5).with_host(3));

    assert_empty(&response, Errno::EINVAL.negated());
}

/// **VALUE**: A single-target Show goes to the driver with every identifier.
#[test]
fn given_target_id_when_showing_then_driver_show_gets_all_identifiers() {
    let mut fixture = Fixture::new(|driver| driver.show_output = Ok(b"tid 5 detail".to_vec()));

    let response = fixture.send(
        target("iscsi", Op::Show, 5)
            .with_session(0xabc, 9)
            .with_lun(2),
    );

    assert_eq!(response.error_code, 0);
    assert_eq!(response.payload, b"tid 5 detail");
    assert_eq!(response.total_length, HEADER + 12);
    assert_eq!(
        fixture.calls(),
        vec![HookCall::Show(ShowQuery {
            mode: Mode::Target.to_wire(),
            target_id: 5,
            session_id: 0xabc,
            connection_id: 9,
            lun: 2,
        })]
    );
}

/// **VALUE**: Show errors carry the positive magnitude and no payload.
#[test]
fn given_driver_without_show_hook_when_showing_target_then_positive_einval() {
    let mut fixture = Fixture::new(|_| {});

    let response = fixture.send(target("plain", Op::Show, 5));

    assert_empty(&response, Errno::EINVAL.code());
}

#[test]
fn given_failing_show_hook_when_showing_target_then_positive_errno_without_payload() {
    let mut fixture = Fixture::new(|driver| driver.show_output = Err(Errno::ENOENT));

    let response = fixture.send(target("iscsi", Op::Show, 5));

    assert_empty(&response, Errno::ENOENT.code());
}

/// **VALUE**: A handler claiming more bytes than the region holds is not trusted.
#[test]
fn given_show_hook_overreporting_length_when_showing_then_eio() {
    let mut fixture = Fixture::new(|driver| {
        driver.show_output = Ok(b"x".to_vec());
        driver.show_claims = Some(CAPACITY);
    });

    let response = fixture.send(target("iscsi", Op::Show, 5));

    assert_empty(&response, Errno::EIO.code());
}

#[test]
fn given_system_mode_when_any_op_then_einval() {
    let mut fixture = Fixture::new(|_| {});

    let mutate = fixture.send(Request::new("iscsi", Mode::System, Op::New));
    let show = fixture.send(Request::new("iscsi", Mode::System, Op::Show));

    assert_empty(&mutate, Errno::EINVAL.negated());
    assert_empty(&show, Errno::EINVAL.code());
}

#[test]
fn given_unknown_op_when_routing_target_then_einval() {
    let mut fixture = Fixture::new(|_| {});

    let response = fixture.send(target("iscsi", Op::Unknown(42), 1));

    assert_empty(&response, Errno::EINVAL.negated());
}

/// **VALUE**: Unknown driver names get a positive ENOENT envelope.
#[test]
fn given_unknown_driver_when_processing_then_enoent_without_payload() {
    let mut fixture = Fixture::new(|_| {});

    let response = fixture.send(target("foo", Op::Show, -1));

    assert_empty(&response, Errno::ENOENT.code());
}

/// **VALUE**: A driver name that isn't UTF-8 is just another unknown driver.
#[test]
fn given_garbled_driver_name_when_processing_then_enoent_without_payload() {
    let mut fixture = Fixture::new(|_| {});
    let mut bytes = Request::new("ab", Mode::Target, Op::New).with_target(1).encode().expect("encode");
    bytes[4] = 0xff;
    bytes[5] = 0xfe;
    let request = Request::decode(&bytes, CAPACITY).expect("decode");

    let response = fixture.send(request);

    assert_empty(&response, Errno::ENOENT.code());
    assert!(fixture.calls().is_empty());
}

#[test]
fn given_device_lifecycle_when_routed_then_registry_reflects_each_step() {
    let mut fixture = Fixture::new(|_| {});
    fixture.send(target("iscsi", Op::New, 1));
    let device = |op| Request::new("iscsi", Mode::Device, op).with_target(1).with_lun(0);

    let created = fixture.send(device(Op::New));
    let updated = fixture.send(device(Op::Update).with_payload(b"path=/dev/sdb".to_vec()));
    let shown = fixture.send(device(Op::Show));
    let deleted = fixture.send(device(Op::Delete));

    assert_empty(&created, 0);
    assert_empty(&updated, 0);
    assert_eq!(shown.error_code, 0);
    assert_eq!(shown.total_length, HEADER + shown.payload.len() as u32);
    assert!(String::from_utf8_lossy(&shown.payload).contains("path=/dev/sdb"));
    assert_empty(&deleted, 0);
    assert_eq!(fixture.registry.inner().device_param(1, 0, "path"), None);
}

#[test]
fn given_missing_device_when_showing_then_positive_enoent() {
    let mut fixture = Fixture::new(|_| {});
    fixture.send(target("iscsi", Op::New, 1));

    let response = fixture.send(Request::new("iscsi", Mode::Device, Op::Show).with_target(1).with_lun(4));

    assert_empty(&response, Errno::ENOENT.code());
}

#[test]
fn given_device_bind_when_routed_then_einval() {
    let mut fixture = Fixture::new(|_| {});

    let response = fixture.send(Request::new("iscsi", Mode::Device, Op::Bind).with_target(1));

    assert_empty(&response, Errno::EINVAL.negated());
}

#[test]
fn given_driver_without_account_hook_when_account_request_then_einval() {
    let mut fixture = Fixture::new(|_| {});

    let mutate = fixture.send(Request::new("plain", Mode::Account, Op::New).with_account(3));
    let show = fixture.send(Request::new("plain", Mode::Account, Op::Show));

    assert_empty(&mutate, Errno::EINVAL.negated());
    assert_empty(&show, Errno::EINVAL.code());
}

/// **VALUE**: A failing account Show is reported as an empty success.
///
/// **WHY THIS MATTERS**: Administrative clients treat account listings as "maybe empty";
/// they never see an error envelope from this path and changing that breaks them.
#[test]
fn given_failing_account_show_when_routed_then_empty_success() {
    let mut fixture = Fixture::new(|driver| driver.account_output = Err(Errno::ENOENT));

    let response = fixture.send(Request::new("iscsi", Mode::Account, Op::Show).with_target(2));

    assert_empty(&response, 0);
}

/// **VALUE**: An account hook over-reporting its length gets the same empty success as
/// a failing one.
///
/// **BUG THIS CATCHES**: Would catch the account path falling through to the generic
/// length check, which answers EIO on a path whose clients never expect an error.
#[test]
fn given_account_show_overreporting_length_when_routed_then_empty_success() {
    let mut fixture = Fixture::new(|driver| {
        driver.account_output = Ok(b"alice\n".to_vec());
        driver.account_claims = Some(CAPACITY);
    });

    let response = fixture.send(Request::new("iscsi", Mode::Account, Op::Show));

    assert_empty(&response, 0);
}

#[test]
fn given_account_show_when_hook_lists_accounts_then_payload_returned() {
    let mut fixture = Fixture::new(|driver| driver.account_output = Ok(b"alice\nbob\n".to_vec()));

    let response = fixture.send(Request::new("iscsi", Mode::Account, Op::Show));

    assert_eq!(response.error_code, 0);
    assert_eq!(response.payload, b"alice\nbob\n");
}

#[test]
fn given_failing_account_new_when_routed_then_negative_errno() {
    let mut fixture = Fixture::new(|driver| driver.account_output = Err(Errno::EEXIST));

    let response = fixture.send(
        Request::new("iscsi", Mode::Account, Op::New)
            .with_target(2)
            .with_account(8)
            .with_payload(b"user\0secret".to_vec()),
    );

    assert_empty(&response, Errno::EEXIST.negated());
    assert_eq!(
        fixture.calls(),
        vec![HookCall::Account {
            op: Op::New,
            target_id: 2,
            account_id: 8,
            params: b"user\0secret".to_vec()
        }]
    );
}

/// **VALUE**: Bytes a mutating handler writes are never counted in the envelope.
#[test]
fn given_mutating_hook_writing_bytes_when_routed_then_length_is_header_only() {
    let mut fixture = Fixture::new(|driver| driver.account_output = Ok(b"ignored".to_vec()));

    let response = fixture.send(Request::new("iscsi", Mode::Account, Op::Update).with_account(1));

    assert_empty(&response, 0);
}

#[test]
fn given_driver_defined_mode_when_showing_then_raw_mode_reaches_hook() {
    let mut fixture = Fixture::new(|driver| driver.show_output = Ok(b"session list".to_vec()));

    let response = fixture.send(
        Request::new("iscsi", Mode::DriverDefined(64), Op::Show)
            .with_target(1)
            .with_session(77, 2),
    );

    assert_eq!(response.error_code, 0);
    assert_eq!(response.payload, b"session list");
    assert!(matches!(
        fixture.calls().as_slice(),
        [HookCall::Show(ShowQuery { mode: 64, target_id: 1, session_id: 77, connection_id: 2, .. })]
    ));
}

#[test]
fn given_driver_defined_mode_when_not_show_then_einval_without_hook_call() {
    let mut fixture = Fixture::new(|_| {});

    let response = fixture.send(Request::new("iscsi", Mode::DriverDefined(64), Op::Delete));

    assert_empty(&response, Errno::EINVAL.negated());
    assert!(fixture.calls().is_empty());
}

#[test]
fn given_small_capacity_when_listing_targets_then_listing_is_truncated_to_fit() {
    let mut fixture = Fixture::new(|_| {});
    for tid in 0..20 {
        fixture.send(target("iscsi", Op::New, tid));
    }
    let capacity = RESPONSE_HEADER_SIZE + 16;

    let response = fixture
        .controller
        .process(&target("iscsi", Op::Show, -1), capacity);

    assert_eq!(response.error_code, 0);
    assert_eq!(response.payload.len(), 16);
    assert_eq!(response.total_length as usize, capacity);
}

#[test]
fn given_out_of_range_driver_index_when_handling_then_einval() {
    let mut fixture = Fixture::new(|_| {});

    let response = fixture
        .controller
        .handle_request(9, &target("iscsi", Op::New, 1), CAPACITY);

    assert_empty(&response, Errno::EINVAL.negated());
}
