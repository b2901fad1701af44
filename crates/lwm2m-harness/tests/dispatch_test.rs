//! End-to-end dispatch through a started client.
//!
//! Requests enter through the loopback transport's routes, the same path a
//! server's requests take on a real socket.

use std::sync::{Arc, Mutex};

use lwm2m_client::{
    Client, ClientConfig, ClientError, Dispatcher, NullEnabler, ObjectEnabler, ObjectTable,
    Operation, OperationContext, SharedEnabler,
};
use lwm2m_harness::{FIXTURE_OBJECT, FixedEnabler, LoopbackTransport, RecordingEnabler, fixture_registry};
use lwm2m_proto::{
    InstanceId, Method, ObjectPath, ObjectType, OmaRegistry, Request, ResourceId, ResponseCode,
    Value, coap::CONTENT_FORMAT_TEXT, tlv,
};
use parking_lot::RwLock;

fn started_client() -> (Client<LoopbackTransport>, LoopbackTransport) {
    let transport = LoopbackTransport::new();
    let mut client = Client::new(transport.clone(), fixture_registry(), ClientConfig::default());
    client.start().unwrap();
    (client, transport)
}

/// Device enabler answering 42 for manufacturer reads.
struct AnswerEnabler;

impl ObjectEnabler for AnswerEnabler {
    fn on_read(
        &self,
        instance: InstanceId,
        resource: ResourceId,
        _ctx: &OperationContext<'_>,
    ) -> (Value, ResponseCode) {
        match (instance, resource) {
            (0, 0) => (Value::Integer(42), ResponseCode::Content),
            _ => (Value::Empty, ResponseCode::NotFound),
        }
    }
}

#[test]
fn null_enabler_on_object_one_refuses_read() {
    let mut table = ObjectTable::with_registry(Arc::new(OmaRegistry::new()));
    table.enable(ObjectType(1), Some(Arc::new(NullEnabler))).unwrap();
    let dispatcher = Dispatcher::new(Arc::new(RwLock::new(table)));

    let resp = dispatcher.dispatch(Operation::Read, &Request::new(Method::Get, "/1/0/0"));

    assert_eq!(resp.code, ResponseCode::MethodNotAllowed);
    assert!(resp.payload.is_empty());
}

#[test]
fn device_read_returns_tlv_encoded_value() {
    let (client, transport) = started_client();
    client.set_enabler(ObjectType::DEVICE, AnswerEnabler).unwrap();

    let resp = transport.request(Method::Get, "/3/0/0");

    assert_eq!(resp.code, ResponseCode::Content);
    assert_eq!(resp.payload, tlv::encode(0, false, &Value::Integer(42)).unwrap());
    assert_eq!(resp.payload.as_ref(), &[0xC1, 0x00, 0x2A]);
}

#[test]
fn missing_read_flag_never_reaches_enabler() {
    let (client, transport) = started_client();
    let recorder = RecordingEnabler::new();
    client.enable_object(FIXTURE_OBJECT, recorder.clone()).unwrap();

    // Label (1) is write-only, Trigger (2) execute-only, Sealed (4) has no access.
    for resource in [1, 2, 4] {
        let resp = transport.request(Method::Get, &format!("/9000/0/{resource}"));
        assert_eq!(resp.code, ResponseCode::MethodNotAllowed, "resource {resource}");
    }
    assert_eq!(recorder.call_count(), 0);
}

#[test]
fn undefined_resource_is_not_found_for_every_operation() {
    let (client, transport) = started_client();
    let recorder = RecordingEnabler::new();
    client.enable_object(FIXTURE_OBJECT, recorder.clone()).unwrap();

    assert_eq!(transport.request(Method::Get, "/9000/0/77").code, ResponseCode::NotFound);
    assert_eq!(transport.request(Method::Put, "/9000/0/77").code, ResponseCode::NotFound);
    assert_eq!(transport.request(Method::Post, "/9000/0/77").code, ResponseCode::NotFound);
    assert_eq!(recorder.call_count(), 0);
}

#[test]
fn unknown_object_and_malformed_paths_degrade() {
    let (_client, transport) = started_client();

    assert_eq!(transport.request(Method::Get, "/4242/0/0").code, ResponseCode::NotFound);
    // Non-numeric segments match no route.
    assert_eq!(transport.request(Method::Get, "/3/zero/0").code, ResponseCode::NotFound);
    // Four segments match no route either.
    assert_eq!(transport.request(Method::Get, "/3/0/0/0").code, ResponseCode::NotFound);
}

#[test]
fn object_without_enabler_refuses() {
    let (client, transport) = started_client();
    client.enable_object_with(ObjectType::LOCATION, None).unwrap();

    assert_eq!(transport.request(Method::Get, "/6/0/0").code, ResponseCode::MethodNotAllowed);
}

#[test]
fn write_then_read_round_trips_through_enabler() {
    let (client, transport) = started_client();
    let recorder = RecordingEnabler::new();
    client.enable_object(FIXTURE_OBJECT, recorder.clone()).unwrap();

    let write = Request::new(Method::Put, "/9000/2/3").with_payload("-300", CONTENT_FORMAT_TEXT);
    assert_eq!(transport.deliver(&write).code, ResponseCode::Changed);
    assert_eq!(recorder.value(2, 3), Some(Value::Integer(-300)));

    let read = transport.request(Method::Get, "/9000/2/3");
    assert_eq!(read.code, ResponseCode::Content);
    let entries = tlv::decode_entries(&read.payload).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].id, 3);
}

#[test]
fn malformed_write_payload_is_bad_request() {
    let (client, transport) = started_client();
    let recorder = RecordingEnabler::new();
    client.enable_object(FIXTURE_OBJECT, recorder.clone()).unwrap();

    let write = Request::new(Method::Put, "/9000/0/3").with_payload("three", CONTENT_FORMAT_TEXT);
    assert_eq!(transport.deliver(&write).code, ResponseCode::BadRequest);
    assert_eq!(recorder.call_count(), 0);
}

#[test]
fn instance_read_covers_readable_resources() {
    let (client, transport) = started_client();
    let recorder = RecordingEnabler::new();
    client.enable_object(FIXTURE_OBJECT, recorder.clone()).unwrap();

    let resp = transport.request(Method::Get, "/9000/0");
    assert_eq!(resp.code, ResponseCode::Content);

    let ids: Vec<_> = tlv::decode_entries(&resp.payload).unwrap().iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![0, 3, 5]);
    assert_eq!(recorder.call_count(), 3);
}

#[test]
fn enabler_codes_pass_through() {
    let (client, transport) = started_client();
    client.enable_object(FIXTURE_OBJECT, FixedEnabler(ResponseCode::Forbidden)).unwrap();

    assert_eq!(transport.request(Method::Get, "/9000/0/0").code, ResponseCode::Forbidden);
    assert_eq!(transport.request(Method::Post, "/9000/0/2").code, ResponseCode::Forbidden);
    assert_eq!(transport.request(Method::Get, "/9000/0").code, ResponseCode::Forbidden);
    assert_eq!(transport.request(Method::Post, "/9000/1").code, ResponseCode::Forbidden);
    assert!(!client.object(FIXTURE_OBJECT).unwrap().has_instance(1));
}

#[test]
fn create_and_delete_maintain_instance_set() {
    let (client, transport) = started_client();
    client.enable_object(FIXTURE_OBJECT, RecordingEnabler::new()).unwrap();

    assert_eq!(transport.request(Method::Post, "/9000/5").code, ResponseCode::Created);
    assert!(client.object(FIXTURE_OBJECT).unwrap().has_instance(5));

    assert_eq!(transport.request(Method::Delete, "/9000/5").code, ResponseCode::Deleted);
    assert!(!client.object(FIXTURE_OBJECT).unwrap().has_instance(5));
}

#[test]
fn execute_fires_hook_with_path() {
    let (client, transport) = started_client();
    client.enable_object(FIXTURE_OBJECT, RecordingEnabler::new()).unwrap();

    let executed = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&executed);
    client.on_execute(move |path| log.lock().unwrap().push(path));

    assert_eq!(transport.request(Method::Post, "/9000/1/2").code, ResponseCode::Changed);
    assert_eq!(transport.request(Method::Post, "/9000/1/0").code, ResponseCode::MethodNotAllowed);

    assert_eq!(*executed.lock().unwrap(), vec![ObjectPath::resource(FIXTURE_OBJECT, 1, 2)]);
}

#[test]
fn write_hook_sees_decoded_value() {
    let (client, transport) = started_client();
    client.enable_object(FIXTURE_OBJECT, RecordingEnabler::new()).unwrap();

    let written = Arc::new(Mutex::new(None));
    let slot = Arc::clone(&written);
    client.on_write(move |path, value| *slot.lock().unwrap() = Some((path, value.clone())));

    let write = Request::new(Method::Put, "/9000/0/1").with_payload("kitchen", CONTENT_FORMAT_TEXT);
    transport.deliver(&write);

    assert_eq!(
        *written.lock().unwrap(),
        Some((ObjectPath::resource(FIXTURE_OBJECT, 0, 1), Value::from("kitchen")))
    );
}

#[test]
fn enable_sets_enabler_and_empty_instances() {
    let (client, _) = started_client();
    let enabler: SharedEnabler = Arc::new(RecordingEnabler::new());
    client.enable_object_with(FIXTURE_OBJECT, Some(Arc::clone(&enabler))).unwrap();

    let object = client.object(FIXTURE_OBJECT).unwrap();
    assert!(Arc::ptr_eq(object.enabler().unwrap(), &enabler));
    assert_eq!(object.instances().count(), 0);
}

#[test]
fn second_enable_leaves_first_object_untouched() {
    let (client, _) = started_client();
    let first: SharedEnabler = Arc::new(RecordingEnabler::new());
    client.enable_object_with(FIXTURE_OBJECT, Some(Arc::clone(&first))).unwrap();
    client.add_object_instance(FIXTURE_OBJECT, 3).unwrap();

    let err = client.enable_object(FIXTURE_OBJECT, NullEnabler).unwrap_err();
    assert!(matches!(err, ClientError::AlreadyEnabled { object_type } if object_type == FIXTURE_OBJECT));

    let object = client.object(FIXTURE_OBJECT).unwrap();
    assert!(Arc::ptr_eq(object.enabler().unwrap(), &first));
    assert_eq!(object.instances().collect::<Vec<_>>(), vec![3]);
}

#[test]
fn add_instance_on_unknown_type_mutates_nothing() {
    let (client, _) = started_client();
    let before = client.objects();

    let err = client.add_object_instance(ObjectType::LOCATION, 0).unwrap_err();
    assert!(matches!(err, ClientError::NotEnabled { .. }));
    assert_eq!(client.objects(), before);
    assert!(client.table().objects().all(|o| o.instances().count() == 0));
}
