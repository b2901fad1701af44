//! Inbound operation dispatch.
//!
//! Every inbound route funnels into [`Dispatcher::dispatch`], which runs one
//! resolution algorithm parameterized by [`Operation`]:
//!
//! ```text
//! parse path ──▶ object enabled? ──no──▶ 4.04
//!                      │
//!               enabler configured? ──no──▶ 4.05
//!                      │
//!         resource defined? ──no──▶ 4.04       (read / write / execute)
//!                      │
//!         access flag allows op? ──no──▶ 4.05  (enabler not called)
//!                      │
//!               decode write payload ──err──▶ 4.00
//!                      │
//!               enabler callback ──▶ response code (+ TLV body on read)
//! ```
//!
//! The table lock is held only while resolving the target; enabler callbacks
//! and hooks run without it.

use std::{fmt, sync::Arc};

use bytes::Bytes;
use lwm2m_proto::{
    InstanceId, ObjectDefinition, ObjectPath, Operations, Request, ResourceDefinition, Response,
    ResponseCode, Value,
    coap::CONTENT_FORMAT_TEXT,
    tlv::{self, CONTENT_FORMAT_TLV},
};
use parking_lot::RwLock;
use tracing::{debug, trace, warn};

use crate::{
    enabler::{OperationContext, SharedEnabler},
    hooks::SharedHooks,
    table::ObjectTable,
};

/// Content-Format number for `application/octet-stream`.
const CONTENT_FORMAT_OPAQUE: u16 = 42;

/// Remote operation requested by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Create an object instance.
    Create,
    /// Read a resource or an object instance.
    Read,
    /// Write a resource.
    Write,
    /// Delete an object instance.
    Delete,
    /// Execute a resource.
    Execute,
}

impl Operation {
    /// All operations.
    pub const ALL: [Self; 5] = [Self::Create, Self::Read, Self::Write, Self::Delete, Self::Execute];

    /// Resource access flag the operation requires, if it targets a resource.
    pub fn required_access(self) -> Option<Operations> {
        match self {
            Self::Read => Some(Operations::READ),
            Self::Write => Some(Operations::WRITE),
            Self::Execute => Some(Operations::EXECUTE),
            Self::Create | Self::Delete => None,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Write => "write",
            Self::Delete => "delete",
            Self::Execute => "execute",
        };
        f.write_str(name)
    }
}

/// Result of dispatching one operation, before correlation.
#[derive(Debug)]
struct Outcome {
    code: ResponseCode,
    payload: Option<Bytes>,
}

impl Outcome {
    fn code(code: ResponseCode) -> Self {
        Self { code, payload: None }
    }

    fn content(code: ResponseCode, payload: Bytes) -> Self {
        Self { code, payload: Some(payload) }
    }
}

/// Target resolved under the table lock.
struct Target {
    definition: Arc<ObjectDefinition>,
    enabler: SharedEnabler,
}

/// Routes inbound operations to object enablers.
#[derive(Clone)]
pub struct Dispatcher {
    table: Arc<RwLock<ObjectTable>>,
    hooks: SharedHooks,
}

impl Dispatcher {
    /// Dispatcher over a shared table with no hooks.
    pub fn new(table: Arc<RwLock<ObjectTable>>) -> Self {
        Self { table, hooks: SharedHooks::default() }
    }

    pub(crate) fn with_hooks(table: Arc<RwLock<ObjectTable>>, hooks: SharedHooks) -> Self {
        Self { table, hooks }
    }

    /// Handle `request` as `operation` and build the correlated response.
    pub fn dispatch(&self, operation: Operation, request: &Request) -> Response {
        let outcome = self.execute(operation, request);
        debug!(%operation, path = %request.path_str(), code = %outcome.code, "dispatched");

        let response = Response::reply_to(request, outcome.code);
        match outcome.payload {
            Some(payload) => response.with_payload(payload, CONTENT_FORMAT_TLV),
            None => response,
        }
    }

    fn execute(&self, operation: Operation, request: &Request) -> Outcome {
        let path = match ObjectPath::from_segments(&request.path) {
            Ok(path) => path,
            Err(e) => {
                debug!(%operation, error = %e, "unparseable path");
                return Outcome::code(ResponseCode::BadRequest);
            },
        };

        let target = match self.resolve(path) {
            Ok(target) => target,
            Err(code) => return Outcome::code(code),
        };

        // Object-level operations are not supported.
        let Some(instance) = path.instance else {
            return Outcome::code(ResponseCode::MethodNotAllowed);
        };

        let resource = match (operation.required_access(), path.resource) {
            (Some(access), Some(resource_id)) => {
                let Some(resource) = target.definition.resource(resource_id) else {
                    return Outcome::code(ResponseCode::NotFound);
                };
                if !resource.allows(access) {
                    trace!(%operation, %path, "resource does not permit operation");
                    return Outcome::code(ResponseCode::MethodNotAllowed);
                }
                Some(resource)
            },
            (Some(_), None) if operation == Operation::Read => {
                return self.read_instance(&target, path, instance, request);
            },
            (Some(_), None) => return Outcome::code(ResponseCode::MethodNotAllowed),
            (None, Some(resource_id)) => target.definition.resource(resource_id),
            (None, None) => None,
        };

        let ctx = OperationContext::new(operation, path, request);
        let enabler = &target.enabler;

        match (operation, resource) {
            (Operation::Read, Some(resource)) => {
                let (value, code) = enabler.on_read(instance, resource.id, &ctx);
                if !code.is_success() {
                    return Outcome::code(code);
                }
                match tlv::encode(resource.id, resource.multiple, &value) {
                    Ok(payload) => {
                        self.hooks.emit_read(path);
                        Outcome::content(code, payload)
                    },
                    Err(e) => {
                        warn!(%path, error = %e, "failed to encode read value");
                        Outcome::code(ResponseCode::InternalServerError)
                    },
                }
            },
            (Operation::Write, Some(resource)) => {
                let value = match decode_write(request, resource) {
                    Ok(value) => value,
                    Err(code) => return Outcome::code(code),
                };
                let code = enabler.on_write(instance, resource.id, &ctx.with_value(&value));
                if code.is_success() {
                    self.hooks.emit_write(path, &value);
                }
                Outcome::code(code)
            },
            (Operation::Execute, Some(resource)) => {
                let code = enabler.on_execute(instance, resource.id, &ctx);
                if code.is_success() {
                    self.hooks.emit_execute(path);
                }
                Outcome::code(code)
            },
            (Operation::Create, _) => {
                let code = enabler.on_create(instance, path.resource, &ctx);
                if code.is_success() {
                    self.track_instance(path, instance, true);
                }
                Outcome::code(code)
            },
            (Operation::Delete, _) => {
                if path.resource.is_some() {
                    return Outcome::code(ResponseCode::MethodNotAllowed);
                }
                let code = enabler.on_delete(instance, &ctx);
                if code.is_success() {
                    self.track_instance(path, instance, false);
                }
                Outcome::code(code)
            },
            (Operation::Read | Operation::Write | Operation::Execute, None) => {
                Outcome::code(ResponseCode::MethodNotAllowed)
            },
        }
    }

    fn resolve(&self, path: ObjectPath) -> Result<Target, ResponseCode> {
        let table = self.table.read();
        let object = table.get(path.object).ok_or_else(|| {
            trace!(%path, "object not enabled");
            ResponseCode::NotFound
        })?;
        let enabler = object.enabler().cloned().ok_or_else(|| {
            trace!(%path, "object has no enabler");
            ResponseCode::MethodNotAllowed
        })?;
        Ok(Target { definition: Arc::clone(object.definition()), enabler })
    }

    /// Read every readable resource of an instance into one TLV body.
    ///
    /// Resources the enabler declines are left out. The response carries the
    /// code of the first resource read; if the enabler declines every
    /// resource the first refusal code is returned.
    fn read_instance(
        &self,
        target: &Target,
        path: ObjectPath,
        instance: InstanceId,
        request: &Request,
    ) -> Outcome {
        let ctx = OperationContext::new(Operation::Read, path, request);
        let mut values = Vec::new();
        let mut first_success = None;
        let mut first_failure = None;

        for resource in target.definition.resources().iter().filter(|r| r.is_readable()) {
            let (value, code) = target.enabler.on_read(instance, resource.id, &ctx);
            if code.is_success() {
                first_success.get_or_insert(code);
                values.push((resource.id, resource.multiple, value));
            } else {
                first_failure.get_or_insert(code);
            }
        }

        let Some(code) = first_success else {
            return Outcome::code(first_failure.unwrap_or(ResponseCode::MethodNotAllowed));
        };

        match tlv::encode_resources(values.iter().map(|(id, multiple, value)| (*id, *multiple, value))) {
            Ok(payload) => {
                self.hooks.emit_read(path);
                Outcome::content(code, payload)
            },
            Err(e) => {
                warn!(%path, error = %e, "failed to encode instance");
                Outcome::code(ResponseCode::InternalServerError)
            },
        }
    }

    fn track_instance(&self, path: ObjectPath, instance: InstanceId, present: bool) {
        let mut table = self.table.write();
        let result = if present {
            table.add_instance(path.object, instance).map(|()| true)
        } else {
            table.remove_instance(path.object, instance)
        };
        if let Err(e) = result {
            // Object was disabled while the enabler ran.
            debug!(%path, error = %e, "instance not tracked");
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher").field("objects", &self.table.read().len()).finish()
    }
}

/// Decode a write body according to its content format.
fn decode_write(request: &Request, resource: &ResourceDefinition) -> Result<Value, ResponseCode> {
    let decoded = match request.content_format {
        Some(CONTENT_FORMAT_TLV) => tlv::decode(&request.payload, resource),
        Some(CONTENT_FORMAT_TEXT) | None => match std::str::from_utf8(&request.payload) {
            Ok(text) => Value::from_text(resource.resource_type, text),
            Err(_) => return Err(ResponseCode::BadRequest),
        },
        Some(CONTENT_FORMAT_OPAQUE) => Ok(Value::Opaque(request.payload.clone())),
        Some(_) => return Err(ResponseCode::UnsupportedContentFormat),
    };

    decoded.map_err(|e| {
        debug!(resource = resource.id, error = %e, "undecodable write payload");
        ResponseCode::BadRequest
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use lwm2m_proto::{Method, ObjectType, OmaRegistry, ResourceId, coap::CONTENT_FORMAT_LINK};

    use super::*;
    use crate::enabler::{NullEnabler, ObjectEnabler};

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<(Operation, InstanceId, Option<ResourceId>)>>,
        written: Mutex<Option<Value>>,
    }

    impl ObjectEnabler for Recorder {
        fn on_create(
            &self,
            instance: InstanceId,
            resource: Option<ResourceId>,
            _ctx: &OperationContext<'_>,
        ) -> ResponseCode {
            self.calls.lock().unwrap().push((Operation::Create, instance, resource));
            ResponseCode::Created
        }

        fn on_read(
            &self,
            instance: InstanceId,
            resource: ResourceId,
            _ctx: &OperationContext<'_>,
        ) -> (Value, ResponseCode) {
            self.calls.lock().unwrap().push((Operation::Read, instance, Some(resource)));
            match resource {
                0 => (Value::from("Acme"), ResponseCode::Content),
                13 => (Value::Time(42), ResponseCode::Content),
                _ => (Value::Empty, ResponseCode::NotFound),
            }
        }

        fn on_write(
            &self,
            instance: InstanceId,
            resource: ResourceId,
            ctx: &OperationContext<'_>,
        ) -> ResponseCode {
            self.calls.lock().unwrap().push((Operation::Write, instance, Some(resource)));
            *self.written.lock().unwrap() = ctx.value.cloned();
            ResponseCode::Changed
        }

        fn on_delete(&self, instance: InstanceId, _ctx: &OperationContext<'_>) -> ResponseCode {
            self.calls.lock().unwrap().push((Operation::Delete, instance, None));
            ResponseCode::Deleted
        }

        fn on_execute(
            &self,
            instance: InstanceId,
            resource: ResourceId,
            _ctx: &OperationContext<'_>,
        ) -> ResponseCode {
            self.calls.lock().unwrap().push((Operation::Execute, instance, Some(resource)));
            ResponseCode::Changed
        }
    }

    fn setup() -> (Dispatcher, Arc<Recorder>, Arc<RwLock<ObjectTable>>) {
        let recorder = Arc::new(Recorder::default());
        let mut table = ObjectTable::with_registry(Arc::new(OmaRegistry::new()));
        table.enable(ObjectType::DEVICE, Some(recorder.clone())).unwrap();
        table.enable(ObjectType::SERVER, Some(Arc::new(NullEnabler))).unwrap();
        table.enable(ObjectType::LOCATION, None).unwrap();
        table.add_instance(ObjectType::DEVICE, 0).unwrap();
        let table = Arc::new(RwLock::new(table));
        (Dispatcher::new(Arc::clone(&table)), recorder, table)
    }

    fn calls(recorder: &Recorder) -> usize {
        recorder.calls.lock().unwrap().len()
    }

    #[test]
    fn absent_object_is_not_found() {
        let (d, _, _) = setup();
        let resp = d.dispatch(Operation::Read, &Request::new(Method::Get, "/6000/0/0"));
        assert_eq!(resp.code, ResponseCode::NotFound);
    }

    #[test]
    fn object_without_enabler_is_not_allowed() {
        let (d, _, _) = setup();
        let resp = d.dispatch(Operation::Read, &Request::new(Method::Get, "/6/0/0"));
        assert_eq!(resp.code, ResponseCode::MethodNotAllowed);
    }

    #[test]
    fn null_enabler_refuses() {
        let (d, _, _) = setup();
        let resp = d.dispatch(Operation::Read, &Request::new(Method::Get, "/1/0/0"));
        assert_eq!(resp.code, ResponseCode::MethodNotAllowed);
    }

    #[test]
    fn read_encodes_tlv() {
        let (d, recorder, _) = setup();
        let req = Request::new(Method::Get, "/3/0/13").with_correlation(vec![9u8], 5);
        let resp = d.dispatch(Operation::Read, &req);

        assert_eq!(resp.code, ResponseCode::Content);
        assert_eq!(resp.content_format, Some(CONTENT_FORMAT_TLV));
        assert_eq!(resp.payload.as_ref(), &[0xC1, 0x0D, 0x2A]);
        assert_eq!(resp.token.as_ref(), &[9]);
        assert_eq!(resp.message_id, 5);
        assert_eq!(calls(&recorder), 1);
    }

    #[test]
    fn flag_mismatch_skips_enabler() {
        let (d, recorder, _) = setup();

        // Reboot is execute-only, Manufacturer is read-only.
        let read = d.dispatch(Operation::Read, &Request::new(Method::Get, "/3/0/4"));
        let write = d.dispatch(Operation::Write, &Request::new(Method::Put, "/3/0/0"));
        let exec = d.dispatch(Operation::Execute, &Request::new(Method::Post, "/3/0/0"));

        assert_eq!(read.code, ResponseCode::MethodNotAllowed);
        assert_eq!(write.code, ResponseCode::MethodNotAllowed);
        assert_eq!(exec.code, ResponseCode::MethodNotAllowed);
        assert_eq!(calls(&recorder), 0);
    }

    #[test]
    fn undefined_resource_is_not_found() {
        let (d, recorder, _) = setup();
        let resp = d.dispatch(Operation::Read, &Request::new(Method::Get, "/3/0/99"));
        assert_eq!(resp.code, ResponseCode::NotFound);
        assert_eq!(calls(&recorder), 0);
    }

    #[test]
    fn write_decodes_text_and_tlv() {
        let (d, recorder, _) = setup();

        let text = Request::new(Method::Put, "/3/0/13").with_payload("1700000000", CONTENT_FORMAT_TEXT);
        assert_eq!(d.dispatch(Operation::Write, &text).code, ResponseCode::Changed);
        assert_eq!(*recorder.written.lock().unwrap(), Some(Value::Time(1_700_000_000)));

        let tlv = Request::new(Method::Put, "/3/0/13")
            .with_payload(tlv::encode(13, false, &Value::Time(7)).unwrap(), CONTENT_FORMAT_TLV);
        assert_eq!(d.dispatch(Operation::Write, &tlv).code, ResponseCode::Changed);
        assert_eq!(*recorder.written.lock().unwrap(), Some(Value::Time(7)));
    }

    #[test]
    fn undecodable_write_is_bad_request() {
        let (d, recorder, _) = setup();
        let req = Request::new(Method::Put, "/3/0/13").with_payload("yesterday", CONTENT_FORMAT_TEXT);
        assert_eq!(d.dispatch(Operation::Write, &req).code, ResponseCode::BadRequest);

        let req = Request::new(Method::Put, "/3/0/13").with_payload("</3>", CONTENT_FORMAT_LINK);
        assert_eq!(d.dispatch(Operation::Write, &req).code, ResponseCode::UnsupportedContentFormat);

        let mut payload = tlv::encode(13, false, &Value::Time(7)).unwrap().to_vec();
        payload.extend_from_slice(&tlv::encode(14, false, &Value::String("+01".into())).unwrap());
        let req = Request::new(Method::Put, "/3/0/13").with_payload(payload, CONTENT_FORMAT_TLV);
        assert_eq!(d.dispatch(Operation::Write, &req).code, ResponseCode::BadRequest);
        assert_eq!(calls(&recorder), 0);
    }

    #[test]
    fn execute_reaches_enabler() {
        let (d, recorder, _) = setup();
        let resp = d.dispatch(Operation::Execute, &Request::new(Method::Post, "/3/0/4"));
        assert_eq!(resp.code, ResponseCode::Changed);
        assert_eq!(recorder.calls.lock().unwrap()[0], (Operation::Execute, 0, Some(4)));
    }

    #[test]
    fn instance_read_collects_readable_resources() {
        let (d, _, _) = setup();
        let resp = d.dispatch(Operation::Read, &Request::new(Method::Get, "/3/0"));
        assert_eq!(resp.code, ResponseCode::Content);

        let entries = tlv::decode_entries(&resp.payload).unwrap();
        let ids: Vec<_> = entries.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![0, 13]);
    }

    #[test]
    fn object_level_requests_are_not_allowed() {
        let (d, _, _) = setup();
        assert_eq!(
            d.dispatch(Operation::Read, &Request::new(Method::Get, "/3")).code,
            ResponseCode::MethodNotAllowed
        );
        assert_eq!(
            d.dispatch(Operation::Write, &Request::new(Method::Put, "/3/0")).code,
            ResponseCode::MethodNotAllowed
        );
    }

    #[test]
    fn create_and_delete_track_instances() {
        let (d, _, table) = setup();

        let resp = d.dispatch(Operation::Create, &Request::new(Method::Post, "/3/1"));
        assert_eq!(resp.code, ResponseCode::Created);
        assert!(table.read().get(ObjectType::DEVICE).unwrap().has_instance(1));

        let resp = d.dispatch(Operation::Delete, &Request::new(Method::Delete, "/3/1"));
        assert_eq!(resp.code, ResponseCode::Deleted);
        assert!(!table.read().get(ObjectType::DEVICE).unwrap().has_instance(1));
    }

    #[test]
    fn unparseable_path_is_bad_request() {
        let (d, _, _) = setup();
        let resp = d.dispatch(Operation::Read, &Request::new(Method::Get, "/3/zero"));
        assert_eq!(resp.code, ResponseCode::BadRequest);
    }

    /// Answers every read with 2.03 Valid.
    struct Revalidating;

    impl ObjectEnabler for Revalidating {
        fn on_read(
            &self,
            _instance: InstanceId,
            _resource: ResourceId,
            _ctx: &OperationContext<'_>,
        ) -> (Value, ResponseCode) {
            (Value::Integer(42), ResponseCode::Valid)
        }
    }

    #[test]
    fn read_keeps_enabler_success_code() {
        let mut table = ObjectTable::with_registry(Arc::new(OmaRegistry::new()));
        table.enable(ObjectType::DEVICE, Some(Arc::new(Revalidating))).unwrap();
        table.add_instance(ObjectType::DEVICE, 0).unwrap();
        let d = Dispatcher::new(Arc::new(RwLock::new(table)));

        let resource = d.dispatch(Operation::Read, &Request::new(Method::Get, "/3/0/0"));
        assert_eq!(resource.code, ResponseCode::Valid);
        assert_eq!(resource.payload.as_ref(), &[0xC1, 0x00, 0x2A]);

        let instance = d.dispatch(Operation::Read, &Request::new(Method::Get, "/3/0"));
        assert_eq!(instance.code, ResponseCode::Valid);
        assert!(!instance.payload.is_empty());
    }

    #[test]
    fn signed_segments_are_bad_request() {
        let (d, recorder, _) = setup();
        for path in ["/+3/0/0", "/3/+0/0", "/3/0/+0"] {
            let resp = d.dispatch(Operation::Read, &Request::new(Method::Get, path));
            assert_eq!(resp.code, ResponseCode::BadRequest, "{path}");
        }
        assert_eq!(calls(&recorder), 0);
    }
}
