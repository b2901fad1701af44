//! Real client wrapper mirroring [`ModelWorld`](crate::ModelWorld).
//!
//! Drives a started [`Client`] over a [`LoopbackTransport`]. Inbound requests
//! go through the installed routes exactly as a server's would.

use std::{collections::BTreeMap, sync::Arc};

use lwm2m_client::{Client, ClientConfig, ClientError, NullEnabler, SharedEnabler};
use lwm2m_proto::{
    Method, ObjectType, Request, ResourceType, coap::CONTENT_FORMAT_TEXT,
};

use crate::{
    fixtures::{RecordingEnabler, fixture_registry, sample_text},
    loopback::LoopbackTransport,
    model::{
        Action, ActionError, ActionResult, ModelEnabler, ObservableState, RequestKind,
        instance_id, object_type, resource_id,
    },
};

/// Endpoint name within the default bound.
const SHORT_NAME: &str = "harness";
/// Endpoint name one character over the default bound.
const LONG_NAME: &str = "harness-node";

/// Started client plus handles to its transport and recording enabler.
pub struct ClientWorld {
    client: Client<LoopbackTransport>,
    transport: LoopbackTransport,
    recorder: RecordingEnabler,
}

impl Default for ClientWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientWorld {
    /// Client over the fixture registry with its routes installed.
    pub fn new() -> Self {
        let transport = LoopbackTransport::new();
        let mut client =
            Client::new(transport.clone(), fixture_registry(), ClientConfig::default());
        // Loopback start cannot fail; a failure would surface as 5.03 on
        // every request and be caught by the model comparison.
        let _ = client.start();
        Self { client, transport, recorder: RecordingEnabler::new() }
    }

    /// The client under test.
    pub fn client(&self) -> &Client<LoopbackTransport> {
        &self.client
    }

    /// Test-side transport handle.
    pub fn transport(&self) -> &LoopbackTransport {
        &self.transport
    }

    /// The recording enabler shared by every object it is installed on.
    pub fn recorder(&self) -> &RecordingEnabler {
        &self.recorder
    }

    /// Apply an action to the real client.
    pub fn apply(&mut self, action: &Action) -> ActionResult {
        match *action {
            Action::Enable { object, enabler } => {
                let enabler = self.enabler(enabler);
                to_result(self.client.enable_object_with(object_type(object), enabler))
            },
            Action::SetEnabler { object } => {
                to_result(self.client.set_enabler(object_type(object), self.recorder.clone()))
            },
            Action::AddInstance { object, instance } => {
                to_result(self.client.add_object_instance(object_type(object), instance_id(instance)))
            },
            Action::Request { kind, object, instance, resource } => {
                let request = self.build_request(
                    kind,
                    object_type(object),
                    instance_id(instance),
                    resource.map(resource_id),
                );
                ActionResult::Code(self.transport.deliver(&request).code)
            },
            Action::Register { long_name } => {
                let name = if long_name { LONG_NAME } else { SHORT_NAME };
                to_result(self.client.register(name))
            },
            Action::Update => to_result(self.client.update()),
            Action::Deregister => to_result(self.client.deregister()),
        }
    }

    fn enabler(&self, kind: ModelEnabler) -> Option<SharedEnabler> {
        match kind {
            ModelEnabler::Missing => None,
            ModelEnabler::Null => Some(Arc::new(NullEnabler)),
            ModelEnabler::Recording => Some(Arc::new(self.recorder.clone())),
        }
    }

    fn build_request(
        &self,
        kind: RequestKind,
        object_type: ObjectType,
        instance: u16,
        resource: Option<u16>,
    ) -> Request {
        let instance_path = format!("/{object_type}/{instance}");
        let resource_path = |r: u16| format!("{instance_path}/{r}");

        match (kind, resource) {
            (RequestKind::Read, Some(r)) => Request::new(Method::Get, &resource_path(r)),
            (RequestKind::Read, None) => Request::new(Method::Get, &instance_path),
            (RequestKind::Write, Some(r)) => {
                let text = sample_text(self.resource_type(object_type, r));
                Request::new(Method::Put, &resource_path(r)).with_payload(text, CONTENT_FORMAT_TEXT)
            },
            (RequestKind::Write, None) => Request::new(Method::Put, &instance_path),
            (RequestKind::Execute, r) => Request::new(Method::Post, &resource_path(r.unwrap_or(0))),
            (RequestKind::Create, _) => Request::new(Method::Post, &instance_path),
            (RequestKind::Delete, _) => Request::new(Method::Delete, &instance_path),
        }
    }

    fn resource_type(&self, object_type: ObjectType, resource: u16) -> ResourceType {
        self.client
            .table()
            .registry()
            .and_then(|registry| registry.definition(object_type))
            .and_then(|definition| definition.resource(resource).map(|r| r.resource_type))
            .unwrap_or(ResourceType::Integer)
    }

    /// Snapshot for comparison with the model.
    pub fn observable_state(&self) -> ObservableState {
        let instances: BTreeMap<_, _> = self
            .client
            .table()
            .objects()
            .map(|object| (object.object_type(), object.instances().collect()))
            .collect();
        ObservableState {
            instances,
            registration: self.client.state(),
            enabler_calls: self.recorder.call_count(),
        }
    }
}

fn to_result<T>(result: Result<T, ClientError>) -> ActionResult {
    match result {
        Ok(_) => ActionResult::Ok,
        Err(e) => ActionResult::Error(match e {
            ClientError::AlreadyEnabled { .. } => ActionError::AlreadyEnabled,
            ClientError::NotEnabled { .. } => ActionError::NotEnabled,
            ClientError::UnknownObject { .. } => ActionError::UnknownObject,
            ClientError::EndpointNameTooLong { .. } => ActionError::NameTooLong,
            ClientError::StateConflict { .. } => ActionError::StateConflict,
            _ => ActionError::Unexpected,
        }),
    }
}
