//! LWM2M device runtime.
//!
//! Wires the client object model to a CoAP over UDP transport and serves a
//! fixed set of objects:
//!
//! ```text
//! lwm2m-device
//!   ├─ Device              (facade: bind, register, update, deregister)
//!   ├─ UdpTransport        (CoAP over UDP, serve thread)
//!   └─ objects
//!        ├─ SecurityObject          /0   one account for the configured server
//!        ├─ NullEnabler             /1   Server object, refuses everything
//!        ├─ DeviceObject            /3   identity, clock, reboot
//!        └─ ConnectivityStatistics  /7   answers 4.01
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
pub mod objects;
mod udp;

use std::{net::SocketAddr, sync::Arc};

pub use error::DeviceError;
use lwm2m_client::{Client, ClientConfig};
use lwm2m_proto::{ObjectType, OmaRegistry, Registry, StaticRegistry};
pub use objects::{ConnectivityStatistics, DeviceInfo, DeviceObject, SecurityAccount, SecurityObject};
use tracing::{info, warn};
pub use udp::{UdpTransport, UdpTransportConfig};

/// Short Server ID assigned to the configured server.
pub const SHORT_SERVER_ID: u16 = 101;

/// Device runtime configuration.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Endpoint name registered with the server.
    pub endpoint: String,
    /// Registration parameters.
    pub client: ClientConfig,
    /// Socket and server addresses.
    pub transport: UdpTransportConfig,
    /// Identity reported by the Device object.
    pub info: DeviceInfo,
    /// Object definitions added to the OMA catalog, for objects the
    /// application enables through [`Device::client`].
    pub definitions: StaticRegistry,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            endpoint: "lwm2m-rs".to_owned(),
            client: ClientConfig { binding: Some("U".to_owned()), ..ClientConfig::default() },
            transport: UdpTransportConfig::default(),
            info: DeviceInfo::default(),
            definitions: StaticRegistry::new(),
        }
    }
}

/// A running LWM2M device.
pub struct Device {
    client: Client<UdpTransport>,
    endpoint: String,
    device: Arc<DeviceObject>,
}

impl Device {
    /// Bind the socket, enable the device objects and start serving.
    pub fn bind(config: DeviceConfig) -> Result<Self, DeviceError> {
        let transport = UdpTransport::bind(&config.transport)?;
        let server = transport.server();
        let registry: Arc<dyn Registry> = Arc::new(OmaRegistry::with_extensions(config.definitions));
        let mut client = Client::new(transport, registry, config.client);

        let security = SecurityObject::with_accounts([SecurityAccount::server(
            format!("coap://{server}"),
            SHORT_SERVER_ID,
        )]);
        let accounts = security.instances();
        client.set_enabler(ObjectType::SECURITY, security)?;
        client.add_object_instances(ObjectType::SECURITY, &accounts)?;
        client.add_object_instance(ObjectType::SERVER, 0)?;

        let device = Arc::new(DeviceObject::new(config.info));
        client.set_shared_enabler(ObjectType::DEVICE, device.clone())?;
        client.add_object_instance(ObjectType::DEVICE, 0)?;

        client.enable_object(ObjectType::CONNECTIVITY_STATISTICS, ConnectivityStatistics)?;
        client.add_object_instance(ObjectType::CONNECTIVITY_STATISTICS, 0)?;

        client.on_execute(|path| info!(%path, "executed"));
        client.on_error(|e| warn!(error = %e, "client error"));
        client.start()?;

        Ok(Self { client, endpoint: config.endpoint, device })
    }

    /// Local socket address.
    pub fn local_addr(&self) -> Result<SocketAddr, DeviceError> {
        self.client.transport().local_addr()
    }

    /// Endpoint name.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// The underlying client.
    pub fn client(&self) -> &Client<UdpTransport> {
        &self.client
    }

    /// Reboots requested by servers so far.
    pub fn reboots(&self) -> u64 {
        self.device.reboots()
    }

    /// Register with the server. Returns the assigned location.
    pub fn register(&mut self) -> Result<String, DeviceError> {
        Ok(self.client.register(&self.endpoint)?)
    }

    /// Refresh the registration.
    pub fn update(&mut self) -> Result<(), DeviceError> {
        Ok(self.client.update()?)
    }

    /// Deregister from the server.
    pub fn deregister(&mut self) -> Result<(), DeviceError> {
        Ok(self.client.deregister()?)
    }

    /// Stop serving inbound requests.
    pub fn shutdown(&mut self) {
        self.client.transport_mut().shutdown();
    }
}
