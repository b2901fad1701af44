//! LWM2M device binary.
//!
//! # Usage
//!
//! ```bash
//! # Register with a local server and refresh until Ctrl-C
//! lwm2m-device --server 127.0.0.1:5683 --endpoint node-1
//!
//! # Shorter lifetime, verbose logs
//! lwm2m-device --server 10.0.0.5:5683 --lifetime 60 --log-level debug
//!
//! # Extend the object catalog from a JSON definitions document
//! lwm2m-device --definitions objects.json
//! ```

use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use clap::Parser;
use lwm2m_client::ClientConfig;
use lwm2m_device::{Device, DeviceConfig, DeviceError, DeviceInfo, UdpTransportConfig};
use lwm2m_proto::StaticRegistry;
use parking_lot::Mutex;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// LWM2M device
#[derive(Parser, Debug)]
#[command(name = "lwm2m-device")]
#[command(about = "LWM2M client device over CoAP/UDP")]
#[command(version)]
struct Args {
    /// Local address to bind to
    #[arg(short, long, default_value = "0.0.0.0:0")]
    bind: SocketAddr,

    /// LWM2M server address
    #[arg(short, long, default_value = "127.0.0.1:5683")]
    server: SocketAddr,

    /// Endpoint name
    #[arg(short, long, default_value = "lwm2m-rs")]
    endpoint: String,

    /// Registration lifetime in seconds
    #[arg(long, default_value = "300")]
    lifetime: u32,

    /// Longest accepted endpoint name, in characters
    #[arg(long, default_value_t = ClientConfig::DEFAULT_MAX_ENDPOINT_NAME_LEN)]
    max_endpoint_len: usize,

    /// Exchange timeout in milliseconds
    #[arg(long, default_value = "5000")]
    timeout_ms: u64,

    /// Serial number reported by the Device object
    #[arg(long)]
    serial: Option<String>,

    /// JSON document with additional object definitions
    #[arg(long)]
    definitions: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn config(&self, definitions: StaticRegistry) -> DeviceConfig {
        let mut info = DeviceInfo::default();
        if let Some(serial) = &self.serial {
            info.serial_number.clone_from(serial);
        }

        DeviceConfig {
            endpoint: self.endpoint.clone(),
            client: ClientConfig {
                max_endpoint_name_len: self.max_endpoint_len,
                lifetime: Some(self.lifetime),
                binding: Some("U".to_owned()),
                ..ClientConfig::default()
            },
            transport: UdpTransportConfig {
                bind: self.bind,
                server: self.server,
                timeout: Duration::from_millis(self.timeout_ms),
            },
            info,
            definitions,
        }
    }
}

/// Run a blocking device operation off the async runtime.
async fn run_blocking<R, F>(device: &Arc<Mutex<Device>>, f: F) -> Result<R, DeviceError>
where
    R: Send + 'static,
    F: FnOnce(&mut Device) -> Result<R, DeviceError> + Send + 'static,
{
    let device = Arc::clone(device);
    tokio::task::spawn_blocking(move || f(&mut *device.lock()))
        .await
        .map_err(|e| DeviceError::Runtime { reason: e.to_string() })?
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("LWM2M device starting");
    tracing::info!("Server at {}", args.server);

    let definitions = match &args.definitions {
        Some(path) => {
            let definitions = StaticRegistry::from_json(&std::fs::read_to_string(path)?)?;
            tracing::info!(path = %path.display(), objects = definitions.len(), "loaded object definitions");
            definitions
        },
        None => StaticRegistry::new(),
    };

    let config = args.config(definitions);
    let device = tokio::task::spawn_blocking(move || Device::bind(config)).await??;
    tracing::info!("Listening on {}", device.local_addr()?);
    let device = Arc::new(Mutex::new(device));

    let location = run_blocking(&device, Device::register).await?;
    tracing::info!(%location, endpoint = %args.endpoint, "registered");

    let period = Duration::from_secs(u64::from(args.lifetime / 2).max(1));
    let mut refresh = tokio::time::interval(period);
    refresh.tick().await;

    loop {
        tokio::select! {
            _ = refresh.tick() => {
                match run_blocking(&device, Device::update).await {
                    Ok(()) => tracing::debug!("registration refreshed"),
                    Err(e) if e.is_fatal() => return Err(e.into()),
                    Err(e) => tracing::warn!(error = %e, "update failed"),
                }
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                break;
            },
        }
    }

    if let Err(e) = run_blocking(&device, Device::deregister).await {
        tracing::warn!(error = %e, "deregister failed");
    }
    device.lock().shutdown();
    tracing::info!(reboots = device.lock().reboots(), "device stopped");

    Ok(())
}
