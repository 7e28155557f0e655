// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # sensord - Sensor Daemon
//!
//! Multiplexes physical and virtual sensors into per-client event streams
//! over two Unix domain sockets: a request/response command channel and a
//! one-way event channel per client.
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! sensord = "0.3"
//! ```
//!
//! ## Crates
//!
//! - **`hub`**: sensor registry, dispatcher, client sessions, fusion
//! - **`protocol`**: command packets, event records, handshake
//! - **`config`**: `sensord.toml` loader and validation
//! - **`observability`**: logging initialization and per-crate debug flags
//!
//! ## Embedding the Hub
//!
//! ```rust,no_run
//! use sensord::prelude::*;
//!
//! let config = sensord::config::load_config(None, None)?;
//! let hub = SensorHub::from_config(&config);
//! hub.load_plugins(&BuiltinPluginLoader::new(&config));
//! hub.start()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Talking to a Running Daemon
//!
//! ```rust,no_run
//! use sensord::prelude::*;
//! use std::os::unix::net::UnixStream;
//!
//! let mut stream = UnixStream::connect(DEFAULT_COMMAND_SOCKET_PATH)?;
//! write_packet(&mut stream, &Command::GetId { pid: 1 }.to_packet())?;
//! let answer = Response::from_packet(&read_packet(&mut stream, 64 * 1024)?)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

/// Version of the umbrella crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use sensord_config as config;
pub use sensord_hub as hub;
pub use sensord_observability as observability;
pub use sensord_protocol as protocol;

/// Prelude - commonly used types and traits
pub mod prelude {
    pub use sensord_config::{load_config, validate_config, SensordConfig};
    pub use sensord_hub::{
        BuiltinPluginLoader, HubConfig, HubError, LoadReport, PluginContext, PluginLoader,
        SensorHub, SimulatedHal,
    };
    pub use sensord_protocol::{
        read_packet, write_packet, Command, EventChannelReady, EventType, Permission, Response,
        SensorData, SensorDescriptor, SensorEvent, SensorId, SensorType,
        DEFAULT_COMMAND_SOCKET_PATH, DEFAULT_EVENT_SOCKET_PATH,
    };
}

#[cfg(test)]
mod tests {
    use super::prelude::*;

    #[test]
    fn test_facade_imports() {
        let id = SensorId::new(SensorType::Accelerometer, 0);
        assert_eq!(id.sensor_type(), Some(SensorType::Accelerometer));
        assert_eq!(crate::hub::HubConfig::default().default_interval_ms, 1000);
    }
}
