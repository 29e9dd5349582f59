//! # mqthing-app
//!
//! Application layer — use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `BrokerConnector` / `BrokerClient` — connect, publish, subscribe
//!   - `NetworkIdentity` — stable hardware address of this host
//!   - `SensorSource` — discovers devices and refreshes their values
//! - Define the **topic layout** under `things/<id>`
//! - Provide the `ThingAdapter` service that publishes descriptions, property
//!   changes and events, and routes inbound action and write requests
//!
//! ## Dependency rule
//! Depends on `mqthing-domain` only (plus `tokio` for channels and timers).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod ports;
pub mod services;
pub mod topics;
