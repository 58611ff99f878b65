//! Message Bus Adapter: a uniform publish/subscribe interface over a small
//! in-house broker (`mob-broker`), since no MQTT-equivalent crate is part of
//! this workspace's dependency stack. Topics are plain strings;
//! subscriptions may use a single-level `+` wildcard; payloads are JSON
//! values.

pub mod broker;
pub mod client;
pub mod envelope;

pub use broker::Broker;
pub use client::BusClient;
pub use envelope::{topic_matches, ClientFrame, Envelope};
