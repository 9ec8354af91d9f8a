//! Peer-to-peer communication
//!
//! Request/response messages, the `PeerClient` transport seam with its TCP
//! and in-process implementations, the TCP server and broadcast fan-out.

pub mod broadcast;
pub mod client;
pub mod loopback;
pub mod message;
pub mod server;

pub use broadcast::{fan_out, spawn_fan_out};
pub use client::{with_retry, PeerClient, TcpPeerClient};
pub use loopback::LoopbackNetwork;
pub use message::{unexpected, Request, Response};
pub use server::{handle_request, Server};
