// In-process transport: requests are handed straight to the target node's
// dispatcher. Used for tests and single-process simulations.

use crate::error::{NoobcashError, Result};
use crate::network::{handle_request, PeerClient, Request, Response};
use crate::node::Node;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, Weak};

#[derive(Default)]
pub struct LoopbackNetwork {
    nodes: RwLock<HashMap<String, Weak<Node>>>,
}

impl LoopbackNetwork {
    pub fn new() -> Arc<LoopbackNetwork> {
        Arc::new(LoopbackNetwork::default())
    }

    /// Make `node` reachable at its advertised address.
    pub fn attach(&self, node: &Arc<Node>) {
        let mut nodes = self.nodes.write().unwrap_or_else(|e| e.into_inner());
        nodes.insert(node.address(), Arc::downgrade(node));
    }

    /// Make the node at `address` unreachable.
    pub fn detach(&self, address: &str) {
        let mut nodes = self.nodes.write().unwrap_or_else(|e| e.into_inner());
        nodes.remove(address);
    }

    fn lookup(&self, address: &str) -> Option<Arc<Node>> {
        let nodes = self.nodes.read().unwrap_or_else(|e| e.into_inner());
        nodes.get(address).and_then(Weak::upgrade)
    }
}

impl PeerClient for LoopbackNetwork {
    fn send(&self, address: &str, request: &Request) -> Result<Response> {
        let node = self
            .lookup(address)
            .ok_or_else(|| NoobcashError::NetworkUnreachable {
                peer: address.to_string(),
                attempts: 1,
            })?;
        handle_request(&node, request.clone()).into_result()
    }
}
