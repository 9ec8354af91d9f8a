use crate::core::NodeId;
use crate::error::Result;
use crate::network::{PeerClient, Request, Response};
use crate::storage::RingEntry;
use log::warn;
use std::sync::Arc;
use std::thread;

/// Send `request` to every target concurrently and wait for all of them.
///
/// One scoped worker per target; the ring size bounds the fan-out.
pub fn fan_out(
    client: &dyn PeerClient,
    request: &Request,
    targets: &[RingEntry],
) -> Vec<(NodeId, Result<Response>)> {
    thread::scope(|scope| {
        let handles: Vec<_> = targets
            .iter()
            .map(|target| {
                let address = target.address();
                (
                    target.id,
                    scope.spawn(move || client.send(&address, request)),
                )
            })
            .collect();

        handles
            .into_iter()
            .map(|(id, handle)| {
                let result = handle.join().unwrap_or_else(|_| {
                    Err(crate::error::NoobcashError::Network(format!(
                        "Broadcast worker for node {id} panicked"
                    )))
                });
                (id, result)
            })
            .collect()
    })
}

/// Fire-and-forget broadcast. A supervising thread runs the fan-out and logs
/// the peers that could not be reached.
pub fn spawn_fan_out(client: Arc<dyn PeerClient>, request: Request, targets: Vec<RingEntry>) {
    if targets.is_empty() {
        return;
    }
    thread::spawn(move || {
        for (id, result) in fan_out(client.as_ref(), &request, &targets) {
            if let Err(e) = result {
                warn!("Broadcast of {} to node {id} failed: {e}", request.name());
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NoobcashError;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingClient {
        seen: Mutex<Vec<String>>,
    }

    impl PeerClient for RecordingClient {
        fn send(&self, address: &str, _request: &Request) -> Result<Response> {
            self.seen.lock().unwrap().push(address.to_string());
            if address.ends_with(":2") {
                Err(NoobcashError::Network("down".to_string()))
            } else {
                Ok(Response::Ok)
            }
        }
    }

    #[test]
    fn test_fan_out_reaches_every_target() {
        let client = RecordingClient::default();
        let targets: Vec<RingEntry> = (1..=3)
            .map(|id| RingEntry::new(id, "peer", id as u16, "key"))
            .collect();

        let results = fan_out(&client, &Request::SendChainAndId, &targets);
        assert_eq!(results.len(), 3);
        assert!(results.iter().filter(|(_, r)| r.is_err()).count() == 1);
        assert!(matches!(results.iter().find(|(id, _)| *id == 2), Some((_, Err(_)))));

        let mut seen = client.seen.lock().unwrap().clone();
        seen.sort();
        assert_eq!(seen, vec!["peer:1", "peer:2", "peer:3"]);
    }
}
