// Outbound calls to peers. The TCP client speaks one JSON request and one
// JSON response per connection and retries transient failures with
// exponential backoff.

use crate::config::RetryPolicy;
use crate::error::{NoobcashError, Result};
use crate::network::{Request, Response};
use log::{debug, warn};
use rand::Rng;
use std::io::BufReader;
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::thread;
use std::time::Duration;

/// Transport used by a node to reach its peers.
pub trait PeerClient: Send + Sync {
    /// Deliver `request` to the node at `address`.
    ///
    /// A `Response::Failure` from the peer is returned as `Err`.
    fn send(&self, address: &str, request: &Request) -> Result<Response>;
}

/// Run `attempt` until it succeeds, fails permanently, or the policy's retry
/// ceiling is reached, in which case the peer is reported unreachable.
pub fn with_retry<F>(policy: &RetryPolicy, address: &str, mut attempt: F) -> Result<Response>
where
    F: FnMut() -> Result<Response>,
{
    let mut retry = 0;
    loop {
        match attempt() {
            Ok(response) => return Ok(response),
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) => {
                if retry >= policy.max_retries {
                    warn!("Giving up on {address} after {} attempts: {e}", retry + 1);
                    return Err(NoobcashError::NetworkUnreachable {
                        peer: address.to_string(),
                        attempts: retry + 1,
                    });
                }
                let delay = jittered(policy.delay(retry));
                debug!("Retrying {address} in {delay:?}: {e}");
                thread::sleep(delay);
                retry += 1;
            }
        }
    }
}

fn jittered(delay: Duration) -> Duration {
    let millis = delay.as_millis() as u64;
    if millis == 0 {
        return delay;
    }
    let jitter = rand::thread_rng().gen_range(0..=millis / 4);
    Duration::from_millis(millis + jitter)
}

#[derive(Debug, Clone, Default)]
pub struct TcpPeerClient {
    policy: RetryPolicy,
}

impl TcpPeerClient {
    pub fn new(policy: RetryPolicy) -> TcpPeerClient {
        TcpPeerClient { policy }
    }

    fn resolve(address: &str) -> Result<SocketAddr> {
        address
            .to_socket_addrs()
            .map_err(|e| NoobcashError::Config(format!("Invalid address {address}: {e}")))?
            .next()
            .ok_or_else(|| NoobcashError::Config(format!("Address {address} did not resolve")))
    }

    fn send_once(&self, addr: SocketAddr, request: &Request) -> Result<Response> {
        let timeout = self.policy.timeout();
        let stream = TcpStream::connect_timeout(&addr, timeout)
            .map_err(|e| NoobcashError::Network(format!("Failed to connect to {addr}: {e}")))?;
        stream
            .set_write_timeout(Some(timeout))
            .and_then(|_| stream.set_read_timeout(Some(timeout)))
            .map_err(|e| NoobcashError::Network(format!("Failed to set timeout: {e}")))?;

        serde_json::to_writer(&stream, request)
            .map_err(|e| NoobcashError::Network(format!("Failed to send data: {e}")))?;

        // past this point the peer may already be acting on the request
        stream
            .shutdown(Shutdown::Write)
            .map_err(|e| NoobcashError::ResponseLost(format!("Failed to finish request: {e}")))?;
        let response: Response = serde_json::from_reader(BufReader::new(&stream))
            .map_err(|e| NoobcashError::ResponseLost(format!("Failed to read response: {e}")))?;
        response.into_result()
    }
}

impl PeerClient for TcpPeerClient {
    fn send(&self, address: &str, request: &Request) -> Result<Response> {
        let addr = Self::resolve(address)?;
        debug!("Sending {} to {address}", request.name());
        with_retry(&self.policy, address, || self.send_once(addr, request))
    }
}
