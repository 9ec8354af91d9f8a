use crate::error::{NoobcashError, Result};
use crate::network::{Request, Response};
use crate::node::Node;
use log::{debug, error, info, warn};
use std::io::{BufReader, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Route one request into the node and build its response.
pub fn handle_request(node: &Arc<Node>, request: Request) -> Response {
    match request {
        Request::RegisterNode {
            public_key,
            ip,
            port,
        } => node
            .register_node(&public_key, &ip, port)
            .map(|id| Response::NodeId { id })
            .into(),
        Request::ReceiveRingAndChain { ring, chain } => node
            .receive_ring_and_chain(ring, chain)
            .map(|_| Response::Ok)
            .into(),
        Request::RegisterTransaction { transaction } => node
            .register_transaction(transaction)
            .map(|_| Response::Ok)
            .into(),
        Request::RegisterBlock { block } => {
            // resolution failures stay local; the sender always gets Ok
            if let Err(e) = node.register_block(block) {
                warn!("Block admission ended with: {e}");
            }
            Response::Ok
        }
        Request::SendChainAndId => node
            .send_chain_and_id()
            .map(|(chain, id)| Response::ChainAndId { chain, id })
            .into(),
        Request::SendRingAndPendingTransactions => {
            let (ring, pending) = node.send_ring_and_pending_transactions();
            Response::RingAndPending { ring, pending }
        }
        Request::CreateNewTransaction {
            receiver_id,
            amount,
        } => node
            .create_transaction(receiver_id, amount)
            .map(|_| Response::Ok)
            .into(),
        Request::ViewLastBlockTransactions => Response::Transactions {
            transactions: node.view_last_block_transactions(),
        },
        Request::GetBalance => {
            let (balance, ring) = node.get_balance();
            Response::Balance { balance, ring }
        }
    }
}

/// JSON-over-TCP front end of a node
pub struct Server {
    node: Arc<Node>,
    listener: TcpListener,
    max_connections: usize,
    active: Arc<AtomicUsize>,
}

impl Server {
    pub fn bind(node: Arc<Node>, addr: &str, max_connections: usize) -> Result<Server> {
        let listener = TcpListener::bind(addr)
            .map_err(|e| NoobcashError::Network(format!("Failed to bind to {addr}: {e}")))?;
        Ok(Server {
            node,
            listener,
            max_connections,
            active: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections forever, one handler thread each.
    pub fn run(&self) -> Result<()> {
        info!("Server listening on {}", self.local_addr()?);

        for stream in self.listener.incoming() {
            let stream = match stream {
                Ok(stream) => stream,
                Err(e) => {
                    error!("Error accepting connection: {e}");
                    continue;
                }
            };

            if self.active.fetch_add(1, Ordering::SeqCst) >= self.max_connections {
                self.active.fetch_sub(1, Ordering::SeqCst);
                warn!("Rejecting connection: limit of {} reached", self.max_connections);
                thread::spawn(move || {
                    let busy = Response::Failure {
                        error: NoobcashError::Busy,
                    };
                    let _ = Self::write_response(&stream, &busy);
                });
                continue;
            }

            let node = Arc::clone(&self.node);
            let active = Arc::clone(&self.active);
            thread::spawn(move || {
                if let Err(e) = Self::handle_connection(&node, &stream) {
                    error!("Error handling connection: {e}");
                }
                active.fetch_sub(1, Ordering::SeqCst);
            });
        }

        Ok(())
    }

    fn handle_connection(node: &Arc<Node>, stream: &TcpStream) -> Result<()> {
        stream
            .set_read_timeout(Some(READ_TIMEOUT))
            .map_err(|e| NoobcashError::Network(format!("Failed to set read timeout: {e}")))?;

        let request: Request = match serde_json::from_reader(BufReader::new(stream)) {
            Ok(request) => request,
            Err(e) => {
                let error = NoobcashError::Serialization(format!("Bad request: {e}"));
                Self::write_response(stream, &Response::Failure { error })?;
                return Ok(());
            }
        };
        let peer = stream
            .peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        debug!("Received {} from {peer}", request.name());

        let response = handle_request(node, request);
        Self::write_response(stream, &response)
    }

    fn write_response(mut stream: &TcpStream, response: &Response) -> Result<()> {
        serde_json::to_writer(stream, response)
            .map_err(|e| NoobcashError::Network(format!("Failed to send response: {e}")))?;
        stream.flush()?;
        let _ = stream.shutdown(Shutdown::Both);
        Ok(())
    }
}
