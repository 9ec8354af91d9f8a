//! Load driver: replays per-node transaction files against a running ring,
//! one thread per node, through `create_new_transaction`.

use crate::core::NodeId;
use crate::error::{NoobcashError, Result};
use crate::network::{PeerClient, Request};
use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;

/// A node to drive and the file holding its transfers.
#[derive(Debug, Clone)]
pub struct ReplayTarget {
    pub address: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub sent: usize,
    pub failed: usize,
}

impl ReplaySummary {
    fn merge(self, other: ReplaySummary) -> ReplaySummary {
        ReplaySummary {
            sent: self.sent + other.sent,
            failed: self.failed + other.failed,
        }
    }
}

/// `transactions{i}.txt` in `dir` for node `i` at `host:base_port + i`.
pub fn targets_in_dir(
    dir: &Path,
    nodes: usize,
    host: &str,
    base_port: u16,
) -> Result<Vec<ReplayTarget>> {
    (0..nodes)
        .map(|i| {
            let port = u16::try_from(i)
                .ok()
                .and_then(|offset| base_port.checked_add(offset))
                .ok_or_else(|| NoobcashError::Config(format!("No port for node {i}")))?;
            Ok(ReplayTarget {
                address: format!("{host}:{port}"),
                path: dir.join(format!("transactions{i}.txt")),
            })
        })
        .collect()
}

/// Parse one `id<k> <amount>` line.
pub fn parse_line(line: &str) -> Result<(NodeId, u64)> {
    let bad = || NoobcashError::Config(format!("Malformed transaction line: {line:?}"));
    let mut fields = line.split_whitespace();
    let receiver = fields
        .next()
        .and_then(|field| field.strip_prefix("id"))
        .and_then(|id| id.parse::<NodeId>().ok())
        .ok_or_else(bad)?;
    let amount = fields
        .next()
        .and_then(|amount| amount.parse::<u64>().ok())
        .ok_or_else(bad)?;
    if fields.next().is_some() {
        return Err(bad());
    }
    Ok((receiver, amount))
}

pub fn load_transactions(path: &Path) -> Result<Vec<(NodeId, u64)>> {
    let text = fs::read_to_string(path)
        .map_err(|e| NoobcashError::Io(format!("{}: {e}", path.display())))?;
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(parse_line)
        .collect()
}

/// Send every target its transfers, all targets concurrently.
///
/// Files are parsed up front so a malformed file aborts before anything is
/// sent. Rejected transfers are counted and logged, not fatal.
pub fn replay(
    client: &dyn PeerClient,
    targets: &[ReplayTarget],
    limit: Option<usize>,
) -> Result<ReplaySummary> {
    let plans = targets
        .iter()
        .map(|target| {
            let mut transfers = load_transactions(&target.path)?;
            if let Some(limit) = limit {
                transfers.truncate(limit);
            }
            Ok((target.address.as_str(), transfers))
        })
        .collect::<Result<Vec<_>>>()?;

    let summary = thread::scope(|scope| {
        let handles: Vec<_> = plans
            .iter()
            .map(|(address, transfers)| scope.spawn(move || drive(client, address, transfers)))
            .collect();
        handles
            .into_iter()
            .map(|handle| {
                handle.join().unwrap_or_else(|_| {
                    warn!("Replay worker panicked");
                    ReplaySummary::default()
                })
            })
            .fold(ReplaySummary::default(), ReplaySummary::merge)
    });
    info!(
        "Replay finished: {} sent, {} rejected",
        summary.sent, summary.failed
    );
    Ok(summary)
}

fn drive(client: &dyn PeerClient, address: &str, transfers: &[(NodeId, u64)]) -> ReplaySummary {
    let mut summary = ReplaySummary::default();
    for &(receiver_id, amount) in transfers {
        let request = Request::CreateNewTransaction {
            receiver_id,
            amount,
        };
        match client.send(address, &request) {
            Ok(_) => summary.sent += 1,
            Err(e) => {
                warn!("{address}: {amount} coins to node {receiver_id} failed: {e}");
                summary.failed += 1;
            }
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::Response;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingClient {
        seen: Mutex<Vec<(String, NodeId, u64)>>,
    }

    impl PeerClient for RecordingClient {
        fn send(&self, address: &str, request: &Request) -> Result<Response> {
            match request {
                Request::CreateNewTransaction {
                    receiver_id,
                    amount,
                } => {
                    self.seen
                        .lock()
                        .unwrap()
                        .push((address.to_string(), *receiver_id, *amount));
                    if *amount > 100 {
                        Err(NoobcashError::InsufficientFunds {
                            required: *amount,
                            available: 100,
                        })
                    } else {
                        Ok(Response::Ok)
                    }
                }
                other => panic!("unexpected request {other:?}"),
            }
        }
    }

    #[test]
    fn test_parse_line() {
        assert_eq!(parse_line("id3 40").unwrap(), (3, 40));
        assert_eq!(parse_line("id12  7\r").unwrap(), (12, 7));
        assert!(parse_line("3 40").is_err());
        assert!(parse_line("id3").is_err());
        assert!(parse_line("id3 -4").is_err());
        assert!(parse_line("id3 4 5").is_err());
    }

    #[test]
    fn test_targets_follow_node_numbering() {
        let targets = targets_in_dir(Path::new("runs"), 2, "10.0.0.5", 5000).unwrap();
        assert_eq!(targets[1].address, "10.0.0.5:5001");
        assert_eq!(targets[1].path, Path::new("runs").join("transactions1.txt"));
        assert!(targets_in_dir(Path::new("runs"), 3, "h", u16::MAX).is_err());
    }

    #[test]
    fn test_replay_sends_every_file_to_its_node() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("transactions0.txt"), "id1 10\nid1 20\n\nid1 500\n").unwrap();
        fs::write(dir.path().join("transactions1.txt"), "id0 5\n").unwrap();
        let targets = targets_in_dir(dir.path(), 2, "127.0.0.1", 5000).unwrap();

        let client = RecordingClient::default();
        let summary = replay(&client, &targets, None).unwrap();
        assert_eq!(summary, ReplaySummary { sent: 3, failed: 1 });

        let mut seen = client.seen.lock().unwrap().clone();
        seen.sort();
        assert_eq!(
            seen,
            vec![
                ("127.0.0.1:5000".to_string(), 1, 10),
                ("127.0.0.1:5000".to_string(), 1, 20),
                ("127.0.0.1:5000".to_string(), 1, 500),
                ("127.0.0.1:5001".to_string(), 0, 5),
            ]
        );
    }

    #[test]
    fn test_replay_honours_limit_and_rejects_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("transactions0.txt"), "id1 1\nid1 2\nid1 3\n").unwrap();
        let targets = targets_in_dir(dir.path(), 1, "127.0.0.1", 5000).unwrap();

        let client = RecordingClient::default();
        let summary = replay(&client, &targets, Some(2)).unwrap();
        assert_eq!(summary.sent, 2);

        fs::write(dir.path().join("transactions0.txt"), "id1 1\ngarbage\n").unwrap();
        assert!(replay(&client, &targets, None).is_err());
        let missing = targets_in_dir(dir.path(), 2, "127.0.0.1", 5000).unwrap();
        assert!(matches!(
            replay(&client, &missing, None),
            Err(NoobcashError::Io(_))
        ));
        assert_eq!(client.seen.lock().unwrap().len(), 2);
    }
}
