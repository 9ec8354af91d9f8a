use crate::config::Settings;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "noobcash")]
pub struct Opt {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(name = "start", about = "Run a node and serve peer and client requests")]
    Start {
        #[arg(long = "config", help = "TOML settings file")]
        config: Option<PathBuf>,
        #[arg(long = "listen", help = "Address to listen on, e.g. 127.0.0.1:5000")]
        listen: Option<String>,
        #[arg(long = "bootstrap-addr", help = "Address of the bootstrap node")]
        bootstrap_address: Option<String>,
        #[arg(long = "bootstrap", help = "Run as the bootstrap node")]
        bootstrap: bool,
        #[arg(short = 'd', long = "difficulty", help = "Leading zeros required in a block hash")]
        difficulty: Option<usize>,
        #[arg(short = 'c', long = "capacity", help = "Transactions per block")]
        capacity: Option<usize>,
        #[arg(short = 'n', long = "nodes", help = "Expected number of nodes, bootstrap included")]
        nodes: Option<usize>,
    },
    #[command(name = "send", about = "Ask a node to send coins to another ring member")]
    Send {
        #[arg(long = "node", help = "Address of the node to send from")]
        node: String,
        #[arg(help = "Ring id of the receiver")]
        receiver_id: usize,
        #[arg(help = "Amount of coins to send")]
        amount: u64,
    },
    #[command(name = "view", about = "Print the transactions of a node's last block")]
    View {
        #[arg(long = "node", help = "Address of the node to query")]
        node: String,
    },
    #[command(name = "balance", about = "Print a node's balance and its view of the ring")]
    Balance {
        #[arg(long = "node", help = "Address of the node to query")]
        node: String,
    },
    #[command(
        name = "replay",
        about = "Replay transactions{i}.txt files against a running ring, one thread per node"
    )]
    Replay {
        #[arg(short = 'n', long = "nodes", help = "Number of nodes to drive")]
        nodes: usize,
        #[arg(long = "dir", help = "Directory holding transactions0.txt, transactions1.txt, ...")]
        dir: PathBuf,
        #[arg(long = "host", default_value = "127.0.0.1", help = "Host all nodes listen on")]
        host: String,
        #[arg(long = "base-port", default_value_t = 5000, help = "Port of node 0; node i listens on base + i")]
        base_port: u16,
        #[arg(long = "limit", help = "Send at most this many transactions per node")]
        limit: Option<usize>,
    },
}

/// Start-command flags that override loaded settings.
#[derive(Debug, Clone, Default)]
pub struct StartOverrides {
    pub listen: Option<String>,
    pub bootstrap_address: Option<String>,
    pub bootstrap: bool,
    pub difficulty: Option<usize>,
    pub capacity: Option<usize>,
    pub nodes: Option<usize>,
}

impl StartOverrides {
    pub fn apply(self, settings: &mut Settings) {
        if let Some(listen) = self.listen {
            settings.listen = listen;
        }
        if let Some(address) = self.bootstrap_address {
            settings.bootstrap_address = address;
        }
        if self.bootstrap {
            settings.is_bootstrap = true;
        }
        if let Some(difficulty) = self.difficulty {
            settings.node.difficulty = difficulty;
        }
        if let Some(capacity) = self.capacity {
            settings.node.capacity = capacity;
        }
        if let Some(nodes) = self.nodes {
            settings.node.nodes = nodes;
        }
    }
}
