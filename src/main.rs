use clap::Parser;
use log::{error, info, LevelFilter};
use noobcash::cli;
use noobcash::network::unexpected;
use noobcash::{
    Command, Node, Opt, PeerClient, Request, Response, RetryPolicy, Server, Settings,
    StartOverrides, TcpPeerClient,
};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

fn main() {
    // RUST_LOG still overrides the default level
    env_logger::builder()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    let opt = Opt::parse();
    if let Err(e) = run_command(opt.command) {
        error!("Error: {e}");
        process::exit(1);
    }
}

fn run_command(command: Command) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Start {
            config,
            listen,
            bootstrap_address,
            bootstrap,
            difficulty,
            capacity,
            nodes,
        } => {
            let overrides = StartOverrides {
                listen,
                bootstrap_address,
                bootstrap,
                difficulty,
                capacity,
                nodes,
            };
            start_node(config, overrides)?;
        }
        Command::Send {
            node,
            receiver_id,
            amount,
        } => {
            let request = Request::CreateNewTransaction {
                receiver_id,
                amount,
            };
            call(&node, &request)?;
            println!("Sent {amount} coins to node {receiver_id}");
        }
        Command::View { node } => {
            let request = Request::ViewLastBlockTransactions;
            match call(&node, &request)? {
                Response::Transactions { transactions } => {
                    println!("{} transactions in the last block", transactions.len());
                    for tx in transactions {
                        println!(
                            "{}  {} -> {}  {}",
                            tx.get_id(),
                            short_key(tx.get_sender_address()),
                            short_key(tx.get_receiver_address()),
                            tx.get_amount()
                        );
                    }
                }
                other => return Err(unexpected(request.name(), &other).into()),
            }
        }
        Command::Balance { node } => {
            let request = Request::GetBalance;
            match call(&node, &request)? {
                Response::Balance { balance, ring } => {
                    println!("Wallet balance: {balance}");
                    for entry in ring.entries() {
                        println!(
                            "  node {} at {}  {}  balance {}",
                            entry.id,
                            entry.address(),
                            short_key(&entry.public_key),
                            entry.balance
                        );
                    }
                }
                other => return Err(unexpected(request.name(), &other).into()),
            }
        }
        Command::Replay {
            nodes,
            dir,
            host,
            base_port,
            limit,
        } => {
            let targets = cli::targets_in_dir(&dir, nodes, &host, base_port)?;
            let client = TcpPeerClient::new(RetryPolicy::default());
            let summary = cli::replay(&client, &targets, limit)?;
            println!(
                "Replayed {} transactions, {} rejected",
                summary.sent, summary.failed
            );
        }
    }
    Ok(())
}

fn start_node(
    config: Option<PathBuf>,
    overrides: StartOverrides,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut settings = Settings::load(config.as_deref())?;
    overrides.apply(&mut settings);
    settings.validate()?;

    let (ip, port) = settings.listen_parts()?;
    let peers: Arc<dyn PeerClient> = Arc::new(TcpPeerClient::new(settings.retry));
    let node = if settings.is_bootstrap {
        Node::bootstrap(settings.node, &ip, port, peers)?
    } else {
        Node::new(settings.node, &ip, port, peers)?
    };

    let server = Server::bind(Arc::clone(&node), &settings.listen, settings.max_connections)?;
    node.start();
    if !settings.is_bootstrap {
        let id = node.join(&settings.bootstrap_address)?;
        info!("Joined ring through {} as node {id}", settings.bootstrap_address);
    }
    server.run()?;
    node.stop();
    Ok(())
}

fn call(address: &str, request: &Request) -> Result<Response, Box<dyn std::error::Error>> {
    let client = TcpPeerClient::new(RetryPolicy::default());
    Ok(client.send(address, request)?)
}

fn short_key(key: &str) -> &str {
    key.get(key.len().saturating_sub(12)..).unwrap_or(key)
}
