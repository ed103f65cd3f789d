// framelink-demo: drives a framed transport in either role, or both at once
use clap::{Parser, Subcommand};
use crossbeam::channel::bounded;
use framelink::{init_logging, ConstructionError, Role, TcpAcceptor, TcpTransport, TransportConfig};
use framelink_demo::{run_connector, run_listener, ReceiveOutcome};
use std::process;
use std::thread;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "framelink-demo")]
#[command(about = "Exchange a few framed messages over TCP", long_about = None)]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Remote host for the connecting role (default: FRAMELINK_HOST or 127.0.0.1)
    #[arg(long, global = true)]
    host: Option<String>,

    /// Port to connect to or listen on (default: FRAMELINK_PORT or 42070)
    #[arg(short, long, global = true)]
    port: Option<u16>,

    /// Suppress per-message diagnostics
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Give up on a receive after this many milliseconds
    #[arg(long, value_name = "MS", global = true)]
    read_timeout_ms: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to a listening peer, send first, then receive
    Connect,

    /// Wait for one peer, receive first, then send
    Listen,

    /// Run both roles in this process over loopback
    Loopback,
}

fn config_for(cli: &Cli, role: Role) -> TransportConfig {
    let mut config = TransportConfig::from_env();
    config.role = role;
    if let Some(host) = &cli.host {
        config.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if cli.quiet {
        config.debug = false;
    }
    if let Some(ms) = cli.read_timeout_ms.filter(|ms| *ms > 0) {
        config.read_timeout = Some(Duration::from_millis(ms));
    }
    config
}

fn report(role: Role, outcome: &ReceiveOutcome) {
    if !outcome.sentinel_seen {
        eprintln!("{}: peer closed before sending the sentinel", role);
    }
}

fn run_role(config: &TransportConfig) -> Result<(), Box<dyn std::error::Error>> {
    let mut transport = TcpTransport::open(config)?;
    println!("Socket Type: {}", transport.role());

    let outcome = match config.role {
        Role::Connector => run_connector(&mut transport)?,
        Role::Listener => run_listener(&mut transport)?,
    };
    report(config.role, &outcome);
    Ok(())
}

// Listener on a background thread; its bound port comes back over a channel
fn run_loopback(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let listen_config = TransportConfig {
        port: cli.port.unwrap_or(0),
        ..config_for(cli, Role::Listener)
    };
    let debug = listen_config.debug;
    let (port_tx, port_rx) = bounded::<Result<u16, ConstructionError>>(1);

    let listener = thread::Builder::new()
        .name("framelink-listener".to_string())
        .spawn(move || -> Result<ReceiveOutcome, String> {
            let acceptor = match TcpAcceptor::bind(listen_config.port, debug) {
                Ok(acceptor) => acceptor,
                Err(e) => {
                    let _ = port_tx.send(Err(e));
                    return Err("bind failed".to_string());
                }
            };
            let _ = port_tx.send(Ok(acceptor.port()));
            let mut transport = acceptor.accept().map_err(|e| e.to_string())?;
            transport
                .set_read_timeout(listen_config.read_timeout)
                .map_err(|e| e.to_string())?;
            transport.set_max_frame_len(listen_config.max_frame_len);
            run_listener(&mut transport).map_err(|e| e.to_string())
        })?;

    let port = port_rx.recv()??;
    let connect_config = TransportConfig {
        host: "127.0.0.1".to_string(),
        port,
        ..config_for(cli, Role::Connector)
    };
    let mut transport = TcpTransport::open(&connect_config)?;
    let outcome = run_connector(&mut transport)?;
    report(Role::Connector, &outcome);

    let listened = listener
        .join()
        .map_err(|_| "listener thread panicked")??;
    report(Role::Listener, &listened);
    Ok(())
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    let result = match &cli.command {
        Commands::Connect => run_role(&config_for(&cli, Role::Connector)),
        Commands::Listen => run_role(&config_for(&cli, Role::Listener)),
        Commands::Loopback => run_loopback(&cli),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
