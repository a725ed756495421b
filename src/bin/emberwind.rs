use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{error, info, LevelFilter};
use simple_logger::SimpleLogger;

use emberwind::config::RunParameters;
use emberwind::driver::Simulation;
use emberwind::message::channel::ChannelCommunicator;
use emberwind::message::comm::Communicator;
use emberwind::message::tcp::TcpCommunicator;

/// Radiation-hydrodynamics of ionised nebulae on a distributed Cartesian
/// grid.
#[derive(Debug, Parser)]
#[command(version)]
struct Opts {
    /// TOML parameter file; defaults are used when omitted.
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Rank of this process within the communicator.
    #[arg(long, default_value = "0")]
    rank: usize,

    /// Listen addresses of every rank, in rank order. One process per
    /// address; a single-rank run needs no peers.
    #[arg(long, value_delimiter = ',')]
    peers: Vec<SocketAddr>,

    #[arg(long, default_value = "info")]
    log_level: LevelFilter,
}

fn main() -> ExitCode {
    let opts = Opts::parse();
    init_logging(opts.log_level);
    info!("{:?}", opts);

    let params = match &opts.config {
        Some(path) => {
            let text = match std::fs::read_to_string(path) {
                Ok(text) => text,
                Err(e) => {
                    error!("could not read {}: {}", path.display(), e);
                    return ExitCode::FAILURE;
                }
            };
            match RunParameters::from_toml(&text) {
                Ok(params) => params,
                Err(e) => {
                    error!("could not parse {}: {}", path.display(), e);
                    return ExitCode::FAILURE;
                }
            }
        }
        None => RunParameters::default(),
    };

    let client: Box<dyn Communicator> = if opts.peers.len() > 1 {
        if opts.rank >= opts.peers.len() {
            error!("rank {} is not among the {} peers", opts.rank, opts.peers.len());
            return ExitCode::FAILURE;
        }
        Box::new(TcpCommunicator::new(opts.rank, opts.peers))
    } else {
        Box::new(ChannelCommunicator::bus(1).pop().unwrap())
    };

    let mut simulation = match Simulation::new(&params, client) {
        Ok(simulation) => simulation,
        Err(e) => {
            error!("initialisation failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match simulation.run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(level: LevelFilter) {
    SimpleLogger::new().with_level(level).init().unwrap();
}
