//! DoIP/UDS ECU simulator entry point.
//!
//! Binds the DoIP TCP listener and serves testers until the process is
//! stopped. Log verbosity follows `RUST_LOG` when set.
//!
//! # Usage
//!
//! ```bash
//! doip-ecu-sim
//! doip-ecu-sim --bind 127.0.0.1:13400 --vin ABC123 -v
//! ```

use std::net::SocketAddr;

use anyhow::{bail, Result};
use clap::Parser;

use doip_ecu_sim::protocol::VehicleIdentity;
use doip_ecu_sim::{DoIpServer, ServerConfig, DOIP_PORT};

#[derive(Parser, Debug)]
#[command(name = "doip-ecu-sim")]
#[command(about = "DoIP/UDS ECU simulator")]
struct Args {
    /// Address the DoIP listener binds to
    #[arg(long, default_value_t = SocketAddr::from(([0, 0, 0, 0], DOIP_PORT)))]
    bind: SocketAddr,

    /// Six-character VIN surrogate advertised in vehicle identification
    #[arg(long, default_value = "123456")]
    vin: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    let vin: [u8; 6] = match args.vin.as_bytes().try_into() {
        Ok(vin) => vin,
        Err(_) => bail!("VIN surrogate must be exactly 6 characters"),
    };
    let config = ServerConfig {
        bind: args.bind,
        identity: VehicleIdentity {
            vin,
            ..VehicleIdentity::default()
        },
    };

    let server = DoIpServer::bind(config).await?;
    server.run().await?;
    Ok(())
}
