use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{TimeDelta, Utc};
use clap::{Parser, Subcommand};
use ipnet::IpNet;
use tracing::info;
use tracing_subscriber::EnvFilter;

use leasehold::{
    ClientId, Error, Lease, LeaseStore, PluginHandle, Result, StoreConfig, TransientStore,
};

#[derive(Parser)]
#[command(name = "leasehold")]
#[command(author, version, about = "Transactional in-memory DHCP lease storage", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Hammer one store with concurrent lookup/update transactions.
    Soak {
        /// Number of concurrent workers.
        #[arg(long, default_value_t = 8)]
        workers: usize,

        /// Transactions committed per worker.
        #[arg(long, default_value_t = 200)]
        rounds: usize,

        /// Distinct clients shared by the workers.
        #[arg(long, default_value_t = 3)]
        clients: u8,
    },
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .init();

    let config = StoreConfig::load_or_create(&cli.config).await?;

    match cli.command.unwrap_or(Commands::Soak {
        workers: 8,
        rounds: 200,
        clients: 3,
    }) {
        Commands::Soak {
            workers,
            rounds,
            clients,
        } => run_soak(config, workers, rounds, clients).await,
        Commands::ShowConfig => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

/// Drives the store the way the server's handler chain would: each worker
/// runs lookup/update cycles against a shared set of clients, restarting the
/// transaction whenever it loses a race.
async fn run_soak(config: StoreConfig, workers: usize, rounds: usize, clients: u8) -> Result<()> {
    info!(workers, rounds, clients, "starting soak");
    let store = TransientStore::new(&config);
    let owner = PluginHandle::new("soak");

    let mut handles = Vec::new();
    for worker in 0..workers {
        let store = Arc::clone(&store);
        let owner = owner.clone();
        handles.push(tokio::spawn(async move {
            let mut commits = 0usize;
            let mut restarts = 0usize;

            for round in 0..rounds {
                let client = ((worker + round) % clients.max(1) as usize) as u8;
                let cid = ClientId::from_hw_addr(&[0x02, 0x00, 0x00, 0x00, 0x00, client]);
                let element = IpNet::from(IpAddr::V4(Ipv4Addr::new(
                    10,
                    client,
                    (round / 250) as u8,
                    (round % 250) as u8,
                )));

                loop {
                    let (mut leases, mut token) = store.lookup(&cid).await?;
                    let mut lease =
                        Lease::new(vec![element], Utc::now() + TimeDelta::seconds(30));
                    lease.owner = Some(owner.clone());
                    leases.push(lease);

                    match store.update(&cid, leases, &mut token).await {
                        Ok(()) => {
                            commits += 1;
                            break;
                        }
                        Err(error) if error.is_token_error() => restarts += 1,
                        Err(error) => return Err(error),
                    }
                }
            }

            Ok::<_, Error>((commits, restarts))
        }));
    }

    let mut total_commits = 0;
    let mut total_restarts = 0;
    for handle in handles {
        let (commits, restarts) = handle.await??;
        total_commits += commits;
        total_restarts += restarts;
    }

    info!(total_commits, total_restarts, "soak finished");

    let (cleaned, deferred) = store.expire(usize::MAX).await;
    deferred.await?;
    info!(cleaned, "final expire sweep");

    let dump = store.dump().await;
    println!("{:<24} {:<8} {:<24}", "Client ID", "Leases", "Next Expiry");
    println!("{}", "-".repeat(58));
    for (cid, leases) in &dump {
        let next_expiry = leases
            .iter()
            .map(|lease| lease.expire)
            .min()
            .map(|expire| expire.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("{:<24} {:<8} {:<24}", cid.to_string(), leases.len(), next_expiry);
    }

    Ok(())
}
