mod config;

use clap::Parser;
use faucetplay_core::api::ReqwestTransport;
use faucetplay_core::log;
use faucetplay_core::logger;
use faucetplay_core::session::{FaucetSession, SessionHandle};
use faucetplay_core::unlock::NoopDriver;

#[derive(Parser)]
#[command(name = "faucetplay")]
struct Args {
    #[arg(long, default_value = "faucetplay_config.yaml")]
    config: String,
    #[arg(long)]
    use_log_prefix: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let prefix = if args.use_log_prefix {
        Some("FaucetPlay".to_string())
    } else {
        None
    };
    logger::init_logger(prefix);

    let manager = config::get_config_manager(&args.config);
    let app_config = manager.get_config().map_err(std::io::Error::other)?;

    if app_config.accounts.is_empty() {
        log!("No accounts configured in {}; nothing to run", args.config);
        return Ok(());
    }

    let mut workers: Vec<(SessionHandle, tokio::task::JoinHandle<()>)> = Vec::new();

    for account in app_config.accounts {
        let label = account.label.clone();
        let transport = ReqwestTransport::new(&account.identity, account.proxy_url.as_deref())
            .map_err(std::io::Error::other)?;

        let (session, mut handle) =
            FaucetSession::new(account, transport, NoopDriver).map_err(std::io::Error::other)?;

        if let Some(mut log_receiver) = handle.take_log_receiver() {
            let drain_label = label.clone();
            tokio::spawn(async move {
                while let Some(entry) = log_receiver.recv().await {
                    log!("[{}] {}", drain_label, entry.message);
                }
            });
        }

        log!("Starting session for account {}", label);
        let join = session.spawn();
        workers.push((handle, join));
    }

    tokio::signal::ctrl_c().await?;
    log!("Shutdown signal received, stopping sessions...");

    for (handle, _) in &workers {
        handle.stop();
    }
    for (handle, join) in workers {
        let _ = join.await;
        log!(
            "Session {} finished in state {}",
            handle.label(),
            handle.state()
        );
    }

    log!("All sessions stopped");
    Ok(())
}
