use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use resource_broker::api::order_dto::OrdersFileDto;
use resource_broker::domain::broker::OrderBroker;
use resource_broker::domain::federation::remote_facade::RemoteFacade;
use resource_broker::domain::federation::server::FederationServer;
use resource_broker::loader::parser::parse_json_file;
use resource_broker::{load_broker, logger};

/// Resource order broker for one federation member.
#[derive(Parser, Debug)]
#[command(name = "resource-broker", version)]
struct Args {
    /// Broker configuration file (JSON).
    #[arg(short, long)]
    config: PathBuf,

    /// Orders to submit once the broker is up (JSON, `{ "orders": [...] }`).
    #[arg(short, long)]
    orders: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logger::init();

    let broker = Arc::new(
        load_broker(&args.config).with_context(|| format!("could not start broker from {}", args.config.display()))?,
    );

    let _audit_guard = match &broker.config().audit_log {
        Some(path) => Some(logger::init_audit(path).context("could not open the audit log")?),
        None => None,
    };

    broker.start_processors().context("could not start the order processors")?;

    if let Some(orders_path) = &args.orders {
        submit_orders(&broker, orders_path)?;
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("federation-server")
        .enable_all()
        .build()
        .context("could not build the federation runtime")?;

    let served = runtime.block_on(serve_until_ctrl_c(broker.clone()));

    log::info!("Shutting down, {} orders still active.", broker.active_order_count());
    broker.stop_processors();
    served
}

async fn serve_until_ctrl_c(broker: Arc<OrderBroker>) -> anyhow::Result<()> {
    let listen_addr = broker.config().listen_addr;
    let facade = Arc::new(RemoteFacade::new(broker));

    let server = FederationServer::bind(listen_addr, facade)
        .await
        .with_context(|| format!("could not listen on {}", listen_addr))?;
    let shutdown = server.shutdown_handle();
    let server_task = tokio::spawn(server.run());

    tokio::signal::ctrl_c().await.context("could not wait for Ctrl-C")?;
    log::info!("Ctrl-C received.");

    shutdown.notify_one();
    server_task.await.context("federation server task failed")?;
    Ok(())
}

fn submit_orders(broker: &OrderBroker, orders_path: &Path) -> anyhow::Result<()> {
    let file: OrdersFileDto = parse_json_file(orders_path)
        .with_context(|| format!("could not read orders from {}", orders_path.display()))?;

    let total = file.orders.len();
    let mut accepted = 0;
    for dto in file.orders {
        match broker.order_from_dto(dto).and_then(|order| broker.activate_new_order(order)) {
            Ok(order_id) => {
                log::debug!("Submitted order {}.", order_id);
                accepted += 1;
            }
            Err(e) => log::error!("Order rejected: {}", e),
        }
    }

    log::info!("Submitted {} of {} orders from '{}'.", accepted, total, orders_path.display());
    Ok(())
}
