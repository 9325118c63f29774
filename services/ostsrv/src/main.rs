//! Outstation Simulator (`ostsrv`)
//!
//! Serves a simulated tank over the outstation protocol session until
//! Ctrl+C / SIGTERM.

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use common::service_bootstrap::ServiceInfo;
use errors::SimResult;
use ostsrv::{
    bootstrap::{self, Args, ServiceArgs},
    trend, OstsrvConfig, Outstation, SchedulerConfig, SessionConfig, TcpSession,
};

#[tokio::main]
async fn main() -> SimResult<()> {
    let args = Args::parse();
    let service_args: ServiceArgs = args.clone().into();

    let service_info = ServiceInfo::new("ostsrv", "Outstation Simulator - Tank Process Bridge");

    // Configuration errors are fatal and must surface before any socket opens
    let config = OstsrvConfig::load(&service_args.config_path)?;

    bootstrap::initialize_logging(&service_args, &service_info, &config.logging)?;
    if !args.no_color {
        common::service_bootstrap::print_startup_banner(&service_info);
    }

    if args.validate {
        info!(
            "Configuration valid: {} ({} BO, {} AI, {} counters, tick {}ms)",
            service_args.config_path.display(),
            config.database.binary_outputs,
            config.database.analog_inputs,
            config.database.counters,
            config.process.dt_ms
        );
        return Ok(());
    }

    // ============ Engine ============
    let (outstation, outbound) = Outstation::from_config(&config);
    outstation.preload()?;

    let cancel = CancellationToken::new();
    let signal_task = common::shutdown::cancel_on_shutdown(cancel.clone());

    // ============ Protocol session ============
    let session = TcpSession::bind(
        SessionConfig::from_config(&config)?,
        outstation.handler(),
        outstation.database(),
        outbound,
    )
    .await?;

    // ============ Tasks ============
    let scheduler = outstation.scheduler(SchedulerConfig::from(&config));
    let scheduler_task = tokio::spawn(scheduler.run(cancel.clone()));
    let trend_task = trend::spawn_trend_logger(
        outstation.subscribe(),
        config.process.tank.setpoint,
        cancel.clone(),
    );
    let session_task = tokio::spawn(session.run(cancel.clone()));

    info!("Outstation enabled");
    cancel.cancelled().await;
    info!("Shutting down...");

    match session_task.await {
        Ok(Ok(())) => {},
        Ok(Err(e)) => error!("Protocol session failed: {}", e),
        Err(e) => error!("Protocol session task panicked: {}", e),
    }
    if let Err(e) = scheduler_task.await {
        error!("Scheduler task panicked: {}", e);
    }
    if let Err(e) = trend_task.await {
        warn!("Trend task ended abnormally: {}", e);
    }
    signal_task.abort();

    info!("Service shutdown complete");
    Ok(())
}
