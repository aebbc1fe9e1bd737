use clap::Parser;
use log::{error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use zigbee_bridge::config::{Config, load_dotenv};
use zigbee_bridge::device::EndpointPreset;
use zigbee_bridge::host::{AttrCall, CallbackResult, JobScheduler, run_dispatch_loop};
use zigbee_bridge::network::{Role, signal_name};
use zigbee_bridge::{LoopbackStack, Result, ZigbeeBridge};

#[derive(Parser)]
#[command(name = "zigbee-bridge")]
#[command(about = "Run the Zigbee bridge against the in-process loopback stack")]
struct Cli {
    /// Network role (coordinator, router, end_device)
    #[arg(long)]
    role: Option<Role>,

    /// Form a new network when factory new (coordinator only)
    #[arg(long)]
    form_network: Option<bool>,

    /// Endpoint preset for the local device
    #[arg(long)]
    preset: Option<EndpointPreset>,

    /// Stop after this many seconds instead of waiting for Ctrl+C
    #[arg(long, env = "ZB_RUN_FOR")]
    run_for: Option<u64>,
}

fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

fn log_signal(signal: u16, status: i32) -> CallbackResult {
    info!("[Host] signal {} status {status}", signal_name(signal));
    Ok(())
}

/// Compose the local device, register it and start the stack.
fn bring_up(bridge: &ZigbeeBridge, config: &Config) -> Result<()> {
    let network = &config.network;
    bridge.set_primary_channel_mask(network.channel_mask)?;
    if let Some(pan_id) = network.pan_id {
        bridge.set_pan_id(pan_id)?;
    }
    if let Some(ext_pan_id) = network.extended_pan_id {
        bridge.set_extended_pan_id(ext_pan_id)?;
    }

    bridge.init(network.role)?;

    let endpoint = config.device.endpoint;
    bridge.define_preset_endpoint(endpoint, config.device.preset)?;
    bridge.set_basic_identity(endpoint, config.identity()?)?;
    if let Some(ep) = bridge.register_device()? {
        info!("[Core] registered device, primary endpoint {ep}");
    }

    bridge.start(network.form_network)?;

    if network.permit_join_s > 0 && network.role != Role::EndDevice {
        bridge.permit_join(network.permit_join_s)?;
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    load_dotenv();
    init_logger();
    info!("Starting Zigbee bridge");

    let cli = Cli::parse();
    let mut config = Config::from_env();
    if let Some(role) = cli.role {
        config.network.role = role;
    }
    if let Some(form) = cli.form_network {
        config.network.form_network = form;
    }
    if let Some(preset) = cli.preset {
        config.device.preset = preset;
    }

    info!("Configuration loaded:");
    info!("  Role: {}", config.network.role);
    info!("  Channel mask: 0x{:08X}", config.network.channel_mask);
    info!("  Endpoint: {}", config.device.endpoint);
    info!("  Preset: {}", config.device.preset);
    info!(
        "  Identity: {} / {}",
        config.device.manufacturer, config.device.model
    );

    let stack = Arc::new(LoopbackStack::new());
    let bridge = Arc::new(ZigbeeBridge::new(stack, config.bridge_options()));

    bridge
        .callbacks()
        .set_signal_callback(Some(Arc::new(log_signal)));
    bridge
        .callbacks()
        .set_attribute_callback(Some(Arc::new(|call: AttrCall<'_>| {
            let args = call.args();
            info!(
                "[Host] attribute ep {} cluster 0x{:04X} attr 0x{:04X} = {:?} (source {:?})",
                args.endpoint,
                args.cluster_id,
                args.attr_id,
                args.value,
                call.source()
            );
            Ok(())
        })));

    let (scheduler, jobs) = JobScheduler::new();
    bridge.set_dispatch_request(Some(scheduler.dispatch_request()));
    let dispatch_task = tokio::spawn(run_dispatch_loop(
        jobs,
        bridge.event_queue().clone(),
        bridge.callbacks().clone(),
    ));

    let bridge_for_init = bridge.clone();
    let config_for_init = config.clone();
    match tokio::task::spawn_blocking(move || bring_up(&bridge_for_init, &config_for_init)).await
    {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            error!("Failed to bring up the bridge: {e}");
            std::process::exit(1);
        }
        Err(e) => {
            error!("Bring-up task panicked: {e}");
            std::process::exit(1);
        }
    }

    info!("Zigbee bridge is running");
    info!("  - Press Ctrl+C to exit");

    // Wait for shutdown signal
    match cli.run_for {
        Some(secs) => {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(secs)) => {
                    info!("Run time of {secs}s elapsed");
                }
                res = signal::ctrl_c() => {
                    if let Err(e) = res {
                        error!("Failed to listen for shutdown signal: {e}");
                    }
                }
            }
        }
        None => match signal::ctrl_c().await {
            Ok(()) => info!("Received shutdown signal"),
            Err(e) => error!("Failed to listen for shutdown signal: {e}"),
        },
    }

    match serde_json::to_string(&bridge.event_stats()) {
        Ok(json) => info!("Event stats: {json}"),
        Err(e) => warn!("Could not serialise event stats: {e}"),
    }
    match serde_json::to_string(&bridge.heap_stats()) {
        Ok(json) => info!("Heap stats: {json}"),
        Err(e) => warn!("Could not serialise heap stats: {e}"),
    }

    // Stop the stack thread, then let the dispatch loop run dry
    let bridge_for_shutdown = bridge.clone();
    if let Err(e) = tokio::task::spawn_blocking(move || bridge_for_shutdown.shutdown()).await {
        error!("Shutdown task panicked: {e}");
    }
    bridge.set_dispatch_request(None);
    drop(scheduler);

    match dispatch_task.await {
        Ok(report) => info!(
            "Dispatched {} event(s), {} callback error(s)",
            report.delivered, report.callback_errors
        ),
        Err(e) => error!("Dispatch loop failed: {e}"),
    }

    info!("Zigbee bridge stopped");
}
