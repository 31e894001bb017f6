use anyhow::Result;
use ble_lock_central_lib::{
    AppConfig, BluetoothManager, ControlCommand, ObservableModel, logging, resolve_config_path,
};
use log::{error, info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};

fn render(model: &ObservableModel) {
    println!("----------------------------------------");
    println!(
        "connection: {}   lock: {}{}",
        if model.is_connected { "connected" } else { "not connected" },
        if model.is_locked { "ON" } else { "OFF" },
        if model.is_demo_mode { "   [demo]" } else { "" }
    );
    print!("{}", model.log_text());
    println!("commands: scan | disconnect | write | demo on|off | quit");
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::setup_logging();

    let config_path = resolve_config_path(std::env::args().nth(1));
    let config = AppConfig::load_config(&config_path).await?;

    info!("Starting BluetoothManager initialization.");
    let (manager, control) = BluetoothManager::with_bluest(&config)
        .await
        .map_err(|e| {
            error!("Failed to initialize BluetoothManager: {}", e);
            e
        })?;
    let event_loop = tokio::spawn(manager.run());

    let mut model_rx = control.subscribe();
    let renderer = tokio::spawn(async move {
        render(&model_rx.borrow_and_update());
        while model_rx.changed().await.is_ok() {
            render(&model_rx.borrow_and_update());
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let command = match line.parse::<ControlCommand>() {
            Ok(command) => command,
            Err(e) => {
                warn!("{}", e);
                continue;
            }
        };
        let allowed = match command {
            ControlCommand::Scan => control.can_scan(),
            ControlCommand::Disconnect | ControlCommand::Write => control.can_operate(),
            ControlCommand::SetDemoMode(_) | ControlCommand::Shutdown => true,
        };
        if !allowed {
            warn!("{:?} is not available right now", command);
            continue;
        }
        control.send(command)?;
        if command == ControlCommand::Shutdown {
            break;
        }
    }

    let _ = control.shutdown();
    let controller = event_loop.await??;
    renderer.abort();
    info!("Session ended in {:?}", controller.session_state());
    Ok(())
}
