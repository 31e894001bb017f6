//! Bluetooth manager for the lock central
//! This module runs the event loop that feeds adapter events and user commands
//! to the controller, one at a time.

use anyhow::Result;
use log::{debug, info};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::commands::{ControlCommand, ControlHandle};
use crate::config::AppConfig;
use crate::core::bluetooth::bluest_central::BluestCentral;
use crate::core::bluetooth::central::Central;
use crate::core::bluetooth::events::AdapterEvent;
use crate::core::bluetooth::notification::resolve_locale;
use crate::core::controller::ConnectionController;
use crate::state::ModelHandle;

/// Owns the controller and serializes everything that touches it
pub struct BluetoothManager<C: Central> {
    controller: ConnectionController<C>,
    events: mpsc::UnboundedReceiver<AdapterEvent>,
    commands: mpsc::UnboundedReceiver<ControlCommand>,
    shutdown: CancellationToken,
}

impl BluetoothManager<BluestCentral> {
    /// Creates a manager on the platform's default Bluetooth adapter
    pub async fn with_bluest(config: &AppConfig) -> Result<(Self, ControlHandle)> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let central = BluestCentral::open(events_tx).await?;
        info!("Bluetooth adapter opened.");
        Self::new(central, events_rx, config)
    }
}

impl<C: Central> BluetoothManager<C> {
    /// Creates a manager over any [`Central`]. `events` must be the receiving end
    /// of the queue the central reports into.
    pub fn new(
        central: C,
        events: mpsc::UnboundedReceiver<AdapterEvent>,
        config: &AppConfig,
    ) -> Result<(Self, ControlHandle)> {
        let target = config.target.to_identity()?;
        let locale = resolve_locale(config.session.locale.as_deref());
        let model = ModelHandle::new();
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let handle = ControlHandle::new(commands_tx, model.subscribe());

        info!(
            "Target peripheral {:?}, service {}, write mode {:?}",
            target.name, target.service_uuid, config.session.write_mode
        );
        let controller =
            ConnectionController::new(central, target, config.session.write_mode, locale, model);

        Ok((
            Self {
                controller,
                events,
                commands: commands_rx,
                shutdown: CancellationToken::new(),
            },
            handle,
        ))
    }

    /// Token that stops [`run`](Self::run) from outside
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn controller(&self) -> &ConnectionController<C> {
        &self.controller
    }

    /// Runs until shutdown is requested or every sender is gone, then tears the
    /// session down and hands the controller back.
    pub async fn run(mut self) -> Result<ConnectionController<C>> {
        info!("Bluetooth event loop started.");
        loop {
            tokio::select! {
                event = self.events.recv() => match event {
                    Some(event) => {
                        debug!("Adapter event: {:?}", event);
                        self.controller.handle_event(event);
                    }
                    None => {
                        info!("Adapter event queue closed.");
                        break;
                    }
                },
                command = self.commands.recv() => match command {
                    Some(ControlCommand::Shutdown) | None => break,
                    Some(command) => self.dispatch(command),
                },
                _ = self.shutdown.cancelled() => break,
            }
        }

        self.controller.shutdown();
        info!("Bluetooth event loop stopped.");
        Ok(self.controller)
    }

    fn dispatch(&mut self, command: ControlCommand) {
        debug!("Control command: {:?}", command);
        match command {
            ControlCommand::Scan => self.controller.scan(),
            ControlCommand::Disconnect => self.controller.disconnect_peripheral(),
            ControlCommand::Write => self.controller.write_toggle(),
            ControlCommand::SetDemoMode(demo) => self.controller.set_demo_mode(demo),
            ControlCommand::Shutdown => self.controller.shutdown(),
        }
    }
}
