//! Lock connection controller
//! This module holds the central-role state machine: scan for the lock, connect,
//! resolve its characteristics, subscribe to notifications and toggle its state.

use std::collections::VecDeque;

use log::{debug, info, warn};

use crate::config::session_config::WriteMode;
use crate::core::bluetooth::central::Central;
use crate::core::bluetooth::commands::LockCommand;
use crate::core::bluetooth::constants::NO_PERIPHERAL_NAME;
use crate::core::bluetooth::events::{AdapterError, AdapterEvent};
use crate::core::bluetooth::notification::{decode_notification, notification_failure_line};
use crate::core::bluetooth::types::{
    Advertisement, CharacteristicRef, PeripheralHandle, PeripheralId, RadioState, ServiceRef,
    SessionState, TargetIdentity,
};
use crate::state::{ModelHandle, ObservableModel};

/// Drives one BLE session against a single, fixed peripheral identity.
///
/// All methods run on the event-loop task. Requests go out through the
/// [`Central`]; their outcomes come back through [`handle_event`](Self::handle_event).
pub struct ConnectionController<C: Central> {
    central: C,
    target: TargetIdentity,
    write_mode: WriteMode,
    locale: String,
    model: ModelHandle,

    radio_state: RadioState,
    scanning: bool,
    peripheral: Option<PeripheralHandle>,
    connected: bool,
    services_requested: bool,
    write_characteristic: Option<CharacteristicRef>,
    notify_characteristic: Option<CharacteristicRef>,
    /// Lock states awaiting acknowledgment in [`WriteMode::Confirmed`], oldest first
    pending_locks: VecDeque<bool>,
}

impl<C: Central> ConnectionController<C> {
    pub fn new(
        central: C,
        target: TargetIdentity,
        write_mode: WriteMode,
        locale: String,
        model: ModelHandle,
    ) -> Self {
        Self {
            central,
            target,
            write_mode,
            locale,
            model,
            radio_state: RadioState::Unknown,
            scanning: false,
            peripheral: None,
            connected: false,
            services_requested: false,
            write_characteristic: None,
            notify_characteristic: None,
            pending_locks: VecDeque::new(),
        }
    }

    pub fn target(&self) -> &TargetIdentity {
        &self.target
    }

    pub fn radio_state(&self) -> RadioState {
        self.radio_state
    }

    pub fn peripheral(&self) -> Option<&PeripheralHandle> {
        self.peripheral.as_ref()
    }

    pub fn write_characteristic(&self) -> Option<&CharacteristicRef> {
        self.write_characteristic.as_ref()
    }

    pub fn notify_characteristic(&self) -> Option<&CharacteristicRef> {
        self.notify_characteristic.as_ref()
    }

    pub fn model(&self) -> &ModelHandle {
        &self.model
    }

    pub fn snapshot(&self) -> ObservableModel {
        self.model.snapshot()
    }

    pub fn central(&self) -> &C {
        &self.central
    }

    pub fn session_state(&self) -> SessionState {
        match &self.peripheral {
            None if self.scanning => SessionState::Scanning,
            None => SessionState::Idle,
            Some(_) if !self.connected => SessionState::Connecting,
            Some(_) if !self.services_requested => SessionState::Connected,
            Some(_) => {
                if self.write_characteristic.is_some() && self.notify_characteristic.is_some() {
                    SessionState::Ready
                } else {
                    SessionState::Resolving
                }
            }
        }
    }

    /// Starts scanning for the target service.
    ///
    /// Does nothing unless the radio is powered on. Also does nothing while a
    /// session is already active (scanning, or a peripheral is held); callers
    /// must disconnect first.
    pub fn scan(&mut self) {
        if !self.radio_state.is_powered_on() {
            return;
        }
        if self.scanning || self.peripheral.is_some() {
            debug!(
                "Scan ignored, session already active ({:?})",
                self.session_state()
            );
            return;
        }

        self.model.append_line("start scan");
        info!("Starting scan for service {}", self.target.service_uuid);
        self.scanning = true;
        self.central.start_scan(&[self.target.service_uuid]);
    }

    /// Flips the lock state and writes the new state to the peripheral.
    ///
    /// In [`WriteMode::Optimistic`] the flag flips before the write is
    /// acknowledged and a failed write does not flip it back, so the shown state
    /// can drift from the device's. [`WriteMode::Confirmed`] only flips it on an
    /// acknowledged write.
    pub fn write_toggle(&mut self) {
        let (Some(peripheral), Some(characteristic)) =
            (self.peripheral.as_ref(), self.write_characteristic)
        else {
            debug!("Write ignored, no write characteristic resolved");
            return;
        };

        let base = match self.pending_locks.back() {
            Some(&pending) => pending,
            None => self.model.is_locked(),
        };
        let locked = !base;
        match self.write_mode {
            WriteMode::Optimistic => self.model.set_locked(locked),
            WriteMode::Confirmed => self.pending_locks.push_back(locked),
        }

        let command = LockCommand::from_locked(locked);
        info!("Writing {:?} to {}", command, characteristic.uuid);
        self.central
            .write_with_response(peripheral, &characteristic, &command.to_bytes());
    }

    /// Asks the platform to drop the connection. The session is torn down when
    /// the disconnect is confirmed.
    pub fn disconnect_peripheral(&mut self) {
        let Some(peripheral) = self.peripheral.as_ref() else {
            return;
        };
        info!("Requesting disconnect from {}", peripheral.id());
        self.central.cancel_connection(peripheral);
    }

    pub fn set_demo_mode(&mut self, demo: bool) {
        self.model.set_demo_mode(demo);
    }

    /// Explicit teardown: stops scanning, drops the connection and releases
    /// every session resource without waiting for confirmation.
    pub fn shutdown(&mut self) {
        if self.scanning {
            self.central.stop_scan();
        }
        if let Some(peripheral) = self.peripheral.as_ref() {
            if let Some(notify) = self.notify_characteristic {
                self.central.set_notify(peripheral, &notify, false);
            }
            self.central.cancel_connection(peripheral);
        }
        self.release_session();
        info!("Controller shut down");
    }

    pub fn handle_event(&mut self, event: AdapterEvent) {
        if let Some(id) = event.peripheral_id() {
            let discovery = matches!(event, AdapterEvent::PeripheralDiscovered { .. });
            if !discovery && !self.holds(id) {
                debug!("Dropping stale event for {}", id);
                return;
            }
        }

        match event {
            AdapterEvent::RadioStateChanged(state) => self.on_radio_state(state),
            AdapterEvent::PeripheralDiscovered {
                peripheral,
                advertisement,
                rssi,
            } => self.on_discovered(peripheral, advertisement, rssi),
            AdapterEvent::Connected { .. } => self.on_connected(),
            AdapterEvent::ConnectFailed { error, .. } => self.on_connect_failed(error),
            AdapterEvent::Disconnected { error, .. } => self.on_disconnected(error),
            AdapterEvent::ServicesDiscovered { result, .. } => self.on_services(result),
            AdapterEvent::CharacteristicsDiscovered {
                service, result, ..
            } => self.on_characteristics(service, result),
            AdapterEvent::WriteCompleted { result, .. } => self.on_write_completed(result),
            AdapterEvent::ValueUpdated { result, .. } => self.on_value_updated(result),
        }
    }

    fn holds(&self, id: &PeripheralId) -> bool {
        self.peripheral.as_ref().is_some_and(|p| p.id() == id)
    }

    fn on_radio_state(&mut self, state: RadioState) {
        info!("Radio state changed: {:?}", state);
        self.radio_state = state;
        if !state.is_powered_on() {
            self.scanning = false;
        }
        self.model.append_line(state.label());
    }

    fn on_discovered(
        &mut self,
        peripheral: PeripheralHandle,
        advertisement: Advertisement,
        rssi: Option<i16>,
    ) {
        let local_name = advertisement.local_name_or_placeholder();
        if !self.scanning || self.peripheral.is_some() {
            debug!("Discovery of {} ignored, not scanning", local_name);
            return;
        }
        if advertisement.local_name() != Some(self.target.name.as_str()) {
            debug!(
                "Skipping {} ({}), RSSI {:?}",
                advertisement,
                peripheral.name().unwrap_or(NO_PERIPHERAL_NAME),
                rssi
            );
            return;
        }

        info!(
            "Found target {} (id {}, address {:?}, RSSI {:?})",
            advertisement,
            peripheral.id(),
            peripheral.address(),
            rssi
        );
        self.model.append_line(format!("local name: {}", local_name));
        self.model
            .append_line(peripheral.name().unwrap_or(NO_PERIPHERAL_NAME).to_string());
        self.model.append_line("start connect");

        self.scanning = false;
        self.central.connect(&peripheral);
        self.peripheral = Some(peripheral);
    }

    fn on_connected(&mut self) {
        let Some(peripheral) = self.peripheral.as_ref() else {
            return;
        };
        if self.connected {
            debug!("Duplicate connect confirmation for {}", peripheral.id());
            return;
        }
        info!("Connected to {}", peripheral.id());
        self.connected = true;
        self.model.set_connected(true);
        self.model.append_line("connected");

        self.services_requested = true;
        self.central
            .discover_services(peripheral, &[self.target.service_uuid]);
    }

    fn on_connect_failed(&mut self, error: AdapterError) {
        warn!("Connection failed: {}", error);
        self.model.append_line(format!("connect failed: {}", error));
        self.release_session();
    }

    fn on_disconnected(&mut self, error: Option<AdapterError>) {
        if let Some(error) = error {
            // Informational only; the session stays up until a clean disconnect arrives.
            warn!("Disconnect reported with error: {}", error);
            return;
        }
        info!("Peripheral disconnected");
        self.model.append_line("disconnected");
        self.release_session();
    }

    fn on_services(&mut self, result: Result<Vec<ServiceRef>, AdapterError>) {
        let services = match result {
            Ok(services) => services,
            Err(error) => {
                warn!("Service discovery failed: {}", error);
                self.model
                    .append_line(format!("service discovery failed: {}", error));
                return;
            }
        };
        let Some(peripheral) = self.peripheral.as_ref() else {
            return;
        };

        info!("Discovered {} service(s)", services.len());
        self.model.append_line("services discovered");
        for service in &services {
            self.central.discover_characteristics(peripheral, service, &[]);
        }
    }

    fn on_characteristics(
        &mut self,
        service: ServiceRef,
        result: Result<Vec<CharacteristicRef>, AdapterError>,
    ) {
        let characteristics = match result {
            Ok(characteristics) => characteristics,
            Err(error) => {
                warn!("Characteristic discovery failed on {}: {}", service.uuid, error);
                self.model
                    .append_line(format!("characteristic discovery failed: {}", error));
                return;
            }
        };
        let Some(peripheral) = self.peripheral.as_ref() else {
            return;
        };
        let was_ready = self.session_state() == SessionState::Ready;

        for characteristic in characteristics {
            if characteristic.uuid == self.target.write_characteristic_uuid {
                info!("Found write characteristic: {}", characteristic.uuid);
                self.write_characteristic = Some(characteristic);
                self.model
                    .append_line(format!("write characteristic: {}", characteristic.uuid));
            }
            if characteristic.uuid == self.target.notify_characteristic_uuid {
                info!("Found notification characteristic: {}", characteristic.uuid);
                self.notify_characteristic = Some(characteristic);
                self.central.set_notify(peripheral, &characteristic, true);
                self.model
                    .append_line(format!("notify characteristic: {}", characteristic.uuid));
            }
        }

        if !was_ready && self.session_state() == SessionState::Ready {
            info!("Lock session ready");
            self.model.append_line("ready");
        }
    }

    fn on_write_completed(&mut self, result: Result<(), AdapterError>) {
        // Completions arrive in write order.
        let pending = self.pending_locks.pop_front();
        match result {
            Ok(()) => {
                if let Some(locked) = pending {
                    self.model.set_locked(locked);
                }
                self.model.append_line("write acknowledged");
            }
            Err(error) => {
                warn!("Write failed: {}", error);
                self.model.append_line(format!("error: {}", error));
            }
        }
    }

    fn on_value_updated(&mut self, result: Result<Vec<u8>, AdapterError>) {
        match result {
            Ok(payload) => {
                let line = decode_notification(&payload);
                debug!("Notification: {}", line);
                self.model.replace_log(line);
            }
            Err(error) => {
                warn!("Notification failed: {}", error);
                self.model
                    .append_line(notification_failure_line(&self.locale, &error));
            }
        }
    }

    fn release_session(&mut self) {
        self.scanning = false;
        self.peripheral = None;
        self.connected = false;
        self.services_requested = false;
        self.write_characteristic = None;
        self.notify_characteristic = None;
        self.pending_locks.clear();
        self.model.set_connected(false);
    }
}
