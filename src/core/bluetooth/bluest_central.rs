//! [`Central`] implementation backed by the `bluest` crate.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use bluest::{Adapter, AdapterEvent as BluestAdapterEvent, Characteristic, Device, Service, Uuid};
use futures_util::StreamExt;
use log::{error, info};
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

use crate::core::bluetooth::central::Central;
use crate::core::bluetooth::connection::ConnectionManager;
use crate::core::bluetooth::events::AdapterEvent;
use crate::core::bluetooth::notification::NotificationHandler;
use crate::core::bluetooth::scanner::BluetoothScanner;
use crate::core::bluetooth::types::{
    CharacteristicRef, PeripheralHandle, PeripheralId, RadioState, ServiceRef,
};

/// bluest objects the controller refers to by id
#[derive(Default)]
pub struct GattRegistry {
    devices: HashMap<PeripheralId, Device>,
    services: HashMap<(PeripheralId, Uuid), Service>,
    characteristics: HashMap<(PeripheralId, CharacteristicRef), Characteristic>,
}

impl GattRegistry {
    pub fn insert_device(&mut self, id: PeripheralId, device: Device) {
        self.devices.insert(id, device);
    }

    pub fn device(&self, id: &PeripheralId) -> Option<Device> {
        self.devices.get(id).cloned()
    }

    pub fn insert_service(&mut self, id: PeripheralId, service: Service) {
        self.services.insert((id, service.uuid()), service);
    }

    pub fn service(&self, id: &PeripheralId, uuid: Uuid) -> Option<Service> {
        self.services.get(&(id.clone(), uuid)).cloned()
    }

    pub fn insert_characteristic(
        &mut self,
        id: PeripheralId,
        char_ref: CharacteristicRef,
        characteristic: Characteristic,
    ) {
        self.characteristics.insert((id, char_ref), characteristic);
    }

    pub fn characteristic(
        &self,
        id: &PeripheralId,
        char_ref: &CharacteristicRef,
    ) -> Option<Characteristic> {
        self.characteristics.get(&(id.clone(), *char_ref)).cloned()
    }

    /// Drops discovered devices that have no resolved GATT objects
    pub fn clear_devices(&mut self) {
        let services = &self.services;
        self.devices
            .retain(|id, _| services.keys().any(|(owner, _)| owner == id));
    }

    /// Releases everything held for one peripheral
    pub fn forget(&mut self, id: &PeripheralId) {
        self.devices.remove(id);
        self.services.retain(|(owner, _), _| owner != id);
        self.characteristics.retain(|(owner, _), _| owner != id);
    }
}

/// Platform radio session over a bluest [`Adapter`]
pub struct BluestCentral {
    scanner: BluetoothScanner,
    connection_manager: ConnectionManager,
    notification_handler: NotificationHandler,
    radio_token: CancellationToken,
}

impl BluestCentral {
    /// Opens the default adapter and starts reporting its power state
    pub async fn open(events: mpsc::UnboundedSender<AdapterEvent>) -> Result<Self> {
        let adapter = match Adapter::default().await {
            Some(adapter) => adapter,
            None => {
                let _ = events.send(AdapterEvent::RadioStateChanged(RadioState::Unsupported));
                return Err(anyhow!("No Bluetooth adapter found"));
            }
        };
        Ok(Self::new(adapter, events))
    }

    pub fn new(adapter: Adapter, events: mpsc::UnboundedSender<AdapterEvent>) -> Self {
        let registry = Arc::new(Mutex::new(GattRegistry::default()));
        let radio_token = CancellationToken::new();
        tokio::spawn(Self::watch_radio(
            adapter.clone(),
            events.clone(),
            radio_token.clone(),
        ));

        Self {
            scanner: BluetoothScanner::new(adapter.clone(), registry.clone(), events.clone()),
            connection_manager: ConnectionManager::new(adapter, registry.clone(), events.clone()),
            notification_handler: NotificationHandler::new(registry, events),
            radio_token,
        }
    }

    async fn watch_radio(
        adapter: Adapter,
        events: mpsc::UnboundedSender<AdapterEvent>,
        token: CancellationToken,
    ) {
        let initial = match adapter.is_available().await {
            Ok(true) => RadioState::PoweredOn,
            Ok(false) => RadioState::PoweredOff,
            Err(e) => {
                error!("Failed to query adapter availability: {}", e);
                RadioState::Unknown
            }
        };
        if events.send(AdapterEvent::RadioStateChanged(initial)).is_err() {
            return;
        }

        let mut stream = match adapter.events().await {
            Ok(stream) => stream,
            Err(e) => {
                error!("Failed to watch adapter events: {}", e);
                return;
            }
        };
        loop {
            tokio::select! {
                event = stream.next() => {
                    let state = match event {
                        Some(Ok(BluestAdapterEvent::Available)) => RadioState::PoweredOn,
                        Some(Ok(BluestAdapterEvent::Unavailable)) => RadioState::PoweredOff,
                        Some(Err(e)) => {
                            error!("Adapter event stream error: {}", e);
                            continue;
                        }
                        None => break,
                    };
                    info!("Adapter is now {:?}", state);
                    if events.send(AdapterEvent::RadioStateChanged(state)).is_err() {
                        break;
                    }
                }
                _ = token.cancelled() => break,
            }
        }
    }
}

impl Central for BluestCentral {
    fn start_scan(&mut self, services: &[Uuid]) {
        self.scanner.start_scan(services.to_vec());
    }

    fn stop_scan(&mut self) {
        self.scanner.stop_scan();
    }

    fn connect(&mut self, peripheral: &PeripheralHandle) {
        // Connecting ends the scan.
        self.scanner.stop_scan();
        self.connection_manager.connect(peripheral.id().clone());
    }

    fn cancel_connection(&mut self, peripheral: &PeripheralHandle) {
        self.notification_handler.stop_notifications(peripheral.id());
        self.connection_manager.disconnect(peripheral.id().clone());
    }

    fn discover_services(&mut self, peripheral: &PeripheralHandle, services: &[Uuid]) {
        self.connection_manager
            .discover_services(peripheral.id().clone(), services.to_vec());
    }

    fn discover_characteristics(
        &mut self,
        peripheral: &PeripheralHandle,
        service: &ServiceRef,
        characteristics: &[Uuid],
    ) {
        self.connection_manager.discover_characteristics(
            peripheral.id().clone(),
            *service,
            characteristics.to_vec(),
        );
    }

    fn set_notify(
        &mut self,
        peripheral: &PeripheralHandle,
        characteristic: &CharacteristicRef,
        enabled: bool,
    ) {
        if enabled {
            self.notification_handler
                .subscribe(peripheral.id().clone(), *characteristic);
        } else {
            self.notification_handler
                .unsubscribe(peripheral.id(), characteristic);
        }
    }

    fn write_with_response(
        &mut self,
        peripheral: &PeripheralHandle,
        characteristic: &CharacteristicRef,
        payload: &[u8],
    ) {
        self.connection_manager
            .write(peripheral.id().clone(), *characteristic, payload.to_vec());
    }
}

impl Drop for BluestCentral {
    fn drop(&mut self) {
        self.radio_token.cancel();
        self.scanner.stop_scan();
        self.connection_manager.stop_watching();
    }
}
