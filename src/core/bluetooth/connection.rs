//! Bluetooth connection handling for the lock peripheral
//! This module connects, disconnects and walks the GATT tree. Every operation
//! runs on its own task and reports back through the adapter event queue.

use std::collections::HashMap;
use std::sync::Arc;

use bluest::{Adapter, ConnectionEvent, Uuid};
use futures_util::StreamExt;
use log::{info, warn};
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

use crate::core::bluetooth::bluest_central::GattRegistry;
use crate::core::bluetooth::events::{AdapterError, AdapterEvent};
use crate::core::bluetooth::types::{CharacteristicRef, PeripheralId, ServiceRef};

/// Tokens for in-flight connects and the link watchers that follow them.
/// A task cancels its own token when it finishes, so cancelled entries are dead.
#[derive(Default)]
pub struct LinkWatchers {
    tokens: HashMap<PeripheralId, CancellationToken>,
}

impl LinkWatchers {
    /// Starts tracking `peripheral`, cancelling any earlier attempt for it
    pub fn begin(&mut self, peripheral: &PeripheralId) -> CancellationToken {
        self.tokens.retain(|_, token| !token.is_cancelled());
        let token = CancellationToken::new();
        if let Some(previous) = self.tokens.insert(peripheral.clone(), token.clone()) {
            previous.cancel();
        }
        token
    }

    /// Cancels the connect or watcher for `peripheral`. Returns whether one was live.
    pub fn end(&mut self, peripheral: &PeripheralId) -> bool {
        match self.tokens.remove(peripheral) {
            Some(token) => {
                let live = !token.is_cancelled();
                token.cancel();
                live
            }
            None => false,
        }
    }

    pub fn is_watching(&self, peripheral: &PeripheralId) -> bool {
        self.tokens
            .get(peripheral)
            .is_some_and(|token| !token.is_cancelled())
    }

    pub fn cancel_all(&mut self) {
        for (_, token) in self.tokens.drain() {
            token.cancel();
        }
    }
}

/// Connection manager for the lock peripheral
pub struct ConnectionManager {
    adapter: Adapter,
    registry: Arc<Mutex<GattRegistry>>,
    events: mpsc::UnboundedSender<AdapterEvent>,
    watchers: LinkWatchers,
}

impl ConnectionManager {
    pub fn new(
        adapter: Adapter,
        registry: Arc<Mutex<GattRegistry>>,
        events: mpsc::UnboundedSender<AdapterEvent>,
    ) -> Self {
        Self {
            adapter,
            registry,
            events,
            watchers: LinkWatchers::default(),
        }
    }

    /// Connects, reports the result, then keeps watching the link for drops
    pub fn connect(&mut self, peripheral: PeripheralId) {
        let token = self.watchers.begin(&peripheral);
        let adapter = self.adapter.clone();
        let registry = self.registry.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            Self::connect_and_watch(&adapter, &registry, &events, peripheral, &token).await;
            token.cancel();
        });
    }

    async fn connect_and_watch(
        adapter: &Adapter,
        registry: &Arc<Mutex<GattRegistry>>,
        events: &mpsc::UnboundedSender<AdapterEvent>,
        peripheral: PeripheralId,
        token: &CancellationToken,
    ) {
        let Some(device) = registry.lock().await.device(&peripheral) else {
            let _ = events.send(AdapterEvent::ConnectFailed {
                peripheral,
                error: AdapterError::new("device not found"),
            });
            return;
        };

        if !device.is_connected().await {
            info!("Initiating connection to {}...", peripheral);
            if let Err(e) = adapter.connect_device(&device).await {
                warn!("Connection to {} failed: {}", peripheral, e);
                registry.lock().await.forget(&peripheral);
                let _ = events.send(AdapterEvent::ConnectFailed {
                    peripheral,
                    error: e.into(),
                });
                return;
            }
        }
        if token.is_cancelled() {
            // Disconnect was requested while the connect was in flight.
            info!("Connection to {} abandoned", peripheral);
            if let Err(e) = adapter.disconnect_device(&device).await {
                warn!("Failed to drop abandoned link to {}: {}", peripheral, e);
            }
            return;
        }
        info!("Connection to {} successful", peripheral);
        let _ = events.send(AdapterEvent::Connected {
            peripheral: peripheral.clone(),
        });

        let mut link_events = match adapter.device_connection_events(&device).await {
            Ok(stream) => stream,
            Err(e) => {
                warn!("Cannot watch link state of {}: {}", peripheral, e);
                return;
            }
        };
        loop {
            tokio::select! {
                event = link_events.next() => match event {
                    Some(ConnectionEvent::Disconnected) => {
                        info!("Device {} dropped the connection", peripheral);
                        registry.lock().await.forget(&peripheral);
                        let _ = events.send(AdapterEvent::Disconnected {
                            peripheral: peripheral.clone(),
                            error: None,
                        });
                        break;
                    }
                    Some(ConnectionEvent::Connected) => {}
                    None => break,
                },
                _ = token.cancelled() => break,
            }
        }
    }

    /// Disconnect from the lock peripheral (bluest version).
    /// Also abandons a connect that is still in flight.
    pub fn disconnect(&mut self, peripheral: PeripheralId) {
        self.watchers.end(&peripheral);

        let adapter = self.adapter.clone();
        let registry = self.registry.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let device = registry.lock().await.device(&peripheral);
            let connected = match &device {
                Some(device) => device.is_connected().await,
                None => false,
            };
            let error = match device {
                Some(device) if connected => {
                    info!("Disconnecting from device {}", peripheral);
                    adapter.disconnect_device(&device).await.err().map(AdapterError::from)
                }
                _ => {
                    info!("Device {} not connected", peripheral);
                    None
                }
            };
            if error.is_none() {
                registry.lock().await.forget(&peripheral);
                info!("Successfully disconnected");
            }
            let _ = events.send(AdapterEvent::Disconnected { peripheral, error });
        });
    }

    pub fn discover_services(&self, peripheral: PeripheralId, filter: Vec<Uuid>) {
        let registry = self.registry.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = Self::services(&registry, &peripheral, &filter).await;
            let _ = events.send(AdapterEvent::ServicesDiscovered { peripheral, result });
        });
    }

    async fn services(
        registry: &Arc<Mutex<GattRegistry>>,
        peripheral: &PeripheralId,
        filter: &[Uuid],
    ) -> Result<Vec<ServiceRef>, AdapterError> {
        let device = registry
            .lock()
            .await
            .device(peripheral)
            .ok_or_else(|| AdapterError::new("device not found"))?;

        info!("Discovering services on {}...", peripheral);
        let services = device.discover_services().await?;
        let mut refs = Vec::new();
        let mut registry = registry.lock().await;
        for service in services {
            let uuid = service.uuid();
            if !filter.is_empty() && !filter.contains(&uuid) {
                continue;
            }
            info!("Found service: {}", uuid);
            registry.insert_service(peripheral.clone(), service);
            refs.push(ServiceRef { uuid });
        }
        Ok(refs)
    }

    pub fn discover_characteristics(
        &self,
        peripheral: PeripheralId,
        service: ServiceRef,
        filter: Vec<Uuid>,
    ) {
        let registry = self.registry.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = Self::characteristics(&registry, &peripheral, service, &filter).await;
            let _ = events.send(AdapterEvent::CharacteristicsDiscovered {
                peripheral,
                service,
                result,
            });
        });
    }

    async fn characteristics(
        registry: &Arc<Mutex<GattRegistry>>,
        peripheral: &PeripheralId,
        service: ServiceRef,
        filter: &[Uuid],
    ) -> Result<Vec<CharacteristicRef>, AdapterError> {
        let bluest_service = registry
            .lock()
            .await
            .service(peripheral, service.uuid)
            .ok_or_else(|| AdapterError::new("service not resolved"))?;

        let characteristics = bluest_service.discover_characteristics().await?;
        let mut refs = Vec::new();
        let mut registry = registry.lock().await;
        for characteristic in characteristics {
            let uuid = characteristic.uuid();
            if !filter.is_empty() && !filter.contains(&uuid) {
                continue;
            }
            let char_ref = CharacteristicRef {
                service: service.uuid,
                uuid,
            };
            registry.insert_characteristic(peripheral.clone(), char_ref, characteristic);
            refs.push(char_ref);
        }
        Ok(refs)
    }

    /// Acknowledged write; bluest writes with response by default
    pub fn write(&self, peripheral: PeripheralId, characteristic: CharacteristicRef, payload: Vec<u8>) {
        let registry = self.registry.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let target = registry.lock().await.characteristic(&peripheral, &characteristic);
            let result = match target {
                Some(target) => {
                    info!("Sending {:?} to {}", String::from_utf8_lossy(&payload), characteristic.uuid);
                    target.write(&payload).await.map_err(AdapterError::from)
                }
                None => Err(AdapterError::new("characteristic not resolved")),
            };
            let _ = events.send(AdapterEvent::WriteCompleted {
                peripheral,
                characteristic,
                result,
            });
        });
    }

    /// Cancels every connect and link watcher
    pub fn stop_watching(&mut self) {
        self.watchers.cancel_all();
    }
}
