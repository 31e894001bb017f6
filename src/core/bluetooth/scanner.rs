use std::sync::{Arc, LazyLock};

use anyhow::Result;
use bluest::{Adapter, AdvertisingDevice, Device, Uuid};
use futures_util::StreamExt;
use log::{debug, error, info};
use regex::Regex;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::bluetooth::bluest_central::GattRegistry;
use crate::core::bluetooth::constants::{
    ADV_IS_CONNECTABLE, ADV_LOCAL_NAME, ADV_MANUFACTURER_DATA, ADV_SERVICE_UUIDS,
    ADV_TX_POWER_LEVEL,
};
use crate::core::bluetooth::events::AdapterEvent;
use crate::core::bluetooth::types::{
    Advertisement, AdvertisementValue, PeripheralHandle, PeripheralId,
};

pub struct BluetoothScanner {
    adapter: Adapter,
    registry: Arc<Mutex<GattRegistry>>,
    events: mpsc::UnboundedSender<AdapterEvent>,
    cancel_token: CancellationToken,
    scan_task_handle: Option<JoinHandle<()>>,
}

impl BluetoothScanner {
    pub fn new(
        adapter: Adapter,
        registry: Arc<Mutex<GattRegistry>>,
        events: mpsc::UnboundedSender<AdapterEvent>,
    ) -> Self {
        Self {
            adapter,
            registry,
            events,
            cancel_token: CancellationToken::new(),
            scan_task_handle: None,
        }
    }

    pub fn start_scan(&mut self, services: Vec<Uuid>) {
        if self.scan_task_handle.is_some() {
            self.stop_scan();
        }

        self.cancel_token = CancellationToken::new();
        let cancel_token_for_task = self.cancel_token.clone();
        let adapter_for_task = self.adapter.clone();
        let registry_for_task = self.registry.clone();
        let events_for_task = self.events.clone();

        let handle = tokio::spawn(async move {
            if let Err(e) = Self::internal_scan_task(
                adapter_for_task,
                registry_for_task,
                events_for_task,
                cancel_token_for_task,
                services,
            )
            .await
            {
                error!("Scan task finished with an error: {:?}", e);
            }
        });

        self.scan_task_handle = Some(handle);
        info!("Device scan task started.");
    }

    pub fn stop_scan(&mut self) {
        info!("Stopping Bluetooth scan.");
        self.cancel_token.cancel();
        if self.scan_task_handle.take().is_none() {
            debug!("No active scan task handle found.");
        }
    }

    async fn internal_scan_task(
        adapter: Adapter,
        registry: Arc<Mutex<GattRegistry>>,
        events: mpsc::UnboundedSender<AdapterEvent>,
        cancel_token: CancellationToken,
        services: Vec<Uuid>,
    ) -> Result<()> {
        registry.lock().await.clear_devices();

        info!("Starting bluetooth scan for {:?}", services);
        let mut scan_stream = adapter.scan(&services).await?;

        loop {
            tokio::select! {
                result = scan_stream.next() => {
                    match result {
                        Some(discovered_device) => {
                            debug!(
                                "Found device - Device: {:?}, RSSI: {:?}",
                                discovered_device.device, discovered_device.rssi
                            );
                            let event = Self::discovery_event(&registry, discovered_device).await;
                            if events.send(event).is_err() {
                                break;
                            }
                        }
                        None => {
                            info!("Bluetooth scan stream has ended.");
                            break;
                        }
                    }
                }
                _ = cancel_token.cancelled() => {
                    break;
                }
            }
        }

        Ok(())
    }

    async fn discovery_event(
        registry: &Arc<Mutex<GattRegistry>>,
        discovered: AdvertisingDevice,
    ) -> AdapterEvent {
        let peripheral = Self::peripheral_handle(&discovered.device);
        registry
            .lock()
            .await
            .insert_device(peripheral.id().clone(), discovered.device.clone());

        let mut advertisement = Advertisement::new();
        let adv = discovered.adv_data;
        if let Some(name) = adv.local_name {
            advertisement.insert(ADV_LOCAL_NAME, AdvertisementValue::Text(name));
        }
        if !adv.services.is_empty() {
            advertisement.insert(ADV_SERVICE_UUIDS, AdvertisementValue::Uuids(adv.services));
        }
        if let Some(manufacturer) = adv.manufacturer_data {
            advertisement.insert(ADV_MANUFACTURER_DATA, AdvertisementValue::Bytes(manufacturer.data));
        }
        if let Some(tx_power) = adv.tx_power_level {
            advertisement.insert(ADV_TX_POWER_LEVEL, AdvertisementValue::Integer(tx_power.into()));
        }
        advertisement.insert(ADV_IS_CONNECTABLE, AdvertisementValue::Flag(adv.is_connectable));

        AdapterEvent::PeripheralDiscovered {
            peripheral,
            advertisement,
            rssi: discovered.rssi,
        }
    }

    fn peripheral_handle(device: &Device) -> PeripheralHandle {
        let id = device.id().to_string();
        let address = extract_mac_address(&id);
        PeripheralHandle::new(PeripheralId::new(id), device.name().ok(), address)
    }
}

static MAC_ADDRESS: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"([0-9A-Fa-f]{2}[:-]){5}([0-9A-Fa-f]{2})").ok());

/// Pulls a MAC address out of a platform device id, if it contains one
pub fn extract_mac_address(device_id_str: &str) -> Option<String> {
    MAC_ADDRESS
        .as_ref()?
        .find_iter(device_id_str)
        .last()
        .map(|m| m.as_str().to_uppercase())
}
