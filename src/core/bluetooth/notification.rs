//! Notification handling for the lock peripheral
//! This module decodes notification payloads and forwards bluest notification
//! streams into the adapter event queue.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::StreamExt;
use log::{debug, error, info, warn};
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

use crate::core::bluetooth::bluest_central::GattRegistry;
use crate::core::bluetooth::constants::UNDECODABLE_PAYLOAD;
use crate::core::bluetooth::events::{AdapterError, AdapterEvent};
use crate::core::bluetooth::types::{CharacteristicRef, PeripheralId};

/// Decodes a notification payload as ASCII text.
/// Anything outside the ASCII range yields the placeholder instead of an error.
pub fn decode_notification(payload: &[u8]) -> String {
    if payload.is_ascii() {
        String::from_utf8_lossy(payload).into_owned()
    } else {
        UNDECODABLE_PAYLOAD.to_string()
    }
}

/// Picks the locale used for user-facing log lines: the configured override,
/// then the system locale, then English.
pub fn resolve_locale(configured: Option<&str>) -> String {
    configured
        .map(str::to_string)
        .or_else(sys_locale::get_locale)
        .unwrap_or_else(|| "en-US".to_string())
}

/// Log line for a failed notification, in the session's language.
pub fn notification_failure_line(locale: &str, error: &AdapterError) -> String {
    if locale.to_ascii_lowercase().starts_with("ja") {
        format!("通知の受け取りに失敗しました： {}", error)
    } else {
        format!("failed to receive notification: {}", error)
    }
}

/// Notification handler for the lock's notify characteristic
pub struct NotificationHandler {
    registry: Arc<Mutex<GattRegistry>>,
    events: mpsc::UnboundedSender<AdapterEvent>,
    subscriptions: HashMap<(PeripheralId, CharacteristicRef), CancellationToken>,
}

impl NotificationHandler {
    /// Create a new NotificationHandler
    pub fn new(
        registry: Arc<Mutex<GattRegistry>>,
        events: mpsc::UnboundedSender<AdapterEvent>,
    ) -> Self {
        Self {
            registry,
            events,
            subscriptions: HashMap::new(),
        }
    }

    /// Subscribes to a characteristic and forwards each value as an event.
    /// A stream already open for the same characteristic is replaced.
    pub fn subscribe(&mut self, peripheral: PeripheralId, characteristic: CharacteristicRef) {
        // Finished streams cancel their own token on the way out.
        self.subscriptions.retain(|_, token| !token.is_cancelled());

        let token = CancellationToken::new();
        let key = (peripheral.clone(), characteristic);
        if let Some(previous) = self.subscriptions.insert(key, token.clone()) {
            debug!("Replacing notification stream on {}", characteristic.uuid);
            previous.cancel();
        }

        let registry = self.registry.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            Self::process_notifications(registry, events, peripheral, characteristic, &token)
                .await;
            token.cancel();
        });
    }

    pub fn is_subscribed(
        &self,
        peripheral: &PeripheralId,
        characteristic: &CharacteristicRef,
    ) -> bool {
        self.subscriptions
            .get(&(peripheral.clone(), *characteristic))
            .is_some_and(|token| !token.is_cancelled())
    }

    pub fn unsubscribe(&mut self, peripheral: &PeripheralId, characteristic: &CharacteristicRef) {
        if let Some(token) = self
            .subscriptions
            .remove(&(peripheral.clone(), *characteristic))
        {
            info!("Unsubscribing from {}", characteristic.uuid);
            token.cancel();
        }
    }

    /// Cancels every stream that belongs to the given peripheral
    pub fn stop_notifications(&mut self, peripheral: &PeripheralId) {
        self.subscriptions.retain(|(id, _), token| {
            if id == peripheral {
                token.cancel();
                false
            } else {
                true
            }
        });
    }

    async fn process_notifications(
        registry: Arc<Mutex<GattRegistry>>,
        events: mpsc::UnboundedSender<AdapterEvent>,
        peripheral: PeripheralId,
        target: CharacteristicRef,
        token: &CancellationToken,
    ) {
        let characteristic = registry.lock().await.characteristic(&peripheral, &target);
        let Some(characteristic) = characteristic else {
            warn!("Notify characteristic {} is not resolved", target.uuid);
            let _ = events.send(AdapterEvent::ValueUpdated {
                peripheral,
                characteristic: target,
                result: Err(AdapterError::new("characteristic not resolved")),
            });
            return;
        };

        info!("Listening for notifications on {}...", target.uuid);
        let mut stream = match characteristic.notify().await {
            Ok(stream) => stream,
            Err(e) => {
                error!("Failed to subscribe to notifications: {}", e);
                let _ = events.send(AdapterEvent::ValueUpdated {
                    peripheral,
                    characteristic: target,
                    result: Err(e.into()),
                });
                return;
            }
        };

        loop {
            tokio::select! {
                item = stream.next() => {
                    let Some(item) = item else { break };
                    let result = item.map_err(AdapterError::from);
                    if let Ok(value) = &result {
                        debug!("Received notification: {:?}", value);
                    }
                    let event = AdapterEvent::ValueUpdated {
                        peripheral: peripheral.clone(),
                        characteristic: target,
                        result,
                    };
                    if events.send(event).is_err() {
                        break;
                    }
                }
                _ = token.cancelled() => break,
            }
        }

        info!("Notification stream ended");
    }
}
