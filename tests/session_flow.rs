//! End-to-end session tests for the event loop.
//!
//! A scripted central answers every request through the adapter event queue,
//! the way the bluest backend does, so the whole scan → connect → resolve →
//! write → notify → disconnect flow runs without a radio.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use ble_lock_central_lib::core::bluetooth::{
    AdapterError, AdapterEvent, Advertisement, Central, CharacteristicRef, PeripheralHandle,
    PeripheralId, RadioState, ServiceRef, SessionState, UUID_LOCK_NOTIFY_CHAR, UUID_LOCK_SERVICE,
    UUID_LOCK_WRITE_CHAR,
};
use ble_lock_central_lib::config::session_config::WriteMode;
use ble_lock_central_lib::{AppConfig, BluetoothManager, ControlHandle, ObservableModel};
use tokio::sync::mpsc;
use tokio::time::timeout;
use uuid::Uuid;

const PERIPHERAL: &str = "AA:BB:CC:DD:EE:FF";

fn id() -> PeripheralId {
    PeripheralId::new(PERIPHERAL)
}

fn notify_char() -> CharacteristicRef {
    CharacteristicRef {
        service: UUID_LOCK_SERVICE,
        uuid: UUID_LOCK_NOTIFY_CHAR,
    }
}

/// Answers requests like a cooperative lock peripheral
struct ScriptedCentral {
    events: mpsc::UnboundedSender<AdapterEvent>,
    writes: Arc<Mutex<Vec<Vec<u8>>>>,
    fail_writes: bool,
}

impl Central for ScriptedCentral {
    fn start_scan(&mut self, services: &[Uuid]) {
        assert_eq!(services, &[UUID_LOCK_SERVICE]);
        for (name, peripheral) in [("kitchen-sensor", "11:22:33:44:55:66"), ("esp-test-device", PERIPHERAL)] {
            let _ = self.events.send(AdapterEvent::PeripheralDiscovered {
                peripheral: PeripheralHandle::new(PeripheralId::new(peripheral), None, None),
                advertisement: Advertisement::with_local_name(name),
                rssi: Some(-55),
            });
        }
    }

    fn stop_scan(&mut self) {}

    fn connect(&mut self, peripheral: &PeripheralHandle) {
        let _ = self.events.send(AdapterEvent::Connected {
            peripheral: peripheral.id().clone(),
        });
    }

    fn cancel_connection(&mut self, peripheral: &PeripheralHandle) {
        let _ = self.events.send(AdapterEvent::Disconnected {
            peripheral: peripheral.id().clone(),
            error: None,
        });
    }

    fn discover_services(&mut self, peripheral: &PeripheralHandle, services: &[Uuid]) {
        let _ = self.events.send(AdapterEvent::ServicesDiscovered {
            peripheral: peripheral.id().clone(),
            result: Ok(services.iter().map(|uuid| ServiceRef { uuid: *uuid }).collect()),
        });
    }

    fn discover_characteristics(
        &mut self,
        peripheral: &PeripheralHandle,
        service: &ServiceRef,
        _characteristics: &[Uuid],
    ) {
        // Split across two batches, notify first.
        for uuid in [UUID_LOCK_NOTIFY_CHAR, UUID_LOCK_WRITE_CHAR] {
            let _ = self.events.send(AdapterEvent::CharacteristicsDiscovered {
                peripheral: peripheral.id().clone(),
                service: *service,
                result: Ok(vec![CharacteristicRef {
                    service: service.uuid,
                    uuid,
                }]),
            });
        }
    }

    fn set_notify(&mut self, _: &PeripheralHandle, characteristic: &CharacteristicRef, _: bool) {
        assert_eq!(characteristic.uuid, UUID_LOCK_NOTIFY_CHAR);
    }

    fn write_with_response(
        &mut self,
        peripheral: &PeripheralHandle,
        characteristic: &CharacteristicRef,
        payload: &[u8],
    ) {
        self.writes.lock().unwrap().push(payload.to_vec());
        let result = if self.fail_writes {
            Err(AdapterError::new("write not permitted"))
        } else {
            Ok(())
        };
        let _ = self.events.send(AdapterEvent::WriteCompleted {
            peripheral: peripheral.id().clone(),
            characteristic: *characteristic,
            result,
        });
    }
}

struct Harness {
    control: ControlHandle,
    events: mpsc::UnboundedSender<AdapterEvent>,
    writes: Arc<Mutex<Vec<Vec<u8>>>>,
    event_loop: tokio::task::JoinHandle<
        anyhow::Result<ble_lock_central_lib::ConnectionController<ScriptedCentral>>,
    >,
}

fn start(config: AppConfig, fail_writes: bool) -> Harness {
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let writes = Arc::new(Mutex::new(Vec::new()));
    let central = ScriptedCentral {
        events: events_tx.clone(),
        writes: writes.clone(),
        fail_writes,
    };
    let (manager, control) = BluetoothManager::new(central, events_rx, &config).unwrap();
    Harness {
        control,
        events: events_tx,
        writes,
        event_loop: tokio::spawn(manager.run()),
    }
}

async fn wait_until(control: &ControlHandle, what: &str, check: impl Fn(&ObservableModel) -> bool) {
    let mut rx = control.subscribe();
    timeout(Duration::from_secs(2), rx.wait_for(|model| check(model)))
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {}", what))
        .expect("model sender dropped");
}

fn has_line(model: &ObservableModel, line: &str) -> bool {
    model.log.iter().any(|l| l == line)
}

async fn power_on_and_connect(h: &Harness) {
    h.events
        .send(AdapterEvent::RadioStateChanged(RadioState::PoweredOn))
        .unwrap();
    wait_until(&h.control, "radio", |m| has_line(m, "poweredOn")).await;

    h.control.scan().unwrap();
    wait_until(&h.control, "ready", |m| m.is_connected && has_line(m, "ready")).await;
}

#[tokio::test]
async fn full_session_reaches_ready_and_toggles() {
    let h = start(AppConfig::default(), false);
    power_on_and_connect(&h).await;

    h.control.write().unwrap();
    wait_until(&h.control, "write ack", |m| has_line(m, "write acknowledged")).await;
    assert!(h.control.model().is_locked);
    assert_eq!(*h.writes.lock().unwrap(), vec![b"ON".to_vec()]);

    h.events
        .send(AdapterEvent::ValueUpdated {
            peripheral: id(),
            characteristic: notify_char(),
            result: Ok(b"ON".to_vec()),
        })
        .unwrap();
    wait_until(&h.control, "notification", |m| m.log == vec!["ON".to_string()]).await;

    h.control.disconnect().unwrap();
    wait_until(&h.control, "disconnect", |m| !m.is_connected).await;

    h.control.shutdown().unwrap();
    let controller = h.event_loop.await.unwrap().unwrap();
    assert_eq!(controller.session_state(), SessionState::Idle);
    assert!(controller.peripheral().is_none());
}

#[tokio::test]
async fn scan_before_power_on_does_nothing() {
    let h = start(AppConfig::default(), false);
    h.control.scan().unwrap();
    h.events
        .send(AdapterEvent::RadioStateChanged(RadioState::PoweredOff))
        .unwrap();
    wait_until(&h.control, "radio", |m| has_line(m, "poweredOff")).await;

    h.control.shutdown().unwrap();
    let controller = h.event_loop.await.unwrap().unwrap();
    assert_eq!(controller.snapshot().log, vec!["poweredOff".to_string()]);
    assert_eq!(controller.session_state(), SessionState::Idle);
}

#[tokio::test]
async fn failed_write_keeps_optimistic_lock_state() {
    let h = start(AppConfig::default(), true);
    power_on_and_connect(&h).await;

    h.control.write().unwrap();
    wait_until(&h.control, "write error", |m| {
        has_line(m, "error: write not permitted")
    })
    .await;
    assert!(h.control.model().is_locked);

    h.control.shutdown().unwrap();
    h.event_loop.await.unwrap().unwrap();
}

#[tokio::test]
async fn confirmed_mode_keeps_lock_state_on_failed_write() {
    let mut config = AppConfig::default();
    config.session.write_mode = WriteMode::Confirmed;
    let h = start(config, true);
    power_on_and_connect(&h).await;

    h.control.write().unwrap();
    wait_until(&h.control, "write error", |m| {
        has_line(m, "error: write not permitted")
    })
    .await;
    assert!(!h.control.model().is_locked);
    assert_eq!(*h.writes.lock().unwrap(), vec![b"ON".to_vec()]);

    h.control.shutdown().unwrap();
    h.event_loop.await.unwrap().unwrap();
}

#[tokio::test]
async fn link_loss_returns_to_idle_and_allows_rescan() {
    let h = start(AppConfig::default(), false);
    power_on_and_connect(&h).await;

    h.events
        .send(AdapterEvent::Disconnected {
            peripheral: id(),
            error: None,
        })
        .unwrap();
    wait_until(&h.control, "link loss", |m| {
        !m.is_connected && m.log.last().map(String::as_str) == Some("disconnected")
    })
    .await;

    h.control.scan().unwrap();
    wait_until(&h.control, "reconnect", |m| m.is_connected).await;

    h.control.shutdown().unwrap();
    h.event_loop.await.unwrap().unwrap();
}
