//! Test double for the [`Central`] boundary.

use uuid::Uuid;

use crate::core::bluetooth::central::Central;
use crate::core::bluetooth::types::{CharacteristicRef, PeripheralHandle, PeripheralId, ServiceRef};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    StartScan(Vec<Uuid>),
    StopScan,
    Connect(PeripheralId),
    CancelConnection(PeripheralId),
    DiscoverServices(PeripheralId, Vec<Uuid>),
    DiscoverCharacteristics(PeripheralId, ServiceRef, Vec<Uuid>),
    SetNotify(PeripheralId, CharacteristicRef, bool),
    Write {
        peripheral: PeripheralId,
        characteristic: CharacteristicRef,
        payload: Vec<u8>,
    },
}

/// Records every request in order and never answers.
#[derive(Debug, Default)]
pub struct RecordingCentral {
    pub requests: Vec<Request>,
}

impl Central for RecordingCentral {
    fn start_scan(&mut self, services: &[Uuid]) {
        self.requests.push(Request::StartScan(services.to_vec()));
    }

    fn stop_scan(&mut self) {
        self.requests.push(Request::StopScan);
    }

    fn connect(&mut self, peripheral: &PeripheralHandle) {
        self.requests.push(Request::Connect(peripheral.id().clone()));
    }

    fn cancel_connection(&mut self, peripheral: &PeripheralHandle) {
        self.requests
            .push(Request::CancelConnection(peripheral.id().clone()));
    }

    fn discover_services(&mut self, peripheral: &PeripheralHandle, services: &[Uuid]) {
        self.requests.push(Request::DiscoverServices(
            peripheral.id().clone(),
            services.to_vec(),
        ));
    }

    fn discover_characteristics(
        &mut self,
        peripheral: &PeripheralHandle,
        service: &ServiceRef,
        characteristics: &[Uuid],
    ) {
        self.requests.push(Request::DiscoverCharacteristics(
            peripheral.id().clone(),
            *service,
            characteristics.to_vec(),
        ));
    }

    fn set_notify(
        &mut self,
        peripheral: &PeripheralHandle,
        characteristic: &CharacteristicRef,
        enabled: bool,
    ) {
        self.requests.push(Request::SetNotify(
            peripheral.id().clone(),
            *characteristic,
            enabled,
        ));
    }

    fn write_with_response(
        &mut self,
        peripheral: &PeripheralHandle,
        characteristic: &CharacteristicRef,
        payload: &[u8],
    ) {
        self.requests.push(Request::Write {
            peripheral: peripheral.id().clone(),
            characteristic: *characteristic,
            payload: payload.to_vec(),
        });
    }
}
