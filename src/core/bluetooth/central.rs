//! Outbound side of the adapter boundary.

use uuid::Uuid;

use crate::core::bluetooth::types::{CharacteristicRef, PeripheralHandle, ServiceRef};

/// Requests the controller can make of the platform radio.
///
/// Every method is fire-and-forget: it returns immediately and its outcome comes
/// back later as an [`AdapterEvent`](crate::core::bluetooth::AdapterEvent).
/// An empty filter slice means "no filter".
pub trait Central {
    fn start_scan(&mut self, services: &[Uuid]);

    fn stop_scan(&mut self);

    fn connect(&mut self, peripheral: &PeripheralHandle);

    fn cancel_connection(&mut self, peripheral: &PeripheralHandle);

    fn discover_services(&mut self, peripheral: &PeripheralHandle, services: &[Uuid]);

    fn discover_characteristics(
        &mut self,
        peripheral: &PeripheralHandle,
        service: &ServiceRef,
        characteristics: &[Uuid],
    );

    fn set_notify(
        &mut self,
        peripheral: &PeripheralHandle,
        characteristic: &CharacteristicRef,
        enabled: bool,
    );

    /// Acknowledged write.
    fn write_with_response(
        &mut self,
        peripheral: &PeripheralHandle,
        characteristic: &CharacteristicRef,
        payload: &[u8],
    );
}
