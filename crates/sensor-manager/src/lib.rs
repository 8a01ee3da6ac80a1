//! Sensor Manager for Buffered Air-Quality Polling
//!
//! Builds one driver per configured sensor, activates them, and polls every
//! declared measurement into a shared ring of measurement slots with a
//! fill-threshold reset.

mod factory;
mod manager;
mod ports;

pub use factory::{FactoryError, SensorFactory, HARDWARE_SERIAL_PORTS, I2C_BUSES};
pub use manager::{
    Activation, ManagerConfig, ManagerError, MeasurementManager, MeasurementRing, SensorHealth,
};
pub use ports::{BusMapping, HostPorts, PinPairMapping, PortMapping, PortResolver, SerialSelector};
