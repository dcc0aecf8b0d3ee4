pub mod service;

pub use service::PumpControlService;
