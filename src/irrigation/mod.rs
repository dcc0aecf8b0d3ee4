pub mod service;

pub use service::IrrigationService;
