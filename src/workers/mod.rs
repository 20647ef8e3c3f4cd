pub mod registry_maintenance;

pub use registry_maintenance::RegistryMaintenanceWorker;
