// diagnose Catalog - built-in probes and output processors

pub mod processors;
pub mod registry;
pub mod table;

pub use registry::{long_registry, system_definitions, system_registry, DRIVE_DEVICES};
