//! Landing-zone network topology compiler
//!
//! Compiles declarative multi-account network configuration into abstract
//! resource graphs and runs the phased output resolution that links them
//! across accounts: transit routers, networks, cross-account sharing and
//! peering.

pub mod domain;
pub mod errors;
pub mod jetstream;
pub mod limiter;
pub mod nats;
pub mod output_bus;
pub mod phase;
pub mod registry;
pub mod resolve;
pub mod state_machine;
pub mod subjects;
pub mod tagging;
pub mod topology;

// Re-export commonly used types
pub use domain::{AccountDirectory, LandingZoneConfig, NetworkConfig};
pub use errors::{ConfigurationError, LandingZoneError, LandingZoneResult, MissingReference};
pub use limiter::{Limiter, QuotaCeiling, QuotaKind};
pub use nats::NatsConfig;
pub use output_bus::{
    InMemoryOutputStore, JsonFileOutputStore, NatsOutputStore, OutputBus, OutputFilter,
    OutputRecord, OutputStore, OutputType,
};
pub use phase::{run_phase, Phase, PhaseContext, PhaseReport};
pub use resolve::{resolve, ResolvedNetwork};
pub use tagging::{apply_shared_resource_tags, TagApplier};
pub use topology::graph::{LogicalId, Resource, ResourceGraph, ResourceRef};
pub use topology::{build, NetworkHandle};
