//! `sibas-recon`: multi-source sibling ASN reconciliation engine.
//!
//! Pure engine crate: receives pre-parsed source partitions, returns the
//! reconciled sibling groups. No network or filesystem dependencies.

pub mod config;
pub mod engine;
pub mod error;
pub mod evidence;
pub mod intra;
pub mod model;
pub mod output;
pub mod registry;

pub use config::ReconConfig;
pub use engine::{reconcile, run, ReconContext};
pub use error::ReconError;
pub use model::{
    Asn, AuxTable, Diagnostic, Group, ReconInput, ReconResult, SignalKind, SiblingGroup,
    SourcePartition,
};
pub use registry::EquivalenceRegistry;
