//! `sibas-sources`: adapters from upstream documents to source partitions.
//!
//! Every adapter takes text that has already been fetched or read; none of
//! them perform I/O. Malformed records are skipped here and never reach the
//! engine.

pub mod as2org;
pub mod asn;
pub mod delegated;
pub mod error;
pub mod ipv6_launch;
pub mod peeringdb;
pub mod whois;

pub use error::SourceError;
