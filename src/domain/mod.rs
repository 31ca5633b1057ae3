//! Domain layer: entities, interest calculation, layout
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod entities;
pub mod error;
pub mod fraction;
pub mod graph;
pub mod layout;

pub use entities::*;
pub use error::DomainError;
pub use fraction::{format_fraction, gcd, parse_percentage, to_title_case};
pub use graph::{GraphDiagnostic, OwnershipGraph, TransferShare, LEAF_EPSILON, ROOT_INTEREST};
pub use layout::{compute_layout, tiers, LayoutConfig, LayoutDirection};
