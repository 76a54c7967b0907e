//! Computations served to callers.
//!
//! - [`records`]: caller-facing member records
//! - [`members`]: arranged membership listing of a node
//! - [`recommend`]: recommended children and objects
//! - [`classify`]: classification of members into starred siblings and relocation
//! - [`edit`]: node flag updates, member adoption and sorted counts

pub mod classify;
pub mod edit;
pub mod members;
pub mod recommend;
pub mod records;
