//! Role-scoped projections over fetched request collections.
//!
//! Each board is a pure filter parameterized by the signed-in identity; nothing
//! here performs I/O. Callers re-fetch through the gateway after every mutation
//! and re-project, so a board never outlives the response it was built from.

pub mod approver;
pub mod finance;
pub mod staff;
