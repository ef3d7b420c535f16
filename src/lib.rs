//! Chart aggregation and roster filtering for the staff wellbeing dashboard.
//!
//! Every function here is pure: callers hand in already-fetched records and a reference
//! instant, and get plain values back.

pub mod aggregate;
pub mod cohort;
pub mod format;
pub mod models;
pub mod range;
pub mod report;
pub mod roster;
pub mod source;
