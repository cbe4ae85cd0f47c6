//! Incremental monthly loader: uploads at most one month of sales rows that the
//! destination table does not hold yet, once per run.

pub mod config;
pub mod dataset;
pub mod duck;
pub mod error;
pub mod logging;
pub mod partition;
pub mod pipeline;
pub mod warehouse;
