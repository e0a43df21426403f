//! Command line frontend for [`bucketops_client`].
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod observability;
