// core/cron_protocol/src/lib.rs

//! # CRON Protocol
//!
//! Client-side codec for scheduled jobs that renew `.ton` domains from a v5
//! wallet. A job's whole configuration lives in its contract storage as a
//! cell tree; this crate builds that tree, reads it back and sizes the
//! funding it needs.
//!
//! | Concern        | Module(s)                                   |
//! |----------------|---------------------------------------------|
//! | Cells          | [`cell`], [`boc`], [`dict`]                 |
//! | Addresses      | [`address`], [`derive`]                     |
//! | Actions        | [`actions`], [`wallet`]                     |
//! | Job storage    | [`state`], [`code`]                         |
//! | Building       | [`job`]                                     |
//! | Inspection     | [`analyzer`], [`lifecycle`], [`domain`]     |
//! | Costs          | [`economics`]                               |
//!
//! ## Architecture
//!
//! Everything here is pure: callers exchange bytes and cells with the chain
//! and the signer. Reading a deployed job goes
//! `data_boc` → [`state::ContractStateRecord`] → [`analyzer::analyze`] over
//! its stored message → [`economics`] runway → [`lifecycle::JobStatus`].

pub mod actions;
pub mod address;
pub mod analyzer;
pub mod boc;
pub mod cell;
pub mod code;
pub mod derive;
pub mod dict;
pub mod domain;
pub mod economics;
pub mod errors;
pub mod job;
pub mod lifecycle;
pub mod network;
pub mod state;
pub mod wallet;

#[cfg(test)]
mod test_analyzer;
#[cfg(test)]
mod test_job;

pub use actions::{Action, ActionList, ExtendedAction, SendPayment};
pub use address::Address;
pub use analyzer::{Analysis, Analyzer};
pub use cell::{Cell, CellBuilder, CellSlice};
pub use economics::{FundingMode, JobEconomics};
pub use errors::{Error, Result};
pub use job::{build_job, JobConfig, JobDeployment, Schedule};
pub use lifecycle::{JobObservation, JobStatus};
pub use network::Network;
pub use state::ContractStateRecord;
