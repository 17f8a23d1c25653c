//! Content-addressed contract addresses.
//!
//! An account's address is the hash of its initial state:
//!
//! ```text
//! _ split_depth:(Maybe (## 5)) special:(Maybe TickTock)
//!   code:(Maybe ^Cell) data:(Maybe ^Cell) library:(Maybe ^Cell) = StateInit;
//! ```
//!
//! Jobs never use split depth, tick-tock or libraries, so the cell is always
//! `0 0 1 1 0` with two references. The workchain is always 0.

use std::sync::Arc;

use crate::address::Address;
use crate::cell::{Cell, CellBuilder};
use crate::errors::Result;

/// Workchain every job is deployed to.
pub const JOB_WORKCHAIN: i8 = 0;

/// Build the `StateInit` cell for `(code, data)`.
pub fn state_init_cell(code: &Arc<Cell>, data: &Arc<Cell>) -> Result<Cell> {
    let mut b = CellBuilder::new();
    b.store_bit(false)? // split_depth
        .store_bit(false)? // special
        .store_maybe_ref(Some(code.clone()))?
        .store_maybe_ref(Some(data.clone()))?
        .store_bit(false)?; // library
    b.build()
}

/// Address of the account whose initial state is `(code, data)`.
pub fn derive_address(code: &Arc<Cell>, data: &Arc<Cell>) -> Result<Address> {
    let state_init = state_init_cell(code, data)?;
    Ok(Address::new(JOB_WORKCHAIN, state_init.hash()))
}
