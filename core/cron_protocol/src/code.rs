//! The compiled job contract.
//!
//! Every deployed job shares this code cell; the indexer reports its hash as
//! `code_hash`, which is how job accounts are told apart from other wallet
//! extensions.

use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::boc;
use crate::cell::Cell;
use crate::errors::{malformed, Result};

const JOB_CODE_HEX: &[&str] = &[
    "b5ee9c7241020a0100028d000114ff00f4a413f4bcf2c80b01020120020902014803080236d0f891f240d72c21720e9d",
    "64e302d72c2000000004e302840ff2f0040601fc30ed44d0d200d31fd31fd31ffa00fa40d4d3ffd70b0908f2d193f827",
    "6f10821005f5e100bef2e0c825c200f2e0caf89223c705f2e0cbc000f2e0cc06c000f2e0cd25d0d70b0520c01801c010",
    "b1f2e064ed4420d76501f90026c0009636f82325a006dec8cf8317cb1f15cb1f13cb1f01fa02ce13cc21cf0bff22cf0b",
    "09c9050088ed5482080f42408d0860000000000000000000000000000000000000000000000000000000000383123f24",
    "c8cf8508ce01fa028210d027efe5cf0b8acbffcb09c971fb0001f28b764657374726f798c7058e6af897820afaf080be",
    "8e5fed44d0d20031d31f31d31f31d31f31fa0031fa4031d431d3ffd70b0982080f42408d086000000000000000000000",
    "0000000000000000000000000000000000000383123f24c8cf8508ce01fa028210d027efe5cf0b8a12cbffcb09c971fb",
    "00dee30d0700f4ed44d0d20031d31f31d31f31d31f31fa0031fa40d431d3ffd70b09f89223c705f2e19182080f42408d",
    "0860000000000000000000000000000000000000000000000000000000000383123f24c8cf8508ce01fa028210d027ef",
    "e5cf0b8a12cbffcb09c971fb00c8cf8508ce8210bbe27821cf0b8ec98100a0fb00004ba060b7da89a1a60063a63fa63f",
    "a63e63f401ae99a1020223ae43f40061f04ede20a2254142b100dcf2840fed44d0d600d31f20d31fd31f31fa00d74cf8",
    "235005bef2e19206d72c2108a3816c16f2f404fa403020d72c053121fa4430c000b0f2e190f800f8235005a003c8ce13",
    "cb1f12cec9ed5422c2008e16c8cf850812ce58fa0282102e04891acf0b8ac973fb00926c21e273fb0057a59bfe",
];

static JOB_CODE: OnceCell<Arc<Cell>> = OnceCell::new();

/// The job contract code cell, parsed once.
pub fn job_code() -> Result<Arc<Cell>> {
    JOB_CODE
        .get_or_try_init(|| {
            let bytes = hex::decode(JOB_CODE_HEX.concat())
                .map_err(|e| malformed(format!("embedded job code: {e}")))?;
            boc::decode(&bytes)
        })
        .cloned()
}

/// Hash of [`job_code`], base64 encoded as indexers report it.
pub fn job_code_hash_base64() -> Result<String> {
    use base64::Engine;
    Ok(base64::engine::general_purpose::STANDARD.encode(job_code()?.hash()))
}
