//! # Action-tree analyzer
//!
//! The message a job stores is wrapped by the owner's wallet in layers whose
//! exact shape is not part of this crate's contract. Instead of following a
//! schema, the analyzer visits every cell of the tree and tries to read it as
//! the start of a bounceable internal message:
//!
//! ```text
//! 0 1 1 0 00 | addr_std dest | …
//! ^ ^ ^ ^ ^^
//! | | | | src = addr_none
//! | | | bounced = 0
//! | | bounce = 1
//! | ihr_disabled = 1
//! int_msg_info$0
//! ```
//!
//! Only descendants of the root are tried; the root is the stored message
//! itself. A matching cell contributes its destination: the relay address
//! marks the job as self-funding, anything else is a managed domain. Cells
//! that do not match, including truncated ones, are opaque and only their
//! children are visited. Nothing in here returns an error.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, trace};

use crate::address::Address;
use crate::boc;
use crate::cell::{Cell, MAX_DEPTH};
use crate::errors::Result;

/// First six bits of a bounceable internal message with an empty source.
pub const BOUNCEABLE_MESSAGE_PREFIX: u128 = 0b011000;
const PREFIX_BITS: usize = 6;

/// Facts recovered from a job's message tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Analysis {
    /// Renewal destinations in first-seen order, without duplicates.
    pub domains: Vec<Address>,
    /// Whether a message to the relay was found anywhere in the tree.
    pub self_funding: bool,
    /// Branches abandoned at the depth cap; non-zero means `domains` may be partial.
    pub truncated_branches: usize,
}

/// Outcome of inspecting a single cell.
enum Node {
    Message { dest: Address },
    Opaque,
}

fn read_header(cell: &Cell) -> Result<Option<Address>> {
    let mut s = cell.parse();
    if s.load_uint(PREFIX_BITS)? != BOUNCEABLE_MESSAGE_PREFIX {
        return Ok(None);
    }
    s.load_address().map(Some)
}

fn classify(cell: &Cell) -> Node {
    match read_header(cell) {
        Ok(Some(dest)) => Node::Message { dest },
        Ok(None) | Err(_) => Node::Opaque,
    }
}

/// Depth-capped visitor accumulating an [`Analysis`].
#[derive(Debug, Clone)]
pub struct Analyzer {
    relay: Address,
    max_depth: u16,
}

impl Analyzer {
    pub fn new(relay: Address) -> Self {
        Analyzer {
            relay,
            max_depth: MAX_DEPTH,
        }
    }

    /// Lower the depth cap (the root is depth 0).
    pub fn with_max_depth(mut self, max_depth: u16) -> Self {
        self.max_depth = max_depth.min(MAX_DEPTH);
        self
    }

    pub fn analyze(&self, root: &Arc<Cell>) -> Analysis {
        let mut acc = Accumulator::default();
        // Shallowest depth each cell has been expanded at. A shared sub-tree
        // reached again closer to the root is walked again, since the cap may
        // have cut it short the first time.
        let mut shallowest: HashMap<[u8; 32], u16> = HashMap::new();
        // Pre-order: children are pushed in reverse so the first ref is visited first.
        let mut stack: Vec<(Arc<Cell>, u16)> = vec![(root.clone(), 0)];

        while let Some((cell, depth)) = stack.pop() {
            if shallowest.get(&cell.hash()).is_some_and(|&seen| seen <= depth) {
                continue;
            }
            shallowest.insert(cell.hash(), depth);
            if depth > 0 {
                match classify(&cell) {
                    Node::Message { dest } => acc.record(dest, &self.relay),
                    Node::Opaque => trace!(depth, bits = cell.bit_len(), "opaque cell"),
                }
            }
            if cell.refs().is_empty() {
                continue;
            }
            if depth >= self.max_depth {
                debug!(depth, "depth cap reached; abandoning branch");
                acc.analysis.truncated_branches += 1;
                continue;
            }
            for child in cell.refs().iter().rev() {
                stack.push((child.clone(), depth + 1));
            }
        }

        acc.analysis
    }

    /// Analyze a serialized tree; undecodable input yields an empty analysis.
    pub fn analyze_boc(&self, bytes: &[u8]) -> Analysis {
        match boc::decode(bytes) {
            Ok(root) => self.analyze(&root),
            Err(e) => {
                debug!("message tree is unreadable: {e}");
                Analysis::default()
            }
        }
    }
}

#[derive(Default)]
struct Accumulator {
    analysis: Analysis,
    seen: HashSet<Address>,
}

impl Accumulator {
    fn record(&mut self, dest: Address, relay: &Address) {
        if dest == *relay {
            self.analysis.self_funding = true;
        } else if self.seen.insert(dest) {
            self.analysis.domains.push(dest);
        }
    }
}

/// Shorthand for [`Analyzer::analyze`] with the default depth cap.
pub fn analyze(root: &Arc<Cell>, relay: &Address) -> Analysis {
    Analyzer::new(*relay).analyze(root)
}

/// Shorthand for [`Analyzer::analyze_boc`] with the default depth cap.
pub fn analyze_boc(bytes: &[u8], relay: &Address) -> Analysis {
    Analyzer::new(*relay).analyze_boc(bytes)
}
