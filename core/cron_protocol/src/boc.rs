//! # Bag of cells
//!
//! Byte framing for cell trees, as returned by indexers in `data_boc` fields
//! and as expected by wallets:
//!
//! ```text
//! magic      b5ee9c72
//! flags      has_idx:1 has_crc32c:1 has_cache_bits:1 flags:2 size:3
//! off_bytes  u8
//! cells      size bytes        roots   size bytes
//! absent     size bytes        total   off_bytes bytes
//! root_list  roots × size bytes
//! index      cells × off_bytes (only when has_idx)
//! cell_data  per cell: d1 d2 padded_data ref_index × size
//! crc32c     4 bytes little-endian (only when has_crc32c)
//! ```
//!
//! Cells are written parents-first with identical sub-trees stored once, so a
//! reference always points at a later index. The decoder relies on that to
//! rebuild the tree bottom-up without recursion.

use std::collections::HashMap;
use std::sync::Arc;

use crc::{Crc, CRC_32_ISCSI};
use tracing::trace;

use crate::cell::{Cell, MAX_REFS};
use crate::errors::{malformed, Error, Result};

const BOC_MAGIC: [u8; 4] = [0xb5, 0xee, 0x9c, 0x72];
const CRC32C: Crc<u32> = Crc::<u32>::new(&CRC_32_ISCSI);

const FLAG_HAS_IDX: u8 = 0x80;
const FLAG_HAS_CRC32C: u8 = 0x40;

// ─────────────────────────────────────────────────────────
// Encoding
// ─────────────────────────────────────────────────────────

/// Serialize a single-root tree with a CRC32C trailer and no index.
pub fn encode(root: &Cell) -> Vec<u8> {
    let order = topological_order(root);
    let index: HashMap<[u8; 32], usize> = order
        .iter()
        .enumerate()
        .map(|(i, cell)| (cell.hash(), i))
        .collect();

    let size_bytes = bytes_for(order.len() as u64);
    let mut cell_data = Vec::new();
    for cell in &order {
        cell_data.push(cell.d1());
        cell_data.push(cell.d2());
        cell_data.extend(cell.padded_data());
        for r in cell.refs() {
            let i = index[&r.hash()];
            write_be(&mut cell_data, i as u64, size_bytes);
        }
    }
    let off_bytes = bytes_for(cell_data.len() as u64);

    let mut out = Vec::with_capacity(cell_data.len() + 32);
    out.extend_from_slice(&BOC_MAGIC);
    out.push(FLAG_HAS_CRC32C | size_bytes as u8);
    out.push(off_bytes as u8);
    write_be(&mut out, order.len() as u64, size_bytes);
    write_be(&mut out, 1, size_bytes);
    write_be(&mut out, 0, size_bytes);
    write_be(&mut out, cell_data.len() as u64, off_bytes);
    write_be(&mut out, 0, size_bytes);
    out.extend(cell_data);
    let crc = CRC32C.checksum(&out);
    out.extend_from_slice(&crc.to_le_bytes());
    out
}

/// Base64 (standard alphabet) of [`encode`], the form indexers and wallets exchange.
pub fn encode_base64(root: &Cell) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(encode(root))
}

/// Reverse post-order of a DFS: parents before children, shared cells once.
fn topological_order(root: &Cell) -> Vec<&Cell> {
    let mut visited: HashMap<[u8; 32], ()> = HashMap::new();
    let mut post = Vec::new();
    // (cell, next child to visit)
    let mut stack: Vec<(&Cell, usize)> = vec![(root, 0)];
    visited.insert(root.hash(), ());
    while let Some((cell, next)) = stack.pop() {
        if let Some(child) = cell.refs().get(next) {
            stack.push((cell, next + 1));
            if visited.insert(child.hash(), ()).is_none() {
                stack.push((child.as_ref(), 0));
            }
        } else {
            post.push(cell);
        }
    }
    post.reverse();
    post
}

fn bytes_for(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    bits.div_ceil(8).max(1)
}

fn write_be(out: &mut Vec<u8>, value: u64, width: usize) {
    out.extend_from_slice(&value.to_be_bytes()[8 - width..]);
}

// ─────────────────────────────────────────────────────────
// Decoding
// ─────────────────────────────────────────────────────────

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| {
                malformed(format!(
                    "unexpected end of buffer at byte {} (wanted {n} more, have {})",
                    self.pos,
                    self.bytes.len() - self.pos
                ))
            })?;
        let out = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn byte(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn uint(&mut self, width: usize) -> Result<u64> {
        Ok(self
            .take(width)?
            .iter()
            .fold(0u64, |acc, b| (acc << 8) | *b as u64))
    }
}

struct RawCell {
    data: Vec<u8>,
    bit_len: usize,
    refs: Vec<usize>,
}

/// Parse a serialized tree and return its first root.
pub fn decode(bytes: &[u8]) -> Result<Arc<Cell>> {
    let mut roots = decode_all(bytes)?;
    if roots.is_empty() {
        return Err(malformed("bag of cells has no roots"));
    }
    Ok(roots.swap_remove(0))
}

/// Decode standard base64, then [`decode`].
pub fn decode_base64(text: &str) -> Result<Arc<Cell>> {
    use base64::Engine;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(text.trim())
        .map_err(|e| malformed(format!("invalid base64: {e}")))?;
    decode(&bytes)
}

/// Parse a serialized tree and return every root, in root-list order.
pub fn decode_all(bytes: &[u8]) -> Result<Vec<Arc<Cell>>> {
    let mut r = Reader { bytes, pos: 0 };
    if r.take(4)? != BOC_MAGIC {
        return Err(malformed("bad bag-of-cells magic"));
    }
    let flags = r.byte()?;
    let size = (flags & 0x07) as usize;
    if !(1..=4).contains(&size) {
        return Err(malformed(format!("invalid reference size {size}")));
    }
    let off_bytes = r.byte()? as usize;
    if !(1..=8).contains(&off_bytes) {
        return Err(malformed(format!("invalid offset size {off_bytes}")));
    }
    let cell_count = r.uint(size)? as usize;
    let root_count = r.uint(size)? as usize;
    let absent = r.uint(size)?;
    let total = r.uint(off_bytes)? as usize;
    if absent != 0 {
        return Err(malformed("absent cells are not supported"));
    }
    if root_count > cell_count {
        return Err(malformed("more roots than cells"));
    }
    // Every cell takes at least its two descriptor bytes.
    if cell_count.saturating_mul(2) > bytes.len() {
        return Err(malformed(format!("{cell_count} cells cannot fit in {} bytes", bytes.len())));
    }

    let mut root_indices = Vec::with_capacity(root_count);
    for _ in 0..root_count {
        let i = r.uint(size)? as usize;
        if i >= cell_count {
            return Err(malformed(format!("root index {i} out of range")));
        }
        root_indices.push(i);
    }
    if flags & FLAG_HAS_IDX != 0 {
        r.take(cell_count.saturating_mul(off_bytes))?;
    }

    let data_start = r.pos;
    let mut raw = Vec::with_capacity(cell_count.min(bytes.len()));
    for index in 0..cell_count {
        raw.push(read_raw_cell(&mut r, index, cell_count, size)?);
    }
    if r.pos - data_start != total {
        return Err(malformed(format!(
            "cell data is {} bytes, header declares {total}",
            r.pos - data_start
        )));
    }

    if flags & FLAG_HAS_CRC32C != 0 {
        let body_end = r.pos;
        let stored = r.take(4)?;
        let expected = u32::from_le_bytes([stored[0], stored[1], stored[2], stored[3]]);
        if CRC32C.checksum(&bytes[..body_end]) != expected {
            return Err(malformed("crc32c mismatch"));
        }
    }

    // Children always have higher indices, so build from the back.
    let mut built: Vec<Option<Arc<Cell>>> = vec![None; cell_count];
    for index in (0..cell_count).rev() {
        let RawCell {
            data,
            bit_len,
            refs,
        } = std::mem::replace(
            &mut raw[index],
            RawCell {
                data: Vec::new(),
                bit_len: 0,
                refs: Vec::new(),
            },
        );
        let children = refs
            .iter()
            .map(|i| {
                built[*i]
                    .clone()
                    .ok_or_else(|| malformed(format!("cell {index} references unbuilt cell {i}")))
            })
            .collect::<Result<Vec<_>>>()?;
        built[index] = Some(Arc::new(Cell::from_parts(data, bit_len, children)?));
    }

    trace!(cells = cell_count, roots = root_count, "decoded bag of cells");
    root_indices
        .into_iter()
        .map(|i| built[i].clone().ok_or_else(|| malformed("root was not built")))
        .collect()
}

fn read_raw_cell(r: &mut Reader<'_>, index: usize, cell_count: usize, size: usize) -> Result<RawCell> {
    let d1 = r.byte()?;
    let d2 = r.byte()?;
    let ref_count = (d1 & 0x07) as usize;
    if d1 & 0x08 != 0 || d1 >> 5 != 0 {
        return Err(malformed(format!("cell {index}: exotic or leveled cells are not supported")));
    }
    if ref_count > MAX_REFS {
        return Err(malformed(format!("cell {index}: {ref_count} refs")));
    }
    if d1 & 0x10 != 0 {
        return Err(malformed(format!("cell {index}: stored hashes are not supported")));
    }

    let byte_len = (d2 as usize).div_ceil(2);
    let mut data = r.take(byte_len)?.to_vec();
    let bit_len = if d2 % 2 == 0 {
        byte_len * 8
    } else {
        let last = data.last().copied().unwrap_or(0);
        if last == 0 {
            return Err(malformed(format!("cell {index}: missing completion tag")));
        }
        let tag_pos = last.trailing_zeros() as usize;
        if let Some(l) = data.last_mut() {
            *l &= !(1u8 << tag_pos);
        }
        byte_len * 8 - tag_pos - 1
    };

    let mut refs = Vec::with_capacity(ref_count);
    for _ in 0..ref_count {
        let child = r.uint(size)? as usize;
        if child <= index || child >= cell_count {
            return Err(malformed(format!(
                "cell {index}: reference {child} is not a later cell"
            )));
        }
        refs.push(child);
    }

    if bit_len > crate::cell::MAX_DATA_BITS {
        return Err(Error::CellOverflow {
            bits: bit_len,
            refs: ref_count,
        });
    }
    Ok(RawCell {
        data,
        bit_len,
        refs,
    })
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::{CellBuilder, MAX_DEPTH};

    fn leaf(v: u128, bits: usize) -> Arc<Cell> {
        let mut b = CellBuilder::new();
        b.store_uint(v, bits).unwrap();
        Arc::new(b.build().unwrap())
    }

    #[test]
    fn tree_round_trips() {
        let shared = leaf(0x1234, 16);
        let mut mid = CellBuilder::new();
        mid.store_uint(1, 3).unwrap().store_ref(shared.clone()).unwrap();
        let mid = Arc::new(mid.build().unwrap());

        let mut root = CellBuilder::new();
        root.store_uint(0xabc, 12)
            .unwrap()
            .store_ref(mid)
            .unwrap()
            .store_ref(shared)
            .unwrap();
        let root = root.build().unwrap();

        let bytes = encode(&root);
        let back = decode(&bytes).unwrap();
        assert_eq!(back.hash(), root.hash());
        assert_eq!(back.refs().len(), 2);
        assert_eq!(back.refs()[0].refs()[0].hash(), back.refs()[1].hash());
    }

    #[test]
    fn shared_cells_are_stored_once() {
        let shared = leaf(7, 8);
        let mut root = CellBuilder::new();
        root.store_ref(shared.clone()).unwrap().store_ref(shared).unwrap();
        let bytes = encode(&root.build().unwrap());
        // header: magic(4) flags(1) off(1) cells(1)
        assert_eq!(bytes[6], 2);
    }

    #[test]
    fn embedded_job_code_decodes() {
        let code = crate::code::job_code().unwrap();
        assert_eq!(code.refs().len(), 1);
        assert!(code.depth() > 0);
    }

    #[test]
    fn truncated_buffer_is_malformed() {
        let bytes = encode(&leaf(0xff, 8));
        for len in 0..bytes.len() {
            assert!(
                matches!(decode(&bytes[..len]), Err(Error::MalformedTree(_))),
                "prefix of {len} bytes decoded"
            );
        }
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(decode(b"definitely not a bag of cells").is_err());
        assert!(decode_base64("!!!").is_err());
    }

    #[test]
    fn flipped_byte_fails_checksum() {
        let mut bytes = encode(&leaf(0xabcd, 16));
        let n = bytes.len();
        bytes[n - 6] ^= 0x01;
        assert!(decode(&bytes).is_err());
    }

    #[test]
    fn depth_beyond_limit_is_rejected() {
        let mut cell = Arc::new(Cell::empty());
        for _ in 0..MAX_DEPTH {
            let mut b = CellBuilder::new();
            b.store_ref(cell).unwrap();
            cell = Arc::new(b.build().unwrap());
        }
        assert_eq!(cell.depth(), MAX_DEPTH);
        let mut b = CellBuilder::new();
        b.store_ref(cell).unwrap();
        assert!(matches!(b.build(), Err(Error::UnsupportedDepth { .. })));
    }

    #[test]
    fn base64_round_trips() {
        let root = leaf(0b1011, 4);
        let text = encode_base64(&root);
        assert_eq!(decode_base64(&text).unwrap().hash(), root.hash());
    }
}
