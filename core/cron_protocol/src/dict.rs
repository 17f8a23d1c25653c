//! Key enumeration for `HashmapE n X` dictionaries.
//!
//! ```text
//! hm_edge#_ label:(HmLabel ~l n) node:(HashmapNode m X) = Hashmap n X;
//! hmn_leaf#_ value:X = HashmapNode 0 X;
//! hmn_fork#_ left:^(Hashmap n X) right:^(Hashmap n X) = HashmapNode (n + 1) X;
//!
//! hml_short$0 len:(Unary ~n) s:(n * Bit) = HmLabel ~n m;
//! hml_long$10 n:(#<= m) s:(n * Bit) = HmLabel ~n m;
//! hml_same$11 v:Bit n:(#<= m) = HmLabel ~n m;
//! ```
//!
//! Only keys are recovered; values are skipped.

use std::sync::Arc;

use crate::cell::{Cell, CellSlice};
use crate::errors::{malformed, Result};

/// Upper bound on the keys [`keys`] will enumerate. Forks may share child
/// cells, so a small tree can describe exponentially many keys.
pub const MAX_KEYS: usize = 1 << 16;

/// Width of an `#<= m` field.
fn len_bits(m: usize) -> usize {
    (usize::BITS - m.leading_zeros()) as usize
}

fn load_label(s: &mut CellSlice<'_>, m: usize, key: &mut Vec<bool>) -> Result<usize> {
    if !s.load_bit()? {
        // hml_short
        let mut len = 0;
        while s.load_bit()? {
            len += 1;
        }
        if len > m {
            return Err(malformed(format!("label of {len} bits exceeds {m}")));
        }
        for _ in 0..len {
            key.push(s.load_bit()?);
        }
        return Ok(len);
    }
    let same = s.load_bit()?;
    if same {
        let bit = s.load_bit()?;
        let len = s.load_uint(len_bits(m))? as usize;
        if len > m {
            return Err(malformed(format!("label of {len} bits exceeds {m}")));
        }
        key.extend(std::iter::repeat(bit).take(len));
        Ok(len)
    } else {
        let len = s.load_uint(len_bits(m))? as usize;
        if len > m {
            return Err(malformed(format!("label of {len} bits exceeds {m}")));
        }
        for _ in 0..len {
            key.push(s.load_bit()?);
        }
        Ok(len)
    }
}

fn pack(bits: &[bool]) -> Vec<u8> {
    let mut out = vec![0u8; bits.len().div_ceil(8)];
    for (i, bit) in bits.iter().enumerate() {
        if *bit {
            out[i / 8] |= 0x80 >> (i % 8);
        }
    }
    out
}

/// Keys of the non-empty dictionary rooted at `root`, in ascending order.
///
/// Each key is `key_bits` long, packed big-endian and left-aligned.
pub fn keys(root: &Arc<Cell>, key_bits: usize) -> Result<Vec<Vec<u8>>> {
    let mut out = Vec::new();
    // (edge cell, key prefix, remaining key bits)
    let mut stack: Vec<(Arc<Cell>, Vec<bool>, usize)> = vec![(root.clone(), Vec::new(), key_bits)];

    while let Some((cell, mut prefix, m)) = stack.pop() {
        let mut s = cell.parse();
        let len = load_label(&mut s, m, &mut prefix)?;
        let rest = m - len;
        if rest == 0 {
            if out.len() == MAX_KEYS {
                return Err(malformed(format!("dictionary has more than {MAX_KEYS} keys")));
            }
            out.push(pack(&prefix));
            continue;
        }
        let left = s.load_ref()?;
        let right = s.load_ref()?;
        let mut right_key = prefix.clone();
        right_key.push(true);
        prefix.push(false);
        stack.push((right, right_key, rest - 1));
        stack.push((left, prefix, rest - 1));
    }

    Ok(out)
}

/// 256-bit keys, the layout wallets use for their extension sets.
pub fn keys_256(root: &Arc<Cell>) -> Result<Vec<[u8; 32]>> {
    keys(root, 256)?
        .into_iter()
        .map(|k| {
            <[u8; 32]>::try_from(k.as_slice()).map_err(|_| malformed("key is not 256 bits"))
        })
        .collect()
}

/// Build a dictionary of 256-bit keys with one-bit `true` values.
#[cfg(test)]
pub(crate) fn build_256(keys: &[[u8; 32]]) -> Arc<Cell> {
    use crate::cell::CellBuilder;

    fn bit(key: &[u8; 32], i: usize) -> bool {
        key[i / 8] & (0x80 >> (i % 8)) != 0
    }

    fn edge(keys: &[[u8; 32]], offset: usize) -> Arc<Cell> {
        let m = 256 - offset;
        let first = &keys[0];
        let mut common = m;
        for k in &keys[1..] {
            let same = (0..m).take_while(|&i| bit(first, offset + i) == bit(k, offset + i)).count();
            common = common.min(same);
        }

        let mut b = CellBuilder::new();
        b.store_bit(true).unwrap().store_bit(false).unwrap(); // hml_long
        b.store_uint(common as u128, len_bits(m)).unwrap();
        for i in 0..common {
            b.store_bit(bit(first, offset + i)).unwrap();
        }
        if common == m {
            b.store_bit(true).unwrap();
        } else {
            let split = offset + common;
            let (left, right): (Vec<_>, Vec<_>) = keys.iter().copied().partition(|k| !bit(k, split));
            b.store_ref(edge(&left, split + 1)).unwrap();
            b.store_ref(edge(&right, split + 1)).unwrap();
        }
        Arc::new(b.build().unwrap())
    }

    let mut sorted = keys.to_vec();
    sorted.sort();
    sorted.dedup();
    edge(&sorted, 0)
}
