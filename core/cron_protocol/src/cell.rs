//! # Cells
//!
//! The cell is the only storage unit the job contract understands: up to
//! [`MAX_DATA_BITS`] bits of payload plus up to [`MAX_REFS`] ordered child
//! references. Every record in this crate is written with a [`CellBuilder`]
//! and read back with a [`CellSlice`].
//!
//! ## Hashing
//!
//! A cell's identity is its representation hash:
//!
//! ```text
//! sha256( d1 ‖ d2 ‖ padded_data ‖ depth(ref_i)… ‖ hash(ref_i)… )
//! ```
//!
//! where `d1 = refs_count` (ordinary cells, level 0) and
//! `d2 = floor(bits / 8) + ceil(bits / 8)`. When the bit length is not a
//! multiple of eight the payload is completed with a single `1` bit followed
//! by zeros. Hash and depth are computed once, when the cell is built, so a
//! built cell is immutable and can be shared through [`Arc`].

use std::fmt;
use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::address::Address;
use crate::errors::{malformed, Error, Result};

/// Maximum payload bits per cell.
pub const MAX_DATA_BITS: usize = 1023;
/// Maximum child references per cell.
pub const MAX_REFS: usize = 4;
/// Maximum nesting depth accepted by the builder, the decoder and the analyzer.
pub const MAX_DEPTH: u16 = 1024;

/// Width of the length prefix in the `Coins` encoding (VarUInteger 16).
const COINS_LEN_BITS: usize = 4;
/// Largest byte length representable by the `Coins` length prefix.
const COINS_MAX_BYTES: usize = 15;

// ─────────────────────────────────────────────────────────
// Cell
// ─────────────────────────────────────────────────────────

/// An immutable, hashed cell.
#[derive(Clone)]
pub struct Cell {
    data: Vec<u8>,
    bit_len: usize,
    refs: Vec<Arc<Cell>>,
    hash: [u8; 32],
    depth: u16,
}

impl Cell {
    /// Assemble a cell from a raw payload. Bits past `bit_len` are cleared.
    pub fn from_parts(mut data: Vec<u8>, bit_len: usize, refs: Vec<Arc<Cell>>) -> Result<Self> {
        if bit_len > MAX_DATA_BITS || refs.len() > MAX_REFS {
            return Err(Error::CellOverflow {
                bits: bit_len,
                refs: refs.len(),
            });
        }
        let byte_len = bit_len.div_ceil(8);
        if data.len() < byte_len {
            return Err(malformed(format!(
                "payload of {} bytes is shorter than {bit_len} bits",
                data.len()
            )));
        }
        data.truncate(byte_len);
        if bit_len % 8 != 0 {
            if let Some(last) = data.last_mut() {
                *last &= 0xffu8 << (8 - bit_len % 8);
            }
        }

        let depth = match refs.iter().map(|r| r.depth).max() {
            None => 0,
            Some(d) if d >= MAX_DEPTH => {
                return Err(Error::UnsupportedDepth {
                    depth: d + 1,
                    max: MAX_DEPTH,
                })
            }
            Some(d) => d + 1,
        };
        let hash = representation_hash(&data, bit_len, &refs);

        Ok(Cell {
            data,
            bit_len,
            refs,
            hash,
            depth,
        })
    }

    /// The cell with no payload and no references.
    pub fn empty() -> Self {
        let hash = representation_hash(&[], 0, &[]);
        Cell {
            data: Vec::new(),
            bit_len: 0,
            refs: Vec::new(),
            hash,
            depth: 0,
        }
    }

    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    /// Payload bytes; the last byte is zero-padded when `bit_len % 8 != 0`.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn refs(&self) -> &[Arc<Cell>] {
        &self.refs
    }

    pub fn hash(&self) -> [u8; 32] {
        self.hash
    }

    pub fn depth(&self) -> u16 {
        self.depth
    }

    /// Start reading the cell from its first bit and first reference.
    pub fn parse(&self) -> CellSlice<'_> {
        CellSlice {
            cell: self,
            bit_pos: 0,
            ref_pos: 0,
        }
    }

    /// First descriptor byte (reference count; ordinary level-0 cells only).
    pub(crate) fn d1(&self) -> u8 {
        self.refs.len() as u8
    }

    /// Second descriptor byte.
    pub(crate) fn d2(&self) -> u8 {
        (self.bit_len / 8 + self.bit_len.div_ceil(8)) as u8
    }

    /// Payload with the completion tag applied, as hashed and serialized.
    pub(crate) fn padded_data(&self) -> Vec<u8> {
        padded(&self.data, self.bit_len)
    }
}

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
    }
}

impl Eq for Cell {}

impl fmt::Debug for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cell")
            .field("bits", &self.bit_len)
            .field("data", &hex::encode(&self.data))
            .field("refs", &self.refs)
            .finish()
    }
}

fn padded(data: &[u8], bit_len: usize) -> Vec<u8> {
    let mut out = data.to_vec();
    if bit_len % 8 != 0 {
        if let Some(last) = out.last_mut() {
            *last |= 0x80u8 >> (bit_len % 8);
        }
    }
    out
}

fn representation_hash(data: &[u8], bit_len: usize, refs: &[Arc<Cell>]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update([refs.len() as u8, (bit_len / 8 + bit_len.div_ceil(8)) as u8]);
    hasher.update(padded(data, bit_len));
    for r in refs {
        hasher.update(r.depth.to_be_bytes());
    }
    for r in refs {
        hasher.update(r.hash);
    }
    hasher.finalize().into()
}

// ─────────────────────────────────────────────────────────
// Builder
// ─────────────────────────────────────────────────────────

/// Append-only writer producing a [`Cell`].
///
/// Every `store_*` call checks the remaining capacity first and fails with
/// [`Error::CellOverflow`] rather than truncating.
#[derive(Debug, Default, Clone)]
pub struct CellBuilder {
    data: Vec<u8>,
    bit_len: usize,
    refs: Vec<Arc<Cell>>,
}

impl CellBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    pub fn available_bits(&self) -> usize {
        MAX_DATA_BITS - self.bit_len
    }

    pub fn available_refs(&self) -> usize {
        MAX_REFS - self.refs.len()
    }

    fn ensure_bits(&self, bits: usize) -> Result<()> {
        if bits > self.available_bits() {
            return Err(Error::CellOverflow {
                bits: self.bit_len + bits,
                refs: self.refs.len(),
            });
        }
        Ok(())
    }

    fn push_bit(&mut self, bit: bool) {
        if self.bit_len % 8 == 0 {
            self.data.push(0);
        }
        if bit {
            self.data[self.bit_len / 8] |= 0x80u8 >> (self.bit_len % 8);
        }
        self.bit_len += 1;
    }

    pub fn store_bit(&mut self, bit: bool) -> Result<&mut Self> {
        self.ensure_bits(1)?;
        self.push_bit(bit);
        Ok(self)
    }

    /// Store `value` as a big-endian unsigned field of `bits` bits.
    pub fn store_uint(&mut self, value: u128, bits: usize) -> Result<&mut Self> {
        if bits > 128 || (bits < 128 && value >> bits != 0) {
            return Err(Error::ValueOutOfRange { value, bits });
        }
        self.ensure_bits(bits)?;
        for i in (0..bits).rev() {
            self.push_bit((value >> i) & 1 == 1);
        }
        Ok(self)
    }

    /// Store a two's-complement signed field.
    pub fn store_int(&mut self, value: i64, bits: usize) -> Result<&mut Self> {
        if bits == 0 || bits > 64 {
            return Err(Error::ValueOutOfRange {
                value: value.unsigned_abs() as u128,
                bits,
            });
        }
        let min = -(1i128 << (bits - 1));
        let max = (1i128 << (bits - 1)) - 1;
        if (value as i128) < min || (value as i128) > max {
            return Err(Error::ValueOutOfRange {
                value: value.unsigned_abs() as u128,
                bits,
            });
        }
        let mask = if bits == 64 { u64::MAX } else { (1u64 << bits) - 1 };
        self.store_uint(((value as u64) & mask) as u128, bits)
    }

    pub fn store_bytes(&mut self, bytes: &[u8]) -> Result<&mut Self> {
        self.ensure_bits(bytes.len() * 8)?;
        for byte in bytes {
            for i in (0..8).rev() {
                self.push_bit((byte >> i) & 1 == 1);
            }
        }
        Ok(self)
    }

    /// `addr_std$10 anycast:nothing$0 workchain_id:int8 address:bits256`
    pub fn store_address(&mut self, address: &Address) -> Result<&mut Self> {
        self.ensure_bits(267)?;
        self.store_uint(0b100, 3)?
            .store_int(address.workchain as i64, 8)?
            .store_bytes(&address.hash)
    }

    /// `addr_none$00`
    pub fn store_address_none(&mut self) -> Result<&mut Self> {
        self.store_uint(0, 2)
    }

    /// `Coins`: 4-bit byte length, then the big-endian magnitude.
    pub fn store_coins(&mut self, amount: u128) -> Result<&mut Self> {
        let byte_len = (128 - amount.leading_zeros() as usize).div_ceil(8);
        if byte_len > COINS_MAX_BYTES {
            return Err(Error::ValueOutOfRange {
                value: amount,
                bits: COINS_MAX_BYTES * 8,
            });
        }
        self.ensure_bits(COINS_LEN_BITS + byte_len * 8)?;
        self.store_uint(byte_len as u128, COINS_LEN_BITS)?
            .store_uint(amount, byte_len * 8)
    }

    pub fn store_ref(&mut self, cell: Arc<Cell>) -> Result<&mut Self> {
        if self.refs.len() >= MAX_REFS {
            return Err(Error::CellOverflow {
                bits: self.bit_len,
                refs: self.refs.len() + 1,
            });
        }
        self.refs.push(cell);
        Ok(self)
    }

    /// `Maybe ^Cell`: a presence bit followed by the reference when present.
    pub fn store_maybe_ref(&mut self, cell: Option<Arc<Cell>>) -> Result<&mut Self> {
        match cell {
            Some(cell) => {
                if self.refs.len() >= MAX_REFS {
                    return Err(Error::CellOverflow {
                        bits: self.bit_len + 1,
                        refs: self.refs.len() + 1,
                    });
                }
                self.store_bit(true)?.store_ref(cell)
            }
            None => self.store_bit(false),
        }
    }

    /// Append the payload and references of `cell` to this builder.
    pub fn store_cell_contents(&mut self, cell: &Cell) -> Result<&mut Self> {
        if cell.refs.len() > self.available_refs() {
            return Err(Error::CellOverflow {
                bits: self.bit_len + cell.bit_len,
                refs: self.refs.len() + cell.refs.len(),
            });
        }
        self.ensure_bits(cell.bit_len)?;
        let mut slice = cell.parse();
        while slice.remaining_bits() > 0 {
            let bit = slice.load_bit()?;
            self.push_bit(bit);
        }
        self.refs.extend(cell.refs.iter().cloned());
        Ok(self)
    }

    /// Snake-encoded string: bytes that fit here, the rest in a chain of refs.
    pub fn store_string_tail(&mut self, text: &str) -> Result<&mut Self> {
        self.store_snake_bytes(text.as_bytes())
    }

    fn store_snake_bytes(&mut self, bytes: &[u8]) -> Result<&mut Self> {
        let here = (self.available_bits() / 8).min(bytes.len());
        let (head, rest) = bytes.split_at(here);
        self.store_bytes(head)?;
        if !rest.is_empty() {
            let mut tail = CellBuilder::new();
            tail.store_snake_bytes(rest)?;
            self.store_ref(Arc::new(tail.build()?))?;
        }
        Ok(self)
    }

    pub fn build(self) -> Result<Cell> {
        Cell::from_parts(self.data, self.bit_len, self.refs)
    }
}

// ─────────────────────────────────────────────────────────
// Slice
// ─────────────────────────────────────────────────────────

/// Read cursor over a [`Cell`]. Every `load_*` fails with
/// [`Error::MalformedTree`] when the cursor would pass the end of the cell.
#[derive(Debug, Clone)]
pub struct CellSlice<'a> {
    cell: &'a Cell,
    bit_pos: usize,
    ref_pos: usize,
}

impl<'a> CellSlice<'a> {
    pub fn remaining_bits(&self) -> usize {
        self.cell.bit_len - self.bit_pos
    }

    pub fn remaining_refs(&self) -> usize {
        self.cell.refs.len() - self.ref_pos
    }

    fn ensure_bits(&self, bits: usize) -> Result<()> {
        if bits > self.remaining_bits() {
            return Err(malformed(format!(
                "bit cursor {} + {bits} exceeds cell length {}",
                self.bit_pos, self.cell.bit_len
            )));
        }
        Ok(())
    }

    fn next_bit(&mut self) -> bool {
        let byte = self.cell.data[self.bit_pos / 8];
        let bit = byte & (0x80u8 >> (self.bit_pos % 8)) != 0;
        self.bit_pos += 1;
        bit
    }

    pub fn load_bit(&mut self) -> Result<bool> {
        self.ensure_bits(1)?;
        Ok(self.next_bit())
    }

    pub fn load_uint(&mut self, bits: usize) -> Result<u128> {
        if bits > 128 {
            return Err(malformed(format!("cannot load a {bits}-bit integer")));
        }
        self.ensure_bits(bits)?;
        let mut value = 0u128;
        for _ in 0..bits {
            value = (value << 1) | self.next_bit() as u128;
        }
        Ok(value)
    }

    pub fn load_u32(&mut self, bits: usize) -> Result<u32> {
        let value = self.load_uint(bits)?;
        u32::try_from(value).map_err(|_| malformed("u32 field overflow"))
    }

    pub fn load_u64(&mut self, bits: usize) -> Result<u64> {
        let value = self.load_uint(bits)?;
        u64::try_from(value).map_err(|_| malformed("u64 field overflow"))
    }

    pub fn load_int(&mut self, bits: usize) -> Result<i64> {
        if bits == 0 || bits > 64 {
            return Err(malformed(format!("cannot load a {bits}-bit signed integer")));
        }
        let raw = self.load_uint(bits)? as u64;
        let shift = 64 - bits;
        Ok(((raw << shift) as i64) >> shift)
    }

    pub fn load_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        self.ensure_bits(len * 8)?;
        let mut out = Vec::with_capacity(len);
        for _ in 0..len {
            let mut byte = 0u8;
            for _ in 0..8 {
                byte = (byte << 1) | self.next_bit() as u8;
            }
            out.push(byte);
        }
        Ok(out)
    }

    pub fn load_hash(&mut self) -> Result<[u8; 32]> {
        let bytes = self.load_bytes(32)?;
        let mut out = [0u8; 32];
        out.copy_from_slice(&bytes);
        Ok(out)
    }

    /// Load a `MsgAddress`, returning `None` for `addr_none`.
    pub fn load_maybe_address(&mut self) -> Result<Option<Address>> {
        match self.load_uint(2)? {
            0b00 => Ok(None),
            0b10 => {
                if self.load_bit()? {
                    return Err(malformed("anycast addresses are not supported"));
                }
                let workchain = self.load_int(8)? as i8;
                let hash = self.load_hash()?;
                Ok(Some(Address::new(workchain, hash)))
            }
            tag => Err(malformed(format!("unsupported address tag {tag:#04b}"))),
        }
    }

    pub fn load_address(&mut self) -> Result<Address> {
        self.load_maybe_address()?
            .ok_or_else(|| malformed("expected a standard address, found addr_none"))
    }

    pub fn load_coins(&mut self) -> Result<u128> {
        let byte_len = self.load_uint(COINS_LEN_BITS)? as usize;
        self.load_uint(byte_len * 8)
    }

    pub fn load_ref(&mut self) -> Result<Arc<Cell>> {
        let cell = self
            .cell
            .refs
            .get(self.ref_pos)
            .cloned()
            .ok_or_else(|| {
                malformed(format!(
                    "required reference #{} is missing (cell has {})",
                    self.ref_pos,
                    self.cell.refs.len()
                ))
            })?;
        self.ref_pos += 1;
        Ok(cell)
    }

    pub fn load_maybe_ref(&mut self) -> Result<Option<Arc<Cell>>> {
        if self.load_bit()? {
            self.load_ref().map(Some)
        } else {
            Ok(None)
        }
    }

    /// Read a snake-encoded string: remaining whole bytes, then the first ref, recursively.
    pub fn load_string_tail(&mut self) -> Result<String> {
        let mut bytes = Vec::new();
        self.collect_snake(&mut bytes, 0)?;
        String::from_utf8(bytes).map_err(|e| malformed(format!("invalid utf-8 in string: {e}")))
    }

    fn collect_snake(&mut self, out: &mut Vec<u8>, depth: u16) -> Result<()> {
        if depth >= MAX_DEPTH {
            return Err(Error::UnsupportedDepth {
                depth,
                max: MAX_DEPTH,
            });
        }
        if self.remaining_bits() % 8 != 0 {
            return Err(malformed("string payload is not byte-aligned"));
        }
        out.extend(self.load_bytes(self.remaining_bits() / 8)?);
        if self.remaining_refs() > 0 {
            let next = self.load_ref()?;
            next.parse().collect_snake(out, depth + 1)?;
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────
