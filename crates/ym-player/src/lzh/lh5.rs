//! The `-lh5-` entropy decoder.
//!
//! A straight port of the classic LHarc decoding core: LZ77 over an 8 KiB
//! ring with per-block Huffman tables. Each block carries three code-length
//! tables (the PT table bootstraps the character table, then is re-read as
//! the position table) followed by `block size` symbols. Characters ≤ 255
//! are literals; higher codes are match lengths, with the distance decoded
//! from a position prefix plus raw bits.
//!
//! Canonical tables are materialized as a direct lookup for short codes and
//! a 1-bit binary tree for longer ones. The tree lives in a `left`/`right`
//! pool shared with the alphabet: indices below `nchar` are leaves, internal
//! nodes are allocated from `nchar` upward. That arithmetic is load-bearing
//! and kept exactly as in the reference.

use crate::error::{Result, YmError};

const BITBUF_BITS: usize = 16;

const DICBIT: usize = 13;
const DICSIZ: usize = 1 << DICBIT;
const MAXMATCH: usize = 256;
const THRESHOLD: usize = 3;

/// Character/length alphabet size.
const NC: usize = 255 + MAXMATCH + 2 - THRESHOLD;
/// Position alphabet size.
const NP: usize = DICBIT + 1;
/// Code-length alphabet size.
const NT: usize = 16 + 3;
const NPT: usize = NT;

const CBIT: usize = 9;
const TBIT: usize = 5;
const PBIT: usize = 4;

/// Direct-lookup widths for the character and PT tables.
const C_TABLE_BITS: usize = 12;
const PT_TABLE_BITS: usize = 8;

const SCRATCH_LEN: usize = 4096;

/// 16-bit MSB-first reservoir, refilled a byte at a time from a 4 KiB
/// scratch buffer. Reads past the end of the input yield zero bits.
struct BitReader<'a> {
    input: &'a [u8],
    input_pos: usize,
    bitbuf: u16,
    subbitbuf: u8,
    bitcount: usize,
    scratch: [u8; SCRATCH_LEN],
    scratch_pos: usize,
    scratch_len: usize,
}

impl<'a> BitReader<'a> {
    fn new(input: &'a [u8]) -> Self {
        let mut bits = Self {
            input,
            input_pos: 0,
            bitbuf: 0,
            subbitbuf: 0,
            bitcount: 0,
            scratch: [0; SCRATCH_LEN],
            scratch_pos: 0,
            scratch_len: 0,
        };
        bits.fill(BITBUF_BITS);
        bits
    }

    /// The 16 lookahead bits, newest at the bottom.
    #[inline]
    fn peek(&self) -> u16 {
        self.bitbuf
    }

    /// Discard `n` bits and refill the reservoir.
    fn fill(&mut self, n: usize) {
        let mut n = n;
        let mut buf = (u32::from(self.bitbuf) << n) & 0xffff;
        while n > self.bitcount {
            buf |= (u32::from(self.subbitbuf) << (n - self.bitcount)) & 0xffff;
            n -= self.bitcount;
            if self.scratch_len == 0 {
                self.scratch_pos = 0;
                let want = SCRATCH_LEN - 32;
                let take = want.min(self.input.len() - self.input_pos);
                self.scratch[..take]
                    .copy_from_slice(&self.input[self.input_pos..self.input_pos + take]);
                self.input_pos += take;
                self.scratch_len = take;
            }
            if self.scratch_len > 0 {
                self.scratch_len -= 1;
                self.subbitbuf = self.scratch[self.scratch_pos];
                self.scratch_pos += 1;
            } else {
                self.subbitbuf = 0;
            }
            self.bitcount = 8;
        }
        self.bitcount -= n;
        buf |= u32::from(self.subbitbuf) >> self.bitcount;
        self.bitbuf = (buf & 0xffff) as u16;
    }

    fn getbits(&mut self, n: usize) -> u16 {
        if n == 0 {
            return 0;
        }
        let x = self.bitbuf >> (BITBUF_BITS - n);
        self.fill(n);
        x
    }
}

struct Lh5Decoder<'a> {
    bits: BitReader<'a>,

    left: [u16; 2 * NC - 1],
    right: [u16; 2 * NC - 1],
    c_len: [u8; NC],
    pt_len: [u8; NPT],
    c_table: [u16; 1 << C_TABLE_BITS],
    pt_table: [u16; 1 << PT_TABLE_BITS],

    blocksize: u16,
    /// Bytes left to copy from an in-flight match.
    pending: usize,
    /// Ring read cursor of that match.
    read_pos: usize,
    ring: [u8; DICSIZ],
}

/// Decode `original_size` bytes from a packed `-lh4-`/`-lh5-` payload.
pub(super) fn decompress(input: &[u8], original_size: usize) -> Result<Vec<u8>> {
    let mut decoder = Box::new(Lh5Decoder {
        bits: BitReader::new(input),
        left: [0; 2 * NC - 1],
        right: [0; 2 * NC - 1],
        c_len: [0; NC],
        pt_len: [0; NPT],
        c_table: [0; 1 << C_TABLE_BITS],
        pt_table: [0; 1 << PT_TABLE_BITS],
        blocksize: 0,
        pending: 0,
        read_pos: 0,
        ring: [0; DICSIZ],
    });

    let mut out = Vec::with_capacity(original_size);
    let mut remaining = original_size;
    while remaining > 0 {
        let count = remaining.min(DICSIZ);
        decoder.decode_chunk(count)?;
        out.extend_from_slice(&decoder.ring[..count]);
        remaining -= count;
    }
    Ok(out)
}

impl Lh5Decoder<'_> {
    fn decode_chunk(&mut self, count: usize) -> Result<()> {
        let mut r = 0usize;
        while self.pending > 0 && r < count {
            self.ring[r] = self.ring[self.read_pos];
            self.read_pos = (self.read_pos + 1) & (DICSIZ - 1);
            r += 1;
            self.pending -= 1;
        }

        while r < count {
            let c = self.decode_c()? as usize;
            if c <= 255 {
                self.ring[r] = c as u8;
                r += 1;
            } else {
                self.pending = c - (255 + 1 - THRESHOLD);
                let p = self.decode_p()? as usize;
                self.read_pos = r.wrapping_sub(p + 1) & (DICSIZ - 1);
                while self.pending > 0 && r < count {
                    self.ring[r] = self.ring[self.read_pos];
                    self.read_pos = (self.read_pos + 1) & (DICSIZ - 1);
                    r += 1;
                    self.pending -= 1;
                }
            }
        }
        Ok(())
    }

    fn decode_c(&mut self) -> Result<u16> {
        if self.blocksize == 0 {
            self.blocksize = self.bits.getbits(16);
            self.read_pt_len(NT, TBIT, Some(3))?;
            self.read_c_len()?;
            self.read_pt_len(NP, PBIT, None)?;
        }
        self.blocksize -= 1;

        let mut j = self.c_table[(self.bits.peek() >> (BITBUF_BITS - C_TABLE_BITS)) as usize];
        if j >= NC as u16 {
            let mut mask = 1u16 << (BITBUF_BITS - 1 - C_TABLE_BITS);
            let mut depth = 0;
            while j >= NC as u16 {
                j = if self.bits.peek() & mask != 0 {
                    self.right[j as usize]
                } else {
                    self.left[j as usize]
                };
                mask >>= 1;
                depth += 1;
                if depth > BITBUF_BITS {
                    return Err(YmError::CorruptStream("character tree walk"));
                }
            }
        }
        self.bits.fill(usize::from(self.c_len[j as usize]));
        Ok(j)
    }

    fn decode_p(&mut self) -> Result<u16> {
        let mut j = self.pt_table[(self.bits.peek() >> (BITBUF_BITS - PT_TABLE_BITS)) as usize];
        if j >= NP as u16 {
            let mut mask = 1u16 << (BITBUF_BITS - 1 - PT_TABLE_BITS);
            let mut depth = 0;
            while j >= NP as u16 {
                j = if self.bits.peek() & mask != 0 {
                    self.right[j as usize]
                } else {
                    self.left[j as usize]
                };
                mask >>= 1;
                depth += 1;
                if depth > BITBUF_BITS {
                    return Err(YmError::CorruptStream("position tree walk"));
                }
            }
        }
        self.bits.fill(usize::from(self.pt_len[j as usize]));
        // The prefix encodes the distance magnitude; the remaining bits are raw.
        if j != 0 {
            j -= 1;
            j = (1 << j) + self.bits.getbits(usize::from(j));
        }
        Ok(j)
    }

    fn read_pt_len(&mut self, nn: usize, nbit: usize, special: Option<usize>) -> Result<()> {
        let n = usize::from(self.bits.getbits(nbit));
        if n == 0 {
            // Degenerate table: one code value for every symbol, zero bits each.
            let c = self.bits.getbits(nbit);
            self.pt_len[..nn].fill(0);
            self.pt_table.fill(c);
            return Ok(());
        }
        if n > NPT {
            return Err(YmError::CorruptStream("code-length count"));
        }

        let mut i = 0;
        while i < n {
            let mut c = usize::from(self.bits.peek() >> (BITBUF_BITS - 3));
            if c == 7 {
                // Lengths above 6 are unary-extended.
                let mut mask = 1u16 << (BITBUF_BITS - 1 - 3);
                while mask & self.bits.peek() != 0 {
                    mask >>= 1;
                    c += 1;
                }
            }
            self.bits.fill(if c < 7 { 3 } else { c - 3 });
            self.pt_len[i] = c as u8;
            i += 1;

            if special == Some(i) {
                let mut run = self.bits.getbits(2);
                while run > 0 && i < NPT {
                    self.pt_len[i] = 0;
                    i += 1;
                    run -= 1;
                }
            }
        }
        if i < nn {
            self.pt_len[i..nn].fill(0);
        }
        Self::make_table(
            &self.pt_len,
            nn,
            PT_TABLE_BITS,
            &mut self.pt_table,
            &mut self.left,
            &mut self.right,
        )
    }

    fn read_c_len(&mut self) -> Result<()> {
        let n = usize::from(self.bits.getbits(CBIT));
        if n == 0 {
            let c = self.bits.getbits(CBIT);
            self.c_len.fill(0);
            self.c_table.fill(c);
            return Ok(());
        }
        if n > NC {
            return Err(YmError::CorruptStream("character count"));
        }

        let mut i = 0;
        while i < n {
            let mut c = self.pt_table[(self.bits.peek() >> (BITBUF_BITS - PT_TABLE_BITS)) as usize];
            if c >= NT as u16 {
                let mut mask = 1u16 << (BITBUF_BITS - 1 - PT_TABLE_BITS);
                let mut depth = 0;
                while c >= NT as u16 {
                    c = if self.bits.peek() & mask != 0 {
                        self.right[c as usize]
                    } else {
                        self.left[c as usize]
                    };
                    mask >>= 1;
                    depth += 1;
                    if depth > BITBUF_BITS {
                        return Err(YmError::CorruptStream("length tree walk"));
                    }
                }
            }
            self.bits.fill(usize::from(self.pt_len[c as usize]));

            if c <= 2 {
                // Symbols 0..2 encode runs of zero lengths.
                let run = match c {
                    0 => 1,
                    1 => usize::from(self.bits.getbits(4)) + 3,
                    _ => usize::from(self.bits.getbits(CBIT)) + 20,
                };
                let mut run = run;
                while run > 0 && i < NC {
                    self.c_len[i] = 0;
                    i += 1;
                    run -= 1;
                }
            } else {
                self.c_len[i] = (c - 2) as u8;
                i += 1;
            }
        }
        self.c_len[i..].fill(0);
        Self::make_table(
            &self.c_len,
            NC,
            C_TABLE_BITS,
            &mut self.c_table,
            &mut self.left,
            &mut self.right,
        )
    }

    /// Build a canonical-code lookup from `bitlen`: codes of up to
    /// `tablebits` bits index `table` directly, longer codes continue into a
    /// 1-bit tree grown in `left`/`right` with nodes allocated from `nchar`
    /// upward.
    fn make_table(
        bitlen: &[u8],
        nchar: usize,
        tablebits: usize,
        table: &mut [u16],
        left: &mut [u16],
        right: &mut [u16],
    ) -> Result<()> {
        let mut count = [0u32; 17];
        let mut weight = [0u32; 17];
        let mut start = [0u32; 18];

        for &len in bitlen.iter().take(nchar) {
            let len = usize::from(len);
            if (1..=16).contains(&len) {
                count[len] += 1;
            }
        }

        start[1] = 0;
        for i in 1..=16 {
            start[i + 1] = start[i] + (count[i] << (16 - i));
        }
        if start[17] & 0xffff != 0 {
            return Err(YmError::CorruptStream("inconsistent code lengths"));
        }

        let jutbits = 16 - tablebits;
        for i in 1..=tablebits {
            start[i] >>= jutbits;
            weight[i] = 1 << (tablebits - i);
        }
        for i in tablebits + 1..=16 {
            weight[i] = 1 << (16 - i);
        }

        // Zero the span no short code covers; the tree grower relies on it.
        let uncovered = (start[tablebits + 1] >> jutbits) as usize;
        if uncovered != 0 {
            for slot in table.iter_mut().take(1 << tablebits).skip(uncovered) {
                *slot = 0;
            }
        }

        let mut avail = nchar as u16;
        let mask = 1u16 << (15 - tablebits);

        for ch in 0..nchar {
            let len = usize::from(bitlen[ch]);
            if len == 0 || len > 16 {
                continue;
            }
            let nextcode = start[len] + weight[len];

            if len <= tablebits {
                for slot in &mut table[start[len] as usize..nextcode as usize] {
                    *slot = ch as u16;
                }
            } else {
                let mut k = (start[len] & 0xffff) as u16;
                let mut slot = Slot::Table((k >> jutbits) as usize);
                for _ in 0..len - tablebits {
                    let mut node = slot.get(table, left, right);
                    if node == 0 {
                        if usize::from(avail) >= left.len() {
                            return Err(YmError::CorruptStream("node pool exhausted"));
                        }
                        left[usize::from(avail)] = 0;
                        right[usize::from(avail)] = 0;
                        slot.set(table, left, right, avail);
                        node = avail;
                        avail += 1;
                    }
                    if usize::from(node) >= left.len() {
                        return Err(YmError::CorruptStream("tree node out of range"));
                    }
                    slot = if k & mask != 0 {
                        Slot::Right(usize::from(node))
                    } else {
                        Slot::Left(usize::from(node))
                    };
                    k <<= 1;
                }
                slot.set(table, left, right, ch as u16);
            }

            start[len] = nextcode;
        }
        Ok(())
    }
}

/// Pointer-free stand-in for the reference's `p = &table[..] / &left[..]`
/// walking pointer.
#[derive(Clone, Copy)]
enum Slot {
    Table(usize),
    Left(usize),
    Right(usize),
}

impl Slot {
    fn get(self, table: &[u16], left: &[u16], right: &[u16]) -> u16 {
        match self {
            Slot::Table(i) => table[i],
            Slot::Left(i) => left[i],
            Slot::Right(i) => right[i],
        }
    }

    fn set(self, table: &mut [u16], left: &mut [u16], right: &mut [u16], value: u16) {
        match self {
            Slot::Table(i) => table[i] = value,
            Slot::Left(i) => left[i] = value,
            Slot::Right(i) => right[i] = value,
        }
    }
}
