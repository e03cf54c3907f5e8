// SPDX-License-Identifier: Apache-2.0
// © The Glint Authors <https://github.com/glint-gfx/glint>
//! UC5 texture payload codec.
//!
//! Stream layout: a 4-byte big-endian uncompressed length, one raw first
//! byte, then a token stream steered by a bit queue. The queue refills 32
//! bits at a time from the next four bytes (assembled big-endian) and hands
//! them out LSB first. Control bit 1 introduces a literal run followed by a
//! copy; control bit 0 a copy alone.
//!
//! Literal token: 2-bit length selector (values 0..=2 mean 1..=3 bytes,
//! 3 means an extended varint length + 3) then the raw bytes. Copy token:
//! control byte `z`; high nibble 0xF means length = varint + 15, otherwise
//! length = high nibble + 1; distance = (varint << 4) | low nibble, counted
//! backward from the write position, overlap allowed. Varints are
//! little-endian base-128 with 0x80 continuation.
//!
//! The grammar cannot end a stream on a literal, so an encoder may finish
//! with a copy that overruns the declared length; decoding truncates there.

use thiserror::Error;
use tracing::warn;

/// Slack allowed past the declared length for a final overshooting copy.
const PAD: usize = 64;

const MIN_MATCH: usize = 4;
const HASH_BITS: u32 = 15;

/// Errors produced by [`decompress`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Uc5Error {
    /// Input ended in the middle of a token.
    #[error("[UC5_TRUNCATED] compressed stream ended mid-token at offset {0}")]
    Truncated(usize),
    /// A varint ran wider than 64 bits.
    #[error("[UC5_BAD_VARINT] unterminated varint at offset {0}")]
    BadVarint(usize),
    /// A copy reached further back than the bytes produced so far.
    #[error("[UC5_BAD_DISTANCE] copy distance {ago} with only {produced} bytes produced")]
    BadDistance {
        /// Backward distance requested.
        ago: usize,
        /// Output bytes available to copy from.
        produced: usize,
    },
    /// Output overran the declared length by more than the allowed pad.
    #[error("[UC5_OVERRUN] output exceeded declared length {declared} plus pad")]
    Overrun {
        /// Length the header declared.
        declared: usize,
    },
    /// Output ended short of the declared length; the partial bytes survive
    /// in the error so callers can keep what arrived.
    #[error("[UC5_SHORT_OUTPUT] declared {declared} bytes, produced {produced}")]
    ShortOutput {
        /// Length the header declared.
        declared: usize,
        /// Bytes actually produced.
        produced: usize,
        /// The partial output.
        partial: Vec<u8>,
    },
}

struct TokenReader<'a> {
    input: &'a [u8],
    pos: usize,
    bits: u32,
    bits_left: u8,
}

impl TokenReader<'_> {
    fn byte(&mut self) -> Result<u8, Uc5Error> {
        let b = self
            .input
            .get(self.pos)
            .copied()
            .ok_or(Uc5Error::Truncated(self.pos))?;
        self.pos += 1;
        Ok(b)
    }

    fn bit(&mut self) -> Result<u32, Uc5Error> {
        if self.bits_left == 0 {
            let b0 = self.byte()?;
            let b1 = self.byte()?;
            let b2 = self.byte()?;
            let b3 = self.byte()?;
            self.bits = u32::from_be_bytes([b0, b1, b2, b3]);
            self.bits_left = 32;
        }
        let bit = self.bits & 1;
        self.bits >>= 1;
        self.bits_left -= 1;
        Ok(bit)
    }

    fn bits(&mut self, n: u8) -> Result<u32, Uc5Error> {
        let mut v = 0;
        for i in 0..n {
            v |= self.bit()? << i;
        }
        Ok(v)
    }

    fn varint(&mut self) -> Result<usize, Uc5Error> {
        let mut v = 0_usize;
        let mut shift = 0;
        loop {
            let b = self.byte()?;
            v |= usize::from(b & 0x7f) << shift;
            if b & 0x80 == 0 {
                return Ok(v);
            }
            shift += 7;
            if shift > 63 {
                return Err(Uc5Error::BadVarint(self.pos));
            }
        }
    }
}

/// Expand a UC5 stream.
///
/// A stream that ends short of its declared length is reported as
/// [`Uc5Error::ShortOutput`] carrying the partial bytes; one that overshoots
/// within the pad is truncated to the declared length and returned whole.
pub fn decompress(input: &[u8]) -> Result<Vec<u8>, Uc5Error> {
    let mut r = TokenReader {
        input,
        pos: 0,
        bits: 0,
        bits_left: 0,
    };
    let b0 = r.byte()?;
    let b1 = r.byte()?;
    let b2 = r.byte()?;
    let b3 = r.byte()?;
    let declared = u32::from_be_bytes([b0, b1, b2, b3]) as usize;
    if declared == 0 {
        return Ok(Vec::new());
    }

    let mut out = Vec::with_capacity(declared + PAD);
    out.push(r.byte()?);

    while r.pos < input.len() {
        if r.bit()? == 1 {
            let sel = r.bits(2)?;
            let len = if sel == 3 {
                r.varint()?.saturating_add(3)
            } else {
                sel as usize + 1
            };
            for _ in 0..len {
                out.push(r.byte()?);
            }
            if out.len() > declared + PAD {
                return Err(Uc5Error::Overrun { declared });
            }
        }
        copy(&mut r, &mut out, declared)?;
    }

    if out.len() < declared {
        let produced = out.len();
        warn!(declared, produced, "uc5 stream ended short of its declared length");
        return Err(Uc5Error::ShortOutput {
            declared,
            produced,
            partial: out,
        });
    }
    out.truncate(declared);
    Ok(out)
}

fn copy(r: &mut TokenReader<'_>, out: &mut Vec<u8>, declared: usize) -> Result<(), Uc5Error> {
    let z = r.byte()?;
    let len = if z & 0xf0 == 0xf0 {
        r.varint()?.saturating_add(15)
    } else {
        usize::from(z >> 4) + 1
    };
    let ago = (r.varint()? << 4) | usize::from(z & 0x0f);
    if ago == 0 || ago > out.len() {
        return Err(Uc5Error::BadDistance {
            ago,
            produced: out.len(),
        });
    }
    // Byte-at-a-time so overlapping copies reproduce their period. The cap
    // check sits inside the loop because a copy length is attacker-sized
    // while consuming no input.
    for _ in 0..len {
        if out.len() >= declared + PAD {
            return Err(Uc5Error::Overrun { declared });
        }
        let b = out[out.len() - ago];
        out.push(b);
    }
    Ok(())
}

struct TokenWriter {
    out: Vec<u8>,
    bit_word: u32,
    bit_count: u8,
    bit_slot: Option<usize>,
}

impl TokenWriter {
    fn push_bit(&mut self, bit: u32) {
        if self.bit_count == 32 {
            self.flush_bits();
        }
        if self.bit_slot.is_none() {
            // Reserve the word exactly where the decoder will refill.
            self.bit_slot = Some(self.out.len());
            self.out.extend_from_slice(&[0; 4]);
        }
        self.bit_word |= bit << self.bit_count;
        self.bit_count += 1;
    }

    fn flush_bits(&mut self) {
        if let Some(slot) = self.bit_slot.take() {
            self.out[slot..slot + 4].copy_from_slice(&self.bit_word.to_be_bytes());
            self.bit_word = 0;
            self.bit_count = 0;
        }
    }

    #[allow(clippy::cast_possible_truncation)] // masked to seven bits
    fn push_varint(&mut self, mut v: usize) {
        loop {
            let mut b = (v & 0x7f) as u8;
            v >>= 7;
            if v != 0 {
                b |= 0x80;
            }
            self.out.push(b);
            if v == 0 {
                return;
            }
        }
    }

    #[allow(clippy::cast_possible_truncation)] // selector bits are 0..=2 here
    fn push_literal(&mut self, bytes: &[u8]) {
        let len = bytes.len();
        if len <= 3 {
            self.push_bit(((len - 1) & 1) as u32);
            self.push_bit(((len - 1) >> 1) as u32);
        } else {
            self.push_bit(1);
            self.push_bit(1);
            self.push_varint(len - 3);
        }
        self.out.extend_from_slice(bytes);
    }

    #[allow(clippy::cast_possible_truncation)] // nibbles are masked or bounded
    fn push_copy(&mut self, len: usize, ago: usize) {
        if len <= 15 {
            self.out.push((((len - 1) as u8) << 4) | (ago & 0x0f) as u8);
        } else {
            self.out.push(0xf0 | (ago & 0x0f) as u8);
            self.push_varint(len - 15);
        }
        self.push_varint(ago >> 4);
    }
}

fn hash4(input: &[u8], pos: usize) -> usize {
    let v = u32::from_le_bytes([
        input[pos],
        input[pos + 1],
        input[pos + 2],
        input[pos + 3],
    ]);
    (v.wrapping_mul(2_654_435_761) >> (32 - HASH_BITS)) as usize
}

/// Compress `input` into a UC5 stream [`decompress`] can expand.
///
/// Greedy single-probe LZ; matches shorter than four bytes are not taken.
/// When the input ends on a byte with no earlier occurrence the encoder
/// finishes with a one-byte overshooting copy, which decoding truncates.
#[allow(clippy::cast_possible_truncation)] // texture payloads are far below 4GiB
pub fn compress(input: &[u8]) -> Vec<u8> {
    let n = input.len();
    let mut w = TokenWriter {
        out: Vec::with_capacity(n / 2 + 16),
        bit_word: 0,
        bit_count: 0,
        bit_slot: None,
    };
    w.out.extend_from_slice(&(n as u32).to_be_bytes());
    if n == 0 {
        return w.out;
    }
    w.out.push(input[0]);

    let mut head = vec![usize::MAX; 1 << HASH_BITS];
    let mut last_byte_at = [usize::MAX; 256];
    last_byte_at[usize::from(input[0])] = 0;

    let mut pos = 1_usize;
    let mut lit_start = 1_usize;
    while pos + MIN_MATCH <= n {
        let h = hash4(input, pos);
        let cand = head[h];
        head[h] = pos;
        last_byte_at[usize::from(input[pos])] = pos;

        let mut match_len = 0;
        if cand != usize::MAX && input[cand..cand + MIN_MATCH] == input[pos..pos + MIN_MATCH] {
            match_len = MIN_MATCH;
            while pos + match_len < n && input[cand + match_len] == input[pos + match_len] {
                match_len += 1;
            }
        }

        if match_len == 0 {
            pos += 1;
            continue;
        }

        let ago = pos - cand;
        if lit_start < pos {
            w.push_bit(1);
            w.push_literal(&input[lit_start..pos]);
        } else {
            w.push_bit(0);
        }
        w.push_copy(match_len, ago);

        for covered in pos + 1..pos + match_len {
            if covered + MIN_MATCH <= n {
                head[hash4(input, covered)] = covered;
            }
            last_byte_at[usize::from(input[covered])] = covered;
        }
        pos += match_len;
        lit_start = pos;
    }
    for tail in pos..n.saturating_sub(1) {
        last_byte_at[usize::from(input[tail])] = tail;
    }

    if lit_start < n {
        // Tail bytes left over; the grammar needs a copy to close the stream.
        let last = usize::from(input[n - 1]);
        if last_byte_at[last] != usize::MAX && last_byte_at[last] < n - 1 {
            let ago = (n - 1) - last_byte_at[last];
            if lit_start < n - 1 {
                w.push_bit(1);
                w.push_literal(&input[lit_start..n - 1]);
            } else {
                w.push_bit(0);
            }
            w.push_copy(1, ago);
        } else {
            // Final byte never seen before: emit it literally, then a
            // one-byte overshoot copy the decoder truncates away.
            w.push_bit(1);
            w.push_literal(&input[lit_start..n]);
            w.push_copy(1, 1);
        }
    }
    w.flush_bits();
    w.out
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::panic)]
    #![allow(clippy::cast_possible_truncation)]
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn empty_stream_is_header_only() {
        let packed = compress(&[]);
        assert_eq!(packed, hex::decode("00000000").unwrap());
        assert_eq!(decompress(&packed).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn single_byte_round_trip() {
        let packed = compress(b"Q");
        assert_eq!(decompress(&packed).unwrap(), b"Q");
    }

    #[test]
    fn fixed_repeat_fixture_decodes() {
        // declared=5, first byte 'a', one all-zero control word, then a
        // copy of length 4 at distance 1.
        let packed = hex::decode("0000000561000000003100").unwrap();
        assert_eq!(decompress(&packed).unwrap(), b"aaaaa");
    }

    #[test]
    fn run_of_one_byte_round_trips() {
        let data = vec![7_u8; 300];
        let packed = compress(&data);
        assert!(packed.len() < data.len() / 4);
        assert_eq!(decompress(&packed).unwrap(), data);
    }

    #[test]
    fn periodic_data_round_trips_and_shrinks() {
        let data: Vec<u8> = b"gradient-row".iter().copied().cycle().take(1200).collect();
        let packed = compress(&data);
        assert!(packed.len() < data.len() / 3);
        assert_eq!(decompress(&packed).unwrap(), data);
    }

    #[test]
    fn novel_tail_byte_takes_the_overshoot_path() {
        // '!' appears nowhere else, so the encoder must close with an
        // overshooting copy.
        let data = b"aaaaaaaaaaaaaaaa!";
        let packed = compress(data);
        assert_eq!(decompress(&packed).unwrap(), data);
    }

    #[test]
    fn repeated_tail_byte_closes_exactly() {
        let data = b"xyxyxyxyxyxyxyzz";
        let packed = compress(data);
        assert_eq!(decompress(&packed).unwrap(), data);
    }

    #[test]
    fn incompressible_bytes_round_trip() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let data: Vec<u8> = (0..4096).map(|_| rng.gen()).collect();
        let packed = compress(&data);
        assert_eq!(decompress(&packed).unwrap(), data);
    }

    #[test]
    fn gray_texture_like_data_round_trips() {
        // Smooth ramps with row structure, close to what a depth or
        // luminance image looks like.
        let mut data = Vec::with_capacity(128 * 64);
        for row in 0..64_u32 {
            for col in 0..128_u32 {
                data.push(((row * 2 + col / 4) % 256) as u8);
            }
        }
        let packed = compress(&data);
        assert!(packed.len() < data.len());
        assert_eq!(decompress(&packed).unwrap(), data);
    }

    #[test]
    fn truncated_stream_reports_offset() {
        let packed = compress(b"abcabcabcabc");
        let cut = &packed[..packed.len() - 2];
        assert!(matches!(decompress(cut), Err(Uc5Error::Truncated(_))));
    }

    #[test]
    fn short_stream_surrenders_partial_bytes() {
        // Header declares ten bytes but the body carries only the first.
        let packed = hex::decode("0000000a61").unwrap();
        match decompress(&packed) {
            Err(Uc5Error::ShortOutput {
                declared,
                produced,
                partial,
            }) => {
                assert_eq!(declared, 10);
                assert_eq!(produced, 1);
                assert_eq!(partial, b"a");
            }
            other => panic!("expected short output, got {other:?}"),
        }
    }

    #[test]
    fn bad_distance_is_rejected() {
        // Copy at distance 9 with only one byte produced.
        let mut packed = hex::decode("0000000561000000003100").unwrap();
        let z = packed.len() - 2;
        packed[z] = 0x39;
        assert!(matches!(
            decompress(&packed),
            Err(Uc5Error::BadDistance { ago: 9, .. })
        ));
    }

    #[test]
    fn long_matches_use_extended_lengths() {
        let mut data = Vec::new();
        data.extend_from_slice(b"prologue");
        let block: Vec<u8> = (0..250_u32).map(|v| (v % 251) as u8).collect();
        data.extend_from_slice(&block);
        data.extend_from_slice(&block);
        data.extend_from_slice(&block);
        let packed = compress(&data);
        assert_eq!(decompress(&packed).unwrap(), data);
    }
}
