/// Keystream multiplier, "odes" in ASCII.
pub const MULTIPLIER: u32 = 0x6f646573;
/// Fixed XOR key, "C //" in ASCII.
pub const KEY: u32 = 0x43202f2f;
/// Load address of a multiboot image in EWRAM.
pub const EWRAM_BASE: u32 = 0x02000000;

/// Advance the keystream accumulator by one word.
pub const fn advance(m: u32) -> u32 {
    MULTIPLIER.wrapping_mul(m).wrapping_add(1)
}

/// Obfuscate the word at byte `offset` of the padded image.
pub const fn encode(word: u32, m: u32, offset: u32) -> u32 {
    word ^ EWRAM_BASE.wrapping_add(offset).wrapping_neg() ^ m ^ KEY
}

/// Inverse of [`encode`], which is its own inverse.
pub const fn decode(data: u32, m: u32, offset: u32) -> u32 {
    encode(data, m, offset)
}

/// Keystream state of one payload transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cipher {
    m: u32,
}

impl Cipher {
    pub fn new(seed: u32) -> Self {
        Self { m: seed }
    }

    pub fn state(&self) -> u32 {
        self.m
    }

    /// Advance the keystream, then obfuscate `word`.
    pub fn encode_next(&mut self, word: u32, offset: u32) -> u32 {
        self.m = advance(self.m);
        encode(word, self.m, offset)
    }

    /// Advance the keystream, then recover the plain word.
    pub fn decode_next(&mut self, data: u32, offset: u32) -> u32 {
        self.m = advance(self.m);
        decode(data, self.m, offset)
    }
}
