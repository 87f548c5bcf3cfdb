/// Initial checksum value.
pub const CHECKSUM_SEED: u16 = 0xc387;
/// Bit-reversed polynomial.
pub const CHECKSUM_POLY: u16 = 0xc37b;

/// Fold one 32-bit word into the checksum, LSB first.
pub const fn crc_step(mut word: u32, mut state: u16) -> u16 {
    let mut bit = 0;
    while bit < 32 {
        if (state as u32 ^ word) & 1 != 0 {
            state = (state >> 1) ^ CHECKSUM_POLY;
        } else {
            state >>= 1;
        }
        word >>= 1;
        bit += 1;
    }

    state
}

/// Running multiboot checksum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checksum(u16);

impl Checksum {
    pub fn update(&mut self, word: u32) {
        self.0 = crc_step(word, self.0);
    }

    pub fn value(&self) -> u16 {
        self.0
    }
}

impl Default for Checksum {
    fn default() -> Self {
        Self(CHECKSUM_SEED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_steps() {
        assert_eq!(crc_step(0, CHECKSUM_SEED), 0xaea0);
        assert_eq!(crc_step(0xffffffff, 0), 0x6f0e);
        assert_eq!(crc_step(0x12345678, CHECKSUM_SEED), 0x4dd0);
    }

    #[test]
    fn zero_stays_zero() {
        assert_eq!(crc_step(0, 0), 0);
    }

    #[test]
    fn deterministic() {
        for (word, state) in [(0xdeadbeef, 0x1234), (0x00000001, 0xffff), (0x80000000, 0)] {
            assert_eq!(crc_step(word, state), crc_step(word, state));
        }
    }

    #[test]
    fn running_checksum_matches_fold() {
        let words = [0x12345678, 0x9abcdef0, 0, 0xffffffff];

        let mut checksum = Checksum::default();
        words.iter().for_each(|w| checksum.update(*w));

        let folded = words.iter().fold(CHECKSUM_SEED, |c, w| crc_step(*w, c));
        assert_eq!(checksum.value(), folded);
    }
}
