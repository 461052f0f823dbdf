use std::collections::BTreeMap;

use thiserror::Error;

const WORD_BITS: u128 = 128;

// Words are kept sparse so that a large IPv6 subnet costs nothing until addresses
// are actually allocated from it. A word that drops back to zero is removed.
#[derive(Debug, Default)]
pub struct BitSet {
    words: BTreeMap<u128, u128>,
    size: u128,
    count: u128,
}

impl BitSet {
    pub fn new(size: u128) -> BitSet {
        BitSet {
            words: BTreeMap::new(),
            size,
            count: 0,
        }
    }

    pub fn size(&self) -> u128 {
        self.size
    }

    // number of set bits
    pub fn count(&self) -> u128 {
        self.count
    }

    // index starts from 0
    pub fn set(&mut self, index: u128, value: bool) -> Result<u128, BitSetError> {
        if index >= self.size {
            return Err(BitSetError::InvalidIndex);
        }
        let (key, mask) = position(index);
        let word = self.words.entry(key).or_insert(0);
        let was_set = *word & mask != 0;
        match value {
            true => {
                *word |= mask;
                if !was_set {
                    self.count += 1;
                }
            }
            false => {
                *word &= !mask;
                if was_set {
                    self.count -= 1;
                }
                if *word == 0 {
                    self.words.remove(&key);
                }
            }
        }
        Ok(index)
    }

    pub fn set_true(&mut self, index: u128) -> Result<u128, BitSetError> {
        if self.is_set(index) {
            return Err(BitSetError::AlreadySet(index));
        }
        self.set(index, true)
    }

    pub fn set_next(&mut self) -> Result<u128, BitSetError> {
        let index = self.get_min_unset_index()?;
        self.set(index, true)
    }

    pub fn is_set(&self, index: u128) -> bool {
        if index >= self.size {
            return false;
        }
        let (key, mask) = position(index);
        self.words.get(&key).map(|w| w & mask != 0).unwrap_or(false)
    }

    fn get_min_unset_index(&self) -> Result<u128, BitSetError> {
        let mut expected = 0u128;
        for (key, word) in self.words.iter() {
            if *key != expected {
                break;
            }
            if *word != u128::MAX {
                let index = key * WORD_BITS + word.trailing_ones() as u128;
                return match index < self.size {
                    true => Ok(index),
                    false => Err(BitSetError::Full),
                };
            }
            expected = key + 1;
        }
        match expected.checked_mul(WORD_BITS) {
            Some(index) if index < self.size => Ok(index),
            _ => Err(BitSetError::Full),
        }
    }

    #[cfg(test)]
    fn with_value(value: u128, size: u128) -> BitSet {
        let mut b = BitSet::new(size);
        for i in 0..size.min(WORD_BITS) {
            if value & (1 << i) != 0 {
                b.set(i, true).unwrap();
            }
        }
        b
    }
}

fn position(index: u128) -> (u128, u128) {
    (index / WORD_BITS, 1 << (index % WORD_BITS))
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BitSetError {
    #[error("Invalid index")]
    InvalidIndex,
    #[error("Already set: {0}")]
    AlreadySet(u128),
    #[error("BitSet is full")]
    Full,
}
