//! Working sequence utilities.
//!
//! Elements are signed bytes compared numerically. This module generates the
//! unsorted input handed to the coordinator, verifies results, and renders
//! sequences for humans (twenty values per line, comma separated).
use std::io::{self, Write};

use log::error;
use rand::{Rng, SeedableRng, rngs::StdRng};

/// Single element of a sorted sequence.
pub type Element = i8;

/// Values per rendered line.
const VALUES_PER_LINE: usize = 20;

/// Generate `size` random elements. A `seed` makes the sequence reproducible,
/// which allows comparing distributed and sequential runs on equal input.
pub fn generate(size: usize, seed: Option<u64>) -> Vec<Element> {
    let mut sequence = vec![0; size];
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed).fill(&mut sequence[..]),
        None => rand::thread_rng().fill(&mut sequence[..]),
    }
    sequence
}

/// Index of the first element that is greater than its successor.
pub fn first_unsorted(sequence: &[Element]) -> Option<usize> {
    sequence.windows(2).position(|pair| pair[0] > pair[1])
}

/// Returns `true` when `sequence` is in ascending order; the first violation
/// is logged.
pub fn verify(sequence: &[Element]) -> bool {
    match first_unsorted(sequence) {
        None => true,
        Some(i) => {
            error!(
                "sequence not sorted at index {i}: {} > {}",
                sequence[i],
                sequence[i + 1]
            );
            false
        }
    }
}

/// Render `sequence` as comma separated values, twenty per line.
pub fn render<W: Write>(mut writer: W, sequence: &[Element]) -> io::Result<()> {
    for (i, value) in sequence.iter().enumerate() {
        write!(writer, "{value}")?;
        if i + 1 < sequence.len() {
            write!(writer, ", ")?;
        }
        if (i + 1) % VALUES_PER_LINE == 0 {
            writeln!(writer)?;
        }
    }
    writeln!(writer)?;
    writer.flush()
}
