//! Indexed sample access shared by every dataset in this crate.

use crate::error::{DataError, DataResult};

/// A finite, randomly accessible collection of samples.
pub trait Dataset {
    /// One sample.
    type Item;

    /// Number of samples.
    fn len(&self) -> usize;

    /// Sample at `index`.
    ///
    /// # Errors
    /// `DataError::IndexOutOfRange` when `index >= len()`.
    fn get(&self, index: usize) -> DataResult<Self::Item>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub(crate) fn check_index(index: usize, len: usize) -> DataResult<()> {
    if index >= len {
        return Err(DataError::IndexOutOfRange { index, len });
    }
    Ok(())
}
