//! Data tiles: the sampled values behind one rendered map request.

/// A `width × height` array of samples with an explicit validity bitmap.
///
/// Missing samples are tracked by the bitmap rather than by a sentinel
/// value; the stored value of a missing sample is always `0.0` so two tiles
/// holding the same logical samples compare equal.
///
/// Samples are row-major, top-to-bottom (same order as
/// [`RegularGrid`](crate::RegularGrid) pixels).
#[derive(Debug, Clone, PartialEq)]
pub struct DataTile {
    width: usize,
    height: usize,
    values: Vec<f32>,
    /// Bit N is 1 if sample N is present. Packed as 64-bit words.
    valid_bitmap: Vec<u64>,
}

impl DataTile {
    /// Create a tile in which every sample is missing.
    pub fn missing(width: usize, height: usize) -> Self {
        let len = width * height;
        Self {
            width,
            height,
            values: vec![0.0; len],
            valid_bitmap: vec![0u64; len.div_ceil(64)],
        }
    }

    /// Build a tile from per-sample optional values.
    ///
    /// Samples beyond `width * height` are ignored; absent trailing samples
    /// stay missing.
    pub fn from_samples<I>(width: usize, height: usize, samples: I) -> Self
    where
        I: IntoIterator<Item = Option<f32>>,
    {
        let mut tile = Self::missing(width, height);
        for (index, sample) in samples.into_iter().take(tile.len()).enumerate() {
            if let Some(value) = sample {
                tile.set(index, value);
            }
        }
        tile
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of samples (present or missing).
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Check if a sample is present.
    #[inline]
    pub fn is_valid(&self, index: usize) -> bool {
        index < self.values.len() && (self.valid_bitmap[index / 64] & (1u64 << (index % 64))) != 0
    }

    /// Get a sample, `None` if missing or out of range.
    #[inline]
    pub fn get(&self, index: usize) -> Option<f32> {
        if self.is_valid(index) {
            Some(self.values[index])
        } else {
            None
        }
    }

    /// Get the sample at (col, row).
    pub fn get_at(&self, col: usize, row: usize) -> Option<f32> {
        if col >= self.width || row >= self.height {
            return None;
        }
        self.get(row * self.width + col)
    }

    /// Store a present sample. Non-finite values are recorded as missing.
    #[inline]
    pub fn set(&mut self, index: usize, value: f32) {
        if index >= self.values.len() {
            return;
        }
        let word = index / 64;
        let bit = 1u64 << (index % 64);
        if value.is_finite() {
            self.values[index] = value;
            self.valid_bitmap[word] |= bit;
        } else {
            self.values[index] = 0.0;
            self.valid_bitmap[word] &= !bit;
        }
    }

    /// Mark a sample as missing.
    #[inline]
    pub fn clear(&mut self, index: usize) {
        if index < self.values.len() {
            self.values[index] = 0.0;
            self.valid_bitmap[index / 64] &= !(1u64 << (index % 64));
        }
    }

    /// Iterate over all samples in order.
    pub fn samples(&self) -> impl Iterator<Item = Option<f32>> + '_ {
        (0..self.values.len()).map(move |i| self.get(i))
    }

    /// Count present samples.
    pub fn valid_count(&self) -> usize {
        self.valid_bitmap
            .iter()
            .map(|w| w.count_ones() as usize)
            .sum()
    }

    /// Approximate heap footprint in bytes, used for cache budgeting.
    pub fn byte_size(&self) -> usize {
        self.values.len() * std::mem::size_of::<f32>()
            + self.valid_bitmap.len() * std::mem::size_of::<u64>()
    }
}
