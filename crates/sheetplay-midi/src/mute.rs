//! Muted track indices.

/// Compact bit set of muted track indices.
///
/// Immutable once built; the control side publishes a replacement and the
/// audio thread picks it up on its next cycle. Indices only mean something
/// for the playback set they were resolved against, recorded as
/// [`generation`](Self::generation).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MuteSet {
    words: Box<[u64]>,
    generation: u64,
}

impl MuteSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_indices<I>(indices: I) -> Self
    where
        I: IntoIterator<Item = usize>,
    {
        let mut words: Vec<u64> = Vec::new();
        for idx in indices {
            let word = idx / 64;
            if word >= words.len() {
                words.resize(word + 1, 0);
            }
            words[word] |= 1u64 << (idx % 64);
        }
        Self {
            words: words.into_boxed_slice(),
            generation: 0,
        }
    }

    /// Generation of the playback set these indices refer to.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn with_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }

    #[inline]
    pub fn is_muted(&self, track: usize) -> bool {
        self.words
            .get(track / 64)
            .is_some_and(|w| w & (1u64 << (track % 64)) != 0)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Number of muted tracks.
    pub fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(i, &w)| {
            (0..64usize).filter(move |&bit| w & (1u64 << bit) != 0).map(move |bit| i * 64 + bit)
        })
    }
}

impl FromIterator<usize> for MuteSet {
    fn from_iter<T: IntoIterator<Item = usize>>(iter: T) -> Self {
        Self::from_indices(iter)
    }
}
