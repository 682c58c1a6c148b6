/// Fixed-capacity circular buffer of success-count samples
///
/// Pushing into a full window evicts the oldest sample.
#[derive(Debug, Clone)]
pub struct SuccessWindow {
    samples: Vec<usize>,
    head: usize,
    len: usize,
}

impl SuccessWindow {
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "window capacity must be non-zero");
        Self {
            samples: vec![0; capacity],
            head: 0,
            len: 0,
        }
    }

    pub fn push(&mut self, sample: usize) {
        let capacity = self.capacity();
        let tail = (self.head + self.len) % capacity;
        self.samples[tail] = sample;
        if self.len == capacity {
            self.head = (self.head + 1) % capacity;
        } else {
            self.len += 1;
        }
    }

    /// Oldest sample currently held
    pub fn oldest(&self) -> Option<usize> {
        (self.len > 0).then(|| self.samples[self.head])
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    pub fn capacity(&self) -> usize {
        self.samples.len()
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }

    /// Samples from oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.len).map(move |i| self.samples[(self.head + i) % self.capacity()])
    }
}
