//! Fixed-capacity sliding window over the most recent samples.

use crate::acquisition::types::SensorSample;
use std::collections::VecDeque;

/// Per-axis copy of the window contents, oldest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AxisSeries {
    /// X values
    pub x: Vec<f64>,
    /// Y values
    pub y: Vec<f64>,
    /// Z values
    pub z: Vec<f64>,
}

impl AxisSeries {
    /// Number of samples per axis.
    pub fn len(&self) -> usize {
        self.x.len()
    }

    /// True when the snapshot holds no samples.
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

/// FIFO window holding at most `capacity` samples.
///
/// Pushing past capacity evicts the oldest sample, so after `capacity + k` pushes the
/// window holds exactly the last `capacity` samples in arrival order.
#[derive(Debug, Clone)]
pub struct SampleWindow {
    capacity: usize,
    samples: VecDeque<SensorSample>,
}

impl SampleWindow {
    /// Create an empty window.
    ///
    /// A capacity of zero is bumped to one so the window can always hold the latest
    /// sample.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
        }
    }

    /// Append a sample, evicting from the front until the length is back at capacity.
    pub fn push(&mut self, sample: SensorSample) {
        self.samples.push_back(sample);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    /// Current number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True when nothing has been pushed yet.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Maximum number of samples held.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Copy out the current contents, split per axis.
    pub fn snapshot(&self) -> AxisSeries {
        let n = self.samples.len();
        let mut series = AxisSeries {
            x: Vec::with_capacity(n),
            y: Vec::with_capacity(n),
            z: Vec::with_capacity(n),
        };
        for s in &self.samples {
            series.x.push(s.x);
            series.y.push(s.y);
            series.z.push(s.z);
        }
        series
    }

    /// Iterate over the held samples, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &SensorSample> {
        self.samples.iter()
    }
}
