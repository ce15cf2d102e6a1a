//! Bounded history of viewport poses, newest first.

use std::collections::VecDeque;

pub const POSE_HISTORY_CAPACITY: usize = 100;

/// Viewer orientation in degrees, stamped with the presentation timestamp of
/// the frame it was used for.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PoseSample {
    pub yaw: f32,
    pub pitch: f32,
    pub pts: u64,
}

impl PoseSample {
    pub fn new(yaw: f32, pitch: f32) -> Self {
        Self { yaw, pitch, pts: 0 }
    }
}

#[derive(Debug, Clone)]
pub struct PoseHistory {
    samples: VecDeque<PoseSample>,
}

impl Default for PoseHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl PoseHistory {
    pub fn new() -> Self {
        Self {
            samples: VecDeque::with_capacity(POSE_HISTORY_CAPACITY + 1),
        }
    }

    /// Inserts at the front and evicts the oldest sample once over capacity.
    pub fn push(&mut self, pose: PoseSample) {
        self.samples.push_front(pose);
        if self.samples.len() > POSE_HISTORY_CAPACITY {
            self.samples.pop_back();
        }
    }

    /// Overwrites the newest sample's timestamp and returns a copy of it.
    /// The sample stays in the history.
    pub fn stamp_and_peek(&mut self, pts: u64) -> Option<PoseSample> {
        let head = self.samples.front_mut()?;
        head.pts = pts;
        Some(*head)
    }

    #[inline]
    pub fn latest(&self) -> Option<&PoseSample> {
        self.samples.front()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PoseSample> {
        self.samples.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_the_hundred_most_recent() {
        let mut history = PoseHistory::new();
        for i in 0..101 {
            history.push(PoseSample::new(i as f32, 0.0));
        }
        assert_eq!(history.len(), POSE_HISTORY_CAPACITY);
        assert_eq!(history.latest().map(|p| p.yaw), Some(100.0));
        // Sample 0 was evicted, sample 1 is now the oldest.
        assert_eq!(history.iter().last().map(|p| p.yaw), Some(1.0));
    }

    #[test]
    fn stamp_and_peek_does_not_remove() {
        let mut history = PoseHistory::new();
        history.push(PoseSample::new(10.0, -5.0));

        let first = history.stamp_and_peek(7).unwrap();
        let second = history.stamp_and_peek(8).unwrap();

        assert_eq!(first.pts, 7);
        assert_eq!(second.pts, 8);
        assert_eq!((second.yaw, second.pitch), (10.0, -5.0));
        assert_eq!(history.len(), 1);
        assert_eq!(history.latest().map(|p| p.pts), Some(8));
    }

    #[test]
    fn empty_history_yields_no_pose() {
        let mut history = PoseHistory::new();
        assert!(history.stamp_and_peek(3).is_none());
        assert!(history.is_empty());
    }
}
