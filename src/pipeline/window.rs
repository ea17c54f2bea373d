//! Sliding sample window shared between the capture thread and readers.
//!
//! The window holds the most recent `window_size` frames of `channels`
//! interleaved samples, newest at the tail. Every operation takes the same
//! lock and holds it for O(window_size * channels).

use parking_lot::Mutex;
use std::sync::Arc;

use crate::constants::signal::MAX_WINDOW_SIZE;
use crate::error::{CaptureError, ConfigError};

/// Immutable point-in-time copy of the window.
///
/// Samples are interleaved row-major: frame `r`, channel `c` lives at
/// `r * channels + c`. Cloning is cheap; the sample buffer is shared.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    data: Arc<[f32]>,
    rows: usize,
    channels: usize,
}

impl Snapshot {
    /// Build a snapshot from interleaved samples.
    pub fn from_interleaved(data: Vec<f32>, channels: usize) -> Result<Self, CaptureError> {
        if channels == 0 || data.len() % channels != 0 {
            return Err(CaptureError::BlockShape {
                len: data.len(),
                channels,
            });
        }
        let rows = data.len() / channels;
        Ok(Self {
            data: data.into(),
            rows,
            channels,
        })
    }

    /// Number of frames.
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// All samples, interleaved.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// One frame across all channels.
    pub fn row(&self, index: usize) -> &[f32] {
        let start = index * self.channels;
        &self.data[start..start + self.channels]
    }

    /// Samples of one channel, oldest first.
    pub fn channel(&self, channel: usize) -> impl Iterator<Item = f32> + '_ {
        self.data
            .iter()
            .skip(channel)
            .step_by(self.channels.max(1))
            .copied()
    }
}

#[derive(Debug)]
struct WindowBuffer {
    data: Vec<f32>,
    rows: usize,
    channels: usize,
}

impl WindowBuffer {
    fn merge(&mut self, block: &[f32]) -> Result<(), CaptureError> {
        let channels = self.channels;
        if block.len() % channels != 0 {
            return Err(CaptureError::BlockShape {
                len: block.len(),
                channels,
            });
        }

        let frames = block.len() / channels;
        let keep = frames.min(self.rows);
        if keep == 0 {
            return Ok(());
        }

        let shift = keep * channels;
        self.data.copy_within(shift.., 0);

        let tail = self.data.len() - shift;
        self.data[tail..].copy_from_slice(&block[block.len() - shift..]);
        Ok(())
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            data: Arc::from(self.data.as_slice()),
            rows: self.rows,
            channels: self.channels,
        }
    }
}

/// Thread-safe fixed-length window of the most recent frames.
#[derive(Debug)]
pub struct WindowCache {
    inner: Mutex<WindowBuffer>,
}

impl WindowCache {
    /// Create a zero-filled window.
    pub fn new(window_size: usize, channels: usize) -> Result<Self, ConfigError> {
        validate_window_size(window_size)?;
        if channels == 0 {
            return Err(ConfigError::Validation(
                "window must have at least one channel".to_string(),
            ));
        }

        Ok(Self {
            inner: Mutex::new(WindowBuffer {
                data: vec![0.0; window_size * channels],
                rows: window_size,
                channels,
            }),
        })
    }

    /// Shift the window left by the block's frame count and append the
    /// block's last `min(frames, window_size)` frames at the tail.
    pub fn merge(&self, block: &[f32]) -> Result<(), CaptureError> {
        self.inner.lock().merge(block)
    }

    /// [`merge`](Self::merge) then [`snapshot`](Self::snapshot) under a
    /// single lock acquisition.
    ///
    /// A malformed block is skipped; the snapshot of the current contents
    /// is still returned alongside the error.
    pub fn merge_and_snapshot(&self, block: &[f32]) -> (Snapshot, Result<(), CaptureError>) {
        let mut buffer = self.inner.lock();
        let merged = buffer.merge(block);
        (buffer.snapshot(), merged)
    }

    /// Reallocate to `new_size` frames, keeping the most recent
    /// `min(old, new)` frames right-aligned and zero-filling the rest.
    pub fn resize(&self, new_size: usize) -> Result<(), ConfigError> {
        validate_window_size(new_size)?;

        let mut buffer = self.inner.lock();
        if buffer.rows == new_size {
            return Ok(());
        }

        let channels = buffer.channels;
        let kept = buffer.rows.min(new_size) * channels;
        let mut data = vec![0.0; new_size * channels];
        let dst = data.len() - kept;
        let src = buffer.data.len() - kept;
        data[dst..].copy_from_slice(&buffer.data[src..]);

        buffer.data = data;
        buffer.rows = new_size;
        Ok(())
    }

    /// Full independent copy of the current contents.
    pub fn snapshot(&self) -> Snapshot {
        self.inner.lock().snapshot()
    }

    pub fn window_size(&self) -> usize {
        self.inner.lock().rows
    }

    pub fn channels(&self) -> usize {
        self.inner.lock().channels
    }
}

pub(super) fn validate_window_size(size: usize) -> Result<(), ConfigError> {
    if size == 0 || size > MAX_WINDOW_SIZE {
        return Err(ConfigError::InvalidWindowSize {
            requested: size,
            max: MAX_WINDOW_SIZE,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_frame_blocks_fill_from_the_right() {
        let cache = WindowCache::new(4, 1).unwrap();
        for value in [1.0, 2.0, 3.0] {
            cache.merge(&[value]).unwrap();
        }
        assert_eq!(cache.snapshot().as_slice(), &[0.0, 1.0, 2.0, 3.0]);

        cache.merge(&[4.0]).unwrap();
        assert_eq!(cache.snapshot().as_slice(), &[1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_window_holds_most_recent_samples() {
        let cache = WindowCache::new(5, 1).unwrap();
        let mut submitted = Vec::new();
        let mut next = 1.0;
        for block_len in [2, 3, 1, 4, 2] {
            let block: Vec<f32> = (0..block_len)
                .map(|_| {
                    let v = next;
                    next += 1.0;
                    v
                })
                .collect();
            submitted.extend_from_slice(&block);
            cache.merge(&block).unwrap();

            let mut expected = vec![0.0; 5usize.saturating_sub(submitted.len())];
            let start = submitted.len().saturating_sub(5);
            expected.extend_from_slice(&submitted[start..]);
            assert_eq!(cache.snapshot().as_slice(), expected.as_slice());
        }
    }

    #[test]
    fn test_block_longer_than_window_keeps_tail() {
        let cache = WindowCache::new(3, 1).unwrap();
        cache.merge(&[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        assert_eq!(cache.snapshot().as_slice(), &[3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_multichannel_rows_stay_interleaved() {
        let cache = WindowCache::new(3, 2).unwrap();
        cache.merge(&[1.0, -1.0, 2.0, -2.0]).unwrap();
        let snapshot = cache.snapshot();

        assert_eq!(snapshot.rows(), 3);
        assert_eq!(snapshot.row(0), &[0.0, 0.0]);
        assert_eq!(snapshot.row(2), &[2.0, -2.0]);
        assert_eq!(snapshot.channel(1).collect::<Vec<_>>(), vec![0.0, -1.0, -2.0]);
    }

    #[test]
    fn test_malformed_block_leaves_window_untouched() {
        let cache = WindowCache::new(2, 2).unwrap();
        cache.merge(&[1.0, 1.0]).unwrap();

        let (snapshot, merged) = cache.merge_and_snapshot(&[9.0, 9.0, 9.0]);
        assert!(matches!(merged, Err(CaptureError::BlockShape { len: 3, channels: 2 })));
        assert_eq!(snapshot.as_slice(), &[0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn test_resize_shrink_keeps_newest() {
        let cache = WindowCache::new(4, 1).unwrap();
        cache.merge(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        cache.resize(2).unwrap();
        assert_eq!(cache.snapshot().as_slice(), &[3.0, 4.0]);
        assert_eq!(cache.window_size(), 2);
    }

    #[test]
    fn test_resize_grow_zero_fills_front() {
        let cache = WindowCache::new(2, 1).unwrap();
        cache.merge(&[7.0, 8.0]).unwrap();
        cache.resize(5).unwrap();
        assert_eq!(cache.snapshot().as_slice(), &[0.0, 0.0, 0.0, 7.0, 8.0]);

        cache.resize(5).unwrap();
        assert_eq!(cache.snapshot().as_slice(), &[0.0, 0.0, 0.0, 7.0, 8.0]);
    }

    #[test]
    fn test_invalid_resize_is_rejected_without_change() {
        let cache = WindowCache::new(3, 1).unwrap();
        cache.merge(&[1.0]).unwrap();

        assert!(matches!(
            cache.resize(0),
            Err(ConfigError::InvalidWindowSize { requested: 0, .. })
        ));
        assert_eq!(cache.snapshot().as_slice(), &[0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_snapshot_is_independent_of_later_merges() {
        let cache = WindowCache::new(2, 1).unwrap();
        cache.merge(&[1.0]).unwrap();
        let before = cache.snapshot();
        cache.merge(&[2.0]).unwrap();

        assert_eq!(before.as_slice(), &[0.0, 1.0]);
        assert_eq!(cache.snapshot().as_slice(), &[1.0, 2.0]);
    }

    #[test]
    fn test_concurrent_merge_and_resize_stay_consistent() {
        let cache = Arc::new(WindowCache::new(64, 2).unwrap());
        let writer = {
            let cache = Arc::clone(&cache);
            std::thread::spawn(move || {
                for i in 0..500 {
                    let v = i as f32;
                    cache.merge(&[v, v, v, v]).unwrap();
                }
            })
        };

        for size in [32, 128, 16, 64].iter().cycle().take(200) {
            cache.resize(*size).unwrap();
            let snapshot = cache.snapshot();
            assert_eq!(snapshot.as_slice().len(), snapshot.rows() * 2);
        }
        writer.join().unwrap();
    }
}
