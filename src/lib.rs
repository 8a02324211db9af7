pub mod assignment;
pub mod detector;
pub mod error;
pub mod manager;
pub mod math;
pub mod spot;
pub mod store;
pub mod track;

pub use detector::{SpotDetector, SpotDetectorConfig};
pub use error::Error;
pub use spot::Spot;
pub use store::{TrackRecord, TrackStore};
pub use track::{Observation, Track, TrackId, TrackState};

use manager::TrackManager;
use ndarray::ArrayView2;

#[derive(Debug, Clone)]
pub struct SpotTrackerConfig {
    pub detector: SpotDetectorConfig,
    /// Maximum assignment cost in pixels before a pairing is rejected.
    pub distance_threshold: f32,
    /// Consecutive misses before a track terminates.
    pub missed_frame_limit: u32,
}

impl SpotTrackerConfig {
    pub fn validate(&self) -> Result<(), Error> {
        self.detector.validate()?;

        if !(self.distance_threshold.is_finite() && self.distance_threshold > 0.0) {
            return Err(Error::Config(format!(
                "distance_threshold must be positive, got {}",
                self.distance_threshold
            )));
        }
        if self.missed_frame_limit == 0 {
            return Err(Error::Config("missed_frame_limit must be at least 1".into()));
        }

        Ok(())
    }
}

impl Default for SpotTrackerConfig {
    fn default() -> Self {
        Self {
            detector: SpotDetectorConfig::default(),
            distance_threshold: 50.0,
            missed_frame_limit: 5,
        }
    }
}

/// One accepted frame's worth of output. Assignment indices point into
/// `spots`; every spot appears exactly once, under either an existing
/// track's id or a freshly spawned one.
#[derive(Debug, Clone)]
pub struct FrameUpdate {
    pub frame_index: u64,
    pub spots: Vec<Spot>,
    pub assignments: Vec<(TrackId, usize)>,
}

/// Detection-and-tracking pipeline: adaptive detection, optimal
/// assignment, track lifecycle. Frames are processed strictly in order
/// by a single logical thread of control; each `process_frame` call is
/// one atomic update and readers observe the store only between calls.
pub struct SpotTracker {
    detector: SpotDetector,
    manager: TrackManager,
    dims: Option<(usize, usize)>,
    last_timestamp: Option<f64>,
    next_frame_index: u64,
}

impl SpotTracker {
    pub fn new(config: SpotTrackerConfig) -> Result<Self, Error> {
        config.validate()?;

        Ok(Self {
            detector: SpotDetector::new(config.detector)?,
            manager: TrackManager::new(config.distance_threshold, config.missed_frame_limit),
            dims: None,
            last_timestamp: None,
            next_frame_index: 0,
        })
    }

    /// Detect, assign and update the track set for one frame.
    ///
    /// The first accepted frame pins the session dimensions; later frames
    /// must match them, and timestamps must be strictly increasing. A
    /// rejected frame leaves all state untouched and the session may
    /// continue with the next valid frame.
    pub fn process_frame(
        &mut self,
        frame: ArrayView2<'_, f32>,
        timestamp: f64,
    ) -> Result<FrameUpdate, Error> {
        let dims = frame.dim();
        if dims.0 == 0 || dims.1 == 0 {
            return Err(Error::EmptyFrame);
        }
        if let Some(expected) = self.dims {
            if dims != expected {
                return Err(Error::FrameShape {
                    expected,
                    got: dims,
                });
            }
        }
        if let Some(last) = self.last_timestamp {
            if timestamp <= last {
                return Err(Error::NonMonotonicTimestamp {
                    last,
                    got: timestamp,
                });
            }
        }

        let spots = self.detector.detect(frame);

        let frame_index = self.next_frame_index;
        let assignments = self.manager.update(frame_index, timestamp, &spots);

        self.dims = Some(dims);
        self.last_timestamp = Some(timestamp);
        self.next_frame_index += 1;

        Ok(FrameUpdate {
            frame_index,
            spots,
            assignments,
        })
    }

    /// The complete track repository, active and terminated. Valid to
    /// read between frame updates.
    #[inline]
    pub fn store(&self) -> &TrackStore {
        self.manager.store()
    }

    /// Export rows for the analysis/export collaborator.
    #[inline]
    pub fn records(&self) -> Vec<TrackRecord> {
        self.manager.store().records()
    }
}
