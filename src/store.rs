use std::collections::{BTreeSet, HashMap};

use serde_derive::{Deserialize, Serialize};

use crate::track::{Track, TrackId, TrackState};

/// One exported row per observation, the contract consumed by the
/// analysis/export collaborator.
#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
pub struct TrackRecord {
    pub track_id: TrackId,
    pub frame_index: u64,
    pub timestamp: f64,
    pub x: f32,
    pub y: f32,
    pub mean_intensity: f32,
    pub max_intensity: f32,
    pub area: u32,
}

/// Repository of all tracks, active and terminated, keyed by identity.
///
/// Owned exclusively by the manager; everything that mutates it is
/// crate-private. Readers borrow it between frame updates.
#[derive(Debug, Default)]
pub struct TrackStore {
    tracks: HashMap<TrackId, Track>,
    active: BTreeSet<TrackId>,
}

impl TrackStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    #[inline]
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    #[inline]
    pub fn get(&self, id: TrackId) -> Option<&Track> {
        self.tracks.get(&id)
    }

    /// Active track ids in ascending order.
    pub fn active_ids(&self) -> impl Iterator<Item = TrackId> + '_ {
        self.active.iter().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.tracks.values()
    }

    pub(crate) fn insert(&mut self, track: Track) {
        let id = track.id();
        self.active.insert(id);

        let prev = self.tracks.insert(id, track);
        assert!(prev.is_none(), "duplicate track id {}", id);
    }

    pub(crate) fn get_mut(&mut self, id: TrackId) -> Option<&mut Track> {
        self.tracks.get_mut(&id)
    }

    /// Move a track out of the active set once it has terminated.
    pub(crate) fn retire(&mut self, id: TrackId) {
        debug_assert!(matches!(
            self.tracks.get(&id).map(Track::state),
            Some(TrackState::Terminated)
        ));

        self.active.remove(&id);
    }

    /// Flatten every track's history into export rows, ordered by
    /// `(track_id, frame_index)`.
    pub fn records(&self) -> Vec<TrackRecord> {
        let mut ids: Vec<TrackId> = self.tracks.keys().copied().collect();
        ids.sort_unstable();

        let mut rows = Vec::new();
        for id in ids {
            let track = &self.tracks[&id];
            rows.extend(track.observations().iter().map(|obs| TrackRecord {
                track_id: id,
                frame_index: obs.frame_index,
                timestamp: obs.timestamp,
                x: obs.x,
                y: obs.y,
                mean_intensity: obs.mean_intensity,
                max_intensity: obs.max_intensity,
                area: obs.area,
            }));
        }

        rows
    }
}
