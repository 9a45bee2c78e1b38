use crate::{
    pool::{Cursor, IndexPool},
    seeder::Seeder,
};

// -------------------------------------------------------------------------------------------------

/// Default number of grain slots in an engine.
pub const GRAINS_MAX: usize = 100;

// -------------------------------------------------------------------------------------------------

/// One in-flight grain.
///
/// All playback fields are snapshotted from the owning seeder at spawn time
/// and stay fixed for the grain's lifetime, so later seeder edits never
/// retroactively affect sounding grains. The two `(index, remainder)` pairs
/// are fixed-point interpolation cursors into the source buffer and the
/// envelope table, advanced by the mixer without per-sample divisions.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct Grain {
    /// Index of the owning seeder.
    pub(crate) seeder: usize,
    pub(crate) amplitude: f64,
    /// Source region start in buffer frames.
    pub(crate) src_begin: i64,
    /// Source region length in buffer frames.
    pub(crate) src_len: i64,
    /// Write offset within the current output block. Nonzero only while the
    /// grain is new; reset to zero after its first block.
    pub(crate) out_begin: i64,
    /// Total output length in frames.
    pub(crate) out_len: i64,
    /// Output frames still to render.
    pub(crate) out_countdown: i64,
    pub(crate) src_index: i64,
    pub(crate) src_rem: i64,
    pub(crate) env_index: i64,
    pub(crate) env_rem: i64,
}

// -------------------------------------------------------------------------------------------------

/// Fixed array of grain records plus the index pool tracking which are live.
///
/// A full pool drops the grain instead of blocking or growing; drops are
/// counted for diagnostics.
#[derive(Debug)]
pub(crate) struct GrainPool {
    grains: Box<[Grain]>,
    indices: IndexPool,
    count: usize,
    dropped: u64,
}

impl GrainPool {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            grains: vec![Grain::default(); capacity].into_boxed_slice(),
            indices: IndexPool::new(capacity),
            count: 0,
            dropped: 0,
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.grains.len()
    }

    pub(crate) fn count(&self) -> usize {
        self.count
    }

    /// Number of grains dropped because the pool was full.
    pub(crate) fn dropped_count(&self) -> u64 {
        self.dropped
    }

    /// Snapshot a seeder into a fresh grain at the front of the live list.
    ///
    /// `src_offset` shifts the source region (used by secondary voices) and
    /// is clamped into the bound buffer. Returns `None` and counts a drop if
    /// the pool is full.
    pub(crate) fn spawn(
        &mut self,
        seeder_index: usize,
        seeder: &Seeder,
        src_offset: i64,
        out_offset: i64,
    ) -> Option<usize> {
        let Ok(slot) = self.indices.allocate_at_head() else {
            self.dropped += 1;
            return None;
        };
        self.count += 1;

        let grain = &mut self.grains[slot];
        grain.seeder = seeder_index;
        grain.amplitude = seeder.amplitude;
        grain.src_begin = seeder.src_begin + src_offset;
        grain.src_len = seeder.src_len;
        if grain.src_begin < 0 {
            grain.src_begin = 0;
        }
        if grain.src_begin + grain.src_len > seeder.link.frame_count {
            grain.src_begin = seeder.link.frame_count - grain.src_len;
        }
        grain.out_begin = out_offset;
        grain.out_len = seeder.out_len;
        grain.out_countdown = grain.out_len;
        grain.src_index = 0;
        grain.src_rem = 0;
        grain.env_index = 0;
        grain.env_rem = 0;
        Some(slot)
    }

    pub(crate) fn head(&self) -> Cursor {
        self.indices.head()
    }

    pub(crate) fn current(&self, cursor: Cursor) -> Option<usize> {
        self.indices.current(cursor)
    }

    pub(crate) fn advance(&self, cursor: Cursor) -> Cursor {
        self.indices.advance(cursor)
    }

    pub(crate) fn grain(&self, index: usize) -> &Grain {
        &self.grains[index]
    }

    pub(crate) fn grain_mut(&mut self, index: usize) -> &mut Grain {
        &mut self.grains[index]
    }

    /// Retire the cursor's current grain, returning its slot to the free
    /// list. The cursor then points at the next live grain.
    pub(crate) fn retire_at(&mut self, cursor: Cursor) {
        if self.indices.release_at(cursor).is_ok() {
            self.count -= 1;
        }
    }

    /// Retire all grains owned by the given seeder. Used when a seeder's
    /// buffer is about to be reloaded out from under them.
    pub(crate) fn retire_from_seeder(&mut self, seeder_index: usize) {
        let mut cursor = self.head();
        while let Some(index) = self.current(cursor) {
            if self.grains[index].seeder == seeder_index {
                self.retire_at(cursor);
            } else {
                cursor = self.advance(cursor);
            }
        }
    }

    /// Iterate live grains, front to back. Diagnostics only.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (usize, &Grain)> + '_ {
        self.indices.iter().map(|index| (index, &self.grains[index]))
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn test_seeder() -> Seeder {
        let mut seeder = Seeder::new(44.1);
        seeder.link.frame_count = 10000;
        seeder.link.channel_count = 1;
        seeder
    }

    #[test]
    fn drops_when_full_and_recovers_after_retire() {
        let seeder = test_seeder();
        let mut pool = GrainPool::new(2);

        assert!(pool.spawn(0, &seeder, 0, 0).is_some());
        assert!(pool.spawn(0, &seeder, 0, 0).is_some());
        assert!(pool.spawn(0, &seeder, 0, 0).is_none());
        assert_eq!(pool.count(), 2);
        assert_eq!(pool.dropped_count(), 1);

        pool.retire_at(pool.head());
        assert_eq!(pool.count(), 1);
        assert!(pool.spawn(0, &seeder, 0, 0).is_some());
    }

    #[test]
    fn spawn_snapshots_the_seeder() {
        let mut seeder = test_seeder();
        seeder.amplitude = 0.8;
        let mut pool = GrainPool::new(4);
        let slot = pool.spawn(3, &seeder, 0, 17).unwrap();

        // Later seeder edits must not affect the live grain.
        seeder.amplitude = 0.1;
        let grain = pool.grain(slot);
        assert_eq!(grain.seeder, 3);
        assert_eq!(grain.amplitude, 0.8);
        assert_eq!(grain.src_len, seeder.src_len);
        assert_eq!(grain.out_begin, 17);
        assert_eq!(grain.out_countdown, grain.out_len);
    }

    #[test]
    fn spawn_clamps_the_source_region() {
        let seeder = test_seeder();
        let mut pool = GrainPool::new(4);

        let slot = pool.spawn(0, &seeder, -50000, 0).unwrap();
        assert_eq!(pool.grain(slot).src_begin, 0);

        let slot = pool.spawn(0, &seeder, 50000, 0).unwrap();
        let grain = pool.grain(slot);
        assert_eq!(grain.src_begin, seeder.link.frame_count - grain.src_len);
    }

    #[test]
    fn retire_from_seeder_keeps_other_grains() {
        let seeder = test_seeder();
        let mut pool = GrainPool::new(8);
        pool.spawn(0, &seeder, 0, 0);
        pool.spawn(1, &seeder, 0, 0);
        pool.spawn(0, &seeder, 0, 0);
        pool.spawn(2, &seeder, 0, 0);

        pool.retire_from_seeder(0);
        assert_eq!(pool.count(), 2);
        assert!(pool.iter().all(|(_, grain)| grain.seeder != 0));
    }
}
