use std::f64::consts::LN_2;

use strum::{Display, EnumString, VariantNames};

use crate::{
    buffer::{BufferProvider, BufferRef},
    envelope::{EnvelopeKind, EnvelopeTable},
    error::Error,
    pool::IndexPool,
};

// -------------------------------------------------------------------------------------------------

/// Default number of seeder slots in an engine.
pub const SEEDERS_MAX: usize = 10;

/// Maximum number of simultaneous voices per seeder.
pub const POLY_MAX: usize = 10;

// -------------------------------------------------------------------------------------------------

/// State of a seeder's link to its source sample buffer.
///
/// Linking walks the states in order and stops at the first failure; only
/// `Ready` permits activating the seeder.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, EnumString, Display, VariantNames)]
#[strum(serialize_all = "kebab-case")]
pub enum BufferLinkState {
    /// No buffer has been linked yet.
    #[default]
    NoLink,
    /// The buffer name is empty.
    NoSymbol,
    /// The provider knows no buffer under this name.
    NoReference,
    /// The referenced buffer no longer exists.
    NoObject,
    /// The buffer exists but holds no sample content.
    NoFile,
    /// Linked, with content. The seeder may be activated.
    Ready,
}

// -------------------------------------------------------------------------------------------------

/// Full control-surface parameter vector of one seeder.
#[derive(Debug, Clone, PartialEq)]
pub struct SeederParameters {
    /// Amplitude multiplier applied to every spawned grain.
    pub amplitude: f64,
    /// Source region start, as a fraction of the bound buffer's length.
    pub begin: f64,
    /// Source region length in milliseconds.
    pub length_ms: f64,
    /// Pitch shift in octaves. Positive values raise the pitch and shorten
    /// the grain's output length.
    pub shift: f64,
    /// Nominal inter-grain period, as a ratio of the output length.
    pub period: f64,
    /// Speed at which the source region advances through the buffer.
    pub speed: f64,
    /// Period jitter coefficient in `0..=1`.
    pub period_jitter: f64,
    /// Number of simultaneous voices, `1..=POLY_MAX`.
    pub polyphony: usize,
}

impl Default for SeederParameters {
    fn default() -> Self {
        Self {
            amplitude: 1.0,
            begin: 0.0,
            length_ms: 100.0,
            shift: 0.0,
            period: 0.37,
            speed: 1.0,
            period_jitter: 0.25,
            polyphony: 1,
        }
    }
}

// -------------------------------------------------------------------------------------------------

/// A seeder's link to its named source buffer, with cached shape info.
#[derive(Debug, Default)]
pub(crate) struct BufferLink {
    pub(crate) name: String,
    pub(crate) reference: Option<BufferRef>,
    pub(crate) state: BufferLinkState,
    /// Cached buffer length in sample frames.
    pub(crate) frame_count: i64,
    pub(crate) channel_count: usize,
    /// Buffer's native rate in frames per millisecond. Falls back to the
    /// output rate while no buffer is linked.
    pub(crate) sample_rate_ms: f64,
    /// Name of the file last loaded into the buffer, for telemetry.
    pub(crate) file: String,
    /// Buffer content generation last seen, to detect resizes and reloads.
    pub(crate) generation: u64,
}

// -------------------------------------------------------------------------------------------------

/// One generator stream. Spawns grains from a region of its source buffer.
///
/// Control fields are set through the registry; the derived fields
/// (`src_len`, `out_len`, `period_len`) are recomputed on every change that
/// affects them, so the scheduler only ever reads consistent values.
#[derive(Debug)]
pub(crate) struct Seeder {
    pub(crate) amplitude: f64,
    /// Source region start in buffer frames.
    pub(crate) src_begin: i64,
    pub(crate) length_ms: f64,
    /// Source region length in buffer frames.
    pub(crate) src_len: i64,
    pub(crate) shift: f64,
    pub(crate) shift_ratio: f64,
    /// Grain length in output frames.
    pub(crate) out_len: i64,
    pub(crate) period: f64,
    /// Nominal inter-grain period in output frames.
    pub(crate) period_len: i64,
    pub(crate) speed: f64,
    // Jitter coefficients. Only the period jitter feeds the scheduler; the
    // others are held for the control surface.
    pub(crate) amplitude_jitter: f64,
    pub(crate) begin_jitter: f64,
    pub(crate) length_jitter: f64,
    pub(crate) shift_jitter: f64,
    pub(crate) period_jitter: f64,
    pub(crate) link: BufferLink,
    pub(crate) envelope: EnvelopeKind,
    pub(crate) env_table: EnvelopeTable,
    pub(crate) voice_count: usize,
    /// Per-voice countdown in output frames until the next grain onset.
    pub(crate) voice_countdown: [i64; POLY_MAX],
}

impl Seeder {
    pub(crate) fn new(out_rate_ms: f64) -> Self {
        let mut seeder = Self {
            amplitude: 1.0,
            src_begin: 0,
            length_ms: 100.0,
            src_len: 0,
            shift: 0.0,
            shift_ratio: 1.0,
            out_len: 0,
            period: 0.37,
            period_len: 0,
            speed: 1.0,
            amplitude_jitter: 0.25,
            begin_jitter: 0.25,
            length_jitter: 0.25,
            shift_jitter: 0.25,
            period_jitter: 0.25,
            link: BufferLink {
                sample_rate_ms: out_rate_ms,
                ..BufferLink::default()
            },
            envelope: EnvelopeKind::default(),
            env_table: EnvelopeTable::default(),
            voice_count: 1,
            voice_countdown: [0; POLY_MAX],
        };
        seeder.update_derived(out_rate_ms);
        seeder
    }

    /// Recompute `src_len`, `shift_ratio`, `out_len` and `period_len`.
    pub(crate) fn update_derived(&mut self, out_rate_ms: f64) {
        self.src_len = (self.length_ms * self.link.sample_rate_ms) as i64;
        self.shift_ratio = (-LN_2 * self.shift).exp();
        self.out_len = (self.length_ms * self.shift_ratio * out_rate_ms) as i64;
        self.period_len = (self.period * self.out_len as f64) as i64;
    }

    /// Spread the voice onset phases evenly across one period.
    pub(crate) fn reset_voice_phases(&mut self) {
        for (voice, countdown) in self
            .voice_countdown
            .iter_mut()
            .enumerate()
            .take(self.voice_count)
        {
            *countdown = voice as i64 * self.period_len / self.voice_count as i64;
        }
    }

    /// Keep the source region inside the bound buffer.
    pub(crate) fn clamp_begin(&mut self) {
        if self.src_begin < 0 {
            self.src_begin = 0;
        }
        if self.src_begin + self.src_len > self.link.frame_count {
            self.src_begin = self.link.frame_count - self.src_len;
        }
    }

    fn snapshot(&self, index: usize, active: bool) -> SeederSnapshot {
        SeederSnapshot {
            index,
            active,
            amplitude: self.amplitude,
            begin_frames: self.src_begin,
            length_ms: self.length_ms,
            shift: self.shift,
            period: self.period,
            speed: self.speed,
            period_jitter: self.period_jitter,
            amplitude_jitter: self.amplitude_jitter,
            begin_jitter: self.begin_jitter,
            length_jitter: self.length_jitter,
            shift_jitter: self.shift_jitter,
            polyphony: self.voice_count,
            envelope: self.envelope,
            buffer_name: self.link.name.clone(),
            file_name: self.link.file.clone(),
            link_state: self.link.state,
            out_len: self.out_len,
            period_len: self.period_len,
        }
    }
}

// -------------------------------------------------------------------------------------------------

/// Read-only view of one seeder's full state, sent back over the event
/// channel in response to a get or dump request.
#[derive(Debug, Clone, PartialEq)]
pub struct SeederSnapshot {
    pub index: usize,
    pub active: bool,
    pub amplitude: f64,
    pub begin_frames: i64,
    pub length_ms: f64,
    pub shift: f64,
    pub period: f64,
    pub speed: f64,
    pub period_jitter: f64,
    pub amplitude_jitter: f64,
    pub begin_jitter: f64,
    pub length_jitter: f64,
    pub shift_jitter: f64,
    pub polyphony: usize,
    pub envelope: EnvelopeKind,
    pub buffer_name: String,
    pub file_name: String,
    pub link_state: BufferLinkState,
    pub out_len: i64,
    pub period_len: i64,
}

// -------------------------------------------------------------------------------------------------

/// Fixed array of seeders plus the index pool tracking which are active.
#[derive(Debug)]
pub(crate) struct SeederRegistry {
    seeders: Box<[Seeder]>,
    active: IndexPool,
    out_rate_ms: f64,
}

impl SeederRegistry {
    pub(crate) fn new(capacity: usize, sample_rate: u32) -> Self {
        let out_rate_ms = sample_rate as f64 / 1000.0;
        Self {
            seeders: (0..capacity).map(|_| Seeder::new(out_rate_ms)).collect(),
            active: IndexPool::new(capacity),
            out_rate_ms,
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.seeders.len()
    }

    pub(crate) fn out_rate_ms(&self) -> f64 {
        self.out_rate_ms
    }

    pub(crate) fn seeder(&self, index: usize) -> Result<&Seeder, Error> {
        self.check_index(index)?;
        Ok(&self.seeders[index])
    }

    pub(crate) fn seeder_mut(&mut self, index: usize) -> Result<&mut Seeder, Error> {
        self.check_index(index)?;
        Ok(&mut self.seeders[index])
    }

    pub(crate) fn is_active(&self, index: usize) -> bool {
        self.active.iter().any(|active| active == index)
    }

    /// Split borrow for the scheduler: the active list stays shared while
    /// the seeder records are mutated.
    pub(crate) fn parts_mut(&mut self) -> (&IndexPool, &mut [Seeder], f64) {
        (&self.active, &mut self.seeders, self.out_rate_ms)
    }

    pub(crate) fn snapshot(&self, index: usize) -> Result<SeederSnapshot, Error> {
        self.check_index(index)?;
        Ok(self.seeders[index].snapshot(index, self.is_active(index)))
    }

    pub(crate) fn active_flags(&self) -> Vec<bool> {
        (0..self.capacity()).map(|i| self.is_active(i)).collect()
    }

    /// Apply a full parameter vector and re-derive all dependent fields.
    ///
    /// An out-of-range polyphony is clamped to 1 and reported as an error,
    /// while all other fields are still applied.
    pub(crate) fn configure(
        &mut self,
        index: usize,
        parameters: &SeederParameters,
    ) -> Result<(), Error> {
        self.check_index(index)?;
        let out_rate_ms = self.out_rate_ms;
        let seeder = &mut self.seeders[index];

        seeder.amplitude = parameters.amplitude;
        seeder.src_begin = (parameters.begin * seeder.link.frame_count as f64) as i64;
        seeder.length_ms = parameters.length_ms;
        seeder.shift = parameters.shift;
        seeder.period = parameters.period;
        seeder.speed = parameters.speed;
        seeder.period_jitter = parameters.period_jitter;
        seeder.update_derived(out_rate_ms);
        seeder.clamp_begin();

        let poly_result = if (1..=POLY_MAX).contains(&parameters.polyphony) {
            seeder.voice_count = parameters.polyphony;
            Ok(())
        } else {
            seeder.voice_count = 1;
            Err(Error::ParameterError(format!(
                "polyphony must be between 1 and {POLY_MAX}, was {}; set to 1",
                parameters.polyphony
            )))
        };
        seeder.reset_voice_phases();
        poly_result
    }

    pub(crate) fn set_amplitude(&mut self, index: usize, amplitude: f64) -> Result<(), Error> {
        self.seeder_mut(index)?.amplitude = amplitude;
        Ok(())
    }

    pub(crate) fn set_begin(&mut self, index: usize, begin: f64) -> Result<(), Error> {
        self.check_index(index)?;
        let seeder = &mut self.seeders[index];
        seeder.src_begin = (begin * seeder.link.frame_count as f64) as i64;
        seeder.clamp_begin();
        Ok(())
    }

    pub(crate) fn set_length(&mut self, index: usize, length_ms: f64) -> Result<(), Error> {
        self.check_index(index)?;
        let out_rate_ms = self.out_rate_ms;
        let seeder = &mut self.seeders[index];
        seeder.length_ms = length_ms;
        seeder.update_derived(out_rate_ms);
        seeder.clamp_begin();
        Ok(())
    }

    pub(crate) fn set_shift(&mut self, index: usize, shift: f64) -> Result<(), Error> {
        self.check_index(index)?;
        let out_rate_ms = self.out_rate_ms;
        let seeder = &mut self.seeders[index];
        seeder.shift = shift;
        seeder.update_derived(out_rate_ms);
        Ok(())
    }

    pub(crate) fn set_period(&mut self, index: usize, period: f64) -> Result<(), Error> {
        self.check_index(index)?;
        let out_rate_ms = self.out_rate_ms;
        let seeder = &mut self.seeders[index];
        seeder.period = period;
        seeder.update_derived(out_rate_ms);
        Ok(())
    }

    pub(crate) fn set_speed(&mut self, index: usize, speed: f64) -> Result<(), Error> {
        self.seeder_mut(index)?.speed = speed;
        Ok(())
    }

    pub(crate) fn set_period_jitter(&mut self, index: usize, jitter: f64) -> Result<(), Error> {
        self.seeder_mut(index)?.period_jitter = jitter;
        Ok(())
    }

    pub(crate) fn set_polyphony(&mut self, index: usize, polyphony: usize) -> Result<(), Error> {
        self.check_index(index)?;
        if !(1..=POLY_MAX).contains(&polyphony) {
            return Err(Error::ParameterError(format!(
                "polyphony must be between 1 and {POLY_MAX}, was {polyphony}"
            )));
        }
        let seeder = &mut self.seeders[index];
        seeder.voice_count = polyphony;
        seeder.reset_voice_phases();
        Ok(())
    }

    /// Select an envelope family and refill the seeder's table in place.
    pub(crate) fn set_envelope(&mut self, index: usize, kind: EnvelopeKind) -> Result<(), Error> {
        self.check_index(index)?;
        let seeder = &mut self.seeders[index];
        seeder.envelope = kind;
        seeder.env_table.fill(kind);
        Ok(())
    }

    /// Add a seeder to the active list. `Ok(false)` if it already is active.
    pub(crate) fn activate(&mut self, index: usize) -> Result<bool, Error> {
        self.check_index(index)?;
        if self.is_active(index) {
            return Ok(false);
        }
        let state = self.seeders[index].link.state;
        if state != BufferLinkState::Ready {
            return Err(Error::BufferNotReady {
                seeder: index,
                state,
            });
        }
        self.active.allocate_by_index(index)?;
        Ok(true)
    }

    /// Remove a seeder from the active list. `Ok(false)` if it was inactive.
    pub(crate) fn deactivate(&mut self, index: usize) -> Result<bool, Error> {
        self.check_index(index)?;
        match self.active.release_by_index(index) {
            Ok(_) => Ok(true),
            Err(Error::IndexNotFound(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Activate every seeder whose buffer link is ready.
    pub(crate) fn activate_all(&mut self) {
        for index in 0..self.capacity() {
            if !self.is_active(index) && self.seeders[index].link.state == BufferLinkState::Ready {
                // The pool cannot fail here: the index was just checked free.
                let _ = self.active.allocate_by_index(index);
            }
        }
    }

    pub(crate) fn deactivate_all(&mut self) {
        self.active.release_all();
    }

    /// Walk the buffer link state machine for one seeder.
    ///
    /// Link failures are regular outcomes, not errors: the resulting state is
    /// recorded on the seeder and returned. Only a bad index is an `Err`.
    pub(crate) fn link_buffer(
        &mut self,
        index: usize,
        name: &str,
        provider: &dyn BufferProvider,
    ) -> Result<BufferLinkState, Error> {
        self.check_index(index)?;
        let out_rate_ms = self.out_rate_ms;
        let seeder = &mut self.seeders[index];
        seeder.link.name = name.to_string();
        seeder.link.reference = None;

        let state = if name.is_empty() {
            BufferLinkState::NoSymbol
        } else if let Some(reference) = provider.lookup(name) {
            let resolved = reference.resolve();
            seeder.link.reference = Some(reference);
            match resolved {
                Some(handle) => {
                    let info = handle.info();
                    if !info.is_loaded() || info.sample_rate_ms == 0.0 {
                        BufferLinkState::NoFile
                    } else {
                        seeder.link.frame_count = info.frame_count as i64;
                        seeder.link.channel_count = info.channel_count;
                        seeder.link.sample_rate_ms = info.sample_rate_ms;
                        seeder.link.generation = handle.generation();
                        seeder.update_derived(out_rate_ms);
                        seeder.clamp_begin();
                        BufferLinkState::Ready
                    }
                }
                None => BufferLinkState::NoObject,
            }
        } else {
            BufferLinkState::NoReference
        };

        seeder.link.state = state;
        if state != BufferLinkState::Ready {
            // A seeder without a usable buffer may not keep playing.
            let _ = self.deactivate(index);
        }
        Ok(state)
    }

    /// Poll every linked buffer for content changes and re-derive the
    /// length-in-samples fields of affected seeders. Runs once per block.
    pub(crate) fn refresh_links(&mut self) {
        let out_rate_ms = self.out_rate_ms;
        for (index, seeder) in self.seeders.iter_mut().enumerate() {
            let Some(reference) = &seeder.link.reference else {
                continue;
            };
            match reference.resolve() {
                Some(handle) => {
                    let generation = handle.generation();
                    if generation == seeder.link.generation {
                        continue;
                    }
                    let info = handle.info();
                    seeder.link.generation = generation;
                    if !info.is_loaded() || info.sample_rate_ms == 0.0 {
                        seeder.link.state = BufferLinkState::NoFile;
                    } else {
                        seeder.link.frame_count = info.frame_count as i64;
                        seeder.link.channel_count = info.channel_count;
                        seeder.link.sample_rate_ms = info.sample_rate_ms;
                        seeder.link.state = BufferLinkState::Ready;
                        seeder.update_derived(out_rate_ms);
                        seeder.clamp_begin();
                    }
                }
                None => {
                    if seeder.link.state == BufferLinkState::Ready {
                        log::warn!(
                            "source buffer '{}' for seeder {index} disappeared",
                            seeder.link.name
                        );
                    }
                    seeder.link.state = BufferLinkState::NoObject;
                }
            }
        }
        // Seeders whose buffer went away may not keep playing.
        for index in 0..self.capacity() {
            if self.is_active(index) && self.seeders[index].link.state != BufferLinkState::Ready {
                let _ = self.deactivate(index);
            }
        }
    }

    /// Change the output sample rate and re-derive every seeder.
    pub(crate) fn set_sample_rate(&mut self, sample_rate: u32) {
        self.out_rate_ms = sample_rate as f64 / 1000.0;
        for seeder in self.seeders.iter_mut() {
            if seeder.link.state != BufferLinkState::Ready {
                seeder.link.sample_rate_ms = self.out_rate_ms;
            }
            seeder.update_derived(self.out_rate_ms);
        }
    }

    fn check_index(&self, index: usize) -> Result<(), Error> {
        if index >= self.seeders.len() {
            return Err(Error::IndexOutOfRange {
                index,
                max: self.seeders.len(),
            });
        }
        Ok(())
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::buffer::MemoryBufferProvider;

    fn provider_with_pad(frames: usize) -> Arc<MemoryBufferProvider> {
        let provider = Arc::new(MemoryBufferProvider::new());
        provider.register_with_content("pad", vec![0.1; frames], 1, 44100);
        provider
    }

    #[test]
    fn derived_fields_follow_the_shift_ratio() {
        let provider = provider_with_pad(44100);
        let mut registry = SeederRegistry::new(SEEDERS_MAX, 44100);
        registry.link_buffer(0, "pad", provider.as_ref()).unwrap();
        registry
            .configure(0, &SeederParameters::default())
            .unwrap();

        let seeder = registry.seeder(0).unwrap();
        assert_eq!(seeder.src_len, 4410);
        assert_eq!(seeder.out_len, 4410);
        // period_len = out_len * 0.37, truncated
        assert_eq!(seeder.period_len, 1631);

        // One octave up halves the output length; the source region stays.
        registry.set_shift(0, 1.0).unwrap();
        let seeder = registry.seeder(0).unwrap();
        assert!((seeder.shift_ratio - 0.5).abs() < 1e-9);
        let expected_out = (100.0 * seeder.shift_ratio * 44.1) as i64;
        assert_eq!(seeder.out_len, expected_out);
        assert_eq!(seeder.src_len, 4410);
        assert_eq!(seeder.period_len, (0.37 * expected_out as f64) as i64);
    }

    #[test]
    fn voice_phases_spread_evenly() {
        let provider = provider_with_pad(44100);
        let mut registry = SeederRegistry::new(SEEDERS_MAX, 1000);
        registry.link_buffer(0, "pad", provider.as_ref()).unwrap();
        registry
            .configure(
                0,
                &SeederParameters {
                    length_ms: 1000.0,
                    period: 0.5,
                    polyphony: 4,
                    ..SeederParameters::default()
                },
            )
            .unwrap();
        let seeder = registry.seeder(0).unwrap();
        assert_eq!(seeder.out_len, 1000);
        assert_eq!(seeder.period_len, 500);
        assert_eq!(&seeder.voice_countdown[..4], &[0, 125, 250, 375]);
    }

    #[test]
    fn polyphony_out_of_range_is_clamped_and_reported() {
        let mut registry = SeederRegistry::new(SEEDERS_MAX, 44100);
        let result = registry.configure(
            0,
            &SeederParameters {
                polyphony: POLY_MAX + 1,
                ..SeederParameters::default()
            },
        );
        assert!(matches!(result, Err(Error::ParameterError(_))));
        assert_eq!(registry.seeder(0).unwrap().voice_count, 1);
        assert!(matches!(
            registry.set_polyphony(0, 0),
            Err(Error::ParameterError(_))
        ));
    }

    #[test]
    fn link_state_machine() {
        let provider = MemoryBufferProvider::new();
        let mut registry = SeederRegistry::new(SEEDERS_MAX, 44100);

        assert_eq!(
            registry.seeder(0).unwrap().link.state,
            BufferLinkState::NoLink
        );
        assert_eq!(
            registry.link_buffer(0, "", &provider).unwrap(),
            BufferLinkState::NoSymbol
        );
        assert_eq!(
            registry.link_buffer(0, "missing", &provider).unwrap(),
            BufferLinkState::NoReference
        );

        // Registered but empty: no file content.
        provider.register("pad");
        assert_eq!(
            registry.link_buffer(0, "pad", &provider).unwrap(),
            BufferLinkState::NoFile
        );

        provider.register_with_content("pad", vec![0.0; 1000], 1, 44100);
        assert_eq!(
            registry.link_buffer(0, "pad", &provider).unwrap(),
            BufferLinkState::Ready
        );

        // Dropping the buffer invalidates the stored reference.
        let state = registry.link_buffer(1, "pad", &provider).unwrap();
        assert_eq!(state, BufferLinkState::Ready);
        provider.unregister("pad");
        registry.refresh_links();
        assert_eq!(
            registry.seeder(1).unwrap().link.state,
            BufferLinkState::NoObject
        );
    }

    #[test]
    fn activation_requires_a_ready_link() {
        let provider = provider_with_pad(1000);
        let mut registry = SeederRegistry::new(SEEDERS_MAX, 44100);

        assert!(matches!(
            registry.activate(0),
            Err(Error::BufferNotReady {
                seeder: 0,
                state: BufferLinkState::NoLink
            })
        ));
        registry.link_buffer(0, "pad", provider.as_ref()).unwrap();
        assert!(registry.activate(0).unwrap());
        assert!(!registry.activate(0).unwrap());
        assert_eq!(registry.active_flags(), {
            let mut flags = vec![false; SEEDERS_MAX];
            flags[0] = true;
            flags
        });
        assert!(registry.deactivate(0).unwrap());
        assert!(!registry.deactivate(0).unwrap());

        registry.link_buffer(3, "pad", provider.as_ref()).unwrap();
        registry.activate_all();
        let flags = registry.active_flags();
        assert!(flags[0] && flags[3]);
        assert_eq!(flags.iter().filter(|on| **on).count(), 2);
        registry.deactivate_all();
        assert!(registry.active_flags().iter().all(|on| !on));
    }

    #[test]
    fn content_changes_rederive_source_lengths() {
        let provider = MemoryBufferProvider::new();
        let handle = provider.register_with_content("pad", vec![0.0; 44100], 1, 44100);
        let mut registry = SeederRegistry::new(SEEDERS_MAX, 44100);
        registry.link_buffer(0, "pad", &provider).unwrap();
        assert_eq!(registry.seeder(0).unwrap().src_len, 4410);

        // Reload at half the rate: 100 ms now spans half the frames.
        handle.set_content(vec![0.0; 22050], 1, 22050);
        registry.refresh_links();
        let seeder = registry.seeder(0).unwrap();
        assert_eq!(seeder.link.frame_count, 22050);
        assert_eq!(seeder.src_len, 2205);
        assert_eq!(seeder.link.state, BufferLinkState::Ready);
    }
}
