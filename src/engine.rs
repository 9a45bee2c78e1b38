use std::fmt::Write as _;
use std::sync::Arc;

use assume::assume;
use crossbeam_channel::{Receiver, Sender, TrySendError};
use crossbeam_queue::ArrayQueue;
use rand::{rngs::SmallRng, Rng, SeedableRng};

use crate::{
    buffer::{BufferProvider, BufferRef},
    envelope::EnvelopeKind,
    error::Error,
    grain::{Grain, GrainPool, GRAINS_MAX},
    pool::IndexPool,
    seeder::{
        BufferLinkState, Seeder, SeederParameters, SeederRegistry, SeederSnapshot, SEEDERS_MAX,
    },
};

// -------------------------------------------------------------------------------------------------

/// Capacity of the control message queue and the event channel.
const MESSAGE_QUEUE_SIZE: usize = 1024;

// -------------------------------------------------------------------------------------------------

/// Which seeders a [`ControlMessage::DumpSeeders`] request covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpFilter {
    All,
    Active,
    Inactive,
}

// -------------------------------------------------------------------------------------------------

/// Control messages, sent from the control thread through a lock-free queue
/// and applied by the audio thread at the start of the next block.
#[derive(Debug)]
pub enum ControlMessage {
    /// Set the master gain.
    SetMaster(f64),
    /// Select the seeder whose source region is reported each block.
    SetFocus(usize),
    /// Apply a full parameter vector to one seeder.
    SetSeeder {
        index: usize,
        parameters: SeederParameters,
    },
    /// Request a [`EngineEvent::Seeder`] snapshot.
    GetSeeder(usize),
    SeederOn(usize),
    SeederOff(usize),
    AllOn,
    AllOff,
    SetAmplitude { index: usize, value: f64 },
    /// Source region start as a fraction of the bound buffer.
    SetBegin { index: usize, value: f64 },
    /// Source region length in milliseconds.
    SetLength { index: usize, value: f64 },
    /// Pitch shift in octaves.
    SetShift { index: usize, value: f64 },
    /// Grain period as a ratio of output length.
    SetPeriod { index: usize, value: f64 },
    SetSpeed { index: usize, value: f64 },
    SetPeriodJitter { index: usize, value: f64 },
    SetPolyphony { index: usize, value: usize },
    SetEnvelope { index: usize, kind: EnvelopeKind },
    /// Bind a named provider buffer as a seeder's grain source.
    LinkBuffer { index: usize, name: String },
    /// Bind the shared buffer that envelope tables are exported into.
    LinkEnvelopeBuffer { name: String },
    /// Load an audio file into a seeder's bound buffer.
    LoadFile {
        index: usize,
        file: String,
        path: String,
    },
    /// Copy a seeder's envelope table into the envelope export buffer.
    ExportEnvelope(usize),
    DumpSeeders(DumpFilter),
    DumpGrains,
    DumpBuffers,
    /// Request an [`EngineEvent::ActiveFlags`] vector.
    GetActive,
    SetSampleRate(u32),
}

// -------------------------------------------------------------------------------------------------

/// Events sent back from the audio thread to the control thread.
#[derive(Debug)]
pub enum EngineEvent {
    /// Per-block telemetry: the focus seeder's source region in milliseconds.
    FocusBounds {
        seeder: usize,
        begin_ms: f64,
        end_ms: f64,
    },
    /// Acknowledgement after a control message has been applied.
    ControlDone(Result<(), Error>),
    /// Response to [`ControlMessage::GetSeeder`].
    Seeder(SeederSnapshot),
    /// Response to [`ControlMessage::GetActive`].
    ActiveFlags(Vec<bool>),
    /// On-demand diagnostic text.
    Diagnostic(String),
}

// -------------------------------------------------------------------------------------------------

/// Control-thread handle to a running [`GranularEngine`].
pub struct GranularController {
    messages: Arc<ArrayQueue<ControlMessage>>,
    events: Receiver<EngineEvent>,
}

impl GranularController {
    /// Queue a control message for the next audio block. Never blocks.
    pub fn send(&self, message: ControlMessage) -> Result<(), Error> {
        self.messages
            .push(message)
            .map_err(|message| Error::SendError(format!("control queue is full: {message:?}")))
    }

    /// Receiver for acknowledgements, telemetry and diagnostics.
    pub fn events(&self) -> &Receiver<EngineEvent> {
        &self.events
    }
}

// -------------------------------------------------------------------------------------------------

/// The granular synthesis engine.
///
/// Owned and driven by the audio thread: each [`Self::process`] call applies
/// pending control messages, schedules new grains for the block, then mixes
/// all live grains into the output. The matching [`GranularController`] is
/// the only cross-thread surface.
pub struct GranularEngine {
    sample_rate: u32,
    master: f64,
    focus: usize,
    seeders: SeederRegistry,
    grains: GrainPool,
    provider: Arc<dyn BufferProvider>,
    envelope_buffer_name: String,
    envelope_buffer: Option<BufferRef>,
    rng: SmallRng,
    messages: Arc<ArrayQueue<ControlMessage>>,
    events: Sender<EngineEvent>,
}

impl GranularEngine {
    /// Create an engine with the default seeder and grain capacities.
    pub fn new(
        sample_rate: u32,
        provider: Arc<dyn BufferProvider>,
    ) -> (Self, GranularController) {
        Self::with_capacity(SEEDERS_MAX, GRAINS_MAX, sample_rate, provider)
    }

    /// Create an engine with explicit seeder and grain capacities. Both pools
    /// are allocated here, once.
    pub fn with_capacity(
        seeder_count: usize,
        grain_count: usize,
        sample_rate: u32,
        provider: Arc<dyn BufferProvider>,
    ) -> (Self, GranularController) {
        let messages = Arc::new(ArrayQueue::new(MESSAGE_QUEUE_SIZE));
        let (event_send, event_recv) = crossbeam_channel::bounded(MESSAGE_QUEUE_SIZE);
        let engine = Self {
            sample_rate,
            master: 1.0,
            focus: 0,
            seeders: SeederRegistry::new(seeder_count, sample_rate),
            grains: GrainPool::new(grain_count),
            provider,
            envelope_buffer_name: String::new(),
            envelope_buffer: None,
            rng: SmallRng::from_os_rng(),
            messages: Arc::clone(&messages),
            events: event_send,
        };
        let controller = GranularController {
            messages,
            events: event_recv,
        };
        (engine, controller)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of grains currently sounding.
    pub fn grain_count(&self) -> usize {
        self.grains.count()
    }

    /// Number of grains dropped because the grain pool was full.
    pub fn dropped_grain_count(&self) -> u64 {
        self.grains.dropped_count()
    }

    pub fn set_master(&mut self, master: f64) {
        self.master = master;
    }

    pub fn set_focus(&mut self, index: usize) -> Result<(), Error> {
        if index >= self.seeders.capacity() {
            return Err(Error::IndexOutOfRange {
                index,
                max: self.seeders.capacity(),
            });
        }
        self.focus = index;
        Ok(())
    }

    pub fn configure_seeder(
        &mut self,
        index: usize,
        parameters: &SeederParameters,
    ) -> Result<(), Error> {
        self.seeders.configure(index, parameters)
    }

    pub fn seeder_snapshot(&self, index: usize) -> Result<SeederSnapshot, Error> {
        self.seeders.snapshot(index)
    }

    pub fn set_envelope(&mut self, index: usize, kind: EnvelopeKind) -> Result<(), Error> {
        self.seeders.set_envelope(index, kind)
    }

    /// Bind a named provider buffer as a seeder's grain source and return the
    /// resulting link state. Link failures are states, not errors.
    pub fn link_buffer(&mut self, index: usize, name: &str) -> Result<BufferLinkState, Error> {
        self.seeders.link_buffer(index, name, self.provider.as_ref())
    }

    /// `Ok(true)` if the seeder started, `Ok(false)` if it already ran.
    pub fn activate_seeder(&mut self, index: usize) -> Result<bool, Error> {
        self.seeders.activate(index)
    }

    /// `Ok(true)` if the seeder stopped, `Ok(false)` if it was not running.
    pub fn deactivate_seeder(&mut self, index: usize) -> Result<bool, Error> {
        self.seeders.deactivate(index)
    }

    pub fn activate_all(&mut self) {
        self.seeders.activate_all();
    }

    pub fn deactivate_all(&mut self) {
        self.seeders.deactivate_all();
    }

    /// Load an audio file into a seeder's bound buffer.
    ///
    /// The seeder is stopped and its live grains retired first: their source
    /// regions would dangle into the reloaded content. The region start is
    /// reset to the buffer head.
    pub fn load_file(&mut self, index: usize, file: &str, path: &str) -> Result<(), Error> {
        let seeder = self.seeders.seeder(index)?;
        let handle = seeder
            .link
            .reference
            .as_ref()
            .and_then(|reference| reference.resolve())
            .ok_or_else(|| {
                Error::BufferError(format!("seeder {index} has no buffer to load into"))
            })?;

        let _ = self.seeders.deactivate(index);
        self.grains.retire_from_seeder(index);
        self.provider.load_file(&handle, path)?;

        let info = handle.info();
        let seeder = self.seeders.seeder_mut(index)?;
        seeder.link.file = file.to_string();
        seeder.link.generation = handle.generation();
        seeder.src_begin = 0;
        if info.is_loaded() && info.sample_rate_ms > 0.0 {
            seeder.link.frame_count = info.frame_count as i64;
            seeder.link.channel_count = info.channel_count;
            seeder.link.sample_rate_ms = info.sample_rate_ms;
            seeder.link.state = BufferLinkState::Ready;
        } else {
            seeder.link.state = BufferLinkState::NoFile;
        }
        let out_rate_ms = self.seeders.out_rate_ms();
        let seeder = self.seeders.seeder_mut(index)?;
        seeder.update_derived(out_rate_ms);
        seeder.clamp_begin();
        Ok(())
    }

    /// Bind the shared buffer that envelope tables are exported into.
    pub fn link_envelope_buffer(&mut self, name: &str) -> Result<(), Error> {
        let reference = self
            .provider
            .lookup(name)
            .ok_or_else(|| Error::BufferError(format!("unknown envelope buffer '{name}'")))?;
        self.envelope_buffer_name = name.to_string();
        self.envelope_buffer = Some(reference);
        Ok(())
    }

    /// Copy a seeder's envelope table into the envelope export buffer.
    pub fn export_envelope(&mut self, index: usize) -> Result<(), Error> {
        let handle = self
            .envelope_buffer
            .as_ref()
            .and_then(|reference| reference.resolve())
            .ok_or_else(|| Error::BufferError("the envelope buffer is not set".to_string()))?;
        let seeder = self.seeders.seeder(index)?;
        handle.set_content(seeder.env_table.values().to_vec(), 1, self.sample_rate);
        Ok(())
    }

    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate;
        self.seeders.set_sample_rate(sample_rate);
    }

    /// Render one block: drain control messages, poll buffer links, schedule
    /// new grains, mix all live grains, fold, then send telemetry.
    pub fn process(&mut self, output: &mut [f32]) {
        self.process_messages();
        self.seeders.refresh_links();

        {
            let (active, seeders, out_rate_ms) = self.seeders.parts_mut();
            run_scheduler(
                active,
                seeders,
                &mut self.grains,
                &mut self.rng,
                out_rate_ms,
                output.len() as i64,
            );
        }
        run_mixer(&self.seeders, &mut self.grains, output, self.master);
        fold_output(output);
        self.send_focus_bounds();
    }

    fn process_messages(&mut self) {
        while let Some(message) = self.messages.pop() {
            let result = self.apply_message(message);
            self.send_event(EngineEvent::ControlDone(result));
        }
    }

    fn apply_message(&mut self, message: ControlMessage) -> Result<(), Error> {
        match message {
            ControlMessage::SetMaster(value) => {
                self.master = value;
                Ok(())
            }
            ControlMessage::SetFocus(index) => self.set_focus(index),
            ControlMessage::SetSeeder { index, parameters } => {
                self.seeders.configure(index, &parameters)
            }
            ControlMessage::GetSeeder(index) => {
                let snapshot = self.seeders.snapshot(index)?;
                self.send_event(EngineEvent::Seeder(snapshot));
                Ok(())
            }
            ControlMessage::SeederOn(index) => self.seeders.activate(index).map(|_| ()),
            ControlMessage::SeederOff(index) => self.seeders.deactivate(index).map(|_| ()),
            ControlMessage::AllOn => {
                self.seeders.activate_all();
                Ok(())
            }
            ControlMessage::AllOff => {
                self.seeders.deactivate_all();
                Ok(())
            }
            ControlMessage::SetAmplitude { index, value } => {
                self.seeders.set_amplitude(index, value)
            }
            ControlMessage::SetBegin { index, value } => self.seeders.set_begin(index, value),
            ControlMessage::SetLength { index, value } => self.seeders.set_length(index, value),
            ControlMessage::SetShift { index, value } => self.seeders.set_shift(index, value),
            ControlMessage::SetPeriod { index, value } => self.seeders.set_period(index, value),
            ControlMessage::SetSpeed { index, value } => self.seeders.set_speed(index, value),
            ControlMessage::SetPeriodJitter { index, value } => {
                self.seeders.set_period_jitter(index, value)
            }
            ControlMessage::SetPolyphony { index, value } => {
                self.seeders.set_polyphony(index, value)
            }
            ControlMessage::SetEnvelope { index, kind } => self.seeders.set_envelope(index, kind),
            ControlMessage::LinkBuffer { index, name } => {
                let state = self.link_buffer(index, &name)?;
                if state != BufferLinkState::Ready {
                    log::warn!("buffer '{name}' for seeder {index} is not ready: {state}");
                }
                self.send_event(EngineEvent::Diagnostic(format!(
                    "buffer '{name}' for seeder {index}: {state}"
                )));
                Ok(())
            }
            ControlMessage::LinkEnvelopeBuffer { name } => self.link_envelope_buffer(&name),
            ControlMessage::LoadFile { index, file, path } => {
                self.load_file(index, &file, &path)
            }
            ControlMessage::ExportEnvelope(index) => self.export_envelope(index),
            ControlMessage::DumpSeeders(filter) => {
                let dump = self.dump_seeders(filter);
                self.send_event(EngineEvent::Diagnostic(dump));
                Ok(())
            }
            ControlMessage::DumpGrains => {
                let dump = self.dump_grains();
                self.send_event(EngineEvent::Diagnostic(dump));
                Ok(())
            }
            ControlMessage::DumpBuffers => {
                let dump = self.dump_buffers();
                self.send_event(EngineEvent::Diagnostic(dump));
                Ok(())
            }
            ControlMessage::GetActive => {
                let flags = self.seeders.active_flags();
                self.send_event(EngineEvent::ActiveFlags(flags));
                Ok(())
            }
            ControlMessage::SetSampleRate(sample_rate) => {
                self.set_sample_rate(sample_rate);
                Ok(())
            }
        }
    }

    fn send_event(&self, event: EngineEvent) {
        if let Err(TrySendError::Full(event)) = self.events.try_send(event) {
            log::warn!("engine event channel is full, dropping {event:?}");
        }
    }

    fn send_focus_bounds(&self) {
        let Ok(seeder) = self.seeders.seeder(self.focus) else {
            return;
        };
        let rate_ms = seeder.link.sample_rate_ms;
        if rate_ms <= 0.0 {
            return;
        }
        // Telemetry only: silently dropped when the channel is congested.
        let _ = self.events.try_send(EngineEvent::FocusBounds {
            seeder: self.focus,
            begin_ms: seeder.src_begin as f64 / rate_ms,
            end_ms: (seeder.src_begin + seeder.src_len) as f64 / rate_ms,
        });
    }

    fn dump_seeders(&self, filter: DumpFilter) -> String {
        let out_rate_ms = self.seeders.out_rate_ms();
        let mut text = String::new();
        for index in 0..self.seeders.capacity() {
            let active = self.seeders.is_active(index);
            match filter {
                DumpFilter::All => {}
                DumpFilter::Active if !active => continue,
                DumpFilter::Inactive if active => continue,
                _ => {}
            }
            let Ok(seeder) = self.seeders.seeder(index) else {
                continue;
            };
            let rate_ms = seeder.link.sample_rate_ms.max(f64::MIN_POSITIVE);
            let _ = writeln!(
                text,
                "seeder {index} [{}]: ampl {:.2} - begin {:.1} ms - length {:.1} ms - \
                 out {:.1} ms - shift {:.2} - period {:.2} - speed {:.2} - jitter {:.2} - \
                 poly {} - env {} - buffer '{}' - {}",
                if active { "on" } else { "off" },
                seeder.amplitude,
                seeder.src_begin as f64 / rate_ms,
                seeder.length_ms,
                seeder.out_len as f64 / out_rate_ms,
                seeder.shift,
                seeder.period,
                seeder.speed,
                seeder.period_jitter,
                seeder.voice_count,
                seeder.envelope,
                seeder.link.name,
                if seeder.link.state == BufferLinkState::Ready {
                    &seeder.link.file
                } else {
                    ""
                },
            );
            if seeder.link.state != BufferLinkState::Ready {
                let _ = writeln!(text, "  link state: {}", seeder.link.state);
            }
        }
        text
    }

    fn dump_grains(&self) -> String {
        let mut text = format!(
            "{} of {} grains in use, {} dropped\n",
            self.grains.count(),
            self.grains.capacity(),
            self.grains.dropped_count()
        );
        let out_rate_ms = self.seeders.out_rate_ms();
        for (count, (_, grain)) in self.grains.iter().enumerate() {
            let rate_ms = self
                .seeders
                .seeder(grain.seeder)
                .map(|seeder| seeder.link.sample_rate_ms)
                .unwrap_or(out_rate_ms)
                .max(f64::MIN_POSITIVE);
            let _ = writeln!(
                text,
                "grain {count}: seeder {} - ampl {:.2} - src {:.1} ms ({} smp) - \
                 len {:.1} ms ({} smp) - out {:.1} ms ({} smp) - left {} smp",
                grain.seeder,
                grain.amplitude,
                grain.src_begin as f64 / rate_ms,
                grain.src_begin,
                grain.src_len as f64 / rate_ms,
                grain.src_len,
                grain.out_len as f64 / out_rate_ms,
                grain.out_len,
                grain.out_countdown,
            );
        }
        text
    }

    fn dump_buffers(&self) -> String {
        let mut text = String::new();
        for index in 0..self.seeders.capacity() {
            let Ok(seeder) = self.seeders.seeder(index) else {
                continue;
            };
            let link = &seeder.link;
            let _ = writeln!(
                text,
                "seeder {index}: buffer '{}' [{}] - {} frames - {} channels - \
                 {:.1} kHz - file '{}'",
                link.name,
                link.state,
                link.frame_count,
                link.channel_count,
                link.sample_rate_ms,
                link.file,
            );
        }
        text
    }
}

// -------------------------------------------------------------------------------------------------

/// Draw the next inter-grain period in output frames.
///
/// The nominal period is scaled by `1 + jitter * u` with `u` uniform in
/// `[-1, 1]`, then floored at one frame so scheduling always advances.
pub(crate) fn jittered_period(rng: &mut SmallRng, period_len: i64, jitter: f64) -> i64 {
    let u = 2.0 * rng.random::<f64>() - 1.0;
    let period = (period_len as f64 * (1.0 + jitter * u)) as i64;
    period.max(1)
}

/// Walk all active seeders and spawn this block's grains.
fn run_scheduler(
    active: &IndexPool,
    seeders: &mut [Seeder],
    grains: &mut GrainPool,
    rng: &mut SmallRng,
    out_rate_ms: f64,
    block_len: i64,
) {
    for index in active.iter() {
        let seeder = &mut seeders[index];
        if seeder.period_len <= 0 || seeder.out_len <= 0 {
            continue;
        }
        let rate_ratio = seeder.link.sample_rate_ms / out_rate_ms;

        // Voice 0 carries the playback position: each spawned grain advances
        // the source region start by its own jittered period, scaled by the
        // speed and the buffer-to-output rate ratio.
        while seeder.voice_countdown[0] < block_len {
            grains.spawn(index, seeder, 0, seeder.voice_countdown[0]);

            let period = jittered_period(rng, seeder.period_len, seeder.period_jitter);
            seeder.voice_countdown[0] += period;
            seeder.src_begin += (period as f64 * seeder.speed * rate_ratio) as i64;

            // Loop the region: wrap to the buffer tail when moving backwards
            // past the head, restart at the head when overrunning the tail.
            if seeder.src_begin < 0 {
                seeder.src_begin = seeder.link.frame_count - seeder.src_len;
            }
            if seeder.src_begin + seeder.src_len > seeder.link.frame_count {
                seeder.src_begin = 0;
            }
        }

        // Secondary voices stagger their onsets but stay phase-locked to
        // voice 0's playback position via their countdown offset.
        for voice in 1..seeder.voice_count {
            while seeder.voice_countdown[voice] < block_len {
                let src_offset = ((seeder.voice_countdown[voice] - seeder.voice_countdown[0])
                    as f64
                    * seeder.speed
                    * rate_ratio) as i64;
                grains.spawn(index, seeder, src_offset, seeder.voice_countdown[voice]);
                seeder.voice_countdown[voice] +=
                    jittered_period(rng, seeder.period_len, seeder.period_jitter);
            }
            seeder.voice_countdown[voice] -= block_len;
        }
        seeder.voice_countdown[0] -= block_len;
    }
}

/// Mix all live grains into the output block and retire finished ones.
fn run_mixer(seeders: &SeederRegistry, grains: &mut GrainPool, output: &mut [f32], master: f64) {
    output.fill(0.0);

    let mut cursor = grains.head();
    while let Some(index) = grains.current(cursor) {
        let seeder_index = grains.grain(index).seeder;

        // A grain whose seeder or buffer went away is skipped and retired,
        // never rendered from stale state.
        let Ok(seeder) = seeders.seeder(seeder_index) else {
            grains.retire_at(cursor);
            continue;
        };
        let Some(handle) = seeder
            .link
            .reference
            .as_ref()
            .and_then(|reference| reference.resolve())
        else {
            grains.retire_at(cursor);
            continue;
        };

        let finished = {
            // Source access is scoped to this grain's rendering.
            let guard = handle.lock();
            let grain = grains.grain_mut(index);
            let frame_count = guard.frame_count() as i64;
            if grain.out_len < 2
                || grain.src_len < 1
                || guard.channel_count() == 0
                || grain.src_begin < 0
                || grain.src_begin + grain.src_len > frame_count
            {
                // Degenerate or stale region, e.g. after a buffer shrank.
                true
            } else {
                render_grain(
                    grain,
                    seeder.env_table.values(),
                    guard.samples(),
                    guard.channel_count(),
                    output,
                    master,
                )
            }
        };

        if finished {
            grains.retire_at(cursor);
        } else {
            cursor = grains.advance(cursor);
        }
    }
}

/// Render one grain into the block. Returns true when the grain finished.
///
/// Both the source and the envelope reads use a fixed-point accumulator: the
/// remainder advances by `len - 1` per output sample and wraps at
/// `out_len - 1`, so the interpolation fraction is `rem / (out_len - 1)`
/// without a per-sample divide.
fn render_grain(
    grain: &mut Grain,
    env_values: &[f32],
    samples: &[f32],
    channel_count: usize,
    output: &mut [f32],
    master: f64,
) -> bool {
    let block_len = output.len() as i64;
    let mult = master * grain.amplitude;
    let src_len = grain.src_len - 1;
    let out_len = grain.out_len - 1;
    let env_len = (env_values.len() - 1) as i64;
    let inv_out_len = 1.0 / out_len as f64;
    let last_frame = (samples.len() / channel_count - 1) as i64;

    let mut out_pos = grain.out_begin as usize;
    let mut n = block_len - grain.out_begin;
    while n > 0 && grain.out_countdown > 0 {
        let frame = (grain.src_begin + grain.src_index.min(src_len)).min(last_frame);
        let frame_index = frame as usize * channel_count;
        let next_index = (frame + 1).min(last_frame) as usize * channel_count;
        assume!(unsafe: frame_index < samples.len(), "region is pre-checked");
        assume!(unsafe: next_index < samples.len(), "region is pre-checked");
        let src_0 = samples[frame_index] as f64;
        let src_1 = samples[next_index] as f64;

        let env_index = grain.env_index.min(env_len) as usize;
        let env_next = (grain.env_index + 1).min(env_len) as usize;
        assume!(unsafe: env_index < env_values.len());
        assume!(unsafe: env_next < env_values.len());
        let env_0 = env_values[env_index] as f64;
        let env_1 = env_values[env_next] as f64;

        let env = env_0 + grain.env_rem as f64 * inv_out_len * (env_1 - env_0);
        let src = src_0 + grain.src_rem as f64 * inv_out_len * (src_1 - src_0);
        assume!(unsafe: out_pos < output.len());
        output[out_pos] += (mult * env * src) as f32;

        grain.src_rem += src_len;
        while grain.src_rem >= out_len {
            grain.src_rem -= out_len;
            grain.src_index += 1;
        }
        grain.env_rem += env_len;
        while grain.env_rem >= out_len {
            grain.env_rem -= out_len;
            grain.env_index += 1;
        }

        out_pos += 1;
        n -= 1;
        grain.out_countdown -= 1;
    }

    // Only a fresh grain starts mid-block; from now on it writes from 0.
    grain.out_begin = 0;
    grain.out_countdown == 0
}

/// Reflect out-of-range samples back into `[-1, 1]`.
///
/// This is a fold, not a clamp: a sum of 1.4 comes out as 0.6.
pub(crate) fn fold_output(output: &mut [f32]) {
    for value in output.iter_mut() {
        if *value > 1.0 {
            *value = 2.0 - *value;
        }
        if *value < -1.0 {
            *value = -2.0 - *value;
        }
    }
}

// -------------------------------------------------------------------------------------------------
