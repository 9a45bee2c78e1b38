#![doc = include_str!("../README.md")]

// private mods (will be partly re-exported)
mod buffer;
mod engine;
mod envelope;
mod error;
mod grain;
mod pool;
mod seeder;
mod source;

// public, flat re-exports
pub use error::Error;

pub use buffer::{
    BufferHandle, BufferInfo, BufferProvider, BufferRef, MemoryBufferProvider, SampleGuard,
    SharedSampleBuffer,
};
pub use engine::{
    ControlMessage, DumpFilter, EngineEvent, GranularController, GranularEngine,
};
pub use envelope::{EnvelopeKind, EnvelopeTable, ENVELOPE_TABLE_SIZE};
pub use grain::GRAINS_MAX;
pub use pool::{Cursor, IndexPool};
pub use seeder::{
    BufferLinkState, SeederParameters, SeederSnapshot, POLY_MAX, SEEDERS_MAX,
};
pub use source::Source;
