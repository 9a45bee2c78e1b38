use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, RwLock, RwLockReadGuard, Weak,
};

use dashmap::DashMap;

use crate::error::Error;

// -------------------------------------------------------------------------------------------------

/// Snapshot of a buffer's shape, taken without holding its sample lock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BufferInfo {
    /// Number of sample frames.
    pub frame_count: usize,
    /// Number of interleaved channels.
    pub channel_count: usize,
    /// Native sample rate in frames per millisecond.
    pub sample_rate_ms: f64,
}

impl BufferInfo {
    pub fn is_loaded(&self) -> bool {
        self.frame_count > 0 && self.channel_count > 0
    }
}

// -------------------------------------------------------------------------------------------------

#[derive(Debug, Default)]
struct BufferContent {
    samples: Vec<f32>,
    channel_count: usize,
    sample_rate_ms: f64,
}

// -------------------------------------------------------------------------------------------------

/// A named, shareable sample buffer with interleaved f32 content.
///
/// The audio thread takes scoped read access per grain via [`Self::lock`];
/// the control thread replaces content through [`Self::set_content`]. Every
/// content change bumps a generation counter, which seeders poll once per
/// block to re-derive their length-in-samples fields after a resize or
/// reload.
#[derive(Debug)]
pub struct SharedSampleBuffer {
    name: String,
    content: RwLock<BufferContent>,
    generation: AtomicU64,
}

impl SharedSampleBuffer {
    /// Create an empty buffer with the given name.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            content: RwLock::new(BufferContent::default()),
            generation: AtomicU64::new(0),
        }
    }

    /// Create a buffer from interleaved samples.
    pub fn with_content(
        name: &str,
        samples: Vec<f32>,
        channel_count: usize,
        sample_rate: u32,
    ) -> Self {
        let buffer = Self::new(name);
        buffer.set_content(samples, channel_count, sample_rate);
        buffer
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn info(&self) -> BufferInfo {
        let content = self.read_content();
        BufferInfo {
            frame_count: if content.channel_count > 0 {
                content.samples.len() / content.channel_count
            } else {
                0
            },
            channel_count: content.channel_count,
            sample_rate_ms: content.sample_rate_ms,
        }
    }

    /// Content generation, incremented on every mutation.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Replace the buffer's content and bump the generation.
    pub fn set_content(&self, samples: Vec<f32>, channel_count: usize, sample_rate: u32) {
        {
            let mut content = self.write_content();
            content.samples = samples;
            content.channel_count = channel_count.max(1);
            content.sample_rate_ms = sample_rate as f64 / 1000.0;
        }
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Scoped read access to the interleaved samples.
    pub fn lock(&self) -> SampleGuard<'_> {
        SampleGuard {
            content: self
                .content
                .read()
                .unwrap_or_else(|err| err.into_inner()),
        }
    }

    fn read_content(&self) -> RwLockReadGuard<'_, BufferContent> {
        self.content.read().unwrap_or_else(|err| err.into_inner())
    }

    fn write_content(&self) -> std::sync::RwLockWriteGuard<'_, BufferContent> {
        self.content.write().unwrap_or_else(|err| err.into_inner())
    }
}

// -------------------------------------------------------------------------------------------------

/// Scoped read guard over a buffer's samples.
pub struct SampleGuard<'a> {
    content: RwLockReadGuard<'a, BufferContent>,
}

impl SampleGuard<'_> {
    pub fn samples(&self) -> &[f32] {
        &self.content.samples
    }

    pub fn channel_count(&self) -> usize {
        self.content.channel_count
    }

    pub fn frame_count(&self) -> usize {
        if self.content.channel_count > 0 {
            self.content.samples.len() / self.content.channel_count
        } else {
            0
        }
    }
}

// -------------------------------------------------------------------------------------------------

/// Strong handle to a shared sample buffer.
pub type BufferHandle = Arc<SharedSampleBuffer>;

/// Non-owning reference to a shared sample buffer.
///
/// Seeders hold these so that a provider dropping a buffer invalidates the
/// link instead of keeping the samples alive.
#[derive(Debug, Clone)]
pub struct BufferRef(Weak<SharedSampleBuffer>);

impl BufferRef {
    pub fn new(handle: &BufferHandle) -> Self {
        Self(Arc::downgrade(handle))
    }

    /// Upgrade to a strong handle, if the buffer still exists.
    pub fn resolve(&self) -> Option<BufferHandle> {
        self.0.upgrade()
    }
}

// -------------------------------------------------------------------------------------------------

/// Capability through which the engine reaches named sample buffers.
///
/// Lookup runs on the audio thread when buffer links are (re)bound, so
/// implementations must not block on I/O there. File loading is an
/// out-of-band control operation.
pub trait BufferProvider: Send + Sync {
    /// Resolve a buffer name to a reference. `None` if unknown.
    fn lookup(&self, name: &str) -> Option<BufferRef>;

    /// Load an audio file's content into an existing buffer.
    fn load_file(&self, buffer: &BufferHandle, path: &str) -> Result<(), Error>;
}

// -------------------------------------------------------------------------------------------------

/// In-memory [`BufferProvider`] backed by a concurrent name map.
///
/// The embedding application registers decoded sample data up front; file
/// decoding itself is out of scope here, so [`BufferProvider::load_file`]
/// reports an error unless a loader-backed provider is used instead.
#[derive(Debug, Default)]
pub struct MemoryBufferProvider {
    buffers: DashMap<String, BufferHandle>,
}

impl MemoryBufferProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an empty buffer, replacing any previous one with this name.
    pub fn register(&self, name: &str) -> BufferHandle {
        let handle: BufferHandle = Arc::new(SharedSampleBuffer::new(name));
        self.buffers.insert(name.to_string(), Arc::clone(&handle));
        handle
    }

    /// Register a buffer with interleaved content.
    pub fn register_with_content(
        &self,
        name: &str,
        samples: Vec<f32>,
        channel_count: usize,
        sample_rate: u32,
    ) -> BufferHandle {
        let handle: BufferHandle = Arc::new(SharedSampleBuffer::with_content(
            name,
            samples,
            channel_count,
            sample_rate,
        ));
        self.buffers.insert(name.to_string(), Arc::clone(&handle));
        handle
    }

    /// Drop a buffer from the map. Existing weak references go stale.
    pub fn unregister(&self, name: &str) -> bool {
        self.buffers.remove(name).is_some()
    }
}

impl BufferProvider for MemoryBufferProvider {
    fn lookup(&self, name: &str) -> Option<BufferRef> {
        self.buffers.get(name).map(|entry| BufferRef::new(&entry))
    }

    fn load_file(&self, buffer: &BufferHandle, path: &str) -> Result<(), Error> {
        Err(Error::BufferError(format!(
            "cannot load '{path}' into buffer '{}': this provider has no decoder",
            buffer.name()
        )))
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_and_info() {
        let provider = MemoryBufferProvider::new();
        provider.register_with_content("pad", vec![0.0; 2000], 2, 44100);
        let handle = provider.lookup("pad").unwrap().resolve().unwrap();
        let info = handle.info();
        assert_eq!(info.frame_count, 1000);
        assert_eq!(info.channel_count, 2);
        assert!((info.sample_rate_ms - 44.1).abs() < 1e-9);
        assert!(info.is_loaded());
        assert!(provider.lookup("missing").is_none());
    }

    #[test]
    fn references_go_stale_after_unregister() {
        let provider = MemoryBufferProvider::new();
        provider.register("pad");
        let reference = provider.lookup("pad").unwrap();
        assert!(reference.resolve().is_some());
        assert!(provider.unregister("pad"));
        assert!(reference.resolve().is_none());
    }

    #[test]
    fn content_changes_bump_the_generation() {
        let buffer = SharedSampleBuffer::new("pad");
        assert_eq!(buffer.generation(), 0);
        assert!(!buffer.info().is_loaded());
        buffer.set_content(vec![0.5; 100], 1, 48000);
        assert_eq!(buffer.generation(), 1);
        assert_eq!(buffer.info().frame_count, 100);
        buffer.set_content(vec![0.0; 100], 1, 48000);
        assert_eq!(buffer.generation(), 2);
        let guard = buffer.lock();
        assert_eq!(guard.frame_count(), 100);
        assert!(guard.samples().iter().all(|s| *s == 0.0));
    }
}
