use crate::engine::GranularEngine;

// -------------------------------------------------------------------------------------------------

// Types that can produce audio samples in `f32` format. `Send`able across threads.
pub trait Source: Send {
    // Write `output.len()` samples into `output` and return the number of
    // written samples. Must never block and never allocate.
    fn write(&mut self, output: &mut [f32]) -> usize;
    fn channel_count(&self) -> usize;
    fn sample_rate(&self) -> u32;
}

// -------------------------------------------------------------------------------------------------

impl Source for GranularEngine {
    fn write(&mut self, output: &mut [f32]) -> usize {
        self.process(output);
        output.len()
    }

    fn channel_count(&self) -> usize {
        // The engine mixes to a single channel; panning is left to the host.
        1
    }

    fn sample_rate(&self) -> u32 {
        GranularEngine::sample_rate(self)
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        buffer::MemoryBufferProvider, engine::GranularEngine, seeder::SeederParameters,
    };

    #[test]
    fn engine_writes_full_blocks() {
        let provider = Arc::new(MemoryBufferProvider::new());
        provider.register_with_content("pad", vec![0.25; 44100], 1, 44100);
        let (mut engine, _controller) = GranularEngine::new(44100, provider);
        engine.link_buffer(0, "pad").unwrap();
        engine.configure_seeder(0, &SeederParameters::default()).unwrap();
        engine.activate_seeder(0).unwrap();

        let source: &mut dyn Source = &mut engine;
        assert_eq!(source.channel_count(), 1);
        assert_eq!(source.sample_rate(), 44100);
        let mut block = vec![1.0_f32; 512];
        assert_eq!(source.write(&mut block), 512);
        // The mixer owns the block: residue from the caller is zeroed.
        assert!(block.iter().all(|sample| sample.abs() <= 1.0));
    }
}
