// dirqueue Infrastructure - System Adapters
// Implements: JobProcessor

pub mod subprocess_processor;

pub use subprocess_processor::SubprocessProcessor;
