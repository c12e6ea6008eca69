//! Data sources beyond real microscope scans.

pub mod synth;

pub use synth::{SynthOutput, generate_corpus, vignette_profile};
