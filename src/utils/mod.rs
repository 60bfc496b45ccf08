pub mod constants;
pub mod filename;
pub mod progress;

pub use filename::{generate_default_output_filename, guess_source_from_filename};
pub use progress::ProgressReporter;
