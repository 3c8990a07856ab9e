pub mod capture_recorder;
pub mod metadata;
pub mod wav_writer;
