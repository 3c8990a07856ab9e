pub mod audio_observer;
pub mod capability_provider;
pub mod file_decoder;
pub mod session_provider;
