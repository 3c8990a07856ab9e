use std::fs::{self, File};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::models::audio_format::AudioFormatOptions;
use crate::models::error::AudioIoError;
use crate::processing::wav_format;

/// Streaming WAV writer for one captured input session.
///
/// ```text
/// [44-byte WAV header, sizes patched on close]
/// [raw PCM chunks in capture order...]
/// ```
pub struct WavFileWriter {
    file_path: PathBuf,
    format: AudioFormatOptions,
    file: Option<File>,
    data_bytes: u64,
}

impl WavFileWriter {
    pub fn new(file_path: PathBuf, format: AudioFormatOptions) -> Self {
        Self {
            file_path,
            format,
            file: None,
            data_bytes: 0,
        }
    }

    /// Create the file (and its directory) and write a placeholder header.
    pub fn open(&mut self) -> Result<(), AudioIoError> {
        if self.file.is_some() {
            return Ok(());
        }

        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| AudioIoError::Io(format!("failed to create directory: {}", e)))?;
        }

        let mut file = File::create(&self.file_path)
            .map_err(|e| AudioIoError::Io(format!("failed to create file: {}", e)))?;
        file.write_all(&wav_format::generate_wav_header(&self.format, 0))
            .map_err(|e| AudioIoError::Io(format!("failed to write header: {}", e)))?;

        self.file = Some(file);
        Ok(())
    }

    pub fn write(&mut self, pcm: &[u8]) -> Result<(), AudioIoError> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| AudioIoError::Io("file is not open for writing".into()))?;
        file.write_all(pcm)
            .map_err(|e| AudioIoError::Io(format!("write failed: {}", e)))?;
        self.data_bytes += pcm.len() as u64;
        Ok(())
    }

    /// Patch the header sizes, flush, and return the SHA-256 of the file.
    pub fn close(&mut self) -> Result<String, AudioIoError> {
        let mut file = self
            .file
            .take()
            .ok_or_else(|| AudioIoError::Io("file is not open".into()))?;

        let mut header = wav_format::generate_wav_header(&self.format, 0);
        wav_format::patch_sizes(&mut header, self.data_bytes);
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&header)?;
        file.flush()?;
        drop(file);

        sha256_file(&self.file_path)
    }

    /// Close without finalizing and delete the file.
    pub fn discard(&mut self) -> Result<(), AudioIoError> {
        drop(self.file.take());
        match fs::remove_file(&self.file_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AudioIoError::Io(format!("failed to delete recording: {}", e))),
        }
    }

    /// PCM bytes written so far, header excluded.
    pub fn data_bytes(&self) -> u64 {
        self.data_bytes
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }
}

fn sha256_file(path: &Path) -> Result<String, AudioIoError> {
    let data = fs::read(path).map_err(|e| AudioIoError::Io(format!("failed to read file for checksum: {}", e)))?;
    Ok(hex_encode(&Sha256::digest(&data)))
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
