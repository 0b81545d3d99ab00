//! Re-readable spooled payloads backing cached part streams.

use std::{
    fs::{self, File},
    io::{self, Read, Write},
    path::PathBuf,
};

use bytes::Bytes;
use uuid::Uuid;

use crate::{config::SpoolConfig, error::CodecError};

/// A payload buffer that lives in memory up to a threshold, then spills
/// to a uniquely named file under the configured spool directory.
///
/// Substituted for a live part stream when the codec must advance past a
/// part the consumer has not finished reading.
#[derive(Debug)]
pub(crate) struct SpooledPayload {
    backing: Backing,
    written: u64,
    threshold: usize,
    max_size: Option<u64>,
    directory: PathBuf,
}

#[derive(Debug)]
enum Backing {
    Memory(Vec<u8>),
    Disk { path: PathBuf, file: File },
}

impl SpooledPayload {
    pub(crate) fn new(config: &SpoolConfig, max_size: Option<u64>) -> Self {
        Self {
            backing: Backing::Memory(Vec::new()),
            written: 0,
            threshold: config.memory_threshold,
            max_size,
            directory: config.effective_directory(),
        }
    }

    pub(crate) fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }

        let next = self.written + bytes.len() as u64;
        if let Some(max) = self.max_size {
            if next > max {
                return Err(CodecError::PayloadTooLarge { max }.into_io());
            }
        }

        if let Backing::Memory(data) = &mut self.backing {
            if next > self.threshold as u64 {
                self.spill()?;
            } else {
                data.extend_from_slice(bytes);
                self.written = next;
                return Ok(());
            }
        }

        if let Backing::Disk { file, .. } = &mut self.backing {
            file.write_all(bytes)?;
        }
        self.written = next;
        Ok(())
    }

    fn spill(&mut self) -> io::Result<()> {
        let Backing::Memory(data) = &mut self.backing else {
            return Ok(());
        };

        fs::create_dir_all(&self.directory)?;
        let path = self
            .directory
            .join(format!("{}.spool", Uuid::new_v4().simple()));
        let mut file = File::create(&path)?;
        file.write_all(data)?;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            path = %path.display(),
            in_memory = data.len(),
            "spool: payload spilled to disk"
        );

        self.backing = Backing::Disk { path, file };
        Ok(())
    }

    /// Seals the payload for reading; no further writes are possible.
    pub(crate) fn seal(self) -> io::Result<SealedPayload> {
        let backing = match self.backing {
            Backing::Memory(data) => SealedBacking::Memory(Bytes::from(data)),
            Backing::Disk { path, mut file } => {
                file.flush()?;
                SealedBacking::Disk { path }
            }
        };
        Ok(SealedPayload { backing })
    }
}

/// A sealed, re-readable payload. Disk-backed payloads remove their spool
/// file on drop.
#[derive(Debug)]
pub(crate) struct SealedPayload {
    backing: SealedBacking,
}

#[derive(Debug)]
enum SealedBacking {
    Memory(Bytes),
    Disk { path: PathBuf },
}

impl SealedPayload {
    /// Opens a fresh reader over the full payload.
    pub(crate) fn reader(&self) -> io::Result<SpoolReader> {
        match &self.backing {
            SealedBacking::Memory(data) => Ok(SpoolReader::Memory {
                data: data.clone(),
                pos: 0,
            }),
            SealedBacking::Disk { path } => Ok(SpoolReader::Disk(File::open(path)?)),
        }
    }
}

impl Drop for SealedPayload {
    fn drop(&mut self) {
        if let SealedBacking::Disk { path } = &self.backing {
            let _ = fs::remove_file(path);
        }
    }
}

/// Reader over a sealed payload.
#[derive(Debug)]
pub(crate) enum SpoolReader {
    Memory { data: Bytes, pos: usize },
    Disk(File),
}

impl Read for SpoolReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Memory { data, pos } => {
                let remaining = &data[*pos..];
                let take = remaining.len().min(buf.len());
                buf[..take].copy_from_slice(&remaining[..take]);
                *pos += take;
                Ok(take)
            }
            Self::Disk(file) => file.read(buf),
        }
    }
}
