//! Disk manager for LettyDB
//!
//! Reads and writes fixed-size pages of the single database file at
//! byte offset `page_id * PAGE_SIZE`. The disk manager owns the file
//! handle exclusively and has no knowledge of page contents; callers
//! serialize access if they share it across threads.

use crate::error::{Error, Result};
use crate::storage::page::{PageId, PAGE_SIZE};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Mutex;

/// Disk manager
#[derive(Debug)]
pub struct DiskManager {
    /// Open database file, guarded so page I/O can take `&self`
    file: Mutex<File>,
}

impl DiskManager {
    /// Open the database file, creating it if it does not exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Read one page into `buf`. Reads beyond the end of the file fail
    /// with `ReadError`.
    pub fn read_page(&self, page_id: PageId, buf: &mut [u8; PAGE_SIZE]) -> Result<()> {
        if page_id < 0 {
            return Err(Error::InvalidPage(page_id));
        }
        let mut file = self.file.lock().map_err(|_| Error::FileNotOpen)?;
        file.seek(SeekFrom::Start(page_id as u64 * PAGE_SIZE as u64))
            .map_err(|_| Error::SeekError(page_id))?;
        file.read_exact(buf).map_err(|_| Error::ReadError(page_id))?;
        Ok(())
    }

    /// Write one page and flush it to durable storage before returning.
    /// Writes beyond the current end of the file extend it implicitly.
    pub fn write_page(&self, page_id: PageId, buf: &[u8; PAGE_SIZE]) -> Result<()> {
        if page_id < 0 {
            return Err(Error::InvalidPage(page_id));
        }
        let mut file = self.file.lock().map_err(|_| Error::FileNotOpen)?;
        file.seek(SeekFrom::Start(page_id as u64 * PAGE_SIZE as u64))
            .map_err(|_| Error::SeekError(page_id))?;
        file.write_all(buf).map_err(|_| Error::WriteError(page_id))?;
        file.flush().map_err(|_| Error::WriteError(page_id))?;
        file.sync_data().map_err(|_| Error::WriteError(page_id))?;
        Ok(())
    }

    /// Number of whole pages currently in the file.
    pub fn page_count(&self) -> Result<u64> {
        let file = self.file.lock().map_err(|_| Error::FileNotOpen)?;
        Ok(file.metadata()?.len() / PAGE_SIZE as u64)
    }
}
