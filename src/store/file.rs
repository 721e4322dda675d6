use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::error::{StoreError, StoreResult};
use super::{PAGE_SIZE, PageId};

/// Page-granular access to a single backing file
pub struct PagedFile {
    file: File,
    path: PathBuf,
}

impl PagedFile {
    /// Create a new backing file (fails if it already exists)
    pub fn create<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Open an existing backing file for reading and writing
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new().read(true).write(true).open(path)?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Get the backing file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read a page into the buffer, zero-filling past end of file
    pub fn read_page(&mut self, page_id: PageId, buffer: &mut [u8]) -> StoreResult<()> {
        if buffer.len() != PAGE_SIZE {
            return Err(StoreError::InvalidPageSize {
                expected: PAGE_SIZE,
                actual: buffer.len(),
            });
        }

        let offset = (page_id * PAGE_SIZE) as u64;
        self.file.seek(SeekFrom::Start(offset))?;

        let mut filled = 0;
        while filled < PAGE_SIZE {
            let n = self.file.read(&mut buffer[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        if filled < PAGE_SIZE {
            buffer[filled..].fill(0);
        }

        Ok(())
    }

    /// Write a page, extending the file as needed
    pub fn write_page(&mut self, page_id: PageId, buffer: &[u8]) -> StoreResult<()> {
        if buffer.len() != PAGE_SIZE {
            return Err(StoreError::InvalidPageSize {
                expected: PAGE_SIZE,
                actual: buffer.len(),
            });
        }

        let offset = (page_id * PAGE_SIZE) as u64;
        let required_size = offset + PAGE_SIZE as u64;

        let current_size = self.file.metadata()?.len();
        if current_size < required_size {
            self.file.set_len(required_size)?;
        }

        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(buffer)?;
        // No per-write sync; sync() batches through the OS cache

        Ok(())
    }

    /// Get the number of pages in the file
    pub fn page_count(&self) -> StoreResult<usize> {
        let file_size = self.file.metadata()?.len();
        Ok(file_size.div_ceil(PAGE_SIZE as u64) as usize)
    }

    /// Flush OS buffers to disk
    pub fn sync(&mut self) -> StoreResult<()> {
        self.file.sync_data()?;
        Ok(())
    }
}
