//! Extent manager for LettyDB
//!
//! Owns global extent allocation through the chained GAM bitmap. An
//! extent is EXTENT_SIZE consecutive pages and is the unit of allocation
//! for everything in the file. The manager also bootstraps a brand new
//! database file: header page, first GAM page, and the two empty IAM
//! heads for the system catalog tables.

use crate::error::Result;
use crate::storage::disk::DiskManager;
use crate::storage::page::{
    extent_of, extent_start_page, DatabaseHeader, GamPage, PageId, SparseIamPage, EXTENT_SIZE,
    FIRST_GAM_PAGE_ID, GAM_MAX_BITS, HEADER_PAGE_ID, INVALID_PAGE_ID, PAGE_SIZE,
    SYS_COLUMNS_IAM_PAGE_ID, SYS_TABLES_IAM_PAGE_ID,
};
use std::sync::{Arc, Mutex};
use tracing::{debug, trace};

/// Allocation cursor protected by the allocator lock.
///
/// Scans resume from the last GAM page known to have free bits; full
/// pages are never rescanned until a deallocation rewinds the cursor.
#[derive(Debug)]
struct GamCursor {
    /// GAM page the next allocation scan starts from
    page_id: PageId,
    /// Position of that page in the GAM chain
    chain_index: u64,
    /// Cached copy of one GAM page
    buf: Box<[u8; PAGE_SIZE]>,
    /// Which page the cache holds; INVALID_PAGE_ID when stale
    cached_page_id: PageId,
}

/// Extent manager
#[derive(Debug)]
pub struct ExtentManager {
    disk: Arc<DiskManager>,
    cursor: Mutex<GamCursor>,
}

impl ExtentManager {
    /// Open the extent manager over a database file.
    ///
    /// An empty file is bootstrapped in place; a non-empty file must carry
    /// the expected signature or the open fails with `CorruptDatabase`.
    pub fn open(disk: Arc<DiskManager>) -> Result<Self> {
        if disk.page_count()? == 0 {
            Self::initialize_new_db(&disk)?;
        } else {
            let mut buf = [0u8; PAGE_SIZE];
            disk.read_page(HEADER_PAGE_ID, &mut buf)?;
            DatabaseHeader::read_from(&buf)?;
        }

        Ok(Self {
            disk,
            cursor: Mutex::new(GamCursor {
                page_id: FIRST_GAM_PAGE_ID,
                chain_index: 0,
                buf: Box::new([0u8; PAGE_SIZE]),
                cached_page_id: INVALID_PAGE_ID,
            }),
        })
    }

    /// Write the fixed pages of a brand new database file.
    fn initialize_new_db(disk: &DiskManager) -> Result<()> {
        debug!("initializing new database file");

        let mut buf = [0u8; PAGE_SIZE];
        DatabaseHeader::new().write_to(&mut buf);
        disk.write_page(HEADER_PAGE_ID, &buf)?;

        let mut gam_buf = [0u8; PAGE_SIZE];
        // Extent 0 holds the header, this GAM, and the IAM heads.
        GamPage::init(&mut gam_buf).bitmap_mut().set(0);
        disk.write_page(FIRST_GAM_PAGE_ID, &gam_buf)?;

        let mut iam_buf = [0u8; PAGE_SIZE];
        SparseIamPage::init(&mut iam_buf, 0);
        disk.write_page(SYS_TABLES_IAM_PAGE_ID, &iam_buf)?;
        disk.write_page(SYS_COLUMNS_IAM_PAGE_ID, &iam_buf)?;

        Ok(())
    }

    /// Allocate one extent and return the page id of its first page.
    pub fn allocate_extent(&self) -> Result<PageId> {
        let mut cur = self.cursor.lock().unwrap();

        loop {
            if cur.cached_page_id != cur.page_id {
                let page_id = cur.page_id;
                self.disk.read_page(page_id, &mut cur.buf)?;
                cur.cached_page_id = page_id;
            }

            if let Some(bit) = GamPage::new(&mut cur.buf).bitmap().first_clear() {
                GamPage::new(&mut cur.buf).bitmap_mut().set(bit);
                self.disk.write_page(cur.page_id, &cur.buf)?;
                let extent = cur.chain_index * GAM_MAX_BITS as u64 + bit as u64;
                trace!(extent, gam_page = cur.page_id, "allocated extent");
                return Ok(extent_start_page(extent));
            }

            let next = GamPage::new(&mut cur.buf).next_page_id();
            if next != INVALID_PAGE_ID {
                // This page is full; the cursor stays past it until a
                // deallocation rewinds.
                cur.page_id = next;
                cur.chain_index += 1;
                cur.cached_page_id = INVALID_PAGE_ID;
                continue;
            }

            // End of the chain: grow it by one GAM page.
            let new_chain_index = cur.chain_index + 1;
            let new_page_id = self.create_gam_page(new_chain_index)?;
            GamPage::new(&mut cur.buf).set_next_page_id(new_page_id);
            self.disk.write_page(cur.page_id, &cur.buf)?;

            cur.page_id = new_page_id;
            cur.chain_index = new_chain_index;
            cur.cached_page_id = INVALID_PAGE_ID;
        }
    }

    /// Write a fresh GAM page for the given chain position and return its
    /// page id. Spare slots of the system extent (pages 4..8) are used up
    /// before the file is extended by a new extent.
    fn create_gam_page(&self, chain_index: u64) -> Result<PageId> {
        let candidate = SYS_COLUMNS_IAM_PAGE_ID as u64 + chain_index;
        if candidate < EXTENT_SIZE as u64 {
            let page_id = candidate as PageId;
            let mut buf = [0u8; PAGE_SIZE];
            GamPage::init(&mut buf);
            self.disk.write_page(page_id, &buf)?;
            debug!(page_id, chain_index, "created GAM page in system extent");
            return Ok(page_id);
        }

        // Extend the file by one extent; the new GAM claims its bit 0.
        let mut header_buf = [0u8; PAGE_SIZE];
        self.disk.read_page(HEADER_PAGE_ID, &mut header_buf)?;
        let mut header = DatabaseHeader::read_from(&header_buf)?;

        let page_id = header.total_pages as PageId;
        let mut buf = [0u8; PAGE_SIZE];
        GamPage::init(&mut buf).bitmap_mut().set(0);
        self.disk.write_page(page_id, &buf)?;

        header.total_pages += EXTENT_SIZE as u64;
        header.write_to(&mut header_buf);
        self.disk.write_page(HEADER_PAGE_ID, &header_buf)?;

        debug!(
            page_id,
            chain_index,
            total_pages = header.total_pages,
            "created GAM page in new extent"
        );
        Ok(page_id)
    }

    /// Free the extent starting at `start_page_id`.
    ///
    /// Deallocating INVALID_PAGE_ID, an unaligned page id, or the system
    /// extent is a silent no-op, so callers can hand back whatever they
    /// hold without pre-checking.
    pub fn deallocate_extent(&self, start_page_id: PageId) -> Result<()> {
        if start_page_id == INVALID_PAGE_ID
            || start_page_id < 0
            || start_page_id as usize % EXTENT_SIZE != 0
        {
            return Ok(());
        }
        let extent = extent_of(start_page_id);
        if extent == 0 {
            return Ok(());
        }

        let chain_index = extent / GAM_MAX_BITS as u64;
        let bit = (extent % GAM_MAX_BITS as u64) as usize;

        let mut cur = self.cursor.lock().unwrap();

        let mut page_id = FIRST_GAM_PAGE_ID;
        let mut buf = [0u8; PAGE_SIZE];
        for _ in 0..chain_index {
            self.disk.read_page(page_id, &mut buf)?;
            let next = GamPage::new(&mut buf).next_page_id();
            if next == INVALID_PAGE_ID {
                // The chain never covered this extent; nothing to clear.
                debug!(extent, "deallocate past end of GAM chain ignored");
                return Ok(());
            }
            page_id = next;
        }

        self.disk.read_page(page_id, &mut buf)?;
        GamPage::new(&mut buf).bitmap_mut().clear(bit);
        self.disk.write_page(page_id, &buf)?;
        trace!(extent, gam_page = page_id, "deallocated extent");

        if cur.cached_page_id == page_id {
            cur.cached_page_id = INVALID_PAGE_ID;
        }
        if chain_index < cur.chain_index {
            // Rewind so the next allocation sees the freed slot.
            cur.page_id = page_id;
            cur.chain_index = chain_index;
            cur.cached_page_id = INVALID_PAGE_ID;
        }

        Ok(())
    }

    /// Total pages recorded in the database header.
    pub fn total_pages(&self) -> Result<u64> {
        let mut buf = [0u8; PAGE_SIZE];
        self.disk.read_page(HEADER_PAGE_ID, &mut buf)?;
        Ok(DatabaseHeader::read_from(&buf)?.total_pages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use tempfile::tempdir;

    fn open_fresh() -> (tempfile::TempDir, Arc<DiskManager>, ExtentManager) {
        let dir = tempdir().unwrap();
        let disk = Arc::new(DiskManager::open(dir.path().join("test.db")).unwrap());
        let extents = ExtentManager::open(disk.clone()).unwrap();
        (dir, disk, extents)
    }

    #[test]
    fn test_bootstrap_writes_fixed_pages() {
        let (_dir, disk, extents) = open_fresh();

        let mut buf = [0u8; PAGE_SIZE];
        disk.read_page(HEADER_PAGE_ID, &mut buf).unwrap();
        let header = DatabaseHeader::read_from(&buf).unwrap();
        assert_eq!(header.total_pages, 8);
        assert_eq!(header.gam_page_id, 1);
        assert_eq!(header.sys_tables_iam_page, 2);
        assert_eq!(header.sys_columns_iam_page, 3);

        disk.read_page(FIRST_GAM_PAGE_ID, &mut buf).unwrap();
        let mut gam_buf = buf;
        let gam = GamPage::new(&mut gam_buf);
        assert!(gam.bitmap().is_set(0));
        assert_eq!(gam.bitmap().first_clear(), Some(1));
        assert_eq!(gam.next_page_id(), INVALID_PAGE_ID);

        for page in [SYS_TABLES_IAM_PAGE_ID, SYS_COLUMNS_IAM_PAGE_ID] {
            disk.read_page(page, &mut buf).unwrap();
            let mut iam_buf = buf;
            let iam = SparseIamPage::new(&mut iam_buf);
            assert_eq!(iam.extent_range_start(), 0);
            assert_eq!(iam.next_page_id(), INVALID_PAGE_ID);
            assert_eq!(iam.bitmap().first_clear(), Some(0));
        }

        assert_eq!(extents.total_pages().unwrap(), 8);
    }

    #[test]
    fn test_open_rejects_foreign_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("not_a_db.bin");
        let disk = Arc::new(DiskManager::open(&path).unwrap());
        let mut buf = [0u8; PAGE_SIZE];
        buf[0..8].copy_from_slice(b"GARBAGE\0");
        disk.write_page(0, &buf).unwrap();

        assert!(matches!(
            ExtentManager::open(disk),
            Err(Error::CorruptDatabase(_))
        ));
    }

    #[test]
    fn test_allocations_are_sequential_extents() {
        let (_dir, _disk, extents) = open_fresh();

        assert_eq!(extents.allocate_extent().unwrap(), 8);
        assert_eq!(extents.allocate_extent().unwrap(), 16);
        assert_eq!(extents.allocate_extent().unwrap(), 24);
    }

    #[test]
    fn test_allocation_state_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        {
            let disk = Arc::new(DiskManager::open(&path).unwrap());
            let extents = ExtentManager::open(disk).unwrap();
            assert_eq!(extents.allocate_extent().unwrap(), 8);
            assert_eq!(extents.allocate_extent().unwrap(), 16);
        }

        let disk = Arc::new(DiskManager::open(&path).unwrap());
        let extents = ExtentManager::open(disk.clone()).unwrap();
        assert_eq!(extents.allocate_extent().unwrap(), 24);

        let mut buf = [0u8; PAGE_SIZE];
        disk.read_page(FIRST_GAM_PAGE_ID, &mut buf).unwrap();
        let gam = GamPage::new(&mut buf);
        assert!(gam.bitmap().is_set(1));
        assert!(gam.bitmap().is_set(2));
        assert!(gam.bitmap().is_set(3));
    }

    #[test]
    fn test_deallocate_then_allocate_reuses_lowest() {
        let (_dir, _disk, extents) = open_fresh();

        let a = extents.allocate_extent().unwrap();
        let b = extents.allocate_extent().unwrap();
        let c = extents.allocate_extent().unwrap();
        assert_eq!((a, b, c), (8, 16, 24));

        extents.deallocate_extent(b).unwrap();
        assert_eq!(extents.allocate_extent().unwrap(), 16);
        assert_eq!(extents.allocate_extent().unwrap(), 32);
    }

    #[test]
    fn test_deallocate_noops() {
        let (_dir, disk, extents) = open_fresh();

        extents.deallocate_extent(INVALID_PAGE_ID).unwrap();
        extents.deallocate_extent(13).unwrap();
        extents.deallocate_extent(0).unwrap();

        // System extent bit stays set.
        let mut buf = [0u8; PAGE_SIZE];
        disk.read_page(FIRST_GAM_PAGE_ID, &mut buf).unwrap();
        assert!(GamPage::new(&mut buf).bitmap().is_set(0));
    }

    #[test]
    fn test_gam_chain_grows_into_system_extent() {
        let (_dir, disk, extents) = open_fresh();

        // Saturate the first GAM page.
        let mut buf = [0u8; PAGE_SIZE];
        disk.read_page(FIRST_GAM_PAGE_ID, &mut buf).unwrap();
        buf[crate::storage::page::GAM_HEADER_SIZE..].fill(0xFF);
        disk.write_page(FIRST_GAM_PAGE_ID, &buf).unwrap();

        let page = extents.allocate_extent().unwrap();
        // First bit of GAM chain page 1.
        assert_eq!(page, extent_start_page(GAM_MAX_BITS as u64));

        // The new GAM landed in a spare system-extent slot and the file was
        // not extended on its account.
        disk.read_page(FIRST_GAM_PAGE_ID, &mut buf).unwrap();
        assert_eq!(GamPage::new(&mut buf).next_page_id(), 4);
        disk.read_page(4, &mut buf).unwrap();
        let gam1 = GamPage::new(&mut buf);
        assert!(gam1.bitmap().is_set(0));
        assert_eq!(gam1.next_page_id(), INVALID_PAGE_ID);
        assert_eq!(extents.total_pages().unwrap(), 8);
    }

    #[test]
    fn test_deallocate_rewinds_across_chain_pages() {
        let (_dir, disk, extents) = open_fresh();

        // Saturate GAM #0 and allocate twice from GAM #1.
        let mut buf = [0u8; PAGE_SIZE];
        disk.read_page(FIRST_GAM_PAGE_ID, &mut buf).unwrap();
        buf[crate::storage::page::GAM_HEADER_SIZE..].fill(0xFF);
        disk.write_page(FIRST_GAM_PAGE_ID, &buf).unwrap();

        let first = extents.allocate_extent().unwrap();
        let second = extents.allocate_extent().unwrap();
        assert_eq!(first, extent_start_page(GAM_MAX_BITS as u64));
        assert_eq!(second, extent_start_page(GAM_MAX_BITS as u64 + 1));

        // Free an extent back on GAM #0; the cursor must rewind to see it.
        extents.deallocate_extent(16).unwrap();
        assert_eq!(extents.allocate_extent().unwrap(), 16);
    }
}
