//! IAM manager for LettyDB
//!
//! The GAM tracks every extent in the file; an IAM (Index Allocation Map)
//! chain tracks which of those extents belong to one catalog object. Each
//! chain page is sparse: it carries an explicit extent_range_start, so a
//! chain only spends pages on ranges the object actually populates. Chain
//! pages are kept strictly ascending by range start.
//!
//! The manager holds no page state of its own and is not internally
//! locked; each object is written by at most one session at a time.

use crate::error::{Error, Result};
use crate::storage::disk::DiskManager;
use crate::storage::extent::ExtentManager;
use crate::storage::page::{
    extent_of, PageId, SparseIamPage, INVALID_PAGE_ID, PAGE_SIZE, SPARSE_MAX_BITS,
};
use std::sync::Arc;
use tracing::{debug, trace};

/// IAM manager
#[derive(Debug)]
pub struct IamManager {
    disk: Arc<DiskManager>,
    extents: Arc<ExtentManager>,
}

impl IamManager {
    pub fn new(disk: Arc<DiskManager>, extents: Arc<ExtentManager>) -> Self {
        Self { disk, extents }
    }

    /// Create a new empty IAM chain and return its head page id.
    ///
    /// The head is the first page of a freshly allocated extent and always
    /// covers range 0.
    pub fn create_iam_chain(&self) -> Result<PageId> {
        let head_page = self.extents.allocate_extent()?;

        let mut buf = [0u8; PAGE_SIZE];
        SparseIamPage::init(&mut buf, 0);
        self.disk.write_page(head_page, &buf)?;

        debug!(head_page, "created IAM chain");
        Ok(head_page)
    }

    /// Allocate a physical extent and record it in this object's chain.
    /// Returns the start page of the new extent.
    pub fn allocate_extent(&self, iam_head: PageId) -> Result<PageId> {
        if iam_head == INVALID_PAGE_ID || iam_head < 0 {
            return Err(Error::InvalidPage(iam_head));
        }

        let start_page = self.extents.allocate_extent()?;
        let extent = extent_of(start_page);
        trace!(extent, start_page, iam_head, "recording extent in IAM chain");

        // A failure past this point leaks the physical extent; a recovery
        // sweep is out of scope.
        let (iam_page_id, bit) = self.find_or_create_page_for(iam_head, extent)?;

        let mut buf = [0u8; PAGE_SIZE];
        self.disk.read_page(iam_page_id, &mut buf)?;
        let mut iam = SparseIamPage::new(&mut buf);
        if iam.bitmap().is_set(bit) {
            return Err(Error::CorruptDatabase(format!(
                "extent {extent} already recorded in IAM page {iam_page_id}"
            )));
        }
        iam.bitmap_mut().set(bit);
        self.disk.write_page(iam_page_id, &buf)?;

        Ok(start_page)
    }

    /// Global extent indices of every extent in the chain, in ascending
    /// order.
    pub fn extents(&self, iam_head: PageId) -> Result<Vec<u64>> {
        if iam_head == INVALID_PAGE_ID || iam_head < 0 {
            return Err(Error::InvalidPage(iam_head));
        }

        let mut result = Vec::new();
        let mut page_id = iam_head;
        let mut buf = [0u8; PAGE_SIZE];
        while page_id != INVALID_PAGE_ID {
            self.disk.read_page(page_id, &mut buf)?;
            let iam = SparseIamPage::new(&mut buf);
            let range_start = iam.extent_range_start();
            for bit in 0..SPARSE_MAX_BITS {
                if iam.bitmap().is_set(bit) {
                    result.push(range_start + bit as u64);
                }
            }
            page_id = iam.next_page_id();
        }
        Ok(result)
    }

    /// Number of pages in the chain.
    pub fn chain_len(&self, iam_head: PageId) -> Result<usize> {
        let mut len = 0;
        let mut page_id = iam_head;
        let mut buf = [0u8; PAGE_SIZE];
        while page_id != INVALID_PAGE_ID {
            self.disk.read_page(page_id, &mut buf)?;
            len += 1;
            page_id = SparseIamPage::new(&mut buf).next_page_id();
        }
        Ok(len)
    }

    /// Write a fresh sparse IAM page covering the given range on a newly
    /// allocated extent and return its page id.
    fn create_sparse_iam_page(&self, range_start: u64) -> Result<PageId> {
        let page_id = self.extents.allocate_extent()?;

        let mut buf = [0u8; PAGE_SIZE];
        SparseIamPage::init(&mut buf, range_start);
        self.disk.write_page(page_id, &buf)?;

        debug!(page_id, range_start, "created sparse IAM page");
        Ok(page_id)
    }

    /// Locate the chain page covering `extent`, creating and splicing one
    /// in if the range is not represented yet. Returns the page id and the
    /// bit offset of the extent within it.
    fn find_or_create_page_for(&self, iam_head: PageId, extent: u64) -> Result<(PageId, usize)> {
        let target_range = SparseIamPage::range_start_for(extent);
        let bit = (extent - target_range) as usize;

        let mut current = iam_head;
        let mut prev = INVALID_PAGE_ID;
        let mut buf = [0u8; PAGE_SIZE];

        while current != INVALID_PAGE_ID {
            self.disk.read_page(current, &mut buf)?;
            let iam = SparseIamPage::new(&mut buf);
            let range_start = iam.extent_range_start();
            let next = iam.next_page_id();

            if range_start == target_range {
                return Ok((current, bit));
            }

            if range_start > target_range {
                // Splice a new page in front of the current one. The head
                // always covers range 0, so there is always a previous page
                // here.
                let new_page = self.create_sparse_iam_page(target_range)?;
                self.disk.read_page(new_page, &mut buf)?;
                SparseIamPage::new(&mut buf).set_next_page_id(current);
                self.disk.write_page(new_page, &buf)?;

                if prev != INVALID_PAGE_ID {
                    self.disk.read_page(prev, &mut buf)?;
                    SparseIamPage::new(&mut buf).set_next_page_id(new_page);
                    self.disk.write_page(prev, &buf)?;
                }

                debug!(new_page, target_range, before = current, "spliced IAM page");
                return Ok((new_page, bit));
            }

            prev = current;
            current = next;
        }

        // Past the end of the chain: append.
        let new_page = self.create_sparse_iam_page(target_range)?;
        if prev != INVALID_PAGE_ID {
            self.disk.read_page(prev, &mut buf)?;
            SparseIamPage::new(&mut buf).set_next_page_id(new_page);
            self.disk.write_page(prev, &buf)?;
        }

        debug!(new_page, target_range, "appended IAM page");
        Ok((new_page, bit))
    }
}
