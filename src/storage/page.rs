//! Page constants and on-disk page views for LettyDB
//!
//! This module defines the fixed page geometry and the typed views over
//! raw page buffers: the database header, GAM pages, and sparse IAM pages.
//! All on-disk integers are little-endian and packed at fixed offsets.

use crate::error::{Error, Result};
use crate::storage::bitmap::{Bitmap, BitmapMut};

/// Page size in bytes (4KB)
pub const PAGE_SIZE: usize = 4096;

/// Number of consecutive pages in one extent
pub const EXTENT_SIZE: usize = 8;

/// Page ID type
pub type PageId = i32;

/// Sentinel ID for invalid/unallocated pages
pub const INVALID_PAGE_ID: PageId = -1;

/// The database header always lives at page 0
pub const HEADER_PAGE_ID: PageId = 0;

/// The first GAM page always lives at page 1
pub const FIRST_GAM_PAGE_ID: PageId = 1;

/// IAM head page for the sys_tables catalog table
pub const SYS_TABLES_IAM_PAGE_ID: PageId = 2;

/// IAM head page for the sys_columns catalog table
pub const SYS_COLUMNS_IAM_PAGE_ID: PageId = 3;

/// File signature stored in the first bytes of the header page
pub const DB_SIGNATURE: [u8; 8] = *b"LETTY\0\0\0";

/// Current on-disk format version
pub const DB_VERSION: u32 = 1;

/// GAM page header: just the next-page link
pub const GAM_HEADER_SIZE: usize = 4;

/// Extents tracked by one GAM page
pub const GAM_MAX_BITS: usize = (PAGE_SIZE - GAM_HEADER_SIZE) * 8;

/// Sparse IAM page header: next-page link + extent_range_start
pub const SPARSE_IAM_HEADER_SIZE: usize = 12;

/// Extents tracked by one sparse IAM page
pub const SPARSE_MAX_BITS: usize = (PAGE_SIZE - SPARSE_IAM_HEADER_SIZE) * 8;

/// Types of pages we support
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PageType {
    Header = 0,
    Gam = 1,
    Iam = 2,
    Data = 3,
    Index = 4,
}

impl PageType {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(PageType::Header),
            1 => Some(PageType::Gam),
            2 => Some(PageType::Iam),
            3 => Some(PageType::Data),
            4 => Some(PageType::Index),
            _ => None,
        }
    }
}

/// Global extent index of the extent containing `page_id`
pub fn extent_of(page_id: PageId) -> u64 {
    page_id as u64 / EXTENT_SIZE as u64
}

/// Start page of a global extent
pub fn extent_start_page(extent: u64) -> PageId {
    (extent * EXTENT_SIZE as u64) as PageId
}

/// Database header (page 0)
///
/// The entry point for locating everything else in the file: the GAM chain
/// and the IAM heads of the two system catalog tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseHeader {
    pub version: u32,
    pub page_size: u32,
    pub total_pages: u64,
    pub gam_page_id: PageId,
    pub sys_tables_iam_page: PageId,
    pub sys_columns_iam_page: PageId,
}

impl DatabaseHeader {
    /// Header for a freshly initialized database file
    pub fn new() -> Self {
        Self {
            version: DB_VERSION,
            page_size: PAGE_SIZE as u32,
            total_pages: EXTENT_SIZE as u64,
            gam_page_id: FIRST_GAM_PAGE_ID,
            sys_tables_iam_page: SYS_TABLES_IAM_PAGE_ID,
            sys_columns_iam_page: SYS_COLUMNS_IAM_PAGE_ID,
        }
    }

    /// Decode the header from a page buffer, verifying the signature.
    pub fn read_from(buf: &[u8; PAGE_SIZE]) -> Result<Self> {
        if buf[0..8] != DB_SIGNATURE {
            return Err(Error::CorruptDatabase(
                "file signature mismatch".to_string(),
            ));
        }
        Ok(Self {
            version: u32::from_le_bytes(buf[8..12].try_into().unwrap()),
            page_size: u32::from_le_bytes(buf[12..16].try_into().unwrap()),
            total_pages: u64::from_le_bytes(buf[16..24].try_into().unwrap()),
            gam_page_id: PageId::from_le_bytes(buf[24..28].try_into().unwrap()),
            sys_tables_iam_page: PageId::from_le_bytes(buf[28..32].try_into().unwrap()),
            sys_columns_iam_page: PageId::from_le_bytes(buf[32..36].try_into().unwrap()),
        })
    }

    /// Encode the header into a page buffer, zeroing the padding.
    pub fn write_to(&self, buf: &mut [u8; PAGE_SIZE]) {
        buf.fill(0);
        buf[0..8].copy_from_slice(&DB_SIGNATURE);
        buf[8..12].copy_from_slice(&self.version.to_le_bytes());
        buf[12..16].copy_from_slice(&self.page_size.to_le_bytes());
        buf[16..24].copy_from_slice(&self.total_pages.to_le_bytes());
        buf[24..28].copy_from_slice(&self.gam_page_id.to_le_bytes());
        buf[28..32].copy_from_slice(&self.sys_tables_iam_page.to_le_bytes());
        buf[32..36].copy_from_slice(&self.sys_columns_iam_page.to_le_bytes());
    }
}

impl Default for DatabaseHeader {
    fn default() -> Self {
        Self::new()
    }
}

/// View over a GAM (Global Allocation Map) page
///
/// Header is a single next-page link; the remainder of the page is a
/// bitmap where bit `i` of chain page `k` covers global extent
/// `k * GAM_MAX_BITS + i`.
pub struct GamPage<'a> {
    buf: &'a mut [u8; PAGE_SIZE],
}

impl<'a> GamPage<'a> {
    /// View an existing GAM page
    pub fn new(buf: &'a mut [u8; PAGE_SIZE]) -> Self {
        Self { buf }
    }

    /// Zero the buffer and initialize an empty GAM page
    pub fn init(buf: &'a mut [u8; PAGE_SIZE]) -> Self {
        buf.fill(0);
        let mut page = Self { buf };
        page.set_next_page_id(INVALID_PAGE_ID);
        page
    }

    pub fn next_page_id(&self) -> PageId {
        PageId::from_le_bytes(self.buf[0..4].try_into().unwrap())
    }

    pub fn set_next_page_id(&mut self, id: PageId) {
        self.buf[0..4].copy_from_slice(&id.to_le_bytes());
    }

    pub fn bitmap(&self) -> Bitmap<'_> {
        Bitmap::new(&self.buf[GAM_HEADER_SIZE..], GAM_MAX_BITS)
    }

    pub fn bitmap_mut(&mut self) -> BitmapMut<'_> {
        BitmapMut::new(&mut self.buf[GAM_HEADER_SIZE..], GAM_MAX_BITS)
    }
}

/// View over a sparse IAM (Index Allocation Map) page
///
/// Each page carries an explicit `extent_range_start` and covers the
/// global extents `[extent_range_start, extent_range_start + SPARSE_MAX_BITS)`.
/// Pages in a chain are strictly ascending by range start, which lets a
/// chain skip any number of empty ranges.
pub struct SparseIamPage<'a> {
    buf: &'a mut [u8; PAGE_SIZE],
}

impl<'a> SparseIamPage<'a> {
    /// View an existing sparse IAM page
    pub fn new(buf: &'a mut [u8; PAGE_SIZE]) -> Self {
        Self { buf }
    }

    /// Zero the buffer and initialize an empty sparse IAM page
    pub fn init(buf: &'a mut [u8; PAGE_SIZE], extent_range_start: u64) -> Self {
        buf.fill(0);
        let mut page = Self { buf };
        page.set_next_page_id(INVALID_PAGE_ID);
        page.set_extent_range_start(extent_range_start);
        page
    }

    pub fn next_page_id(&self) -> PageId {
        PageId::from_le_bytes(self.buf[0..4].try_into().unwrap())
    }

    pub fn set_next_page_id(&mut self, id: PageId) {
        self.buf[0..4].copy_from_slice(&id.to_le_bytes());
    }

    pub fn extent_range_start(&self) -> u64 {
        u64::from_le_bytes(self.buf[4..12].try_into().unwrap())
    }

    pub fn set_extent_range_start(&mut self, start: u64) {
        self.buf[4..12].copy_from_slice(&start.to_le_bytes());
    }

    pub fn bitmap(&self) -> Bitmap<'_> {
        Bitmap::new(&self.buf[SPARSE_IAM_HEADER_SIZE..], SPARSE_MAX_BITS)
    }

    pub fn bitmap_mut(&mut self) -> BitmapMut<'_> {
        BitmapMut::new(&mut self.buf[SPARSE_IAM_HEADER_SIZE..], SPARSE_MAX_BITS)
    }

    /// Aligned range start covering a global extent index
    pub fn range_start_for(extent: u64) -> u64 {
        (extent / SPARSE_MAX_BITS as u64) * SPARSE_MAX_BITS as u64
    }
}
