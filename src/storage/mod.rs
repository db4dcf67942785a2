//! Storage engine module
//!
//! This module contains the storage substrate:
//! - Fixed-size page I/O (disk manager)
//! - Extent allocation via the chained GAM
//! - Per-object extent tracking via sparse IAM chains
//! - Slotted pages for variable-length records

pub mod bitmap;
pub mod disk;
pub mod extent;
pub mod iam;
pub mod page;
pub mod slotted;

pub use bitmap::{Bitmap, BitmapMut};
pub use disk::DiskManager;
pub use extent::ExtentManager;
pub use iam::IamManager;
pub use page::{
    DatabaseHeader, GamPage, PageId, PageType, SparseIamPage, EXTENT_SIZE, INVALID_PAGE_ID,
    PAGE_SIZE,
};
pub use slotted::SlottedPage;
