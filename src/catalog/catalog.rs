//! System catalog for LettyDB
//!
//! The catalog is stored in the database file itself, in two bootstrap
//! tables that describe every table including themselves:
//!
//! - `sys_tables`: one fixed-length record per table (oid, name, IAM head
//!   page, column count)
//! - `sys_columns`: one fixed-length record per column (owning table oid,
//!   name, type, length, offset)
//!
//! The IAM heads of both tables live at fixed page ids written by the
//! extent manager when the file is created; everything else is found by
//! scanning their IAM chains.

use super::schema::{Column, Schema};
use super::types::DataType;
use crate::error::{Error, Result};
use crate::storage::disk::DiskManager;
use crate::storage::iam::IamManager;
use crate::storage::page::{
    extent_start_page, DatabaseHeader, PageId, EXTENT_SIZE, HEADER_PAGE_ID, PAGE_SIZE,
};
use crate::storage::slotted::{SlottedPage, SLOT_SIZE};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// OID of the sys_tables table itself
pub const SYS_TABLES_OID: u32 = 1;

/// OID of the sys_columns table
pub const SYS_COLUMNS_OID: u32 = 2;

/// First OID handed out to user tables
pub const FIRST_USER_OID: u32 = 100;

/// Hard limit on table and column names (bytes, including the NUL pad)
pub const MAX_NAME_LENGTH: usize = 32;

/// On-disk layout of one sys_tables tuple
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SysTablesRecord {
    pub oid: u32,
    pub name: String,
    /// IAM head page of the table's extent chain
    pub first_page_id: PageId,
    pub column_count: u16,
}

impl SysTablesRecord {
    pub const SIZE: usize = 42;

    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[0..4].copy_from_slice(&self.oid.to_le_bytes());
        encode_name(&self.name, &mut out[4..36]);
        out[36..40].copy_from_slice(&self.first_page_id.to_le_bytes());
        out[40..42].copy_from_slice(&self.column_count.to_le_bytes());
        out
    }

    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != Self::SIZE {
            return None;
        }
        Some(Self {
            oid: u32::from_le_bytes(bytes[0..4].try_into().unwrap()),
            name: decode_name(&bytes[4..36]),
            first_page_id: PageId::from_le_bytes(bytes[36..40].try_into().unwrap()),
            column_count: u16::from_le_bytes(bytes[40..42].try_into().unwrap()),
        })
    }
}

/// On-disk layout of one sys_columns tuple
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SysColumnsRecord {
    pub table_oid: u32,
    pub name: String,
    pub data_type: DataType,
    pub length: u16,
    pub offset: u16,
}

impl SysColumnsRecord {
    pub const SIZE: usize = 41;

    pub fn new(
        table_oid: u32,
        name: impl Into<String>,
        data_type: DataType,
        length: u16,
        offset: u16,
    ) -> Self {
        Self {
            table_oid,
            name: name.into(),
            data_type,
            length,
            offset,
        }
    }

    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[0..4].copy_from_slice(&self.table_oid.to_le_bytes());
        encode_name(&self.name, &mut out[4..36]);
        out[36] = self.data_type as u8;
        out[37..39].copy_from_slice(&self.length.to_le_bytes());
        out[39..41].copy_from_slice(&self.offset.to_le_bytes());
        out
    }

    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != Self::SIZE {
            return None;
        }
        Some(Self {
            table_oid: u32::from_le_bytes(bytes[0..4].try_into().unwrap()),
            name: decode_name(&bytes[4..36]),
            data_type: DataType::from_u8(bytes[36])?,
            length: u16::from_le_bytes(bytes[37..39].try_into().unwrap()),
            offset: u16::from_le_bytes(bytes[39..41].try_into().unwrap()),
        })
    }
}

fn encode_name(name: &str, out: &mut [u8]) {
    let bytes = name.as_bytes();
    out[..bytes.len()].copy_from_slice(bytes);
}

fn decode_name(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// In-memory description of a table, assembled from the catalog.
///
/// Owned by the caller; the catalog keeps no in-memory cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableMetadata {
    pub oid: u32,
    pub name: String,
    pub schema: Schema,
    /// IAM head page of the table's extent chain
    pub first_page_id: PageId,
}

/// Catalog manager - the authoritative owner of database metadata
#[derive(Debug)]
pub struct CatalogManager {
    disk: Arc<DiskManager>,
    iam: Arc<IamManager>,
}

impl CatalogManager {
    pub fn new(disk: Arc<DiskManager>, iam: Arc<IamManager>) -> Self {
        Self { disk, iam }
    }

    /// Bootstrap the system tables if this file has never had a catalog.
    pub fn init(&self) -> Result<()> {
        if self.get_table("sys_tables")?.is_none() {
            self.bootstrap()?;
        }
        Ok(())
    }

    /// Create a new user table. Fails when the name is taken or too long
    /// for the fixed-width catalog record.
    pub fn create_table(&self, name: &str, schema: &Schema) -> Result<()> {
        if name.len() >= MAX_NAME_LENGTH {
            return Err(Error::NameTooLong(name.to_string()));
        }
        for column in schema.columns() {
            if column.name.len() >= MAX_NAME_LENGTH {
                return Err(Error::NameTooLong(column.name.clone()));
            }
        }
        if self.get_table(name)?.is_some() {
            return Err(Error::TableAlreadyExists(name.to_string()));
        }

        let header = self.read_header()?;
        let oid = self.next_oid(&header)?;
        let iam_head = self.iam.create_iam_chain()?;

        let record = SysTablesRecord {
            oid,
            name: name.to_string(),
            first_page_id: iam_head,
            column_count: schema.column_count() as u16,
        };
        self.insert_record(header.sys_tables_iam_page, &record.encode())?;

        // All column records of one table go into a single page.
        let needed = schema.column_count() * (SysColumnsRecord::SIZE + SLOT_SIZE);
        let (page_id, mut buf) = self.find_page_with_space(header.sys_columns_iam_page, needed)?;
        {
            let mut page = SlottedPage::new(&mut buf);
            for column in schema.columns() {
                let record = SysColumnsRecord::new(
                    oid,
                    column.name.clone(),
                    column.data_type,
                    column.length,
                    column.offset,
                );
                page.insert_tuple(&record.encode())
                    .ok_or(Error::InvalidPage(page_id))?;
            }
        }
        self.disk.write_page(page_id, &buf)?;

        info!(name, oid, iam_head, "created table");
        Ok(())
    }

    /// Look a table up by name and assemble its metadata.
    pub fn get_table(&self, name: &str) -> Result<Option<TableMetadata>> {
        let header = self.read_header()?;

        for bytes in self.scan_records(header.sys_tables_iam_page)? {
            let Some(record) = SysTablesRecord::decode(&bytes) else {
                continue;
            };
            if record.name != name {
                continue;
            }

            // Second pass: collect this table's columns in insertion order.
            let mut columns = Vec::new();
            for col_bytes in self.scan_records(header.sys_columns_iam_page)? {
                let Some(col) = SysColumnsRecord::decode(&col_bytes) else {
                    continue;
                };
                if col.table_oid == record.oid {
                    columns.push(Column::new(col.name, col.data_type, col.length, col.offset));
                }
            }

            return Ok(Some(TableMetadata {
                oid: record.oid,
                name: record.name,
                schema: Schema::new(columns),
                first_page_id: record.first_page_id,
            }));
        }

        Ok(None)
    }

    /// Write the initial catalog contents for a fresh database file.
    fn bootstrap(&self) -> Result<()> {
        info!("bootstrapping system catalog");
        let header = self.read_header()?;

        // The fixed IAM heads exist but own no extents yet; give each
        // system table its first data extent.
        let sys_tables_first = self.iam.allocate_extent(header.sys_tables_iam_page)?;
        let sys_columns_first = self.iam.allocate_extent(header.sys_columns_iam_page)?;

        let mut buf = [0u8; PAGE_SIZE];
        {
            let mut page = SlottedPage::init(&mut buf);
            let tables = [
                SysTablesRecord {
                    oid: SYS_TABLES_OID,
                    name: "sys_tables".to_string(),
                    first_page_id: header.sys_tables_iam_page,
                    column_count: 4,
                },
                SysTablesRecord {
                    oid: SYS_COLUMNS_OID,
                    name: "sys_columns".to_string(),
                    first_page_id: header.sys_columns_iam_page,
                    column_count: 5,
                },
            ];
            for record in &tables {
                page.insert_tuple(&record.encode())
                    .ok_or(Error::InvalidPage(sys_tables_first))?;
            }
        }
        self.disk.write_page(sys_tables_first, &buf)?;

        let columns = [
            SysColumnsRecord::new(SYS_TABLES_OID, "oid", DataType::Integer, 4, 0),
            SysColumnsRecord::new(SYS_TABLES_OID, "name", DataType::Varchar, 32, 4),
            SysColumnsRecord::new(SYS_TABLES_OID, "first_page_id", DataType::Integer, 4, 36),
            SysColumnsRecord::new(SYS_TABLES_OID, "column_count", DataType::Integer, 2, 40),
            SysColumnsRecord::new(SYS_COLUMNS_OID, "table_oid", DataType::Integer, 4, 0),
            SysColumnsRecord::new(SYS_COLUMNS_OID, "name", DataType::Varchar, 32, 4),
            SysColumnsRecord::new(SYS_COLUMNS_OID, "type", DataType::Integer, 1, 36),
            SysColumnsRecord::new(SYS_COLUMNS_OID, "length", DataType::Integer, 2, 37),
            SysColumnsRecord::new(SYS_COLUMNS_OID, "offset", DataType::Integer, 2, 39),
        ];
        let mut buf = [0u8; PAGE_SIZE];
        {
            let mut page = SlottedPage::init(&mut buf);
            for record in &columns {
                page.insert_tuple(&record.encode())
                    .ok_or(Error::InvalidPage(sys_columns_first))?;
            }
        }
        self.disk.write_page(sys_columns_first, &buf)?;

        Ok(())
    }

    fn read_header(&self) -> Result<DatabaseHeader> {
        let mut buf = [0u8; PAGE_SIZE];
        self.disk.read_page(HEADER_PAGE_ID, &mut buf)?;
        DatabaseHeader::read_from(&buf)
    }

    /// Next OID: one past the highest recorded, starting at 100 for user
    /// tables. Recomputed by scan, so it survives restarts without any
    /// extra persistent state.
    fn next_oid(&self, header: &DatabaseHeader) -> Result<u32> {
        let mut max_oid = FIRST_USER_OID - 1;
        for bytes in self.scan_records(header.sys_tables_iam_page)? {
            if let Some(record) = SysTablesRecord::decode(&bytes) {
                max_oid = max_oid.max(record.oid);
            }
        }
        Ok(max_oid + 1)
    }

    /// All live tuples of one catalog table, in IAM-chain order.
    fn scan_records(&self, iam_head: PageId) -> Result<Vec<Vec<u8>>> {
        let mut records = Vec::new();
        let mut buf = [0u8; PAGE_SIZE];

        for extent in self.iam.extents(iam_head)? {
            let start = extent_start_page(extent);
            for offset in 0..EXTENT_SIZE {
                let page_id = start + offset as PageId;
                match self.disk.read_page(page_id, &mut buf) {
                    Ok(()) => {}
                    // Pages of the extent that were never written yet.
                    Err(Error::ReadError(_)) => continue,
                    Err(e) => return Err(e),
                }
                let page = SlottedPage::new(&mut buf);
                if !page.is_data_page() {
                    continue;
                }
                for slot in 0..page.num_slots() {
                    if let Some(tuple) = page.get_tuple(slot) {
                        records.push(tuple.to_vec());
                    }
                }
            }
        }

        Ok(records)
    }

    /// Find a data page of the object with at least `needed` free bytes,
    /// initializing untouched pages of its extents on the way, and
    /// allocating a fresh extent when every page is full.
    fn find_page_with_space(
        &self,
        iam_head: PageId,
        needed: usize,
    ) -> Result<(PageId, Box<[u8; PAGE_SIZE]>)> {
        let mut buf = Box::new([0u8; PAGE_SIZE]);

        for extent in self.iam.extents(iam_head)? {
            let start = extent_start_page(extent);
            for offset in 0..EXTENT_SIZE {
                let page_id = start + offset as PageId;
                match self.disk.read_page(page_id, &mut buf) {
                    Ok(()) => {
                        let page = SlottedPage::new(&mut buf);
                        if page.is_data_page() {
                            if page.free_space() >= needed {
                                return Ok((page_id, buf));
                            }
                        } else {
                            // Allocated but never formatted.
                            SlottedPage::init(&mut buf);
                            return Ok((page_id, buf));
                        }
                    }
                    Err(Error::ReadError(_)) => {
                        SlottedPage::init(&mut buf);
                        return Ok((page_id, buf));
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        let start = self.iam.allocate_extent(iam_head)?;
        debug!(iam_head, start, "grew catalog object by one extent");
        SlottedPage::init(&mut buf);
        Ok((start, buf))
    }

    /// Insert one record into the object, finding or creating a page with
    /// room for it.
    fn insert_record(&self, iam_head: PageId, data: &[u8]) -> Result<()> {
        let (page_id, mut buf) = self.find_page_with_space(iam_head, data.len() + SLOT_SIZE)?;
        SlottedPage::new(&mut buf)
            .insert_tuple(data)
            .ok_or(Error::InvalidPage(page_id))?;
        self.disk.write_page(page_id, &buf)?;
        Ok(())
    }
}
