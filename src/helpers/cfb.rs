//! OLE Compound File Binary (CFB) reader for legacy Excel (.xls) workbooks.
//! Loads the whole container into memory and resolves streams by name
//! through the sector allocation chains.

use crate::error::SheetError;
use crate::helpers::bytes::to_u16;
use crate::helpers::bytes::to_u64;
use crate::helpers::bytes::to_usize;
use crate::helpers::bytes::to_usize_iter;
use encoding_rs::UTF_16LE;
use std::collections::HashMap;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use thiserror::Error;

/// Sector ids at or above this value mark free sectors and chain ends.
const MAX_REG_SECT: usize = 0xFFFFFFFB;
const SIGNATURE: u64 = 0xE11A_B1A1_E011_CFD0;
const HEADER_SIZE: usize = 512;
const DIRECTORY_ENTRY_SIZE: usize = 128;
const MINI_SECTOR_SIZE: usize = 64;

#[derive(Error, Debug)]
pub enum CfbError {
    #[error("The file is corrupted or has an invalid CFB structure")]
    FileFormatError,

    #[error("Invalid OLE signature (not an office document?)")]
    OleSignatureError,

    #[error("Invalid Sector size '2 ^ {1}' for major version '{0}'")]
    SectorSizeError(u16, u16),

    #[error("The number of double indirect file allocation table error: expect '{0}', actual '{1}'")]
    DoubleIndirectFileAllocationTableError(usize, usize),

    #[error("The number of file allocation table error: expect '{0}', actual '{1}'")]
    FileAllocationTableError(usize, usize),

    #[error("Empty Root directory")]
    RootDirectoryError,
}

/// Compound file held in memory: the directory, both allocation tables and
/// the sector data they index.
pub(crate) struct Cfb {
    /// Stream entries by name
    directories: HashMap<String, Directory>,
    file_allocation_table: Vec<usize>,
    sectors: Sectors,
    mini_file_allocation_table: Vec<usize>,
    /// The mini stream, cut into 64-byte sectors
    mini_sectors: Sectors,
    /// Streams smaller than this live in the mini stream
    mini_stream_cutoff: usize,
}

impl Cfb {
    /// Reads and indexes the whole compound file.
    ///
    /// # Arguments
    /// * `reader` - Source positioned anywhere; it is rewound first
    ///
    /// # Returns
    /// * `Result<Cfb, SheetError>` - The indexed container, or a `CfbError`
    ///   when the header, allocation tables or directory are inconsistent
    pub(crate) fn new<RS: Read + Seek>(reader: &mut RS) -> Result<Cfb, SheetError> {
        let size = reader.seek(SeekFrom::End(0))?;
        if size < HEADER_SIZE as u64 {
            Err(CfbError::FileFormatError)?;
        }
        reader.seek(SeekFrom::Start(0))?;
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;

        let header = Header::new(&data[..HEADER_SIZE])?;
        let size = header.sector_size()?;
        let sectors = Sectors { data, size, offset: size };
        let file_allocation_table = Self::load_file_allocation_table(&sectors, &header)?;
        let directories = Self::load_directories(&file_allocation_table, &sectors, header.directory_shift)?;
        let mini_file_allocation_table = Self::load_mini_file_allocation_table(&file_allocation_table, &sectors, &header)?;
        let mini_sectors = match directories.get("Root Entry") {
            Some(root) => Self::load_mini_sectors(&file_allocation_table, &sectors, root)?,
            None => Sectors { data: Vec::new(), size: MINI_SECTOR_SIZE, offset: 0 },
        };
        tracing::trace!(
            streams = directories.len(),
            sector_size = sectors.size,
            "indexed compound file"
        );

        Ok(Cfb {
            directories,
            file_allocation_table,
            sectors,
            mini_file_allocation_table,
            mini_sectors,
            mini_stream_cutoff: header.mini_stream_cutoff,
        })
    }

    /// Returns true if a stream or storage called `name` exists.
    pub(crate) fn exists(&self, name: &str) -> bool {
        self.directories.contains_key(name)
    }

    /// Reads the whole stream called `name`, or None if there is none.
    pub(crate) fn read(&self, name: &str) -> Result<Option<Vec<u8>>, SheetError> {
        let Some(directory) = self.directories.get(name) else {
            return Ok(None);
        };
        let mut bytes = if directory.count < self.mini_stream_cutoff {
            Self::read_bytes(&self.mini_file_allocation_table, &self.mini_sectors, directory.index)?
        } else {
            Self::read_bytes(&self.file_allocation_table, &self.sectors, directory.index)?
        };
        if bytes.len() < directory.count {
            Err(CfbError::FileFormatError)?
        }
        bytes.truncate(directory.count);
        Ok(Some(bytes))
    }

    /// Collects the file allocation table from the sectors listed in the
    /// header and the chain of double indirect sectors.
    fn load_file_allocation_table(sectors: &Sectors, header: &Header) -> Result<Vec<usize>, SheetError> {
        let mut double_indirect_file_allocation_table = Vec::<usize>::new();
        double_indirect_file_allocation_table.extend(to_usize_iter(&sectors.data[76..HEADER_SIZE]));

        let mut count = 0usize;
        let mut index = header.double_indirect_file_allocation_table_shift;
        while index < MAX_REG_SECT {
            count += 1;
            if count > header.double_indirect_file_allocation_table_count {
                Err(CfbError::DoubleIndirectFileAllocationTableError(
                    header.double_indirect_file_allocation_table_count,
                    count,
                ))?
            }
            double_indirect_file_allocation_table.extend(to_usize_iter(sectors.get(index)?));
            // The last entry of each sector links to the next one
            index = double_indirect_file_allocation_table
                .pop()
                .ok_or(CfbError::FileFormatError)?;
        }
        if count != header.double_indirect_file_allocation_table_count {
            Err(CfbError::DoubleIndirectFileAllocationTableError(
                header.double_indirect_file_allocation_table_count,
                count,
            ))?
        }

        let mut file_allocation_table = Vec::new();
        let mut count = 0usize;
        for index in double_indirect_file_allocation_table {
            if index < MAX_REG_SECT {
                file_allocation_table.extend(to_usize_iter(sectors.get(index)?));
                count += 1;
            }
        }
        if count != header.file_allocation_table_count {
            Err(CfbError::FileAllocationTableError(header.file_allocation_table_count, count))?
        }
        Ok(file_allocation_table)
    }

    fn load_directories(
        file_allocation_table: &[usize],
        sectors: &Sectors,
        index: usize,
    ) -> Result<HashMap<String, Directory>, SheetError> {
        let bytes = Self::read_bytes(file_allocation_table, sectors, index)?;
        let directories: HashMap<String, Directory> = bytes
            .chunks_exact(DIRECTORY_ENTRY_SIZE)
            .map(Directory::new)
            .collect();
        if directories.is_empty() {
            Err(CfbError::RootDirectoryError)?
        }
        Ok(directories)
    }

    fn load_mini_file_allocation_table(
        file_allocation_table: &[usize],
        sectors: &Sectors,
        header: &Header,
    ) -> Result<Vec<usize>, SheetError> {
        Ok(if header.mini_file_allocation_table_sector_count > 0 {
            let bytes = Self::read_bytes(file_allocation_table, sectors, header.mini_file_allocation_table_sector_shift)?;
            to_usize_iter(&bytes).collect()
        } else {
            Vec::new()
        })
    }

    /// The mini stream is the content of the root entry.
    fn load_mini_sectors(file_allocation_table: &[usize], sectors: &Sectors, root: &Directory) -> Result<Sectors, SheetError> {
        let mut data = Self::read_bytes(file_allocation_table, sectors, root.index)?;
        data.truncate(root.count);
        Ok(Sectors { data, size: MINI_SECTOR_SIZE, offset: 0 })
    }

    /// Follows the allocation chain from `index`, concatenating the sectors.
    ///
    /// A chain longer than the table itself must loop and is rejected.
    fn read_bytes(file_allocation_table: &[usize], sectors: &Sectors, index: usize) -> Result<Vec<u8>, SheetError> {
        let mut content = Vec::new();
        let mut index = index;
        let mut remaining = file_allocation_table.len();
        while index < MAX_REG_SECT {
            if remaining == 0 {
                Err(CfbError::FileFormatError)?
            }
            remaining -= 1;
            content.extend_from_slice(sectors.get(index)?);
            index = *file_allocation_table.get(index).ok_or(CfbError::FileFormatError)?;
        }
        Ok(content)
    }
}

#[derive(Debug)]
struct Sectors {
    data: Vec<u8>,
    size: usize,
    /// Position of sector 0: regular sectors follow the header
    offset: usize,
}

impl Sectors {
    /// Data of the sector at `index`; the last sector may be short.
    fn get(&self, index: usize) -> Result<&[u8], SheetError> {
        let source = index
            .checked_mul(self.size)
            .and_then(|start| start.checked_add(self.offset))
            .filter(|start| *start < self.data.len())
            .ok_or(CfbError::FileFormatError)?;
        let target = self.data.len().min(source + self.size);
        Ok(&self.data[source..target])
    }
}

#[derive(Debug)]
struct Header {
    major_version: u16,
    sector_shift: u16,
    file_allocation_table_count: usize,
    directory_shift: usize,
    mini_stream_cutoff: usize,
    mini_file_allocation_table_sector_shift: usize,
    mini_file_allocation_table_sector_count: usize,
    double_indirect_file_allocation_table_shift: usize,
    double_indirect_file_allocation_table_count: usize,
}

impl Header {
    fn new(data: &[u8]) -> Result<Self, SheetError> {
        if to_u64(data, 0) != SIGNATURE {
            Err(CfbError::OleSignatureError)?;
        }
        Ok(Header {
            major_version: to_u16(data, 26),
            sector_shift: to_u16(data, 30),
            file_allocation_table_count: to_usize(data, 44),
            directory_shift: to_usize(data, 48),
            mini_stream_cutoff: to_usize(data, 56),
            mini_file_allocation_table_sector_shift: to_usize(data, 60),
            mini_file_allocation_table_sector_count: to_usize(data, 64),
            double_indirect_file_allocation_table_shift: to_usize(data, 68),
            double_indirect_file_allocation_table_count: to_usize(data, 72),
        })
    }

    fn sector_size(&self) -> Result<usize, SheetError> {
        match (self.major_version, self.sector_shift) {
            (3, 0x0009) => Ok(512),
            // Version 4 pads the 512-byte header with zeroes up to one sector
            (4, 0x000C) => Ok(4096),
            (version, shift) => Err(CfbError::SectorSizeError(version, shift))?,
        }
    }
}

#[derive(Debug)]
struct Directory {
    index: usize,
    count: usize,
}

impl Directory {
    /// Parses one 128-byte directory entry into its name and stream location.
    fn new(bytes: &[u8]) -> (String, Directory) {
        let size = (to_u16(bytes, 64) as usize).min(64);
        let (name, _, _) = UTF_16LE.decode(&bytes[..size]);
        let name = match name.find('\0') {
            Some(position) => name[..position].to_owned(),
            None => name.into_owned(),
        };
        let index = to_usize(bytes, 116);
        let count = usize::try_from(to_u64(bytes, 120)).unwrap_or(usize::MAX);
        (name, Directory { index, count })
    }
}
