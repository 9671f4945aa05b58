//! OLE Compound File Binary (CFB) reader
//! Used for legacy Excel (.xls) workbooks, legacy Word (.doc) documents and for
//! detecting encrypted Office Open XML packages, which are stored as compound files

use crate::error::InventoryError;
use crate::helpers::string::to_u16;
use crate::helpers::string::to_u64;
use crate::helpers::string::to_usize;
use crate::helpers::string::to_usize_iter;
use encoding_rs::UTF_16LE;
use std::collections::HashMap;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::ops::Range;
use thiserror::Error;

const MAX_REG_SECT: usize = 0xFFFFFFFB;

/// Streams smaller than this live in the mini stream
const MINI_STREAM_CUTOFF: usize = 4096;

/// OLE compound file signature
const SIGNATURE: u64 = 0xE11A_B1A1_E011_CFD0;

/// Errors specific to Compound File Binary format parsing
#[derive(Error, Debug)]
pub(crate) enum CfbError {
    #[error("The file is corrupted or has an invalid CFB structure")]
    FileFormatError,

    #[error("Invalid OLE signature (not an office document?)")]
    OleSignatureError,

    #[error("Invalid Sector size '2 ^ {1}' for major version '{0}'")]
    SectorSizeError(u16, u16),

    #[error("Sector '{0}' is outside of the file")]
    SectorOutOfRangeError(usize),

    #[error("Sector chain starting at '{0}' does not terminate")]
    SectorChainError(usize),

    #[error("The number of file allocation table error: expect '{0}', actual '{1}'")]
    FileAllocationTableError(usize, usize),

    #[error("Empty Root directory")]
    RootDirectoryError,
}

/// Compound File Binary structure representing the entire OLE file
pub(crate) struct Cfb {
    /// Directory index mapping names to directory entries
    directories: HashMap<String, Directory>,
    /// File allocation table for regular sectors
    file_allocation_table: Vec<usize>,
    /// Regular sectors containing file data
    sectors: Sectors,
    /// Mini file allocation table for small streams
    mini_file_allocation_table: Vec<usize>,
    /// Mini sectors for small streams (64-byte sectors)
    mini_sectors: Sectors,
}

impl Cfb {
    /// Creates a new CFB structure by reading and parsing the entire file
    pub(crate) fn new<RS: Read + Seek>(reader: &mut RS) -> Result<Cfb, InventoryError> {
        let size = reader.seek(SeekFrom::End(0))?;
        if size < 512 {
            Err(CfbError::FileFormatError)?;
        }
        reader.seek(SeekFrom::Start(0))?;
        let mut data: Vec<u8> = vec![0u8; size as usize];
        reader.read_exact(&mut data)?;

        let header = Header::new(&data[..512])?;
        let sectors = Sectors { data, size: header.sector_size()?, offset: 1 };
        let file_allocation_table = Self::load_file_allocation_table(&sectors, &header)?;
        let directories = Self::load_directories(&file_allocation_table, &sectors, header.directory_shift)?;
        let mini_file_allocation_table = Self::load_mini_file_allocation_table(&file_allocation_table, &sectors, &header)?;
        let mini_sectors = match directories.get("Root Entry") {
            Some(root) => Self::load_mini_sectors(&file_allocation_table, &sectors, root)?,
            None => Sectors { data: Vec::new(), size: 64, offset: 0 },
        };

        Ok(Cfb {
            directories,
            file_allocation_table,
            sectors,
            mini_file_allocation_table,
            mini_sectors,
        })
    }

    /// Checks if a stream exists in the CFB structure
    pub(crate) fn exists(&self, name: &str) -> bool {
        self.directories.contains_key(name)
    }

    /// Reads the contents of a stream from the CFB structure
    pub(crate) fn read(&self, name: &str) -> Result<Option<Vec<u8>>, InventoryError> {
        if let Some(directory) = self.directories.get(name) {
            let mut bytes = if directory.count < MINI_STREAM_CUTOFF {
                Self::read_bytes(&self.mini_file_allocation_table, &self.mini_sectors, directory.index)?
            } else {
                Self::read_bytes(&self.file_allocation_table, &self.sectors, directory.index)?
            };
            bytes.truncate(directory.count);
            Ok(Some(bytes))
        } else {
            Ok(None)
        }
    }

    /// Loads the file allocation table through the double indirect file allocation table
    fn load_file_allocation_table(sectors: &Sectors, header: &Header) -> Result<Vec<usize>, InventoryError> {
        let mut indirect_table = Vec::<usize>::new();
        indirect_table.extend(to_usize_iter(sectors.slice(76..512)?));

        let mut visited = 0usize;
        let mut index = header.double_indirect_file_allocation_table_shift;
        while index < MAX_REG_SECT {
            visited += 1;
            if visited > header.double_indirect_file_allocation_table_count {
                Err(CfbError::SectorChainError(header.double_indirect_file_allocation_table_shift))?
            }
            indirect_table.extend(to_usize_iter(sectors.get(index)?));
            index = indirect_table.pop().unwrap_or(usize::MAX);
        }

        let mut file_allocation_table: Vec<usize> = Vec::new();
        let mut count = 0usize;
        for index in indirect_table {
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

    /// Loads directory entries from the specified sector index
    fn load_directories(file_allocation_table: &[usize], sectors: &Sectors, index: usize) -> Result<HashMap<String, Directory>, InventoryError> {
        let bytes = Self::read_bytes(file_allocation_table, sectors, index)?;
        let directories: HashMap<String, Directory> = bytes.chunks_exact(128).map(Directory::new).collect();
        if directories.is_empty() {
            Err(CfbError::RootDirectoryError)?
        }
        Ok(directories)
    }

    /// Loads the mini file allocation table for small streams
    fn load_mini_file_allocation_table(file_allocation_table: &[usize], sectors: &Sectors, header: &Header) -> Result<Vec<usize>, InventoryError> {
        Ok(if header.mini_file_allocation_table_sector_count > 0 {
            let bytes = Self::read_bytes(file_allocation_table, sectors, header.mini_file_allocation_table_sector_shift)?;
            to_usize_iter(&bytes).collect()
        } else {
            Vec::new()
        })
    }

    /// Loads the mini stream held by the root entry
    fn load_mini_sectors(file_allocation_table: &[usize], sectors: &Sectors, root: &Directory) -> Result<Sectors, InventoryError> {
        let mut data = Self::read_bytes(file_allocation_table, sectors, root.index)?;
        data.truncate(root.count);
        Ok(Sectors { data, size: 64, offset: 0 })
    }

    /// Reads a stream by following its allocation chain
    fn read_bytes(file_allocation_table: &[usize], sectors: &Sectors, index: usize) -> Result<Vec<u8>, InventoryError> {
        let start = index;
        let mut content: Vec<u8> = Vec::new();
        let mut index = index;
        let mut visited = 0usize;
        while index < MAX_REG_SECT {
            visited += 1;
            if visited > file_allocation_table.len() {
                Err(CfbError::SectorChainError(start))?
            }
            content.extend_from_slice(sectors.get(index)?);
            index = *file_allocation_table
                .get(index)
                .ok_or(CfbError::SectorOutOfRangeError(index))?;
        }
        Ok(content)
    }
}

/// Container for the sectors of a compound file or of its mini stream
#[derive(Debug)]
struct Sectors {
    data: Vec<u8>,
    /// Size of individual sectors
    size: usize,
    /// Regular sectors start after the header, mini sectors at zero
    offset: usize,
}

impl Sectors {
    /// Gets the data for the sector at the specified index
    fn get(&self, index: usize) -> Result<&[u8], InventoryError> {
        let source = (index + self.offset) * self.size;
        let target = self.data.len().min(source + self.size);
        if source >= target {
            Err(CfbError::SectorOutOfRangeError(index))?
        }
        Ok(&self.data[source..target])
    }

    /// Gets a slice of data from the specified range
    fn slice(&self, range: Range<usize>) -> Result<&[u8], InventoryError> {
        let start = range.start;
        Ok(self.data.get(range).ok_or(CfbError::SectorOutOfRangeError(start))?)
    }
}

/// CFB file header structure
#[derive(Debug)]
struct Header {
    signature: u64,
    major_version: u16,
    sector_shift: u16,
    file_allocation_table_count: usize,
    directory_shift: usize,
    mini_file_allocation_table_sector_shift: usize,
    mini_file_allocation_table_sector_count: usize,
    double_indirect_file_allocation_table_shift: usize,
    double_indirect_file_allocation_table_count: usize,
}

impl Header {
    /// Parses the CFB header from the first 512 bytes of data
    fn new(data: &[u8]) -> Result<Self, InventoryError> {
        let header = Header {
            signature: to_u64(&data[0..8]),
            major_version: to_u16(&data[26..28]),
            sector_shift: to_u16(&data[30..32]),
            file_allocation_table_count: to_usize(&data[44..48]),
            directory_shift: to_usize(&data[48..52]),
            mini_file_allocation_table_sector_shift: to_usize(&data[60..64]),
            mini_file_allocation_table_sector_count: to_usize(&data[64..68]),
            double_indirect_file_allocation_table_shift: to_usize(&data[68..72]),
            double_indirect_file_allocation_table_count: to_usize(&data[72..76]),
        };

        if header.signature != SIGNATURE {
            Err(CfbError::OleSignatureError)?;
        }

        Ok(header)
    }

    /// Calculates the sector size based on major version and sector shift
    fn sector_size(&self) -> Result<usize, InventoryError> {
        if self.major_version == 3 && self.sector_shift == 0x0009 {
            Ok(512)
        } else if self.major_version == 4 && self.sector_shift == 0x000C {
            // Version 4 headers are padded with zeroes up to the first 4096-byte sector
            Ok(4096)
        } else {
            Err(CfbError::SectorSizeError(self.major_version, self.sector_shift))?
        }
    }
}

/// Directory entry representing a stream in the CFB structure
#[derive(Debug)]
struct Directory {
    index: usize,
    count: usize,
}

impl Directory {
    /// Creates a directory entry from its 128-byte record
    fn new(bytes: &[u8]) -> (String, Directory) {
        let size = (to_u16(&bytes[64..66]) as usize).min(64);
        let (name, _, _) = UTF_16LE.decode(&bytes[..size]);
        let name = match name.find('\0') {
            Some(position) => name[..position].to_owned(),
            None => name.to_string(),
        };

        let index = to_usize(&bytes[116..120]);
        let count = to_u64(&bytes[120..128]) as usize;
        (name, Directory { index, count })
    }
}

/// Checks whether the reader holds an encrypted Office Open XML package.
/// Password protected .xlsx/.docx files are compound files with an
/// `EncryptedPackage` stream instead of ZIP archives.
pub(crate) fn is_encrypted_package<RS: Read + Seek>(reader: &mut RS) -> bool {
    let encrypted = Cfb::new(reader)
        .map(|cfb| cfb.exists("EncryptedPackage"))
        .unwrap_or(false);
    let _ = reader.seek(SeekFrom::Start(0));
    encrypted
}
