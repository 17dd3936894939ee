pub(crate) mod biff8;
pub(crate) mod bytes;
pub(crate) mod cfb;
pub(crate) mod decode;
pub mod xml;
pub(crate) mod zip;

/// Builds an in-memory ZIP archive from `(name, content)` pairs.
#[cfg(test)]
pub(crate) fn zip_fixture(parts: &[(&str, &str)]) -> Vec<u8> {
    use std::io::Write;
    use ::zip::write::SimpleFileOptions;
    use ::zip::CompressionMethod;

    let mut writer = ::zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    for (name, content) in parts {
        writer.start_file(*name, options).expect("start zip entry");
        writer.write_all(content.as_bytes()).expect("write zip entry");
    }
    writer.finish().expect("finish zip").into_inner()
}

/// Builds a version 3 compound file holding the given streams.
///
/// Layout: header, one FAT sector, one directory sector, then each stream in
/// consecutive sectors. Streams shorter than the mini stream cutoff are
/// zero-padded up to it so that every stream lives in regular sectors. At
/// most three streams fit the directory sector.
#[cfg(test)]
pub(crate) fn compound_file_fixture(streams: &[(&str, &[u8])]) -> Vec<u8> {
    const SECTOR: usize = 512;
    const CUTOFF: usize = 4096;
    const FAT_SECTOR: u32 = 0xFFFF_FFFD;
    const END_OF_CHAIN: u32 = 0xFFFF_FFFE;
    const FREE: u32 = 0xFFFF_FFFF;

    fn directory_entry(name: &str, kind: u8, start: u32, size: u64) -> Vec<u8> {
        let mut entry = vec![0u8; 128];
        let name: Vec<u8> = name.encode_utf16().chain([0]).flat_map(u16::to_le_bytes).collect();
        entry[..name.len()].copy_from_slice(&name);
        entry[64..66].copy_from_slice(&(name.len() as u16).to_le_bytes());
        entry[66] = kind;
        for offset in [68, 72, 76] {
            entry[offset..offset + 4].copy_from_slice(&FREE.to_le_bytes());
        }
        entry[116..120].copy_from_slice(&start.to_le_bytes());
        entry[120..128].copy_from_slice(&size.to_le_bytes());
        entry
    }

    let mut fat = vec![FAT_SECTOR, END_OF_CHAIN];
    let mut directory = directory_entry("Root Entry", 5, END_OF_CHAIN, 0);
    let mut data = Vec::new();
    for (name, content) in streams {
        let size = content.len().max(CUTOFF);
        let mut content = content.to_vec();
        content.resize(size.next_multiple_of(SECTOR), 0);
        let first = fat.len() as u32;
        let count = (content.len() / SECTOR) as u32;
        fat.extend((1..=count).map(|next| if next == count { END_OF_CHAIN } else { first + next }));
        directory.extend(directory_entry(name, 2, first, size as u64));
        data.extend(content);
    }
    assert!(directory.len() <= SECTOR && fat.len() <= SECTOR / 4);
    directory.resize(SECTOR, 0);
    fat.resize(SECTOR / 4, FREE);

    let mut header = vec![0u8; SECTOR];
    header[..8].copy_from_slice(&[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1]);
    header[24..26].copy_from_slice(&0x003Eu16.to_le_bytes());
    header[26..28].copy_from_slice(&3u16.to_le_bytes());
    header[28..30].copy_from_slice(&0xFFFEu16.to_le_bytes());
    header[30..32].copy_from_slice(&9u16.to_le_bytes());
    header[32..34].copy_from_slice(&6u16.to_le_bytes());
    header[44..48].copy_from_slice(&1u32.to_le_bytes());
    header[48..52].copy_from_slice(&1u32.to_le_bytes());
    header[56..60].copy_from_slice(&(CUTOFF as u32).to_le_bytes());
    header[60..64].copy_from_slice(&END_OF_CHAIN.to_le_bytes());
    header[68..72].copy_from_slice(&END_OF_CHAIN.to_le_bytes());
    header[76..80].copy_from_slice(&0u32.to_le_bytes());
    for slot in header[80..].chunks_exact_mut(4) {
        slot.copy_from_slice(&FREE.to_le_bytes());
    }

    let mut bytes = header;
    bytes.extend(fat.iter().flat_map(|entry| entry.to_le_bytes()));
    bytes.extend(directory);
    bytes.extend(data);
    bytes
}
