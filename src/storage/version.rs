//! 版本资源读取
//!
//! 直接解析 PE 映像中的 `RT_VERSION` 资源，不执行文件。非 PE 文件或没有版本资源的
//! 文件返回全零版本，只有 I/O 错误才算失败。

use super::StorageError;
use crate::models::{FileVersion, VersionInfo};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};

const RT_VERSION: u32 = 16;
const FIXED_FILE_INFO_SIGNATURE: u32 = 0xFEEF_04BD;
/// 资源节读取上限
const MAX_RESOURCE_SECTION: usize = 16 * 1024 * 1024;

/// 版本资源读取接口
pub trait VersionReader: Send + Sync {
    fn read_version_info(&self, path: &str) -> Result<VersionInfo, StorageError>;
}

/// 解析 PE 文件的版本资源
#[derive(Debug, Default, Clone, Copy)]
pub struct PeVersionReader;

impl VersionReader for PeVersionReader {
    fn read_version_info(&self, path: &str) -> Result<VersionInfo, StorageError> {
        let file = File::open(path).map_err(|e| StorageError::from_io(path, e))?;
        let mut reader = BufReader::new(file);
        let info = read_version_resource(&mut reader).map_err(|e| StorageError::from_io(path, e))?;
        Ok(info.unwrap_or_default())
    }
}

/// 预置版本信息的读取器，用于测试
#[derive(Debug, Default)]
pub struct MemoryVersionReader {
    infos: HashMap<String, VersionInfo>,
    failing: HashSet<String>,
}

impl MemoryVersionReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, info: VersionInfo) -> &mut Self {
        self.infos.insert(path.into(), info);
        self
    }

    /// 读取该路径时返回 I/O 错误
    pub fn fail_on(&mut self, path: impl Into<String>) -> &mut Self {
        self.failing.insert(path.into());
        self
    }
}

impl VersionReader for MemoryVersionReader {
    fn read_version_info(&self, path: &str) -> Result<VersionInfo, StorageError> {
        if self.failing.contains(path) {
            return Err(StorageError::Io {
                path: path.to_string(),
                source: io::Error::new(io::ErrorKind::InvalidData, "corrupt version resource"),
            });
        }
        Ok(self.infos.get(path).cloned().unwrap_or_default())
    }
}

fn u16_at(buf: &[u8], off: usize) -> Option<u16> {
    buf.get(off..off + 2)?.try_into().ok().map(u16::from_le_bytes)
}

fn u32_at(buf: &[u8], off: usize) -> Option<u32> {
    buf.get(off..off + 4)?.try_into().ok().map(u32::from_le_bytes)
}

fn align4(off: usize) -> usize {
    (off + 3) & !3
}

/// 读取指定区间；文件过短时返回 None
fn read_at<R: Read + Seek>(r: &mut R, offset: u64, len: usize) -> io::Result<Option<Vec<u8>>> {
    r.seek(SeekFrom::Start(offset))?;
    let mut buf = vec![0u8; len];
    match r.read_exact(&mut buf) {
        Ok(()) => Ok(Some(buf)),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
        Err(e) => Err(e),
    }
}

/// 定位资源节并解析版本资源
pub fn read_version_resource<R: Read + Seek>(r: &mut R) -> io::Result<Option<VersionInfo>> {
    let Some(dos) = read_at(r, 0, 64)? else {
        return Ok(None);
    };
    if &dos[0..2] != b"MZ" {
        return Ok(None);
    }
    let Some(pe_offset) = u32_at(&dos, 0x3C).map(u64::from) else {
        return Ok(None);
    };

    // 签名 + COFF 文件头
    let Some(coff) = read_at(r, pe_offset, 24)? else {
        return Ok(None);
    };
    if &coff[0..4] != b"PE\0\0" {
        return Ok(None);
    }
    let section_count = u16_at(&coff, 6).unwrap_or(0) as usize;
    let optional_size = u16_at(&coff, 20).unwrap_or(0) as usize;

    let Some(optional) = read_at(r, pe_offset + 24, optional_size)? else {
        return Ok(None);
    };
    let data_dirs = match u16_at(&optional, 0) {
        Some(0x10b) => 96,
        Some(0x20b) => 112,
        _ => return Ok(None),
    };
    // 数据目录第 2 项是资源表
    let Some(resource_rva) = u32_at(&optional, data_dirs + 2 * 8) else {
        return Ok(None);
    };
    if resource_rva == 0 {
        return Ok(None);
    }

    let table_offset = pe_offset + 24 + optional_size as u64;
    let Some(table) = read_at(r, table_offset, section_count * 40)? else {
        return Ok(None);
    };

    for header in table.chunks_exact(40) {
        let (Some(virtual_size), Some(va), Some(raw_size), Some(raw_ptr)) = (
            u32_at(header, 8),
            u32_at(header, 12),
            u32_at(header, 16),
            u32_at(header, 20),
        ) else {
            continue;
        };
        let span = virtual_size.max(raw_size);
        if resource_rva < va || resource_rva >= va.saturating_add(span) {
            continue;
        }

        let len = (raw_size as usize).min(MAX_RESOURCE_SECTION);
        let Some(section) = read_at(r, u64::from(raw_ptr), len)? else {
            return Ok(None);
        };
        return Ok(parse_resource_section(&section, va, resource_rva));
    }

    Ok(None)
}

/// 在资源目录中查找条目，`id` 为 None 时取第一项
fn find_entry(rsrc: &[u8], dir: usize, id: Option<u32>) -> Option<u32> {
    let named = u16_at(rsrc, dir + 12)? as usize;
    let ids = u16_at(rsrc, dir + 14)? as usize;

    for i in 0..named + ids {
        let entry = dir + 16 + i * 8;
        let name = u32_at(rsrc, entry)?;
        let data = u32_at(rsrc, entry + 4)?;
        match id {
            Some(want) if name & 0x8000_0000 == 0 && name == want => return Some(data),
            Some(_) => continue,
            None => return Some(data),
        }
    }
    None
}

fn parse_resource_section(section: &[u8], section_va: u32, resource_rva: u32) -> Option<VersionInfo> {
    let base = (resource_rva - section_va) as usize;
    let rsrc = section.get(base..)?;

    // 类型 -> 名称 -> 语言，前两层必须是子目录
    let type_dir = find_entry(rsrc, 0, Some(RT_VERSION))?;
    if type_dir & 0x8000_0000 == 0 {
        return None;
    }
    let name_dir = find_entry(rsrc, (type_dir & 0x7FFF_FFFF) as usize, None)?;
    if name_dir & 0x8000_0000 == 0 {
        return None;
    }
    let data_entry = find_entry(rsrc, (name_dir & 0x7FFF_FFFF) as usize, None)?;
    if data_entry & 0x8000_0000 != 0 {
        return None;
    }

    let data_rva = u32_at(rsrc, data_entry as usize)?;
    let data_size = u32_at(rsrc, data_entry as usize + 4)? as usize;
    let start = data_rva.checked_sub(section_va)? as usize;
    let end = start.checked_add(data_size)?.min(section.len());
    parse_version_block(section.get(start..end)?)
}

/// `VS_VERSIONINFO` 及其子块的公共头
struct Block {
    key: String,
    value_off: usize,
    children_off: usize,
    end: usize,
}

fn read_utf16_z(buf: &[u8], mut off: usize, end: usize) -> (String, usize) {
    let mut units = Vec::new();
    while off + 2 <= end {
        match u16_at(buf, off) {
            Some(0) | None => {
                off += 2;
                break;
            }
            Some(unit) => units.push(unit),
        }
        off += 2;
    }
    (String::from_utf16_lossy(&units), off)
}

fn parse_block(buf: &[u8], off: usize) -> Option<Block> {
    let length = u16_at(buf, off)? as usize;
    let value_len = u16_at(buf, off + 2)? as usize;
    let value_type = u16_at(buf, off + 4)?;
    if length < 6 {
        return None;
    }
    let end = (off + length).min(buf.len());

    let (key, after_key) = read_utf16_z(buf, off + 6, end);
    let value_off = align4(after_key);
    // 文本值长度按 WORD 计
    let value_bytes = if value_type == 1 { value_len * 2 } else { value_len };
    let children_off = align4(value_off + value_bytes).min(end);

    Some(Block {
        key,
        value_off,
        children_off,
        end,
    })
}

fn children(buf: &[u8], parent: &Block) -> Vec<Block> {
    let mut out = Vec::new();
    let mut pos = parent.children_off;
    while pos + 6 <= parent.end {
        let Some(child) = parse_block(buf, pos) else {
            break;
        };
        pos = align4(child.end);
        out.push(child);
    }
    out
}

fn parse_version_block(buf: &[u8]) -> Option<VersionInfo> {
    let root = parse_block(buf, 0)?;
    if root.key != "VS_VERSION_INFO" {
        return None;
    }

    let mut info = VersionInfo::default();
    if u32_at(buf, root.value_off) == Some(FIXED_FILE_INFO_SIGNATURE) {
        let ms = u32_at(buf, root.value_off + 8)?;
        let ls = u32_at(buf, root.value_off + 12)?;
        info.version = FileVersion::new(ms >> 16, ms & 0xFFFF, ls >> 16, ls & 0xFFFF);
    }

    let string_info = children(buf, &root)
        .into_iter()
        .find(|b| b.key == "StringFileInfo");
    // 只取第一个语言表
    if let Some(table) = string_info.and_then(|s| children(buf, &s).into_iter().next()) {
        for entry in children(buf, &table) {
            let (value, _) = read_utf16_z(buf, entry.value_off, entry.end);
            match entry.key.as_str() {
                "FileDescription" => info.description = Some(value),
                "CompanyName" => info.company = Some(value),
                "ProductName" => info.product_name = Some(value),
                _ => {}
            }
        }
    }

    Some(info)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn utf16z(s: &str) -> Vec<u8> {
        s.encode_utf16()
            .chain(std::iter::once(0))
            .flat_map(|u| u.to_le_bytes())
            .collect()
    }

    fn pad4(buf: &mut Vec<u8>) {
        while buf.len() % 4 != 0 {
            buf.push(0);
        }
    }

    fn block(key: &str, value: &[u8], value_len: u16, value_type: u16, kids: Vec<Vec<u8>>) -> Vec<u8> {
        let mut buf = vec![0u8; 6];
        buf.extend(utf16z(key));
        pad4(&mut buf);
        buf.extend_from_slice(value);
        for kid in kids {
            pad4(&mut buf);
            buf.extend(kid);
        }
        let len = buf.len() as u16;
        buf[0..2].copy_from_slice(&len.to_le_bytes());
        buf[2..4].copy_from_slice(&value_len.to_le_bytes());
        buf[4..6].copy_from_slice(&value_type.to_le_bytes());
        buf
    }

    fn string_entry(key: &str, value: &str) -> Vec<u8> {
        let bytes = utf16z(value);
        block(key, &bytes, (bytes.len() / 2) as u16, 1, vec![])
    }

    fn version_resource() -> Vec<u8> {
        let mut fixed = vec![0u8; 52];
        fixed[0..4].copy_from_slice(&FIXED_FILE_INFO_SIGNATURE.to_le_bytes());
        fixed[8..12].copy_from_slice(&((1u32 << 16) | 2).to_le_bytes());
        fixed[12..16].copy_from_slice(&((3u32 << 16) | 4).to_le_bytes());

        let table = block(
            "040904b0",
            &[],
            0,
            1,
            vec![
                string_entry("CompanyName", "Acme"),
                string_entry("FileDescription", "Deployment tool"),
                string_entry("FileVersion", "1.2.3.4"),
            ],
        );
        let strings = block("StringFileInfo", &[], 0, 1, vec![table]);
        block("VS_VERSION_INFO", &fixed, 52, 0, vec![strings])
    }

    fn put_u16(buf: &mut [u8], off: usize, v: u16) {
        buf[off..off + 2].copy_from_slice(&v.to_le_bytes());
    }

    fn put_u32(buf: &mut [u8], off: usize, v: u32) {
        buf[off..off + 4].copy_from_slice(&v.to_le_bytes());
    }

    /// 最小 PE32 映像：一个 .rsrc 节，内含 RT_VERSION
    fn synthetic_pe(version: &[u8]) -> Vec<u8> {
        const PE: usize = 0x40;
        const OPT_SIZE: usize = 224;
        const RAW: usize = 0x200;
        const VA: u32 = 0x1000;

        let mut rsrc = vec![0u8; 0x58];
        // 类型目录
        put_u16(&mut rsrc, 14, 1);
        put_u32(&mut rsrc, 16, RT_VERSION);
        put_u32(&mut rsrc, 20, 0x8000_0000 | 0x18);
        // 名称目录
        put_u16(&mut rsrc, 0x18 + 14, 1);
        put_u32(&mut rsrc, 0x18 + 16, 1);
        put_u32(&mut rsrc, 0x18 + 20, 0x8000_0000 | 0x30);
        // 语言目录
        put_u16(&mut rsrc, 0x30 + 14, 1);
        put_u32(&mut rsrc, 0x30 + 16, 0x409);
        put_u32(&mut rsrc, 0x30 + 20, 0x48);
        // 数据项
        put_u32(&mut rsrc, 0x48, VA + 0x58);
        put_u32(&mut rsrc, 0x48 + 4, version.len() as u32);
        rsrc.extend_from_slice(version);

        let mut image = vec![0u8; RAW];
        image[0..2].copy_from_slice(b"MZ");
        put_u32(&mut image, 0x3C, PE as u32);
        image[PE..PE + 4].copy_from_slice(b"PE\0\0");
        put_u16(&mut image, PE + 4, 0x14c);
        put_u16(&mut image, PE + 6, 1);
        put_u16(&mut image, PE + 20, OPT_SIZE as u16);

        let opt = PE + 24;
        put_u16(&mut image, opt, 0x10b);
        put_u32(&mut image, opt + 96 + 16, VA);
        put_u32(&mut image, opt + 96 + 20, rsrc.len() as u32);

        let section = opt + OPT_SIZE;
        image[section..section + 5].copy_from_slice(b".rsrc");
        put_u32(&mut image, section + 8, rsrc.len() as u32);
        put_u32(&mut image, section + 12, VA);
        put_u32(&mut image, section + 16, rsrc.len() as u32);
        put_u32(&mut image, section + 20, RAW as u32);

        image.extend(rsrc);
        image
    }

    #[test]
    fn test_reads_synthetic_pe() {
        let image = synthetic_pe(&version_resource());
        let info = read_version_resource(&mut Cursor::new(image)).unwrap().unwrap();

        assert_eq!(info.version.to_string(), "1.2.3.4");
        assert_eq!(info.description.as_deref(), Some("Deployment tool"));
        assert_eq!(info.company.as_deref(), Some("Acme"));
        assert_eq!(info.product_name, None);
    }

    #[test]
    fn test_non_pe_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.exe");
        std::fs::write(&path, b"not an executable").unwrap();

        let info = PeVersionReader.read_version_info(path.to_str().unwrap()).unwrap();
        assert_eq!(info, VersionInfo::default());
    }

    #[test]
    fn test_pe_without_version_resource() {
        let mut image = synthetic_pe(&version_resource());
        // 把 RT_VERSION 改成 RT_ICON
        put_u32(&mut image, 0x200 + 16, 3);
        assert_eq!(read_version_resource(&mut Cursor::new(image)).unwrap(), None);
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.exe");
        let err = PeVersionReader
            .read_version_info(path.to_str().unwrap())
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[test]
    fn test_memory_reader() {
        let mut reader = MemoryVersionReader::new();
        reader
            .insert("/a.exe", VersionInfo {
                version: FileVersion::new(2, 0, 0, 1),
                ..Default::default()
            })
            .fail_on("/bad.exe");

        assert_eq!(reader.read_version_info("/a.exe").unwrap().version.to_string(), "2.0.0.1");
        assert_eq!(reader.read_version_info("/other.exe").unwrap(), VersionInfo::default());
        assert!(reader.read_version_info("/bad.exe").is_err());
    }
}
