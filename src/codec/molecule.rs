//! Molecule layout primitives.
//!
//! Molecule has four composite layouts used by CKB:
//! - fixvec: `u32 item_count ‖ items` for fixed-size items
//! - dynvec / table: `u32 total_size ‖ u32 offsets… ‖ items`
//! - option: empty for `None`, the inner encoding otherwise
//! - struct: plain concatenation of fixed-size fields

use crate::error::{Error, Result};

const HEADER: usize = 4;

/// Little-endian u16
pub fn pack_u16(value: u16) -> [u8; 2] {
    value.to_le_bytes()
}

/// Little-endian u32
pub fn pack_u32(value: u32) -> [u8; 4] {
    value.to_le_bytes()
}

/// Little-endian u64
pub fn pack_u64(value: u64) -> [u8; 8] {
    value.to_le_bytes()
}

/// Little-endian u128
pub fn pack_u128(value: u128) -> [u8; 16] {
    value.to_le_bytes()
}

/// `Bytes`: a fixvec of single bytes
pub fn pack_bytes(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER + data.len());
    out.extend_from_slice(&pack_u32(data.len() as u32));
    out.extend_from_slice(data);
    out
}

/// fixvec of already-encoded fixed-size items
pub fn pack_fixvec<T: AsRef<[u8]>>(items: &[T]) -> Vec<u8> {
    let mut out = pack_u32(items.len() as u32).to_vec();
    for item in items {
        out.extend_from_slice(item.as_ref());
    }
    out
}

/// dynvec of already-encoded items
pub fn pack_dynvec<T: AsRef<[u8]>>(items: &[T]) -> Vec<u8> {
    let header_size = HEADER * (items.len() + 1);
    let body_size: usize = items.iter().map(|i| i.as_ref().len()).sum();
    let total = if items.is_empty() { HEADER } else { header_size + body_size };

    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(&pack_u32(total as u32));
    let mut offset = header_size;
    for item in items {
        out.extend_from_slice(&pack_u32(offset as u32));
        offset += item.as_ref().len();
    }
    for item in items {
        out.extend_from_slice(item.as_ref());
    }
    out
}

/// Table: same layout as a dynvec, with a fixed field count
pub fn pack_table<T: AsRef<[u8]>>(fields: &[T]) -> Vec<u8> {
    pack_dynvec(fields)
}

/// Option: absent is zero bytes, never a null marker
pub fn pack_option(inner: Option<Vec<u8>>) -> Vec<u8> {
    inner.unwrap_or_default()
}

fn short(what: &str, need: usize, got: usize) -> Error {
    Error::encoding(what, format!("need {} bytes, got {}", need, got))
}

/// Read a little-endian u16 from exactly two bytes
pub fn unpack_u16(data: &[u8], what: &str) -> Result<u16> {
    let bytes: [u8; 2] = data.try_into().map_err(|_| short(what, 2, data.len()))?;
    Ok(u16::from_le_bytes(bytes))
}

/// Read a little-endian u32 from exactly four bytes
pub fn unpack_u32(data: &[u8], what: &str) -> Result<u32> {
    let bytes: [u8; 4] = data.try_into().map_err(|_| short(what, 4, data.len()))?;
    Ok(u32::from_le_bytes(bytes))
}

/// Read a little-endian u64 from exactly eight bytes
pub fn unpack_u64(data: &[u8], what: &str) -> Result<u64> {
    let bytes: [u8; 8] = data.try_into().map_err(|_| short(what, 8, data.len()))?;
    Ok(u64::from_le_bytes(bytes))
}

/// Read a little-endian u128 from the first sixteen bytes
///
/// xUDT cell data may carry extension bytes after the amount.
pub fn unpack_u128_prefix(data: &[u8], what: &str) -> Result<u128> {
    let head = data.get(..16).ok_or_else(|| short(what, 16, data.len()))?;
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(head);
    Ok(u128::from_le_bytes(bytes))
}

fn header_u32(data: &[u8], at: usize, what: &str) -> Result<usize> {
    let slice = data
        .get(at..at + HEADER)
        .ok_or_else(|| short(what, at + HEADER, data.len()))?;
    Ok(unpack_u32(slice, what)? as usize)
}

/// Decode `Bytes`
pub fn unpack_bytes(data: &[u8], what: &str) -> Result<Vec<u8>> {
    Ok(unpack_fixvec(data, 1, what)?.concat())
}

/// Decode a fixvec whose items are `item_size` bytes wide
pub fn unpack_fixvec<'a>(data: &'a [u8], item_size: usize, what: &str) -> Result<Vec<&'a [u8]>> {
    let count = header_u32(data, 0, what)?;
    let expected = HEADER + count * item_size;
    if data.len() != expected {
        return Err(Error::encoding(
            what,
            format!("fixvec of {} items must be {} bytes, got {}", count, expected, data.len()),
        ));
    }
    Ok(data[HEADER..].chunks(item_size.max(1)).take(count).collect())
}

/// Decode a dynvec into its item slices
pub fn unpack_dynvec<'a>(data: &'a [u8], what: &str) -> Result<Vec<&'a [u8]>> {
    let total = header_u32(data, 0, what)?;
    if total != data.len() {
        return Err(Error::encoding(
            what,
            format!("declared size {} but got {} bytes", total, data.len()),
        ));
    }
    if total == HEADER {
        return Ok(Vec::new());
    }

    let first = header_u32(data, HEADER, what)?;
    if first % HEADER != 0 || first < HEADER * 2 || first > total {
        return Err(Error::encoding(what, format!("bad first offset {}", first)));
    }
    let count = first / HEADER - 1;

    let mut offsets = Vec::with_capacity(count + 1);
    for i in 0..count {
        offsets.push(header_u32(data, HEADER * (i + 1), what)?);
    }
    offsets.push(total);

    let mut items = Vec::with_capacity(count);
    for pair in offsets.windows(2) {
        let (start, end) = (pair[0], pair[1]);
        if start > end || end > total {
            return Err(Error::encoding(what, "offsets out of order"));
        }
        items.push(&data[start..end]);
    }
    Ok(items)
}

/// Decode a table with exactly `field_count` fields
pub fn unpack_table<'a>(data: &'a [u8], field_count: usize, what: &str) -> Result<Vec<&'a [u8]>> {
    let fields = unpack_dynvec(data, what)?;
    if fields.len() != field_count {
        return Err(Error::encoding(
            what,
            format!("expected {} fields, got {}", field_count, fields.len()),
        ));
    }
    Ok(fields)
}

/// Decode an option: empty input is `None`
pub fn unpack_option<T>(data: &[u8], decode: impl FnOnce(&[u8]) -> Result<T>) -> Result<Option<T>> {
    if data.is_empty() {
        Ok(None)
    } else {
        decode(data).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_bytes() {
        assert_eq!(pack_bytes(&[]), vec![0, 0, 0, 0]);
        assert_eq!(pack_bytes(&[0xab, 0xcd]), vec![2, 0, 0, 0, 0xab, 0xcd]);
        assert_eq!(unpack_bytes(&[2, 0, 0, 0, 0xab, 0xcd], "bytes").unwrap(), vec![0xab, 0xcd]);
    }

    #[test]
    fn test_bytes_length_mismatch_rejected() {
        assert!(unpack_bytes(&[3, 0, 0, 0, 0xab], "bytes").is_err());
        assert!(unpack_bytes(&[1, 0], "bytes").is_err());
    }

    #[test]
    fn test_empty_dynvec() {
        assert_eq!(pack_dynvec::<Vec<u8>>(&[]), vec![4, 0, 0, 0]);
        assert!(unpack_dynvec(&[4, 0, 0, 0], "v").unwrap().is_empty());
    }

    #[test]
    fn test_table_layout() {
        let table = pack_table(&[vec![1u8], vec![], vec![2, 3]]);
        // 16 header bytes + 3 body bytes
        assert_eq!(table.len(), 19);
        assert_eq!(&table[0..4], &pack_u32(19));
        assert_eq!(&table[4..8], &pack_u32(16));
        assert_eq!(&table[8..12], &pack_u32(17));
        assert_eq!(&table[12..16], &pack_u32(17));

        let fields = unpack_table(&table, 3, "t").unwrap();
        assert_eq!(fields, vec![&[1u8][..], &[][..], &[2, 3][..]]);
        assert!(unpack_table(&table, 2, "t").is_err());
    }

    #[test]
    fn test_truncated_table_rejected() {
        let table = pack_table(&[vec![1u8, 2, 3]]);
        assert!(unpack_dynvec(&table[..table.len() - 1], "t").is_err());
    }
}
