//! Fixed-width binary encoding primitives for graph objects.
//!
//! Every object kind serializes through these helpers so that its on-disk
//! bytes are stable: the same logical object always encodes to the same
//! byte sequence, which is what its digest hashes over. Integers are
//! little-endian and fixed width; strings are length-prefixed UTF-8.

use crate::{Digest, SchemaError, DIGEST_SIZE};
use std::io::{Read, Write};

pub fn write_u8(writer: &mut impl Write, value: u8) -> Result<(), SchemaError> {
    writer.write_all(&[value])?;
    Ok(())
}

pub fn read_u8(reader: &mut impl Read) -> Result<u8, SchemaError> {
    let mut buf = [0u8; 1];
    reader.read_exact(&mut buf)?;
    Ok(buf[0])
}

pub fn write_u32(writer: &mut impl Write, value: u32) -> Result<(), SchemaError> {
    writer.write_all(&value.to_le_bytes())?;
    Ok(())
}

pub fn read_u32(reader: &mut impl Read) -> Result<u32, SchemaError> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

pub fn write_u64(writer: &mut impl Write, value: u64) -> Result<(), SchemaError> {
    writer.write_all(&value.to_le_bytes())?;
    Ok(())
}

pub fn read_u64(reader: &mut impl Read) -> Result<u64, SchemaError> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

pub fn write_string(writer: &mut impl Write, value: &str) -> Result<(), SchemaError> {
    write_u64(writer, value.len() as u64)?;
    writer.write_all(value.as_bytes())?;
    Ok(())
}

pub fn read_string(reader: &mut impl Read) -> Result<String, SchemaError> {
    let len = read_u64(reader)? as usize;
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;
    String::from_utf8(buf)
        .map_err(|e| SchemaError::InvalidEncoding(format!("non-utf8 string: {e}")))
}

pub fn write_digest(writer: &mut impl Write, digest: &Digest) -> Result<(), SchemaError> {
    writer.write_all(digest.as_bytes())?;
    Ok(())
}

pub fn read_digest(reader: &mut impl Read) -> Result<Digest, SchemaError> {
    let mut buf = [0u8; DIGEST_SIZE];
    reader.read_exact(&mut buf)?;
    Ok(Digest::from_bytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_roundtrip() {
        let mut buf = Vec::new();
        write_u8(&mut buf, 7).unwrap();
        write_u32(&mut buf, 0xDEAD_BEEF).unwrap();
        write_u64(&mut buf, u64::MAX).unwrap();

        let mut cursor = buf.as_slice();
        assert_eq!(read_u8(&mut cursor).unwrap(), 7);
        assert_eq!(read_u32(&mut cursor).unwrap(), 0xDEAD_BEEF);
        assert_eq!(read_u64(&mut cursor).unwrap(), u64::MAX);
        assert!(cursor.is_empty());
    }

    #[test]
    fn strings_roundtrip() {
        let mut buf = Vec::new();
        write_string(&mut buf, "hello/world.txt").unwrap();
        write_string(&mut buf, "").unwrap();

        let mut cursor = buf.as_slice();
        assert_eq!(read_string(&mut cursor).unwrap(), "hello/world.txt");
        assert_eq!(read_string(&mut cursor).unwrap(), "");
    }

    #[test]
    fn digests_roundtrip() {
        let d = Digest::of_bytes(b"payload");
        let mut buf = Vec::new();
        write_digest(&mut buf, &d).unwrap();
        assert_eq!(buf.len(), DIGEST_SIZE);

        let mut cursor = buf.as_slice();
        assert_eq!(read_digest(&mut cursor).unwrap(), d);
    }

    #[test]
    fn truncated_input_is_an_error() {
        let mut cursor: &[u8] = &[1, 2, 3];
        assert!(read_u64(&mut cursor).is_err());
    }

    #[test]
    fn invalid_utf8_is_an_error() {
        let mut buf = Vec::new();
        write_u64(&mut buf, 2).unwrap();
        buf.extend_from_slice(&[0xFF, 0xFE]);
        let mut cursor = buf.as_slice();
        assert!(read_string(&mut cursor).is_err());
    }
}
