//! Byte cursor over a debug section.

use super::DwarfError;

#[derive(Debug, Clone)]
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
    little_endian: bool,
    section: &'static str,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8], little_endian: bool, section: &'static str) -> Self {
        Reader {
            data,
            pos: 0,
            little_endian,
            section,
        }
    }

    pub fn at(mut self, pos: usize) -> Self {
        self.pos = pos;
        self
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    pub fn little_endian(&self) -> bool {
        self.little_endian
    }

    fn truncated(&self) -> DwarfError {
        DwarfError::Truncated {
            section: self.section,
            offset: self.pos,
        }
    }

    pub fn bytes(&mut self, n: usize) -> Result<&'a [u8], DwarfError> {
        let end = self.pos.checked_add(n).ok_or_else(|| self.truncated())?;
        let slice = self.data.get(self.pos..end).ok_or_else(|| self.truncated())?;
        self.pos = end;
        Ok(slice)
    }

    pub fn skip(&mut self, n: usize) -> Result<(), DwarfError> {
        self.bytes(n).map(|_| ())
    }

    pub fn u8(&mut self) -> Result<u8, DwarfError> {
        Ok(self.bytes(1)?[0])
    }

    /// Unsigned integer of `n` bytes (1..=8) in section byte order.
    pub fn uint(&mut self, n: usize) -> Result<u64, DwarfError> {
        let bytes = self.bytes(n)?;
        Ok(read_uint(bytes, self.little_endian))
    }

    pub fn u16(&mut self) -> Result<u16, DwarfError> {
        self.uint(2).map(|v| v as u16)
    }

    pub fn u32(&mut self) -> Result<u32, DwarfError> {
        self.uint(4).map(|v| v as u32)
    }

    pub fn u64(&mut self) -> Result<u64, DwarfError> {
        self.uint(8)
    }

    /// Section offset: 4 bytes in 32-bit DWARF, 8 in 64-bit.
    pub fn offset(&mut self, dwarf64: bool) -> Result<u64, DwarfError> {
        self.uint(if dwarf64 { 8 } else { 4 })
    }

    pub fn uleb(&mut self) -> Result<u64, DwarfError> {
        let mut result = 0u64;
        let mut shift = 0;
        loop {
            let byte = self.u8()?;
            if shift < 64 {
                result |= u64::from(byte & 0x7f) << shift;
            }
            shift += 7;
            if byte & 0x80 == 0 {
                return Ok(result);
            }
        }
    }

    pub fn sleb(&mut self) -> Result<i64, DwarfError> {
        let mut result = 0i64;
        let mut shift = 0;
        let mut byte;
        loop {
            byte = self.u8()?;
            if shift < 64 {
                result |= i64::from(byte & 0x7f) << shift;
            }
            shift += 7;
            if byte & 0x80 == 0 {
                break;
            }
        }
        if shift < 64 && byte & 0x40 != 0 {
            result |= -1i64 << shift;
        }
        Ok(result)
    }

    /// NUL-terminated string.
    pub fn cstr(&mut self) -> Result<String, DwarfError> {
        let rest = self.data.get(self.pos..).ok_or_else(|| self.truncated())?;
        let len = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| self.truncated())?;
        let s = String::from_utf8_lossy(&rest[..len]).into_owned();
        self.pos += len + 1;
        Ok(s)
    }
}

/// Decode an unsigned integer of up to 8 bytes.
pub fn read_uint(bytes: &[u8], little_endian: bool) -> u64 {
    let mut value = 0u64;
    if little_endian {
        for (i, b) in bytes.iter().take(8).enumerate() {
            value |= u64::from(*b) << (8 * i);
        }
    } else {
        for b in bytes.iter().take(8) {
            value = (value << 8) | u64::from(*b);
        }
    }
    value
}

/// Read a NUL-terminated string at `offset` in a string section.
pub fn str_at(section: &[u8], offset: u64) -> Option<String> {
    let rest = section.get(usize::try_from(offset).ok()?..)?;
    let len = rest.iter().position(|&b| b == 0)?;
    Some(String::from_utf8_lossy(&rest[..len]).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leb128() {
        let data = [0xe5, 0x8e, 0x26, 0x7f, 0x80, 0x7f];
        let mut r = Reader::new(&data, true, "test");
        assert_eq!(r.uleb().unwrap(), 624485);
        assert_eq!(r.sleb().unwrap(), -1);
        assert_eq!(r.sleb().unwrap(), -128);
        assert!(r.is_empty());
    }

    #[test]
    fn test_endianness() {
        let data = [0x01, 0x02, 0x03, 0x04];
        assert_eq!(Reader::new(&data, true, "t").u32().unwrap(), 0x04030201);
        assert_eq!(Reader::new(&data, false, "t").u32().unwrap(), 0x01020304);
    }

    #[test]
    fn test_truncation_is_an_error() {
        let data = [0x01];
        let mut r = Reader::new(&data, true, ".debug_info");
        assert!(matches!(
            r.u16(),
            Err(DwarfError::Truncated { section: ".debug_info", .. })
        ));
    }

    #[test]
    fn test_strings() {
        let data = b"abc\0de\0";
        let mut r = Reader::new(data, true, "t");
        assert_eq!(r.cstr().unwrap(), "abc");
        assert_eq!(r.pos(), 4);
        assert_eq!(str_at(data, 4).as_deref(), Some("de"));
        assert_eq!(str_at(data, 99), None);
    }
}
