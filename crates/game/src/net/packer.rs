use thiserror::Error;

pub const MAX_VARINT_BYTES: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PackError {
    #[error("Unexpected end of data at offset {0}")]
    Truncated(usize),
    #[error("Unterminated string at offset {0}")]
    UnterminatedString(usize),
    #[error("Negative raw length {0}")]
    NegativeLength(i32),
}

// First byte: [ext][sign][6 bits], then [ext][7 bits] up to five bytes.
pub fn pack_int(value: i32, out: &mut Vec<u8>) {
    let sign = if value < 0 { 0x40 } else { 0 };
    let mut rest = (value ^ (value >> 31)) as u32;

    let mut byte = sign | (rest & 0x3f) as u8;
    rest >>= 6;

    while rest != 0 {
        out.push(byte | 0x80);
        byte = (rest & 0x7f) as u8;
        rest >>= 7;
    }
    out.push(byte);
}

pub fn unpack_int(data: &[u8]) -> Result<(i32, usize), PackError> {
    let first = *data.first().ok_or(PackError::Truncated(0))?;
    let sign = (first >> 6) & 1;
    let mut value = (first & 0x3f) as u32;
    let mut read = 1;
    let mut byte = first;
    let mut shift = 6;

    while byte & 0x80 != 0 && read < MAX_VARINT_BYTES {
        byte = *data.get(read).ok_or(PackError::Truncated(read))?;
        let mask = if read == MAX_VARINT_BYTES - 1 { 0x0f } else { 0x7f };
        value |= ((byte & mask) as u32) << shift;
        shift += 7;
        read += 1;
    }

    let value = value as i32 ^ -(sign as i32);
    Ok((value, read))
}

pub fn compress(values: &[i32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * 2);
    for &value in values {
        pack_int(value, &mut out);
    }
    out
}

pub fn decompress(data: &[u8]) -> Result<Vec<i32>, PackError> {
    let mut values = Vec::with_capacity(data.len());
    let mut offset = 0;
    while offset < data.len() {
        let (value, read) =
            unpack_int(&data[offset..]).map_err(|_| PackError::Truncated(offset))?;
        values.push(value);
        offset += read;
    }
    Ok(values)
}

#[derive(Debug, Default, Clone)]
pub struct Packer {
    buffer: Vec<u8>,
}

impl Packer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_int(&mut self, value: i32) -> &mut Self {
        pack_int(value, &mut self.buffer);
        self
    }

    pub fn add_bool(&mut self, value: bool) -> &mut Self {
        self.add_int(value as i32)
    }

    pub fn add_string(&mut self, value: &str) -> &mut Self {
        self.buffer.extend(value.bytes().filter(|&b| b != 0));
        self.buffer.push(0);
        self
    }

    pub fn add_raw(&mut self, data: &[u8]) -> &mut Self {
        self.buffer.extend_from_slice(data);
        self
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn finish(self) -> Vec<u8> {
        self.buffer
    }
}

pub struct Unpacker<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Unpacker<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    pub fn get_int(&mut self) -> Result<i32, PackError> {
        let rest = &self.data[self.offset..];
        let (value, read) = unpack_int(rest).map_err(|_| PackError::Truncated(self.offset))?;
        self.offset += read;
        Ok(value)
    }

    pub fn get_bool(&mut self) -> Result<bool, PackError> {
        Ok(self.get_int()? != 0)
    }

    pub fn get_string(&mut self) -> Result<String, PackError> {
        let rest = &self.data[self.offset..];
        let end = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(PackError::UnterminatedString(self.offset))?;
        let value = String::from_utf8_lossy(&rest[..end]).into_owned();
        self.offset += end + 1;
        Ok(value)
    }

    /// Control characters become spaces and leading whitespace is dropped.
    pub fn get_sanitized_string(&mut self) -> Result<String, PackError> {
        let raw = self.get_string()?;
        let cleaned: String = raw
            .chars()
            .map(|c| if (c as u32) < 32 { ' ' } else { c })
            .collect();
        Ok(cleaned.trim_start().to_string())
    }

    pub fn get_raw(&mut self, len: i32) -> Result<&'a [u8], PackError> {
        if len < 0 {
            return Err(PackError::NegativeLength(len));
        }
        let end = self.offset + len as usize;
        if end > self.data.len() {
            return Err(PackError::Truncated(self.data.len()));
        }
        let slice = &self.data[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }
}
