use crate::error::ProtocolError;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::collections::HashMap;

pub(crate) fn put_string(buf: &mut BytesMut, value: &str) {
    buf.put_u16(value.len() as u16);
    buf.extend_from_slice(value.as_bytes());
}

pub(crate) fn put_long_string(buf: &mut BytesMut, value: &str) {
    buf.put_i32(value.len() as i32);
    buf.extend_from_slice(value.as_bytes());
}

pub(crate) fn put_string_map(buf: &mut BytesMut, map: &HashMap<String, String>) {
    buf.put_u16(map.len() as u16);
    for (key, value) in map {
        put_string(buf, key);
        put_string(buf, value);
    }
}

/// `[bytes]`: a signed length followed by that many bytes; negative is null.
pub(crate) fn put_value(buf: &mut BytesMut, value: Option<&[u8]>) {
    match value {
        Some(v) => {
            buf.put_i32(v.len() as i32);
            buf.extend_from_slice(v);
        }
        None => buf.put_i32(-1),
    }
}

pub(crate) struct Reader {
    buf: Bytes,
}

impl Reader {
    pub(crate) fn new(buf: Bytes) -> Self {
        Self { buf }
    }

    pub(crate) fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    fn need(&self, len: usize, what: &'static str) -> Result<(), ProtocolError> {
        if self.buf.remaining() < len {
            return Err(ProtocolError::Truncated(what));
        }
        Ok(())
    }

    pub(crate) fn read_u8(&mut self, what: &'static str) -> Result<u8, ProtocolError> {
        self.need(1, what)?;
        Ok(self.buf.get_u8())
    }

    pub(crate) fn read_u16(&mut self, what: &'static str) -> Result<u16, ProtocolError> {
        self.need(2, what)?;
        Ok(self.buf.get_u16())
    }

    pub(crate) fn read_i32(&mut self, what: &'static str) -> Result<i32, ProtocolError> {
        self.need(4, what)?;
        Ok(self.buf.get_i32())
    }

    fn read_utf8(&mut self, len: usize, what: &'static str) -> Result<String, ProtocolError> {
        self.need(len, what)?;
        let raw = self.buf.split_to(len);
        String::from_utf8(raw.to_vec()).map_err(|_| ProtocolError::InvalidUtf8)
    }

    pub(crate) fn read_string(&mut self, what: &'static str) -> Result<String, ProtocolError> {
        let len = self.read_u16(what)? as usize;
        self.read_utf8(len, what)
    }

    pub(crate) fn read_long_string(&mut self, what: &'static str) -> Result<String, ProtocolError> {
        let len = self.read_i32(what)?;
        let len = usize::try_from(len).map_err(|_| ProtocolError::Truncated(what))?;
        self.read_utf8(len, what)
    }

    pub(crate) fn read_string_map(
        &mut self,
        what: &'static str,
    ) -> Result<HashMap<String, String>, ProtocolError> {
        let count = self.read_u16(what)?;
        let mut map = HashMap::with_capacity(count as usize);
        for _ in 0..count {
            let key = self.read_string(what)?;
            let value = self.read_string(what)?;
            map.insert(key, value);
        }
        Ok(map)
    }

    pub(crate) fn read_value(&mut self, what: &'static str) -> Result<Option<Bytes>, ProtocolError> {
        let len = self.read_i32(what)?;
        let Ok(len) = usize::try_from(len) else {
            return Ok(None);
        };
        self.need(len, what)?;
        Ok(Some(self.buf.split_to(len)))
    }

    pub(crate) fn finish(self) -> Result<(), ProtocolError> {
        match self.buf.remaining() {
            0 => Ok(()),
            left => Err(ProtocolError::TrailingBytes(left)),
        }
    }
}
