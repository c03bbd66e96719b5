//! Datagram framing and the cursor-based body codec
//!
//! Every datagram carries a fixed 10-byte header followed by a body:
//!
//! ```text
//! u8      packet type tag
//! u8      logical channel
//! u64 LE  sender identity
//! ..      body
//! ```
//!
//! The body keeps separate read and write cursors. Decoders pull typed
//! little-endian values from the read cursor and get a [`CodecError`] instead of
//! a panic when a client sends fewer bytes than the schema asks for. Encoders
//! `grow` the body and append at the write cursor.

use std::fmt;
use std::net::SocketAddr;

use crate::packet_type::PacketType;
use crate::HEADER_LEN;

/// Errors raised while framing or decoding a datagram
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("body truncated: wanted {wanted} bytes, {remaining} remaining")]
    Truncated { wanted: usize, remaining: usize },

    #[error("datagram of {0} bytes is shorter than the header")]
    HeaderTooShort(usize),

    #[error("unknown packet type tag {0}")]
    UnknownType(u8),
}

#[derive(Clone, PartialEq)]
pub struct Packet {
    pub packet_type: PacketType,
    pub channel: u8,
    pub steam_id: u64,
    /// Address the datagram arrived from, `None` for server-built packets
    pub src: Option<SocketAddr>,
    body: Vec<u8>,
    read_pos: usize,
    write_pos: usize,
}

impl Packet {
    pub fn new(packet_type: PacketType, channel: u8, steam_id: u64) -> Self {
        Self {
            packet_type,
            channel,
            steam_id,
            src: None,
            body: Vec::new(),
            read_pos: 0,
            write_pos: 0,
        }
    }

    /// Builds a packet around an existing body, write cursor at the end
    pub fn with_body(packet_type: PacketType, channel: u8, steam_id: u64, body: Vec<u8>) -> Self {
        let write_pos = body.len();
        Self {
            packet_type,
            channel,
            steam_id,
            src: None,
            body,
            read_pos: 0,
            write_pos,
        }
    }

    /// Splits a raw datagram into header fields and body
    pub fn from_datagram(data: &[u8], src: SocketAddr) -> Result<Self, CodecError> {
        if data.len() < HEADER_LEN {
            return Err(CodecError::HeaderTooShort(data.len()));
        }

        let packet_type = PacketType::from_u8(data[0]).ok_or(CodecError::UnknownType(data[0]))?;
        let channel = data[1];
        let mut id = [0u8; 8];
        id.copy_from_slice(&data[2..HEADER_LEN]);

        let mut packet = Self::with_body(
            packet_type,
            channel,
            u64::from_le_bytes(id),
            data[HEADER_LEN..].to_vec(),
        );
        packet.src = Some(src);
        Ok(packet)
    }

    /// Serializes header and body into one datagram
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.body.len());
        out.push(self.packet_type as u8);
        out.push(self.channel);
        out.extend_from_slice(&self.steam_id.to_le_bytes());
        out.extend_from_slice(&self.body);
        out
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// Bytes left between the read cursor and the end of the body
    pub fn remaining(&self) -> usize {
        self.body.len() - self.read_pos
    }

    /// Extends writable capacity by `n` zeroed bytes
    pub fn grow(&mut self, n: usize) {
        self.body.resize(self.body.len() + n, 0);
    }

    fn take(&mut self, n: usize) -> Result<&[u8], CodecError> {
        if self.remaining() < n {
            return Err(CodecError::Truncated {
                wanted: n,
                remaining: self.remaining(),
            });
        }
        let start = self.read_pos;
        self.read_pos += n;
        Ok(&self.body[start..start + n])
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16_le(&mut self) -> Result<u16, CodecError> {
        self.take_array().map(u16::from_le_bytes)
    }

    pub fn read_i16_le(&mut self) -> Result<i16, CodecError> {
        self.take_array().map(i16::from_le_bytes)
    }

    pub fn read_f32_le(&mut self) -> Result<f32, CodecError> {
        self.take_array().map(f32::from_le_bytes)
    }

    /// Reads `count` consecutive u16 values. Fails without consuming anything
    /// when the body cannot hold all of them.
    pub fn read_u16_le_n(&mut self, count: usize) -> Result<Vec<u16>, CodecError> {
        let raw = self.take(count * 2)?;
        Ok(raw
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect())
    }

    /// Reads `count` consecutive f32 values, all or nothing
    pub fn read_f32_le_n(&mut self, count: usize) -> Result<Vec<f32>, CodecError> {
        let raw = self.take(count * 4)?;
        Ok(raw
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }

    fn put(&mut self, bytes: &[u8]) {
        let end = self.write_pos + bytes.len();
        if end > self.body.len() {
            // Callers normally grow first; extend rather than fail.
            self.body.resize(end, 0);
        }
        self.body[self.write_pos..end].copy_from_slice(bytes);
        self.write_pos = end;
    }

    pub fn write_u8(&mut self, value: u8) {
        self.put(&[value]);
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.put(bytes);
    }

    pub fn write_u16_le(&mut self, value: u16) {
        self.put(&value.to_le_bytes());
    }

    pub fn write_i16_le(&mut self, value: i16) {
        self.put(&value.to_le_bytes());
    }

    pub fn write_f32_le(&mut self, values: &[f32]) {
        for value in values {
            self.put(&value.to_le_bytes());
        }
    }
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Packet")
            .field("type", &self.packet_type)
            .field("channel", &self.channel)
            .field("steam_id", &self.steam_id)
            .field("src", &self.src)
            .field("len", &self.body.len())
            .finish()
    }
}
