// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Varint-delimited message framing and the segment-chain reader.
//!
//! Every hermes stream (file or socket) is a sequence of protobuf messages,
//! each prefixed by its unsigned-varint length. File segments are gzip
//! wrapped and chained through `Header.previous` / `Footer.next`.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use prost::Message;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::readout::{FileLine, FrameReadout, Header, HeaderType};

#[derive(Debug, Error)]
pub enum HermesError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not decode message: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("varint length prefix exceeds 10 bytes")]
    VarintOverflow,

    #[error("stream has no header")]
    MissingHeader,

    #[error("expected a {expected:?} stream, got {found:?}")]
    UnexpectedStreamType { expected: HeaderType, found: HeaderType },

    #[error("segment '{segment}' links back to '{found}', expected '{expected}'")]
    BrokenChain { segment: String, expected: String, found: String },

    #[error("segment '{0}' ended without a footer")]
    MissingFooter(String),
}

/// Encode a message with its varint length prefix.
pub fn encode_delimited<M: Message>(msg: &M) -> Vec<u8> {
    msg.encode_length_delimited_to_vec()
}

/// Read one delimited message from an async stream.
///
/// Returns `Ok(None)` on EOF at a message boundary. A zero-length prefix is
/// skipped, not surfaced.
pub async fn read_delimited<M, R>(stream: &mut R) -> Result<Option<M>, HermesError>
where
    M: Message + Default,
    R: AsyncRead + Unpin,
{
    loop {
        let size = match read_varint_async(stream).await? {
            Some(size) => size,
            None => return Ok(None),
        };
        if size == 0 {
            continue;
        }
        let mut data = vec![0u8; size as usize];
        stream.read_exact(&mut data).await?;
        return Ok(Some(M::decode(&data[..])?));
    }
}

/// Read one delimited message from a sync stream (file segments).
pub fn read_delimited_sync<M, R>(stream: &mut R) -> Result<Option<M>, HermesError>
where
    M: Message + Default,
    R: Read,
{
    loop {
        let size = match read_varint_sync(stream)? {
            Some(size) => size,
            None => return Ok(None),
        };
        if size == 0 {
            continue;
        }
        let mut data = vec![0u8; size as usize];
        stream.read_exact(&mut data)?;
        return Ok(Some(M::decode(&data[..])?));
    }
}

async fn read_varint_async<R: AsyncRead + Unpin>(
    stream: &mut R,
) -> Result<Option<u64>, HermesError> {
    let mut buf = [0u8; 10];
    for idx in 0..buf.len() {
        let mut byte = [0u8; 1];
        let n = stream.read(&mut byte).await?;
        if n == 0 {
            if idx == 0 {
                return Ok(None);
            }
            return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
        }
        buf[idx] = byte[0];
        if byte[0] & 0x80 == 0 {
            let mut slice = &buf[..=idx];
            let value = prost::encoding::decode_varint(&mut slice)?;
            return Ok(Some(value));
        }
    }
    Err(HermesError::VarintOverflow)
}

fn read_varint_sync<R: Read>(stream: &mut R) -> Result<Option<u64>, HermesError> {
    let mut buf = [0u8; 10];
    for idx in 0..buf.len() {
        let mut byte = [0u8; 1];
        let n = stream.read(&mut byte)?;
        if n == 0 {
            if idx == 0 {
                return Ok(None);
            }
            return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
        }
        buf[idx] = byte[0];
        if byte[0] & 0x80 == 0 {
            let mut slice = &buf[..=idx];
            let value = prost::encoding::decode_varint(&mut slice)?;
            return Ok(Some(value));
        }
    }
    Err(HermesError::VarintOverflow)
}

/// Reader over a chain of gzip file segments.
///
/// Opens the first segment, yields its readouts, and transparently follows
/// `Footer.next` links, verifying each next segment's `previous` back-link.
#[derive(Debug)]
pub struct SegmentReader {
    dir: PathBuf,
    current: String,
    header: Header,
    decoder: GzDecoder<File>,
    done: bool,
}

impl SegmentReader {
    pub fn open(path: &Path) -> Result<Self, HermesError> {
        let dir = path.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
        let current = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or(HermesError::MissingHeader)?;
        let (header, decoder) = open_segment(path)?;
        Ok(Self { dir, current, header, decoder, done: false })
    }

    /// Header of the segment currently being read.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Name of the segment currently being read.
    pub fn segment(&self) -> &str {
        &self.current
    }

    /// Next readout in chain order, or `None` after the terminal footer.
    pub fn next_readout(&mut self) -> Result<Option<FrameReadout>, HermesError> {
        loop {
            if self.done {
                return Ok(None);
            }
            let line: FileLine = read_delimited_sync(&mut self.decoder)?
                .ok_or_else(|| HermesError::MissingFooter(self.current.clone()))?;
            if let Some(readout) = line.readout {
                return Ok(Some(readout));
            }
            let footer = line.footer.ok_or_else(|| HermesError::MissingFooter(self.current.clone()))?;
            if footer.next.is_empty() {
                self.done = true;
                return Ok(None);
            }
            self.advance(&footer.next)?;
        }
    }

    fn advance(&mut self, next: &str) -> Result<(), HermesError> {
        let (header, decoder) = open_segment(&self.dir.join(next))?;
        if header.previous != self.current {
            return Err(HermesError::BrokenChain {
                segment: next.to_string(),
                expected: self.current.clone(),
                found: header.previous,
            });
        }
        self.current = next.to_string();
        self.header = header;
        self.decoder = decoder;
        Ok(())
    }
}

fn open_segment(path: &Path) -> Result<(Header, GzDecoder<File>), HermesError> {
    let file = File::open(path)?;
    let mut decoder = GzDecoder::new(file);
    let header: Header =
        read_delimited_sync(&mut decoder)?.ok_or(HermesError::MissingHeader)?;
    if header.r#type() != HeaderType::File {
        return Err(HermesError::UnexpectedStreamType {
            expected: HeaderType::File,
            found: header.r#type(),
        });
    }
    Ok((header, decoder))
}

#[cfg(test)]
#[path = "hermes_tests.rs"]
mod tests;
