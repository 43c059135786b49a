use std::io::{self, Read};

use tokio::io::{AsyncRead, AsyncReadExt};

use super::consts::*;
use super::decoding::{decode_header, header_length, FrameHeader};
use super::frame::{apply_mask, Frame};
use crate::error::{Error, FrameError, TransportError};

fn eof_as_closed(err: io::Error) -> TransportError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        TransportError::Closed
    } else {
        TransportError::Io(err)
    }
}

fn check_length(header: &FrameHeader, max_payload: u64) -> Result<usize, Error> {
    if header.payload_length > max_payload {
        return Err(FrameError::TooLarge {
            length: header.payload_length,
            limit: max_payload,
        }
        .into());
    }
    Ok(header.payload_length as usize)
}

fn into_frame(header: FrameHeader, mut payload: Vec<u8>) -> Frame {
    if let Some(mask) = header.mask {
        // unmasking the message
        apply_mask(&mut payload, mask);
    }
    Frame {
        headers: header.headers,
        opcode: header.opcode,
        mask: header.mask,
        payload,
    }
}

pub async fn read_header<T: AsyncRead + Unpin>(reader: &mut T) -> Result<FrameHeader, Error> {
    let mut buf = [0u8; MAX_HEADER];
    reader
        .read_exact(&mut buf[..MIN_HEADER])
        .await
        .map_err(eof_as_closed)?;
    let length = header_length(buf[1]);
    reader
        .read_exact(&mut buf[MIN_HEADER..length])
        .await
        .map_err(TransportError::Io)?;
    Ok(decode_header(&buf[..length])?)
}

pub async fn read_frame<T: AsyncRead + Unpin>(reader: &mut T, max_payload: u64) -> Result<Frame, Error> {
    let header = read_header(reader).await?;
    let length = check_length(&header, max_payload)?;

    // reading payload data
    let mut payload = vec![0; length];
    reader
        .read_exact(&mut payload)
        .await
        .map_err(TransportError::Io)?;

    Ok(into_frame(header, payload))
}

pub fn read_header_blocking<T: Read>(reader: &mut T) -> Result<FrameHeader, Error> {
    let mut buf = [0u8; MAX_HEADER];
    reader
        .read_exact(&mut buf[..MIN_HEADER])
        .map_err(eof_as_closed)?;
    let length = header_length(buf[1]);
    reader
        .read_exact(&mut buf[MIN_HEADER..length])
        .map_err(TransportError::Io)?;
    Ok(decode_header(&buf[..length])?)
}

pub fn read_frame_blocking<T: Read>(reader: &mut T, max_payload: u64) -> Result<Frame, Error> {
    let header = read_header_blocking(reader)?;
    let length = check_length(&header, max_payload)?;

    let mut payload = vec![0; length];
    reader.read_exact(&mut payload).map_err(TransportError::Io)?;

    Ok(into_frame(header, payload))
}

#[cfg(test)]
#[path = "read_test.rs"]
mod tests;
