//! Wyoming event framing
//!
//! Each event is a single JSON header line:
//!
//! ```text
//! {"type": "detection", "data": {...}, "data_length": 42, "payload_length": 0}\n
//! ```
//!
//! followed by `data_length` bytes of JSON object (merged over the inline
//! `data`) and `payload_length` bytes of binary payload. Satellites stream
//! audio as payloads; nothing here needs it, so payloads are skipped.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{Error, Result};

/// Protocol version written in outgoing headers
pub const PROTOCOL_VERSION: &str = "1.5.2";

/// Upper bound for a single header line
const MAX_HEADER_BYTES: u64 = 64 * 1024;

/// Upper bound for an additional data block
const MAX_DATA_BYTES: usize = 1024 * 1024;

/// A decoded Wyoming event without its binary payload
#[derive(Debug, Clone, PartialEq)]
pub struct WyomingEvent {
    /// Event type, e.g. `"voice-started"`
    pub event_type: String,
    /// Event data
    pub data: Map<String, Value>,
}

impl WyomingEvent {
    /// Create an event
    #[must_use]
    pub fn new(event_type: &str, data: Map<String, Value>) -> Self {
        Self {
            event_type: event_type.to_string(),
            data,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payload_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    version: Option<String>,
}

/// Read the next event from a stream
///
/// Returns `Ok(None)` on a clean end of stream.
///
/// # Errors
///
/// Returns [`Error::Decode`] if a header or data block is not valid JSON; the
/// stream stays aligned and the caller may keep reading. Any other error
/// means the stream is unusable.
pub async fn read_event<R>(reader: &mut R) -> Result<Option<WyomingEvent>>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();
    loop {
        line.clear();
        let read = (&mut *reader)
            .take(MAX_HEADER_BYTES)
            .read_until(b'\n', &mut line)
            .await?;
        if read == 0 {
            return Ok(None);
        }
        if line.last() != Some(&b'\n')
            && u64::try_from(read).unwrap_or(u64::MAX) >= MAX_HEADER_BYTES
        {
            return Err(Error::Transport(format!(
                "event header exceeds {MAX_HEADER_BYTES} bytes"
            )));
        }
        if !line.trim_ascii().is_empty() {
            break;
        }
    }

    // The whole line is consumed, so a bad header leaves the stream aligned
    let header: Header = serde_json::from_slice(line.trim_ascii_end())
        .map_err(|e| Error::Decode(format!("invalid event header: {e}")))?;

    let mut data = header.data.unwrap_or_default();
    let data_length = header.data_length.unwrap_or(0);
    let extra = if data_length > 0 {
        if data_length > MAX_DATA_BYTES {
            return Err(Error::Transport(format!(
                "event data block of {data_length} bytes exceeds {MAX_DATA_BYTES}"
            )));
        }
        let mut buf = vec![0; data_length];
        reader.read_exact(&mut buf).await?;
        Some(buf)
    } else {
        None
    };

    if let Some(length) = header.payload_length.filter(|n| *n > 0) {
        skip(reader, length).await?;
    }

    if let Some(buf) = extra {
        let more: Map<String, Value> = serde_json::from_slice(&buf)
            .map_err(|e| Error::Decode(format!("invalid event data: {e}")))?;
        data.extend(more);
    }

    Ok(Some(WyomingEvent {
        event_type: header.event_type,
        data,
    }))
}

async fn skip<R>(reader: &mut R, length: usize) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let length = u64::try_from(length).unwrap_or(u64::MAX);
    let skipped = tokio::io::copy(&mut (&mut *reader).take(length), &mut tokio::io::sink()).await?;
    if skipped < length {
        return Err(Error::Io(std::io::ErrorKind::UnexpectedEof.into()));
    }
    Ok(())
}

/// Write an event with its data in a separate data block
///
/// # Errors
///
/// Returns error if the data cannot be serialized or the write fails
pub async fn write_event<W>(writer: &mut W, event: &WyomingEvent) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let data = if event.data.is_empty() {
        Vec::new()
    } else {
        serde_json::to_vec(&event.data)?
    };

    let header = Header {
        event_type: event.event_type.clone(),
        data: None,
        data_length: (!data.is_empty()).then_some(data.len()),
        payload_length: None,
        version: Some(PROTOCOL_VERSION.to_string()),
    };

    let mut line = serde_json::to_vec(&header)?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.write_all(&data).await?;
    writer.flush().await?;
    Ok(())
}
