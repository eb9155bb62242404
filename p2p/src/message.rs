// concord/p2p/src/message.rs

use crate::error::NetworkError;
use concord_core::{Block, Transaction};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub const DEFAULT_MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

/// The wire envelope: `{"type": ..., "payload": ...}`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum P2pMessage {
    Transaction(Transaction),
    Block(Block),
    RequestChain,
    ResponseChain(Vec<Block>),
}

impl P2pMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            P2pMessage::Transaction(_) => "transaction",
            P2pMessage::Block(_) => "block",
            P2pMessage::RequestChain => "requestChain",
            P2pMessage::ResponseChain(_) => "responseChain",
        }
    }
}

/// Encodes `message` as a 4-byte big-endian length followed by its JSON body.
pub fn encode_frame(message: &P2pMessage, max_frame_bytes: usize) -> Result<Vec<u8>, NetworkError> {
    let body = serde_json::to_vec(message)?;
    if body.len() > max_frame_bytes {
        return Err(NetworkError::FrameTooLarge {
            len: body.len(),
            max: max_frame_bytes,
        });
    }
    let len = u32::try_from(body.len()).map_err(|_| NetworkError::FrameTooLarge {
        len: body.len(),
        max: max_frame_bytes,
    })?;
    let mut frame = Vec::with_capacity(4 + body.len());
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

pub async fn write_frame<W>(
    writer: &mut W,
    message: &P2pMessage,
    max_frame_bytes: usize,
) -> Result<(), NetworkError>
where
    W: AsyncWrite + Unpin,
{
    let frame = encode_frame(message, max_frame_bytes)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one frame. `Ok(None)` means the peer closed the connection between frames.
pub async fn read_frame<R>(
    reader: &mut R,
    max_frame_bytes: usize,
) -> Result<Option<P2pMessage>, NetworkError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; 4];
    match reader.read_exact(&mut header).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(header) as usize;
    if len > max_frame_bytes {
        return Err(NetworkError::FrameTooLarge {
            len,
            max: max_frame_bytes,
        });
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    Ok(Some(serde_json::from_slice(&body)?))
}
