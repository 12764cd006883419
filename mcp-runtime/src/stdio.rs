use serde_json::Value;
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::McpServer;
use crate::rpc::{RpcError, error_response, is_notification};

/// How a message arrived, so the reply goes back the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// `Content-Length` header block followed by the body.
    ContentLength,
    /// One JSON document per line.
    Line,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub body: Vec<u8>,
    pub framing: Framing,
}

/// Serve MCP over the process's stdin/stdout until stdin closes.
pub async fn serve_stdio(server: &McpServer) -> Result<(), std::io::Error> {
    let mut reader = BufReader::new(io::stdin());
    let mut stdout = io::stdout();
    serve(server, &mut reader, &mut stdout).await
}

pub async fn serve<R, W>(server: &McpServer, reader: &mut R, writer: &mut W) -> Result<(), std::io::Error>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    while let Some(read) = read_frame(reader).await? {
        let frame = match read {
            ReadFrame::Frame(frame) => frame,
            ReadFrame::Malformed { framing, reason } => {
                tracing::warn!(event = "mcp_stdio_bad_frame", reason = %reason, "unreadable MCP frame");
                let response = error_response(Value::Null, RpcError::parse_error(reason));
                write_frame(writer, &response, framing).await?;
                continue;
            }
        };
        let response = match serde_json::from_slice::<Value>(&frame.body) {
            Ok(incoming) => {
                let reply = !is_notification(&incoming);
                let response = server.handle_message(incoming).await;
                if !reply {
                    continue;
                }
                response
            }
            Err(err) => error_response(Value::Null, RpcError::parse_error(err.to_string())),
        };
        write_frame(writer, &response, frame.framing).await?;
    }
    tracing::debug!(event = "mcp_stdio_closed", "stdin closed, stopping stdio transport");
    Ok(())
}

/// Outcome of reading one message off the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadFrame {
    Frame(Frame),
    /// A header block without a usable `Content-Length`. The stream stays
    /// open; the caller answers with a parse error.
    Malformed { framing: Framing, reason: String },
}

/// `Name: value` with an HTTP token name, as in a `Content-Length` block.
fn is_header_line(line: &str) -> bool {
    match line.split_once(':') {
        Some((name, _)) => {
            !name.is_empty()
                && name
                    .bytes()
                    .all(|byte| byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_')
        }
        None => false,
    }
}

pub async fn read_frame<R>(reader: &mut R) -> Result<Option<ReadFrame>, std::io::Error>
where
    R: AsyncBufRead + Unpin,
{
    let mut content_length: Option<usize> = None;
    let mut bad_length: Option<String> = None;
    let mut in_headers = false;

    loop {
        let mut line = String::new();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            if !in_headers {
                return Ok(None);
            }
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "Unexpected EOF while reading MCP headers",
            ));
        }

        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() {
            if in_headers {
                break;
            }
            continue;
        }

        // Anything that is not a header line outside a header block is a
        // line-framed body, even when it is not JSON.
        if !in_headers && !is_header_line(trimmed) {
            return Ok(Some(ReadFrame::Frame(Frame {
                body: trimmed.as_bytes().to_vec(),
                framing: Framing::Line,
            })));
        }

        in_headers = true;
        if trimmed.to_ascii_lowercase().starts_with("content-length:") {
            let raw_len = trimmed
                .split_once(':')
                .map(|(_, right)| right.trim())
                .unwrap_or_default();
            match raw_len.parse::<usize>() {
                Ok(parsed) => content_length = Some(parsed),
                Err(_) => bad_length = Some(format!("Invalid Content-Length header: '{raw_len}'")),
            }
        }
    }

    let content_length = match (content_length, bad_length) {
        (Some(length), None) => length,
        (_, Some(reason)) => {
            return Ok(Some(ReadFrame::Malformed {
                framing: Framing::ContentLength,
                reason,
            }));
        }
        (None, None) => {
            return Ok(Some(ReadFrame::Malformed {
                framing: Framing::ContentLength,
                reason: "Missing Content-Length header".to_string(),
            }));
        }
    };
    let mut body = vec![0_u8; content_length];
    reader.read_exact(&mut body).await?;
    Ok(Some(ReadFrame::Frame(Frame {
        body,
        framing: Framing::ContentLength,
    })))
}

pub async fn write_frame<W>(writer: &mut W, value: &Value, framing: Framing) -> Result<(), std::io::Error>
where
    W: AsyncWrite + Unpin,
{
    let body = serde_json::to_vec(value).map_err(|e| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Failed to serialize JSON: {e}"),
        )
    })?;
    match framing {
        Framing::ContentLength => {
            let header = format!(
                "Content-Length: {}\r\nContent-Type: application/json\r\n\r\n",
                body.len()
            );
            writer.write_all(header.as_bytes()).await?;
            writer.write_all(&body).await?;
        }
        Framing::Line => {
            writer.write_all(&body).await?;
            writer.write_all(b"\n").await?;
        }
    }
    writer.flush().await?;
    Ok(())
}
