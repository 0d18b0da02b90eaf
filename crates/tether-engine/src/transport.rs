//! Line transport
//!
//! Requests are single lines of text, either an instruction or a control
//! command (`:ping`, `:cache`, `:roots`). Every request gets exactly one reply
//! line holding a JSON [`Reply`]. Lines longer than the frame limit are
//! discarded and answered with an error.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::thread;

use tracing::{debug, info, warn};

use crate::bridge::BridgeHandle;
use crate::reply::Reply;

/// Transport errors
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Socket error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Reply line is not a valid reply
    #[error("Malformed reply: {0}")]
    Json(#[from] serde_json::Error),

    /// Request cannot be sent as a single line
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Peer closed the connection before replying
    #[error("Connection closed")]
    Closed,
}

/// One request line as read off the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Line within the limit, terminator stripped
    Line(String),
    /// Line longer than the limit; its bytes were discarded
    Oversized,
}

/// Read one newline-terminated frame of at most `max_frame` bytes.
///
/// Returns `Ok(None)` at end of stream.
pub fn read_frame<B: BufRead>(reader: &mut B, max_frame: usize) -> io::Result<Option<Frame>> {
    let mut buf = Vec::new();
    // Room for a full line plus `\r\n`
    let limit = max_frame as u64 + 2;
    let n = reader.by_ref().take(limit).read_until(b'\n', &mut buf)?;
    if n == 0 {
        return Ok(None);
    }

    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
        if buf.len() > max_frame {
            return Ok(Some(Frame::Oversized));
        }
        return Ok(Some(Frame::Line(String::from_utf8_lossy(&buf).into_owned())));
    }

    if buf.len() <= max_frame {
        // Final line without a terminator
        return Ok(Some(Frame::Line(String::from_utf8_lossy(&buf).into_owned())));
    }

    // Skip the rest of the oversized line
    loop {
        let mut rest = Vec::new();
        let n = reader.by_ref().take(limit).read_until(b'\n', &mut rest)?;
        if n == 0 || rest.last() == Some(&b'\n') {
            break;
        }
    }
    Ok(Some(Frame::Oversized))
}

fn write_reply<W: Write>(writer: &mut W, reply: &Reply) -> Result<(), TransportError> {
    let mut line = serde_json::to_string(reply)?;
    line.push('\n');
    writer.write_all(line.as_bytes())?;
    writer.flush()?;
    Ok(())
}

/// TCP listener serving a bridge
pub struct Server {
    listener: TcpListener,
    bridge: BridgeHandle,
    max_frame: usize,
}

impl Server {
    /// Bind to `addr`
    pub fn bind<A: ToSocketAddrs>(addr: A, bridge: BridgeHandle, max_frame: usize) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)?;
        Ok(Self {
            listener,
            bridge,
            max_frame,
        })
    }

    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections forever, one thread per connection
    pub fn serve(&self) -> Result<(), TransportError> {
        info!(addr = %self.local_addr()?, "listening");
        for stream in self.listener.incoming() {
            let stream = match stream {
                Ok(stream) => stream,
                Err(err) => {
                    warn!(error = %err, "accept failed");
                    continue;
                }
            };
            let bridge = self.bridge.clone();
            let max_frame = self.max_frame;
            let spawned = thread::Builder::new()
                .name("tether-conn".to_string())
                .spawn(move || {
                    if let Err(err) = Self::serve_connection(&bridge, stream, max_frame) {
                        warn!(error = %err, "connection ended with error");
                    }
                });
            if let Err(err) = spawned {
                warn!(error = %err, "cannot spawn connection thread");
            }
        }
        Ok(())
    }

    /// Serve one connection until the peer closes it
    pub fn serve_connection(bridge: &BridgeHandle, stream: TcpStream, max_frame: usize) -> Result<(), TransportError> {
        let peer = stream.peer_addr().ok();
        debug!(peer = ?peer, "connection opened");
        let mut writer = stream.try_clone()?;
        let mut reader = BufReader::new(stream);

        while let Some(frame) = read_frame(&mut reader, max_frame)? {
            let reply = match frame {
                Frame::Line(line) if line.trim().is_empty() => continue,
                Frame::Line(line) => bridge.handle_request(&line),
                Frame::Oversized => {
                    warn!(peer = ?peer, max_frame, "oversized request");
                    Reply::failure(format!("Request exceeds {} bytes", max_frame))
                }
            };
            write_reply(&mut writer, &reply)?;
        }

        debug!(peer = ?peer, "connection closed");
        Ok(())
    }
}

/// Blocking client for a running bridge
pub struct Client {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl Client {
    /// Connect to `addr`
    pub fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self, TransportError> {
        let writer = TcpStream::connect(addr)?;
        let reader = BufReader::new(writer.try_clone()?);
        Ok(Self { reader, writer })
    }

    /// Send one request and wait for its reply
    pub fn send(&mut self, request: &str) -> Result<Reply, TransportError> {
        if request.contains('\n') {
            return Err(TransportError::InvalidRequest(
                "requests cannot contain line breaks".to_string(),
            ));
        }
        self.writer.write_all(request.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;

        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Err(TransportError::Closed);
        }
        Ok(serde_json::from_str(line.trim_end())?)
    }
}
