//! Transports for the shadow protocol.
//!
//! A link is a rendezvous: [`ShadowLink::acquire`] hands the session the
//! reference's next message by value, and [`ShadowLink::release`] consumes
//! the answered message and hands it back. Holding the state by value is the
//! lease; nothing else can read or write it in between.
//!
//! On a byte stream each message is a frame: a 4-byte little-endian length
//! followed by the bincode (standard config) encoding of a [`ShadowState`].

use std::collections::VecDeque;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};

use super::state::ShadowState;

/// Largest accepted frame payload in bytes.
pub const MAX_FRAME_LEN: usize = 1024;

/// Errors raised by a shadow link.
#[derive(Debug, thiserror::Error)]
pub enum ShadowError {
    /// The underlying transport failed.
    #[error("shadow link I/O error: {0}")]
    Io(#[from] io::Error),

    /// A state could not be encoded.
    #[error("failed to encode shadow state: {0}")]
    Encode(String),

    /// A frame did not decode to a state.
    #[error("failed to decode shadow state: {0}")]
    Decode(String),

    /// A frame header announced an oversized payload.
    #[error("shadow frame of {len} bytes exceeds limit of {max}")]
    FrameTooLarge {
        /// Announced payload length.
        len: usize,
        /// Largest accepted length.
        max: usize,
    },

    /// The link was used before `open` or after `close`.
    #[error("shadow link is not open")]
    NotOpen,

    /// `acquire` was called while a message was still leased.
    #[error("shadow state acquired twice without release")]
    AlreadyLeased,

    /// `release` was called without a leased message.
    #[error("shadow state released without being acquired")]
    NotLeased,

    /// The peer went away in the middle of a frame.
    #[error("shadow peer disconnected")]
    Disconnected,
}

/// A bounded rendezvous with the reference process.
pub trait ShadowLink {
    /// Prepares the link. Blocks until a peer is available.
    fn open(&mut self) -> Result<(), ShadowError>;

    /// Blocks for the next message. `None` means the reference asked to stop
    /// or went away cleanly.
    fn acquire(&mut self) -> Result<Option<ShadowState>, ShadowError>;

    /// Returns the answered message to the reference.
    fn release(&mut self, state: ShadowState) -> Result<(), ShadowError>;

    /// Tears the link down.
    fn close(&mut self) -> Result<(), ShadowError>;
}

/// Writes one framed state and flushes.
pub fn write_frame<W: Write>(writer: &mut W, state: &ShadowState) -> Result<(), ShadowError> {
    let payload = bincode::serde::encode_to_vec(state, bincode::config::standard())
        .map_err(|e| ShadowError::Encode(e.to_string()))?;
    if payload.len() > MAX_FRAME_LEN {
        return Err(ShadowError::FrameTooLarge {
            len: payload.len(),
            max: MAX_FRAME_LEN,
        });
    }
    writer.write_all(&(payload.len() as u32).to_le_bytes())?;
    writer.write_all(&payload)?;
    writer.flush()?;
    Ok(())
}

/// Reads one framed state. Returns `None` on a clean end of stream.
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Option<ShadowState>, ShadowError> {
    let mut len_bytes = [0u8; 4];
    let mut filled = 0;
    while filled < len_bytes.len() {
        let n = reader.read(&mut len_bytes[filled..])?;
        if n == 0 {
            return if filled == 0 {
                Ok(None)
            } else {
                Err(ShadowError::Disconnected)
            };
        }
        filled += n;
    }

    let len = u32::from_le_bytes(len_bytes) as usize;
    if len > MAX_FRAME_LEN {
        return Err(ShadowError::FrameTooLarge {
            len,
            max: MAX_FRAME_LEN,
        });
    }
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => ShadowError::Disconnected,
        _ => ShadowError::Io(e),
    })?;
    let (state, _) = bincode::serde::decode_from_slice(&payload, bincode::config::standard())
        .map_err(|e| ShadowError::Decode(e.to_string()))?;
    Ok(Some(state))
}

/// A link over any pair of byte streams.
pub struct StreamLink<R: Read, W: Write> {
    reader: R,
    writer: W,
    open: bool,
    leased: bool,
}

impl<R: Read, W: Write> StreamLink<R, W> {
    /// Wraps a reader and writer. The link starts closed.
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer,
            open: false,
            leased: false,
        }
    }

    /// Consumes the link, returning the reader and writer.
    pub fn into_parts(self) -> (R, W) {
        (self.reader, self.writer)
    }
}

impl StreamLink<BufReader<TcpStream>, BufWriter<TcpStream>> {
    /// Wraps a connected TCP stream.
    pub fn tcp(stream: TcpStream) -> io::Result<Self> {
        stream.set_nodelay(true)?;
        let reader = BufReader::new(stream.try_clone()?);
        let writer = BufWriter::new(stream);
        Ok(Self::new(reader, writer))
    }
}

impl<R: Read, W: Write> ShadowLink for StreamLink<R, W> {
    fn open(&mut self) -> Result<(), ShadowError> {
        self.open = true;
        Ok(())
    }

    fn acquire(&mut self) -> Result<Option<ShadowState>, ShadowError> {
        if !self.open {
            return Err(ShadowError::NotOpen);
        }
        if self.leased {
            return Err(ShadowError::AlreadyLeased);
        }
        let state = read_frame(&mut self.reader)?;
        self.leased = state.is_some();
        Ok(state)
    }

    fn release(&mut self, state: ShadowState) -> Result<(), ShadowError> {
        if !self.open {
            return Err(ShadowError::NotOpen);
        }
        if !self.leased {
            return Err(ShadowError::NotLeased);
        }
        self.leased = false;
        write_frame(&mut self.writer, &state)
    }

    fn close(&mut self) -> Result<(), ShadowError> {
        if self.open {
            self.open = false;
            self.writer.flush()?;
        }
        Ok(())
    }
}

/// A link that accepts a single reference process over TCP.
pub struct TcpLink {
    listener: TcpListener,
    conn: Option<StreamLink<BufReader<TcpStream>, BufWriter<TcpStream>>>,
}

impl TcpLink {
    /// Binds the listening socket. The peer is accepted by `open`.
    pub fn bind<A: ToSocketAddrs>(addr: A) -> Result<Self, ShadowError> {
        let listener = TcpListener::bind(addr)?;
        log::info!("shadow link listening on {}", listener.local_addr()?);
        Ok(Self {
            listener,
            conn: None,
        })
    }

    /// The bound address, useful after binding port 0.
    pub fn local_addr(&self) -> Result<SocketAddr, ShadowError> {
        Ok(self.listener.local_addr()?)
    }

    fn conn(
        &mut self,
    ) -> Result<&mut StreamLink<BufReader<TcpStream>, BufWriter<TcpStream>>, ShadowError> {
        self.conn.as_mut().ok_or(ShadowError::NotOpen)
    }
}

impl ShadowLink for TcpLink {
    fn open(&mut self) -> Result<(), ShadowError> {
        if self.conn.is_some() {
            return Ok(());
        }
        let (stream, peer) = self.listener.accept()?;
        log::info!("shadow reference connected from {peer}");
        let mut link = StreamLink::tcp(stream)?;
        link.open()?;
        self.conn = Some(link);
        Ok(())
    }

    fn acquire(&mut self) -> Result<Option<ShadowState>, ShadowError> {
        self.conn()?.acquire()
    }

    fn release(&mut self, state: ShadowState) -> Result<(), ShadowError> {
        self.conn()?.release(state)
    }

    fn close(&mut self) -> Result<(), ShadowError> {
        if let Some(mut link) = self.conn.take() {
            link.close()?;
            log::info!("shadow link closed");
        }
        Ok(())
    }
}

/// An in-process link fed from a queue of scripted messages.
///
/// Every released message is recorded in order.
#[derive(Debug, Default)]
pub struct MemoryLink {
    incoming: VecDeque<ShadowState>,
    released: Vec<ShadowState>,
    open: bool,
    leased: bool,
    opens: usize,
    closes: usize,
}

impl MemoryLink {
    /// Creates a link that will deliver `states` in order, then stop.
    pub fn new<I: IntoIterator<Item = ShadowState>>(states: I) -> Self {
        Self {
            incoming: states.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Queues another message.
    pub fn push(&mut self, state: ShadowState) {
        self.incoming.push_back(state);
    }

    /// Messages released so far.
    pub fn released(&self) -> &[ShadowState] {
        &self.released
    }

    /// Messages not yet acquired.
    pub fn pending(&self) -> usize {
        self.incoming.len()
    }

    /// Whether a message is currently leased.
    pub fn is_leased(&self) -> bool {
        self.leased
    }

    /// Number of `open` and `close` calls seen.
    pub fn open_close_counts(&self) -> (usize, usize) {
        (self.opens, self.closes)
    }
}

impl ShadowLink for MemoryLink {
    fn open(&mut self) -> Result<(), ShadowError> {
        self.open = true;
        self.opens += 1;
        Ok(())
    }

    fn acquire(&mut self) -> Result<Option<ShadowState>, ShadowError> {
        if !self.open {
            return Err(ShadowError::NotOpen);
        }
        if self.leased {
            return Err(ShadowError::AlreadyLeased);
        }
        let state = self.incoming.pop_front();
        self.leased = state.is_some();
        Ok(state)
    }

    fn release(&mut self, state: ShadowState) -> Result<(), ShadowError> {
        if !self.open {
            return Err(ShadowError::NotOpen);
        }
        if !self.leased {
            return Err(ShadowError::NotLeased);
        }
        self.leased = false;
        self.released.push(state);
        Ok(())
    }

    fn close(&mut self) -> Result<(), ShadowError> {
        self.open = false;
        self.closes += 1;
        Ok(())
    }
}
