use tokio::io::{AsyncRead, AsyncWrite};

/// Full-duplex byte stream carrying H4-framed HCI packets.
///
/// The crate never opens devices itself; anything readable and writable
/// works, from a serial port handle to an in-memory duplex pipe in tests.
/// Controllers attached over UART conventionally expect 8N1 with RTS/CTS
/// hardware flow control at 1,000,000 baud, but configuring the line is the
/// caller's business.
pub trait Transport: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin + 'static> Transport for T {}
