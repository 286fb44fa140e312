//! Connection management.
//!
//! The executor only sees the `Connection` and `ConnectionProvider` traits. The
//! TCP implementations below speak the framed protocol from `otprpc-protocol`
//! with blocking sockets: every call writes one request frame and reads until
//! the matching response frame arrives.
//!
//! The TCP transport speaks the `OTPR` framing, not the Erlang distribution
//! protocol. It needs a bridging endpoint next to the node that accepts these
//! frames and performs the actual `rpc:call`; a broker cannot be reached
//! directly. Other transports plug in through `ConnectionProvider`.

use crate::error::ClientError;
use otprpc_protocol::{
    Decoder, Encoder, HelloParams, Request, RequestBody, Response, RpcRequest, Term,
    DEFAULT_PORT, PROTOCOL_VERSION,
};
use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::Duration;

/// Default read buffer size (8 KiB).
pub const DEFAULT_READ_BUFFER_SIZE: usize = 8 * 1024;

/// Minimum read buffer size (1 KiB).
pub const MIN_READ_BUFFER_SIZE: usize = 1024;

/// Maximum read buffer size (1 MiB).
pub const MAX_READ_BUFFER_SIZE: usize = 1024 * 1024;

/// A session with a remote node, able to carry one call at a time.
pub trait Connection {
    /// Sends a call. At most one call may be outstanding.
    fn send_rpc(&mut self, request: &RpcRequest) -> Result<(), ClientError>;

    /// Blocks until the reply to the outstanding call is received.
    fn receive_rpc(&mut self) -> Result<Term, ClientError>;
}

/// Hands out connections and takes them back.
///
/// Implementations own any pooling or synchronization. `release` has no way to
/// report failure; whatever goes wrong while giving a connection back is the
/// provider's to handle.
pub trait ConnectionProvider {
    type Connection: Connection;

    fn acquire(&self) -> Result<Self::Connection, ClientError>;

    fn release(&self, connection: Self::Connection);
}

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Node address.
    pub addr: SocketAddr,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Socket read/write timeout. `None` blocks indefinitely.
    pub request_timeout: Option<Duration>,
    /// Node name announced in HELLO.
    pub node_name: Option<String>,
    /// Cookie presented in HELLO.
    pub cookie: Option<String>,
    /// Read buffer size for socket reads.
    pub read_buffer_size: usize,
}

impl ConnectionConfig {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            connect_timeout: Duration::from_secs(10),
            request_timeout: None,
            node_name: None,
            cookie: None,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn with_node_name(mut self, name: impl Into<String>) -> Self {
        self.node_name = Some(name.into());
        self
    }

    pub fn with_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.cookie = Some(cookie.into());
        self
    }

    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.clamp(MIN_READ_BUFFER_SIZE, MAX_READ_BUFFER_SIZE);
        self
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)))
    }
}

/// A blocking TCP connection to a node endpoint.
pub struct TcpConnection {
    stream: TcpStream,
    decoder: Decoder,
    read_buffer_size: usize,
    next_id: u64,
    /// ID of the call awaiting its reply.
    pending: Option<String>,
}

impl TcpConnection {
    /// Connects and performs the HELLO handshake.
    pub fn connect(config: &ConnectionConfig) -> Result<Self, ClientError> {
        tracing::debug!("Connecting to {}...", config.addr);

        let stream = TcpStream::connect_timeout(&config.addr, config.connect_timeout)
            .map_err(|e| {
                tracing::debug!("Connection failed: {}", e);
                ClientError::from_io(e)
            })?;
        stream.set_nodelay(true).ok();
        stream.set_read_timeout(config.request_timeout)?;
        stream.set_write_timeout(config.request_timeout)?;

        let mut conn = Self {
            stream,
            decoder: Decoder::new(),
            read_buffer_size: config.read_buffer_size,
            next_id: 1,
            pending: None,
        };
        conn.handshake(config)?;
        tracing::debug!("Connected to {}", config.addr);

        Ok(conn)
    }

    fn handshake(&mut self, config: &ConnectionConfig) -> Result<(), ClientError> {
        let id = self.next_id();
        let hello = HelloParams {
            protocol_version: PROTOCOL_VERSION,
            node_name: config.node_name.clone(),
            cookie: config.cookie.clone(),
        };
        self.write_request(&Request::new(&id, RequestBody::Hello(hello)))?;

        let response = self.read_response()?;
        if response.id != id {
            return Err(ClientError::UnexpectedMessage(format!(
                "HELLO answered with id {}",
                response.id
            )));
        }
        if response.is_error() {
            let err = refusal(response);
            tracing::warn!("Node {} refused HELLO: {}", config.addr, err);
            return Err(err);
        }
        Ok(())
    }

    fn next_id(&mut self) -> String {
        let id = self.next_id;
        self.next_id += 1;
        id.to_string()
    }

    fn write_request(&mut self, request: &Request) -> Result<(), ClientError> {
        let encoded = Encoder::encode_request(request)?;
        self.stream
            .write_all(&encoded)
            .map_err(ClientError::from_io)?;
        tracing::debug!("Request id={} sent ({} bytes)", request.id, encoded.len());
        Ok(())
    }

    fn read_response(&mut self) -> Result<Response, ClientError> {
        let mut buf = vec![0u8; self.read_buffer_size];
        loop {
            if let Some(response) = self.decoder.decode_response()? {
                tracing::debug!("Decoded response id={}", response.id);
                return Ok(response);
            }

            let n = self.stream.read(&mut buf).map_err(ClientError::from_io)?;
            if n == 0 {
                tracing::debug!("Connection closed (0 bytes)");
                return Err(ClientError::ConnectionClosed);
            }
            self.decoder.extend(&buf[..n]);
        }
    }

    /// Returns the address of the connected node.
    pub fn peer_addr(&self) -> Result<SocketAddr, ClientError> {
        Ok(self.stream.peer_addr()?)
    }

    /// Says goodbye and shuts the socket down. Failures are ignored.
    pub fn close(mut self) {
        let id = self.next_id();
        if let Err(e) = self.write_request(&Request::new(id, RequestBody::Bye)) {
            tracing::warn!("BYE not delivered: {}", e);
        }
        if let Err(e) = self.stream.shutdown(Shutdown::Both) {
            tracing::debug!("Shutdown failed: {}", e);
        }
    }
}

fn refusal(response: Response) -> ClientError {
    match response.error {
        Some(err) => ClientError::ServerError {
            code: err.code,
            message: err.message,
        },
        None => ClientError::UnexpectedMessage(format!(
            "error response id={} without details",
            response.id
        )),
    }
}

impl Connection for TcpConnection {
    fn send_rpc(&mut self, request: &RpcRequest) -> Result<(), ClientError> {
        if let Some(id) = &self.pending {
            return Err(ClientError::UnexpectedMessage(format!(
                "call id={} still awaiting its reply",
                id
            )));
        }
        let id = self.next_id();
        self.write_request(&Request::call(&id, request.clone()))?;
        self.pending = Some(id);
        Ok(())
    }

    fn receive_rpc(&mut self) -> Result<Term, ClientError> {
        let id = self.pending.take().ok_or(ClientError::NoPendingCall)?;
        let response = self.read_response()?;

        if response.id != id {
            return Err(ClientError::UnexpectedMessage(format!(
                "response id={} while waiting for id={}",
                response.id, id
            )));
        }
        if response.is_error() {
            return Err(refusal(response));
        }

        response
            .result
            .ok_or_else(|| ClientError::UnexpectedMessage(format!("response id={} has no result", id)))
    }
}

/// Opens a fresh TCP connection per acquisition and closes it on release.
#[derive(Debug, Clone)]
pub struct TcpConnectionFactory {
    config: ConnectionConfig,
}

impl TcpConnectionFactory {
    pub fn new(config: ConnectionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }
}

impl ConnectionProvider for TcpConnectionFactory {
    type Connection = TcpConnection;

    fn acquire(&self) -> Result<TcpConnection, ClientError> {
        TcpConnection::connect(&self.config)
    }

    fn release(&self, connection: TcpConnection) {
        connection.close();
    }
}
