//! Connection-scoped RPC execution.
//!
//! Every execution acquires its own connection from the provider, runs to
//! completion on the calling thread and hands the connection back exactly once,
//! whatever the outcome. Timeouts and retries are left to the provider and the
//! caller respectively.

use crate::connection::{Connection, ConnectionProvider};
use crate::converter::{SimpleConverter, TermConverter};
use crate::error::RpcError;
use crate::reply::interpret;
use otprpc_protocol::{RpcRequest, Term};
use serde_json::Value;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

/// What an executor is built from.
pub struct ExecutorConfig<P> {
    pub provider: P,
    pub converter: Arc<dyn TermConverter>,
}

impl<P> ExecutorConfig<P> {
    /// Uses `SimpleConverter` for argument and reply conversion.
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            converter: Arc::new(SimpleConverter),
        }
    }

    pub fn with_converter(mut self, converter: impl TermConverter + 'static) -> Self {
        self.converter = Arc::new(converter);
        self
    }
}

/// Runs calls against remote nodes, one connection per call.
pub struct RpcExecutor<P> {
    provider: P,
    converter: Arc<dyn TermConverter>,
}

impl<P: ConnectionProvider> RpcExecutor<P> {
    pub fn new(config: ExecutorConfig<P>) -> Self {
        Self {
            provider: config.provider,
            converter: config.converter,
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn converter(&self) -> &dyn TermConverter {
        self.converter.as_ref()
    }

    /// Runs `action` with a freshly acquired connection.
    ///
    /// The connection is released before this returns, including when
    /// `action` fails or panics. Failure to acquire is reported as
    /// `RpcError::Connection`. Errors from `action` are returned as they are;
    /// `?` on transport, protocol, conversion or I/O errors inside `action`
    /// already wraps them into `RpcError::Access`.
    pub fn with_connection<T, F>(&self, action: F) -> Result<T, RpcError>
    where
        F: FnOnce(&mut P::Connection) -> Result<T, RpcError>,
    {
        let mut lease = Lease::acquire(&self.provider)?;
        action(&mut lease)
    }

    /// Calls `module:function(args...)` and returns the successful reply.
    ///
    /// `{badrpc, _}` replies fail with `RpcError::BadRpc`, `{error, _}` replies
    /// with `RpcError::RemoteRpc`.
    pub fn execute(&self, module: &str, function: &str, args: &[Term]) -> Result<Term, RpcError> {
        let request = RpcRequest::new(module, function, args.to_vec());
        self.with_connection(|conn| {
            tracing::debug!(
                "Sending RPC for module [{}] function [{}] args [{}]",
                module,
                function,
                Term::List(args.to_vec())
            );
            conn.send_rpc(&request)?;
            let reply = conn.receive_rpc()?;
            tracing::debug!("Response received = {}", reply);
            interpret(reply).into_result()
        })
    }

    /// Converts `args` with the configured converter, then calls.
    pub fn execute_rpc(&self, module: &str, function: &str, args: &[Value]) -> Result<Term, RpcError> {
        let args = self.converter.to_args(args)?;
        self.execute(module, function, &args)
    }

    /// Like `execute_rpc`, also converting the reply through
    /// [`TermConverter::from_rpc`].
    pub fn execute_and_convert(
        &self,
        module: &str,
        function: &str,
        args: &[Value],
    ) -> Result<Value, RpcError> {
        let reply = self.execute_rpc(module, function, args)?;
        Ok(self.converter.from_rpc(module, function, &reply)?)
    }

    /// Converts arguments and reply with `converter` instead of the configured one.
    pub fn execute_and_convert_with(
        &self,
        module: &str,
        function: &str,
        converter: &dyn TermConverter,
        args: &[Value],
    ) -> Result<Value, RpcError> {
        let args = converter.to_args(args)?;
        let reply = self.execute(module, function, &args)?;
        Ok(converter.from_term(&reply)?)
    }
}

/// A connection on loan from a provider, returned on drop.
struct Lease<'a, P: ConnectionProvider> {
    provider: &'a P,
    /// Present until the lease is dropped.
    connection: Option<P::Connection>,
}

impl<'a, P: ConnectionProvider> Lease<'a, P> {
    fn acquire(provider: &'a P) -> Result<Self, RpcError> {
        let connection = provider.acquire().map_err(|e| {
            tracing::debug!("Could not acquire connection: {}", e);
            RpcError::Connection(e)
        })?;
        Ok(Self {
            provider,
            connection: Some(connection),
        })
    }
}

impl<P: ConnectionProvider> Deref for Lease<'_, P> {
    type Target = P::Connection;

    fn deref(&self) -> &Self::Target {
        match &self.connection {
            Some(connection) => connection,
            None => unreachable!("connection used after release"),
        }
    }
}

impl<P: ConnectionProvider> DerefMut for Lease<'_, P> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match &mut self.connection {
            Some(connection) => connection,
            None => unreachable!("connection used after release"),
        }
    }
}

impl<P: ConnectionProvider> Drop for Lease<'_, P> {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            self.provider.release(connection);
        }
    }
}
