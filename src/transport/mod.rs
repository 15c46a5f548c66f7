use std::future::Future;

use futures::stream::BoxStream;

use crate::client_config::AdminConfig;
use crate::error::TransportError;
use crate::request::AdminRequest;
use crate::result::ItemResponse;

pub mod kafka;

pub use kafka::KafkaTransport;

/// Responses of one request, yielded as they arrive.
pub type ResponseStream = BoxStream<'static, Result<ItemResponse, TransportError>>;

/// Connection handle to a cluster, as seen by an admin session.
///
/// Implementations must be safe to share between concurrent dispatches.
pub trait AdminTransport: Send + Sync + 'static {
    /// Open a new handle for `config`.
    fn connect(config: &AdminConfig) -> impl Future<Output = Result<Self, TransportError>> + Send
    where
        Self: Sized;

    /// Send one request. Nothing is put on the wire until the stream is first
    /// polled. Responses may arrive in any order, and the stream ends once the
    /// transport has nothing more to report for this request.
    fn send(&self, request: AdminRequest) -> ResponseStream;

    /// Release the connections owned by this handle.
    fn shutdown(&self) -> impl Future<Output = ()> + Send {
        async {}
    }
}
