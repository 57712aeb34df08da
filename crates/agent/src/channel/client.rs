//! Control client: the orchestrator calls the agent makes.
//!
//! Sessions talk to the orchestrator only through [`ControlClient`].
//! [`GrpcControlClient`] is the tonic implementation; `fake.rs` holds the
//! in-memory double used by session and loop tests.

use std::future::Future;
use std::pin::Pin;

use futures_util::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::metadata::{Ascii, MetadataValue};
use tonic::service::interceptor::InterceptedService;
use tonic::service::Interceptor;
use tonic::transport::Channel;
use tonic::{Request, Status};

use super::error::ConnectionError;
use crate::proto::{
    agent_client::AgentClient, AgentCommand, AgentInfo, ContainerInspectMessage,
    ContainerLogMessage, ContainerStateListMessage,
};

/// Bearer token metadata key, sent on every call.
pub const TOKEN_METADATA_KEY: &str = "lens-node-token";

/// Target container metadata key, sent when opening a log sub-stream.
pub const CONTAINER_NAME_METADATA_KEY: &str = "lens-container-name";

pub type ControlFuture<T> = Pin<Box<dyn Future<Output = Result<T, Status>> + Send + 'static>>;

pub type CommandStream = Pin<Box<dyn Stream<Item = Result<AgentCommand, Status>> + Send + 'static>>;

/// Calls against the orchestrator.
///
/// Sub-stream calls take the receiving half of the session's frame
/// channel. Dropping the sender closes the sending side; the returned
/// future resolves once the orchestrator closes the sub-stream.
pub trait ControlClient: Send + Sync {
    /// Opens the top-level command stream.
    fn connect(&self, info: AgentInfo) -> ControlFuture<CommandStream>;

    fn container_state(&self, frames: mpsc::Receiver<ContainerStateListMessage>) -> ControlFuture<()>;

    fn container_log(&self, name: &str, frames: mpsc::Receiver<ContainerLogMessage>) -> ControlFuture<()>;

    fn container_inspect(&self, message: ContainerInspectMessage) -> ControlFuture<()>;
}

/// Adds the node token to every outgoing request.
#[derive(Clone)]
pub struct TokenInterceptor {
    token: MetadataValue<Ascii>,
}

impl TokenInterceptor {
    pub fn new(token: &str) -> Result<Self, ConnectionError> {
        let token = token
            .parse()
            .map_err(|_| ConnectionError::InvalidMetadata("node token is not valid ASCII".to_string()))?;
        Ok(Self { token })
    }
}

impl Interceptor for TokenInterceptor {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        request.metadata_mut().insert(TOKEN_METADATA_KEY, self.token.clone());
        Ok(request)
    }
}

type AuthedClient = AgentClient<InterceptedService<Channel, TokenInterceptor>>;

/// Tonic clients are cheap to clone (Arc internally), so each call works
/// on its own clone and the returned futures own everything they need.
#[derive(Clone)]
pub struct GrpcControlClient {
    client: AuthedClient,
}

impl GrpcControlClient {
    pub fn new(channel: Channel, token: &str) -> Result<Self, ConnectionError> {
        let interceptor = TokenInterceptor::new(token)?;
        Ok(Self {
            client: AgentClient::with_interceptor(channel, interceptor),
        })
    }
}

impl ControlClient for GrpcControlClient {
    fn connect(&self, info: AgentInfo) -> ControlFuture<CommandStream> {
        let mut client = self.client.clone();
        Box::pin(async move {
            let response = client.connect(Request::new(info)).await?;
            Ok(Box::pin(response.into_inner()) as CommandStream)
        })
    }

    fn container_state(&self, frames: mpsc::Receiver<ContainerStateListMessage>) -> ControlFuture<()> {
        let mut client = self.client.clone();
        Box::pin(async move {
            client
                .container_state(Request::new(ReceiverStream::new(frames)))
                .await?;
            Ok(())
        })
    }

    fn container_log(&self, name: &str, frames: mpsc::Receiver<ContainerLogMessage>) -> ControlFuture<()> {
        let mut client = self.client.clone();
        let name = name.parse::<MetadataValue<Ascii>>();
        Box::pin(async move {
            let name = name.map_err(|_| Status::invalid_argument("container name is not valid metadata"))?;
            let mut request = Request::new(ReceiverStream::new(frames));
            request.metadata_mut().insert(CONTAINER_NAME_METADATA_KEY, name);

            client.container_log(request).await?;
            Ok(())
        })
    }

    fn container_inspect(&self, message: ContainerInspectMessage) -> ControlFuture<()> {
        let mut client = self.client.clone();
        Box::pin(async move {
            client.container_inspect(Request::new(message)).await?;
            Ok(())
        })
    }
}
