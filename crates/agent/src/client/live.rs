//! Live: implements `RuntimeOps` for the real Bollard-backed `DockerClient`.

use tokio_util::io::StreamReader;

use crate::client::docker::{EventStream, LogReader, RuntimeFuture, RuntimeOps};
use crate::docker::{ContainerFilter, ContainerInfo, DockerClient, Inspection, LogOptions};

impl RuntimeOps for DockerClient {
    fn list_containers<'a>(&'a self, filter: &'a ContainerFilter) -> RuntimeFuture<'a, Vec<ContainerInfo>> {
        Box::pin(DockerClient::list_containers(self, filter))
    }

    fn inspect_container<'a>(&'a self, id: &'a str) -> RuntimeFuture<'a, Inspection> {
        Box::pin(DockerClient::inspect_container(self, id))
    }

    fn start_container<'a>(&'a self, id: &'a str) -> RuntimeFuture<'a, ()> {
        Box::pin(DockerClient::start_container(self, id))
    }

    fn stop_container<'a>(&'a self, id: &'a str) -> RuntimeFuture<'a, ()> {
        Box::pin(DockerClient::stop_container(self, id))
    }

    fn restart_container<'a>(&'a self, id: &'a str) -> RuntimeFuture<'a, ()> {
        Box::pin(DockerClient::restart_container(self, id))
    }

    fn remove_container<'a>(&'a self, id: &'a str, force: bool) -> RuntimeFuture<'a, ()> {
        Box::pin(DockerClient::remove_container(self, id, force))
    }

    fn events(&self) -> EventStream<'_> {
        Box::pin(self.stream_events())
    }

    fn container_logs<'a>(&'a self, id: &'a str, options: LogOptions) -> LogReader<'a> {
        Box::pin(StreamReader::new(self.container_log_bytes(id, options)))
    }
}
