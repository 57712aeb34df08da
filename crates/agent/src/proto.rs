//! Generated protobuf code for the agent protocol.

tonic::include_proto!("agent");
