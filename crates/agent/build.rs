fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Compile the protobuf file into Rust code.
    // The `Connect` rpc would collide with the generated transport
    // constructor, so transport helpers are left out.
    tonic_prost_build::configure()
        .build_client(true)
        .build_server(false)
        .build_transport(false)
        .compile_protos(&["proto/agent.proto"], &["proto"])?;

    Ok(())
}
