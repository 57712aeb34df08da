use lens_agent::runtime::{boot, serve};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    boot::init_logging();
    let (state, params) = boot::boot().await?;
    serve::serve(state, params).await
}
