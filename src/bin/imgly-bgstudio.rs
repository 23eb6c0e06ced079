//! IMG.LY background studio CLI tool
//!
//! Removes backgrounds through the remote service, then composites, filters
//! and exports the cut-out locally.

#[cfg(feature = "cli")]
use imgly_bgstudio::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    panic!("CLI feature not enabled. Please rebuild with --features cli");
}
