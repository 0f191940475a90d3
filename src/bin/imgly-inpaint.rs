//! IMG.LY Inpainting CLI Tool
//!
//! Command-line interface for marking regions of an image and removing them
//! through the remote inpainting service.

#[cfg(feature = "cli")]
use imgly_inpaint::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    panic!("CLI feature not enabled. Please rebuild with --features cli");
}
