//! u2net Background Removal CLI Tool
//!
//! Command-line interface for removing image backgrounds with the
//! u2net-bgremove library, supporting native ONNX Runtime and
//! Python-bridged backends.

#[cfg(feature = "cli")]
use u2net_bgremove::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    panic!("CLI feature not enabled. Please rebuild with --features cli");
}
