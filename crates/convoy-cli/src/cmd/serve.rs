use anyhow::Result;
use std::path::Path;

pub fn run(root: &Path, port: u16) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(convoy_server::serve(root.to_path_buf(), port))
}
