//! `--set-api-key`.

use std::path::Path;

pub fn set_api_key(data_dir: &Path, key: &str) -> Result<(), Box<dyn std::error::Error>> {
    let path = wigli_config::save_api_key(data_dir, key)?;
    println!("Saved API key at {}", path.display());
    Ok(())
}
