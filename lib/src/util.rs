use std::path::{Path, PathBuf};
use std::str::FromStr;

use tokio::fs::read_dir;
use tokio::io::AsyncReadExt as _;

use crate::consts::*;
use crate::errors::*;

macro_rules! make_log_macro {
    (@wdoll $macro_name:ident, $block_name:literal, ($dol:tt)) => {
        #[allow(unused_macros)]
        macro_rules! $macro_name {
            ($dol($args:tt)+) => {
                ::log::$macro_name!(target: $block_name, $dol($args)+);
            };
        }
    };
    ($macro_name:ident, $block_name:literal) => {
        make_log_macro!(@wdoll $macro_name, $block_name, ($));
    };
}

pub async fn read_file(path: impl AsRef<Path>) -> std::io::Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut content = String::new();
    file.read_to_string(&mut content).await?;
    Ok(content.trim_end().to_string())
}

/// Read a sysfs attribute holding a single number.
pub async fn read_number<T>(path: impl AsRef<Path>) -> Result<T>
where
    T: FromStr,
    AmbrightError: From<T::Err>,
{
    Ok(read_file(path).await?.trim().parse()?)
}

/// List the entries of `dir` sorted by file name, so discovery always walks
/// devices in the same order.
pub async fn sorted_entries(dir: impl AsRef<Path>) -> Result<Vec<(String, PathBuf)>> {
    let mut entries = read_dir(dir).await?;

    let mut found = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        found.push((entry.file_name().to_string_lossy().to_string(), entry.path()));
    }
    found.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(found)
}

/// Look for `file.extension` in the user config dir, then the system config dir.
pub fn find_file(file: &str, extension: Option<&str>) -> Option<PathBuf> {
    let file_name = match extension {
        Some(extension) => format!("{file}.{extension}"),
        None => file.to_string(),
    };

    dirs::config_dir()
        .map(|dir| dir.join(CONFIG_DIR_NAME))
        .into_iter()
        .chain(std::iter::once(PathBuf::from(SYSTEM_CONFIG_DIR)))
        .map(|dir| dir.join(&file_name))
        .find(|path| path.is_file())
}
