use std::path::{Path, PathBuf};

use fs_err as fs;
use serde_json::to_string_pretty;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

use crate::wire::Instruction;

pub fn init_tracing(json: bool, debug: bool) {
    let default = if debug {
        "adgenius=debug,tower_http=debug"
    } else {
        "adgenius=info,tower_http=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into());

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[derive(Debug)]
pub struct SavedPaths {
    pub dir: PathBuf,
    pub request: PathBuf,
    pub response: PathBuf,
}

fn tx_dir(root: &Path, tx: Uuid) -> PathBuf {
    root.join("failed").join(tx.to_string())
}

/// Dump a rejected generation (request and raw model text) for offline
/// inspection. These files may contain user input; keep the directory private.
pub fn save_failed_generation(root: &Path, tx: Uuid, req: &Instruction, raw: &str, reason: &str) -> anyhow::Result<SavedPaths> {
    let dir = tx_dir(root, tx);
    fs::create_dir_all(&dir)?;

    let request = dir.join("request.json");
    fs::write(&request, to_string_pretty(req)?)?;

    let response = dir.join("response.txt");
    fs::write(&response, raw)?;

    fs::write(dir.join("reason.txt"), reason)?;

    Ok(SavedPaths { dir, request, response })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_generation_is_written_per_transaction() {
        let root = tempfile::tempdir().unwrap();
        let tx = Uuid::new_v4();
        let req = Instruction { system: "sys".into(), user: "usr".into() };
        let saved = save_failed_generation(root.path(), tx, &req, "not json", "malformed").unwrap();

        assert!(saved.dir.ends_with(tx.to_string()));
        assert_eq!(fs::read_to_string(&saved.response).unwrap(), "not json");
        let back: Instruction = serde_json::from_str(&fs::read_to_string(&saved.request).unwrap()).unwrap();
        assert_eq!(back, req);
        assert_eq!(fs::read_to_string(saved.dir.join("reason.txt")).unwrap(), "malformed");
    }
}
