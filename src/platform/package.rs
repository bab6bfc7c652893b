//! Chaincode packaging.
//!
//! Collects a Go chaincode's sources from `$GOPATH/src/<path>` into an
//! in-memory package. Entries are stored under `src/<path>/…`, except
//! `META-INF/` content (state-database index definitions), which keeps its
//! path relative to the chaincode root. Entries are sorted, so the code hash
//! is stable across runs and machines.

use std::fs;
use std::path::Path;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Serialize, Serializer};
use sha2::{Digest, Sha256};

use super::PlatformError;

/// File extensions picked up from the source tree.
const SOURCE_EXTENSIONS: &[&str] = &["go", "c", "h", "s", "mod", "sum", "json", "yaml", "yml"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChaincodeKind {
    Golang,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageEntry {
    pub name: String,
    #[serde(serialize_with = "as_base64")]
    pub contents: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChaincodePackage {
    pub kind: ChaincodeKind,
    pub path: String,
    pub entries: Vec<PackageEntry>,
    /// Hex SHA-256 over entry names and contents.
    pub code_hash: String,
}

fn as_base64<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&BASE64.encode(bytes))
}

/// Package the Go chaincode at `gopath/src/cc_path`.
pub fn package_golang(cc_path: &str, gopath: &Path) -> Result<ChaincodePackage, PlatformError> {
    if cc_path.trim().is_empty() {
        return Err(PlatformError::Package("chaincode path must not be empty".into()));
    }
    let root = gopath.join("src").join(cc_path);
    if !root.is_dir() {
        return Err(PlatformError::Package(format!(
            "chaincode source directory not found: {}",
            root.display()
        )));
    }

    let mut entries = Vec::new();
    collect(&root, &root, cc_path, &mut entries)?;
    entries.sort_by(|a, b| a.name.cmp(&b.name));

    if !entries.iter().any(|e| e.name.ends_with(".go")) {
        return Err(PlatformError::Package(format!(
            "no Go source files under {}",
            root.display()
        )));
    }

    let mut hasher = Sha256::new();
    for e in &entries {
        hasher.update(e.name.as_bytes());
        hasher.update([0u8]);
        hasher.update(&e.contents);
    }

    Ok(ChaincodePackage {
        kind: ChaincodeKind::Golang,
        path: cc_path.to_string(),
        entries,
        code_hash: hex::encode(hasher.finalize()),
    })
}

fn collect(
    root: &Path,
    dir: &Path,
    cc_path: &str,
    out: &mut Vec<PackageEntry>,
) -> Result<(), PlatformError> {
    let read_err = |p: &Path, e: std::io::Error| {
        PlatformError::Package(format!("cannot read {}: {e}", p.display()))
    };

    for entry in fs::read_dir(dir).map_err(|e| read_err(dir, e))? {
        let entry = entry.map_err(|e| read_err(dir, e))?;
        let path = entry.path();
        let file_name = entry.file_name();
        let file_name = file_name.to_string_lossy();
        if file_name.starts_with('.') {
            continue;
        }

        let file_type = entry.file_type().map_err(|e| read_err(&path, e))?;
        if file_type.is_dir() {
            collect(root, &path, cc_path, out)?;
            continue;
        }
        if !file_type.is_file() {
            continue;
        }

        let rel = path
            .strip_prefix(root)
            .map_err(|e| PlatformError::Package(e.to_string()))?;
        let rel = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        let name = if rel.starts_with("META-INF/") {
            rel
        } else {
            let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
            if !SOURCE_EXTENSIONS.contains(&ext) {
                continue;
            }
            format!("src/{}/{rel}", cc_path.trim_matches('/'))
        };

        let contents = fs::read(&path).map_err(|e| read_err(&path, e))?;
        out.push(PackageEntry { name, contents });
    }
    Ok(())
}
