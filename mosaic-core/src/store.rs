//! Persistence collaborator and receiver output layout.
//!
//! ```text
//! <output>/<identity>/images/<filename>
//! <output>/<identity>/frames/<stem>_<YYYYmmdd_HHMMSS>/frame_<idx:04>_<row>_<col>.bin
//! <output>/<identity>/frames/<stem>_<YYYYmmdd_HHMMSS>/FAILED_DECODE_<filename>_<YYYYmmdd_HHMMSS>.bin
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Local};

use crate::error::MosaicError;
use crate::frame::FrameHeader;

/// `persist(path, bytes) -> ok | IOError`.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Write `bytes` to `path`, creating parent directories as needed.
    async fn save(&self, path: &Path, bytes: Bytes) -> Result<(), MosaicError>;
}

// ── FsStore ──────────────────────────────────────────────────────

/// Writes to the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsStore;

#[async_trait]
impl ImageStore for FsStore {
    async fn save(&self, path: &Path, bytes: Bytes) -> Result<(), MosaicError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| MosaicError::storage(parent, e))?;
        }
        tokio::fs::write(path, &bytes)
            .await
            .map_err(|e| MosaicError::storage(path, e))
    }
}

// ── MemoryStore ──────────────────────────────────────────────────

/// Keeps saved files in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    files: Mutex<BTreeMap<PathBuf, Bytes>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &Path) -> Option<Bytes> {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
    }

    /// Every saved path, sorted.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ImageStore for MemoryStore {
    async fn save(&self, path: &Path, bytes: Bytes) -> Result<(), MosaicError> {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_path_buf(), bytes);
        Ok(())
    }
}

// ── OutputLayout ─────────────────────────────────────────────────

const STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Where a session's images, raw frames, and diagnostics go.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn identity_dir(&self, identity: &str) -> PathBuf {
        self.root.join(safe_component(identity, "unknown"))
    }

    /// Final location of a decoded image.
    pub fn image_path(&self, identity: &str, filename: &str) -> PathBuf {
        self.identity_dir(identity)
            .join("images")
            .join(safe_component(filename, "image.bin"))
    }

    /// Per-transfer folder for raw frames and decode diagnostics.
    pub fn frames_dir(&self, identity: &str, filename: &str, at: DateTime<Local>) -> PathBuf {
        let name = safe_component(filename, "image.bin");
        let stem = Path::new(&name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or(name);
        self.identity_dir(identity)
            .join("frames")
            .join(format!("{stem}_{}", at.format(STAMP_FORMAT)))
    }

    /// Raw frame dump, named after its header fields.
    pub fn frame_path(frames_dir: &Path, header: &FrameHeader) -> PathBuf {
        frames_dir.join(format!(
            "frame_{:04}_{}_{}.bin",
            header.frame_index, header.row, header.col
        ))
    }

    /// Where undecodable reconstructed bytes are preserved.
    pub fn failed_decode_path(frames_dir: &Path, filename: &str, at: DateTime<Local>) -> PathBuf {
        frames_dir.join(format!(
            "FAILED_DECODE_{}_{}.bin",
            safe_component(filename, "image.bin"),
            at.format(STAMP_FORMAT)
        ))
    }
}

/// Reduce a peer-supplied name to one safe path component.
pub fn safe_component(name: &str, fallback: &str) -> String {
    let last = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = last
        .chars()
        .map(|c| if c.is_control() || matches!(c, ':' | '*' | '?' | '"' | '<' | '>' | '|') { '_' } else { c })
        .collect();
    let trimmed = cleaned.trim().trim_matches('.');
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 5, 17, 9, 30, 5).unwrap()
    }

    #[test]
    fn sanitizes_peer_names() {
        assert_eq!(safe_component("TX1", "x"), "TX1");
        assert_eq!(safe_component("../../etc/passwd", "x"), "passwd");
        assert_eq!(safe_component("C:\\temp\\shot.jpg", "x"), "shot.jpg");
        assert_eq!(safe_component("..", "x"), "x");
        assert_eq!(safe_component("", "fallback"), "fallback");
        assert_eq!(safe_component("a:b?.jpg", "x"), "a_b_.jpg");
    }

    #[test]
    fn layout_paths() {
        let layout = OutputLayout::new("RX_Output");
        assert_eq!(
            layout.image_path("TX2", "shot.jpg"),
            PathBuf::from("RX_Output/TX2/images/shot.jpg")
        );

        let dir = layout.frames_dir("TX2", "shot.jpg", at());
        assert_eq!(dir, PathBuf::from("RX_Output/TX2/frames/shot_20240517_093005"));

        let header = FrameHeader::new(7, 0, 7, 30).unwrap();
        assert_eq!(
            OutputLayout::frame_path(&dir, &header),
            dir.join("frame_0007_0_7.bin")
        );
        assert_eq!(
            OutputLayout::failed_decode_path(&dir, "shot.jpg", at()),
            dir.join("FAILED_DECODE_shot.jpg_20240517_093005.bin")
        );
    }

    #[tokio::test]
    async fn memory_store_keeps_bytes() {
        let store = MemoryStore::new();
        store
            .save(Path::new("a/b.bin"), Bytes::from_static(b"hello"))
            .await
            .unwrap();
        assert_eq!(store.get(Path::new("a/b.bin")).unwrap().as_ref(), b"hello");
        assert_eq!(store.paths(), vec![PathBuf::from("a/b.bin")]);
    }

    #[tokio::test]
    async fn fs_store_creates_parents() {
        let root = std::env::temp_dir().join(format!("mosaic-store-{}", std::process::id()));
        let path = root.join("TX1/images/img.jpg");
        FsStore.save(&path, Bytes::from_static(b"\xFF\xD8")).await.unwrap();
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"\xFF\xD8");
        tokio::fs::remove_dir_all(&root).await.unwrap();
    }
}
