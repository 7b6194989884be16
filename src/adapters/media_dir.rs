//! Filesystem media staging adapter.
//!
//! Uploaded attachments land in a staging directory before encryption;
//! `take_staged` picks the first image and first video by file name order
//! and deletes the consumed files, so plaintext never lingers after the
//! record is sealed. Decrypted media is published back into the same
//! directory under the `restored_*` naming.

use std::path::PathBuf;

use crate::domain::{Attachment, AttachmentKind, RecordId};
use crate::ports::MediaStaging;

/// Error type for media staging operations.
#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("media staging I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Staging area backed by a directory on disk.
pub struct DirMediaStaging {
    dir: PathBuf,
}

impl DirMediaStaging {
    #[must_use]
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    fn kind_of(path: &std::path::Path) -> Option<AttachmentKind> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        for kind in [AttachmentKind::Image, AttachmentKind::Video] {
            if kind.staged_extensions().contains(&ext.as_str()) {
                return Some(kind);
            }
        }
        None
    }
}

impl MediaStaging for DirMediaStaging {
    type Error = MediaError;

    fn take_staged(&self) -> Result<Vec<Attachment>, Self::Error> {
        std::fs::create_dir_all(&self.dir)?;

        // Directory iteration order is platform-dependent; sort so
        // "first match wins" is deterministic.
        let mut paths: Vec<PathBuf> = std::fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file())
            .collect();
        paths.sort();

        let mut attachments: Vec<Attachment> = Vec::new();
        let mut consumed = Vec::new();

        for path in paths {
            let Some(kind) = Self::kind_of(&path) else {
                continue;
            };
            if attachments.iter().any(|a| a.kind == kind) {
                continue;
            }
            let bytes = std::fs::read(&path)?;
            tracing::debug!(kind = %kind, size = bytes.len(), "collected staged attachment");
            attachments.push(Attachment { kind, bytes });
            consumed.push(path);
        }

        for path in consumed {
            if let Err(e) = std::fs::remove_file(&path) {
                tracing::warn!("failed to remove staged file {path:?}: {e}");
            }
        }

        Ok(attachments)
    }

    fn publish(&self, record_id: RecordId, attachment: &Attachment) -> Result<(), Self::Error> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(attachment.kind.restored_file_name(record_id));
        std::fs::write(&path, &attachment.bytes)?;
        tracing::info!(kind = %attachment.kind, "published restored attachment to {path:?}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn scratch_dir() -> PathBuf {
        static SEQ: AtomicU32 = AtomicU32::new(0);
        let dir = std::env::temp_dir().join(format!(
            "mediseal-media-{}-{}",
            std::process::id(),
            SEQ.fetch_add(1, Ordering::Relaxed)
        ));
        std::fs::create_dir_all(&dir).expect("Should create scratch dir");
        dir
    }

    #[test]
    fn test_take_staged_first_of_each_kind() {
        let dir = scratch_dir();
        std::fs::write(dir.join("a_scan.jpg"), b"image-a").expect("Should write");
        std::fs::write(dir.join("b_scan.png"), b"image-b").expect("Should write");
        std::fs::write(dir.join("exam.mp4"), b"video").expect("Should write");
        std::fs::write(dir.join("notes.txt"), b"ignored").expect("Should write");

        let staging = DirMediaStaging::new(&dir);
        let staged = staging.take_staged().expect("Should collect");

        assert_eq!(staged.len(), 2);
        let image = staged
            .iter()
            .find(|a| a.kind == AttachmentKind::Image)
            .expect("Should have image");
        assert_eq!(image.bytes, b"image-a");
        let video = staged
            .iter()
            .find(|a| a.kind == AttachmentKind::Video)
            .expect("Should have video");
        assert_eq!(video.bytes, b"video");

        // Consumed files are gone; the loser and the stray stay.
        assert!(!dir.join("a_scan.jpg").exists());
        assert!(!dir.join("exam.mp4").exists());
        assert!(dir.join("b_scan.png").exists());
        assert!(dir.join("notes.txt").exists());
    }

    #[test]
    fn test_take_staged_empty_dir() {
        let staging = DirMediaStaging::new(scratch_dir());
        assert!(staging.take_staged().expect("Should collect").is_empty());
    }

    #[test]
    fn test_publish_restored_media() {
        let dir = scratch_dir();
        let staging = DirMediaStaging::new(&dir);

        staging
            .publish(
                12,
                &Attachment {
                    kind: AttachmentKind::Image,
                    bytes: b"plaintext image".to_vec(),
                },
            )
            .expect("Should publish");

        let restored =
            std::fs::read(dir.join("restored_image_12.jpg")).expect("Should read back");
        assert_eq!(restored, b"plaintext image");
    }
}
