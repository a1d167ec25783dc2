use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::debug;
use uuid::Uuid;

use crate::validation::thumbnail_extension;

pub const WEBSITE_UPLOAD_DIR: &str = "uploads/websites";

/// Copies an accepted thumbnail under `media_root` and returns its path
/// relative to the media root, e.g. `uploads/websites/<uuid>.png`.
pub fn store_thumbnail(media_root: &Path, original_name: &str, source: &Path) -> io::Result<String> {
    let ext = thumbnail_extension(original_name).ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "unsupported thumbnail extension")
    })?;

    let dir = media_root.join(WEBSITE_UPLOAD_DIR);
    fs::create_dir_all(&dir)?;

    let name = format!("{}.{}", Uuid::new_v4(), ext);
    let destination: PathBuf = dir.join(&name);
    fs::copy(source, &destination)?;
    debug!("[MEDIA] Stored {} as {}", original_name, destination.display());

    Ok(format!("{WEBSITE_UPLOAD_DIR}/{name}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stores_under_uploads_with_fresh_name() {
        let root = std::env::temp_dir().join(format!("finest-media-{}", Uuid::new_v4()));
        fs::create_dir_all(&root).unwrap();
        let source = root.join("incoming.bin");
        fs::write(&source, b"not really a png").unwrap();

        let stored = store_thumbnail(&root, "Screenshot.PNG", &source).unwrap();
        assert!(stored.starts_with("uploads/websites/"));
        assert!(stored.ends_with(".png"));
        assert_eq!(fs::read(root.join(&stored)).unwrap(), b"not really a png");

        assert!(store_thumbnail(&root, "anim.gif", &source).is_err());
        fs::remove_dir_all(&root).unwrap();
    }
}
