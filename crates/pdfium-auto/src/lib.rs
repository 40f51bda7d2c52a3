//! # pdfium-auto
//!
//! Find a usable [PDFium](https://pdfium.googlesource.com/pdfium/) shared
//! library at runtime and bind `pdfium-render` to it, downloading a prebuilt
//! copy on first use when nothing is installed.
//!
//! ## Lookup order
//!
//! 1. `PDFIUM_LIB_PATH`: explicit path to `libpdfium.{so,dylib}` / `pdfium.dll`.
//! 2. The system library search path (`Pdfium::bind_to_system_library`).
//! 3. The per-user cache, `~/.cache/pdf-anonymizer/pdfium-{VERSION}/`
//!    (override the base with `PDFIUM_AUTO_CACHE_DIR`).
//! 4. A download of the platform archive from
//!    [bblanchon/pdfium-binaries](https://github.com/bblanchon/pdfium-binaries),
//!    unpacked into the cache. Skipped under [`FetchPolicy::Offline`].
//!
//! The bound instance is shared process-wide: [`shared`] binds once and hands
//! out clones of the same `Arc<Pdfium>`.
//!
//! ```rust,no_run
//! use pdfium_auto::{shared, FetchPolicy};
//!
//! let pdfium = shared(FetchPolicy::Download).expect("PDFium unavailable");
//! let doc = pdfium.load_pdf_from_file("input.pdf", None).unwrap();
//! println!("{} pages", doc.pages().len());
//! ```

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use pdfium_render::prelude::Pdfium;
use thiserror::Error;
use tracing::{debug, info, warn};

/// The pdfium-binaries release tag fetched on download.
pub const PDFIUM_VERSION: &str = "7690";

const RELEASE_URL: &str = "https://github.com/bblanchon/pdfium-binaries/releases/download";

/// Errors returned while locating or binding PDFium.
#[derive(Error, Debug)]
pub enum PdfiumAutoError {
    /// No prebuilt archive exists for this OS/architecture.
    #[error("Unsupported platform: {os}/{arch}")]
    UnsupportedPlatform { os: String, arch: String },

    /// The library is not installed and downloading was not allowed.
    #[error("PDFium library not found (set PDFIUM_LIB_PATH or allow the download)")]
    NotInstalled,

    /// Could not create the cache directory or write the library into it.
    #[error("Cache directory error at '{path}': {source}")]
    Cache {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Network download failed.
    #[error("Download failed: {0}")]
    Download(String),

    /// gzip/tar extraction failed.
    #[error("Archive extraction failed: {0}")]
    Extract(String),

    /// `pdfium-render` could not load the library.
    #[error("Failed to bind PDFium from '{path}': {reason}")]
    Bind { path: PathBuf, reason: String },
}

/// Whether [`shared`] may reach the network to obtain the library.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPolicy {
    /// Download into the cache when no library is found.
    Download,
    /// Only use libraries already present on disk.
    Offline,
}

/// Archive layout of one pdfium-binaries release asset.
#[derive(Debug, Clone, Copy)]
struct Asset {
    os: &'static str,
    arch: &'static str,
    archive: &'static str,
    member: &'static str,
    file_name: &'static str,
}

const ASSETS: &[Asset] = &[
    Asset { os: "linux", arch: "x86_64", archive: "pdfium-linux-x64.tgz", member: "lib/libpdfium.so", file_name: "libpdfium.so" },
    Asset { os: "linux", arch: "aarch64", archive: "pdfium-linux-arm64.tgz", member: "lib/libpdfium.so", file_name: "libpdfium.so" },
    Asset { os: "macos", arch: "aarch64", archive: "pdfium-mac-arm64.tgz", member: "lib/libpdfium.dylib", file_name: "libpdfium.dylib" },
    Asset { os: "macos", arch: "x86_64", archive: "pdfium-mac-x64.tgz", member: "lib/libpdfium.dylib", file_name: "libpdfium.dylib" },
    Asset { os: "windows", arch: "x86_64", archive: "pdfium-win-x64.tgz", member: "bin/pdfium.dll", file_name: "pdfium.dll" },
    Asset { os: "windows", arch: "aarch64", archive: "pdfium-win-arm64.tgz", member: "bin/pdfium.dll", file_name: "pdfium.dll" },
];

fn current_asset() -> Result<&'static Asset, PdfiumAutoError> {
    let (os, arch) = (std::env::consts::OS, std::env::consts::ARCH);
    ASSETS
        .iter()
        .find(|a| a.os == os && a.arch == arch)
        .ok_or_else(|| PdfiumAutoError::UnsupportedPlatform {
            os: os.to_string(),
            arch: arch.to_string(),
        })
}

/// Directory holding the cached library for [`PDFIUM_VERSION`].
pub fn cache_dir() -> PathBuf {
    let base = std::env::var_os("PDFIUM_AUTO_CACHE_DIR")
        .map(PathBuf::from)
        .or_else(|| dirs::cache_dir().map(|d| d.join("pdf-anonymizer")))
        .unwrap_or_else(|| std::env::temp_dir().join("pdf-anonymizer"));
    base.join(format!("pdfium-{PDFIUM_VERSION}"))
}

/// Path of an already-present library, if any. Never touches the network.
pub fn installed_library() -> Option<PathBuf> {
    if let Some(p) = std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from) {
        if p.exists() {
            return Some(p);
        }
    }
    let asset = current_asset().ok()?;
    let cached = cache_dir().join(asset.file_name);
    cached.exists().then_some(cached)
}

static SHARED: OnceLock<Arc<Pdfium>> = OnceLock::new();
// Dropping a `Pdfium` tears down the library for every instance, so only one
// may ever be created.
static BIND_LOCK: Mutex<()> = Mutex::new(());

/// Bind PDFium once per process and return the shared instance.
///
/// A failed attempt is not cached, so a later call may retry (for example
/// after the library was installed).
pub fn shared(policy: FetchPolicy) -> Result<Arc<Pdfium>, PdfiumAutoError> {
    if let Some(p) = SHARED.get() {
        return Ok(Arc::clone(p));
    }
    let _guard = BIND_LOCK.lock().unwrap_or_else(|p| p.into_inner());
    if let Some(p) = SHARED.get() {
        return Ok(Arc::clone(p));
    }
    let pdfium = Arc::new(bind(policy)?);
    Ok(Arc::clone(SHARED.get_or_init(|| pdfium)))
}

/// Bind a PDFium instance following the lookup order in the crate docs.
fn bind(policy: FetchPolicy) -> Result<Pdfium, PdfiumAutoError> {
    if let Some(p) = std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from) {
        if p.exists() {
            return bind_from_path(&p);
        }
        warn!("PDFIUM_LIB_PATH '{}' does not exist; ignoring", p.display());
    }

    match Pdfium::bind_to_system_library() {
        Ok(bindings) => {
            debug!("Bound PDFium from the system library path");
            return Ok(Pdfium::new(bindings));
        }
        Err(e) => debug!("No system PDFium: {e}"),
    }

    let asset = current_asset()?;
    let lib_path = cache_dir().join(asset.file_name);
    if !lib_path.exists() {
        if policy == FetchPolicy::Offline {
            return Err(PdfiumAutoError::NotInstalled);
        }
        fetch_into(asset, &lib_path)?;
    }
    bind_from_path(&lib_path)
}

fn bind_from_path(path: &Path) -> Result<Pdfium, PdfiumAutoError> {
    Pdfium::bind_to_library(path)
        .map(Pdfium::new)
        .map_err(|e| PdfiumAutoError::Bind {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

fn fetch_into(asset: &Asset, lib_path: &Path) -> Result<(), PdfiumAutoError> {
    let dir = lib_path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).map_err(|source| PdfiumAutoError::Cache {
        path: dir.to_path_buf(),
        source,
    })?;

    let url = format!("{RELEASE_URL}/chromium%2F{PDFIUM_VERSION}/{}", asset.archive);
    info!("Downloading PDFium {} from {}", PDFIUM_VERSION, url);
    let archive = download(&url)?;
    info!("Downloaded {} bytes; unpacking {}", archive.len(), asset.member);

    // Unpack next to the target and rename so a crash never leaves a
    // truncated library at the final path.
    let partial = lib_path.with_extension("part");
    unpack_member(&archive, asset.member, &partial)?;
    std::fs::rename(&partial, lib_path).map_err(|source| PdfiumAutoError::Cache {
        path: lib_path.to_path_buf(),
        source,
    })
}

fn download(url: &str) -> Result<Vec<u8>, PdfiumAutoError> {
    let client = reqwest::blocking::Client::builder()
        .user_agent(concat!("pdfium-auto/", env!("CARGO_PKG_VERSION")))
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
        .map_err(|e| PdfiumAutoError::Download(e.to_string()))?;

    let response = client
        .get(url)
        .send()
        .map_err(|e| PdfiumAutoError::Download(format!("GET {url}: {e}")))?;
    if !response.status().is_success() {
        return Err(PdfiumAutoError::Download(format!(
            "HTTP {} for {url}",
            response.status()
        )));
    }
    response
        .bytes()
        .map(|b| b.to_vec())
        .map_err(|e| PdfiumAutoError::Download(format!("reading body: {e}")))
}

/// Copy one member of a `.tgz` archive to `dest`.
fn unpack_member(archive: &[u8], member: &str, dest: &Path) -> Result<(), PdfiumAutoError> {
    let mut tar = tar::Archive::new(flate2::read::GzDecoder::new(archive));
    let entries = tar
        .entries()
        .map_err(|e| PdfiumAutoError::Extract(e.to_string()))?;

    for entry in entries {
        let mut entry = entry.map_err(|e| PdfiumAutoError::Extract(e.to_string()))?;
        let is_member = entry
            .path()
            .map(|p| p.to_string_lossy() == member)
            .unwrap_or(false);
        if is_member {
            entry
                .unpack(dest)
                .map_err(|e| PdfiumAutoError::Extract(format!("unpack {member}: {e}")))?;
            return Ok(());
        }
    }

    Err(PdfiumAutoError::Extract(format!(
        "'{member}' not present in archive"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn tgz_with(member: &str, contents: &[u8]) -> Vec<u8> {
        let gz = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::fast());
        let mut builder = tar::Builder::new(gz);
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, member, contents).unwrap();
        let mut gz = builder.into_inner().unwrap();
        gz.flush().unwrap();
        gz.finish().unwrap()
    }

    #[test]
    fn cache_dir_contains_version() {
        let d = cache_dir();
        assert!(d.to_string_lossy().contains(PDFIUM_VERSION));
        assert_eq!(d, cache_dir());
    }

    #[test]
    fn asset_table_is_consistent() {
        for a in ASSETS {
            assert!(a.archive.ends_with(".tgz"));
            assert!(a.member.ends_with(a.file_name), "{a:?}");
        }
    }

    #[test]
    fn unpack_member_extracts_named_entry() {
        let archive = tgz_with("lib/libpdfium.so", b"not really a library");
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("libpdfium.so");

        unpack_member(&archive, "lib/libpdfium.so", &dest).unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"not really a library");
    }

    #[test]
    fn unpack_member_reports_missing_entry() {
        let archive = tgz_with("lib/other.so", b"x");
        let dir = tempfile::tempdir().unwrap();
        let err = unpack_member(&archive, "lib/libpdfium.so", &dir.path().join("out")).unwrap_err();
        assert!(matches!(err, PdfiumAutoError::Extract(_)), "got {err:?}");
    }
}
