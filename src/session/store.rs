//! Session output directories and the processing hand-off.
//!
//! Layout under the store root:
//!
//! ```text
//! sessions/{session_id}/frame_000000_{millis}.jpg
//! sessions/{session_id}/audio_{epoch}.wav
//! processed/{session_id}/...            copies made by trigger_processing
//! processed/{session_id}/manifest.json
//! .capture.lock                         held while a session is capturing
//! ```
//!
//! The filesystem is authoritative; the per-session file list kept here is a
//! cache refreshed from directory listings. The capture lease is the lock
//! file, so every store opened on the same root sees it.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use parking_lot::Mutex;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{CaptureError, CaptureResult};
use crate::validation;
use crate::video::FrameFormat;

const SESSIONS_DIR: &str = "sessions";
const PROCESSED_DIR: &str = "processed";
pub const MANIFEST_FILE: &str = "manifest.json";
const LOCK_FILE: &str = ".capture.lock";

/// Metadata for one file in a session directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub filename: String,
    pub size: u64,
    pub declared_type: String,
    /// RFC 3339, UTC
    pub recorded_at: String,
}

/// A saved frame, derived from its file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameRecord {
    pub index: u64,
    pub timestamp_ms: i64,
    pub size: u64,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    NoFiles,
    Processed,
    Error,
}

/// Outcome of [`SessionFileStore::trigger_processing`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingReport {
    pub session_id: String,
    pub status: ProcessingStatus,
    pub processed_file_count: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest: Option<PathBuf>,
}

impl ProcessingReport {
    fn failed(session_id: &str, detail: String) -> Self {
        warn!("Processing {} failed: {}", session_id, detail);
        Self {
            session_id: session_id.to_string(),
            status: ProcessingStatus::Error,
            processed_file_count: 0,
            failures: vec![detail],
            manifest: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub original: PathBuf,
    pub processed_path: PathBuf,
    pub processed_at: String,
    pub size: u64,
    pub blake3: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub session_id: String,
    pub created_at: String,
    pub entries: Vec<ManifestEntry>,
}

/// Contents of the lock file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct LockOwner {
    session_id: String,
    pid: u32,
}

/// Exclusive right to capture into an output root. Released on drop.
#[derive(Debug)]
pub struct CaptureLease {
    path: PathBuf,
    owner: LockOwner,
}

impl CaptureLease {
    pub fn session_id(&self) -> &str {
        &self.owner.session_id
    }
}

impl Drop for CaptureLease {
    fn drop(&mut self) {
        // Only remove the lock if it is still ours
        if read_lock(&self.path).as_ref() == Some(&self.owner) {
            if let Err(e) = fs::remove_file(&self.path) {
                warn!("Could not release capture lock {}: {}", self.path.display(), e);
            }
        }
    }
}

/// Owns the output root for all sessions of one agent.
#[derive(Debug)]
pub struct SessionFileStore {
    root: PathBuf,
    files: Mutex<HashMap<String, Vec<FileRecord>>>,
}

impl SessionFileStore {
    pub fn new(root: impl Into<PathBuf>) -> CaptureResult<Self> {
        let root = root.into();
        for dir in [root.join(SESSIONS_DIR), root.join(PROCESSED_DIR)] {
            fs::create_dir_all(&dir).map_err(|e| CaptureError::io(&dir, e))?;
        }
        debug!("Session store at {}", root.display());
        Ok(Self {
            root,
            files: Mutex::new(HashMap::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn session_dir(&self, session_id: &str) -> PathBuf {
        self.root.join(SESSIONS_DIR).join(session_id)
    }

    pub fn processed_dir(&self, session_id: &str) -> PathBuf {
        self.root.join(PROCESSED_DIR).join(session_id)
    }

    /// Create the raw directory for a new session.
    pub fn create_session(&self, session_id: &str) -> CaptureResult<PathBuf> {
        check_id(session_id)?;
        let dir = self.session_dir(session_id);
        fs::create_dir_all(&dir).map_err(|e| CaptureError::io(&dir, e))?;
        self.files.lock().entry(session_id.to_string()).or_default();
        info!("Created session directory {}", dir.display());
        Ok(dir)
    }

    /// Claim the output root for one capturing session.
    ///
    /// A lock left behind by a process that no longer runs is taken over.
    pub fn acquire_capture(&self, session_id: &str) -> CaptureResult<CaptureLease> {
        let path = self.root.join(LOCK_FILE);
        let owner = LockOwner {
            session_id: session_id.to_string(),
            pid: std::process::id(),
        };

        for _ in 0..2 {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    let json = serde_json::to_vec(&owner)
                        .map_err(|e| CaptureError::io(&path, io::Error::new(io::ErrorKind::InvalidData, e)))?;
                    if let Err(e) = file.write_all(&json) {
                        let _ = fs::remove_file(&path);
                        return Err(CaptureError::io(&path, e));
                    }
                    debug!("Capture lock taken by {}", session_id);
                    return Ok(CaptureLease { path, owner });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => match read_lock(&path) {
                    Some(current) if process_alive(current.pid) => {
                        return Err(CaptureError::OutputBusy(current.session_id));
                    }
                    stale => {
                        warn!("Removing stale capture lock {:?}", stale.map(|o| o.session_id));
                        let _ = fs::remove_file(&path);
                    }
                },
                Err(e) => return Err(CaptureError::io(&path, e)),
            }
        }
        Err(CaptureError::OutputBusy(format!("{} (lock contended)", path.display())))
    }

    /// Session currently holding the capture lease.
    pub fn active_capture(&self) -> Option<String> {
        read_lock(&self.root.join(LOCK_FILE)).map(|owner| owner.session_id)
    }

    /// Add a file to the session's metadata cache.
    pub fn record_file(&self, session_id: &str, record: FileRecord) {
        let mut files = self.files.lock();
        let list = files.entry(session_id.to_string()).or_default();
        list.retain(|r| r.filename != record.filename);
        list.push(record);
    }

    /// Cached metadata for a session, in insertion order.
    pub fn files(&self, session_id: &str) -> Vec<FileRecord> {
        self.files.lock().get(session_id).cloned().unwrap_or_default()
    }

    /// Rebuild the cache for a session from its directory listing.
    pub fn index_session_files(&self, session_id: &str) -> CaptureResult<Vec<FileRecord>> {
        check_id(session_id)?;
        let records: Vec<FileRecord> = list_files(&self.session_dir(session_id))?
            .into_iter()
            .filter_map(|path| {
                let meta = fs::metadata(&path).ok()?;
                let filename = path.file_name()?.to_str()?.to_string();
                let recorded_at = meta
                    .modified()
                    .map(|t| chrono::DateTime::<chrono::Utc>::from(t).to_rfc3339())
                    .unwrap_or_else(|_| now_rfc3339());
                Some(FileRecord {
                    declared_type: declared_type_for(&filename).to_string(),
                    filename,
                    size: meta.len(),
                    recorded_at,
                })
            })
            .collect();

        self.files
            .lock()
            .insert(session_id.to_string(), records.clone());
        Ok(records)
    }

    /// Store an externally supplied file in a session directory.
    pub fn store_upload(
        &self,
        session_id: &str,
        filename: &str,
        bytes: &[u8],
        declared_type: &str,
    ) -> CaptureResult<FileRecord> {
        check_id(session_id)?;
        validation::validate_file_name(filename)
            .map_err(|e| CaptureError::InvalidFileName(format!("{}: {}", filename, e)))?;

        let dir = self.create_session(session_id)?;
        let path = dir.join(filename);
        fs::write(&path, bytes).map_err(|e| CaptureError::io(&path, e))?;

        let record = FileRecord {
            filename: filename.to_string(),
            size: bytes.len() as u64,
            declared_type: declared_type.to_string(),
            recorded_at: now_rfc3339(),
        };
        self.record_file(session_id, record.clone());
        info!("Stored upload {} ({} bytes) in {}", filename, bytes.len(), session_id);
        Ok(record)
    }

    /// Saved frames of a session, ordered by index.
    pub fn frame_records(&self, session_id: &str) -> CaptureResult<Vec<FrameRecord>> {
        check_id(session_id)?;
        let mut frames: Vec<FrameRecord> = list_files(&self.session_dir(session_id))?
            .into_iter()
            .filter_map(|path| {
                let name = path.file_name()?.to_str()?;
                let caps = frame_name_pattern()?.captures(name)?;
                let index = caps[1].parse().ok()?;
                let timestamp_ms = caps[2].parse().ok()?;
                let size = fs::metadata(&path).ok()?.len();
                Some(FrameRecord {
                    index,
                    timestamp_ms,
                    size,
                    path,
                })
            })
            .collect();
        frames.sort_by_key(|f| f.index);
        Ok(frames)
    }

    /// Copy a finished session into its processed directory and write the
    /// manifest. Never fails; problems are reported in the result.
    pub fn trigger_processing(&self, session_id: &str) -> ProcessingReport {
        if let Err(e) = check_id(session_id) {
            return ProcessingReport::failed(session_id, e.to_string());
        }
        if self.active_capture().as_deref() == Some(session_id) {
            return ProcessingReport::failed(session_id, "session is still capturing".to_string());
        }

        let source = self.session_dir(session_id);
        if !source.is_dir() {
            return ProcessingReport::failed(
                session_id,
                format!("session directory {} does not exist", source.display()),
            );
        }

        let files = match list_files(&source) {
            Ok(files) => files,
            Err(e) => return ProcessingReport::failed(session_id, e.to_string()),
        };
        if files.is_empty() {
            info!("Session {} has no files to process", session_id);
            return ProcessingReport {
                session_id: session_id.to_string(),
                status: ProcessingStatus::NoFiles,
                processed_file_count: 0,
                failures: Vec::new(),
                manifest: None,
            };
        }

        let target = self.processed_dir(session_id);
        if let Err(e) = fs::create_dir_all(&target) {
            return ProcessingReport::failed(session_id, CaptureError::io(&target, e).to_string());
        }

        let mut entries = Vec::with_capacity(files.len());
        let mut failures = Vec::new();
        for original in files {
            match copy_with_digest(&original, &target) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    warn!("Could not process {}: {}", original.display(), e);
                    failures.push(e.to_string());
                }
            }
        }

        let manifest_path = target.join(MANIFEST_FILE);
        let manifest = Manifest {
            session_id: session_id.to_string(),
            created_at: now_rfc3339(),
            entries,
        };
        let manifest_written = match write_manifest(&manifest, &manifest_path) {
            Ok(()) => true,
            Err(e) => {
                failures.push(e.to_string());
                false
            }
        };

        if let Err(e) = self.index_session_files(session_id) {
            debug!("Could not refresh file cache for {}: {}", session_id, e);
        }

        let status = if failures.is_empty() {
            ProcessingStatus::Processed
        } else {
            ProcessingStatus::Error
        };
        info!(
            "Processed session {}: {} files, {} failures",
            session_id,
            manifest.entries.len(),
            failures.len()
        );
        ProcessingReport {
            session_id: session_id.to_string(),
            status,
            processed_file_count: manifest.entries.len(),
            failures,
            manifest: manifest_written.then_some(manifest_path),
        }
    }
}

/// Read a manifest written by [`SessionFileStore::trigger_processing`].
pub fn read_manifest(path: &Path) -> CaptureResult<Manifest> {
    let json = fs::read_to_string(path).map_err(|e| CaptureError::io(path, e))?;
    serde_json::from_str(&json)
        .map_err(|e| CaptureError::io(path, io::Error::new(io::ErrorKind::InvalidData, e)))
}

fn write_manifest(manifest: &Manifest, path: &Path) -> CaptureResult<()> {
    let json = serde_json::to_string_pretty(manifest)
        .map_err(|e| CaptureError::io(path, io::Error::new(io::ErrorKind::InvalidData, e)))?;
    fs::write(path, json).map_err(|e| CaptureError::io(path, e))
}

fn copy_with_digest(original: &Path, target_dir: &Path) -> CaptureResult<ManifestEntry> {
    let name = original
        .file_name()
        .ok_or_else(|| CaptureError::InvalidFileName(original.display().to_string()))?;
    let processed_path = target_dir.join(name);
    let size = fs::copy(original, &processed_path).map_err(|e| CaptureError::io(original, e))?;

    let mut hasher = blake3::Hasher::new();
    let mut file = File::open(&processed_path).map_err(|e| CaptureError::io(&processed_path, e))?;
    io::copy(&mut file, &mut hasher).map_err(|e| CaptureError::io(&processed_path, e))?;

    Ok(ManifestEntry {
        original: original.to_path_buf(),
        processed_path,
        processed_at: now_rfc3339(),
        size,
        blake3: hasher.finalize().to_hex().to_string(),
    })
}

/// Regular files directly inside `dir`, sorted by name.
fn list_files(dir: &Path) -> CaptureResult<Vec<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(CaptureError::io(dir, e)),
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|entry| entry.path())
        .collect();
    files.sort();
    Ok(files)
}

fn read_lock(path: &Path) -> Option<LockOwner> {
    let bytes = fs::read(path).ok()?;
    serde_json::from_slice(&bytes).ok()
}

fn process_alive(pid: u32) -> bool {
    if pid == std::process::id() {
        return true;
    }
    let mut system = sysinfo::System::new();
    system.refresh_process(sysinfo::Pid::from_u32(pid))
}

fn check_id(session_id: &str) -> CaptureResult<()> {
    validation::validate_file_name(session_id)
        .map_err(|e| CaptureError::InvalidFileName(format!("session id {:?}: {}", session_id, e)))
}

fn declared_type_for(filename: &str) -> &'static str {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    if let Some(format) = FrameFormat::from_extension(ext) {
        return format.mime_type();
    }
    match ext.to_ascii_lowercase().as_str() {
        "wav" => "audio/wav",
        "json" => "application/json",
        _ => "application/octet-stream",
    }
}

fn frame_name_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^frame_(\d{6,})_(\d+)\.[A-Za-z0-9]+$").ok())
        .as_ref()
}

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}
