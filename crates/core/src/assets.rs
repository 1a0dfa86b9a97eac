//! Dependent song assets: music sheets, MIDI files and MP3 recordings.
//!
//! The three kinds live in separate tables but share one shape, so most
//! per-kind differences (field names, buckets, accepted formats, default
//! labels) are tabulated on [`AssetKind`].

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::forms::FieldErrors;
use crate::storage::Bucket;

/// Kind of file attached to a song.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    Sheet,
    Midi,
    Audio,
}

impl AssetKind {
    pub const ALL: [AssetKind; 3] = [AssetKind::Sheet, AssetKind::Midi, AssetKind::Audio];

    /// Path segment and form-entry prefix (`sheet`, `midi`, `audio`).
    pub fn code(self) -> &'static str {
        match self {
            Self::Sheet => "sheet",
            Self::Midi => "midi",
            Self::Audio => "audio",
        }
    }

    /// Parse a path segment.
    pub fn from_code(code: &str) -> Result<Self, CoreError> {
        match code {
            "sheet" => Ok(Self::Sheet),
            "midi" => Ok(Self::Midi),
            "audio" => Ok(Self::Audio),
            other => Err(CoreError::Validation(format!(
                "Unknown asset kind '{other}'. Must be one of: sheet, midi, audio"
            ))),
        }
    }

    /// Backing table.
    pub fn table(self) -> &'static str {
        match self {
            Self::Sheet => "music_sheets",
            Self::Midi => "midi_files",
            Self::Audio => "mp3_files",
        }
    }

    /// Entity name used in not-found errors.
    pub fn entity(self) -> &'static str {
        match self {
            Self::Sheet => "MusicSheet",
            Self::Midi => "MidiFile",
            Self::Audio => "Mp3File",
        }
    }

    /// Storage bucket for uploaded files of this kind.
    pub fn bucket(self) -> Bucket {
        match self {
            Self::Sheet => Bucket::MusicSheets,
            Self::Midi => Bucket::MidiFiles,
            Self::Audio => Bucket::Mp3Files,
        }
    }

    /// File field on the song submission form.
    pub fn file_field(self) -> &'static str {
        match self {
            Self::Sheet => "music_sheet",
            Self::Midi => "midi_file",
            Self::Audio => "mp3_file",
        }
    }

    /// Version field paired with [`Self::file_field`].
    pub fn version_field(self) -> &'static str {
        match self {
            Self::Sheet => "ms_version",
            Self::Midi => "midi_version",
            Self::Audio => "mp3_version",
        }
    }

    /// Error shown when a file arrives without its version label.
    pub fn missing_version_message(self) -> &'static str {
        match self {
            Self::Sheet => "Music sheet version is required when uploading a music sheet.",
            Self::Midi => "MIDI version is required when uploading a MIDI file.",
            Self::Audio => "MP3 version is required when uploading an MP3 file.",
        }
    }

    /// Label used by the staff quick-upload when none is supplied.
    pub fn default_version(self) -> &'static str {
        match self {
            Self::Sheet => "Standard Folio",
            Self::Midi => "Synthesized Logic",
            Self::Audio => "Master Recording",
        }
    }

    /// Notice returned after a staff quick-upload.
    pub fn attached_message(self) -> &'static str {
        match self {
            Self::Sheet => "Folio manuscript added.",
            Self::Midi => "Midi sequence added.",
            Self::Audio => "Audio asset synced.",
        }
    }

    /// Lowercase file extensions accepted for this kind.
    pub fn allowed_extensions(self) -> &'static [&'static str] {
        match self {
            Self::Sheet => &["pdf", "png", "jpg", "jpeg"],
            Self::Midi => &["mid", "midi"],
            Self::Audio => &["mp3"],
        }
    }
}

impl TryFrom<String> for AssetKind {
    type Error = CoreError;

    fn try_from(code: String) -> Result<Self, Self::Error> {
        Self::from_code(&code)
    }
}

impl std::fmt::Display for AssetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// A file received from a client, fully buffered.
#[derive(Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// Client-supplied file name (untrusted).
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for UploadedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadedFile")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl UploadedFile {
    /// Lowercased extension of the client file name, if any.
    pub fn extension(&self) -> Option<String> {
        std::path::Path::new(&self.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
    }

    /// Content type to record: the extension's canonical type, else the
    /// client's claim, else `application/octet-stream`.
    pub fn resolved_content_type(&self) -> String {
        self.extension()
            .and_then(|ext| content_type_for_extension(&ext))
            .map(str::to_string)
            .or_else(|| self.content_type.clone())
            .unwrap_or_else(|| "application/octet-stream".to_string())
    }

    pub fn size_bytes(&self) -> i64 {
        self.bytes.len() as i64
    }
}

/// Canonical MIME type for the extensions this service accepts.
pub fn content_type_for_extension(ext: &str) -> Option<&'static str> {
    match ext {
        "pdf" => Some("application/pdf"),
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "mid" | "midi" => Some("audio/midi"),
        "mp3" => Some("audio/mpeg"),
        _ => None,
    }
}

/// Check that `file` is non-empty and has an extension accepted for `kind`.
///
/// Errors are recorded against `field`.
pub fn check_upload(kind: AssetKind, file: &UploadedFile, field: &str, errors: &mut FieldErrors) {
    if file.bytes.is_empty() {
        errors.add(field, "The submitted file is empty.");
        return;
    }
    let allowed = kind.allowed_extensions();
    match file.extension() {
        Some(ext) if allowed.contains(&ext.as_str()) => {}
        _ => errors.add(
            field,
            format!(
                "Unsupported file type for '{}'. Allowed: {}",
                file.file_name,
                allowed
                    .iter()
                    .map(|e| format!(".{e}"))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        ),
    }
}

/// Longest accepted version label, in characters.
pub const MAX_VERSION_LEN: usize = 256;

/// Check a version label that accompanies an uploaded file: it must be
/// present and fit [`MAX_VERSION_LEN`].
pub fn check_version(kind: AssetKind, version: &str, field: &str, errors: &mut FieldErrors) {
    if version.is_empty() {
        errors.add(field, kind.missing_version_message());
    } else {
        check_version_length(version, field, errors);
    }
}

/// Length-only check for a version label.
pub fn check_version_length(version: &str, field: &str, errors: &mut FieldErrors) {
    if version.chars().count() > MAX_VERSION_LEN {
        errors.add(
            field,
            format!("Ensure this value has at most {MAX_VERSION_LEN} characters."),
        );
    }
}
