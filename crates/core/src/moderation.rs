//! Staff full-edit form: core fields, status, and per-kind repeatable asset
//! entries turned into add/replace/remove commands.
//!
//! Entry fields are named `{kind}-{index}-{field}` with `kind` one of
//! `sheet`, `midi`, `audio` and `field` one of `id`, `file`, `version`,
//! `DELETE`. Any other key with that prefix (for example
//! `sheet-TOTAL_FORMS`) is ignored.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::assets::{
    check_upload, check_version, check_version_length, AssetKind, UploadedFile,
};
use crate::catalog::SongStatus;
use crate::forms::{clean_text, parse_checkbox, FieldErrors};
use crate::submission::{clean_song_fields, clean_status, SongFields, SongFieldsInput};
use crate::types::DbId;

pub const INVALID_ASSET_ID: &str = "Select a valid choice. That choice is not one of the available choices.";
pub const FILE_REQUIRED_FOR_VERSION: &str = "A file is required when a version is given.";
pub const DUPLICATE_ASSET_ENTRY: &str = "This asset appears in more than one entry.";

/// Which part of an asset entry a form key addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryField {
    Id,
    File,
    Version,
    Delete,
}

/// Split `sheet-3-version` into `(Sheet, 3, Version)`.
pub fn parse_entry_key(name: &str) -> Option<(AssetKind, usize, EntryField)> {
    let mut parts = name.splitn(3, '-');
    let kind = AssetKind::from_code(parts.next()?).ok()?;
    let index = parts.next()?.parse().ok()?;
    let field = match parts.next()? {
        "id" => EntryField::Id,
        "file" => EntryField::File,
        "version" => EntryField::Version,
        "DELETE" => EntryField::Delete,
        _ => return None,
    };
    Some((kind, index, field))
}

/// One repeatable asset entry as submitted.
#[derive(Debug, Clone, Default)]
pub struct AssetEntryInput {
    pub id: Option<String>,
    pub file: Option<UploadedFile>,
    pub version: Option<String>,
    pub delete: Option<String>,
}

/// Untrusted staff edit submission.
#[derive(Debug, Clone, Default)]
pub struct ModerationInput {
    pub fields: SongFieldsInput,
    pub status: Option<String>,
    pub entries: BTreeMap<(AssetKind, usize), AssetEntryInput>,
}

impl ModerationInput {
    /// Store a text value. Returns `false` when the key is not part of the form.
    pub fn set_text(&mut self, name: &str, value: String) -> bool {
        if name == "status" {
            self.status = Some(value);
            return true;
        }
        if self.fields.set_field(name, value.clone()) {
            return true;
        }
        match parse_entry_key(name) {
            Some((kind, index, field)) => {
                let entry = self.entries.entry((kind, index)).or_default();
                match field {
                    EntryField::Id => entry.id = Some(value),
                    EntryField::Version => entry.version = Some(value),
                    EntryField::Delete => entry.delete = Some(value),
                    // A text part under a file key means no file was chosen.
                    EntryField::File => {}
                }
                true
            }
            None => false,
        }
    }

    /// Store an uploaded file. Returns `false` when the key is not a file entry.
    pub fn set_file(&mut self, name: &str, file: UploadedFile) -> bool {
        match parse_entry_key(name) {
            Some((kind, index, EntryField::File)) => {
                self.entries.entry((kind, index)).or_default().file = Some(file);
                true
            }
            _ => false,
        }
    }
}

/// One change to a song's dependent assets.
#[derive(Debug, Clone)]
pub enum AssetCommand {
    Add {
        kind: AssetKind,
        file: UploadedFile,
        version: String,
    },
    /// Update the version label, and swap the file when one is given.
    Replace {
        kind: AssetKind,
        id: DbId,
        file: Option<UploadedFile>,
        version: String,
    },
    Remove {
        kind: AssetKind,
        id: DbId,
    },
}

impl AssetCommand {
    pub fn kind(&self) -> AssetKind {
        match self {
            Self::Add { kind, .. } | Self::Replace { kind, .. } | Self::Remove { kind, .. } => *kind,
        }
    }
}

/// Ids of the assets currently attached to the song, per kind.
pub type ExistingAssets = HashMap<AssetKind, Vec<DbId>>;

/// A staff edit that passed validation.
#[derive(Debug, Clone)]
pub struct CleanModeration {
    pub fields: SongFields,
    pub status: SongStatus,
    pub commands: Vec<AssetCommand>,
}

/// Turn the entries of one kind into commands.
///
/// Errors are keyed by the entry's own form field (`midi-1-version`).
pub fn plan_asset_commands(
    kind: AssetKind,
    entries: &BTreeMap<usize, &AssetEntryInput>,
    existing_ids: &[DbId],
) -> Result<Vec<AssetCommand>, FieldErrors> {
    let mut errors = FieldErrors::new();
    let mut commands = Vec::new();
    let mut seen = HashSet::new();

    for (index, entry) in entries {
        let prefix = format!("{}-{index}", kind.code());
        let version = clean_text(entry.version.as_deref());
        let delete = parse_checkbox(entry.delete.as_deref());
        let raw_id = clean_text(entry.id.as_deref());

        if raw_id.is_empty() {
            match (&entry.file, version.is_empty()) {
                _ if delete => {}
                (None, true) => {}
                (None, false) => errors.add(format!("{prefix}-file"), FILE_REQUIRED_FOR_VERSION),
                (Some(file), _) => {
                    check_upload(kind, file, &format!("{prefix}-file"), &mut errors);
                    check_version(kind, &version, &format!("{prefix}-version"), &mut errors);
                    commands.push(AssetCommand::Add {
                        kind,
                        file: file.clone(),
                        version,
                    });
                }
            }
            continue;
        }

        let id = match raw_id.parse::<DbId>() {
            Ok(id) if existing_ids.contains(&id) => id,
            _ => {
                errors.add(format!("{prefix}-id"), INVALID_ASSET_ID);
                continue;
            }
        };
        if !seen.insert(id) {
            errors.add(format!("{prefix}-id"), DUPLICATE_ASSET_ENTRY);
            continue;
        }

        if delete {
            commands.push(AssetCommand::Remove { kind, id });
            continue;
        }
        // A kept asset always keeps a label, with or without a new file.
        let version_field = format!("{prefix}-version");
        match &entry.file {
            Some(file) => {
                check_upload(kind, file, &format!("{prefix}-file"), &mut errors);
                check_version(kind, &version, &version_field, &mut errors);
            }
            None if version.is_empty() => errors.required(version_field),
            None => check_version_length(&version, &version_field, &mut errors),
        }
        commands.push(AssetCommand::Replace {
            kind,
            id,
            file: entry.file.clone(),
            version,
        });
    }

    errors.into_result(commands)
}

/// Validate a staff edit. Core fields and all three entry sets are checked
/// together so every error is reported at once.
pub fn validate_moderation(
    input: &ModerationInput,
    current_status: SongStatus,
    existing: &ExistingAssets,
) -> Result<CleanModeration, FieldErrors> {
    let mut errors = FieldErrors::new();

    let fields = clean_song_fields(&input.fields).map_err(|e| errors.merge(e)).ok();
    let status = clean_status(input.status.as_deref(), current_status, &mut errors);

    let mut commands = Vec::new();
    for kind in AssetKind::ALL {
        let entries: BTreeMap<usize, &AssetEntryInput> = input
            .entries
            .iter()
            .filter(|((k, _), _)| *k == kind)
            .map(|((_, index), entry)| (*index, entry))
            .collect();
        let ids = existing.get(&kind).map(Vec::as_slice).unwrap_or(&[]);
        match plan_asset_commands(kind, &entries, ids) {
            Ok(mut planned) => commands.append(&mut planned),
            Err(e) => errors.merge(e),
        }
    }

    match fields {
        Some(fields) if errors.is_empty() => Ok(CleanModeration {
            fields,
            status,
            commands,
        }),
        _ => Err(errors),
    }
}

/// Notice after a successful staff edit.
pub fn edited_message(title: &str) -> String {
    format!("Manuscript '{title}' updated successfully.")
}

/// Notice after a staff song delete.
pub fn purged_message(title: &str) -> String {
    format!("Manuscript '{title}' has been permanently purged from the registry.")
}

pub const ASSET_REMOVED_MESSAGE: &str = "Asset removed from manuscript.";
