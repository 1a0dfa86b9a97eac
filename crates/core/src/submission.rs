//! Song submission form: core-field cleaning plus the three optional
//! (file, version) pairs.
//!
//! Validation collects every field error before failing so clients can show
//! them all at once.

use serde::Deserialize;
use validator::Validate;

use crate::assets::{check_upload, check_version, AssetKind, UploadedFile};
use crate::catalog::{MassPart, Season, SongStatus};
use crate::forms::{clean_text, parse_checkbox, FieldErrors};

pub const MTN_NUMBER_REQUIRED: &str = "MTN number is required when MTN is selected.";

/// Untrusted core song fields as they arrive from a form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SongFieldsInput {
    pub title: Option<String>,
    pub composer: Option<String>,
    pub arranged_by: Option<String>,
    pub part_of_mass: Option<String>,
    pub season: Option<String>,
    /// Checkbox value (`on`, `true`, ...). Absent means unchecked.
    pub mtn: Option<String>,
    pub mtn_number: Option<String>,
    pub youtube_link: Option<String>,
}

impl SongFieldsInput {
    /// Store a text form value by field name. Returns `false` for names that
    /// are not core song fields.
    pub fn set_field(&mut self, name: &str, value: String) -> bool {
        let slot = match name {
            "title" => &mut self.title,
            "composer" => &mut self.composer,
            "arranged_by" => &mut self.arranged_by,
            "part_of_mass" => &mut self.part_of_mass,
            "season" => &mut self.season,
            "mtn" => &mut self.mtn,
            "mtn_number" => &mut self.mtn_number,
            "youtube_link" => &mut self.youtube_link,
            _ => return false,
        };
        *slot = Some(value);
        true
    }
}

/// Cleaned core song fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SongFields {
    pub title: String,
    pub composer: String,
    pub arranged_by: String,
    pub part_of_mass: MassPart,
    pub season: Season,
    pub mtn: bool,
    pub mtn_number: String,
    pub youtube_link: String,
}

#[derive(Validate)]
struct TextLimits {
    #[validate(length(max = 256))]
    title: String,
    #[validate(length(max = 256))]
    composer: String,
    #[validate(length(max = 256))]
    arranged_by: String,
    #[validate(length(max = 256))]
    mtn_number: String,
    #[validate(url, length(max = 256))]
    youtube_link: Option<String>,
}

/// Clean the core song fields.
///
/// Blank optional text becomes `""`; `mtn_number` is forced to `""` when the
/// tracking flag is off.
pub fn clean_song_fields(input: &SongFieldsInput) -> Result<SongFields, FieldErrors> {
    let mut errors = FieldErrors::new();

    let title = clean_text(input.title.as_deref());
    let composer = clean_text(input.composer.as_deref());
    let arranged_by = clean_text(input.arranged_by.as_deref());
    let youtube_link = clean_text(input.youtube_link.as_deref());
    let mtn = parse_checkbox(input.mtn.as_deref());
    let mut mtn_number = clean_text(input.mtn_number.as_deref());

    if title.is_empty() {
        errors.required("title");
    }
    if composer.is_empty() {
        errors.required("composer");
    }
    let part_of_mass = clean_choice(
        "part_of_mass",
        input.part_of_mass.as_deref(),
        MassPart::from_code,
        &mut errors,
    );
    let season = clean_choice("season", input.season.as_deref(), Season::from_code, &mut errors);

    if mtn && mtn_number.is_empty() {
        errors.add("mtn_number", MTN_NUMBER_REQUIRED);
    }
    if !mtn {
        mtn_number.clear();
    }

    let limits = TextLimits {
        title: title.clone(),
        composer: composer.clone(),
        arranged_by: arranged_by.clone(),
        mtn_number: mtn_number.clone(),
        youtube_link: (!youtube_link.is_empty()).then(|| youtube_link.clone()),
    };
    if let Err(e) = limits.validate() {
        errors.extend_from_validator(&e);
    }

    match (part_of_mass, season) {
        (Some(part_of_mass), Some(season)) if errors.is_empty() => Ok(SongFields {
            title,
            composer,
            arranged_by,
            part_of_mass,
            season,
            mtn,
            mtn_number,
            youtube_link,
        }),
        _ => Err(errors),
    }
}

/// Parse a required choice field, recording Django-style messages.
fn clean_choice<T, E>(
    field: &str,
    raw: Option<&str>,
    parse: impl Fn(&str) -> Result<T, E>,
    errors: &mut FieldErrors,
) -> Option<T> {
    let value = clean_text(raw);
    if value.is_empty() {
        errors.required(field);
        return None;
    }
    match parse(&value) {
        Ok(v) => Some(v),
        Err(_) => {
            errors.add(
                field,
                format!("Select a valid choice. {value} is not one of the available choices."),
            );
            None
        }
    }
}

/// Parse an optional status choice (staff edit form). Blank keeps `current`.
pub fn clean_status(
    raw: Option<&str>,
    current: SongStatus,
    errors: &mut FieldErrors,
) -> SongStatus {
    let value = clean_text(raw);
    if value.is_empty() {
        return current;
    }
    SongStatus::from_code(&value).unwrap_or_else(|_| {
        errors.add(
            "status",
            format!("Select a valid choice. {value} is not one of the available choices."),
        );
        current
    })
}

/// One optional (file, version) pair of the submission form.
#[derive(Debug, Clone, Default)]
pub struct AssetSlotInput {
    pub file: Option<UploadedFile>,
    pub version: Option<String>,
}

/// Full submission: core fields plus one slot per asset kind.
#[derive(Debug, Clone, Default)]
pub struct SubmissionInput {
    pub fields: SongFieldsInput,
    pub sheet: AssetSlotInput,
    pub midi: AssetSlotInput,
    pub audio: AssetSlotInput,
}

impl SubmissionInput {
    pub fn slot_mut(&mut self, kind: AssetKind) -> &mut AssetSlotInput {
        match kind {
            AssetKind::Sheet => &mut self.sheet,
            AssetKind::Midi => &mut self.midi,
            AssetKind::Audio => &mut self.audio,
        }
    }

    fn slot(&self, kind: AssetKind) -> &AssetSlotInput {
        match kind {
            AssetKind::Sheet => &self.sheet,
            AssetKind::Midi => &self.midi,
            AssetKind::Audio => &self.audio,
        }
    }
}

/// A file accepted for storage alongside the new song.
#[derive(Debug, Clone)]
pub struct AcceptedUpload {
    pub kind: AssetKind,
    pub file: UploadedFile,
    pub version: String,
}

/// A submission that passed validation.
#[derive(Debug, Clone)]
pub struct CleanSubmission {
    pub fields: SongFields,
    pub uploads: Vec<AcceptedUpload>,
}

/// Validate a whole submission.
///
/// A file without a version is an error on that kind's version field; a
/// version without a file is ignored.
pub fn validate_submission(input: SubmissionInput) -> Result<CleanSubmission, FieldErrors> {
    let mut errors = FieldErrors::new();

    let fields = match clean_song_fields(&input.fields) {
        Ok(fields) => Some(fields),
        Err(e) => {
            errors.merge(e);
            None
        }
    };

    let mut uploads = Vec::new();
    for kind in AssetKind::ALL {
        let slot = input.slot(kind);
        let Some(file) = &slot.file else {
            continue;
        };
        let version = clean_text(slot.version.as_deref());

        check_upload(kind, file, kind.file_field(), &mut errors);
        check_version(kind, &version, kind.version_field(), &mut errors);
        uploads.push(AcceptedUpload {
            kind,
            file: file.clone(),
            version,
        });
    }

    match fields {
        Some(fields) if errors.is_empty() => Ok(CleanSubmission { fields, uploads }),
        _ => Err(errors),
    }
}

/// Notice returned after a successful submission.
pub fn outcome_message(title: &str, status: SongStatus) -> String {
    match status {
        SongStatus::Published => format!("Song \"{title}\" uploaded and published successfully!"),
        SongStatus::PendingApproval => format!(
            "Song \"{title}\" uploaded successfully! It will be reviewed before publication."
        ),
    }
}

/// Notice returned after an owner edit.
pub fn updated_message(title: &str) -> String {
    format!("Song \"{title}\" updated successfully!")
}
