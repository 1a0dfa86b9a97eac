//! Song classification vocabularies: liturgical season, part of the mass,
//! and moderation status.
//!
//! Each vocabulary is a closed enum stored as its short code in a `TEXT`
//! column. The database CHECK constraints in the `songs` migration must list
//! exactly the codes declared here.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

macro_rules! define_choice_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $entity:literal {
            $( $(#[$vmeta:meta])* $variant:ident => ($code:literal, $label:literal) ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $( $(#[$vmeta])* #[serde(rename = $code)] $variant ),+
        }

        impl $name {
            /// Every value in declaration order.
            pub const ALL: &'static [$name] = &[$( $name::$variant ),+];

            /// Short code persisted in the database and used in query strings.
            pub fn code(self) -> &'static str {
                match self {
                    $( $name::$variant => $code ),+
                }
            }

            /// Human-readable label.
            pub fn label(self) -> &'static str {
                match self {
                    $( $name::$variant => $label ),+
                }
            }

            /// Parse a stored or submitted code.
            pub fn from_code(code: &str) -> Result<Self, CoreError> {
                match code {
                    $( $code => Ok($name::$variant), )+
                    other => Err(CoreError::Validation(format!(
                        "Unknown {} '{other}'",
                        $entity
                    ))),
                }
            }

            /// `(code, label)` pairs for form choices.
            pub fn choices() -> Vec<Choice> {
                Self::ALL
                    .iter()
                    .map(|v| Choice { code: v.code(), label: v.label() })
                    .collect()
            }

            /// Codes whose code or label contains `term`, case-insensitively.
            pub fn codes_matching(term: &str) -> Vec<&'static str> {
                let needle = term.trim().to_lowercase();
                if needle.is_empty() {
                    return Vec::new();
                }
                Self::ALL
                    .iter()
                    .filter(|v| {
                        v.code().contains(&needle) || v.label().to_lowercase().contains(&needle)
                    })
                    .map(|v| v.code())
                    .collect()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.code())
            }
        }

        impl std::str::FromStr for $name {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_code(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = CoreError;

            fn try_from(code: String) -> Result<Self, Self::Error> {
                Self::from_code(&code)
            }
        }
    };
}

/// A selectable `(code, label)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Choice {
    pub code: &'static str,
    pub label: &'static str,
}

define_choice_enum! {
    /// Liturgical calendar period.
    Season, "season" {
        Lent => ("lent", "Lent"),
        Easter => ("easter", "Easter"),
        Christmas => ("christmas", "Christmas"),
        Advent => ("advent", "Advent"),
        Ordinary => ("ordinary", "Ordinary Time"),
    }
}

define_choice_enum! {
    /// Liturgical segment a song is sung at.
    MassPart, "part of mass" {
        Entrance => ("entrance", "Entrance Procession"),
        Penitential => ("penitential", "Penitential Act / Kyrie"),
        Gloria => ("gloria", "Gloria"),
        Collect => ("collect", "Collect"),
        Responsorial => ("responsorial", "Responsorial Psalm"),
        Meditation => ("meditation", "Meditation"),
        Gospel => ("gospel", "Gospel Acclamation"),
        Creed => ("creed", "Creed"),
        Prayers => ("prayers", "Prayers of the Faithful"),
        Offertory => ("offertory", "Offertory"),
        OurFather => ("our_father", "Lord's Prayer"),
        SignOfPeace => ("sign_of_peace", "Sign of Peace"),
        Communion => ("communion", "Eucharist"),
        Blessing => ("blessing", "Blessing"),
        Dismissal => ("dismissal", "Dismissal / Recession"),
        Others => ("others", "Others"),
    }
}

define_choice_enum! {
    /// Moderation state. Codes sort so that pending songs come first.
    SongStatus, "song status" {
        PendingApproval => ("pending_approval", "Pending Approval"),
        Published => ("published", "Published"),
    }
}

impl SongStatus {
    /// Status assigned to a new submission.
    ///
    /// Staff and superusers publish immediately; everyone else is queued.
    pub fn for_submitter(is_staff: bool) -> Self {
        if is_staff {
            SongStatus::Published
        } else {
            SongStatus::PendingApproval
        }
    }
}
