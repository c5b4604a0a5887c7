use crate::db::DatabaseError;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(AutoAction {
    NotifyAdmin => "NotifyAdmin",
    AutoDelete => "AutoDelete",
    ManualReview => "ManualReview",
});

impl Default for AutoAction {
    fn default() -> Self {
        Self::ManualReview
    }
}

str_enum!(RetentionStatus {
    Active => "Active",
    Expired => "Expired",
});

/// Listing filter over the derived retention status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum StatusFilter {
    Active,
    Expired,
    #[default]
    All,
}

/// Standard document categories offered when uploading.
///
/// Stored as free text: retention policies match on the exact string,
/// so documents may carry categories outside this list.
pub const STANDARD_DOCUMENT_TYPES: &[&str] = &[
    "Medical History",
    "Examination Reports",
    "Lab Reports",
    "Imaging Reports",
    "Prescription Records",
    "Others",
];
