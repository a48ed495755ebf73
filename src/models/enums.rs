use crate::db::DatabaseError;

/// Macro to generate enum with as_str + std::str::FromStr pattern.
/// Serde goes through the same strings so the wire and the database agree.
macro_rules! str_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
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

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

str_enum!(
    /// Coarse ordinal tier derived from how far a color ratio exceeds its threshold.
    Severity {
        Low => "low",
        Medium => "medium",
        High => "high",
    }
);

str_enum!(
    /// The three outcomes of the color-ratio heuristic. The string is the
    /// user-facing disease name and is stored verbatim.
    DiseaseKind {
        LeafSpot => "Leaf Spot / Brown Spot Disease",
        RustOrYellowLeaf => "Rust or Yellow Leaf Disease",
        Healthy => "Healthy Plant",
    }
);

str_enum!(
    /// Speaker of one conversation turn, named the way the generation endpoint expects.
    ChatRole {
        User => "user",
        Model => "model",
    }
);

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn severity_round_trip() {
        for (variant, s) in [
            (Severity::Low, "low"),
            (Severity::Medium, "medium"),
            (Severity::High, "high"),
        ] {
            assert_eq!(variant.as_str(), s);
            assert_eq!(Severity::from_str(s).unwrap(), variant);
        }
    }

    #[test]
    fn disease_labels_are_user_facing() {
        assert_eq!(DiseaseKind::LeafSpot.as_str(), "Leaf Spot / Brown Spot Disease");
        assert_eq!(DiseaseKind::RustOrYellowLeaf.as_str(), "Rust or Yellow Leaf Disease");
        assert_eq!(DiseaseKind::Healthy.as_str(), "Healthy Plant");
    }

    #[test]
    fn serde_uses_wire_strings() {
        assert_eq!(serde_json::to_string(&Severity::Medium).unwrap(), "\"medium\"");
        assert_eq!(serde_json::to_string(&ChatRole::Model).unwrap(), "\"model\"");
        let parsed: Severity = serde_json::from_str("\"high\"").unwrap();
        assert_eq!(parsed, Severity::High);
        assert!(serde_json::from_str::<Severity>("\"extreme\"").is_err());
    }

    #[test]
    fn invalid_enum_returns_error() {
        assert!(Severity::from_str("critical").is_err());
        assert!(DiseaseKind::from_str("Powdery Mildew").is_err());
        assert!(ChatRole::from_str("assistant").is_err());
    }
}
