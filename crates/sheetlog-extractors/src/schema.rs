//! Dataset schemas: how header text maps onto canonical field names and how
//! the business key is derived.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{ExtractError, ExtractResult};

/// A canonical field and the header texts that map onto it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Canonical field name used in the stored JSON.
    pub name: String,
    /// Alternative header texts (any language).
    #[serde(default)]
    pub synonyms: Vec<String>,
    /// Whether the import fails when no header maps to this field.
    #[serde(default)]
    pub required: bool,
}

impl FieldSpec {
    /// Optional field.
    pub fn optional<S: Into<String>>(name: impl Into<String>, synonyms: impl IntoIterator<Item = S>) -> Self {
        Self {
            name: name.into(),
            synonyms: synonyms.into_iter().map(Into::into).collect(),
            required: false,
        }
    }

    /// Required field.
    pub fn required<S: Into<String>>(name: impl Into<String>, synonyms: impl IntoIterator<Item = S>) -> Self {
        Self {
            required: true,
            ..Self::optional(name, synonyms)
        }
    }

    /// Case-insensitive substring match in either direction against the
    /// canonical name and every synonym.
    pub fn matches(&self, header: &str) -> bool {
        self.match_strength(header).is_some()
    }

    /// How specifically `header` matches this field, if at all.
    ///
    /// Exact matches rank above substring matches; among substring matches
    /// the longer overlap ranks higher.
    pub fn match_strength(&self, header: &str) -> Option<MatchStrength> {
        let header = header.trim().to_lowercase();
        if header.is_empty() {
            return None;
        }
        std::iter::once(&self.name)
            .chain(self.synonyms.iter())
            .map(|candidate| candidate.trim().to_lowercase())
            .filter(|candidate| !candidate.is_empty())
            .filter_map(|candidate| {
                if candidate == header {
                    Some(MatchStrength {
                        exact: true,
                        overlap: header.chars().count(),
                    })
                } else if header.contains(&candidate) {
                    Some(MatchStrength {
                        exact: false,
                        overlap: candidate.chars().count(),
                    })
                } else if candidate.contains(&header) {
                    Some(MatchStrength {
                        exact: false,
                        overlap: header.chars().count(),
                    })
                } else {
                    None
                }
            })
            .max()
    }
}

/// Ranking of a header match; compares exactness first, then overlap length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MatchStrength {
    pub exact: bool,
    /// Characters shared by the header and the matching synonym.
    pub overlap: usize,
}

/// How a business key value is validated and normalized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyFormat {
    /// Any non-empty text.
    #[default]
    Text,
    /// Must parse as an integer; stored as its decimal text.
    Integer,
}

/// Where the business key comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySpec {
    /// Field holding the key.
    pub field: String,
    /// 0-based column used when no header maps to `field`.
    #[serde(default)]
    pub fallback_column: Option<usize>,
    /// Validation applied to key values.
    #[serde(default)]
    pub format: KeyFormat,
}

impl KeySpec {
    /// Text key read from a named field.
    pub fn field(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            fallback_column: None,
            format: KeyFormat::Text,
        }
    }

    /// Builder: set a fallback column.
    pub fn with_fallback_column(mut self, column: usize) -> Self {
        self.fallback_column = Some(column);
        self
    }

    /// Builder: set the key format.
    pub fn with_format(mut self, format: KeyFormat) -> Self {
        self.format = format;
        self
    }
}

fn default_min_columns() -> usize {
    1
}

/// Column mapping rules for one kind of upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetSchema {
    /// Known fields, in matching priority order.
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
    /// Keep headers no field claims, using the header text as field name.
    #[serde(default)]
    pub keep_unmapped: bool,
    /// Business key derivation.
    pub key: KeySpec,
    /// Minimum number of populated header cells.
    #[serde(default = "default_min_columns")]
    pub min_columns: usize,
    /// Fields whose empty value causes the row to be skipped.
    #[serde(default)]
    pub skip_when_empty: Vec<String>,
}

impl Default for DatasetSchema {
    fn default() -> Self {
        Self::generic()
    }
}

impl DatasetSchema {
    /// Every header becomes a field; the key is read from a `BusinessKey` column.
    pub fn generic() -> Self {
        Self {
            fields: Vec::new(),
            keep_unmapped: true,
            key: KeySpec::field("BusinessKey"),
            min_columns: 1,
            skip_when_empty: Vec::new(),
        }
    }

    /// Passthrough schema keyed on the given header.
    pub fn passthrough(key_field: impl Into<String>) -> Self {
        Self {
            key: KeySpec::field(key_field),
            ..Self::generic()
        }
    }

    /// Rehabilitation scheme application sheet with bilingual headers.
    ///
    /// The key is the original slum number; sheets without a recognizable
    /// header for it carry it in the second column, so the key field is not
    /// listed as required. Rows without an
    /// eligibility status are not yet decided and are skipped.
    pub fn rehabilitation_applications() -> Self {
        let fields = vec![
            FieldSpec::optional(
                "SerialNumber",
                ["अ.क्र.", "Serial Number", "Sr. No.", "Serial No"],
            ),
            FieldSpec::optional(
                "OriginalSlumNumber",
                ["मूळ परिशिष्ट-॥ मधील झो.क्र.", "Original Slum Number", "Slum No", "झो.क्र."],
            ),
            FieldSpec::required(
                "OriginalSlumDwellerName",
                [
                    "मूळ परिशिष्ट-॥ मधील झोपडीधारकाचे नाव",
                    "Original Slum Dweller Name",
                    "Original Dweller",
                ],
            ),
            FieldSpec::required(
                "ApplicantName",
                [
                    "विहीत जोडपत्र दाखल केलेल्या अर्जदाराचे नाव",
                    "Applicant Name",
                    "अर्जदाराचे नाव",
                ],
            ),
            FieldSpec::optional("VoterListYear", ["वर्ष", "Year", "Voter Year"]),
            FieldSpec::optional("VoterListPartNumber", ["भाग क्र.", "Part No", "Part Number"]),
            FieldSpec::optional(
                "VoterListSerialNumber",
                ["मतदार यादीतील अ.क्र.", "Voter List Sr. No", "Voter Serial"],
            ),
            FieldSpec::optional(
                "VoterListBound",
                ["मतदार यादीतील बांध", "Voter List Bound", "Voter Bound"],
            ),
            FieldSpec::required("SlumUsage", ["झोपडीचा वापर", "Slum Usage", "Usage"]),
            FieldSpec::optional(
                "CarpetAreaSqFt",
                ["झोपडी खालील चटई क्षेत्र", "Carpet Area", "Area Sq Ft", "चौ.फू."],
            ),
            FieldSpec::required(
                "EvidenceDetails",
                [
                    "अर्जदार यांनी अभय योजनेनुसार सादर केलेल्या प्रमुख पुराव्यांचा तपशील",
                    "Evidence Details",
                    "Evidence",
                    "पुराव्यांचा तपशील",
                ],
            ),
            FieldSpec::required(
                "EligibilityStatus",
                ["पात्र/अपात्र/अनिर्णित", "Eligibility Status", "Status", "पात्रता"],
            ),
            FieldSpec::optional("Remarks", ["शेरा", "Remarks", "Comments"]),
        ];

        Self {
            fields,
            keep_unmapped: false,
            key: KeySpec::field("OriginalSlumNumber")
                .with_fallback_column(1)
                .with_format(KeyFormat::Integer),
            min_columns: 6,
            skip_when_empty: vec!["EligibilityStatus".to_string()],
        }
    }

    /// Look up a built-in schema by name.
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "generic" => Some(Self::generic()),
            "rehabilitation_applications" => Some(Self::rehabilitation_applications()),
            _ => None,
        }
    }

    /// The most specific field for a header. Ties go to the earlier field.
    fn best_field(&self, header: &str) -> Option<&FieldSpec> {
        let mut best: Option<(&FieldSpec, MatchStrength)> = None;
        for field in &self.fields {
            if let Some(strength) = field.match_strength(header) {
                if best.map_or(true, |(_, current)| strength > current) {
                    best = Some((field, strength));
                }
            }
        }
        best.map(|(field, _)| field)
    }

    /// Map header cells to fields and validate the result.
    pub fn map_headers(&self, headers: &[String]) -> ExtractResult<ColumnMap> {
        let populated = headers.iter().filter(|h| !h.trim().is_empty()).count();
        if populated < self.min_columns {
            return Err(ExtractError::TooFewColumns {
                found: populated,
                required: self.min_columns,
            });
        }

        let mut map = ColumnMap::default();
        for (column, raw) in headers.iter().enumerate() {
            let header = raw.trim();
            if header.is_empty() {
                continue;
            }

            if let Some(field) = self.best_field(header) {
                map.insert_first(&field.name, column);
            } else if self.keep_unmapped {
                map.insert_first(header, column);
            }
        }

        let missing: Vec<String> = self
            .fields
            .iter()
            .filter(|f| f.required && map.position(&f.name).is_none())
            .map(|f| f.name.clone())
            .collect();
        if !missing.is_empty() {
            return Err(ExtractError::MissingColumns(missing));
        }

        if map.position(&self.key.field).is_none() && self.key.fallback_column.is_none() {
            return Err(ExtractError::MissingKeyColumn(self.key.field.clone()));
        }

        Ok(map)
    }
}

/// Resolved field-to-column assignment for one sheet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMap {
    columns: BTreeMap<String, usize>,
}

impl ColumnMap {
    fn insert_first(&mut self, field: &str, column: usize) {
        if self.position(field).is_none() {
            self.columns.insert(field.to_string(), column);
        }
    }

    /// Column of a field, compared case-insensitively.
    pub fn position(&self, field: &str) -> Option<usize> {
        self.columns.get(field).copied().or_else(|| {
            self.columns
                .iter()
                .find(|(name, _)| name.to_lowercase() == field.to_lowercase())
                .map(|(_, column)| *column)
        })
    }

    /// Field names with their columns, sorted by field name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.columns.iter().map(|(name, column)| (name.as_str(), *column))
    }

    /// Number of mapped fields.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether nothing was mapped.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}
