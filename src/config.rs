use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MatchMode {
    Exact,
    Prefix,
    CamelCase,
    Substring,
    Subword,
}

impl MatchMode {
    fn bit(self) -> u8 {
        match self {
            Self::Exact => 1,
            Self::Prefix => 1 << 1,
            Self::CamelCase => 1 << 2,
            Self::Substring => 1 << 3,
            Self::Subword => 1 << 4,
        }
    }
}

/// Set of enabled matching modes; a name matches when any enabled mode does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<MatchMode>", into = "Vec<MatchMode>")]
pub struct MatchModes(u8);

impl MatchModes {
    pub const ALL: [MatchMode; 5] = [
        MatchMode::Exact,
        MatchMode::Prefix,
        MatchMode::CamelCase,
        MatchMode::Substring,
        MatchMode::Subword,
    ];

    pub fn empty() -> Self {
        MatchModes(0)
    }

    pub fn only(mode: MatchMode) -> Self {
        MatchModes(mode.bit())
    }

    pub fn with(self, mode: MatchMode) -> Self {
        MatchModes(self.0 | mode.bit())
    }

    pub fn contains(self, mode: MatchMode) -> bool {
        self.0 & mode.bit() != 0
    }

    pub fn iter(self) -> impl Iterator<Item = MatchMode> {
        Self::ALL.into_iter().filter(move |m| self.contains(*m))
    }
}

impl Default for MatchModes {
    fn default() -> Self {
        MatchModes::only(MatchMode::Prefix).with(MatchMode::CamelCase)
    }
}

impl From<Vec<MatchMode>> for MatchModes {
    fn from(modes: Vec<MatchMode>) -> Self {
        modes
            .into_iter()
            .fold(MatchModes::empty(), |set, m| set.with(m))
    }
}

impl From<MatchModes> for Vec<MatchMode> {
    fn from(set: MatchModes) -> Self {
        set.iter().collect()
    }
}

/// Relevance contributions. Higher ranks first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelevanceWeights {
    pub local_variable: f32,
    pub field: f32,
    pub method: f32,
    pub type_name: f32,
    pub package: f32,
    pub keyword: f32,
    /// Candidate type equals an expected type.
    pub expected_exact: f32,
    /// Candidate type is compatible with an expected type in an admitted direction.
    pub expected_compatible: f32,
    pub exact_match: f32,
    pub camel_case_match: f32,
    pub prefix_match: f32,
    pub substring_match: f32,
    pub subword_match: f32,
    /// Penalty for candidates that fail the visibility check when it is advisory.
    pub inaccessible_penalty: f32,
    /// Penalty for types that are not in scope and would need an import.
    pub needs_import_penalty: f32,
}

impl Default for RelevanceWeights {
    fn default() -> Self {
        Self {
            local_variable: 30.0,
            field: 22.0,
            method: 20.0,
            type_name: 10.0,
            package: 5.0,
            keyword: 3.0,
            expected_exact: 40.0,
            expected_compatible: 25.0,
            exact_match: 100.0,
            camel_case_match: 80.0,
            prefix_match: 60.0,
            substring_match: 40.0,
            subword_match: 30.0,
            inaccessible_penalty: 50.0,
            needs_import_penalty: 8.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AssistConfig {
    pub match_modes: MatchModes,
    pub case_sensitive: bool,
    /// When off, inaccessible candidates are proposed but ranked lower.
    pub check_visibility: bool,
    /// Replace the whole identifier under the cursor instead of its prefix.
    pub replace_full_word: bool,
    pub include_keywords: bool,
    /// Upper bound on not-yet-imported types taken from the index per request.
    pub max_index_results: usize,
    pub relevance: RelevanceWeights,
}

impl Default for AssistConfig {
    fn default() -> Self {
        Self {
            match_modes: MatchModes::default(),
            case_sensitive: false,
            check_visibility: true,
            replace_full_word: false,
            include_keywords: true,
            max_index_results: 200,
            relevance: RelevanceWeights::default(),
        }
    }
}
