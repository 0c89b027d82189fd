//! Declarative column resolution
//!
//! Spreadsheet vintages name the same column differently ("专业最低分",
//! "24年专业最低分", "lowest_points"). A [`ColumnSpec`] is an ordered list of
//! rules; for each logical column the first rule that matches an unclaimed
//! header wins, headers are scanned left to right.

use std::collections::{BTreeMap, HashSet};

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Logical column names used by the shape stage
pub mod logical {
    pub const ID: &str = "id";
    pub const SOURCE_REGION: &str = "source_region";
    pub const COLLEGE_NAME: &str = "college_name";
    pub const MAJOR_NAME: &str = "major_name";
    pub const MIN_SCORE: &str = "min_score";
    pub const YEAR: &str = "year";
    pub const STUDY_YEARS: &str = "study_years";
    pub const BATCH: &str = "batch";
}

/// How a rule matches a header
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "match", rename_all = "snake_case")]
pub enum MatchRule {
    /// Case-insensitive equality after trimming
    Exact { name: String },
    /// Header contains any keyword; if qualifiers are given it must also
    /// contain one of them (e.g. a year token)
    Keywords {
        any_of: Vec<String>,
        #[serde(default)]
        qualifiers: Vec<String>,
    },
    /// Regular expression over the raw header
    Pattern { regex: String },
}

impl MatchRule {
    pub fn exact(name: impl Into<String>) -> Self {
        Self::Exact { name: name.into() }
    }

    pub fn keywords(any_of: &[&str]) -> Self {
        Self::Keywords {
            any_of: any_of.iter().map(|s| s.to_string()).collect(),
            qualifiers: Vec::new(),
        }
    }

    pub fn qualified(any_of: &[&str], qualifiers: &[&str]) -> Self {
        Self::Keywords {
            any_of: any_of.iter().map(|s| s.to_string()).collect(),
            qualifiers: qualifiers.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn matches(&self, header: &str, compiled: Option<&Regex>) -> bool {
        let header_lower = header.trim().to_lowercase();
        match self {
            MatchRule::Exact { name } => header_lower == name.trim().to_lowercase(),
            MatchRule::Keywords { any_of, qualifiers } => {
                let has_keyword = any_of
                    .iter()
                    .any(|k| header_lower.contains(&k.to_lowercase()));
                let qualified = qualifiers.is_empty()
                    || qualifiers
                        .iter()
                        .any(|q| header_lower.contains(&q.to_lowercase()));
                has_keyword && qualified
            }
            MatchRule::Pattern { .. } => compiled.is_some_and(|re| re.is_match(header)),
        }
    }
}

/// One (logical name, rule) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnRule {
    pub logical: String,
    #[serde(flatten)]
    pub rule: MatchRule,
    #[serde(default)]
    pub required: bool,
}

impl ColumnRule {
    pub fn required(logical: &str, rule: MatchRule) -> Self {
        Self {
            logical: logical.to_string(),
            rule,
            required: true,
        }
    }

    pub fn optional(logical: &str, rule: MatchRule) -> Self {
        Self {
            logical: logical.to_string(),
            rule,
            required: false,
        }
    }
}

/// Logical name -> actual header, for one table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedColumns {
    columns: BTreeMap<String, String>,
}

impl ResolvedColumns {
    pub fn get(&self, logical: &str) -> Option<&str> {
        self.columns.get(logical).map(|s| s.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }
}

/// Ordered resolution rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub rules: Vec<ColumnRule>,
}

impl ColumnSpec {
    pub fn new(rules: Vec<ColumnRule>) -> Self {
        Self { rules }
    }

    /// Logical names marked required by at least one rule, in rule order
    pub fn required_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for rule in self.rules.iter().filter(|r| r.required) {
            if !names.contains(&rule.logical) {
                names.push(rule.logical.clone());
            }
        }
        names
    }

    /// Resolve against a header row. Returns the missing required names on
    /// failure.
    pub fn resolve(&self, headers: &[String]) -> Result<ResolvedColumns, Vec<String>> {
        let mut resolved = BTreeMap::new();
        let mut claimed: HashSet<usize> = HashSet::new();

        for rule in &self.rules {
            if resolved.contains_key(&rule.logical) {
                continue;
            }

            let compiled = match &rule.rule {
                MatchRule::Pattern { regex } => match Regex::new(regex) {
                    Ok(re) => Some(re),
                    Err(e) => {
                        log::warn!("Ignoring invalid column pattern '{}': {}", regex, e);
                        continue;
                    }
                },
                _ => None,
            };

            let hit = headers.iter().enumerate().find(|(idx, header)| {
                !claimed.contains(idx) && rule.rule.matches(header, compiled.as_ref())
            });

            if let Some((idx, header)) = hit {
                log::debug!("Column '{}' resolved to header '{}'", rule.logical, header);
                claimed.insert(idx);
                resolved.insert(rule.logical.clone(), header.clone());
            }
        }

        let missing: Vec<String> = self
            .required_names()
            .into_iter()
            .filter(|name| !resolved.contains_key(name))
            .collect();

        if missing.is_empty() {
            Ok(ResolvedColumns { columns: resolved })
        } else {
            Err(missing)
        }
    }
}

impl Default for ColumnSpec {
    /// Vocabulary of the provincial admission workbooks and of the cleaned
    /// CSV this tool writes back out
    fn default() -> Self {
        use logical::*;

        Self::new(vec![
            ColumnRule::required(ID, MatchRule::exact("id")),
            ColumnRule::required(SOURCE_REGION, MatchRule::exact("生源地")),
            ColumnRule::required(SOURCE_REGION, MatchRule::keywords(&["source_province", "province"])),
            ColumnRule::optional(COLLEGE_NAME, MatchRule::exact("院校名称")),
            ColumnRule::optional(COLLEGE_NAME, MatchRule::keywords(&["college_name", "school_name"])),
            ColumnRule::optional(MAJOR_NAME, MatchRule::exact("专业名称")),
            ColumnRule::optional(MAJOR_NAME, MatchRule::keywords(&["major_name", "professional_name"])),
            ColumnRule::required(
                MIN_SCORE,
                MatchRule::qualified(&["专业最低分", "min_score"], &["2024", "24年"]),
            ),
            ColumnRule::required(MIN_SCORE, MatchRule::exact("专业最低分")),
            ColumnRule::required(
                MIN_SCORE,
                MatchRule::keywords(&["major_min_score", "lowest_points", "min_score"]),
            ),
            ColumnRule::optional(YEAR, MatchRule::exact("年份")),
            ColumnRule::optional(YEAR, MatchRule::exact("year")),
            ColumnRule::optional(STUDY_YEARS, MatchRule::keywords(&["学制", "study_years"])),
            ColumnRule::optional(BATCH, MatchRule::exact("批次")),
            ColumnRule::optional(BATCH, MatchRule::exact("batch")),
        ])
    }
}
