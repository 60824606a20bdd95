use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;
use thiserror::Error;

static YEAR_MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(20\d{2})\b").expect("year mention regex"));
static NAME_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{1,3}").expect("partition code regex"));
static NAME_YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"20\d{2}").expect("partition year regex"));

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SelectionError {
    #[error("Please enter a valid question.")]
    EmptyQuery,
    #[error(
        "No {prefix} number or year found in the query. \
         Please mention something like '{prefix} 54' or '2021'."
    )]
    NoIdentifierFound { prefix: String },
    #[error("No matching documents detected for the {prefix} numbers or years in the query.")]
    NoMatchingPartition { prefix: String },
}

/// Maps meeting codes ("BoG 54") and years ("2021") mentioned in a question
/// onto partition names containing the same digits.
///
/// Partition names are indexed by their *first* 1-3 digit run and their first
/// `20xx` run, so `BoG54_2021` answers to both `54` and `2021`. Overlapping
/// matches are not disambiguated: the result is the union of everything any
/// mention matched.
#[derive(Debug, Clone)]
pub struct PartitionSelector {
    prefix: String,
    code_mention: Regex,
}

impl PartitionSelector {
    pub fn new(code_prefix: &str) -> Result<Self> {
        let pattern = format!(r"(?i)\b{}\s*(\d{{1,3}})\b", regex::escape(code_prefix));
        let code_mention = Regex::new(&pattern)
            .with_context(|| format!("invalid partition code prefix {code_prefix:?}"))?;

        Ok(Self {
            prefix: code_prefix.to_string(),
            code_mention,
        })
    }

    /// Partition names targeted by `query`, sorted and deduplicated.
    pub fn select<'a, I>(&self, query: &str, available: I) -> Result<Vec<String>, SelectionError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let codes: Vec<&str> = self
            .code_mention
            .captures_iter(query)
            .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
            .collect();
        let years: Vec<&str> = YEAR_MENTION
            .captures_iter(query)
            .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
            .collect();

        if codes.is_empty() && years.is_empty() {
            return Err(SelectionError::NoIdentifierFound {
                prefix: self.prefix.clone(),
            });
        }

        let mut by_code: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        let mut by_year: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for name in available {
            if let Some(code) = NAME_CODE.find(name) {
                by_code.entry(code.as_str()).or_default().push(name);
            }
            if let Some(year) = NAME_YEAR.find(name) {
                by_year.entry(year.as_str()).or_default().push(name);
            }
        }

        let mut selected = BTreeSet::new();
        for code in &codes {
            match by_code.get(code) {
                Some(names) => selected.extend(names.iter().map(|n| n.to_string())),
                None => tracing::warn!("{} {} not found in partition names", self.prefix, code),
            }
        }
        for year in &years {
            match by_year.get(year) {
                Some(names) => selected.extend(names.iter().map(|n| n.to_string())),
                None => tracing::warn!("year {} not found in partition names", year),
            }
        }

        if selected.is_empty() {
            return Err(SelectionError::NoMatchingPartition {
                prefix: self.prefix.clone(),
            });
        }

        tracing::info!(partitions = ?selected, "matched partitions from query");
        Ok(selected.into_iter().collect())
    }
}
