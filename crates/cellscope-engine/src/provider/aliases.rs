//! Exposing a provider's parsers under declared names and aliases.
//!
//! An alias set is written as comma-separated entries:
//!
//! ```text
//! alias1 name1, name2, custom4 parser3("Value3") https://example.com/custom4
//! ```
//!
//! - `name2` offers the wrapped provider's `name2` unchanged.
//! - `alias1 name1` offers `name1` as `alias1`; callers' values still apply.
//! - `custom4 parser3("Value3") url` binds `parser3` to fixed values; values
//!   supplied by callers are ignored.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use super::error::{ProviderError, Result};
use super::info::{ParserInfo, ParserInfoSet};
use super::selector::{ParserName, ParserSelector};
use super::{SpreadsheetParser, SpreadsheetParserProvider};
use crate::engine::Value;

/// One entry of a [`ParserAliasSet`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParserAlias {
    name: ParserName,
    /// `None` for a plain name offered as-is.
    target: Option<ParserSelector>,
    url: Option<String>,
}

impl ParserAlias {
    pub fn name(&self) -> &ParserName {
        &self.name
    }

    pub fn target(&self) -> Option<&ParserSelector> {
        self.target.as_ref()
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// The wrapped provider's name this entry resolves to.
    pub fn target_name(&self) -> &ParserName {
        self.target.as_ref().map_or(&self.name, ParserSelector::name)
    }

    /// True when the target carries its own values or pattern.
    pub fn has_bound_values(&self) -> bool {
        self.target.as_ref().is_some_and(|t| !t.text().is_empty())
    }

    fn parse(entry: &str) -> Result<ParserAlias> {
        let invalid = || ProviderError::InvalidAlias(entry.to_string());
        let entry = entry.trim();
        let (name, rest) = match entry.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (entry, ""),
        };
        let name = ParserName::new(name).map_err(|_| invalid())?;
        if rest.is_empty() {
            return Ok(ParserAlias {
                name,
                target: None,
                url: None,
            });
        }

        let (target, url) = match rest.rsplit_once(char::is_whitespace) {
            Some((target, last)) if is_url(last) && !inside_parens(target) => {
                (target.trim(), Some(last.to_string()))
            }
            _ if is_url(rest) => ("", Some(rest.to_string())),
            _ => (rest, None),
        };
        if let Some(url) = &url {
            ParserInfo::new(url, name.clone())?;
        }
        let target = if target.is_empty() {
            None
        } else {
            Some(ParserSelector::parse(target).map_err(|_| invalid())?)
        };
        if target.is_none() && url.is_none() {
            return Err(invalid());
        }
        Ok(ParserAlias { name, target, url })
    }
}

fn is_url(text: &str) -> bool {
    text.starts_with("https://") || text.starts_with("http://")
}

/// True when `text` ends inside an unclosed `(` or string.
fn inside_parens(text: &str) -> bool {
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;
    for c in text.chars() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '(' => depth += 1,
            ')' => depth -= 1,
            _ => {}
        }
    }
    in_string || depth > 0
}

/// Split on commas that are outside strings and parentheses.
fn split_entries(text: &str) -> Vec<&str> {
    let mut entries = Vec::new();
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;
    let mut start = 0usize;
    for (i, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '(' => depth += 1,
            ')' => depth -= 1,
            ',' if depth == 0 => {
                entries.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    entries.push(&text[start..]);
    entries
}

/// Declared parser names and aliases, keyed by the name callers use.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ParserAliasSet {
    entries: BTreeMap<ParserName, ParserAlias>,
}

impl ParserAliasSet {
    pub fn parse(text: &str) -> Result<ParserAliasSet> {
        let mut entries = BTreeMap::new();
        if text.trim().is_empty() {
            return Ok(ParserAliasSet { entries });
        }
        for entry in split_entries(text) {
            let alias = ParserAlias::parse(entry)?;
            if entries.contains_key(alias.name()) {
                return Err(ProviderError::DuplicateName(alias.name().to_string()));
            }
            entries.insert(alias.name().clone(), alias);
        }
        Ok(ParserAliasSet { entries })
    }

    pub fn get(&self, name: &ParserName) -> Option<&ParserAlias> {
        self.entries.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParserAlias> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for ParserAlias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(target) = &self.target {
            write!(f, " {}", target)?;
        }
        if let Some(url) = &self.url {
            write!(f, " {}", url)?;
        }
        Ok(())
    }
}

impl fmt::Display for ParserAliasSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.iter().map(ParserAlias::to_string).collect();
        f.write_str(&parts.join(", "))
    }
}

/// A provider restricted to, and renamed by, an alias set.
pub struct AliasesParserProvider {
    aliases: ParserAliasSet,
    provider: Arc<dyn SpreadsheetParserProvider>,
    infos: ParserInfoSet,
}

impl AliasesParserProvider {
    /// Fails when an entry names a parser `provider` does not offer.
    pub fn new(
        aliases: ParserAliasSet,
        provider: Arc<dyn SpreadsheetParserProvider>,
    ) -> Result<AliasesParserProvider> {
        let offered = provider.spreadsheet_parser_infos();
        let mut infos = ParserInfoSet::new();

        for alias in aliases.iter() {
            let Some(target) = offered.get(alias.target_name()) else {
                return Err(ProviderError::MissingTarget {
                    alias: alias.name().to_string(),
                    target: alias.target_name().to_string(),
                });
            };
            let info = match alias.url() {
                Some(url) => ParserInfo::new(url, alias.name().clone())?,
                None => target.renamed(alias.name().clone()),
            };
            infos.insert(info);
        }

        Ok(AliasesParserProvider {
            aliases,
            provider,
            infos,
        })
    }

    pub fn aliases(&self) -> &ParserAliasSet {
        &self.aliases
    }

    fn entry(&self, name: &ParserName) -> Result<&ParserAlias> {
        self.aliases
            .get(name)
            .ok_or_else(|| ProviderError::UnknownParser(name.to_string()))
    }
}

impl SpreadsheetParserProvider for AliasesParserProvider {
    fn spreadsheet_parser(&self, selector: &ParserSelector) -> Result<Arc<dyn SpreadsheetParser>> {
        let alias = self.entry(selector.name())?;
        match alias.target() {
            None => self.provider.spreadsheet_parser(selector),
            Some(target) if alias.has_bound_values() => {
                debug!(alias = %alias.name(), %target, "using bound selector");
                self.provider.spreadsheet_parser(target)
            }
            Some(target) => {
                let renamed = selector.renamed(target.name().clone());
                debug!(alias = %alias.name(), selector = %renamed, "renaming selector");
                self.provider.spreadsheet_parser(&renamed)
            }
        }
    }

    fn spreadsheet_parser_by_name(
        &self,
        name: &ParserName,
        values: &[Value],
    ) -> Result<Arc<dyn SpreadsheetParser>> {
        let alias = self.entry(name)?;
        match alias.target() {
            None => self.provider.spreadsheet_parser_by_name(name, values),
            Some(target) if alias.has_bound_values() => {
                debug!(alias = %alias.name(), %target, "ignoring caller values");
                self.provider
                    .spreadsheet_parser_by_name(target.name(), &target.values()?)
            }
            Some(target) => self.provider.spreadsheet_parser_by_name(target.name(), values),
        }
    }

    fn spreadsheet_parser_infos(&self) -> ParserInfoSet {
        self.infos.clone()
    }
}
