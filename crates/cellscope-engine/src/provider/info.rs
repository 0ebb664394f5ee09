//! Parser descriptions: a URL naming the implementation plus the name
//! callers use.

use std::collections::BTreeMap;
use std::fmt;

use super::error::{ProviderError, Result};
use super::selector::ParserName;

#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct ParserInfo {
    url: String,
    name: ParserName,
}

impl ParserInfo {
    pub fn new(url: &str, name: ParserName) -> Result<ParserInfo> {
        if !(url.starts_with("https://") || url.starts_with("http://")) || url.contains(' ') {
            return Err(ProviderError::InvalidUrl(url.to_string()));
        }
        Ok(ParserInfo {
            url: url.to_string(),
            name,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn name(&self) -> &ParserName {
        &self.name
    }

    /// The same implementation offered under another name.
    pub fn renamed(&self, name: ParserName) -> ParserInfo {
        ParserInfo {
            url: self.url.clone(),
            name,
        }
    }
}

impl fmt::Display for ParserInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.url, self.name)
    }
}

/// Parser infos keyed and ordered by name.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ParserInfoSet {
    infos: BTreeMap<ParserName, ParserInfo>,
}

impl ParserInfoSet {
    pub fn new() -> ParserInfoSet {
        ParserInfoSet::default()
    }

    /// Add an info, returning the one previously held under its name.
    pub fn insert(&mut self, info: ParserInfo) -> Option<ParserInfo> {
        self.infos.insert(info.name().clone(), info)
    }

    pub fn get(&self, name: &ParserName) -> Option<&ParserInfo> {
        self.infos.get(name)
    }

    pub fn contains(&self, name: &ParserName) -> bool {
        self.infos.contains_key(name)
    }

    /// The first info (by name) with this URL.
    pub fn by_url(&self, url: &str) -> Option<&ParserInfo> {
        self.infos.values().find(|info| info.url() == url)
    }

    pub fn names(&self) -> impl Iterator<Item = &ParserName> {
        self.infos.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParserInfo> {
        self.infos.values()
    }

    pub fn len(&self) -> usize {
        self.infos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }
}

impl FromIterator<ParserInfo> for ParserInfoSet {
    fn from_iter<I: IntoIterator<Item = ParserInfo>>(iter: I) -> Self {
        let mut set = ParserInfoSet::new();
        for info in iter {
            set.insert(info);
        }
        set
    }
}

impl fmt::Display for ParserInfoSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.iter().map(ParserInfo::to_string).collect();
        f.write_str(&parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(url: &str, name: &str) -> ParserInfo {
        ParserInfo::new(url, ParserName::new(name).unwrap()).unwrap()
    }

    #[test]
    fn test_rejects_non_http_urls() {
        let name = ParserName::new("text").unwrap();
        assert!(ParserInfo::new("ftp://example.com/text", name.clone()).is_err());
        assert!(ParserInfo::new("https://example.com/a b", name).is_err());
    }

    #[test]
    fn test_set_is_ordered_by_name() {
        let set: ParserInfoSet = [
            info("https://example.com/2", "zeta"),
            info("https://example.com/1", "alpha"),
        ]
        .into_iter()
        .collect();
        assert_eq!(
            set.to_string(),
            "https://example.com/1 alpha, https://example.com/2 zeta"
        );
        assert_eq!(
            set.by_url("https://example.com/2").map(|i| i.name().as_str()),
            Some("zeta")
        );
    }
}
