//! A union of providers dispatching by parser name.

use std::collections::HashMap;
use std::sync::Arc;

use super::error::{ProviderError, Result};
use super::info::ParserInfoSet;
use super::selector::{ParserName, ParserSelector};
use super::{SpreadsheetParser, SpreadsheetParserProvider};
use crate::engine::Value;

pub struct ParserProviderCollection {
    providers: Vec<Arc<dyn SpreadsheetParserProvider>>,
    /// Parser name to index into `providers`.
    owners: HashMap<ParserName, usize>,
    infos: ParserInfoSet,
}

impl ParserProviderCollection {
    /// Fails when two providers offer the same name.
    pub fn new(providers: Vec<Arc<dyn SpreadsheetParserProvider>>) -> Result<Self> {
        let mut owners = HashMap::new();
        let mut infos = ParserInfoSet::new();

        for (index, provider) in providers.iter().enumerate() {
            for info in provider.spreadsheet_parser_infos().iter() {
                if owners.insert(info.name().clone(), index).is_some() {
                    return Err(ProviderError::DuplicateName(info.name().to_string()));
                }
                infos.insert(info.clone());
            }
        }

        Ok(ParserProviderCollection {
            providers,
            owners,
            infos,
        })
    }

    fn owner(&self, name: &ParserName) -> Result<&Arc<dyn SpreadsheetParserProvider>> {
        self.owners
            .get(name)
            .and_then(|index| self.providers.get(*index))
            .ok_or_else(|| ProviderError::UnknownParser(name.to_string()))
    }
}

impl SpreadsheetParserProvider for ParserProviderCollection {
    fn spreadsheet_parser(&self, selector: &ParserSelector) -> Result<Arc<dyn SpreadsheetParser>> {
        self.owner(selector.name())?.spreadsheet_parser(selector)
    }

    fn spreadsheet_parser_by_name(
        &self,
        name: &ParserName,
        values: &[Value],
    ) -> Result<Arc<dyn SpreadsheetParser>> {
        self.owner(name)?.spreadsheet_parser_by_name(name, values)
    }

    fn spreadsheet_parser_infos(&self) -> ParserInfoSet {
        self.infos.clone()
    }
}
