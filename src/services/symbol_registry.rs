use std::collections::HashMap;

use diesel::pg::PgConnection;

use crate::models::NewCompany;
use crate::repositories::company;

#[derive(Debug, Clone, PartialEq)]
pub struct RegistryEntry {
    pub name: String,
    pub company_id: i32,
}

/// Ticker symbol → company id, first sighting wins.
///
/// Built once per ingestion run from `companies` and owned by the run's
/// coordinator. Write workers never see it; they receive rows that already
/// carry their company id.
#[derive(Debug)]
pub struct SymbolRegistry {
    entries: HashMap<String, RegistryEntry>,
    next_id: i32,
    pending: Vec<NewCompany>,
}

impl Default for SymbolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolRegistry {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            next_id: 1,
            pending: Vec::new(),
        }
    }

    /// Seed from persisted `(id, symbol, name)` triples.
    pub fn from_existing<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = (i32, String, String)>,
    {
        let mut registry = Self::new();
        for (company_id, symbol, name) in rows {
            registry.next_id = registry.next_id.max(company_id + 1);
            registry
                .entries
                .entry(symbol)
                .or_insert(RegistryEntry { name, company_id });
        }
        registry
    }

    pub fn load(conn: &mut PgConnection) -> Result<Self, diesel::result::Error> {
        let rows = company::list_registry_entries(conn)?;
        let registry = Self::from_existing(rows);
        tracing::debug!(
            "symbol registry loaded: {} companies, next id {}",
            registry.len(),
            registry.next_id
        );
        Ok(registry)
    }

    /// Company id for `symbol`, allocating one on first sight.
    ///
    /// For a known symbol the display name, market and PEA flag of this
    /// sighting are ignored.
    pub fn resolve(&mut self, symbol: &str, display_name: &str, market_id: i32, pea: bool) -> i32 {
        if let Some(entry) = self.entries.get(symbol) {
            return entry.company_id;
        }

        let company_id = self.next_id;
        self.next_id += 1;
        self.entries.insert(
            symbol.to_string(),
            RegistryEntry {
                name: display_name.to_string(),
                company_id,
            },
        );
        self.pending.push(NewCompany {
            id: company_id,
            name: display_name.to_string(),
            mid: market_id,
            symbol: symbol.to_string(),
            pea,
        });
        company_id
    }

    pub fn lookup(&self, symbol: &str) -> Option<&RegistryEntry> {
        self.entries.get(symbol)
    }

    /// Creation requests accumulated since the last call.
    pub fn take_pending(&mut self) -> Vec<NewCompany> {
        std::mem::take(&mut self.pending)
    }

    /// Forget companies that could not be persisted so no later row refers to
    /// an id missing from the store.
    pub fn discard(&mut self, failed: &[NewCompany]) {
        for company in failed {
            if matches!(self.entries.get(&company.symbol), Some(e) if e.company_id == company.id) {
                self.entries.remove(&company.symbol);
            }
        }
        if let Some(lowest) = failed.iter().map(|c| c.id).min() {
            let highest_kept = self.entries.values().map(|e| e.company_id).max().unwrap_or(0);
            self.next_id = lowest.min(self.next_id).max(highest_kept + 1);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
