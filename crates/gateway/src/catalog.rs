//! Knowledge-source catalog loaded from `sites_data.csv`.
//!
//! Each row names a site, the domain (topic) it belongs to, and a short
//! description. Rows are grouped by domain in order of first appearance;
//! the groups drive both the system prompt and the agent's answerable
//! scope.

use std::io::Read;
use std::path::Path;

use dq_domain::error::{Error, Result};

const REQUIRED_COLUMNS: [&str; 3] = ["site", "domain", "description"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub site: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainGroup {
    pub domain: String,
    pub sources: Vec<Source>,
}

/// Read-only after load.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    groups: Vec<DomainGroup>,
}

impl Catalog {
    pub fn load(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .map_err(|e| Error::Catalog(format!("cannot open {}: {e}", path.display())))?;
        let catalog = Self::from_reader(file)?;
        tracing::info!(
            path = %path.display(),
            sites = catalog.site_count(),
            domains = catalog.groups.len(),
            "catalog loaded"
        );
        Ok(catalog)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = rdr
            .headers()
            .map_err(|e| Error::Catalog(e.to_string()))?
            .clone();
        let index_of = |name: &str| headers.iter().position(|h| h == name);

        let missing: Vec<&str> = REQUIRED_COLUMNS
            .iter()
            .copied()
            .filter(|c| index_of(c).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(Error::Catalog(format!(
                "Missing required columns: {}",
                python_list(&missing)
            )));
        }
        // All three are present past the check above.
        let (site_ix, domain_ix, desc_ix) = (
            index_of("site").unwrap_or_default(),
            index_of("domain").unwrap_or_default(),
            index_of("description").unwrap_or_default(),
        );

        let mut groups: Vec<DomainGroup> = Vec::new();
        for (n, record) in rdr.records().enumerate() {
            let record = record.map_err(|e| Error::Catalog(e.to_string()))?;
            // Header is line 1.
            let line = n + 2;
            let cell = |ix: usize, column: &str| -> Result<String> {
                match record.get(ix) {
                    Some(v) if !v.is_empty() => Ok(v.to_string()),
                    _ => Err(Error::Catalog(format!("line {line}: empty '{column}' value"))),
                }
            };
            let site = cell(site_ix, "site")?;
            let domain = cell(domain_ix, "domain")?;
            let description = cell(desc_ix, "description")?;

            let source = Source { site, description };
            match groups.iter_mut().find(|g| g.domain == domain) {
                Some(group) => group.sources.push(source),
                None => groups.push(DomainGroup {
                    domain,
                    sources: vec![source],
                }),
            }
        }

        Ok(Self { groups })
    }

    pub fn groups(&self) -> &[DomainGroup] {
        &self.groups
    }

    pub fn domains(&self) -> Vec<&str> {
        self.groups.iter().map(|g| g.domain.as_str()).collect()
    }

    pub fn site_count(&self) -> usize {
        self.groups.iter().map(|g| g.sources.len()).sum()
    }

    /// `## domain` sections listing `- site: description` entries.
    pub fn knowledge_markdown(&self) -> String {
        let mut out = String::new();
        for group in &self.groups {
            out.push_str(&format!("\n## {}\n\n", group.domain));
            for source in &group.sources {
                out.push_str(&format!("- {}: {}\n", source.site, source.description));
            }
            out.push('\n');
        }
        out
    }
}

/// `['a', 'b']`, the list notation the prompt and errors use.
pub fn python_list<S: AsRef<str>>(items: &[S]) -> String {
    let quoted: Vec<String> = items.iter().map(|s| format!("'{}'", s.as_ref())).collect();
    format!("[{}]", quoted.join(", "))
}
