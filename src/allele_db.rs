//src/allele_db.rs

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::Deserialize;

use crate::error::SerotypeError;
use crate::types::{AlleleEntry, AlleleMap};

/// On-disk shape of one catalog allele:
/// ```text
/// {"allele": "O26", "gene": "wzx", "desc": "..."}
/// ```
/// Missing fields stay absent; such entries cannot contribute a prediction.
#[derive(Debug, Deserialize)]
struct RawAllele {
    #[serde(rename = "allele")]
    serotype: Option<String>,
    gene: Option<String>,
    desc: Option<String>,
}

/// The full catalog: antigen group -> allele name -> allele record.
/// BTreeMap keeps the flattened entry order deterministic across runs,
/// independent of JSON key order.
type RawCatalog = BTreeMap<String, BTreeMap<String, RawAllele>>;

/// Loads the allele catalog and flattens it into an ordered entry list,
/// retaining the allele name as the join key. A document that is not the
/// expected nested mapping is a fatal configuration error.
pub fn read_allele_db<P: AsRef<Path>>(path: P) -> Result<Vec<AlleleEntry>, SerotypeError> {
    let f = File::open(path)?;
    let catalog: RawCatalog = serde_json::from_reader(BufReader::new(f))?;

    let mut entries = Vec::new();
    for (antigen_group, alleles) in catalog {
        for (name, raw) in alleles {
            entries.push(AlleleEntry {
                name,
                antigen_group: antigen_group.clone(),
                serotype: raw.serotype,
                gene: raw.gene,
                description: raw.desc,
            });
        }
    }

    if entries.is_empty() {
        log::info!("Allele catalog contains no entries");
    }
    Ok(entries)
}

/// Builds the allele-name lookup used to annotate hits. Allele names are
/// unique across the catalog; a duplicate is logged and the later entry wins.
pub fn build_allele_map(entries: &[AlleleEntry]) -> AlleleMap {
    let mut map = AlleleMap::with_capacity(entries.len());
    for entry in entries {
        if let Some(previous) = map.insert(entry.name.clone(), entry.clone()) {
            log::warn!(
                "Duplicate allele name {:?} (groups {:?} and {:?}); keeping the latter",
                entry.name,
                previous.antigen_group,
                entry.antigen_group
            );
        }
    }
    map
}
