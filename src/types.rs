//src/types.rs

use std::collections::BTreeSet;
use std::fmt;

use ahash::AHashMap;

/// A structured representation of one row of tabular BLAST output, in the
/// fixed 9-column order:
/// ```text
/// qseqid  qlen  sseqid  length  pident  sstart  send  sframe  qcovhsp
/// ```
#[derive(Debug, Clone)]
pub struct AlignmentHit {
    /// Identifier of the reference allele sequence used as the query.
    pub query_id: String,
    pub query_length: u64,
    /// Identifier of the genome/contig hit; pipe-delimited, the genome name
    /// is the second field.
    pub subject_id: String,
    pub alignment_length: u64,
    pub percent_identity: f64,
    pub subject_start: u64,
    pub subject_end: u64,
    pub subject_frame: i32,
    pub query_coverage_percent: f64,
    /// Combined quality metric: `pident * qcovhsp / 10000`.
    pub score: f64,
}

/// One allele record from the reference catalog, keyed by its unique name.
#[derive(Debug, Clone)]
pub struct AlleleEntry {
    pub name: String,
    /// Top-level catalog key the allele was filed under. Informational only;
    /// the entry's own serotype is authoritative.
    pub antigen_group: String,
    /// Serotype string such as "O26" or "H11"; first character is the
    /// antigen class.
    pub serotype: Option<String>,
    /// Biological gene this allele sequence represents, e.g. "wzx".
    pub gene: Option<String>,
    pub description: Option<String>,
}

/// Allele name -> catalog entry, the join key for annotating hits.
pub type AlleleMap = AHashMap<String, AlleleEntry>;

/// An alignment hit left-joined with its catalog entry, plus the genome name
/// extracted from the subject identifier. Hits without a catalog match keep
/// `None` join fields and cannot support a prediction.
#[derive(Debug, Clone)]
pub struct AnnotatedHit {
    pub hit: AlignmentHit,
    pub genome_name: String,
    pub serotype: Option<String>,
    pub gene: Option<String>,
    pub description: Option<String>,
}

/// The two antigen classes a serotype string can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Antigen {
    O,
    H,
}

impl Antigen {
    pub fn letter(self) -> char {
        match self {
            Antigen::O => 'O',
            Antigen::H => 'H',
        }
    }

    /// Whether `serotype` names a variant of this antigen class
    /// (first character, case-insensitive).
    pub fn matches(self, serotype: &str) -> bool {
        match serotype.chars().next() {
            Some(c) => c.eq_ignore_ascii_case(&self.letter()),
            None => false,
        }
    }
}

/// Outcome of one antigen-class resolution for one genome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AntigenInfo {
    /// A confident call was locked in.
    AlignmentFound,
    /// Only pair-constrained evidence without an agreeing partner was seen.
    OnlyUnpairedAlignmentFound,
    /// No usable evidence for this antigen class at all.
    NoAlignmentFound,
}

impl fmt::Display for AntigenInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AntigenInfo::AlignmentFound => "Alignment found",
            AntigenInfo::OnlyUnpairedAlignmentFound => "Only unpaired alignment found",
            AntigenInfo::NoAlignmentFound => "No alignment found",
        };
        f.write_str(s)
    }
}

/// Per-genome prediction record: one O call and one H call with provenance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenomePrediction {
    pub o_prediction: Option<String>,
    pub o_info: Option<AntigenInfo>,
    pub h_prediction: Option<String>,
    pub h_info: Option<AntigenInfo>,
    /// Tracked genes for which any candidate was seen, whether or not it
    /// contributed to the final call.
    pub observed_genes: BTreeSet<String>,
}

/// Genes whose alleles are only informative together with their partner:
/// both halves of the same molecular locus must agree on the serotype.
pub const GENE_PAIRS: [(&str, &str); 4] = [
    ("wzx", "wzy"),
    ("wzy", "wzx"),
    ("wzm", "wzt"),
    ("wzt", "wzm"),
];

/// Genes reported as presence flags in verbose output.
pub const TRACKED_GENES: [&str; 9] = [
    "wzx", "wzy", "wzm", "wzt", "fliC", "fllA", "flkA", "flmA", "flnA",
];

/// Partner gene for pair-constrained genes, `None` for the rest.
pub fn gene_partner(gene: &str) -> Option<&'static str> {
    GENE_PAIRS
        .iter()
        .find(|(g, _)| *g == gene)
        .map(|(_, partner)| *partner)
}
