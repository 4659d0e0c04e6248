// src/lib.rs
pub mod allele_db;
pub mod blast;
pub mod error;
pub mod predict;
pub mod types;

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt::Write as FmtWrite;
use std::path::Path;

use crate::allele_db::{build_allele_map, read_allele_db};
use crate::blast::read_blast_records;
use crate::error::SerotypeError;
use crate::predict::{annotate_hits, predict_annotated};
use crate::types::{AnnotatedHit, GenomePrediction, TRACKED_GENES};

/// Placeholder rendered for absent predictions, infos and gene flags.
const MISSING: &str = "-";

/// A struct to hold one serotyping run's results with minimal duplication:
/// structured data is stored once and report text is generated on demand.
pub struct SerotypeResults {
    /// Every hit after the catalog join, unmatched hits included. Kept for
    /// provenance; not consumed by the predictor output itself.
    pub annotated_hits: Vec<AnnotatedHit>,

    /// One record per genome, reconciled against the expected genome list.
    pub predictions: BTreeMap<String, GenomePrediction>,

    /// Whether per-gene presence columns are rendered in the predictions CSV.
    pub verbose: bool,
}

impl SerotypeResults {
    /// Generate the per-genome prediction report as CSV text, one row per
    /// genome in genome-name order. Absent values render as "-"; in verbose
    /// mode one presence column per tracked gene is appended.
    pub fn get_predictions_csv(&self) -> String {
        let mut output = String::new();
        output.push_str("index,O_prediction,O_info,H_prediction,H_info");
        if self.verbose {
            for gene in TRACKED_GENES {
                let _ = write!(output, ",{gene}");
            }
        }
        output.push('\n');

        for (genome, prediction) in &self.predictions {
            let _ = write!(
                output,
                "{},{},{},{},{}",
                csv_field(genome),
                prediction.o_prediction.as_deref().unwrap_or(MISSING),
                info_cell(prediction.o_info),
                prediction.h_prediction.as_deref().unwrap_or(MISSING),
                info_cell(prediction.h_info),
            );
            if self.verbose {
                for gene in TRACKED_GENES {
                    let flag = if prediction.observed_genes.contains(gene) {
                        "True"
                    } else {
                        MISSING
                    };
                    let _ = write!(output, ",{flag}");
                }
            }
            output.push('\n');
        }
        output
    }

    /// Generate the raw annotated-hit dump as CSV text: every post-join hit,
    /// unmatched ones included, for provenance and debugging.
    pub fn get_annotated_hits_csv(&self) -> String {
        let mut output = String::new();
        output.push_str(
            "qseqid,qlen,sseqid,length,pident,sstart,send,sframe,qcovhsp,score,\
             genome_name,serotype,gene,desc\n",
        );
        for annotated in &self.annotated_hits {
            let h = &annotated.hit;
            let _ = writeln!(
                output,
                "{},{},{},{},{},{},{},{},{},{},{},{},{},{}",
                csv_field(&h.query_id),
                h.query_length,
                csv_field(&h.subject_id),
                h.alignment_length,
                h.percent_identity,
                h.subject_start,
                h.subject_end,
                h.subject_frame,
                h.query_coverage_percent,
                h.score,
                csv_field(&annotated.genome_name),
                csv_field(annotated.serotype.as_deref().unwrap_or("")),
                csv_field(annotated.gene.as_deref().unwrap_or("")),
                csv_field(annotated.description.as_deref().unwrap_or("")),
            );
        }
        output
    }
}

fn info_cell(info: Option<crate::types::AntigenInfo>) -> String {
    match info {
        Some(info) => info.to_string(),
        None => MISSING.to_string(),
    }
}

/// Quote a CSV field only when its content requires it.
fn csv_field(value: &str) -> Cow<'_, str> {
    if value.contains([',', '"', '\n']) {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}

/// Run the whole serotyping pipeline over one aligner output file.
pub fn predict_serotypes<P: AsRef<Path>, Q: AsRef<Path>>(
    blast_output_path: P,
    allele_db_path: Q,
    expected_genomes: &[String],
    verbose: bool,
) -> Result<SerotypeResults, SerotypeError> {
    log::info!("Predicting serotype from alignment output");

    // 1. Load alignment hits
    let hits = read_blast_records(blast_output_path)?;

    // 2. Load the allele catalog and build the name lookup
    let entries = read_allele_db(allele_db_path)?;
    let alleles = build_allele_map(&entries);

    // 3. Join hits to alleles
    let annotated = annotate_hits(hits, &alleles)?;

    // 4. Resolve per-genome predictions and reconcile against the full list
    let predictions = predict_annotated(&annotated, expected_genomes);

    log::info!(
        "Serotype prediction completed for {} genome(s)",
        predictions.len()
    );

    Ok(SerotypeResults {
        annotated_hits: annotated,
        predictions,
        verbose,
    })
}
