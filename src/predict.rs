//src/predict.rs

use std::collections::BTreeMap;

use ahash::AHashMap;
use rayon::prelude::*;

use crate::error::SerotypeError;
use crate::types::{
    gene_partner, AlignmentHit, AlleleMap, AnnotatedHit, Antigen, AntigenInfo, GenomePrediction,
    TRACKED_GENES,
};

/// One ranked piece of evidence for a genome: a deduplicated
/// (gene, serotype) pairing backed by its best-scoring hit.
#[derive(Debug, Clone)]
struct Candidate {
    gene: String,
    serotype: String,
    score: f64,
}

/// Left-joins hits to catalog entries and extracts the genome name from the
/// pipe-delimited subject id (second field). A subject id without that field
/// means the aligner's subject naming convention itself is broken, so the
/// whole run aborts rather than skipping the row.
pub fn annotate_hits(
    hits: Vec<AlignmentHit>,
    alleles: &AlleleMap,
) -> Result<Vec<AnnotatedHit>, SerotypeError> {
    hits.into_iter()
        .map(|hit| {
            let genome_name = genome_name_of(&hit.subject_id)?;
            let entry = alleles.get(&hit.query_id);
            Ok(AnnotatedHit {
                genome_name,
                serotype: entry.and_then(|e| e.serotype.clone()),
                gene: entry.and_then(|e| e.gene.clone()),
                description: entry.and_then(|e| e.description.clone()),
                hit,
            })
        })
        .collect()
}

fn genome_name_of(subject_id: &str) -> Result<String, SerotypeError> {
    subject_id
        .split('|')
        .nth(1)
        .map(str::to_string)
        .ok_or_else(|| SerotypeError::MalformedSubjectId {
            subject_id: subject_id.to_string(),
        })
}

/// Ranks a genome's evidence: the best hit per distinct (gene, serotype)
/// pair, ordered by descending score. Hits without both a catalog gene and
/// serotype cannot support a call and are dropped here.
fn rank_candidates(partition: &[&AnnotatedHit]) -> Vec<Candidate> {
    let mut candidates: Vec<Candidate> = partition
        .iter()
        .filter_map(|h| match (&h.gene, &h.serotype) {
            (Some(gene), Some(serotype)) => Some(Candidate {
                gene: gene.clone(),
                serotype: serotype.clone(),
                score: h.hit.score,
            }),
            _ => None,
        })
        .collect();

    // Descending (gene, serotype, score) puts the best-scoring row first
    // within each (gene, serotype) run, so the dedup keeps it.
    candidates.sort_by(|a, b| {
        b.gene
            .cmp(&a.gene)
            .then_with(|| b.serotype.cmp(&a.serotype))
            .then_with(|| b.score.total_cmp(&a.score))
    });
    candidates.dedup_by(|next, first| next.gene == first.gene && next.serotype == first.serotype);

    // Evidence-evaluation order: strongest first. The sort is stable, so
    // equal scores keep the (gene, serotype)-descending order from above.
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
    candidates
}

/// Resolves one antigen class over the ranked candidates. Returns the locked
/// serotype (if any) and the info outcome observed along the way.
///
/// Evidence is walked strongest-first. Pair-constrained genes only lock once
/// their partner gene has pooled the same serotype string; unconstrained
/// genes lock immediately. The pool is scoped to this pass and discarded.
fn resolve_antigen(
    antigen: Antigen,
    candidates: &[Candidate],
) -> (Option<String>, Option<AntigenInfo>) {
    let mut genes_pool: AHashMap<&str, Vec<&str>> = AHashMap::new();
    let mut info = None;

    for candidate in candidates {
        genes_pool
            .entry(candidate.gene.as_str())
            .or_default()
            .push(candidate.serotype.as_str());

        if !antigen.matches(&candidate.serotype) {
            continue;
        }

        if let Some(partner) = gene_partner(&candidate.gene) {
            info = Some(AntigenInfo::OnlyUnpairedAlignmentFound);
            let paired = genes_pool
                .get(partner)
                .map(|pool| pool.contains(&candidate.serotype.as_str()))
                .unwrap_or(false);
            if !paired {
                continue;
            }
        }

        return (
            Some(candidate.serotype.clone()),
            Some(AntigenInfo::AlignmentFound),
        );
    }

    (None, info)
}

/// Prediction for one genome partition: rank the evidence, resolve O and H
/// independently, and record which tracked genes showed any candidate.
fn predict_genome(partition: &[&AnnotatedHit]) -> GenomePrediction {
    let candidates = rank_candidates(partition);

    let (o_prediction, o_info) = resolve_antigen(Antigen::O, &candidates);
    let (h_prediction, h_info) = resolve_antigen(Antigen::H, &candidates);

    let observed_genes = TRACKED_GENES
        .iter()
        .filter(|gene| candidates.iter().any(|c| c.gene == **gene))
        .map(|gene| gene.to_string())
        .collect();

    GenomePrediction {
        o_prediction,
        o_info,
        h_prediction,
        h_info,
        observed_genes,
    }
}

/// Runs serotype prediction for every genome observed in `hits` and
/// reconciles against `expected_genomes`, so genomes the aligner never
/// reported still get a record.
pub fn predict(
    hits: Vec<AlignmentHit>,
    alleles: &AlleleMap,
    expected_genomes: &[String],
) -> Result<BTreeMap<String, GenomePrediction>, SerotypeError> {
    let annotated = annotate_hits(hits, alleles)?;
    Ok(predict_annotated(&annotated, expected_genomes))
}

/// Prediction over already-annotated hits: partition by genome, resolve each
/// partition independently (in parallel; partitions share nothing but the
/// read-only gene-pair table), then reconcile.
pub fn predict_annotated(
    annotated: &[AnnotatedHit],
    expected_genomes: &[String],
) -> BTreeMap<String, GenomePrediction> {
    let mut partitions: AHashMap<&str, Vec<&AnnotatedHit>> = AHashMap::new();
    for hit in annotated {
        partitions
            .entry(hit.genome_name.as_str())
            .or_default()
            .push(hit);
    }
    log::debug!("Resolving {} genome partition(s)", partitions.len());

    let mut predictions: BTreeMap<String, GenomePrediction> = partitions
        .par_iter()
        .map(|(genome, partition)| ((*genome).to_string(), predict_genome(partition)))
        .collect();

    reconcile(&mut predictions, expected_genomes);
    predictions
}

/// Fills in the genomes the aligner never reported and defaults any unset
/// info field to "No alignment found". Safe to run repeatedly: an already
/// reconciled result set is left unchanged.
pub fn reconcile(
    predictions: &mut BTreeMap<String, GenomePrediction>,
    expected_genomes: &[String],
) {
    for genome in expected_genomes {
        predictions.entry(genome.clone()).or_default();
    }
    for prediction in predictions.values_mut() {
        prediction.o_info.get_or_insert(AntigenInfo::NoAlignmentFound);
        prediction.h_info.get_or_insert(AntigenInfo::NoAlignmentFound);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AlleleEntry;

    fn hit(query_id: &str, subject_id: &str, pident: f64, qcov: f64) -> AlignmentHit {
        AlignmentHit {
            query_id: query_id.to_string(),
            query_length: 1000,
            subject_id: subject_id.to_string(),
            alignment_length: 1000,
            percent_identity: pident,
            subject_start: 1,
            subject_end: 1000,
            subject_frame: 1,
            query_coverage_percent: qcov,
            score: pident * qcov / 10000.0,
        }
    }

    fn catalog(entries: &[(&str, &str, &str)]) -> AlleleMap {
        entries
            .iter()
            .map(|(name, serotype, gene)| {
                (
                    name.to_string(),
                    AlleleEntry {
                        name: name.to_string(),
                        antigen_group: serotype.to_string(),
                        serotype: Some(serotype.to_string()),
                        gene: Some(gene.to_string()),
                        description: None,
                    },
                )
            })
            .collect()
    }

    #[test]
    fn lone_pair_gene_stays_unpaired() {
        let alleles = catalog(&[("wzx-O26", "O26", "wzx")]);
        let hits = vec![hit("wzx-O26", "lcl|G1|c1", 100.0, 100.0)];
        let preds = predict(hits, &alleles, &[]).unwrap();
        let p = &preds["G1"];
        assert!(p.o_prediction.is_none());
        assert_eq!(p.o_info, Some(AntigenInfo::OnlyUnpairedAlignmentFound));
    }

    #[test]
    fn agreeing_pair_locks_the_call() {
        let alleles = catalog(&[("wzx-O26", "O26", "wzx"), ("wzy-O26", "O26", "wzy")]);
        let hits = vec![
            hit("wzx-O26", "lcl|G1|c1", 100.0, 100.0),
            hit("wzy-O26", "lcl|G1|c1", 99.0, 100.0),
        ];
        let preds = predict(hits, &alleles, &[]).unwrap();
        let p = &preds["G1"];
        assert_eq!(p.o_prediction.as_deref(), Some("O26"));
        assert_eq!(p.o_info, Some(AntigenInfo::AlignmentFound));
    }

    #[test]
    fn disagreeing_pair_stays_unpaired() {
        let alleles = catalog(&[("wzx-O26", "O26", "wzx"), ("wzy-O103", "O103", "wzy")]);
        let hits = vec![
            hit("wzx-O26", "lcl|G1|c1", 100.0, 100.0),
            hit("wzy-O103", "lcl|G1|c1", 99.0, 100.0),
        ];
        let preds = predict(hits, &alleles, &[]).unwrap();
        let p = &preds["G1"];
        assert!(p.o_prediction.is_none());
        assert_eq!(p.o_info, Some(AntigenInfo::OnlyUnpairedAlignmentFound));
    }

    #[test]
    fn unconstrained_gene_locks_alone() {
        let alleles = catalog(&[("fliC-H11", "H11", "fliC")]);
        let hits = vec![hit("fliC-H11", "lcl|G1|c1", 100.0, 100.0)];
        let preds = predict(hits, &alleles, &[]).unwrap();
        let p = &preds["G1"];
        assert_eq!(p.h_prediction.as_deref(), Some("H11"));
        assert_eq!(p.h_info, Some(AntigenInfo::AlignmentFound));
        // No O-class evidence at all for this genome.
        assert!(p.o_prediction.is_none());
        assert_eq!(p.o_info, Some(AntigenInfo::NoAlignmentFound));
    }

    #[test]
    fn antigen_classes_resolve_independently() {
        let alleles = catalog(&[
            ("wzx-O26", "O26", "wzx"),
            ("wzy-O26", "O26", "wzy"),
            ("fliC-H11", "H11", "fliC"),
        ]);
        let hits = vec![
            hit("wzx-O26", "lcl|G1|c1", 100.0, 100.0),
            hit("wzy-O26", "lcl|G1|c1", 99.0, 100.0),
            hit("fliC-H11", "lcl|G1|c2", 98.0, 100.0),
        ];
        let preds = predict(hits, &alleles, &[]).unwrap();
        let p = &preds["G1"];
        assert_eq!(p.o_prediction.as_deref(), Some("O26"));
        assert_eq!(p.h_prediction.as_deref(), Some("H11"));
    }

    #[test]
    fn dedup_keeps_best_hit_per_gene_serotype() {
        let alleles = catalog(&[("wzx-O26", "O26", "wzx")]);
        let hits = vec![
            hit("wzx-O26", "lcl|G1|c1", 90.0, 100.0),
            hit("wzx-O26", "lcl|G1|c2", 100.0, 100.0),
        ];
        let annotated = annotate_hits(hits, &alleles).unwrap();
        let refs: Vec<&AnnotatedHit> = annotated.iter().collect();
        let candidates = rank_candidates(&refs);
        assert_eq!(candidates.len(), 1);
        assert!((candidates[0].score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn stronger_evidence_is_considered_first() {
        // The weaker fliC hit would lock H immediately; the stronger one must
        // win because candidates are walked in descending score order.
        let alleles = catalog(&[("fliC-H11", "H11", "fliC"), ("fliC-H7", "H7", "fliC")]);
        let hits = vec![
            hit("fliC-H7", "lcl|G1|c1", 80.0, 100.0),
            hit("fliC-H11", "lcl|G1|c1", 99.0, 100.0),
        ];
        let preds = predict(hits, &alleles, &[]).unwrap();
        assert_eq!(preds["G1"].h_prediction.as_deref(), Some("H11"));
    }

    #[test]
    fn unmatched_hits_still_define_the_genome() {
        // No catalog entry for the query: the genome gets a record, but no
        // antigen evidence exists.
        let alleles = catalog(&[]);
        let hits = vec![hit("mystery-allele", "lcl|G1|c1", 100.0, 100.0)];
        let preds = predict(hits, &alleles, &[]).unwrap();
        let p = &preds["G1"];
        assert!(p.o_prediction.is_none());
        assert_eq!(p.o_info, Some(AntigenInfo::NoAlignmentFound));
        assert_eq!(p.h_info, Some(AntigenInfo::NoAlignmentFound));
    }

    #[test]
    fn expected_genome_without_hits_gets_empty_record() {
        let alleles = catalog(&[]);
        let preds = predict(vec![], &alleles, &["G9".to_string()]).unwrap();
        let p = &preds["G9"];
        assert!(p.o_prediction.is_none());
        assert!(p.h_prediction.is_none());
        assert_eq!(p.o_info, Some(AntigenInfo::NoAlignmentFound));
        assert_eq!(p.h_info, Some(AntigenInfo::NoAlignmentFound));
    }

    #[test]
    fn subject_id_without_genome_field_is_fatal() {
        let alleles = catalog(&[("wzx-O26", "O26", "wzx")]);
        let hits = vec![hit("wzx-O26", "no_pipes_here", 100.0, 100.0)];
        assert!(matches!(
            predict(hits, &alleles, &[]),
            Err(SerotypeError::MalformedSubjectId { .. })
        ));
    }

    #[test]
    fn observed_genes_track_candidates_that_never_lock() {
        let alleles = catalog(&[("wzx-O26", "O26", "wzx"), ("fliC-H11", "H11", "fliC")]);
        let hits = vec![
            hit("wzx-O26", "lcl|G1|c1", 100.0, 100.0),
            hit("fliC-H11", "lcl|G1|c2", 99.0, 100.0),
        ];
        let preds = predict(hits, &alleles, &[]).unwrap();
        let p = &preds["G1"];
        // wzx never produced a call, but it was observed.
        assert!(p.observed_genes.contains("wzx"));
        assert!(p.observed_genes.contains("fliC"));
        assert!(!p.observed_genes.contains("wzy"));
    }

    #[test]
    fn repeated_runs_are_deterministic() {
        let alleles = catalog(&[
            ("wzx-O26", "O26", "wzx"),
            ("wzy-O26", "O26", "wzy"),
            ("wzx-O103", "O103", "wzx"),
            ("fliC-H11", "H11", "fliC"),
        ]);
        let make_hits = || {
            vec![
                hit("wzx-O26", "lcl|G1|c1", 99.0, 100.0),
                hit("wzy-O26", "lcl|G1|c1", 99.0, 100.0),
                hit("wzx-O103", "lcl|G1|c1", 99.0, 100.0),
                hit("fliC-H11", "lcl|G1|c2", 99.0, 100.0),
                hit("fliC-H11", "lcl|G2|c1", 97.0, 100.0),
            ]
        };
        let first = predict(make_hits(), &alleles, &[]).unwrap();
        for _ in 0..5 {
            assert_eq!(predict(make_hits(), &alleles, &[]).unwrap(), first);
        }
    }

    #[test]
    fn reconciliation_is_idempotent() {
        let alleles = catalog(&[("fliC-H11", "H11", "fliC")]);
        let expected = vec!["G1".to_string(), "G9".to_string()];
        let hits = vec![hit("fliC-H11", "lcl|G1|c1", 100.0, 100.0)];

        let mut preds = predict(hits, &alleles, &expected).unwrap();
        let once = preds.clone();
        reconcile(&mut preds, &expected);
        assert_eq!(preds, once);
    }
}
