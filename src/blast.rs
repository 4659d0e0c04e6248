//src/blast.rs

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use flate2::read::MultiGzDecoder;

use crate::error::SerotypeError;
use crate::types::AlignmentHit;

/// Number of whitespace-separated columns a hit line must carry.
const BLAST_FIELD_COUNT: usize = 9;

/// Reads tabular BLAST output into alignment hits, in input order. Expects
/// `-outfmt "6 qseqid qlen sseqid length pident sstart send sframe qcovhsp"`
/// with no header line; files ending in `.gz` are decompressed on the fly.
///
/// An empty file is not an error. A line with missing or unparseable fields
/// aborts the whole load: the aligner's output format is trusted to be
/// uniform, so one bad line means the format itself is wrong.
pub fn read_blast_records<P: AsRef<Path>>(path: P) -> Result<Vec<AlignmentHit>, SerotypeError> {
    let path = path.as_ref();
    let f = File::open(path)?;

    let is_gz = path
        .extension()
        .map(|ext| ext == "gz")
        .unwrap_or(false);

    let reader: Box<dyn BufRead> = if is_gz {
        Box::new(BufReader::new(MultiGzDecoder::new(f)))
    } else {
        Box::new(BufReader::new(f))
    };

    let mut hits = Vec::new();
    for (idx, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }
        hits.push(parse_hit_line(&line, idx + 1)?);
    }

    if hits.is_empty() {
        log::info!("No hit found for this query");
    }
    Ok(hits)
}

fn parse_hit_line(line: &str, line_number: usize) -> Result<AlignmentHit, SerotypeError> {
    let malformed = || SerotypeError::MalformedAlignmentRecord {
        line_number,
        line: line.to_string(),
    };

    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < BLAST_FIELD_COUNT {
        return Err(malformed());
    }

    // Identity and coverage are passed through unvalidated; the aligner is
    // trusted for range.
    let percent_identity: f64 = fields[4].parse().map_err(|_| malformed())?;
    let query_coverage_percent: f64 = fields[8].parse().map_err(|_| malformed())?;

    Ok(AlignmentHit {
        query_id: fields[0].to_string(),
        query_length: fields[1].parse().map_err(|_| malformed())?,
        subject_id: fields[2].to_string(),
        alignment_length: fields[3].parse().map_err(|_| malformed())?,
        percent_identity,
        subject_start: fields[5].parse().map_err(|_| malformed())?,
        subject_end: fields[6].parse().map_err(|_| malformed())?,
        subject_frame: fields[7].parse().map_err(|_| malformed())?,
        query_coverage_percent,
        score: percent_identity * query_coverage_percent / 10000.0,
    })
}
