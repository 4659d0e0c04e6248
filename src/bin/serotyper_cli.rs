use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::PathBuf;
use std::process::exit;

use serotyper_rs::predict_serotypes;

fn spinner(message: &str, color: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .tick_strings(&[
                "⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏",
            ])
            .template(&format!("{{spinner:.{color}}} {{msg}}"))
            .expect("Invalid spinner template"),
    );
    spinner.set_message(message.to_string());
    spinner
}

fn usage() -> ! {
    eprintln!(
        "usage: serotyper-rs <blast_output> <allele_db> \
         [--genomes <file>] [--out-dir <dir>] [--verbose]"
    );
    exit(2);
}

fn main() {
    env_logger::init();

    let mut positional: Vec<String> = Vec::new();
    let mut genomes_file: Option<PathBuf> = None;
    let mut out_dir = PathBuf::from(".");
    let mut verbose = false;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--genomes" => genomes_file = Some(PathBuf::from(args.next().unwrap_or_else(|| usage()))),
            "--out-dir" => out_dir = PathBuf::from(args.next().unwrap_or_else(|| usage())),
            "--verbose" => verbose = true,
            _ => positional.push(arg),
        }
    }
    if positional.len() != 2 {
        usage();
    }
    let blast_output = PathBuf::from(&positional[0]);
    let allele_db = PathBuf::from(&positional[1]);

    // 1. Expected genome list: an explicit file, or whatever the hits mention.
    let expected_genomes: Vec<String> = match &genomes_file {
        Some(path) => fs::read_to_string(path)
            .expect("Cannot read genome list")
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect(),
        None => Vec::new(),
    };

    // 2. Run the prediction pipeline
    let spinner_predict = spinner("Predicting serotypes...", "green");
    let results = predict_serotypes(&blast_output, &allele_db, &expected_genomes, verbose)
        .expect("Serotype prediction failed");
    spinner_predict.finish_with_message(format!(
        "Resolved {} genome(s).",
        results.predictions.len()
    ));

    // 3. Write report files
    let spinner_write = spinner("Writing output files...", "yellow");

    fs::write(
        out_dir.join("serotype_predictions.csv"),
        results.get_predictions_csv(),
    )
    .expect("Could not write serotype_predictions.csv");

    fs::write(
        out_dir.join("serotype_predictions_raw.csv"),
        results.get_annotated_hits_csv(),
    )
    .expect("Could not write serotype_predictions_raw.csv");

    spinner_write.finish_with_message("Output files created.");

    // 4. Report the outcome
    if results.predictions.is_empty() {
        log::info!("No prediction was made because no alignment was found");
    } else {
        log::info!("\n{}", results.get_predictions_csv());
    }
}
