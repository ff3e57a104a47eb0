use tern_core::searcher::{read_queries, Algorithm, Searcher};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    let mut index_dir: Option<String> = None;
    let mut query_path: Option<String> = None;
    let mut output_path: Option<String> = None;
    let mut hits: Option<usize> = None;
    let mut algorithm_name: Option<String> = None;
    let mut docno_mapping: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-index" => {
                i += 1;
                index_dir = Some(required_value(&args, i, "-index"));
            }
            "-query" => {
                i += 1;
                query_path = Some(required_value(&args, i, "-query"));
            }
            "-output" => {
                i += 1;
                output_path = Some(required_value(&args, i, "-output"));
            }
            "-hits" => {
                i += 1;
                let value = required_value(&args, i, "-hits");
                match value.parse() {
                    Ok(v) => hits = Some(v),
                    Err(_) => {
                        eprintln!("-hits needs a numeric value, got {:?}", value);
                        std::process::exit(1);
                    }
                }
            }
            "-algorithm" => {
                i += 1;
                algorithm_name = Some(required_value(&args, i, "-algorithm"));
            }
            "-docnoMapping" => {
                i += 1;
                docno_mapping = Some(required_value(&args, i, "-docnoMapping"));
            }
            "-features" | "-model" => {
                let flag = args[i].clone();
                i += 1;
                let _ = required_value(&args, i, &flag);
                eprintln!("warning: {} is not supported here, ignored", flag);
            }
            other => {
                eprintln!("unknown flag: {}", other);
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let index_dir = require(index_dir, "-index");
    let query_path = require(query_path, "-query");
    let algorithm_name = require(algorithm_name, "-algorithm");
    let algorithm = match Algorithm::parse(&algorithm_name) {
        Some(a) => a,
        None => {
            eprintln!(
                "Invalid algorithm (Options: SvS | WAND | MBWAND | BWAND_OR | BWAND_AND)"
            );
            std::process::exit(1);
        }
    };

    let searcher = match Searcher::open(&PathBuf::from(&index_dir)) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("cannot open index at {}: {}", index_dir, e);
            std::process::exit(1);
        }
    };

    let queries = match read_queries(&PathBuf::from(&query_path)) {
        Ok(q) => q,
        Err(e) => {
            eprintln!("cannot read queries from {}: {}", query_path, e);
            std::process::exit(1);
        }
    };

    // Docid to docno translation for TREC output; docids index the lines.
    let docnos: Option<Vec<String>> = docno_mapping.map(|path| match fs::read_to_string(&path) {
        Ok(text) => text.lines().map(|l| l.to_string()).collect(),
        Err(e) => {
            eprintln!("cannot read docno mapping {}: {}", path, e);
            std::process::exit(1);
        }
    });

    let mut output: Option<BufWriter<fs::File>> = output_path.map(|path| {
        match fs::File::create(&path) {
            Ok(f) => BufWriter::new(f),
            Err(e) => {
                eprintln!("cannot create output {}: {}", path, e);
                std::process::exit(1);
            }
        }
    });

    for (qid, terms) in &queries {
        let start = Instant::now();
        let results = match searcher.evaluate(terms, algorithm, hits) {
            Ok(r) => r,
            Err(e) => {
                eprintln!("query {}: {}", qid, e);
                std::process::exit(1);
            }
        };
        let elapsed_us = start.elapsed().as_micros();

        if results.is_empty() {
            // Every term dropped or nothing matched; skip silently.
            eprintln!("{:10} us, length: {}", elapsed_us, terms.len());
            continue;
        }

        if let Some(out) = output.as_mut() {
            let status = write_results(out, *qid, &results, docnos.as_deref());
            if let Err(e) = status {
                eprintln!("cannot write results: {}", e);
                std::process::exit(1);
            }
        }
        eprintln!("{:10} us, length: {}", elapsed_us, terms.len());
    }

    if let Some(out) = output.as_mut() {
        if let Err(e) = out.flush() {
            eprintln!("cannot write results: {}", e);
            std::process::exit(1);
        }
    }
}

/// Plain output is `"<qid> <docid>"` per hit; with a docno mapping, hits go
/// out in TREC format `"<qid> Q0 <docno> <rank> <score> tern"`.
fn write_results(
    out: &mut BufWriter<fs::File>,
    qid: u32,
    results: &[tern_core::searcher::SearchHit],
    docnos: Option<&[String]>,
) -> std::io::Result<()> {
    for (rank, hit) in results.iter().enumerate() {
        match docnos {
            Some(mapping) => {
                let docno = mapping
                    .get(hit.docid as usize)
                    .cloned()
                    .unwrap_or_else(|| hit.docid.to_string());
                writeln!(
                    out,
                    "{} Q0 {} {} {} tern",
                    qid,
                    docno,
                    rank + 1,
                    hit.score
                )?;
            }
            None => writeln!(out, "{} {}", qid, hit.docid)?,
        }
    }
    Ok(())
}

fn require(value: Option<String>, flag: &str) -> String {
    match value {
        Some(v) => v,
        None => {
            eprintln!("{} is required", flag);
            print_usage();
            std::process::exit(1);
        }
    }
}

fn required_value(args: &[String], i: usize, flag: &str) -> String {
    match args.get(i) {
        Some(v) => v.clone(),
        None => {
            eprintln!("{} needs a value", flag);
            print_usage();
            std::process::exit(1);
        }
    }
}

fn print_usage() {
    eprintln!("Usage: retrieval -index <dir> -query <file> -algorithm <name>");
    eprintln!("                 [-output <file>] [-hits <k>] [-docnoMapping <file>]");
    eprintln!();
    eprintln!("Algorithms: SvS | WAND | MBWAND | BWAND_OR | BWAND_AND");
    eprintln!("Query file: first line holds the query count, then per query");
    eprintln!("\"<qid> <qlen> <tok1> ... <toklen>\".");
}
