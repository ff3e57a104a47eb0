use flate2::read::GzDecoder;
use tern_core::codec::BLOCK_SIZE;
use tern_core::index::{PostingsMode, DF_CUTOFF};
use tern_core::index_writer::{IndexWriter, WriterConfig};
use tern_core::pool::BloomConfig;
use std::fs;
use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;
use std::time::Instant;

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    let mut index_dir: Option<String> = None;
    let mut max_blocks: usize = 1;
    let mut mode = PostingsMode::NonPositional;
    let mut bloom_enabled = false;
    let mut nb_hash: u32 = 0;
    let mut bits_per_element: u32 = 0;
    let mut reverse = false;
    let mut vectors = false;
    let mut df_cutoff = DF_CUTOFF;
    let mut inputs: Vec<String> = Vec::new();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-index" => {
                i += 1;
                index_dir = Some(required_value(&args, i, "-index"));
            }
            "-mb" => {
                i += 1;
                max_blocks = parse_number(&required_value(&args, i, "-mb"), "-mb");
            }
            "-positional" => mode = PostingsMode::Positional,
            "-tf" => mode = PostingsMode::TfOnly,
            "-bloom" => bloom_enabled = true,
            "-k" => {
                i += 1;
                nb_hash = parse_number(&required_value(&args, i, "-k"), "-k") as u32;
            }
            "-r" => {
                i += 1;
                bits_per_element = parse_number(&required_value(&args, i, "-r"), "-r") as u32;
            }
            "-reverse" => reverse = true,
            "-vectors" => vectors = true,
            "-dfCutoff" => {
                i += 1;
                df_cutoff = parse_number(&required_value(&args, i, "-dfCutoff"), "-dfCutoff");
            }
            "-input" => {
                // Everything after -input is an input file.
                inputs.extend(args[i + 1..].iter().cloned());
                i = args.len();
            }
            other => {
                eprintln!("unknown flag: {}", other);
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let index_dir = match index_dir {
        Some(dir) => PathBuf::from(dir),
        None => {
            eprintln!("-index is required");
            print_usage();
            std::process::exit(1);
        }
    };
    if inputs.is_empty() {
        eprintln!("-input is required");
        print_usage();
        std::process::exit(1);
    }
    if bloom_enabled && (nb_hash == 0 || bits_per_element == 0) {
        eprintln!("-bloom needs -k <nbHash> and -r <bitsPerElement>");
        std::process::exit(1);
    }

    let config = WriterConfig {
        mode,
        reverse,
        bloom: bloom_enabled.then_some(BloomConfig {
            nb_hash,
            bits_per_element,
        }),
        document_vectors: vectors,
        df_cutoff,
        max_blocks: max_blocks * BLOCK_SIZE,
        ..WriterConfig::default()
    };
    let mut writer = IndexWriter::new(config);

    let start = Instant::now();
    for (n, input) in inputs.iter().enumerate() {
        let reader = match open_input(input) {
            Ok(r) => r,
            Err(e) => {
                eprintln!("cannot open input {}: {}", input, e);
                std::process::exit(1);
            }
        };
        for line in reader.lines() {
            let line = match line {
                Ok(l) => l,
                Err(e) => {
                    eprintln!("read error in {}: {}", input, e);
                    std::process::exit(1);
                }
            };
            if line.is_empty() {
                continue;
            }
            if let Err(e) = writer.process_line(&line) {
                eprintln!("{}: {}", input, e);
                std::process::exit(1);
            }
        }
        eprintln!(
            "Files processed: {} Time: {:.0}s",
            n + 1,
            start.elapsed().as_secs_f64()
        );
    }

    let total_docs = writer.doc_count();
    let index = writer.finish();
    if let Err(e) = index.write(&index_dir) {
        eprintln!("cannot write index to {}: {}", index_dir.display(), e);
        std::process::exit(1);
    }

    let elapsed = start.elapsed().as_secs_f64();
    eprintln!();
    eprintln!("Documents indexed: {}", total_docs);
    eprintln!("Terms:             {}", index.dictionary.term_count());
    eprintln!("Time:              {:.2}s", elapsed);
    if elapsed > 0.0 {
        eprintln!("Throughput:        {:.0} docs/sec", total_docs as f64 / elapsed);
    }
}

/// Open a document file; names ending in .gz are decompressed on the fly.
fn open_input(path: &str) -> std::io::Result<Box<dyn BufRead>> {
    let file = fs::File::open(path)?;
    let reader: Box<dyn Read> = if path.ends_with(".gz") {
        Box::new(GzDecoder::new(file))
    } else {
        Box::new(file)
    };
    Ok(Box::new(BufReader::with_capacity(1 << 20, reader)))
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

fn parse_number(value: &str, flag: &str) -> usize {
    match value.parse() {
        Ok(v) => v,
        Err(_) => {
            eprintln!("{} needs a numeric value, got {:?}", flag, value);
            std::process::exit(1);
        }
    }
}

fn print_usage() {
    eprintln!("Usage: indexer -index <dir> [-mb <blocks>] [-positional|-tf]");
    eprintln!("               [-bloom -k <nbHash> -r <bitsPerElement>] [-reverse]");
    eprintln!("               [-vectors] [-dfCutoff <n>] -input <files...>");
    eprintln!();
    eprintln!("Input files hold one document per line: \"<docid>\\t<tok1> <tok2> ...\";");
    eprintln!("files ending in .gz are read through gzip.");
}
