use std::fs::File;
use std::io::{self, Cursor, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use sha2::{Digest, Sha256};
use tracing::info;

use carver::{get_chunker, ChunkKind, ChunkerParams};

const USAGE: &str = "usage: carve [PATH|-] [--params SPEC] [--seed N] [--sparse]\n\
    SPEC examples: buzhash,19,23,21,4095  fixed,4194304,512  fail,4096,RRER";

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("carve: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut path: Option<PathBuf> = None;
    let mut params = ChunkerParams::default();
    let mut sparse = false;
    let mut seed: Option<u32> = None;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--params" => {
                let spec = args.next().ok_or(USAGE)?;
                params = spec.parse()?;
            }
            "--seed" => {
                seed = Some(args.next().ok_or(USAGE)?.parse()?);
            }
            "--sparse" => sparse = true,
            "--help" | "-h" => {
                println!("{USAGE}");
                return Ok(());
            }
            _ if path.is_none() => path = Some(PathBuf::from(arg)),
            _ => return Err(USAGE.into()),
        }
    }
    params = params.with_sparse(sparse);
    if let Some(seed) = seed {
        params = params.with_seed(seed);
    }
    let mut chunker = get_chunker(params)?;

    let mut count = 0u64;
    let mut total_bytes = 0u64;
    let mut stdout = io::stdout().lock();
    let seconds;

    match path {
        Some(path) if path.as_os_str() != "-" => {
            let file = File::open(&path)?;
            info!(path = ?path, "chunking_file");
            let mut stream = chunker.chunkify(file);
            while let Some(chunk) = stream.next_chunk()? {
                count += 1;
                total_bytes += chunk.size;
                print_chunk(&mut stdout, chunk.kind, chunk.size, chunk.payload)?;
            }
            seconds = stream.chunking_seconds();
        }
        _ => {
            // Stdin is not seekable; buffer it so every variant can run.
            info!("chunking_stdin");
            let mut data = Vec::new();
            io::stdin().lock().read_to_end(&mut data)?;
            let mut stream = chunker.chunkify(Cursor::new(data));
            while let Some(chunk) = stream.next_chunk()? {
                count += 1;
                total_bytes += chunk.size;
                print_chunk(&mut stdout, chunk.kind, chunk.size, chunk.payload)?;
            }
            seconds = stream.chunking_seconds();
        }
    }

    let mb_per_sec = if seconds > 0.0 {
        (total_bytes as f64 / 1_000_000.0) / seconds
    } else {
        0.0
    };
    eprintln!("{total_bytes} bytes in {count} chunks, {seconds:.3}s chunking ({mb_per_sec:.2} MB/s)");
    Ok(())
}

fn print_chunk(
    out: &mut impl Write,
    kind: ChunkKind,
    size: u64,
    payload: Option<&[u8]>,
) -> io::Result<()> {
    match payload {
        Some(payload) => {
            let digest = Sha256::digest(payload);
            writeln!(out, "{}\t{}\t{}", kind.as_str(), size, hex::encode(digest))
        }
        None => writeln!(out, "{}\t{}\t-", kind.as_str(), size),
    }
}
