//! fcrypt: file encryption container CLI
//!
//! Commands:
//!   encrypt --from PATH --to PATH --key HEX [--overwrite]
//!   decrypt --from PATH --to PATH --key HEX [--overwrite]
//!
//! The key is a 16-byte AES-GCM-128 slot key in hex. Exit codes: 0 on
//! success, 2 for a malformed key, 1 for anything else. A failed run
//! removes the partially written output file.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use zeroize::Zeroizing;

use fcrypt_container::{ContainerFile, PayloadAlgorithm, SlotAlgorithm};

/// Buffering for plaintext I/O (4 pages).
const IO_BUF_SIZE: usize = 4096 * 4;

/// Exit code for a key that does not decode to the right length.
const EXIT_BAD_KEY: i32 = 2;

#[derive(Parser)]
#[command(
    name = "fcrypt",
    version,
    about = "A simple file encryption tool",
    long_about = "fcrypt encrypts files into a multi-slot container: any of the \
                  registered slot keys can later decrypt the payload."
)]
struct Cli {
    /// Increase log verbosity (-v: debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt a file into a new container
    Encrypt(TransferArgs),

    /// Decrypt a container back into a plain file
    Decrypt(TransferArgs),
}

#[derive(Args)]
struct TransferArgs {
    /// Input file path
    #[arg(long, short = 'f')]
    from: PathBuf,

    /// Output file path
    #[arg(long, short = 't')]
    to: PathBuf,

    /// Slot key as lowercase hex (16 bytes for AES-GCM-128)
    #[arg(long, short = 'k')]
    key: String,

    /// Overwrite the output file if it exists
    #[arg(long, short = 'o')]
    overwrite: bool,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match &cli.command {
        Commands::Encrypt(args) => run_transfer(args, cmd_encrypt),
        Commands::Decrypt(args) => run_transfer(args, cmd_decrypt),
    };

    if let Err(err) = result {
        eprintln!("fcrypt: {err:#}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let default = if verbose > 0 { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run_transfer(args: &TransferArgs, cmd: fn(&TransferArgs, &[u8]) -> Result<u64>) -> Result<()> {
    let key = parse_slot_key(&args.key);
    validate_paths(args)?;

    let bytes = cmd(args, &key)?;
    println!(
        "{} → {} ({bytes} bytes)",
        args.from.display(),
        args.to.display()
    );
    Ok(())
}

/// Decode and validate the hex slot key; a malformed key exits with a
/// dedicated status so scripts can tell it from I/O failures.
fn parse_slot_key(hex_key: &str) -> Zeroizing<Vec<u8>> {
    let expected = SlotAlgorithm::AesGcm128.key_size();
    match hex::decode(hex_key) {
        Ok(key) if key.len() == expected => Zeroizing::new(key),
        Ok(_) => {
            eprintln!(
                "fcrypt: invalid key length: expected {} hex characters",
                2 * expected
            );
            std::process::exit(EXIT_BAD_KEY);
        }
        Err(err) => {
            eprintln!("fcrypt: invalid hex key: {err}");
            std::process::exit(EXIT_BAD_KEY);
        }
    }
}

fn validate_paths(args: &TransferArgs) -> Result<()> {
    if !args.from.is_file() {
        bail!("{} does not exist", args.from.display());
    }
    if args.to.exists() && !args.overwrite {
        bail!(
            "{} already exists, pass --overwrite to replace it",
            args.to.display()
        );
    }
    if paths_collide(&args.from, &args.to) {
        bail!("input and output must be different paths");
    }
    Ok(())
}

/// Whether the two paths refer to the same file. The output may not exist
/// yet, so its directory is canonicalised instead.
fn paths_collide(from: &Path, to: &Path) -> bool {
    let Ok(abs_from) = from.canonicalize() else {
        return false;
    };
    if let Ok(abs_to) = to.canonicalize() {
        return abs_from == abs_to;
    }
    let parent = match to.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    match (parent.canonicalize(), to.file_name()) {
        (Ok(dir), Some(name)) => dir.join(name) == abs_from,
        _ => false,
    }
}

/// Best-effort removal of a partially written output file.
fn remove_partial(path: &Path) {
    if let Err(err) = std::fs::remove_file(path) {
        tracing::debug!(error = %err, path = %path.display(), "could not remove partial output");
    }
}

fn cmd_encrypt(args: &TransferArgs, key: &[u8]) -> Result<u64> {
    let mut container = ContainerFile::create(&args.to, PayloadAlgorithm::AesCtr256)
        .with_context(|| format!("creating container: {}", args.to.display()))?;

    let result = (|| -> Result<u64> {
        container
            .add_key_slot(SlotAlgorithm::AesGcm128, key)
            .context("adding key slot")?;
        container.write_header().context("writing container header")?;

        let input = File::open(&args.from)
            .with_context(|| format!("opening input: {}", args.from.display()))?;
        container
            .encrypt_stream(BufReader::with_capacity(IO_BUF_SIZE, input))
            .with_context(|| format!("encrypting {}", args.from.display()))
    })();

    if result.is_err() {
        drop(container);
        remove_partial(&args.to);
    }
    result
}

fn cmd_decrypt(args: &TransferArgs, key: &[u8]) -> Result<u64> {
    let mut container = ContainerFile::open(&args.from)
        .with_context(|| format!("opening container: {}", args.from.display()))?;
    container
        .unseal(SlotAlgorithm::AesGcm128, key)
        .context("unsealing the root key")?;

    let result = (|| -> Result<u64> {
        let output = File::create(&args.to)
            .with_context(|| format!("creating output: {}", args.to.display()))?;
        let mut writer = BufWriter::with_capacity(IO_BUF_SIZE, output);
        let bytes = container
            .decrypt_stream(&mut writer)
            .with_context(|| format!("decrypting {}", args.from.display()))?;
        writer.flush().context("flushing output")?;
        Ok(bytes)
    })();

    if result.is_err() {
        remove_partial(&args.to);
    }
    result
}
