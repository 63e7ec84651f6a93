//! Command-line front end: build a subsequence tree from a GenBank file,
//! query it, and check it.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use genebank::common::config::{block_optimal_degree, HEADER_SIZE, MAX_SEQUENCE_LENGTH};
use genebank::genbank::{aggregate::SubsequenceCounter, gbk, naming, sequence};
use genebank::storage::StoreHeader;
use genebank::{BTree, BTreeConfig, Error, Result};

#[derive(Parser, Debug)]
#[command(
    name = "genebank",
    version,
    about = "Count DNA subsequences of GenBank files in a disk-resident B-tree",
    disable_help_subcommand = true
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build `<gbk>.btree.data.<k>.<t>` from a GenBank file
    Create(CreateCmd),
    /// Look up the frequency of each sequence in a query file
    Search(SearchCmd),
    /// Validate the structure and height of an existing tree
    Check(CheckCmd),
}

#[derive(Args, Debug)]
struct CreateCmd {
    #[arg(long, value_name = "FILE", help = "GenBank input file")]
    gbk: PathBuf,

    #[arg(
        long,
        value_name = "T",
        default_value_t = 0,
        help = "Minimum degree (0 picks the largest degree fitting a 4096-byte block)"
    )]
    degree: u32,

    #[arg(long, value_name = "K", help = "Subsequence length, 1 to 31")]
    length: u32,

    #[arg(long, help = "Skip the fsync after each insert")]
    no_sync: bool,

    #[arg(long, help = "Dump the tree and run the validators after building")]
    debug: bool,
}

#[derive(Args, Debug)]
struct SearchCmd {
    #[arg(long, value_name = "FILE", help = "Tree file named <gbk>.btree.data.<k>.<t>")]
    btree: PathBuf,

    #[arg(long, value_name = "FILE", help = "One sequence per line")]
    query: PathBuf,

    #[arg(long, help = "Log each lookup")]
    debug: bool,
}

#[derive(Args, Debug)]
struct CheckCmd {
    #[arg(long, value_name = "FILE", help = "Tree file named <gbk>.btree.data.<k>.<t>")]
    btree: PathBuf,

    #[arg(long, help = "Print every node before checking")]
    dump: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let debug = match &cli.command {
        Command::Create(cmd) => cmd.debug,
        Command::Search(cmd) => cmd.debug,
        Command::Check(_) => false,
    };
    init_tracing(debug);

    let outcome = match cli.command {
        Command::Create(cmd) => run_create(cmd),
        Command::Search(cmd) => run_search(cmd),
        Command::Check(cmd) => run_check(cmd),
    };

    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("error: {}", err);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(debug: bool) {
    let default = if debug { "genebank=debug" } else { "genebank=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr))
        .init();
}

fn run_create(cmd: CreateCmd) -> Result<bool> {
    let degree = if cmd.degree == 0 {
        block_optimal_degree()
    } else {
        cmd.degree
    };
    let config = BTreeConfig::new(cmd.length, degree).with_sync_writes(!cmd.no_sync);
    config.validate()?;

    let output = naming::btree_file_name(&cmd.gbk, cmd.length, degree);
    match std::fs::remove_file(&output) {
        Ok(()) => tracing::info!(path = %output.display(), "removed previous tree"),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => return Err(err.into()),
    }

    let sequences = gbk::parse_file(&cmd.gbk)?;
    let mut counter = SubsequenceCounter::new(cmd.length as usize)?;
    for seq in &sequences {
        counter.add_sequence(seq);
    }
    tracing::info!(
        sequences = sequences.len(),
        windows = counter.windows(),
        distinct = counter.distinct(),
        "counted subsequences"
    );

    let mut tree = BTree::open_or_create(&output, config)?;
    for (key, count) in counter.iter() {
        let count = i32::try_from(count).unwrap_or(i32::MAX);
        tree.insert_count(key, count)?;
    }
    tracing::info!(
        path = %output.display(),
        num_keys = tree.num_keys(),
        nodes = tree.node_count(),
        stats = %tree.stats().snapshot(),
        "tree built"
    );

    if cmd.debug {
        dump_to_stdout(&tree)?;
        return validate(&tree);
    }
    Ok(true)
}

fn run_search(cmd: SearchCmd) -> Result<bool> {
    let tree = open_existing(&cmd.btree)?;
    let length = tree.config().sequence_length;

    let reader = BufReader::new(File::open(&cmd.query)?);
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    for line in reader.lines() {
        let line = line?;
        let query = line.trim().to_ascii_lowercase();
        if query.is_empty() {
            continue;
        }
        if query.len() != length as usize {
            tracing::warn!(%query, expected = length, "query has the wrong length, skipped");
            continue;
        }
        let key = match sequence::encode(&query) {
            Ok(key) => key,
            Err(err) => {
                tracing::warn!(%query, %err, "query skipped");
                continue;
            }
        };

        match tree.search(key)? {
            Some(entry) => writeln!(out, "{}: {}", query, entry.frequency)?,
            None => tracing::debug!(%query, "not found"),
        }
    }
    out.flush()?;
    Ok(true)
}

fn run_check(cmd: CheckCmd) -> Result<bool> {
    let tree = open_existing(&cmd.btree)?;
    if cmd.dump {
        dump_to_stdout(&tree)?;
    }
    validate(&tree)
}

/// Open a tree whose `k` and `t` are encoded in its file name.
fn open_existing(path: &Path) -> Result<BTree> {
    let (length, degree) = naming::parse_btree_file_name(path)?;
    if length == 0 || length > MAX_SEQUENCE_LENGTH {
        return Err(Error::InvalidConfig(format!(
            "sequence length in {} must be between 1 and {}",
            path.display(),
            MAX_SEQUENCE_LENGTH
        )));
    }
    ensure_built(path)?;
    // Read-only commands never write, so skip the fsync.
    BTree::open_or_create(path, BTreeConfig::new(length, degree).with_sync_writes(false))
}

/// Reject files that `BTree::open_or_create` would initialize: no valid
/// header, or a header with no root slot behind it.
fn ensure_built(path: &Path) -> Result<()> {
    let mut file = File::open(path)?;
    let len = file.metadata()?.len();
    if len <= HEADER_SIZE {
        return Err(Error::InvalidConfig(format!(
            "{} holds no tree ({} bytes)",
            path.display(),
            len
        )));
    }

    let mut header = [0u8; StoreHeader::SIZE];
    file.read_exact(&mut header)?;
    if StoreHeader::from_bytes(&header).is_none() {
        return Err(Error::InvalidConfig(format!(
            "{} has no valid tree header",
            path.display()
        )));
    }
    Ok(())
}

fn dump_to_stdout(tree: &BTree) -> Result<()> {
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    tree.dump(&mut out)?;
    out.flush()?;
    Ok(())
}

/// Run both validators; false if either finds a problem.
fn validate(tree: &BTree) -> Result<bool> {
    let structure = tree.check_structure()?;
    for violation in &structure.violations {
        eprintln!("{}", violation);
    }
    let height = tree.check_height()?;
    eprintln!(
        "checked {} nodes, {} keys, {} violations; {}",
        structure.nodes_checked,
        structure.keys_checked,
        structure.violations.len(),
        height
    );
    Ok(structure.is_valid() && height.within_bound())
}
