use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use aptacluster::abundance::eligible_ids;
use aptacluster::store::{
    AbundanceStore, InMemoryAbundanceStore, InMemoryClusterStore, InMemorySequenceStore,
    SequenceStore,
};
use aptacluster::{cluster_members, kmer_distance, ClusterConfig, ClusterEngine, CutoffEstimator};
use clap::{Args, Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "aptacluster", about = "LSH clustering of HT-SELEX aptamer pools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Cluster a pool and write `id<TAB>cluster<TAB>sequence` lines.
    Cluster {
        #[command(flatten)]
        pool: PoolArgs,
        #[command(flatten)]
        params: ParamArgs,
        /// Output file (default: stdout).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Estimate the similarity cutoff of a pool without clustering.
    Cutoff {
        #[command(flatten)]
        pool: PoolArgs,
        #[command(flatten)]
        params: ParamArgs,
    },
    /// Print the k-mer distance between two sequences.
    Distance {
        /// First sequence.
        a: String,
        /// Second sequence.
        b: String,
        /// k-mer size.
        #[arg(short, default_value_t = 3)]
        k: usize,
    },
}

#[derive(Args, Debug)]
struct PoolArgs {
    /// Pool file: `sequence<TAB>count_cycle1<TAB>count_cycle2...` per line.
    pool: PathBuf,
    /// Length of the fixed 5' primer.
    #[arg(long, default_value_t = 0)]
    primer5: usize,
    /// Length of the fixed 3' primer.
    #[arg(long, default_value_t = 0)]
    primer3: usize,
}

#[derive(Args, Debug)]
struct ParamArgs {
    /// Randomized region length to cluster (default: the most common one).
    #[arg(long)]
    region_size: Option<usize>,
    /// Positions sampled per projection.
    #[arg(long, default_value_t = 8)]
    dimension: usize,
    /// Number of projections.
    #[arg(long, default_value_t = 5)]
    iterations: usize,
    /// k-mer size for the distance.
    #[arg(short, long, default_value_t = 3)]
    kmer_size: usize,
    /// Point substitutions per mutant when estimating the cutoff.
    #[arg(long, default_value_t = 4)]
    mutations: usize,
    /// Sampled aptamers when estimating the cutoff.
    #[arg(long, default_value_t = 100)]
    samples: usize,
    /// Maximum concurrent tasks.
    #[arg(long, default_value_t = 32)]
    threads: usize,
    /// RNG seed.
    #[arg(long)]
    seed: Option<u64>,
}

struct Pool {
    sequences: InMemorySequenceStore,
    abundance: InMemoryAbundanceStore,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Cluster {
            pool,
            params,
            output,
        } => run_cluster(pool, params, output)?,
        Commands::Cutoff { pool, params } => run_cutoff(pool, params)?,
        Commands::Distance { a, b, k } => {
            let a = a.to_ascii_uppercase();
            let b = b.to_ascii_uppercase();
            println!("{:.6}", kmer_distance(a.as_bytes(), b.as_bytes(), k));
        }
    }

    Ok(())
}

fn run_cluster(pool_args: PoolArgs, params: ParamArgs, output: Option<PathBuf>) -> Result<()> {
    let pool = read_pool_file(&pool_args)?;
    let config = build_config(&params, &pool.sequences)?;
    let engine = ClusterEngine::new(config).context("invalid clustering parameters")?;
    info!(
        region_size = engine.config().randomized_region_size,
        workers = engine.config().worker_count(),
        "clustering pool"
    );

    let clusters = InMemoryClusterStore::with_capacity(pool.sequences.len());
    let summary = engine
        .run(&pool.sequences, &clusters, &pool.abundance)
        .context("clustering failed")?;

    let mut writer: Box<dyn Write> = match &output {
        Some(path) => Box::new(BufWriter::new(File::create(path).with_context(|| {
            format!("failed to create output file {}", path.display())
        })?)),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };
    for (cluster, members) in cluster_members(&clusters) {
        for id in members {
            let sequence = pool.sequences.get(id).unwrap_or_default();
            writeln!(
                writer,
                "{}\t{}\t{}",
                id,
                cluster,
                String::from_utf8_lossy(sequence)
            )?;
        }
    }
    writer.flush()?;

    let sizes = cluster_sizes(&clusters);
    info!(
        clusters = summary.clusters,
        eligible = summary.eligible,
        cutoff = summary.cutoff,
        comparisons = summary.comparisons(),
        skipped = summary.skipped(),
        largest = ?sizes.iter().take(5).collect::<Vec<_>>(),
        "done"
    );
    Ok(())
}

fn run_cutoff(pool_args: PoolArgs, params: ParamArgs) -> Result<()> {
    let pool = read_pool_file(&pool_args)?;
    let config = build_config(&params, &pool.sequences)?;
    config.validate().context("invalid cutoff parameters")?;

    let eligible = eligible_ids(&pool.sequences, config.randomized_region_size);
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let cutoff = CutoffEstimator::new(&pool.sequences, &eligible, config.kmer_size)
        .estimate(
            config.kmer_cutoff_samples,
            config.kmer_cutoff_mutations,
            &mut rng,
        )
        .context("cutoff estimation failed")?;

    match cutoff {
        Some(cutoff) => println!("{:.6}", cutoff),
        None => bail!(
            "no aptamers with region length {}",
            config.randomized_region_size
        ),
    }
    Ok(())
}

fn build_config(params: &ParamArgs, sequences: &InMemorySequenceStore) -> Result<ClusterConfig> {
    let region_size = match params.region_size {
        Some(size) => size,
        None => most_common_region_size(sequences)
            .context("pool contains no aptamers to infer a region size from")?,
    };
    let mut config = ClusterConfig::for_region_size(region_size)
        .with_dimension(params.dimension)
        .with_iterations(params.iterations)
        .with_kmer_size(params.kmer_size)
        .with_cutoff_sampling(params.mutations, params.samples)
        .with_max_workers(params.threads)
        .with_progress_interval(Duration::from_secs(1));
    if let Some(seed) = params.seed {
        config = config.with_seed(seed);
    }
    Ok(config)
}

fn most_common_region_size(sequences: &InMemorySequenceStore) -> Option<usize> {
    let mut counts = std::collections::HashMap::new();
    for id in sequences.ids() {
        if let Some(bounds) = sequences.bounds(id) {
            *counts.entry(bounds.len()).or_insert(0usize) += 1;
        }
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
        .map(|(size, _)| size)
}

fn cluster_sizes(clusters: &InMemoryClusterStore) -> Vec<(u32, usize)> {
    let mut sizes: Vec<_> = cluster_members(clusters)
        .into_iter()
        .map(|(cluster, members)| (cluster, members.len()))
        .collect();
    sizes.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    sizes
}

fn read_pool_file(args: &PoolArgs) -> Result<Pool> {
    let path: &Path = &args.pool;
    let file = File::open(path)
        .with_context(|| format!("failed to open pool file {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut sequences = InMemorySequenceStore::new();
    let mut abundance = InMemoryAbundanceStore::new();
    let mut too_short = 0usize;

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let mut fields = trimmed.split('\t');
        let sequence = fields
            .next()
            .ok_or_else(|| anyhow::anyhow!("missing sequence on line {}", line_no + 1))?
            .trim()
            .to_ascii_uppercase()
            .into_bytes();

        let Some(id) = sequences.push_with_primers(sequence, args.primer5, args.primer3) else {
            too_short += 1;
            continue;
        };

        let mut counted = false;
        for (cycle, field) in fields.enumerate() {
            let count: u32 = field.trim().parse().with_context(|| {
                format!(
                    "invalid count '{}' in cycle {} on line {}",
                    field,
                    cycle + 1,
                    line_no + 1
                )
            })?;
            if count > 0 {
                abundance.record(cycle, id, count);
            }
            counted = true;
        }
        if !counted {
            abundance.record(0, id, 1);
        }
    }

    if too_short > 0 {
        info!(too_short, "skipped aptamers shorter than their primers");
    }
    info!(
        aptamers = sequences.len(),
        cycles = abundance.cycle_count(),
        "loaded pool from {}",
        path.display()
    );
    Ok(Pool {
        sequences,
        abundance,
    })
}
