use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use lapels::record::TagPrefixes;
use lapels::{annotate_bam, RunConfig};

/// Remap pseudo-genome alignments back to reference coordinates.
#[derive(Debug, Parser)]
struct Cli {
    /// Pseudo-genome-aligned BAM, coordinate-sorted and indexed.
    bam_path: PathBuf,
    /// Gzip-compressed MOD file describing the pseudo-genome's variants.
    mod_path: PathBuf,

    #[arg(short, long, help = "output BAM path")]
    output: PathBuf,

    #[arg(long = "chrom", help = "restrict to this chromosome (repeatable); default is all")]
    chroms: Vec<String>,

    #[arg(long, default_value = "zs", help = "substitution count tag prefix")]
    subst_tag: String,
    #[arg(long, default_value = "zi", help = "insertion count tag prefix")]
    ins_tag: String,
    #[arg(long, default_value = "zd", help = "deletion count tag prefix")]
    del_tag: String,

    #[arg(
        long,
        default_value_t = false,
        help = "skip alignments that fail to remap instead of aborting the run"
    )]
    lenient: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Cli::parse();

    let config = RunConfig {
        tag_prefixes: TagPrefixes { subst: args.subst_tag, ins: args.ins_tag, del: args.del_tag },
        lenient: args.lenient,
        chroms: (!args.chroms.is_empty()).then_some(args.chroms),
    };

    annotate_bam(&args.bam_path, &args.mod_path, &args.output, &config)
}
