/*!

# lapels - remap alignments against an in silico pseudo-genome back to reference coordinates

Short reads are commonly aligned against a personalized or strain-specific
pseudo-genome (built by splicing known variants into a reference) to improve
alignment sensitivity near those variants. `lapels` undoes that splice: it
reads the pseudo-genome alignments back out and rewrites each one's position
and CIGAR in terms of the original reference, using the same variant table
the pseudo-genome was built from (a `MOD` file, see [`modfile`]).

## Usage

```text
lapels alignments.bam variants.mod.gz -o remapped.bam
```

Only primary alignments are remapped; one worker thread handles each
requested chromosome, writing through a single shared output file.
*/

use std::path::Path;
use std::sync::Mutex;

use log::warn;
use rayon::prelude::*;
use rust_htslib::bam::{self, Read};
use rust_htslib::htslib;

pub mod annotate;
pub mod builder;
pub mod chrom;
pub mod cigar;
pub mod error;
pub mod modfile;
pub mod posmap;
pub mod record;
pub mod region;
pub mod variant;

use annotate::Annotator;
use chrom::ChromRegistry;
use modfile::ModFile;
use posmap::PositionMap;
use record::{BamAlignmentView, TagPrefixes};

/// The alias a chromosome name is registered under besides itself: the same
/// name with (or without) its `chr` prefix, so a MOD file keyed `1` lines up
/// with a BAM header naming it `chr1` (`modtools/alias.py`, `examples/original_source/`).
fn chrom_alias(name: &str) -> String {
    match name.strip_prefix("chr") {
        Some(rest) => rest.to_string(),
        None => format!("chr{name}"),
    }
}

/// Secondary, supplementary, QC-failed, duplicate, and unmapped reads are
/// left untouched — only a read's primary alignment carries a position worth
/// remapping.
pub const NONPRIMARY: u16 = (htslib::BAM_FUNMAP
    | htslib::BAM_FSECONDARY
    | htslib::BAM_FQCFAIL
    | htslib::BAM_FDUP
    | htslib::BAM_FSUPPLEMENTARY) as u16;

/// Knobs exposed on the CLI (`spec.md` §6/§9).
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub tag_prefixes: TagPrefixes,
    /// Skip (with a warning) alignments that fail with a non-fatal
    /// [`error::RemapError`] instead of aborting the whole run.
    pub lenient: bool,
    /// Restrict the run to these chromosomes; `None` means every chromosome
    /// the input BAM's header names.
    pub chroms: Option<Vec<String>>,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig { tag_prefixes: TagPrefixes::default(), lenient: false, chroms: None }
    }
}

/// Remap every primary alignment in `bam_path` using the variant table in
/// `mod_path`, writing the result to `out_path`. One [`PositionMap`] is built
/// per chromosome and chromosomes are processed concurrently (`spec.md` §5);
/// output is serialized through a single mutex-guarded writer.
pub fn annotate_bam(
    bam_path: &Path,
    mod_path: &Path,
    out_path: &Path,
    config: &RunConfig,
) -> anyhow::Result<()> {
    let modfile = ModFile::load(mod_path)?;

    let header_reader = bam::Reader::from_path(bam_path)?;
    let header_view = header_reader.header().clone();
    let out_header = bam::Header::from_template(&header_view);
    let writer = Mutex::new(bam::Writer::from_path(out_path, &out_header, bam::Format::Bam)?);

    let mut registry = ChromRegistry::new();
    for name in header_view.target_names() {
        let name = String::from_utf8_lossy(name).into_owned();
        let tid = header_view.tid(name.as_bytes()).expect("name came from target_names");
        let len = header_view.target_len(tid).unwrap_or(0) as i64;
        let alias = chrom_alias(&name);
        registry.register(&name, len, &[alias.as_str()]);
    }

    let targets: Vec<String> = match &config.chroms {
        Some(names) => names.clone(),
        None => header_view
            .target_names()
            .iter()
            .map(|n| String::from_utf8_lossy(n).into_owned())
            .collect(),
    };

    targets.par_iter().try_for_each(|chrom| -> anyhow::Result<()> {
        let header_name = registry.canonical(chrom);
        let Some(tid) = header_view.tid(header_name.as_bytes()) else {
            warn!("chromosome {chrom} is not present in the input BAM header, skipping");
            return Ok(());
        };
        let ref_len = header_view
            .target_len(tid)
            .ok_or_else(|| anyhow::anyhow!("no length recorded for chromosome {chrom}"))?
            as i64;

        let table = match modfile.table_for(chrom) {
            Ok(t) if !t.is_empty() => t,
            Ok(empty) => {
                let alias = chrom_alias(chrom);
                if modfile.chromosomes().any(|c| c == alias.as_str()) {
                    modfile.table_for(&alias)?
                } else {
                    empty
                }
            }
            Err(e) => return Err(e.into()),
        };
        let posmap = PositionMap::build(&table, ref_len)?;
        let annotator =
            Annotator { variants: &table, posmap: &posmap, tag_prefixes: config.tag_prefixes.clone() };

        let mut reader = bam::IndexedReader::from_path(bam_path)?;
        reader.fetch(header_name)?;
        let mut seen = 0u64;
        for record in reader.records() {
            let record = record?;
            if record.flags() & NONPRIMARY != 0 {
                continue;
            }
            seen += 1;
            if seen % 100_000 == 0 {
                log::info!("{chrom}: processed {seen} alignments");
            }
            let mut view = BamAlignmentView::new(record, chrom.clone())?;
            match annotator.process(&mut view) {
                Ok(()) => {
                    writer.lock().unwrap().write(view.record())?;
                }
                Err(e) if config.lenient && !e.is_fatal_to_run() => {
                    warn!("skipping alignment on {chrom}: {e}");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    })?;

    Ok(())
}
