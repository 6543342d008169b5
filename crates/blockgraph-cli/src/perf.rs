//! Performance harness for the relation index.
//!
//! Not a microbenchmark framework: it builds one deterministic synthetic
//! registry and times repeated build/tag/free cycles over it.
//!
//! ```bash
//! cargo run -p blockgraph-cli --release -- perf relations --objects 200000 --fields 4
//! ```

use anyhow::{anyhow, Result};
use clap::Subcommand;
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use blockgraph_main::{BuildStats, EntryTags, PoolStats, RelationsConfig, RelationsFlags};

use crate::synthetic::build_synthetic_main;

#[derive(Subcommand)]
pub enum PerfCommands {
    /// Synthetic registry + repeated relation index builds.
    Relations {
        /// Number of objects to create.
        #[arg(long, default_value_t = 100_000)]
        objects: usize,

        /// Material slots per object, on top of its fixed slots.
        #[arg(long, default_value_t = 4)]
        fields: usize,

        /// Probability that a slot is left null.
        #[arg(long, default_value_t = 0.25)]
        null_ratio: f64,

        /// RNG seed (deterministic).
        #[arg(long, default_value_t = 1)]
        seed: u64,

        /// Number of build/tag/free cycles.
        #[arg(long, default_value_t = 5)]
        rebuilds: usize,

        /// Edge records per pool chunk (overrides configuration).
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Record UI-only references too.
        #[arg(long)]
        include_ui: bool,

        /// Print the report as JSON instead of text.
        #[arg(long)]
        json: bool,

        /// Also write the JSON report to this file.
        #[arg(long)]
        out_json: Option<PathBuf>,
    },
}

pub fn cmd_perf(command: PerfCommands, config: RelationsConfig) -> Result<()> {
    match command {
        PerfCommands::Relations {
            objects,
            fields,
            null_ratio,
            seed,
            rebuilds,
            chunk_size,
            include_ui,
            json,
            out_json,
        } => {
            let mut config = config;
            if let Some(chunk_size) = chunk_size {
                config.pool_chunk_size = chunk_size;
            }
            config.include_ui |= include_ui;
            config.validate()?;

            let report = run_relations(&config, objects, fields, null_ratio, seed, rebuilds)?;
            let text = serde_json::to_string_pretty(&report)?;
            if let Some(path) = out_json.as_ref() {
                fs::write(path, &text)?;
            }
            if json {
                println!("{text}");
            } else {
                print_report(&report);
                if let Some(path) = out_json.as_ref() {
                    println!("  wrote_json={}", path.display());
                }
            }
            Ok(())
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub(crate) struct CycleTimings {
    build_secs: f64,
    tag_secs: f64,
    free_secs: f64,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct PerfRelationsReport {
    objects: usize,
    blocks: usize,
    fields: usize,
    null_ratio: f64,
    seed: u64,
    rebuilds: usize,
    pool_chunk_size: usize,
    include_ui: bool,
    populate_secs: f64,
    slots: usize,
    null_slots: usize,
    build: BuildStats,
    /// Pool state right after the last build.
    pool_built: PoolStats,
    /// Pool state after the last free.
    pool_freed: PoolStats,
    cycles: Vec<CycleTimings>,
    build_min_secs: f64,
    build_mean_secs: f64,
    build_max_secs: f64,
}

fn secs(d: Duration) -> f64 {
    d.as_secs_f64()
}

pub(crate) fn run_relations(
    config: &RelationsConfig,
    objects: usize,
    fields: usize,
    null_ratio: f64,
    seed: u64,
    rebuilds: usize,
) -> Result<PerfRelationsReport> {
    if rebuilds == 0 {
        return Err(anyhow!("--rebuilds must be > 0"));
    }

    let mut synth = build_synthetic_main(config.clone(), objects, fields, null_ratio, seed)?;
    let flags: RelationsFlags = config.flags();
    let main = &mut synth.main;

    let mut cycles = Vec::with_capacity(rebuilds);
    let mut last_build = BuildStats::default();
    let mut pool_built = PoolStats::default();
    for _ in 0..rebuilds {
        let start = Instant::now();
        last_build = main.relations_create(flags)?;
        let build_time = start.elapsed();
        pool_built = main.relations().pool_stats();

        let start = Instant::now();
        main.relations_tag_set(EntryTags::PROCESSED, true);
        main.relations_tag_set(EntryTags::PROCESSED, false);
        let tag_time = start.elapsed();

        let start = Instant::now();
        main.relations_free();
        let free_time = start.elapsed();

        tracing::debug!(
            build_us = build_time.as_micros() as u64,
            free_us = free_time.as_micros() as u64,
            "perf cycle"
        );
        cycles.push(CycleTimings {
            build_secs: secs(build_time),
            tag_secs: secs(tag_time),
            free_secs: secs(free_time),
        });
    }

    let pool_freed = main.relations().pool_stats();
    if !pool_freed.is_balanced() {
        return Err(anyhow!(
            "edge pool bookkeeping is unbalanced: {} allocated, {} released, {} live",
            pool_freed.chunks_allocated,
            pool_freed.chunks_released,
            pool_freed.chunks
        ));
    }

    let builds: Vec<f64> = cycles.iter().map(|c| c.build_secs).collect();
    let build_min_secs = builds.iter().copied().fold(f64::INFINITY, f64::min);
    let build_max_secs = builds.iter().copied().fold(0.0, f64::max);
    let build_mean_secs = builds.iter().sum::<f64>() / builds.len() as f64;

    Ok(PerfRelationsReport {
        objects,
        blocks: main.registry().len(),
        fields,
        null_ratio,
        seed,
        rebuilds,
        pool_chunk_size: config.pool_chunk_size,
        include_ui: config.include_ui,
        populate_secs: secs(synth.populate_time),
        slots: synth.slots,
        null_slots: synth.null_slots,
        build: last_build,
        pool_built,
        pool_freed,
        cycles,
        build_min_secs,
        build_mean_secs,
        build_max_secs,
    })
}

fn print_report(report: &PerfRelationsReport) {
    println!("perf/relations");
    println!(
        "  objects={} blocks={} fields={} null_ratio={} seed={} rebuilds={} chunk_size={} include_ui={}",
        report.objects,
        report.blocks,
        report.fields,
        report.null_ratio,
        report.seed,
        report.rebuilds,
        report.pool_chunk_size,
        report.include_ui
    );
    println!(
        "  populate={:.3}s slots={} null_slots={}",
        report.populate_secs, report.slots, report.null_slots
    );
    println!(
        "  entries={} outgoing={} incoming={} unset={} dangling={}",
        report.build.entries,
        report.build.outgoing,
        report.build.incoming,
        report.build.unset,
        report.build.dangling
    );
    println!(
        "  build min={:.6}s mean={:.6}s max={:.6}s",
        report.build_min_secs, report.build_mean_secs, report.build_max_secs
    );
    for (i, cycle) in report.cycles.iter().enumerate() {
        println!(
            "  cycle[{i}] build={:.6}s tag={:.6}s free={:.6}s",
            cycle.build_secs, cycle.tag_secs, cycle.free_secs
        );
    }
    println!(
        "  pool chunks={} capacity={} live_records={} generation={}",
        report.pool_built.chunks,
        report.pool_built.capacity,
        report.pool_built.live_records,
        report.pool_built.generation
    );
    println!(
        "  pool after free: allocated={} released={} balanced={}",
        report.pool_freed.chunks_allocated,
        report.pool_freed.chunks_released,
        report.pool_freed.is_balanced()
    );
}
