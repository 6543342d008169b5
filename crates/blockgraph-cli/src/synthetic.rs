//! Deterministic synthetic registries for perf runs and demos.

use anyhow::{anyhow, Result};
use std::time::{Duration, Instant};

use blockgraph_main::{
    foreach_id_link, DataBlockId, IdKind, Main, RelationsConfig, WalkControl, WalkOptions,
};

/// SplitMix64: one add and two multiply-xorshift rounds per draw. Every seed,
/// zero included, gives a full-period stream.
#[derive(Debug, Clone)]
pub(crate) struct SplitMix64(u64);

impl SplitMix64 {
    const GAMMA: u64 = 0x9e37_79b9_7f4a_7c15;

    pub(crate) fn seeded(seed: u64) -> Self {
        Self(seed)
    }

    pub(crate) fn draw(&mut self) -> u64 {
        self.0 = self.0.wrapping_add(Self::GAMMA);
        let mut z = self.0;
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
        z ^ (z >> 31)
    }

    /// Index into a non-empty slice of length `len`.
    pub(crate) fn index(&mut self, len: usize) -> usize {
        debug_assert!(len > 0);
        (self.draw() % len as u64) as usize
    }

    /// True with probability `p`.
    pub(crate) fn chance(&mut self, p: f64) -> bool {
        let unit = (self.draw() >> 11) as f64 * (1.0 / (1u64 << 53) as f64);
        unit < p
    }
}

pub(crate) struct SyntheticMain {
    pub(crate) main: Main,
    pub(crate) populate_time: Duration,
    /// Reference slots the relation build will visit, null ones included.
    pub(crate) slots: usize,
    pub(crate) null_slots: usize,
}

/// Fill a fresh [`Main`] with `objects` objects, each holding `fields`
/// material slots on top of its `data`, `parent` and `proxy_from` slots.
///
/// Every slot is left null with probability `null_ratio`. Meshes and
/// materials are shared, one per eight objects. Slot counts come from walking
/// the finished registry, so fields of the shared blocks are included.
pub(crate) fn build_synthetic_main(
    config: RelationsConfig,
    objects: usize,
    fields: usize,
    null_ratio: f64,
    seed: u64,
) -> Result<SyntheticMain> {
    if objects == 0 {
        return Err(anyhow!("--objects must be > 0"));
    }
    if !(0.0..=1.0).contains(&null_ratio) {
        return Err(anyhow!("--null-ratio must be within [0, 1]"));
    }

    let mut rng = SplitMix64::seeded(seed);
    let config_include_ui = config.include_ui;
    let mut main = Main::with_config(config);
    let shared = (objects / 8).max(1);

    let start = Instant::now();
    let reg = main.registry_mut();
    let meshes: Vec<DataBlockId> = (0..shared)
        .map(|i| reg.add(IdKind::Mesh, format!("ME_{i}")))
        .collect::<blockgraph_main::Result<_>>()?;
    let materials: Vec<DataBlockId> = (0..shared)
        .map(|i| reg.add(IdKind::Material, format!("MA_{i}")))
        .collect::<blockgraph_main::Result<_>>()?;
    let obs: Vec<DataBlockId> = (0..objects)
        .map(|i| reg.add(IdKind::Object, format!("OB_{i}")))
        .collect::<blockgraph_main::Result<_>>()?;

    let pick = |rng: &mut SplitMix64, pool: &[DataBlockId]| {
        if rng.chance(null_ratio) {
            None
        } else {
            Some(pool[rng.index(pool.len())])
        }
    };

    for (i, &ob) in obs.iter().enumerate() {
        reg.link(ob, "data", pick(&mut rng, &meshes))?;
        // Parents always come earlier, so the hierarchy stays acyclic.
        let parent = if i == 0 { None } else { pick(&mut rng, &obs[..i]) };
        reg.link(ob, "parent", parent)?;
        for _ in 0..fields {
            reg.append(ob, "materials", pick(&mut rng, &materials))?;
        }
    }
    let populate_time = start.elapsed();

    let options = if config_include_ui {
        WalkOptions::INCLUDE_UI
    } else {
        WalkOptions::empty()
    };
    let (mut slots, mut null_slots) = (0, 0);
    for block in main.registry().iter() {
        foreach_id_link(block, options, |link| {
            slots += 1;
            if link.target.is_none() {
                null_slots += 1;
            }
            WalkControl::Continue
        });
    }

    Ok(SyntheticMain {
        main,
        populate_time,
        slots,
        null_slots,
    })
}
