use anyhow::Result;
use blockgraph_main::{
    DataBlockId, EdgeRecord, EntryTags, IdKind, MainError, RelationIndex, RelationsConfig,
    RelationsFlags, Registry, SessionUuid, UsageFlags,
};

fn uuid_of(reg: &Registry, id: DataBlockId) -> SessionUuid {
    reg.get(id).expect("block exists").session_uuid()
}

/// (owner, field path, peer, usage) of every outgoing record, sorted.
fn outgoing_multiset(
    index: &RelationIndex,
) -> Vec<(DataBlockId, String, Option<DataBlockId>, u32)> {
    let mut out = Vec::new();
    for (id, entry) in index.iter() {
        for record in index.outgoing(entry) {
            out.push((id, record.field.path.to_string(), record.peer, record.usage.bits()));
        }
    }
    out.sort();
    out
}

#[test]
fn two_libraries_chained_by_parent() -> Result<()> {
    let mut reg = Registry::new();
    let a = reg.add(IdKind::Library, "A")?;
    let b = reg.add(IdKind::Library, "B")?;
    let field = reg.link(b, "parent", Some(a))?;

    let mut index = RelationIndex::new();
    let stats = index.build(&reg, RelationsFlags::empty())?;
    assert_eq!(stats.entries, 2);
    assert_eq!(stats.outgoing, 2);
    assert_eq!(stats.incoming, 1);
    assert_eq!(stats.unset, 1);

    let entry_a = index.lookup(a).expect("entry for A");
    let entry_b = index.lookup(b).expect("entry for B");

    let a_out: Vec<&EdgeRecord> = index.outgoing(entry_a).collect();
    assert_eq!(a_out.len(), 1);
    assert!(a_out[0].is_unset());
    assert_eq!(a_out[0].peer, None);

    let a_in: Vec<&EdgeRecord> = index.incoming(entry_a).collect();
    assert_eq!(a_in.len(), 1);
    assert_eq!(a_in[0].peer, Some(b));
    assert_eq!(a_in[0].session_uuid, uuid_of(&reg, b));
    assert_eq!(a_in[0].field, field);

    let b_out: Vec<&EdgeRecord> = index.outgoing(entry_b).collect();
    assert_eq!(b_out.len(), 1);
    assert_eq!(b_out[0].peer, Some(a));
    assert_eq!(b_out[0].session_uuid, uuid_of(&reg, a));
    assert_eq!(b_out[0].field, field);
    assert_eq!(b_out[0].usage, a_in[0].usage);
    assert!(b_out[0].usage.contains(UsageFlags::WEAK));

    assert_eq!(index.incoming(entry_b).count(), 0);
    assert_eq!(entry_b.incoming_len(), 0);
    Ok(())
}

#[test]
fn ten_thousand_objects_with_null_fields() -> Result<()> {
    let mut reg = Registry::new();
    for i in 0..10_000 {
        reg.add(IdKind::Object, format!("OB{i}"))?;
    }

    let mut index = RelationIndex::new();
    let stats = index.build(&reg, RelationsFlags::empty())?;

    assert_eq!(stats.entries, 10_000);
    assert_eq!(stats.outgoing, 30_000);
    assert_eq!(stats.incoming, 0);
    assert_eq!(stats.unset, 30_000);

    let (outgoing, incoming) = index.iter().fold((0, 0), |(o, i), (_, entry)| {
        (o + index.outgoing(entry).count(), i + index.incoming(entry).count())
    });
    assert_eq!(outgoing, 30_000);
    assert_eq!(incoming, 0);
    assert_eq!(index.pool_stats().live_records, 30_000);
    Ok(())
}

#[test]
fn every_block_gets_exactly_one_entry() -> Result<()> {
    let mut reg = Registry::new();
    for kind in IdKind::ALL {
        reg.add(kind, kind.code())?;
    }
    let mut index = RelationIndex::new();
    index.build(&reg, RelationsFlags::INCLUDE_UI)?;

    assert_eq!(index.len(), reg.len());
    for block in reg.iter() {
        let entry = index.lookup(block.id()).expect("entry");
        assert_eq!(entry.session_uuid(), block.session_uuid());
    }
    Ok(())
}

#[test]
fn outgoing_lists_are_most_recent_first() -> Result<()> {
    let mut reg = Registry::new();
    let ob = reg.add(IdKind::Object, "Cube")?;
    let m1 = reg.add(IdKind::Material, "M1")?;
    let m2 = reg.add(IdKind::Material, "M2")?;
    reg.append(ob, "materials", Some(m1))?;
    reg.append(ob, "materials", Some(m2))?;

    let mut index = RelationIndex::new();
    index.build(&reg, RelationsFlags::empty())?;

    let entry = index.lookup(ob).expect("entry");
    let names: Vec<String> = index
        .outgoing(entry)
        .map(|record| record.field.path.describe(IdKind::Object))
        .collect();
    assert_eq!(
        names,
        vec!["proxy_from", "materials[1]", "materials[0]", "parent", "data"]
    );

    // Records chain through their handles as well.
    let first = index.outgoing(entry).next().expect("first record");
    let second = first.next().and_then(|handle| index.edge(handle)).expect("second");
    assert_eq!(second.peer, Some(m2));
    Ok(())
}

#[test]
fn rebuild_is_idempotent() -> Result<()> {
    let mut reg = Registry::new();
    let sce = reg.add(IdKind::Scene, "Scene")?;
    let ob = reg.add(IdKind::Object, "Cube")?;
    let me = reg.add(IdKind::Mesh, "Cube")?;
    reg.link(sce, "camera", Some(ob))?;
    reg.append(sce, "master_collection.objects", Some(ob))?;
    reg.link(ob, "data", Some(me))?;

    let mut index = RelationIndex::new();
    let first_stats = index.build(&reg, RelationsFlags::empty())?;
    let first = outgoing_multiset(&index);
    let second_stats = index.build(&reg, RelationsFlags::empty())?;
    let second = outgoing_multiset(&index);

    assert_eq!(first_stats, second_stats);
    assert_eq!(first, second);
    Ok(())
}

#[test]
fn build_free_build_keeps_pool_bookkeeping_balanced() -> Result<()> {
    let mut reg = Registry::new();
    for i in 0..50 {
        reg.add(IdKind::Object, format!("OB{i}"))?;
    }
    let config = RelationsConfig {
        pool_chunk_size: 16,
        ..RelationsConfig::default()
    };
    let mut index = RelationIndex::with_config(&config);

    index.build(&reg, RelationsFlags::empty())?;
    let built = index.pool_stats();
    assert!(built.is_balanced());
    // 150 records in chunks of 16.
    assert_eq!(built.chunks, 10);

    index.free();
    let freed = index.pool_stats();
    assert!(freed.is_balanced());
    assert_eq!(freed.chunks, 0);
    assert_eq!(freed.live_records, 0);

    index.build(&reg, RelationsFlags::empty())?;
    let rebuilt = index.pool_stats();
    assert!(rebuilt.is_balanced());
    assert_eq!(rebuilt.chunks_allocated, 20);
    assert_eq!(rebuilt.chunks_released, 10);

    // An implicit free on rebuild is accounted the same way.
    index.build(&reg, RelationsFlags::empty())?;
    assert_eq!(index.pool_stats().chunks_released, 20);
    assert!(index.pool_stats().is_balanced());
    Ok(())
}

#[test]
fn failed_build_leaves_index_unbuilt_until_next_free() -> Result<()> {
    let mut reg = Registry::new();
    let obs = (0..3)
        .map(|i| reg.add(IdKind::Object, format!("OB{i}")))
        .collect::<blockgraph_main::Result<Vec<_>>>()?;
    let config = RelationsConfig {
        pool_chunk_size: 2,
        max_edge_records: Some(5),
        ..RelationsConfig::default()
    };
    let mut index = RelationIndex::with_config(&config);

    // Three objects with three null slots each need nine records.
    let err = index.build(&reg, RelationsFlags::empty()).unwrap_err();
    assert!(matches!(err, MainError::CapacityOverflow { what: "edge pool", limit: 5 }));
    assert!(!index.is_built());
    assert!(index.lookup(obs[0]).is_none());
    assert_eq!(index.len(), 0);

    // The partial build's records stay in the pool until released.
    let partial = index.pool_stats();
    assert_eq!(partial.live_records, 5);
    assert!(partial.is_balanced());

    index.free();
    let freed = index.pool_stats();
    assert_eq!(freed.live_records, 0);
    assert_eq!(freed.chunks, 0);
    assert_eq!(freed.chunks_released, partial.chunks as u64);
    assert!(freed.is_balanced());

    // Fits under the cap once two objects are gone.
    reg.remove(obs[1]);
    reg.remove(obs[2]);
    let stats = index.build(&reg, RelationsFlags::empty())?;
    assert!(index.is_built());
    assert_eq!(stats.outgoing, 3);
    assert!(index.pool_stats().is_balanced());
    Ok(())
}

#[test]
fn rebuild_after_failure_releases_partial_records() -> Result<()> {
    let mut reg = Registry::new();
    for i in 0..2 {
        reg.add(IdKind::Object, format!("OB{i}"))?;
    }
    let config = RelationsConfig {
        max_edge_records: Some(4),
        ..RelationsConfig::default()
    };
    let mut index = RelationIndex::with_config(&config);
    assert!(index.build(&reg, RelationsFlags::empty()).is_err());
    let generation = index.pool_stats().generation;

    let first = reg.iter().map(|block| block.id()).next().expect("object");
    reg.remove(first);
    index.build(&reg, RelationsFlags::empty())?;
    assert_eq!(index.pool_stats().generation, generation + 1);
    assert_eq!(index.pool_stats().live_records, 3);
    Ok(())
}

#[test]
fn free_forgets_everything_and_is_idempotent() -> Result<()> {
    let mut reg = Registry::new();
    let a = reg.add(IdKind::Library, "A")?;
    let b = reg.add(IdKind::Library, "B")?;
    reg.link(b, "parent", Some(a))?;

    let mut index = RelationIndex::new();
    index.build(&reg, RelationsFlags::empty())?;
    let handle = index
        .lookup(b)
        .and_then(|entry| index.outgoing(entry).next())
        .and_then(|record| record.next());
    assert!(handle.is_none(), "single-field list has no second record");

    index.free();
    assert!(!index.is_built());
    assert!(index.lookup(a).is_none());
    assert!(index.lookup(b).is_none());
    assert_eq!(index.len(), 0);

    let generation = index.pool_stats().generation;
    index.free();
    assert_eq!(index.pool_stats().generation, generation);
    Ok(())
}

#[test]
fn tag_all_round_trip_restores_tags() -> Result<()> {
    let mut reg = Registry::new();
    let ids = (0..5)
        .map(|i| reg.add(IdKind::Mesh, format!("ME{i}")))
        .collect::<blockgraph_main::Result<Vec<_>>>()?;

    let mut index = RelationIndex::new();
    index.build(&reg, RelationsFlags::empty())?;
    assert!(index.tag_set(ids[1], EntryTags::INPROGRESS_TO, true));
    assert!(index.tag_set(ids[3], EntryTags::PROCESSED_FROM, true));

    let before: Vec<_> = ids
        .iter()
        .map(|id| index.lookup(*id).expect("entry").tags)
        .collect();

    index.tag_all(EntryTags::PROCESSED_TO, true);
    assert!(ids.iter().all(|id| index
        .lookup(*id)
        .expect("entry")
        .tags
        .contains(EntryTags::PROCESSED_TO)));
    index.tag_all(EntryTags::PROCESSED_TO, false);

    let after: Vec<_> = ids
        .iter()
        .map(|id| index.lookup(*id).expect("entry").tags)
        .collect();
    assert_eq!(before, after);
    Ok(())
}

#[test]
fn tagging_an_unbuilt_index_does_nothing() {
    let mut index = RelationIndex::new();
    index.tag_all(EntryTags::PROCESSED, true);
    assert!(!index.tag_set(DataBlockId::new(0), EntryTags::PROCESSED, true));
    assert!(index.is_empty());
}

#[test]
fn ui_references_follow_build_flags() -> Result<()> {
    let mut reg = Registry::new();
    let sc = reg.add(IdKind::Screen, "Layout")?;
    let ob = reg.add(IdKind::Object, "Cube")?;
    reg.link(sc, "view_object", Some(ob))?;

    let mut index = RelationIndex::new();
    index.build(&reg, RelationsFlags::empty())?;
    assert_eq!(index.flags(), Some(RelationsFlags::empty()));
    let entry = index.lookup(sc).expect("screen entry");
    assert_eq!(entry.outgoing_len(), 0);
    assert_eq!(index.lookup(ob).expect("object entry").incoming_len(), 0);

    index.build(&reg, RelationsFlags::INCLUDE_UI)?;
    assert_eq!(index.flags(), Some(RelationsFlags::INCLUDE_UI));
    let incoming: Vec<_> = index
        .incoming(index.lookup(ob).expect("object entry"))
        .map(|record| (record.peer, record.usage.contains(UsageFlags::UI_ONLY)))
        .collect();
    assert_eq!(incoming, vec![(Some(sc), true)]);
    Ok(())
}

#[test]
fn reference_to_removed_block_is_recorded_as_unset() -> Result<()> {
    let mut reg = Registry::new();
    let child = reg.add(IdKind::Object, "Child")?;
    let parent = reg.add(IdKind::Object, "Parent")?;
    reg.link(child, "parent", Some(parent))?;
    reg.remove(parent);

    let mut index = RelationIndex::new();
    let stats = index.build(&reg, RelationsFlags::empty())?;
    assert_eq!(stats.dangling, 1);
    assert_eq!(stats.incoming, 0);
    assert_eq!(stats.entries, 1);

    let entry = index.lookup(child).expect("entry");
    let dangling: Vec<_> = index
        .outgoing(entry)
        .filter(|record| record.peer.is_some())
        .collect();
    assert_eq!(dangling.len(), 1);
    assert_eq!(dangling[0].peer, Some(parent));
    assert!(dangling[0].is_unset());
    assert!(index.lookup(parent).is_none());
    Ok(())
}

#[test]
fn stale_edges_are_detectable_after_registry_changes() -> Result<()> {
    let mut reg = Registry::new();
    let ob = reg.add(IdKind::Object, "Cube")?;
    let me = reg.add(IdKind::Mesh, "Cube")?;
    reg.link(ob, "data", Some(me))?;

    let mut index = RelationIndex::new();
    index.build(&reg, RelationsFlags::empty())?;

    let data_edge = |index: &RelationIndex| {
        index
            .outgoing(index.lookup(ob).expect("entry"))
            .find(|record| record.peer == Some(me))
            .cloned()
            .expect("data edge")
    };
    assert!(data_edge(&index).peer_is_current(&reg));

    // The slot is recycled for a different mesh; the old stamp no longer matches.
    reg.remove(me);
    let other = reg.add(IdKind::Mesh, "Other")?;
    assert_eq!(other, me);
    assert!(!data_edge(&index).peer_is_current(&reg));
    Ok(())
}

#[test]
fn rewriting_a_field_through_its_edge() -> Result<()> {
    let mut reg = Registry::new();
    let ob = reg.add(IdKind::Object, "Cube")?;
    let me = reg.add(IdKind::Mesh, "Cube")?;

    let mut index = RelationIndex::new();
    index.build(&reg, RelationsFlags::empty())?;

    // The null `data` field was recorded and can be filled in later.
    let field = index
        .outgoing(index.lookup(ob).expect("entry"))
        .find(|record| record.field.path.describe(IdKind::Object) == "data")
        .map(|record| record.field)
        .expect("data field recorded");
    assert_eq!(reg.set_field(field, Some(me))?, None);
    assert_eq!(reg.field_value(field), Some(Some(me)));

    index.build(&reg, RelationsFlags::empty())?;
    assert_eq!(index.lookup(me).expect("mesh entry").incoming_len(), 1);
    Ok(())
}
