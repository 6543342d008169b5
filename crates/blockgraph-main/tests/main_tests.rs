use anyhow::Result;
use blockgraph_main::{
    EntryTags, IdKind, IdSet, Main, MainError, RelationsConfig, RelationsFlags,
};
use std::io::Write;

#[test]
fn config_file_drives_the_index() -> Result<()> {
    let mut file = tempfile::NamedTempFile::new()?;
    write!(
        file,
        r#"{{ "pool_chunk_size": 8, "entry_capacity_hint": 32, "include_ui": true }}"#
    )?;

    let config = RelationsConfig::from_path(file.path())?;
    assert_eq!(config.pool_chunk_size, 8);
    assert_eq!(config.entry_capacity_hint, 32);

    let mut main = Main::with_config(config);
    let sc = main.registry_mut().add(IdKind::Screen, "Layout")?;
    let ob = main.registry_mut().add(IdKind::Object, "Cube")?;
    main.registry_mut().link(sc, "view_object", Some(ob))?;

    main.relations_create_default()?;
    assert_eq!(main.relations().flags(), Some(RelationsFlags::INCLUDE_UI));
    assert_eq!(
        main.relations().lookup(ob).map(|entry| entry.incoming_len()),
        Some(1)
    );
    // Screen: 1 UI slot, object: 3 null slots, one chunk of 8 holds them all
    // plus the incoming record.
    assert_eq!(main.relations().pool_stats().chunks, 1);
    Ok(())
}

#[test]
fn missing_config_file_is_an_io_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = RelationsConfig::from_path(&dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, MainError::Io(_)));
}

#[test]
fn gset_snapshots_live_blocks() {
    let mut main = Main::new();
    let reg = main.registry_mut();
    let ids: Vec<_> = IdKind::ALL
        .iter()
        .map(|kind| reg.add(*kind, kind.code()).expect("add block"))
        .collect();

    let set = main.gset_create(None);
    assert_eq!(set.len() as usize, ids.len());
    assert!(ids.iter().all(|id| set.contains(*id)));

    let removed = ids[3];
    main.registry_mut().remove(removed);
    assert!(set.contains(removed));

    let fresh = main.gset_create(Some(IdSet::new()));
    assert!(!fresh.contains(removed));
    assert_eq!(fresh.iter().count(), ids.len() - 1);
}

#[test]
fn relations_tag_set_marks_every_entry() -> Result<()> {
    let mut main = Main::new();
    let a = main.registry_mut().add(IdKind::Mesh, "A")?;
    let b = main.registry_mut().add(IdKind::Mesh, "B")?;
    main.registry_mut().link(a, "texcomesh", Some(b))?;

    main.relations_create(RelationsFlags::empty())?;
    main.relations_tag_set(EntryTags::PROCESSED_FROM, true);
    for id in [a, b] {
        let tags = main.relations().lookup(id).map(|entry| entry.tags);
        assert_eq!(tags, Some(EntryTags::PROCESSED_FROM));
    }

    main.relations_free();
    main.relations_free();
    assert!(main.relations().lookup(a).is_none());
    Ok(())
}

#[test]
fn clear_tears_down_in_reverse_listing_order() -> Result<()> {
    let mut main = Main::new();
    let reg = main.registry_mut();
    let wm = reg.add(IdKind::WindowManager, "WinMan")?;
    let sce = reg.add(IdKind::Scene, "Scene")?;
    reg.append(wm, "window_scenes", Some(sce))?;
    reg.add(IdKind::Library, "lib.blend")?;

    main.relations_create(RelationsFlags::empty())?;
    assert_eq!(main.clear(), 3);
    assert!(main.registry().is_empty());
    assert_eq!(main.registry().count_of_kind(IdKind::Scene), 0);
    assert!(!main.relations().is_built());

    // A cleared main can be filled and indexed again.
    main.registry_mut().add(IdKind::Image, "Im")?;
    let stats = main.relations_create(RelationsFlags::empty())?;
    assert_eq!(stats.entries, 1);
    Ok(())
}
