//! `blockgraph inspect`: build a small demo scene and print its relations.

use anyhow::Result;
use colored::Colorize;
use std::fmt::Write as _;

use blockgraph_main::{DataBlock, IdKind, Main, RelationsConfig, UsageFlags};

/// A scene with a camera, a lit cube and the usual window-manager plumbing.
pub(crate) fn demo_main(config: RelationsConfig) -> Result<Main> {
    let mut main = Main::with_config(config);
    let reg = main.registry_mut();

    let image = reg.add(IdKind::Image, "Checker")?;
    let material = reg.add(IdKind::Material, "Material")?;
    reg.append(material, "nodetree.node_ids", Some(image))?;

    let mesh = reg.add(IdKind::Mesh, "Cube")?;
    reg.append(mesh, "materials", Some(material))?;
    let camera_data = reg.add(IdKind::Camera, "Camera")?;
    let light_data = reg.add(IdKind::Light, "Light")?;
    let world = reg.add(IdKind::World, "World")?;

    let cube = reg.add(IdKind::Object, "Cube")?;
    reg.link(cube, "data", Some(mesh))?;
    let camera = reg.add(IdKind::Object, "Camera")?;
    reg.link(camera, "data", Some(camera_data))?;
    reg.link(camera_data, "dof_object", Some(cube))?;
    let light = reg.add(IdKind::Object, "Light")?;
    reg.link(light, "data", Some(light_data))?;
    reg.link(light, "parent", Some(camera))?;

    let scene = reg.add(IdKind::Scene, "Scene")?;
    reg.link(scene, "camera", Some(camera))?;
    reg.link(scene, "world", Some(world))?;
    for ob in [cube, camera, light] {
        reg.append(scene, "master_collection.objects", Some(ob))?;
    }

    let screen = reg.add(IdKind::Screen, "Layout")?;
    reg.append(screen, "space_images", Some(image))?;
    reg.link(screen, "view_object", Some(cube))?;
    let workspace = reg.add(IdKind::WorkSpace, "Layout")?;
    reg.append(workspace, "screens", Some(screen))?;
    let wm = reg.add(IdKind::WindowManager, "WinMan")?;
    reg.append(wm, "window_scenes", Some(scene))?;
    reg.append(wm, "window_workspaces", Some(workspace))?;

    Ok(main)
}

fn label(block: &DataBlock) -> String {
    format!("{}{}", block.kind().code(), block.name())
}

fn usage_tag(usage: UsageFlags) -> String {
    let mut tags = Vec::new();
    for (name, flag) in [
        ("user", UsageFlags::USER),
        ("weak", UsageFlags::WEAK),
        ("user_one", UsageFlags::USER_ONE),
        ("embedded", UsageFlags::EMBEDDED),
        ("ui", UsageFlags::UI_ONLY),
        ("loopback", UsageFlags::LOOPBACK),
    ] {
        if usage.contains(flag) {
            tags.push(name);
        }
    }
    tags.join(",")
}

/// One block per paragraph: its outgoing slots, then who points at it.
pub(crate) fn render_relations(main: &Main) -> String {
    let reg = main.registry();
    let index = main.relations();
    let mut out = String::new();

    for block in reg.iter() {
        let Some(entry) = index.lookup(block.id()) else {
            continue;
        };
        let _ = writeln!(out, "{} {}", label(block).bold(), block.id().to_string().dimmed());

        for record in index.outgoing(entry) {
            let field = record.field.path.describe(block.kind());
            let target = match record.peer.and_then(|id| reg.get(id)) {
                Some(target) if !record.is_unset() => label(target).green().to_string(),
                _ => "null".dimmed().to_string(),
            };
            let _ = writeln!(
                out,
                "  -> {} = {} [{}]",
                field.cyan(),
                target,
                usage_tag(record.usage)
            );
        }

        for record in index.incoming(entry) {
            let Some(owner) = record.peer.and_then(|id| reg.get(id)) else {
                continue;
            };
            let field = record.field.path.describe(owner.kind());
            let line = format!("  <- {}.{}", label(owner), field);
            let line = if record.usage.contains(UsageFlags::UI_ONLY) {
                line.yellow()
            } else {
                line.normal()
            };
            let _ = writeln!(out, "{line}");
        }
    }
    out
}

pub fn cmd_inspect(config: RelationsConfig, include_ui: bool) -> Result<()> {
    let mut main = demo_main(config)?;
    let mut flags = main.config().flags();
    if include_ui {
        flags |= blockgraph_main::RelationsFlags::INCLUDE_UI;
    }
    let stats = main.relations_create(flags)?;

    print!("{}", render_relations(&main));
    println!(
        "{} entries={} outgoing={} incoming={} unset={}",
        "summary".bold(),
        stats.entries,
        stats.outgoing,
        stats.incoming,
        stats.unset
    );
    main.clear();
    Ok(())
}
