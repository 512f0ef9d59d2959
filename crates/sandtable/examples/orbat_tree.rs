//! ORBAT Tree — build a small brigade, reshuffle it, save and reload it.
//!
//! Prints the tree after each step and the stats at the end. The saved file
//! lands in the system temp directory as `wargame-orbat.json`.
//!
//! Run with: `RUST_LOG=debug cargo run -p sandtable --example orbat_tree`

use sandtable::prelude::*;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = SandboxConfig::from_env()?;
    let bus = EventBus::new();
    bus.subscribe_all(|event| {
        log::info!("{}", event.kind().name());
        Ok(())
    });

    let mut orbat = Orbat::new(bus);

    // ── Build ────────────────────────────────────────────────────────────

    let bde = orbat
        .add_unit(UnitSpec::named("1st Armoured Brigade").with_level(UnitLevel::Brigade))?
        .id
        .clone();
    let bn1 = orbat
        .add_unit(
            UnitSpec::named("1st Tank Battalion")
                .with_level(UnitLevel::Battalion)
                .with_parent(&bde),
        )?
        .id
        .clone();
    let bn2 = orbat
        .add_unit(
            UnitSpec::named("2nd Mech Battalion")
                .with_level(UnitLevel::Battalion)
                .with_parent(&bde),
        )?
        .id
        .clone();

    let companies = ["A", "B", "C"]
        .iter()
        .map(|c| {
            UnitSpec::named(format!("{c} Company"))
                .with_parent(&bn1)
                .with_strength(90, 120)
        })
        .collect::<Vec<_>>();
    let coys = orbat.add_units(companies)?;
    orbat.add_unit(
        UnitSpec::named("Recce Squadron")
            .with_level(UnitLevel::Company)
            .with_branch(ServiceBranch::Army),
    )?;

    println!("── built");
    print_tree(&orbat.tree(), 0);

    // ── Reshuffle ────────────────────────────────────────────────────────

    orbat.move_unit(&coys[2], Some(&bn2))?;
    orbat.update_unit(
        &coys[0],
        UnitPatch {
            strength: Some(60),
            fuel: Some(35.0),
            ..UnitPatch::default()
        },
    )?;
    if let Err(e) = orbat.move_unit(&bde, Some(&coys[1])) {
        println!("rejected: {e}");
    }

    println!("── after reshuffle");
    print_tree(&orbat.tree(), 0);

    // ── Save / load ──────────────────────────────────────────────────────

    let dir = std::env::temp_dir();
    let mut store = FileStore::open(&dir, config.storage.prefix.as_str())?;
    save_orbat(&mut store, &config.storage.orbat_key, &orbat)?;

    orbat.remove_unit(&bn1)?;
    println!("── after removing {bn1}");
    print_tree(&orbat.tree(), 0);

    load_orbat(&store, &config.storage.orbat_key, &mut orbat)?;
    println!("── reloaded from {}", store.dir().display());
    print_tree(&orbat.tree(), 0);

    let stats = orbat.stats();
    println!("{} units", stats.total);
    for (level, n) in &stats.by_level {
        println!("  {:<10} {n}", level.as_str());
    }

    Ok(())
}

fn print_tree(nodes: &[TreeNode], depth: usize) {
    for node in nodes {
        println!("{}{} [{}] {}", "  ".repeat(depth), node.name, node.level, node.symbol_code);
        print_tree(&node.children, depth + 1);
    }
}
