use crate::output::{print_json, print_table};
use anyhow::Context;
use woodlink_core::config::Config;
use woodlink_core::reconcile;
use woodlink_core::store::WoodlinkDb;

pub fn run(config: &Config, json: bool) -> anyhow::Result<()> {
    let db = WoodlinkDb::open(&config.db_path)
        .with_context(|| format!("failed to open {}", config.db_path.display()))?;
    let report = reconcile::run(&db, &db)?;

    if json {
        return print_json(&report);
    }
    if report.repaired.is_empty() {
        println!("Checked {} items. Nothing to repair.", report.checked);
        return Ok(());
    }
    let rows = report
        .repaired
        .iter()
        .map(|r| vec![r.item_id.to_string(), r.from.to_string(), r.to.to_string()])
        .collect();
    print_table(&["ITEM", "FROM", "TO"], rows);
    println!(
        "\nChecked {} items, repaired {}.",
        report.checked,
        report.repaired.len()
    );
    Ok(())
}
