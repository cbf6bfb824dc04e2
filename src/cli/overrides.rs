use super::ui;
use crate::core::overrides::OverrideStore;
use anyhow::Result;
use comfy_table::Cell;
use tracing::info;

pub fn display_as_table(store: &OverrideStore) -> String {
    if store.is_empty() {
        return ui::style_text("No classification overrides set.", ui::StyleType::Subtle);
    }

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Transaction"),
        ui::header_cell("Classification"),
        ui::header_cell("Note"),
    ]);
    for (hash, entry) in store.all() {
        table.add_row(vec![
            Cell::new(hash),
            ui::classification_cell(entry.classification, false),
            Cell::new(entry.note.as_deref().unwrap_or("")),
        ]);
    }
    table.to_string()
}

pub fn list(store: &OverrideStore) -> Result<()> {
    println!("{}", display_as_table(store));
    Ok(())
}

pub fn set(
    store: &mut OverrideStore,
    hash: &str,
    classification: &str,
    note: Option<String>,
) -> Result<()> {
    store.set_from_str(hash, classification, note)?;
    let stored = store
        .get(hash.trim())
        .map(|c| c.to_string())
        .unwrap_or_default();
    info!("Override set for {}: {}", hash.trim(), stored);
    println!(
        "{} {} -> {}",
        ui::style_text("Override set:", ui::StyleType::TotalLabel),
        hash.trim(),
        ui::style_text(&stored, ui::StyleType::TotalValue)
    );
    Ok(())
}

pub fn remove(store: &mut OverrideStore, hash: &str) -> Result<()> {
    if store.remove(hash)? {
        println!(
            "{} {}",
            ui::style_text("Override removed:", ui::StyleType::TotalLabel),
            hash.trim()
        );
    } else {
        println!(
            "{}",
            ui::style_text(
                &format!("No override set for {}", hash.trim()),
                ui::StyleType::Subtle
            )
        );
    }
    Ok(())
}
