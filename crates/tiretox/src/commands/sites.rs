use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Table};
use tiretox_core::master::master_path;
use tiretox_core::PipelineConfig;

pub fn print_sites(config: &PipelineConfig) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec!["Site", "Patterns", "Barometric", "Companion", "Master"]);

    for site in &config.sites {
        let master = master_path(config, &site.name);
        table.add_row(vec![
            site.name.clone(),
            site.patterns.join(", "),
            if site.barometric { "yes" } else { "no" }.to_string(),
            site.companion.clone().unwrap_or_else(|| "-".to_string()),
            format!(
                "{}{}",
                master.display(),
                if master.exists() { "" } else { " (missing)" }
            ),
        ]);
    }

    println!("{table}");
    println!(
        "Barometric tolerance: {} min, destack interval: {} s, fence: [{}, {}] m",
        config.barometric_tolerance_minutes,
        config.destack_interval_seconds,
        config.fence.min,
        config.fence.max
    );
}
