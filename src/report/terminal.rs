use anyhow::Result;
use colored::*;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use super::aggregator::{OutputLayout, RunSummary};
use crate::models::{ClassificationSource, TextPath};

/// Render the end-of-run summary.
pub fn render(summary: &RunSummary, layout: &OutputLayout, verbose: bool, quiet: bool) -> Result<()> {
    let resolved = summary.resolved.len();
    let texts = summary.texts();
    let skipped = summary.skipped.len();

    if quiet {
        println!("{}", quiet_line(summary));
        return Ok(());
    }

    println!(
        "\n {} v{}",
        "license-bundlr".bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!(" Output: {}\n", layout.root.display());

    println!(" ┌────────────────────────────────────────────────────┐");
    println!(" │  {:<48} │", "SUMMARY".bold());
    println!(
        " │  {:<48} │",
        format!("Packages           : {}", summary.attempted)
    );
    println!(
        " │  {:<48} │",
        format!("{}  Resolved        : {:>4}", "✓".green(), resolved)
    );
    println!(
        " │  {:<48} │",
        format!("{}  License texts   : {:>4}", "✓".green(), texts)
    );
    println!(
        " │  {:<48} │",
        format!("{}  Skipped         : {:>4}", "✗".red(), skipped)
    );
    println!(
        " │  {:<48} │",
        format!("   License groups  : {:>4}", summary.groups.len())
    );
    println!(" └────────────────────────────────────────────────────┘\n");

    render_groups(summary);

    if !summary.skipped.is_empty() {
        println!(
            " {} Packages needing manual review:\n",
            "[SKIPPED]".yellow().bold()
        );
        for entry in &summary.skipped {
            println!(
                "   {} {} ({}): {}",
                "•".yellow(),
                entry.identity,
                entry.stage,
                entry.reason
            );
        }
        println!();
    }

    if !summary.group_failures.is_empty() {
        println!(
            " {} License groups not written to {}:\n",
            "[ERROR]".red().bold(),
            layout.groups_dir.display()
        );
        for (label, reason) in &summary.group_failures {
            println!("   {} {}: {}", "•".red(), label, reason);
        }
        println!();
    }

    if verbose && resolved > 0 {
        println!(" {} All resolved packages:\n", "[RESOLVED]".green().bold());
        render_packages(summary);
        println!();
    }

    Ok(())
}

fn quiet_line(summary: &RunSummary) -> String {
    format!(
        "Packages: {}  Resolved: {}  Texts: {}  Skipped: {}",
        summary.attempted,
        summary.resolved.len().to_string().green(),
        summary.texts().to_string().green(),
        summary.skipped.len().to_string().red(),
    )
}

fn render_groups(summary: &RunSummary) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("License").add_attribute(Attribute::Bold),
            Cell::new("Packages").add_attribute(Attribute::Bold),
        ]);

    let mut groups: Vec<(&String, &Vec<String>)> = summary.groups.iter().collect();
    groups.sort_by(|a, b| b.1.len().cmp(&a.1.len()).then(a.0.cmp(b.0)));

    for (label, names) in groups {
        table.add_row(vec![
            Cell::new(label),
            Cell::new(names.len()).set_alignment(CellAlignment::Right),
        ]);
    }

    println!("{}\n", table);
}

fn render_packages(summary: &RunSummary) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Name").add_attribute(Attribute::Bold),
            Cell::new("Version").add_attribute(Attribute::Bold),
            Cell::new("License").add_attribute(Attribute::Bold),
            Cell::new("Source").add_attribute(Attribute::Bold),
            Cell::new("Text").add_attribute(Attribute::Bold),
        ]);

    for outcome in &summary.resolved {
        let record = &outcome.record;
        let source_color = match record.classification.source {
            ClassificationSource::PrimaryField => Color::Green,
            ClassificationSource::ClassifierFallback => Color::Yellow,
            ClassificationSource::Override => Color::Magenta,
        };
        let (text, text_color) = match outcome.text {
            Some(TextPath::Direct) => ("✓ direct", Color::Green),
            Some(TextPath::Archive) => ("✓ archive", Color::Green),
            None => ("✗ missing", Color::Red),
        };

        table.add_row(vec![
            Cell::new(&record.identity.name),
            Cell::new(&record.identity.version),
            Cell::new(record.classification.display_label()),
            Cell::new(record.classification.source.to_string()).fg(source_color),
            Cell::new(text)
                .fg(text_color)
                .set_alignment(CellAlignment::Center),
        ]);
    }

    println!("{}", table);
}
