use crate::models::{ArchiveSet, MapOptions, Project};
use crate::services::assets::AssetEntry;

const RULE: &str = "══════════";

/// Render the pre-run overview of every archive set and the global settings.
///
/// Only enabled maps are listed. With `verbose` every resolved asset pair is listed
/// instead of just the totals.
pub fn render_project_summary(project: &Project, verbose: bool) -> Vec<String> {
    let mut lines = Vec::new();
    let set_count = project.archive_sets.len();

    for (index, set) in project.archive_sets.iter().enumerate() {
        let corner = if index == 0 { '╔' } else { '╠' };
        lines.push(format!("{}{}[ {} ]", corner, RULE, set.name));

        let mut body = Vec::new();
        render_archive_set(project, set, verbose, &mut body);
        lines.extend(body.into_iter().map(|line| format!("║ {}", line)));

        if index + 1 == set_count {
            lines.push("╚]".to_string());
        }
        lines.push(String::new());
    }

    lines.push(format!("╔{}[ Settings ]", RULE));
    let settings = &project.settings;
    let mut body = vec![
        format!("Bspzip Path: {}", settings.bspzip_path),
        format!("Output Path: {}", settings.output_path),
        format!("Force Map Compression: {}", settings.force_map_compression),
        format!("Upload Maps To Workshop: {}", settings.upload_maps_to_workshop),
    ];
    if !settings.extension_whitelist.is_empty() {
        body.push(format!("Extension Whitelist: {}", settings.extension_whitelist));
    }
    render_assets(
        "Global Assets",
        &project.resolved_global_assets,
        verbose,
        &mut body,
    );
    lines.extend(body.into_iter().map(|line| format!("║ {}", line)));
    lines.push("╚]".to_string());

    lines
}

/// Log the summary through `tracing`, one line per event
pub fn log_project_summary(project: &Project, verbose: bool) {
    for line in render_project_summary(project, verbose) {
        tracing::info!("{}", line);
    }
}

fn render_archive_set(project: &Project, set: &ArchiveSet, verbose: bool, out: &mut Vec<String>) {
    let mut any_uses_assets = false;

    for (index, map) in set.enabled_maps().enumerate() {
        let corner = if index == 0 { '╔' } else { '╠' };
        out.push(format!("{}{}[ {} ]", corner, RULE, map.name));

        let mut body = Vec::new();
        render_map(project, map, verbose, &mut body);
        out.extend(body.into_iter().map(|line| format!("║ {}", line)));

        any_uses_assets |= !map.ignore_assets;
    }

    if set.enabled_maps().next().is_some() {
        out.push("╚]".to_string());
    }

    if any_uses_assets {
        render_assets("Shared Assets", &set.resolved_shared_assets, verbose, out);
    }
}

fn render_map(project: &Project, map: &MapOptions, verbose: bool, out: &mut Vec<String>) {
    out.push("Bsp Settings:".to_string());
    out.push(format!("Config: {}", map.config_name));
    out.push(format!("Source Path: {}", map.source_path));
    out.push(format!("Absolute Output Path: {}", map.output_path));
    out.push(format!("Compress: {}", map.compress));
    out.push(format!("Ignore Assets: {}", map.ignore_assets));

    if project.settings.upload_maps_to_workshop && map.workshop.upload {
        out.push("Workshop Settings:".to_string());
        out.push(format!("- ID: {}", map.workshop.id));
        out.push(format!("- Visibility: {}", map.workshop.visibility));
        out.push(format!("- Changelog: {}", map.workshop.changelog));
    }

    if !map.ignore_assets {
        render_assets("Assets", &map.resolved_assets, verbose, out);
    }
}

fn render_assets(label: &str, assets: &[AssetEntry], verbose: bool, out: &mut Vec<String>) {
    if assets.is_empty() {
        return;
    }

    if verbose {
        out.push(format!("╔{}[ {} ]", RULE, label));
        for asset in assets {
            out.push(format!("║ {} >> {}", asset.internal_path, asset.source_path));
        }
        out.push(format!("╚{}[ Total {}: {} ]", RULE, label, assets.len()));
    } else {
        out.push(format!("Total {}: {}", label, assets.len()));
    }
}
