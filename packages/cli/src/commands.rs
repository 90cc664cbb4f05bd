//! Subcommand implementations.

use std::path::PathBuf;

use chi_pb_cli_utils::{IndicatifProgress, MultiProgress};
use chi_pb_inventory::InventoryReport;
use chi_pb_inventory::lookup::{self, AddressLookup};
use chi_pb_search_index::loader::IndexLoader;
use chi_pb_search_index::progress::ProgressCallback;
use chi_pb_search_index::resolve::Resolver;
use chi_pb_search_index::spatial::SpatialIndex;
use chi_pb_search_index::{
    BuildConfig, MatchTier, SearchIndexConfig, artifact, config, paths, verify,
};

pub async fn build_index(
    multi: &MultiProgress,
    config: &SearchIndexConfig,
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    no_compress: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let input_csv = input.unwrap_or_else(|| config::input_csv(config));
    let output_path = output.unwrap_or_else(|| config::output_path(config));

    let mut build_config = BuildConfig::from_config(config, &input_csv, &output_path);
    if no_compress {
        build_config.compress = false;
    }

    let progress = IndicatifProgress::records_spinner(multi, "Building search index");
    let stats = chi_pb_search_index::build_index(build_config, progress).await?;

    println!();
    println!("Index written to {}", output_path.display());
    println!("  addresses:     {}", stats.total_addresses);
    println!("  streets:       {}", stats.unique_streets);
    println!("  intersections: {}", stats.intersections);
    println!("  coerced rows:  {}", stats.coerced_rows);
    println!("  size:          {}", format_bytes(stats.artifact_size_bytes));
    if let Some(compressed) = stats.compressed_size_bytes {
        println!("  compressed:    {}", format_bytes(compressed));
    }
    println!("  time:          {:.1}s", stats.build_time_secs);

    Ok(())
}

pub async fn search(
    config: &SearchIndexConfig,
    source: Option<String>,
    query: &str,
    limit: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let resolver = load_resolver(config, source).await?;
    let resolution = resolver.resolve_detailed(query);

    let Some(tier) = resolution.tier else {
        println!("No street matches \"{query}\"");
        return Ok(());
    };

    if resolution.filtered_out() {
        println!(
            "No address on a matching street covers that house number ({} tier). Nearby:",
            tier.as_str()
        );
        for record in resolution.candidates.iter().take(limit) {
            println!("  {} (row {})", record.display_address, record.row_reference);
        }
        return Ok(());
    }

    println!(
        "{} match(es) for \"{query}\" ({} tier)",
        resolution.matches.len(),
        tier.as_str()
    );
    for record in resolution.matches.iter().take(limit) {
        println!(
            "  {:<45} row {:<8} {}",
            record.display_address,
            record.row_reference,
            record.lead_status().label()
        );
    }
    if resolution.matches.len() > limit {
        println!("  ... {} more", resolution.matches.len() - limit);
    }

    Ok(())
}

pub async fn nearby(
    config: &SearchIndexConfig,
    source: Option<String>,
    lat: f64,
    lng: f64,
    radius_feet: f64,
    limit: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let resolver = load_resolver(config, source).await?;
    let index = resolver.index();
    let spatial = SpatialIndex::from_index(index);
    let hits = spatial.records_within(index, lat, lng, radius_feet);

    println!(
        "{} address(es) within {radius_feet} ft of {lat}, {lng} ({} located)",
        hits.len(),
        spatial.len()
    );
    for (record, feet) in hits.iter().take(limit) {
        println!(
            "  {:<45} row {:<8} {:>7.0} ft  {}",
            record.display_address,
            record.row_reference,
            feet,
            record.lead_status().label()
        );
    }
    if hits.len() > limit {
        println!("  ... {} more", hits.len() - limit);
    }

    Ok(())
}

pub async fn build_inventory(
    multi: &MultiProgress,
    config: &SearchIndexConfig,
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    no_compress: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let input_csv = input.unwrap_or_else(|| config::input_csv(config));
    let output_path = output.unwrap_or_else(|| config::inventory_output_path(config));
    let compress = config.compress && !no_compress;

    let progress = IndicatifProgress::records_spinner(multi, "Building inventory lookup");
    let stats = lookup::build_lookup(&input_csv, &output_path, compress, progress).await?;

    println!();
    println!("Lookup written to {}", output_path.display());
    println!("  service lines: {}", stats.total_records);
    println!("  addresses:     {}", stats.unique_addresses);
    println!("  skipped rows:  {}", stats.skipped_rows);
    println!("  multi-line:    {}", stats.multi_line_addresses);
    println!("  size:          {}", format_bytes(stats.artifact_size_bytes));
    if let Some(compressed) = stats.compressed_size_bytes {
        println!("  compressed:    {}", format_bytes(compressed));
    }
    println!("  time:          {:.1}s", stats.build_time_secs);

    Ok(())
}

pub async fn inventory(
    config: &SearchIndexConfig,
    row: Option<u64>,
    address: Option<String>,
    source: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let reports = match (row, address) {
        (Some(row_id), _) => {
            let location =
                source.unwrap_or_else(|| paths::inventory_csv_path().display().to_string());
            chi_pb_inventory::scan::fetch_by_row_id(&location, row_id)
                .await?
                .into_iter()
                .collect::<Vec<_>>()
        }
        (None, Some(address)) => {
            let path = source.map_or_else(|| default_lookup_path(config), PathBuf::from);
            let lookup =
                tokio::task::spawn_blocking(move || AddressLookup::open(&path)).await??;
            lookup.find(&address)
        }
        (None, None) => return Err("either --row or --address is required".into()),
    };

    if reports.is_empty() {
        println!("No inventory records found");
        return Ok(());
    }

    for report in &reports {
        print_report(report);
    }

    Ok(())
}

/// Returns whether every smoke test passed.
pub async fn verify(
    multi: &MultiProgress,
    config: &SearchIndexConfig,
    source: Option<String>,
) -> Result<bool, Box<dyn std::error::Error>> {
    let resolver = load_resolver(config, source).await?;

    let spinner = IndicatifProgress::records_spinner(multi, "Running smoke tests");
    let report = verify::run_smoke_tests(resolver.index())?;
    spinner.finish(format!("{}/{} passed", report.passed, report.total));

    for result in &report.results {
        let mark = if result.passed { "PASS" } else { "FAIL" };
        let tier = result.tier.map_or("-", MatchTier::as_str);
        println!(
            "  {mark} {:<35} [{tier}] {}",
            result.query,
            result.matched_address.as_deref().unwrap_or("(none)")
        );
        if let Some(reason) = &result.failure_reason {
            println!("       {reason}");
        }
    }

    println!();
    println!("{}/{} smoke tests passed", report.passed, report.total);

    Ok(report.all_passed())
}

async fn load_resolver(
    config: &SearchIndexConfig,
    source: Option<String>,
) -> Result<Resolver, Box<dyn std::error::Error>> {
    let location = source.unwrap_or_else(|| config::index_source(config));
    let loader = IndexLoader::for_location(&location)?;
    let index = loader.get().await?;
    log::info!(
        "Index {} ({} addresses, built {})",
        index.metadata.version,
        index.metadata.total_addresses,
        index.metadata.generated_at
    );
    Ok(Resolver::new(index))
}

/// The configured lookup artifact, or its `.zst` copy when only that
/// exists.
fn default_lookup_path(config: &SearchIndexConfig) -> PathBuf {
    let plain = config::inventory_output_path(config);
    let packed = artifact::compressed_path(&plain);
    if !plain.exists() && packed.exists() {
        packed
    } else {
        plain
    }
}

fn print_report(report: &InventoryReport) {
    println!();
    println!("{} (row {})", report.full_address, report.row_id);
    println!("  lead status:        {}", report.lead_status.label());
    println!("  overall code:       {}", report.overall_code);
    println!("  service line:       {}", report.service_line_material);
    println!("  utility side:       {}", report.utility_side_material);
    println!("  customer side:      {}", report.customer_side_material);
    println!("  gooseneck:          {}", report.gooseneck);
    println!("  high risk:          {}", if report.high_risk { "yes" } else { "no" });
    println!("  confidence:         {}", report.confidence.label());
    if !report.additional_notes.is_empty() {
        println!("  notes:              {}", report.notes_text());
    }
}

fn format_bytes(bytes: u64) -> String {
    #[allow(clippy::cast_precision_loss)]
    let mb = bytes as f64 / 1_048_576.0;
    if mb >= 1.0 {
        format!("{mb:.1} MB")
    } else {
        format!("{bytes} bytes")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_sizes() {
        assert_eq!(format_bytes(512), "512 bytes");
        assert_eq!(format_bytes(3 * 1_048_576), "3.0 MB");
    }
}
