//! Human-readable reports for the terminal
//!
//! This module renders store statistics, source listings, and job tables.

use crate::crawler::read_completion_marker;
use crate::sources::Source;
use crate::state::{CrawlJob, JobReport};
use crate::storage::DatabaseStats;
use std::path::Path;

/// Prints store statistics to stdout in a formatted manner
pub fn print_statistics(stats: &DatabaseStats) {
    println!("=== Product Store Statistics ===\n");

    println!("Overview:");
    println!("  Total products: {}", stats.total_products);
    println!("  Database size: {}", format_bytes(stats.size_bytes));
    match stats.last_updated {
        Some(at) => println!("  Last updated: {}", at.format("%Y-%m-%d %H:%M:%S UTC")),
        None => println!("  Last updated: never"),
    }
    println!();

    print_counts("Products by Source", &stats.by_source, stats.total_products);
    print_counts("Top Categories", &stats.top_categories, stats.total_products);
    print_counts("Top Brands", &stats.top_brands, stats.total_products);
}

fn print_counts(title: &str, counts: &[(String, u64)], total: u64) {
    if counts.is_empty() {
        return;
    }

    println!("{}:", title);
    for (name, count) in counts {
        let percentage = if total > 0 {
            (*count as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", name, count, percentage);
    }
    println!();
}

/// Prints configured sources with the time of their last completed run
pub fn print_sources(sources: &[std::sync::Arc<Source>], output_dir: &Path) {
    println!("=== Sources ===\n");
    for source in sources {
        let last_run = read_completion_marker(&output_dir.join(source.slug()))
            .map(|marker| marker.timestamp.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "never".to_string());
        println!(
            "  {} [{}]{}",
            source.name,
            source.sitemap_url,
            if source.enabled { "" } else { " (disabled)" }
        );
        println!(
            "    every {:.1}h, up to {} URLs, concurrency {}, last run: {}",
            source.interval.as_secs_f64() / 3600.0,
            source.max_urls,
            source.concurrency,
            last_run
        );
    }
    println!();
}

/// Prints the scheduler's job table
pub fn print_jobs(jobs: &[CrawlJob]) {
    println!("{:<20} {:<10} {:<20} {}", "SOURCE", "STATUS", "NEXT RUN", "LAST RESULT");
    for job in jobs {
        let last = match &job.last_report {
            Some(JobReport::Completed(summary)) => format!(
                "{} products, {} failed",
                summary.products_found, summary.failed
            ),
            Some(JobReport::Failed { error, .. }) => format!("error: {}", error),
            None => "-".to_string(),
        };
        println!(
            "{:<20} {:<10} {:<20} {}",
            job.source_name,
            job.status,
            job.next_run_at.format("%Y-%m-%d %H:%M:%S"),
            last
        );
    }
}

/// Formats a byte count with a binary unit suffix
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
