//! Cache commands.

use calends_core::Zone;
use calends_providers::{CacheStats, CacheStore};
use chrono::{DateTime, Utc};

use crate::error::ClientResult;

/// Print cache statistics.
pub fn stats(store: &CacheStore, zone: &Zone) -> ClientResult<()> {
    let stats = store.stats()?;
    println!("cache: {}", store.dir().display());
    print!("{}", format_stats(&stats, zone));
    Ok(())
}

/// Remove every cached calendar.
pub fn clear(store: &CacheStore) -> ClientResult<()> {
    let removed = store.clear()?;
    match removed {
        1 => println!("Removed 1 cached calendar."),
        n => println!("Removed {} cached calendars.", n),
    }
    Ok(())
}

fn format_stats(stats: &CacheStats, zone: &Zone) -> String {
    let mut out = format!(
        "entries: {}\nsize:    {}\n",
        stats.entries,
        human_size(stats.total_bytes)
    );
    if let Some(oldest) = stats.oldest {
        out.push_str(&format!("oldest:  {}\n", format_time(oldest, zone)));
    }
    if let Some(newest) = stats.newest {
        out.push_str(&format!("newest:  {}\n", format_time(newest, zone)));
    }
    if stats.corrupt > 0 {
        out.push_str(&format!("corrupt: {}\n", stats.corrupt));
    }
    out
}

fn format_time(at: DateTime<Utc>, zone: &Zone) -> String {
    zone.naive_local(at).format("%Y-%m-%d %H:%M").to_string()
}

fn human_size(bytes: u64) -> String {
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
