//! `seedgate check` – print the resolved config and each schedule's state.

use anyhow::Result;
use chrono::Local;
use seedgate_core::config::SeedgateConfig;
use seedgate_core::schedule::WindowState;
use std::path::Path;

pub fn run_check(cfg: &SeedgateConfig, path: &Path) -> Result<()> {
    let units = cfg.units;
    println!("Config: {} (ok)", path.display());
    println!("Upload:   {} - {} {}", cfg.min_upload, cfg.max_upload, units);
    println!("Download: {} - {} {}", cfg.min_download, cfg.max_download, units);

    println!();
    println!("{:<14} {}", "CLIENT", "URL");
    for client in &cfg.clients {
        println!("{:<14} {}", client.kind.as_str(), client.url);
    }

    if !cfg.media_servers.is_empty() {
        println!();
        println!("{:<14} {:<10} {:<10} {}", "MEDIA SERVER", "INTERVAL", "MULTIPLIER", "URL");
        for server in &cfg.media_servers {
            println!(
                "{:<14} {:<10} {:<10} {}",
                server.kind.as_str(),
                format!("{}s", server.update_interval),
                server.bandwidth_multiplier,
                server.url
            );
        }
    }

    let windows = cfg.schedule_windows()?;
    if !windows.is_empty() {
        let now = Local::now();
        println!();
        println!(
            "{:<26} {:<10} {:<10} {:<8} {}",
            "SCHEDULE", "UPLOAD", "DOWNLOAD", "STATE", "NEXT CHANGE"
        );
        for window in &windows {
            let decision = window.decide(&now)?;
            let state = match decision.state {
                WindowState::InsideWindow => "active",
                WindowState::OutsideWindow => "idle",
            };
            let reduction = window.reduction();
            println!(
                "{:<26} {:<10} {:<10} {:<8} {}",
                window.label(),
                format!("-{}", reduction.upload),
                format!("-{}", reduction.download),
                state,
                decision.wake_at().format("%a %Y-%m-%d %H:%M")
            );
        }
    }

    Ok(())
}
