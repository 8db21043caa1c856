use crate::models::DiagnosticsResponse;
use crate::ws::registry::SessionRegistry;
use axum::{extract::State, http::StatusCode, Json};
use std::sync::{Arc, Mutex, OnceLock};
use sysinfo::System;
use tracing::info;

static SYSTEM_MONITOR: OnceLock<Mutex<System>> = OnceLock::new();

/// Session and system counters for operators
pub async fn diagnostics(
    State(registry): State<Arc<SessionRegistry>>,
) -> (StatusCode, Json<DiagnosticsResponse>) {
    let stats = registry.stats().await;

    // System stats
    let (cpu_usage, memory_alloc, memory_free, memory_total) = {
        let sys_lock = SYSTEM_MONITOR.get_or_init(|| {
            Mutex::new(System::new_all())
        });
        match sys_lock.lock() {
            Ok(mut sys) => {
                sys.refresh_cpu();
                sys.refresh_memory();
                (
                    sys.global_cpu_info().cpu_usage(),
                    sys.used_memory(),
                    sys.free_memory(),
                    sys.total_memory(),
                )
            }
            Err(_) => (0.0, 0, 0, 0)
        }
    };

    info!(
        "Diagnostics: CPU: {:.2}%, Mem: {}/{} MB (Free: {} MB), Conn: {}, Pages: {}",
        cpu_usage,
        memory_alloc / 1024 / 1024,
        memory_total / 1024 / 1024,
        memory_free / 1024 / 1024,
        stats.n_clients,
        stats.n_active_pages
    );

    (
        StatusCode::OK,
        Json(DiagnosticsResponse {
            n_conn: stats.n_clients,
            n_active_pages: stats.n_active_pages,
            n_idle_pages: stats.n_idle_pages,
            n_dirty_pages: stats.n_dirty_pages,
            cpu_usage,
            memory_alloc,
            memory_total,
            memory_free,
        }),
    )
}
