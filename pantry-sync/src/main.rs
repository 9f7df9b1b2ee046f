use std::sync::Arc;

use anyhow::Context;
use pantry_sync::{
    BackendSelector, ChangeBus, Config, InventoryService, LocalStore, setup_environment,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. 加载配置 (.env + 环境变量)
    dotenv::dotenv().ok();
    let config = Config::from_env();

    // 2. 工作目录与日志
    setup_environment(&config).context("Failed to prepare work directory")?;
    tracing::info!(work_dir = %config.work_dir, "Pantry sync starting...");

    // 3. 本地存储
    let db_path = config.db_path();
    let mut local = LocalStore::open(&db_path)
        .with_context(|| format!("Failed to open local store at {}", db_path.display()))?;
    if let Some(quota) = config.local_quota_bytes {
        local = local.with_quota(quota);
    }

    // 4. 后端选择: 已保存配置优先，其次环境变量
    let bus = ChangeBus::with_capacity(config.bus_capacity);
    let selector = Arc::new(
        BackendSelector::new(local, bus).with_remote_timeout(config.remote_timeout()),
    );
    let mode = selector.restore_saved().await;
    if !selector.is_remote().await
        && let Some((endpoint, credential)) = config.bootstrap_remote()
    {
        if let Err(e) = selector.configure(endpoint, credential).await {
            tracing::warn!("Remote bootstrap from environment failed: {e}");
        }
    }
    tracing::info!(restored = %mode, active = %selector.mode().await, "Backend ready");

    // 5. 服务 + 初始数据
    let service = InventoryService::new(selector.clone());
    if config.seed_on_start {
        match service.seed_initial_data().await {
            Ok(true) => tracing::info!("Starter catalog written"),
            Ok(false) => {}
            Err(e) => tracing::warn!("Seeding failed: {e}"),
        }
    }

    // 6. 观察变更直到 Ctrl-C
    let mut changes = service.subscribe();
    log_summary(&service, config.low_stock_threshold).await;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown signal received");
                break;
            }
            alive = changes.changed() => {
                if !alive {
                    break;
                }
                log_summary(&service, config.low_stock_threshold).await;
            }
        }
    }

    selector.shutdown().await;
    tracing::info!("Pantry sync stopped");
    Ok(())
}

async fn log_summary(service: &InventoryService, low_stock_threshold: u32) {
    let summary = service.stock_summary(low_stock_threshold).await;
    let queue = service.get_active_orders().await;
    tracing::info!(
        items = summary.items,
        low_stock = summary.low_stock,
        out_of_stock = summary.out_of_stock,
        active_orders = queue.len(),
        "Catalog updated"
    );
    for order in &queue {
        tracing::debug!(
            order_id = %order.id,
            room = %order.room_number,
            status = %order.status,
            items = order.total_quantity(),
            "Queued order"
        );
    }
}
