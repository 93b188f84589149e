//! List Caching Example
//!
//! Runs a paged listing through the cached executor and shows hits, count
//! short-circuits, invalidation and suppression.
//!
//! Run with `RUST_LOG=listcache=debug` to see cache decisions.

use anyhow::Result;
use listcache::{CacheConfig, ChangeOrigin, DataChange, ListCache, MemoryCacheStore};
use listcache_core::TenantId;
use listcache_examples::{front_page, Blog};
use listcache_executor::CachedListExecutor;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "list_caching=info,listcache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!("=== List Caching Example ===\n");

    let blog = Blog::new();
    for id in 1..=7 {
        blog.publish(id, format!("Post number {}", id));
    }

    let store = Arc::new(MemoryCacheStore::with_defaults());
    let cache = Arc::new(ListCache::new(store, CacheConfig::default(), TenantId(1)));
    let executor = CachedListExecutor::with_cache(Arc::clone(&blog), Arc::clone(&cache));

    // Example 1: miss then hit
    println!("--- Example 1: Miss, then hit ---\n");
    for attempt in 1..=2 {
        let result = executor.execute(&front_page(1, 3), blog.as_ref()).await?;
        let titles: Vec<_> = result.objects.iter().flatten().map(|p| p.title.as_str()).collect();
        println!(
            "  attempt {}: from_cache={} found_rows={:?} backend_queries={} {:?}",
            attempt,
            result.from_cache,
            result.found_rows,
            blog.queries(),
            titles
        );
    }

    // Example 2: a new post invalidates every listing
    println!("\n--- Example 2: Invalidation ---\n");
    blog.publish(8, "Fresh post");
    let outcome = executor.on_data_changed(&DataChange::object_changed(8u64));
    info!(?outcome, group = %cache.current_group(), "Published post 8");
    let result = executor.execute(&front_page(1, 3), blog.as_ref()).await?;
    println!(
        "  after publish: from_cache={} first={:?}",
        result.from_cache,
        result.objects.first().and_then(|p| p.as_ref()).map(|p| p.id)
    );

    // Example 3: previews and suppressed bulk edits keep the cache
    println!("\n--- Example 3: Exempt and suppressed changes ---\n");
    executor.on_data_changed(&DataChange::object_changed(8u64).with_origin(ChangeOrigin::Preview));
    {
        let _guard = cache.suppression_guard();
        for id in 1..=3u64 {
            executor.on_data_changed(&DataChange::object_changed(id));
        }
    }
    let result = executor.execute(&front_page(1, 3), blog.as_ref()).await?;
    println!("  after preview and suppressed edits: from_cache={}", result.from_cache);

    // Example 4: statistics
    println!("\n--- Example 4: Statistics ---\n");
    let stats = executor.cache_stats();
    println!("  hits:                 {}", stats.hits());
    println!("  misses:               {}", stats.misses());
    println!("  hit rate:             {:.1}%", stats.hit_rate() * 100.0);
    println!("  count short-circuits: {}", stats.count_short_circuits());
    println!("  generation advances:  {}", stats.advances());
    println!("  suppressed:           {}", stats.suppressed());
    println!("  exempt:               {}", stats.exempt());

    println!("\n=== List caching example completed! ===");
    Ok(())
}
