use anyhow::{Context, Result};
use deepbook_quoter::{
    amount::{TokenAmount, to_base_units, to_decimal_string},
    config::AppConfig,
    dex::{
        BcsCallEncoder, DevInspectRegistry, FallbackRegistry, FilePairStore, PoolDirectory,
        PoolRegistry, PoolStateReader, StaticRegistry, spawn_balance_watcher, spawn_pool_watcher,
    },
    ledger::{Ledger, SuiRpcClient},
    models::{OrderIntent, OrderType, Side},
    orderbook::{aggregate, project_book},
    quote::PairDecimals,
    utils,
    validation::OrderValidator,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    utils::init_logging();

    let cfg = AppConfig::load().context("loading configuration")?;
    let run = &cfg.run;
    let base = cfg
        .token(&run.base_symbol)
        .cloned()
        .with_context(|| format!("unknown token {}", run.base_symbol))?;
    let quote = cfg
        .token(&run.quote_symbol)
        .cloned()
        .with_context(|| format!("unknown token {}", run.quote_symbol))?;
    tracing::info!(
        rpc = %cfg.rpc_url,
        pair = %format!("{}/{}", base.symbol, quote.symbol),
        refresh_ms = cfg.engine.refresh_interval.as_millis() as u64,
        "[INIT] deepbook-quoter starting"
    );

    // Wiring ---------------------------------------------------------------
    let ledger: Arc<dyn Ledger> = Arc::new(SuiRpcClient::new(&cfg.rpc_url)?);
    let reader = PoolStateReader::new(ledger.clone(), cfg.engine.min_liquidity);
    let on_chain: Arc<dyn PoolRegistry> = Arc::new(DevInspectRegistry::new(
        ledger.clone(),
        Arc::new(BcsCallEncoder),
        cfg.deepbook_package.clone(),
        cfg.registry_id.clone(),
    ));
    let registry: Arc<dyn PoolRegistry> = if cfg.static_pools.is_empty() {
        on_chain
    } else {
        let mut fixed = StaticRegistry::new();
        for pool in &cfg.static_pools {
            let (Some(b), Some(q)) = (cfg.token(&pool.base_symbol), cfg.token(&pool.quote_symbol))
            else {
                tracing::warn!(pool_id = %pool.pool_id, "[INIT] POOL_IDS entry names an unknown token");
                continue;
            };
            fixed = fixed.with_pool(&b.coin_type, &q.coin_type, &pool.pool_id);
        }
        Arc::new(FallbackRegistry::new(on_chain, Arc::new(fixed)))
    };
    let directory = PoolDirectory::new(
        reader.clone(),
        registry,
        Arc::new(FilePairStore::new(&cfg.store_dir)),
        &cfg.engine,
    );

    // Discovery ------------------------------------------------------------
    match directory.load_persisted().await {
        Ok(n) => tracing::info!(pairs = n, "[INIT] persisted pairs loaded"),
        Err(e) => tracing::warn!(error = %e, "[INIT] persisted pairs unreadable"),
    }
    if !directory.is_initialized() {
        let pairs = directory.discover_all(&cfg.tokens).await?;
        tracing::info!(pairs = pairs.len(), "[INIT] pool discovery finished");
    }
    let identity = directory
        .resolve(&base.coin_type, &quote.coin_type)
        .await
        .context("resolving pool")?;
    tracing::info!(pool_id = %identity.pool_id, "[INIT] pool resolved");

    // Snapshot + book ------------------------------------------------------
    let decimals = PairDecimals {
        base: base.decimals,
        quote: quote.decimals,
    };
    let snapshot = reader.fetch(&identity.pool_id).await?;
    let book = project_book(&snapshot);
    tracing::info!(
        best_bid = ?book.best_bid(),
        best_ask = ?book.best_ask(),
        spread = ?book.spread(),
        mid = ?book.mid_price(),
        "[BOOK] projected"
    );
    let top_bids = aggregate(&snapshot.bids, 5, false);
    let top_asks = aggregate(&snapshot.asks, 5, true);
    tracing::info!(bids = ?top_bids, asks = ?top_asks, "[BOOK] top levels");

    // One-shot quote + validation ------------------------------------------
    if let Some(raw_amount) = &run.quote_amount {
        let amount = to_base_units(raw_amount, base.decimals)?;
        let slippage = run.slippage;
        let balance = match &cfg.wallet_address {
            Some(owner) => {
                let raw = ledger.get_balance(owner, &base.coin_type).await?;
                TokenAmount::new(raw, base.decimals)?
            }
            None => amount,
        };
        let intent = OrderIntent {
            side: Side::Sell,
            order_type: OrderType::Market,
            price: None,
            amount,
            slippage,
        };
        let validator = OrderValidator::from_engine_config(&cfg.engine);
        let result = validator.validate(&intent, Some(&snapshot), &balance, decimals)?;
        if let Some(q) = &result.quote {
            tracing::info!(
                input = %to_decimal_string(&amount),
                estimated = %to_decimal_string(&q.estimated_output),
                minimum = %to_decimal_string(&q.minimum_output),
                impact = %q.price_impact.message(),
                "[QUOTE] sell preview"
            );
        }
        if let Some(warning) = &result.warning {
            tracing::warn!(%warning, "[QUOTE] slippage advisory");
        }
        match result.ensure_valid(&identity.pool_id) {
            Ok(()) => tracing::info!("[QUOTE] order would be accepted"),
            Err(e) => tracing::warn!(error = %e, "[QUOTE] order would be rejected"),
        }
    }

    // Watchers -------------------------------------------------------------
    let (trigger, shutdown) = utils::shutdown_channel();
    let every = cfg.engine.refresh_interval;
    let (mut pool_feed, pool_handle) =
        spawn_pool_watcher(reader.clone(), identity.pool_id.clone(), every, shutdown.clone());
    let mut handles = vec![pool_handle];
    let mut balance_feed = cfg.wallet_address.clone().map(|owner| {
        let (feed, handle) = spawn_balance_watcher(
            ledger.clone(),
            owner,
            base.coin_type.clone(),
            base.decimals,
            every,
            shutdown.clone(),
        );
        handles.push(handle);
        feed
    });
    tracing::info!(interval_ms = every.as_millis() as u64, "[INIT] watchers started");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = pool_feed.changed() => {
                if changed.is_err() {
                    break;
                }
                if let Some(update) = pool_feed.borrow_and_update().clone() {
                    let book = project_book(&update.value);
                    tracing::info!(
                        seq = update.seq,
                        base_balance = %update.value.base_balance,
                        quote_balance = %update.value.quote_balance,
                        best_bid = ?book.best_bid(),
                        best_ask = ?book.best_ask(),
                        "[HEARTBEAT] pool refreshed"
                    );
                }
            }
            Some(Ok(())) = async {
                match balance_feed.as_mut() {
                    Some(feed) => Some(feed.changed().await),
                    None => std::future::pending().await,
                }
            } => {
                if let Some(update) = balance_feed.as_ref().and_then(|f| f.borrow().clone()) {
                    tracing::info!(
                        seq = update.seq,
                        balance = %to_decimal_string(&update.value),
                        "[HEARTBEAT] wallet balance"
                    );
                }
            }
        }
    }

    tracing::info!("[SHUTDOWN] stopping watchers");
    trigger.trigger();
    for handle in handles {
        let _ = handle.await;
    }
    Ok(())
}
