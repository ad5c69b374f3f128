//! End-to-end walkthrough of the token ledger
//!
//! Creates a collection and an asset, mints, transfers (plain and
//! co-signed), burns, then dumps the event log and verifies the audit
//! chain and supply conservation.

use nft_ledger::{CallAuth, Config, Ledger, MemoryHost, Principal};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    println!("\n🎨 =================================================================");
    println!("🎨 NFT Ledger - Token Lifecycle Demo");
    println!("🎨 =================================================================\n");

    let mut config = Config::default();
    config.data_dir =
        std::env::temp_dir().join(format!("nft-ledger-demo-{}", uuid::Uuid::now_v7()));
    let data_dir = config.data_dir.clone();
    let admin = config.admin.clone();

    let host = Arc::new(MemoryHost::with_principals([
        "admin", "alice", "bob", "carol", "dave",
    ]));
    let ledger = Ledger::open(config, host.clone()).await?;

    let alice = Principal::new("alice");
    let bob = Principal::new("bob");
    let carol = Principal::new("carol");
    let dave = Principal::new("dave");

    // Collection authored by alice, 2.5% royalty on secondary sales.
    let collection_id = ledger
        .create_collection(
            CallAuth::single(admin),
            alice.clone(),
            250,
            br#"{"name":"deep sea prints"}"#.to_vec(),
        )
        .await?;
    println!("  ✅ Collection {} created (author alice, royalty 250 bps)", collection_id);

    // Asset capped at 100 units, 40 of which are minted to alice at birth.
    let asset_id = ledger
        .create_asset(
            CallAuth::single(alice.clone()),
            collection_id,
            40,
            100,
            br#"{"print":"anglerfish"}"#.to_vec(),
        )
        .await?;
    println!("  ✅ Asset {} created (max supply 100, 40 pre-minted to alice)", asset_id);

    // Mint straight to bob; alice and bob are both notified.
    let minted = ledger
        .mint(CallAuth::single(alice.clone()), bob.clone(), asset_id, 10, "drop #1")
        .await?;
    println!("  ✅ Minted 10 to bob (event sequence {})", minted.sequence);

    // Plain transfer: alice pays the storage for carol's new row.
    ledger
        .transfer(
            CallAuth::single(alice.clone()),
            alice.clone(),
            carol.clone(),
            asset_id,
            5,
            "gift",
        )
        .await?;
    println!("  ✅ Transferred 5 alice → carol");

    // Co-signed transfer: dave accepts the row cost himself.
    ledger
        .transfer(
            CallAuth::cosigned(alice.clone(), dave.clone()),
            alice.clone(),
            dave.clone(),
            asset_id,
            5,
            "co-signed sale",
        )
        .await?;
    println!("  ✅ Transferred 5 alice → dave (co-signed, dave pays his row)");

    // Retire part of the author's own holding.
    ledger
        .burn(CallAuth::single(alice.clone()), asset_id, 15, "damaged batch")
        .await?;
    println!("  ✅ Burned 15 from alice's holding");

    println!("\n📊 ================== Balances ==================\n");
    let supply = ledger
        .asset(asset_id)?
        .map(|asset| asset.supply)
        .unwrap_or(0);
    for owner in [&alice, &bob, &carol, &dave] {
        println!("  📊 {:<8} {}", owner.as_str(), ledger.balance(owner, asset_id)?);
    }
    println!("  📊 supply   {}", supply);

    println!("\n🔔 ================ Notifications ================\n");
    for delivered in host.delivered() {
        println!(
            "  🔔 {} ← {} (sequence {})",
            delivered.recipient,
            delivered.event.kind.label(),
            delivered.event.sequence
        );
    }

    println!("\n🔎 ================ Verification =================\n");
    let conserved = ledger.check_supply_conservation(asset_id)?;
    println!("  🔎 Supply conservation: {}", if conserved { "OK" } else { "VIOLATED" });
    ledger.verify_audit_chain()?;
    println!("  🔎 Audit hash chain:    OK");
    let stats = ledger.stats()?;
    println!(
        "  🔎 {} collections, {} assets, {} events",
        stats.total_collections, stats.total_assets, stats.total_events
    );

    println!("\n📜 ================== Event Log ==================\n");
    println!("{}", serde_json::to_string_pretty(&ledger.events()?)?);

    ledger.shutdown().await?;
    let _ = std::fs::remove_dir_all(&data_dir);

    println!("\n✨ Demo complete\n");
    Ok(())
}
