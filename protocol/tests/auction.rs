//! Auction files as a buyer receives them: written by a real seller, read
//! back from disk, and poked at.

mod common;

use serde_json::Value;
use std::ops::ControlFlow;

use common::{Market, NETWORK};
use namedex_protocol::auction::{
    Auction, AuctionFactory, AuctionFormatError, AuctionParams, BatchVerification,
    ReductionStrategy,
};
use namedex_protocol::config::LEGACY_PROOF_MAGIC;

const HOUR_MS: u64 = 3_600_000;

async fn listed(m: &Market) -> anyhow::Result<Auction> {
    let lock = m.lock("example").await;
    let start = m.ledger.median_time() * 1_000;
    let params = AuctionParams {
        start_time: start,
        end_time: start + 4 * HOUR_MS,
        start_price: 4_000_000,
        end_price: 1_000_000,
        step_duration: HOUR_MS,
        reduction_strategy: ReductionStrategy::Linear,
        fee_rate: 0,
        fee_addr: None,
    };
    Ok(AuctionFactory::new(params)?
        .create_auction(&m.seller.ctx, &lock, None)
        .await?)
}

#[tokio::test]
async fn auction_file_survives_the_disk() -> anyhow::Result<()> {
    let m = Market::new("example");
    let auction = listed(&m).await?;

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("example.json");
    std::fs::write(&path, auction.to_json(NETWORK)?)?;

    let loaded = Auction::from_json(&std::fs::read_to_string(&path)?, NETWORK)?;
    assert_eq!(loaded, auction);
    assert_eq!(
        loaded
            .verify_proofs(&m.buyer.ctx, |_, _| ControlFlow::Continue(()))
            .await?,
        BatchVerification::AllValid
    );
    Ok(())
}

#[tokio::test]
async fn shuffled_entries_are_sorted_on_load() -> anyhow::Result<()> {
    let m = Market::new("example");
    let auction = listed(&m).await?;

    let mut doc: Value = serde_json::from_str(&auction.to_json(NETWORK)?)?;
    doc["data"]
        .as_array_mut()
        .expect("data is an array")
        .reverse();
    let loaded = Auction::from_json(&doc.to_string(), NETWORK)?;

    let prices: Vec<_> = loaded.data().iter().map(|e| e.price).collect();
    assert_eq!(prices, vec![4_000_000, 3_000_000, 2_000_000, 1_000_000]);
    assert_eq!(loaded, auction);
    Ok(())
}

#[tokio::test]
async fn old_versions_of_a_real_file_are_refused() -> anyhow::Result<()> {
    let m = Market::new("example");
    let auction = listed(&m).await?;
    let mut doc: Value = serde_json::from_str(&auction.to_json(NETWORK)?)?;

    doc["version"] = Value::from(1);
    assert_eq!(
        Auction::from_json(&doc.to_string(), NETWORK),
        Err(AuctionFormatError::UnsupportedVersion {
            version: "1".into(),
            minimum: 2
        })
    );

    doc["version"] = Value::from("2");
    assert_eq!(
        Auction::from_json(&doc.to_string(), NETWORK),
        Err(AuctionFormatError::NonNumericVersion)
    );

    doc.as_object_mut().expect("object").remove("version");
    assert_eq!(
        Auction::from_json(&doc.to_string(), NETWORK),
        Err(AuctionFormatError::MissingVersion)
    );
    Ok(())
}

#[tokio::test]
async fn legacy_layouts_of_a_real_file_are_refused() -> anyhow::Result<()> {
    let m = Market::new("example");
    let auction = listed(&m).await?;
    let json = auction.to_json(NETWORK)?;

    let header = format!("{LEGACY_PROOF_MAGIC}:1.0.0");
    let headed = format!("{header}\n{json}");
    assert_eq!(
        Auction::from_json(&headed, NETWORK),
        Err(AuctionFormatError::LegacyMagicHeader { header })
    );

    // One compact proof per line.
    let doc: Value = serde_json::from_str(&json)?;
    let lines: Vec<String> = doc["data"]
        .as_array()
        .expect("data is an array")
        .iter()
        .map(Value::to_string)
        .collect();
    assert_eq!(
        Auction::from_json(&lines.join("\n"), NETWORK),
        Err(AuctionFormatError::LegacyNdjson)
    );
    Ok(())
}

#[tokio::test]
async fn foreign_network_addresses_do_not_load() -> anyhow::Result<()> {
    let m = Market::new("example");
    let auction = listed(&m).await?;
    let json = auction.to_json(NETWORK)?;

    assert!(matches!(
        Auction::from_json(&json, namedex_protocol::Network::Main),
        Err(AuctionFormatError::Malformed(_))
    ));
    Ok(())
}

#[tokio::test]
async fn progress_callback_can_stop_verification() -> anyhow::Result<()> {
    let m = Market::new("example");
    let auction = listed(&m).await?;

    let mut calls = 0;
    let result = auction
        .verify_proofs(&m.buyer.ctx, |done, total| {
            calls += 1;
            assert_eq!(total, 4);
            if done == 2 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
        .await?;
    assert_eq!(result, BatchVerification::Aborted { checked: 2 });
    assert_eq!(calls, 2);
    Ok(())
}
