//! Experiment Workflow Example
//!
//! Demonstrates the full store lifecycle for one experiment run:
//! container creation, snapshot and dataset writes, analysis-result
//! storage, and TUID range lookups.
//!
//! Run with: cargo run --example experiment_workflow

use std::sync::Arc;

use arrow::array::{Float64Array, Int32Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use tuid_store::{DataStore, Dataset};

fn defect_rates(rounds: i32) -> RecordBatch {
    let schema = Schema::new(vec![
        Field::new("qec_round", DataType::Int32, false),
        Field::new("defect_rate", DataType::Float64, false),
    ]);
    let round_array = Int32Array::from_iter_values(0..rounds);
    let rate_array =
        Float64Array::from_iter_values((0..rounds).map(|i| 0.02 + 0.0005 * f64::from(i)));
    RecordBatch::try_new(Arc::new(schema), vec![Arc::new(round_array), Arc::new(rate_array)])
        .expect("valid batch")
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("=== TUID Store Experiment Workflow ===\n");

    let data_dir = tempfile::tempdir()?;
    let store = DataStore::open(data_dir.path())?;

    // -------------------------------------------------------------------------
    // 1. Create a container and snapshot the instrument configuration
    // -------------------------------------------------------------------------
    println!("1. Creating experiment container...");

    let tuid = store.create_container("surface_code_d3")?;
    println!("   TUID: {tuid}");
    println!("   Created: {}", tuid.timestamp());

    let snapshot = serde_json::json!({
        "device": "transmon_17q",
        "qec_rounds": 40,
        "data_qubits": ["D1", "D2", "D4"],
    });
    store.store_snapshot(&tuid, snapshot.as_object().expect("object"))?;
    println!("   Snapshot written");

    // -------------------------------------------------------------------------
    // 2. Store the measured dataset under the same TUID
    // -------------------------------------------------------------------------
    println!("\n2. Storing dataset...");

    let mut dataset = Dataset::new(vec![defect_rates(40)]);
    store.store(&mut dataset, Some(tuid.clone()), "surface_code_d3")?;
    println!("   Rows: {}", dataset.num_rows());
    println!("   Provenance: name={:?} tuid={:?}",
        dataset.attr("name"),
        dataset.attr("tuid"),
    );

    // -------------------------------------------------------------------------
    // 3. Store an analysis result next to the raw data
    // -------------------------------------------------------------------------
    println!("\n3. Storing analysis result...");

    let mut processed = Dataset::new(vec![defect_rates(40)]);
    store.store_processed(&tuid, "RepeatedStabilizer", &mut processed)?;

    let analysis = store.load_processed(&tuid, "RepeatedStabilizer")?;
    println!("   Analysis rows: {}", analysis.num_rows());

    // -------------------------------------------------------------------------
    // 4. Look the run back up by time range and name
    // -------------------------------------------------------------------------
    println!("\n4. Looking up runs...");

    let found = store.find("surface_code", &tuid, &tuid, false)?;
    println!("   find(\"surface_code\") -> {found:?}");

    let newest = store.latest("surface_code")?;
    println!("   latest(\"surface_code\") -> {newest}");

    let loaded = store.load(&newest)?;
    println!(
        "\nLoaded {} rows for run {:?}",
        loaded.num_rows(),
        loaded.attr("name").unwrap_or("<unnamed>")
    );

    Ok(())
}
