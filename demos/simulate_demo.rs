//! Demonstration of the Activity Sensor Agent pipeline without hardware.
//!
//! This example shows how to:
//! 1. Load the bundled demo scaler and random-forest artifacts
//! 2. Feed a simulated accelerometer into the pipeline
//! 3. Receive predictions over a channel
//! 4. Stop the pipeline and print run statistics
//!
//! Run with: cargo run --example simulate_demo -- [activity]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use activity_sensor_agent::{
    collector::SimulatedSource,
    config::Config,
    core::{load_classifier, Label, ModelKind},
    pipeline::{ChannelReporter, Pipeline, Shutdown},
};

#[tokio::main]
async fn main() {
    let activity: Label = std::env::args()
        .nth(1)
        .map(|arg| arg.parse().unwrap_or_else(|e| panic!("{e}")))
        .unwrap_or(Label::Walking);

    println!("Activity Sensor Agent - Simulation Demo");
    println!("=======================================");
    println!("Simulating: {activity}");
    println!();

    let config = Config {
        model_kind: ModelKind::Rf,
        models_dir: PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("demos/models"),
        ..Config::default()
    };

    let classifier = load_classifier(&config.models_dir, config.model_kind)
        .expect("Failed to load demo artifacts");
    let source = SimulatedSource::new(activity, config.sample_rate_hz);
    let (tx, rx) = crossbeam_channel::unbounded();

    let pipeline = Pipeline::new(config, source, classifier, Arc::new(ChannelReporter::new(tx)));
    let shutdown = Shutdown::new();
    let run = tokio::spawn(pipeline.run(shutdown.clone()));

    // Print predictions as they arrive for five seconds.
    let printer = std::thread::spawn(move || {
        while let Ok(prediction) = rx.recv() {
            println!(
                "[{}] window #{:<3} -> {}",
                prediction.predicted_at.format("%H:%M:%S%.3f"),
                prediction.window_sequence,
                prediction.label_name()
            );
        }
    });

    tokio::time::sleep(Duration::from_secs(5)).await;
    shutdown.trigger();

    let stats = run
        .await
        .expect("Pipeline task panicked")
        .expect("Pipeline failed");
    let _ = printer.join();

    println!();
    println!("{}", stats.summary());
}
