// Run with: cargo run --release --features cli --bin stream_vad -- speech.wav
// Set RUST_LOG=sigmap=debug to see compiler output.

use std::error::Error;
use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use sigmap::{
    CompileTarget, Dataset, ElementType, FrameDataset, Map, MapCompilerOptions, Model,
    ModelBuilder, Shape, VoiceActivityDetectorParams,
};
use tracing::info;

#[derive(Parser)]
#[command(name = "stream_vad")]
#[command(about = "Stream a wav file through a compiled voice-activity detector", long_about = None)]
struct Args {
    /// Mono or multi-channel wav file; only the first channel is used
    wav: PathBuf,

    /// Samples per frame
    #[arg(long, default_value_t = 256)]
    frame: usize,

    /// Sample rate the detector is tuned for
    #[arg(long, default_value_t = 8000.0)]
    sample_rate: f64,

    #[arg(long)]
    tau_up: Option<f64>,

    #[arg(long)]
    tau_down: Option<f64>,

    #[arg(long)]
    threshold_up: Option<f64>,

    #[arg(long)]
    threshold_down: Option<f64>,

    #[arg(long)]
    level_threshold: Option<f64>,

    /// Print every frame's flag, not just transitions
    #[arg(long)]
    verbose: bool,
}

impl Args {
    fn detector_params(&self) -> VoiceActivityDetectorParams {
        let defaults = VoiceActivityDetectorParams::default();
        VoiceActivityDetectorParams {
            sample_rate: self.sample_rate,
            frame_duration: self.frame as f64 / self.sample_rate,
            tau_up: self.tau_up.unwrap_or(defaults.tau_up),
            tau_down: self.tau_down.unwrap_or(defaults.tau_down),
            threshold_up: self.threshold_up.unwrap_or(defaults.threshold_up),
            threshold_down: self.threshold_down.unwrap_or(defaults.threshold_down),
            level_threshold: self.level_threshold.unwrap_or(defaults.level_threshold),
            ..defaults
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let dataset = FrameDataset::from_wav(&args.wav, args.frame)?;
    info!(
        path = %args.wav.display(),
        frames = dataset.num_examples(),
        frame_len = args.frame,
        "loaded wav"
    );

    let builder = ModelBuilder::new();
    let mut model = Model::new();
    let input = builder.add_input_node(&mut model, Shape::vector(args.frame), ElementType::Real)?;
    let vad = builder.add_voice_activity_detector_node(
        &mut model,
        input.output(),
        args.detector_params(),
    )?;
    let flag = builder.add_type_cast_node(&mut model, vad.output(), ElementType::Real)?;
    let output = builder.add_output_node(&mut model, Shape::scalar(), flag.output())?;
    let map = Map::new(model, input.id(), vec![output.output()])?;

    let mut artifact = map.compile(
        CompileTarget::host("stream_vad", "detect"),
        &MapCompilerOptions::default(),
    )?;

    let frame_seconds = args.frame as f64 / args.sample_rate;
    let start = Instant::now();
    let mut active = false;
    let mut active_frames = 0usize;

    for (index, example) in dataset.examples().enumerate() {
        let now = artifact.compute(example.features)?[0] != 0.0;
        let seconds = index as f64 * frame_seconds;
        if args.verbose {
            println!("{:>8.3}s {}", seconds, u8::from(now));
        } else if now != active {
            println!("{:>8.3}s {}", seconds, if now { "speech" } else { "silence" });
        }
        active = now;
        active_frames += usize::from(now);
    }

    let elapsed = start.elapsed();
    info!(
        frames = dataset.num_examples(),
        active_frames,
        elapsed_us = elapsed.as_micros() as u64,
        "done"
    );
    Ok(())
}
