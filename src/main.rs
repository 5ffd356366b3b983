//! Replays a recorded detection script through the gesture pipeline in real
//! time and reports the events it produced.

use anyhow::Context;
use clap::Parser;
use gesture_input::capture::ReplaySource;
use gesture_input::pipeline::FixedRateRepaint;
use gesture_input::recorder::EventLog;
use gesture_input::{EventKind, GesturePipeline, PipelineConfig};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(version, about = "Replay hand detections through the gesture pipeline")]
struct Args {
    /// JSON array of frames: {"detections": [...]} or {"error": "..."}
    #[arg(short, long)]
    script: PathBuf,

    /// Pipeline configuration (JSON, camelCase keys)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the recorded events to this file
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    gesture_input::init_tracing();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("Failed to load config {:?}", path))?,
        None => PipelineConfig::default(),
    };
    let source = ReplaySource::from_file(&args.script)
        .with_context(|| format!("Failed to load script {:?}", args.script))?;
    let total_frames = source.total_frames() as u64;

    tracing::info!("Replaying {} frames from {:?}", total_frames, args.script);

    let mut pipeline = GesturePipeline::new(
        config,
        Box::new(source),
        Arc::new(FixedRateRepaint::sixty_hz()),
    )?;
    let log = EventLog::attach(pipeline.bus());
    pipeline.bus().on_click(|click| {
        tracing::info!("Click at ({:.3}, {:.3})", click.x, click.y);
        Ok(())
    });

    pipeline.start().await?;
    tokio::select! {
        _ = async {
            while pipeline.cycles() < total_frames {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        } => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted");
        }
    }
    pipeline.stop().await?;

    println!(
        "{} cycles: {} moves, {} clicks, {} ticks",
        pipeline.cycles(),
        log.count(EventKind::Move),
        log.count(EventKind::Click),
        log.count(EventKind::Tick)
    );

    if let Some(output) = &args.output {
        log.write_json(output)
            .with_context(|| format!("Failed to write event log {:?}", output))?;
    }

    Ok(())
}
