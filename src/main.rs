mod audio;
mod cli;
mod config;
mod encode;
mod error;
mod mapping;
mod render;
mod session;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;

use audio::acquisition::{AnalyserSettings, AnalyserSource, FrameSource};
use audio::features::{format_hz, AnalysisParams, ScaleMode};
use cli::{CaptureArgs, Cli, Command};
use encode::ffmpeg::{EncoderSettings, FfmpegEncoder};
use render::frame::{FrameComposer, Layout};
use render::pipeline::RenderPipeline;
use render::text::TextOverlay;
use session::mode::{ModeController, TickOutcome};
use session::store::RecordingStore;

/// Sample rate assumed for imported recordings that do not declare one.
const FALLBACK_SAMPLE_RATE: u32 = 44_100;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let mut cli = Cli::parse();

    // Explicit --config path, or auto-detect cascade.toml / global config
    let config_path = cli.config.clone().or_else(config::discover_config);
    let mut analysis = config::AnalysisConfig::default();
    let mut storage_path = None;
    if let Some(ref path) = config_path {
        if let Some(cfg) = config::load_config(path) {
            log::info!("Loaded config from {}", path.display());
            // Merge: config values apply only when CLI is at its default
            if cli.width == 1280 { cli.width = cfg.output.width; }
            if cli.height == 720 { cli.height = cfg.output.height; }
            if cli.fps == 30 { cli.fps = cfg.output.fps; }
            if cli.crf == 18 { cli.crf = cfg.output.crf; }
            if cli.codec == "libx264" { cli.codec = cfg.output.codec; }
            if cli.pix_fmt == "yuv420p" { cli.pix_fmt = cfg.output.pix_fmt; }
            if cli.scale == ScaleMode::Logarithmic { cli.scale = cfg.analysis.scale; }
            if cli.font.is_none() {
                cli.font = cfg.output.font;
            }
            analysis = cfg.analysis;
            storage_path = cfg.storage.path;
        } else {
            log::warn!("Failed to load config from {}", path.display());
        }
    }

    let storage_path = cli.store.clone().or(storage_path).or_else(config::default_storage_path);
    let defaults = AnalysisParams::new(FALLBACK_SAMPLE_RATE, analysis.fft_size, cli.scale);
    let store = match storage_path {
        Some(path) => RecordingStore::open(path, defaults),
        None => {
            log::warn!("No data directory; recordings are kept in memory only");
            RecordingStore::in_memory()
        }
    };

    let layout = Layout::new(cli.width, cli.height);
    let mut controller = ModeController::new(RenderPipeline::new(&layout, defaults), store);

    match cli.command {
        Command::Capture(ref args) => run_capture(&cli, args, &analysis, layout, &mut controller),
        Command::Replay { ref id, ref output } => {
            run_replay(&cli, id, output, layout, &mut controller)
        }
        Command::List => {
            let store = controller.store();
            if store.is_empty() {
                println!("No recordings.");
            }
            for rec in store.list() {
                println!(
                    "  {:<28} {:<24} {:>8.1}s {:>6} frames  {}Hz/{}",
                    rec.id,
                    rec.label,
                    rec.duration_ms / 1000.0,
                    rec.frames.len(),
                    rec.params.sample_rate_hz,
                    rec.params.transform_size
                );
            }
            Ok(())
        }
        Command::Delete { ref id } => {
            if !controller.delete_recording(id) {
                anyhow::bail!("No recording with id {}", id);
            }
            Ok(())
        }
        Command::Rename { ref id, ref label } => {
            if !controller.rename_recording(id, label) {
                anyhow::bail!("No recording with id {}", id);
            }
            Ok(())
        }
        Command::Export { ref path, ref ids } => {
            let text = controller.store().export_json(ids)?;
            std::fs::write(path, text)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            log::info!("Exported to {}", path.display());
            Ok(())
        }
        Command::Import { ref path } => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let report = controller.store_mut().import_json(&text, defaults)?;
            println!(
                "Imported {} recordings ({} skipped)",
                report.imported.len(),
                report.skipped
            );
            for id in &report.imported {
                println!("  {}", id);
            }
            Ok(())
        }
        Command::Probe { x, y } => {
            match layout.hover(x, y, cli.scale) {
                Some(freq) => println!("{}", format_hz(freq)),
                None => println!("({}, {}) is not on the waterfall", x, y),
            }
            Ok(())
        }
    }
}

fn encoder_settings(cli: &Cli) -> EncoderSettings {
    EncoderSettings {
        width: cli.width,
        height: cli.height,
        fps: cli.fps,
        codec: cli.codec.clone(),
        pix_fmt: cli.pix_fmt.clone(),
        crf: cli.crf,
    }
}

fn build_composer(cli: &Cli, layout: Layout) -> FrameComposer {
    let shorter = cli.width.min(cli.height) as f32;
    let font_size = (shorter * 0.03).max(12.0);
    FrameComposer::new(layout, TextOverlay::discover(cli.font.as_deref(), font_size))
}

fn progress_bar(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} frames ({eta} remaining)")
    {
        pb.set_style(style.progress_chars("=>-"));
    }
    pb
}

/// Virtual tick clock: tick `k` happens at `k / fps` seconds.
fn tick_time_ms(tick: u64, fps: u32) -> f64 {
    tick as f64 * 1000.0 / fps as f64
}

fn run_capture(
    cli: &Cli,
    args: &CaptureArgs,
    analysis: &config::AnalysisConfig,
    layout: Layout,
    controller: &mut ModeController,
) -> Result<()> {
    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }
    if cli.fps == 0 {
        anyhow::bail!("--fps must be positive");
    }

    log::info!("Input: {}", args.input.display());
    log::info!("Output: {}", args.output.display());
    log::info!("Resolution: {}x{} @ {}fps", cli.width, cli.height, cli.fps);

    log::info!("Decoding audio...");
    let mut audio = audio::decode::decode_audio(&args.input)?;
    if let Some(secs) = args.seconds {
        let limit = (secs.max(0.0) * audio.sample_rate as f64) as usize;
        audio.samples.truncate(limit);
    }

    // --fft-size wins over config unless left at its default
    let transform_size = if args.fft_size != 2048 { args.fft_size } else { analysis.fft_size };
    let settings = AnalyserSettings {
        transform_size,
        min_decibels: analysis.min_db,
        max_decibels: analysis.max_db,
        smoothing: analysis.smoothing,
    };
    let source = AnalyserSource::new(audio, settings, cli.fps)?;
    let total_ticks = source.tick_count_hint().unwrap_or(0);

    let epoch = controller.start_live(Box::new(source));
    if args.record && !controller.start_recording() {
        log::warn!("Recording could not be started");
    }

    let mut composer = build_composer(cli, layout);
    let mut encoder = FfmpegEncoder::new(&args.output, Some(&args.input), &encoder_settings(cli))?;

    let pb = progress_bar(total_ticks as u64);
    let mut dropped = 0usize;
    for tick in 0..total_ticks as u64 {
        let now = tick_time_ms(tick, cli.fps);
        match controller.tick(epoch, now) {
            TickOutcome::Rendered(summary) => log::trace!("{:.0}ms {}", now, summary.readout()),
            TickOutcome::Dropped(err) => {
                log::debug!("Tick {} dropped: {}", tick, err);
                dropped += 1;
            }
            TickOutcome::Ended | TickOutcome::Cancelled | TickOutcome::Idle => break,
        }
        let status = controller.status(now);
        let pixels = composer.compose(controller.pipeline(), controller.scale(), &status);
        encoder.write_frame(pixels)?;
        pb.set_position(tick + 1);
    }
    pb.finish_with_message("Rendering complete");

    log::info!("Rendered {} frames ({} dropped)", controller.pipeline().ticks(), dropped);
    if controller.is_recording() {
        match controller.stop_recording(args.label.clone()) {
            Some(rec) => println!("Recorded {} ({} frames)", rec.id, rec.frames.len()),
            None => log::warn!("Nothing was recorded"),
        }
        if !controller.store().is_persistent() {
            log::warn!("Recording could not be saved to disk");
        }
    }
    controller.stop();

    log::info!("Finishing encoding...");
    encoder.finish()?;
    log::info!("Done! Output: {}", args.output.display());
    Ok(())
}

fn run_replay(
    cli: &Cli,
    id: &str,
    output: &Path,
    layout: Layout,
    controller: &mut ModeController,
) -> Result<()> {
    if cli.fps == 0 {
        anyhow::bail!("--fps must be positive");
    }
    let epoch = controller
        .start_replay(id, 0.0)
        .with_context(|| format!("No recording with id {}", id))?;
    let duration_ms = controller
        .replaying()
        .map_or(0.0, |recording| recording.duration_ms);

    let mut composer = build_composer(cli, layout);
    let mut encoder = FfmpegEncoder::new(output, None, &encoder_settings(cli))?;

    // One extra tick past the end so the final frame is shown and completes.
    let expected = (duration_ms * cli.fps as f64 / 1000.0).floor() as u64 + 2;
    let pb = progress_bar(expected);
    let mut tick = 0u64;
    let mut dropped = 0usize;
    loop {
        let now = tick_time_ms(tick, cli.fps);
        match controller.tick(epoch, now) {
            TickOutcome::Rendered(_) => {}
            TickOutcome::Dropped(err) => {
                log::debug!("Tick {} dropped: {}", tick, err);
                dropped += 1;
            }
            TickOutcome::Ended | TickOutcome::Cancelled | TickOutcome::Idle => break,
        }
        let status = controller.status(now);
        let pixels = composer.compose(controller.pipeline(), controller.scale(), &status);
        encoder.write_frame(pixels)?;
        tick += 1;
        pb.set_position(tick);
        if controller.is_idle() {
            break;
        }
    }
    pb.finish_with_message("Replay complete");
    log::info!("Replayed {} frames ({} dropped)", controller.pipeline().ticks(), dropped);

    encoder.finish()?;
    log::info!("Done! Output: {}", output.display());
    Ok(())
}
