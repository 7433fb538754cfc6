use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::audio::features::ScaleMode;

#[derive(Parser, Debug)]
#[command(name = "cascade", about = "Scrolling spectrogram renderer with session recording and replay")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Config file (defaults to cascade.toml or the user config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Recordings file (defaults to the user data dir)
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    /// Video width in pixels
    #[arg(long, global = true, default_value_t = 1280)]
    pub width: u32,

    /// Video height in pixels
    #[arg(long, global = true, default_value_t = 720)]
    pub height: u32,

    /// Ticks (and video frames) per second
    #[arg(long, global = true, default_value_t = 30)]
    pub fps: u32,

    /// H.264 CRF quality (0-51, lower = better)
    #[arg(long, global = true, default_value_t = 18)]
    pub crf: u32,

    /// FFmpeg video codec
    #[arg(long, global = true, default_value = "libx264")]
    pub codec: String,

    /// FFmpeg pixel format
    #[arg(long, global = true, default_value = "yuv420p")]
    pub pix_fmt: String,

    /// TTF/OTF font for the legend and readout
    #[arg(long, global = true)]
    pub font: Option<PathBuf>,

    /// Frequency axis of the waterfall
    #[arg(long, global = true, value_enum, default_value_t = ScaleMode::Logarithmic)]
    pub scale: ScaleMode,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Render a live session from an audio file, optionally recording it
    Capture(CaptureArgs),
    /// Render a stored recording at its recorded cadence
    Replay {
        id: String,
        #[arg(short, long, default_value = "replay.mp4")]
        output: PathBuf,
    },
    /// List stored recordings, most recent first
    List,
    /// Delete a stored recording
    Delete { id: String },
    /// Relabel a stored recording
    Rename { id: String, label: String },
    /// Write recordings to a JSON file (all of them unless --id is given)
    Export {
        path: PathBuf,
        #[arg(long = "id")]
        ids: Vec<String>,
    },
    /// Add recordings from a JSON file
    Import { path: PathBuf },
    /// Frequency under an output-frame pixel (sized by --width/--height)
    Probe { x: u32, y: u32 },
}

#[derive(Args, Debug)]
pub struct CaptureArgs {
    /// Input audio file (WAV, MP3, FLAC, OGG)
    pub input: PathBuf,

    /// Output video file
    #[arg(short, long, default_value = "output.mp4")]
    pub output: PathBuf,

    /// Store the session as a recording
    #[arg(long)]
    pub record: bool,

    /// Label for the stored recording
    #[arg(long, requires = "record")]
    pub label: Option<String>,

    /// Analyser transform size (power of two)
    #[arg(long, default_value_t = 2048)]
    pub fft_size: usize,

    /// Stop after this many seconds of input
    #[arg(long)]
    pub seconds: Option<f64>,
}
