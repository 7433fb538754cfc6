use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;
use std::process::{Child, Command, Stdio};

/// Video settings shared by every render.
#[derive(Clone, Debug)]
pub struct EncoderSettings {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub codec: String,
    pub pix_fmt: String,
    pub crf: u32,
}

pub struct FfmpegEncoder {
    child: Child,
    frame_len: usize,
}

fn encoder_args(output_path: &Path, input_audio: Option<&Path>, settings: &EncoderSettings) -> Vec<String> {
    let mut args = vec![
        "-y".to_string(),
        "-f".into(), "rawvideo".into(),
        "-pixel_format".into(), "rgba".into(),
        "-video_size".into(), format!("{}x{}", settings.width, settings.height),
        "-framerate".into(), settings.fps.to_string(),
        "-i".into(), "pipe:0".into(),
    ];

    if let Some(audio) = input_audio {
        args.extend(["-i".to_string(), audio.to_string_lossy().into_owned()]);
    }

    args.extend([
        "-c:v".into(), settings.codec.clone(),
        "-pix_fmt".into(), settings.pix_fmt.clone(),
        "-crf".into(), settings.crf.to_string(),
        "-preset".into(), "medium".into(),
    ]);

    if input_audio.is_some() {
        args.extend([
            "-c:a".into(), "aac".into(),
            "-b:a".into(), "192k".into(),
            "-shortest".into(),
        ]);
    }

    args.push(output_path.to_string_lossy().into_owned());
    args
}

impl FfmpegEncoder {
    /// Spawn ffmpeg reading raw RGBA frames on stdin. `input_audio` is muxed
    /// in when given; replays have no audio track.
    pub fn new(output_path: &Path, input_audio: Option<&Path>, settings: &EncoderSettings) -> Result<Self> {
        let args = encoder_args(output_path, input_audio, settings);
        log::debug!("ffmpeg {}", args.join(" "));

        let child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .context("Failed to spawn ffmpeg. Is ffmpeg installed?")?;

        log::info!(
            "FFmpeg encoder started: {}x{} @ {}fps, codec={}",
            settings.width, settings.height, settings.fps, settings.codec
        );

        Ok(Self {
            child,
            frame_len: settings.width as usize * settings.height as usize * 4,
        })
    }

    pub fn write_frame(&mut self, rgba_pixels: &[u8]) -> Result<()> {
        if rgba_pixels.len() != self.frame_len {
            anyhow::bail!(
                "Frame is {} bytes, encoder expects {}",
                rgba_pixels.len(),
                self.frame_len
            );
        }
        let stdin = self.child.stdin.as_mut().context("FFmpeg stdin not available")?;
        stdin.write_all(rgba_pixels).context("Failed to write frame to ffmpeg")?;
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        drop(self.child.stdin.take());

        let output = self.child.wait_with_output().context("Failed to wait for ffmpeg")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("FFmpeg exited with error:\n{}", stderr);
        }

        log::info!("FFmpeg encoding complete");
        Ok(())
    }
}
