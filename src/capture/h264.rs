//! Hardware H.264 encoding via an ffmpeg pipe.
//!
//! The probe runs once at startup and decides the encoding advertised in
//! `screen_info`. The stream loop still produces JPEG frames: the pipe
//! encoder below is not yet driven by it, matching the advertised-but-
//! unwired state of the h264 path. See DESIGN.md.

use std::io::{Read, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use image::RgbaImage;

const VAAPI_RENDER_NODE: &str = "/dev/dri/renderD128";

/// Probe for a usable hardware H.264 encoder.
///
/// Requires ffmpeg on the PATH; on Linux prefers VA-API when a render node
/// is present, falling back to QuickSync.
pub fn detect_hardware_encoder() -> Option<String> {
    let output = Command::new("ffmpeg")
        .args(["-hide_banner", "-encoders"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let encoders = String::from_utf8_lossy(&output.stdout);

    if cfg!(target_os = "linux") {
        if Path::new(VAAPI_RENDER_NODE).exists() && encoders.contains("h264_vaapi") {
            return Some("h264_vaapi".to_string());
        }
        if encoders.contains("h264_qsv") {
            return Some("h264_qsv".to_string());
        }
    }

    None
}

/// An ffmpeg child encoding raw RGBA frames to Annex-B H.264.
#[allow(dead_code)]
pub struct H264Encoder {
    child: Child,
    stdin: ChildStdin,
    stdout: ChildStdout,
    width: u32,
    height: u32,
}

#[allow(dead_code)]
impl H264Encoder {
    pub fn spawn(
        width: u32,
        height: u32,
        fps: u32,
        hw_encoder: &str,
    ) -> std::io::Result<Self> {
        let mut child = Command::new("ffmpeg")
            .args(build_args(width, height, fps, hw_encoder))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| std::io::Error::other("ffmpeg stdin unavailable"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("ffmpeg stdout unavailable"))?;
        Ok(Self {
            child,
            stdin,
            stdout,
            width,
            height,
        })
    }

    /// Feed one raw frame. The frame must match the configured dimensions.
    pub fn write_frame(&mut self, frame: &RgbaImage) -> std::io::Result<()> {
        self.stdin.write_all(frame.as_raw())
    }

    /// Read encoded Annex-B bytes.
    pub fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.stdout.read(buf)
    }

    pub fn close(mut self) -> std::io::Result<()> {
        drop(self.stdin);
        self.child.wait().map(|_| ())
    }
}

fn build_args(width: u32, height: u32, fps: u32, hw_encoder: &str) -> Vec<String> {
    let mut args: Vec<String> = [
        "-hide_banner",
        "-f",
        "rawvideo",
        "-pix_fmt",
        "rgba",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    args.push("-s".into());
    args.push(format!("{width}x{height}"));
    args.push("-r".into());
    args.push(fps.to_string());
    args.push("-i".into());
    args.push("pipe:0".into());

    match hw_encoder {
        "h264_vaapi" => {
            args.extend(
                [
                    "-vaapi_device",
                    VAAPI_RENDER_NODE,
                    "-vf",
                    "format=nv12,hwupload",
                    "-c:v",
                    "h264_vaapi",
                ]
                .iter()
                .map(|s| s.to_string()),
            );
        }
        "h264_qsv" => {
            args.push("-c:v".into());
            args.push("h264_qsv".into());
        }
        _ => {
            args.extend(
                ["-c:v", "libx264", "-preset", "ultrafast", "-tune", "zerolatency"]
                    .iter()
                    .map(|s| s.to_string()),
            );
        }
    }

    args.push("-f".into());
    args.push("h264".into());
    args.push("-g".into());
    args.push(fps.to_string());
    args.push("pipe:1".into());
    args
}
