use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use v4l_capture::{Device, FourCC, Frame, FrameFormat};

/// Capture one UYVY frame and store its planes as raw I422 (Y, then Cb, then Cr)
#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// Capture device node path or index
    #[arg(short, long, default_value = "/dev/video0")]
    device: String,

    /// Frame width in pixels
    #[arg(long, default_value_t = 1280)]
    width: u32,

    /// Frame height in pixels
    #[arg(long, default_value_t = 720)]
    height: u32,

    /// Seconds to wait for the first frame
    #[arg(long, default_value_t = 5)]
    timeout: u64,

    /// Output file
    #[arg(short, long, default_value = "frame.yuv")]
    output: PathBuf,

    /// Enable debug logging (RUST_LOG overrides)
    #[arg(short, long)]
    verbose: bool,
}

fn write_planes(frame: &Frame, path: &Path) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(frame.y())?;
    file.write_all(frame.cb())?;
    file.write_all(frame.cr())?;
    file.flush()
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    // Determine which device to use
    let mut path = args.device;
    if path.parse::<u64>().is_ok() {
        path = format!("/dev/video{}", path);
    }
    println!("Using device: {}", path);

    let format = FrameFormat::new(args.width, args.height, FourCC::UYVY);
    let mut dev = Device::open(&path)?;
    let frames = dev.stream(&format)?;
    println!("Streaming {}", format);

    let frame = frames.recv_timeout(Duration::from_secs(args.timeout));
    dev.close()?;

    let frame = match frame {
        Some(frame) => frame,
        None => {
            return Err(match frames.take_error() {
                Some(e) => e.into(),
                None => format!("no frame within {}s", args.timeout).into(),
            })
        }
    };

    print!("{}", frame.meta());
    write_planes(&frame, &args.output)?;
    println!(
        "Wrote {}x{} 4:2:2 planes to {}",
        frame.width(),
        frame.height(),
        args.output.display()
    );
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
