//! fftscope - headless real-time audio FFT pipeline
//!
//! Opens a session on the default audio devices, runs it for a fixed time
//! and logs what a spectrum display would show.

use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;

use fftscope::audio::{half_period, tone_frequency_hz, ProcessingMode, ScopeStats, Session};
use fftscope::backend::CpalBackend;
use fftscope::cli::Args;

fn main() {
    // Set RUST_LOG=debug for verbose output
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = Args::parse();
    if let Err(e) = run(&args) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = args.session_config()?;
    let pipeline = config.pipeline.clone();

    let mut session = Session::new(CpalBackend::new(), config);
    session.init()?;
    if let Some(tone) = session.tone() {
        let half = half_period(tone.ratio(), pipeline.fft_size);
        log::info!(
            "Tone: {:?}, half-period {} samples ({:.1}Hz)",
            tone.form(),
            half,
            tone_frequency_hz(half, pipeline.sample_rate_hz)
        );
    }
    session.start();

    let scope = session.scope().clone();
    let run_for = Duration::from_secs_f32(args.seconds.max(0.0));
    let report = Duration::from_millis(args.report_ms.max(1));
    let started = Instant::now();

    while started.elapsed() < run_for {
        thread::sleep(report);

        let stats = scope.stats();
        let peak = scope
            .peak_bin()
            .map(|(bin, magnitude)| format!("{:.1}Hz ({:.2})", pipeline.bin_to_hz(bin), magnitude))
            .unwrap_or_else(|| "-".to_string());
        log::info!(
            "peak {} | frames {} | queued {} | {}",
            peak,
            stats.frames,
            session.queued_frames().unwrap_or(0),
            describe(scope.mode(), &stats)
        );
    }

    session.close();
    Ok(())
}

/// Render the metric selected by `mode`
fn describe(mode: ProcessingMode, stats: &ScopeStats) -> String {
    match mode {
        ProcessingMode::Raw => format!("last sample {:+.4}", stats.last_sample),
        ProcessingMode::ChunkInfo => format!(
            "chunk {} samples every {:.2}ms",
            stats.chunk_samples, stats.chunk_ms
        ),
        ProcessingMode::BufferInfo => format!("frame filled in {:.2}ms", stats.fill_buffer_ms),
        ProcessingMode::FftInfo => format!("forward FFT {:.3}ms", stats.fft_ms),
    }
}
