//! Headless player. Compiles a sheet and plays it against a wall-clock
//! transport, logging every MIDI event and broadcasting the position.
//!
//! ```text
//! sheetplay <sheet> [--port N] [--block N] [--no-broadcast]
//! ```

use sheetplay::prelude::*;
use sheetplay::Result;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

struct Args {
    sheet: PathBuf,
    port: Option<u16>,
    block: usize,
    broadcast: bool,
}

fn parse_args() -> std::result::Result<Args, String> {
    let mut args = env::args().skip(1);
    let mut sheet = None;
    let mut port = None;
    let mut block = 512;
    let mut broadcast = true;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--port" => {
                let value = args.next().ok_or("--port needs a value")?;
                port = Some(value.parse().map_err(|_| format!("bad port {value:?}"))?);
            }
            "--block" => {
                let value = args.next().ok_or("--block needs a value")?;
                block = value.parse().map_err(|_| format!("bad block size {value:?}"))?;
            }
            "--no-broadcast" => broadcast = false,
            other if other.starts_with("--") => return Err(format!("unknown option {other}")),
            other => sheet = Some(PathBuf::from(other)),
        }
    }

    Ok(Args {
        sheet: sheet.ok_or("usage: sheetplay <sheet> [--port N] [--block N] [--no-broadcast]")?,
        port,
        block,
        broadcast,
    })
}

fn run(args: Args) -> Result<()> {
    let mut builder = SheetPlayer::builder()
        .preferences(Preferences::load()?)
        .max_block_size(args.block)
        .broadcast(args.broadcast);
    if let Some(port) = args.port {
        builder = builder.broadcast_port(port);
    }
    let player = builder.build()?;

    let set = player.open_sheet_blocking(&args.sheet)?;
    let duration = set
        .tracks()
        .iter()
        .filter_map(|t| t.end_time())
        .fold(0.0_f64, f64::max);
    info!(
        "Playing {} ({} tracks, {:.1} s)",
        args.sheet.display(),
        set.tracks().len(),
        duration
    );

    let mut scheduler = player.scheduler();
    let mut out = scheduler.output_buffer();
    let block_time = Duration::from_secs_f64(args.block as f64 / scheduler.sample_rate());
    let start = Instant::now();
    let mut frames: u64 = 0;

    loop {
        let seconds = frames as f64 / scheduler.sample_rate();
        let playing = seconds <= duration;
        out.clear();
        let status = scheduler.process(
            Some(TransportPosition {
                time_seconds: seconds,
                is_playing: playing,
            }),
            args.block,
            &mut out,
        );
        for event in &out {
            info!(
                "{seconds:>8.3}s +{:<4} ch{:<2} {:?}",
                event.frame_offset,
                event.channel_num() + 1,
                event.msg
            );
        }
        if matches!(status, CycleStatus::Stopped { .. }) {
            break;
        }

        frames += args.block as u64;
        let due = start + block_time.mul_f64((frames / args.block as u64) as f64);
        if let Some(wait) = due.checked_duration_since(Instant::now()) {
            thread::sleep(wait);
        }
    }

    info!("Finished");
    player.shutdown();
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{message}");
            return ExitCode::from(2);
        }
    };

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
