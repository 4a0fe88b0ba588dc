use anyhow::{bail, Context, Result};
use psg_replay::{export, format, PlayerConfig, Track, UserControls};
use std::env;
use std::fs::File;
use std::io::{BufWriter, Write};

const USAGE: &str = "Usage:
  psg-replay [--config <cfg.json>] [--export <out.wav>] [--trace <out.csv>] [--normalize] <file>

Flags:
  --config <file>    Load player configuration (JSON)
  --export <file>    Render the whole track to a mono 16-bit WAV file
  --trace <file>     Write the decoded voice targets of every frame as CSV
  --normalize        Peak-normalise the exported WAV
  -h, --help         Show this help

Without --export/--trace the track is played live (requires the \"streaming\" feature).
Set PSG_REPLAY_LOG=debug|info|warn|error|off to control log output (default warn).
";

/// Command line options
#[derive(Debug, Default)]
struct Args {
    file: String,
    config: Option<String>,
    export: Option<String>,
    trace: Option<String>,
    normalize: bool,
}

/// Parse arguments; `None` means only help was requested
fn parse_args<I: Iterator<Item = String>>(mut args: I) -> Result<Option<Args>> {
    let mut parsed = Args::default();
    let mut file = None;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--help" | "-h" => return Ok(None),
            "--normalize" => parsed.normalize = true,
            "--config" | "--export" | "--trace" => {
                let Some(value) = args.next() else {
                    bail!("{arg} requires a file argument");
                };
                match arg.as_str() {
                    "--config" => parsed.config = Some(value),
                    "--export" => parsed.export = Some(value),
                    _ => parsed.trace = Some(value),
                }
            }
            _ if arg.starts_with('-') => bail!("unknown flag: {arg}"),
            _ => file = Some(arg),
        }
    }
    match file {
        Some(file) => {
            parsed.file = file;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

/// Logger filtered by the `var` environment variable, `warn` when unset
fn logger_builder(var: &str) -> env_logger::Builder {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::new().filter_or(var, "warn"));
    builder.format(|buf, record| {
        // \r keeps lines readable while the terminal is in raw mode
        write!(buf, "\r[{:<5} {}] {}\r\n", record.level(), record.target(), record.args())
    });
    builder
}

fn main() -> Result<()> {
    logger_builder("PSG_REPLAY_LOG").init();

    let Some(args) = parse_args(env::args().skip(1))? else {
        eprint!("{USAGE}");
        return Ok(());
    };

    let config = match &args.config {
        Some(path) => PlayerConfig::from_json_file(path)
            .with_context(|| format!("failed to load config '{path}'"))?,
        None => PlayerConfig::default(),
    };

    let track = format::load_file(&args.file)
        .with_context(|| format!("failed to load '{}'", args.file))?;
    println!("File: {}", args.file);
    println!("{}\n", track.format_info());

    let mut offline = false;
    if let Some(path) = &args.trace {
        let file = File::create(path).with_context(|| format!("failed to create '{path}'"))?;
        let rows =
            export::write_decode_trace_csv(&track, &config, UserControls::default(), BufWriter::new(file))
                .with_context(|| format!("failed to write trace '{path}'"))?;
        println!("Trace: {rows} frames -> {path}");
        offline = true;
    }
    if let Some(path) = &args.export {
        let samples = export::export_wav(
            &track,
            &config,
            UserControls::default(),
            path,
            args.normalize,
        )
        .with_context(|| format!("failed to export '{path}'"))?;
        println!(
            "Export: {samples} samples @ {} Hz -> {path}",
            config.sample_rate
        );
        offline = true;
    }
    if offline {
        return Ok(());
    }

    play_live(track, config)
}

#[cfg(not(feature = "streaming"))]
fn play_live(_track: Track, _config: PlayerConfig) -> Result<()> {
    bail!(
        "live playback requires the \"streaming\" feature; rebuild with `--features streaming` or use --export/--trace"
    )
}

#[cfg(feature = "streaming")]
fn play_live(track: Track, config: PlayerConfig) -> Result<()> {
    live::run(track, config)
}

#[cfg(feature = "streaming")]
mod live {
    use anyhow::{Context, Result};
    use psg_replay::streaming::VISUALIZATION_UPDATE_MS;
    use psg_replay::visualization::{
        create_channel_status, create_volume_bar, spectrum_line, tone_highlight,
    };
    use psg_replay::{AudioDevice, Channel, LivePlayer, PlayerConfig, Track};
    use std::io::{self, Read, Write};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::time::Duration;

    const BAR_LEN: usize = 10;
    const STATUS_LINES: usize = 5;

    #[cfg(unix)]
    fn set_raw_terminal(raw: bool) {
        let args: &[&str] = if raw { &["-echo", "raw"] } else { &["echo", "-raw"] };
        let _ = std::process::Command::new("stty").args(args).status();
    }

    #[cfg(not(unix))]
    fn set_raw_terminal(_raw: bool) {}

    fn spawn_key_reader(running: Arc<AtomicBool>) -> mpsc::Receiver<u8> {
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            set_raw_terminal(true);
            let mut stdin = io::stdin();
            let mut buf = [0u8; 1];
            while running.load(Ordering::Relaxed) {
                if stdin.read_exact(&mut buf).is_err() || tx.send(buf[0]).is_err() {
                    break;
                }
                if buf[0] == b'\x03' {
                    break;
                }
            }
            set_raw_terminal(false);
        });
        rx
    }

    pub fn run(track: Track, config: PlayerConfig) -> Result<()> {
        let duration = track.duration_seconds();
        let player = LivePlayer::new(config).context("failed to create player")?;
        player.load(track.clone());
        let device =
            AudioDevice::new(player.voice_bank().clone()).context("failed to open audio device")?;
        if !player.play() {
            println!("Nothing to play.");
            return Ok(());
        }

        println!("Keys: [1/2/3]=mute A/B/C, [4]=mute noise, [space]=pause, [q]=quit\n");
        print!("\x1B[?25l");
        for _ in 0..STATUS_LINES {
            println!();
        }

        let input_running = Arc::new(AtomicBool::new(true));
        let keys = spawn_key_reader(Arc::clone(&input_running));
        let mut spectrum = vec![0u8; player.analyser().frequency_bin_count()];

        'outer: loop {
            std::thread::sleep(Duration::from_millis(VISUALIZATION_UPDATE_MS));

            while let Ok(key) = keys.try_recv() {
                match key {
                    b'1' | b'2' | b'3' | b'4' => {
                        let mut controls = player.controls();
                        let control = match Channel::from_index((key - b'1') as usize) {
                            Some(channel) => controls.channel_mut(channel),
                            None => &mut controls.noise,
                        };
                        control.muted = !control.muted;
                        player.set_controls(controls);
                    }
                    b' ' if device.is_paused() => device.play(),
                    b' ' => device.pause(),
                    b'q' | b'Q' | b'\x03' => break 'outer,
                    _ => {}
                }
            }

            let now = player.current_time();
            if !player.is_playing() && now >= duration {
                break;
            }

            let (position, total) = player.position();
            let frame = track
                .frames()
                .get(position.saturating_sub(1))
                .copied()
                .unwrap_or_default();
            let targets = *player.voice_bank().lock().current_targets();
            let controls = player.controls();
            player.analyser().byte_frequency_data(&mut spectrum);

            let bars: Vec<String> = Channel::ALL
                .iter()
                .map(|&ch| create_volume_bar(targets.tone(ch).gain, BAR_LEN))
                .collect();
            let status: Vec<String> = Channel::ALL
                .iter()
                .map(|&ch| create_channel_status(&frame, ch, controls.channel(ch)))
                .collect();
            let notes: Vec<String> = Channel::ALL
                .iter()
                .map(|&ch| tone_highlight(targets.tone(ch)))
                .collect();

            print!("\x1B[{STATUS_LINES}A");
            print!(
                "\x1B[2K\r[{:>6.1}s / {:.1}s] frame {:>5}/{} | {:?}{}\r\n",
                now,
                duration,
                position,
                total,
                player.state(),
                if device.is_paused() { " (paused)" } else { "" },
            );
            print!(
                "\x1B[2K\rA {} | B {} | C {} | N{} {}\r\n",
                bars[0],
                bars[1],
                bars[2],
                if controls.noise.muted { "(M)" } else { "" },
                create_volume_bar(targets.noise.gain, BAR_LEN),
            );
            print!(
                "\x1B[2K\r{:<16} | {:<16} | {:<16}\r\n",
                status[0], status[1], status[2]
            );
            print!(
                "\x1B[2K\r{:<16} | {:<16} | {:<16}\r\n",
                notes[0], notes[1], notes[2]
            );
            print!("\x1B[2K\r{}\r\n", spectrum_line(&spectrum, 64));
            io::stdout().flush().ok();
        }

        input_running.store(false, Ordering::Relaxed);
        set_raw_terminal(false);
        print!("\x1B[?25h");
        io::stdout().flush().ok();

        player.stop();
        device.finish();
        println!("\nPlayback complete.");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Result<Option<Args>> {
        parse_args(list.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_parse_full_command_line() {
        let parsed = args(&["--config", "c.json", "--export", "o.wav", "--normalize", "song.ym"])
            .unwrap()
            .unwrap();
        assert_eq!(parsed.file, "song.ym");
        assert_eq!(parsed.config.as_deref(), Some("c.json"));
        assert_eq!(parsed.export.as_deref(), Some("o.wav"));
        assert!(parsed.normalize);
        assert!(parsed.trace.is_none());
    }

    #[test]
    fn test_help_and_missing_file() {
        assert!(args(&["-h"]).unwrap().is_none());
        assert!(args(&[]).unwrap().is_none());
    }

    #[test]
    fn test_bad_flags() {
        assert!(args(&["--trace"]).is_err());
        assert!(args(&["--loud", "song.ym"]).is_err());
    }

    #[test]
    fn test_logger_defaults_to_warn() {
        let logger = logger_builder("PSG_REPLAY_TEST_UNSET_LOG").build();
        assert_eq!(logger.filter(), log::LevelFilter::Warn);
    }

    #[test]
    fn test_logger_reads_level_from_env() {
        env::set_var("PSG_REPLAY_TEST_DEBUG_LOG", "debug");
        let logger = logger_builder("PSG_REPLAY_TEST_DEBUG_LOG").build();
        assert_eq!(logger.filter(), log::LevelFilter::Debug);
    }
}
