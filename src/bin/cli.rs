//! segue CLI: load a bank and run a scripted music timeline headlessly.
//!
//! Usage:
//!   sg-cli demos/demo_bank.toml --play calm --at 3.0:play:battle --at 5:stinger:hit --seconds 12
//!   sg-cli demos/demo_bank.toml --play calm --realtime --seconds 4

use std::path::PathBuf;
use std::str::FromStr;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::Parser;
use sg_engine::PlayOptions;
use sg_master::{Command, Controller, Snapshot};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sg-cli", about = "Run a scripted timeline against a segue music bank")]
struct Args {
    /// Bank file (TOML)
    bank: PathBuf,

    /// Asset to start at time zero
    #[arg(long)]
    play: Option<String>,

    /// Timed request, SECS:ACTION[:ARG]; e.g. 4.5:play:battle, 6:stinger:hit,
    /// 7:switch:intensity=high, 9:stop:2.0
    #[arg(long = "at", value_name = "SECS:ACTION")]
    cues: Vec<Cue>,

    /// Length of the run in seconds
    #[arg(long, default_value_t = 10.0)]
    seconds: f32,

    /// Clock step in milliseconds
    #[arg(long, default_value_t = 10)]
    tick_ms: u64,

    /// Run on a background clock thread in wall-clock time
    #[arg(long)]
    realtime: bool,
}

#[derive(Clone, Debug, PartialEq)]
enum Action {
    Play(String),
    Stop(f32),
    Pause(f32),
    Resume(f32),
    Stinger(String),
    Switch { group: String, value: String, fade: f32 },
    Mute(f32),
    Unmute(f32),
    Cancel,
    Unload(String),
}

#[derive(Clone, Debug, PartialEq)]
struct Cue {
    seconds: f32,
    action: Action,
}

fn parse_fade(arg: Option<&str>) -> Result<f32, String> {
    match arg {
        None => Ok(0.0),
        Some(s) => s.parse().map_err(|_| format!("bad fade time '{s}'")),
    }
}

fn required(arg: Option<&str>, verb: &str) -> Result<String, String> {
    arg.filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| format!("'{verb}' needs a name"))
}

impl FromStr for Cue {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (secs, rest) = s.split_once(':').ok_or("expected SECS:ACTION")?;
        let seconds: f32 = secs.parse().map_err(|_| format!("bad time '{secs}'"))?;
        if seconds.is_nan() || seconds < 0.0 {
            return Err(format!("time must be non-negative, got '{secs}'"));
        }
        let (verb, arg) = match rest.split_once(':') {
            Some((verb, arg)) => (verb, Some(arg)),
            None => (rest, None),
        };
        let action = match verb {
            "play" => Action::Play(required(arg, verb)?),
            "stop" => Action::Stop(parse_fade(arg)?),
            "pause" => Action::Pause(parse_fade(arg)?),
            "resume" => Action::Resume(parse_fade(arg)?),
            "stinger" => Action::Stinger(required(arg, verb)?),
            "switch" => {
                let pair = required(arg, verb)?;
                let (group, value) = pair.split_once('=').ok_or("expected switch:GROUP=VALUE")?;
                Action::Switch { group: group.to_string(), value: value.to_string(), fade: 0.0 }
            }
            "mute" => Action::Mute(parse_fade(arg)?),
            "unmute" => Action::Unmute(parse_fade(arg)?),
            "cancel" => Action::Cancel,
            "unload" => Action::Unload(required(arg, verb)?),
            other => return Err(format!("unknown action '{other}'")),
        };
        Ok(Cue { seconds, action })
    }
}

impl Action {
    fn command(&self, options: PlayOptions) -> Option<Command> {
        Some(match self {
            Action::Play(asset) => Command::play(asset, options),
            Action::Stop(fade) => Command::StopMusic { fade: *fade },
            Action::Pause(fade) => Command::PauseMusic { fade: *fade },
            Action::Resume(fade) => Command::ResumeMusic { fade: *fade },
            Action::Stinger(name) => Command::stinger(name),
            Action::Switch { group, value, fade } => Command::switch(group, value, *fade),
            Action::Mute(fade) => Command::Mute { fade: *fade },
            Action::Unmute(fade) => Command::Unmute { fade: *fade },
            Action::Cancel => Command::CancelPending,
            Action::Unload(_) => return None,
        })
    }
}

fn apply(controller: &mut Controller, action: &Action, options: PlayOptions) {
    if let Action::Unload(segment) = action {
        if let Err(err) = controller.unload_segment(segment) {
            warn!(%err, "unload failed");
        }
        return;
    }
    if let Some(command) = action.command(options) {
        match controller.apply(command) {
            Ok(status) => info!(?action, ?status, "request"),
            Err(err) => warn!(?action, %err, "request failed"),
        }
    }
}

fn run_offline(mut controller: Controller, cues: &[Cue], seconds: f32, tick_ms: u64, options: PlayOptions) {
    let rate = controller.transport().config().sample_rate as u64;
    let step = (rate * tick_ms / 1000).max(1);
    let total = controller.transport().config().samples(seconds);
    let mut next_cue = 0;
    let mut last = controller.snapshot();
    println!("{last}");

    while controller.transport().now() < total {
        let now = controller.transport().now();
        while let Some(cue) = cues.get(next_cue) {
            if controller.transport().config().samples(cue.seconds) > now {
                break;
            }
            apply(&mut controller, &cue.action, options);
            next_cue += 1;
        }
        controller.tick(step.min(total - now));
        let snap = controller.snapshot();
        if snap.state_differs(&last) {
            println!("{snap}");
        }
        last = snap;
    }
}

fn wall(seconds: f32) -> Duration {
    Duration::try_from_secs_f32(seconds).unwrap_or(Duration::ZERO)
}

fn run_realtime(controller: Controller, cues: &[Cue], seconds: f32, tick_ms: u64, options: PlayOptions) -> Result<()> {
    let Ok(mut running) = controller.spawn(Duration::from_millis(tick_ms.max(1))) else {
        bail!("controller has no command queue");
    };
    let start = Instant::now();
    for cue in cues {
        let due = wall(cue.seconds);
        if let Some(wait) = due.checked_sub(start.elapsed()) {
            std::thread::sleep(wait);
        }
        match cue.action.command(options) {
            Some(command) => {
                if running.send(command).is_err() {
                    warn!(action = ?cue.action, "command queue full");
                }
            }
            None => warn!(action = ?cue.action, "not available in realtime mode"),
        }
        println!("{:>8.3}s sent {:?} (clock {})", cue.seconds, cue.action, running.now());
    }
    if let Some(wait) = wall(seconds).checked_sub(start.elapsed()) {
        std::thread::sleep(wait);
    }
    let controller = running.stop().context("clock thread panicked")?;
    let snap: Snapshot = controller.snapshot();
    println!("{snap}");
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut controller = Controller::load(&args.bank)
        .with_context(|| format!("loading {}", args.bank.display()))?;

    let config = controller.transport().config().clone();
    println!("Bank:     {}", args.bank.display());
    println!("Rate:     {} Hz", config.sample_rate);
    println!("Segments: {}", controller.bank().segments().count());
    let assets: Vec<&str> = controller.bank().asset_names().collect();
    println!("Assets:   {}", assets.join(", "));
    println!();

    let options = PlayOptions::fades(config.default_fade_in, config.default_fade_out);
    if let Some(asset) = &args.play {
        controller
            .play(asset, options)
            .with_context(|| format!("starting {asset}"))?;
    }

    let mut cues = args.cues.clone();
    cues.sort_by(|a, b| a.seconds.total_cmp(&b.seconds));

    if args.realtime {
        run_realtime(controller, &cues, args.seconds, args.tick_ms, options)
    } else {
        run_offline(controller, &cues, args.seconds, args.tick_ms, options);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_cues() {
        assert_eq!(
            "4.5:play:battle".parse::<Cue>(),
            Ok(Cue { seconds: 4.5, action: Action::Play("battle".into()) })
        );
        assert_eq!("9:stop:2".parse::<Cue>().unwrap().action, Action::Stop(2.0));
        assert_eq!("1:cancel".parse::<Cue>().unwrap().action, Action::Cancel);
        assert_eq!(
            "7:switch:intensity=high".parse::<Cue>().unwrap().action,
            Action::Switch { group: "intensity".into(), value: "high".into(), fade: 0.0 }
        );
    }

    #[test]
    fn rejects_bad_cues() {
        assert!("play:battle".parse::<Cue>().is_err());
        assert!("-1:stop".parse::<Cue>().is_err());
        assert!("1:play".parse::<Cue>().is_err());
        assert!("1:switch:intensity".parse::<Cue>().is_err());
        assert!("1:dance".parse::<Cue>().is_err());
    }
}
