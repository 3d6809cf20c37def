use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use chrono::Local;
use clap::Parser;
use log::{info, warn};

use netclock::alarm::monitor::AlarmStatus;
use netclock::clock::{MonotonicClock, SystemMonotonic};
use netclock::config::{ClockConfig, load_clock_config};
use netclock::controller::{ClockController, SettingOutcome};
use netclock::display::DisplaySnapshot;
use netclock::sync::TimeSync;
use netclock::time_source::HttpDateProbe;

#[derive(Parser, Debug)]
#[command(
    name = "netclock",
    version,
    about = "Network-synchronised terminal clock with a single alarm"
)]
struct Cli {
    #[arg(long)]
    config: Option<PathBuf>,

    /// Time endpoint, repeatable; replaces the configured list, first is tried first.
    #[arg(long = "endpoint")]
    endpoints: Vec<String>,

    #[arg(long, default_value_t = 250)]
    tick_ms: u64,

    /// Wait for the first time sync, print one frame and exit.
    #[arg(long)]
    once: bool,

    /// Upper bound on waiting for the first sync with --once or --alarm-*.
    #[arg(long, default_value_t = 30_000)]
    sync_timeout_ms: u64,

    #[arg(long)]
    alarm_day: Option<String>,

    #[arg(long)]
    alarm_hour: Option<String>,

    #[arg(long)]
    alarm_minute: Option<String>,
}

impl Cli {
    fn wants_alarm(&self) -> bool {
        self.alarm_day.is_some() || self.alarm_hour.is_some() || self.alarm_minute.is_some()
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    if cli.tick_ms == 0 {
        bail!("--tick-ms must be greater than zero");
    }

    let mut config = match &cli.config {
        Some(path) => load_clock_config(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => ClockConfig::default(),
    };
    if !cli.endpoints.is_empty() {
        config.endpoints = cli.endpoints.clone();
        config.validate()?;
    }

    let monotonic: Arc<dyn MonotonicClock> = Arc::new(SystemMonotonic::new());
    let probe = HttpDateProbe::new(&config)?;
    let sync = TimeSync::start(
        config.endpoints.clone(),
        config.resync_interval(),
        Box::new(probe),
        Arc::clone(&monotonic),
    )?;
    let mut controller = ClockController::new(Local, &config, monotonic)?;
    controller.attach_time_sync(sync);

    let tick = Duration::from_millis(cli.tick_ms);
    if cli.once || cli.wants_alarm() {
        wait_for_first_sync(&mut controller, tick, Duration::from_millis(cli.sync_timeout_ms))?;
    }

    if cli.wants_alarm() {
        set_alarm_by_digits(&mut controller, &cli)?;
    }

    if cli.once {
        print_snapshot(&controller.snapshot());
        return Ok(());
    }

    let commands = spawn_command_reader()?;
    run_clock_loop(&mut controller, tick, &commands)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Stop,
    Sync,
}

fn parse_command(line: &str) -> Option<Command> {
    match line.trim().to_ascii_lowercase().as_str() {
        "s" | "stop" => Some(Command::Stop),
        "sync" => Some(Command::Sync),
        _ => None,
    }
}

/// Reads `stop` / `sync` lines from stdin until it closes.
fn spawn_command_reader() -> Result<Receiver<Command>> {
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("netclock-stdin".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else {
                    return;
                };
                match parse_command(&line) {
                    Some(command) => {
                        if tx.send(command).is_err() {
                            return;
                        }
                    }
                    None if line.trim().is_empty() => {}
                    None => warn!("unknown command '{}'; use 'stop' or 'sync'", line.trim()),
                }
            }
        })
        .context("failed to spawn stdin reader")?;
    Ok(rx)
}

fn handle_commands(controller: &mut ClockController, commands: &Receiver<Command>) {
    loop {
        match commands.try_recv() {
            Ok(Command::Stop) => {
                if controller.alarm_status() == AlarmStatus::Ringing && controller.stop_alarm() {
                    println!("Alarm stopped");
                }
            }
            Ok(Command::Sync) => match controller.time_sync() {
                Some(sync) if sync.request_sync() => info!("resync requested"),
                Some(_) => info!("resync already running"),
                None => warn!("no time sync worker attached"),
            },
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => return,
        }
    }
}

fn wait_for_first_sync(
    controller: &mut ClockController,
    tick: Duration,
    timeout: Duration,
) -> Result<()> {
    let deadline = Instant::now() + timeout;
    while !controller.tick().rebased {
        if Instant::now() >= deadline {
            bail!("no time sync result within {} ms", timeout.as_millis());
        }
        thread::sleep(tick.min(Duration::from_millis(20)));
    }
    Ok(())
}

fn set_alarm_by_digits(controller: &mut ClockController, cli: &Cli) -> Result<()> {
    controller.begin_setting();
    controller.open_digit_panel();
    controller.set_digit_fields(
        cli.alarm_day.as_deref().unwrap_or_default(),
        cli.alarm_hour.as_deref().unwrap_or_default(),
        cli.alarm_minute.as_deref().unwrap_or_default(),
    );
    match controller
        .confirm_setting()
        .context("failed to set alarm")?
    {
        SettingOutcome::Armed(at) => println!("Alarm armed for {}", at.format("%d.%m.%y %H:%M:%S")),
        SettingOutcome::Entered | SettingOutcome::Unchanged => {}
    }
    Ok(())
}

fn run_clock_loop(
    controller: &mut ClockController,
    tick: Duration,
    commands: &Receiver<Command>,
) -> Result<()> {
    let mut last_time_text = String::new();
    let mut next_tick = Instant::now();
    loop {
        handle_commands(controller, commands);
        let outcome = controller.tick();
        if outcome.rebased && controller.now().is_none() {
            warn!("time sources unreachable; waiting for next resync");
        }

        let snapshot = controller.snapshot();
        if snapshot.time_text != last_time_text {
            let ringing = if snapshot.show_dismiss { " RINGING" } else { "" };
            println!(
                "{} {}  [{}]{ringing}",
                snapshot.date_text,
                snapshot.time_text,
                snapshot.alarm_text.replace('\n', " ")
            );
            last_time_text = snapshot.time_text;
        }

        if outcome.ringing_started {
            println!(
                "*** ALARM *** {} (enter 'stop' to dismiss)",
                snapshot.alarm_text.replace('\n', " ")
            );
        }

        next_tick += tick;
        let now = Instant::now();
        if next_tick > now {
            thread::sleep(next_tick - now);
        } else {
            next_tick = now;
        }
    }
}

fn print_snapshot(snapshot: &DisplaySnapshot) {
    println!(
        "Time source: {}",
        snapshot.time_source.as_deref().unwrap_or("unavailable")
    );
    println!("Date: {}", snapshot.date_text);
    println!("Time: {}", snapshot.time_text);
    if let Some(arrows) = snapshot.arrows {
        println!(
            "Arrows: hour={:.1} minute={:.1} second={:.1}",
            arrows.hour, arrows.minute, arrows.second
        );
    }
    println!("Alarm: {}", snapshot.alarm_text.replace('\n', " "));
}
