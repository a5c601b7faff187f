mod device;

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Instant,
};

use clap::{Args, Parser, Subcommand};
use crossbeam::channel::{self, RecvTimeoutError};
use device::MidiSurface;
use traffic_jam_core::{
    load_timeline, AppConfig, Anchor, ClockAdapter, ControlId, InternalClock, MidiMessage, Palette,
    Scene, Session, Timeline, TrafficJamError,
};
use tracing_subscriber::EnvFilter;

fn main() -> traffic_jam_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(setup) => run_live(&setup),
        Commands::Check(setup) => run_check(&setup),
        Commands::Ports => run_ports(),
    }
}

enum LoopEvent {
    Input(ControlId, u8),
    Quit,
}

fn run_live(setup: &Setup) -> traffic_jam_core::Result<()> {
    let (config, palette, timeline) = setup.load()?;
    tracing::info!(
        bpm = config.clock.bpm,
        ppq = config.clock.ppq,
        "starting live mode"
    );

    let surface = MidiSurface::open(
        &config.surface.device,
        &config.surface.relay,
        config.surface.layout.clone(),
    )?;
    let mut session = Session::from_config(&config, Arc::new(timeline), &palette, surface)?;
    let mut clock = InternalClock::new(
        config.clock.bpm,
        config.clock.ppq,
        config.clock.start_locked,
    )?;

    let (tx, rx) = channel::unbounded();

    let input = device::new_input()?;
    let port = device::find_port(&input, &config.surface.device)?;
    let layout = config.surface.layout.clone();
    let input_tx = tx.clone();
    let _connection = input
        .connect(
            &port,
            "traffic-jam-input",
            move |_timestamp, bytes, _| {
                match MidiMessage::from_bytes(bytes).and_then(|m| layout.decode(&m)) {
                    Some((control, value)) => {
                        let _ = input_tx.send(LoopEvent::Input(control, value));
                    }
                    None => tracing::debug!(?bytes, "unhandled message"),
                }
            },
            (),
        )
        .map_err(|err| {
            TrafficJamError::msg(format!(
                "failed to listen to `{}`: {err}",
                config.surface.device
            ))
        })?;

    std::thread::spawn(move || {
        let mut line = String::new();
        let _ = std::io::stdin().read_line(&mut line);
        let _ = tx.send(LoopEvent::Quit);
    });
    tracing::info!("listening, press Enter to quit");

    session.sync(&clock)?;
    loop {
        let wait = clock.poll(Instant::now());
        if wait.is_zero() {
            session.sync(&clock)?;
            continue;
        }

        match rx.recv_timeout(wait) {
            Ok(LoopEvent::Input(control, value)) => {
                if let Some(command) = session.on_raw_input(control, value) {
                    clock.apply(command);
                    session.sync(&clock)?;
                }
            }
            Ok(LoopEvent::Quit) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }
    }

    tracing::info!(ticks = clock.current_position().ticks, "shutting down");
    session.blackout(palette.value("black", "dim").unwrap_or(0));
    Ok(())
}

fn run_check(setup: &Setup) -> traffic_jam_core::Result<()> {
    let (config, _palette, timeline) = setup.load()?;
    let bpm = config.clock.bpm;

    println!(
        "{} scene(s) at {bpm} bpm, {} ppq",
        timeline.len(),
        timeline.ppq()
    );
    for index in timeline.ordered(bpm) {
        let Some(scene) = timeline.scene(index) else {
            continue;
        };
        let ticks = scene.anchor().to_ticks(bpm, timeline.ppq());
        let marker = if Arc::ptr_eq(scene, timeline.default_scene()) {
            "*"
        } else {
            " "
        };
        println!(
            "{marker} {ticks:>10.1}  {:<12} {:<20} {} mapping(s)",
            scene.anchor().to_string(),
            scene.name(),
            scene.mappings().len()
        );
    }
    Ok(())
}

fn run_ports() -> traffic_jam_core::Result<()> {
    println!("Inputs:");
    for name in device::port_names(&device::new_input()?) {
        println!("  {name}");
    }
    println!("Outputs:");
    for name in device::port_names(&device::new_output()?) {
        println!("  {name}");
    }
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Scene-based remapper for grid MIDI controllers",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Connect to the controller and run the timeline.
    Run(Setup),
    /// Validate a scene file and print the resolved timeline.
    Check(Setup),
    /// List the available MIDI ports.
    Ports,
}

#[derive(Args, Debug)]
struct Setup {
    /// Scene timeline file. Without one only the transport bindings and the
    /// unmapped-control policy apply.
    #[arg(short, long)]
    scenes: Option<PathBuf>,
    /// Application configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Palette file mapping colour names to device values.
    #[arg(short, long)]
    palette: Option<PathBuf>,
    /// Tempo override in beats per minute.
    #[arg(short, long)]
    bpm: Option<f64>,
    /// Clock pulses per quarter note override.
    #[arg(long)]
    ppq: Option<u32>,
}

impl Setup {
    fn load(&self) -> traffic_jam_core::Result<(AppConfig, Palette, Timeline)> {
        let mut config = match &self.config {
            Some(path) => AppConfig::load(path)?,
            None => AppConfig::default(),
        };
        if let Some(bpm) = self.bpm {
            config.clock.bpm = bpm;
        }
        if let Some(ppq) = self.ppq {
            config.clock.ppq = ppq;
        }
        config.validate()?;

        let palette = match &self.palette {
            Some(path) => Palette::load(path)?,
            None => Palette::default(),
        };

        let timeline = match &self.scenes {
            Some(path) => load_scenes(path, &palette, config.clock.ppq)?,
            None => {
                tracing::warn!("no scene file given, relaying every control unchanged");
                let scene = Scene::new("passthrough", Anchor::Tick(0), Vec::new())?;
                Timeline::new(vec![scene], None, config.clock.ppq)?
            }
        };
        Ok((config, palette, timeline))
    }
}

fn load_scenes(path: &Path, palette: &Palette, ppq: u32) -> traffic_jam_core::Result<Timeline> {
    tracing::info!(?path, "loading scenes");
    load_timeline(path, palette, ppq)
}
