use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use anyhow::{anyhow, bail, Context, Result};
use log::{error, info, warn};
use polytone::core::audio::{BlockRecorder, DeviceOutput, WavRecorder};
use polytone::core::midi::{ChannelSource, MidiFilePlayer, MidiInputHandler, NoteSource};
use polytone::core::oscillator::{Tuning, Waveform};
use polytone::messaging::NoteEvent;
use polytone::{AppSettings, Session, SharedSettings};

const USAGE: &str = "\
usage: polytone [options]
       polytone --render <in.mid> <out.wav> [options]

options:
  --list-ports          list MIDI input ports and exit
  --port <n>            connect to MIDI input port n
  --no-midi             play from the command line only
  --wav <path>          record the output to a WAV file
  --midi <path>         record played notes to a MIDI file
  --et <n>              n-tone equal temperament (1-64)
  --tuning <name>       young | werckmeister | et<n>
  --detune <hz>         shift every note by a fixed frequency
  --volume <0-100>      master volume
  --square              square wave instead of sine
  --no-envelope         disable attack and release ramps";

const HELP: &str = "\
commands:
  n <pitch> [vel]   note on        o <pitch>       note off
  v <0-100>         volume         d <hz>          detune
  t <tuning>        et<n> | young | werckmeister
  w sine|square     waveform       e on|off        envelope
  rec <path>        start WAV      rec stop        finish WAV
  q                 quit (an empty line also quits)";

#[derive(Debug, Default)]
struct Options {
    list_ports: bool,
    port: Option<usize>,
    no_midi: bool,
    wav: Option<PathBuf>,
    midi: Option<PathBuf>,
    render: Option<(PathBuf, PathBuf)>,
    tuning: Option<Tuning>,
    detune: Option<f32>,
    volume: Option<f32>,
    waveform: Option<Waveform>,
    envelope: Option<bool>,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Options> {
    let mut opts = Options::default();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        let mut value = |name: &str| args.next().ok_or_else(|| anyhow!("{} needs a value", name));
        match arg.as_str() {
            "--list-ports" => opts.list_ports = true,
            "--port" => opts.port = Some(value("--port")?.parse().context("--port")?),
            "--no-midi" => opts.no_midi = true,
            "--wav" => opts.wav = Some(value("--wav")?.into()),
            "--midi" => opts.midi = Some(value("--midi")?.into()),
            "--render" => {
                let input = value("--render")?;
                let output = value("--render")?;
                opts.render = Some((input.into(), output.into()));
            }
            "--et" => opts.tuning = Some(Tuning::EqualTemperament(value("--et")?.parse().context("--et")?)),
            "--tuning" => opts.tuning = Some(parse_tuning(&value("--tuning")?)?),
            "--detune" => opts.detune = Some(value("--detune")?.parse().context("--detune")?),
            "--volume" => opts.volume = Some(value("--volume")?.parse().context("--volume")?),
            "--square" => opts.waveform = Some(Waveform::Square),
            "--no-envelope" => opts.envelope = Some(false),
            "-h" | "--help" => {
                println!("{}", USAGE);
                std::process::exit(0);
            }
            other => bail!("unknown argument '{}'\n{}", other, USAGE),
        }
    }
    Ok(opts)
}

fn parse_tuning(name: &str) -> Result<Tuning> {
    let name = name.to_ascii_lowercase();
    match name.as_str() {
        "young" | "young1799" => Ok(Tuning::Young1799),
        "werckmeister" => Ok(Tuning::Werckmeister),
        _ => {
            let n = name.strip_prefix("et").unwrap_or(&name);
            let n = n.parse().with_context(|| format!("unknown tuning '{}'", name))?;
            Ok(Tuning::EqualTemperament(n))
        }
    }
}

fn parse_waveform(name: &str) -> Result<Waveform> {
    match name {
        "sine" => Ok(Waveform::Sine),
        "square" => Ok(Waveform::Square),
        other => bail!("unknown waveform '{}'", other),
    }
}

#[derive(Debug, PartialEq)]
enum Command {
    Note(NoteEvent),
    Volume(f32),
    Detune(f32),
    Tuning(Tuning),
    Waveform(Waveform),
    Envelope(bool),
    StartWav(PathBuf),
    StopWav,
    Help,
    Quit,
}

fn parse_command(line: &str) -> Result<Command> {
    let mut parts = line.split_whitespace();
    let Some(head) = parts.next() else {
        return Ok(Command::Quit);
    };
    let mut arg = || parts.next().ok_or_else(|| anyhow!("'{}' needs an argument", head));

    let command = match head {
        "n" => {
            let pitch: u8 = arg()?.parse()?;
            let velocity: u8 = match arg() {
                Ok(v) => v.parse()?,
                Err(_) => 100,
            };
            if pitch > 127 || velocity > 127 {
                bail!("pitch and velocity must be 0-127");
            }
            Command::Note(NoteEvent::NoteOn { pitch, velocity })
        }
        "o" => Command::Note(NoteEvent::NoteOff { pitch: arg()?.parse()? }),
        "v" => Command::Volume(arg()?.parse()?),
        "d" => Command::Detune(arg()?.parse()?),
        "t" => Command::Tuning(parse_tuning(arg()?)?),
        "w" => Command::Waveform(parse_waveform(arg()?)?),
        "e" => Command::Envelope(match arg()? {
            "on" => true,
            "off" => false,
            other => bail!("expected on or off, got '{}'", other),
        }),
        "rec" => match arg()? {
            "stop" => Command::StopWav,
            path => Command::StartWav(path.into()),
        },
        "h" | "help" | "?" => Command::Help,
        "q" | "quit" => Command::Quit,
        other => bail!("unknown command '{}'", other),
    };
    Ok(command)
}

fn apply_options(app: &mut AppSettings, opts: &Options) {
    let synth = &mut app.synth;
    if let Some(tuning) = opts.tuning {
        synth.tuning = tuning;
    }
    if let Some(detune) = opts.detune {
        synth.detune_hz = detune;
    }
    if let Some(volume) = opts.volume {
        synth.master_volume = volume;
    }
    if let Some(waveform) = opts.waveform {
        synth.waveform = waveform;
    }
    if let Some(enabled) = opts.envelope {
        synth.envelope_enabled = enabled;
    }
}

fn render_file(app: &AppSettings, input: &Path, output: &Path) -> Result<()> {
    let player = MidiFilePlayer::load(input)
        .with_context(|| format!("failed to read {}", input.display()))?;
    info!(
        "Rendering {} note events ({:.1} s) from {}",
        player.events().len(),
        player.duration_secs(),
        input.display()
    );
    let mut wav = WavRecorder::create(output, app.engine.sample_rate)?;
    let blocks = player.render(&app.engine, &app.synth, &mut wav)?;
    let samples = wav.samples_written();
    Box::new(wav).finish()?;
    println!("Wrote {} blocks ({} samples) to {}", blocks, samples, output.display());
    Ok(())
}

/// Ask on stdin which port to use. `None` means play without MIDI input.
fn choose_port(ports: &[String], saved: Option<&str>) -> Result<Option<usize>> {
    if ports.is_empty() {
        warn!("No MIDI input ports found");
        return Ok(None);
    }
    if let Some(index) = saved.and_then(|name| ports.iter().position(|p| p == name)) {
        info!("Reconnecting to saved MIDI port '{}'", ports[index]);
        return Ok(Some(index));
    }
    if ports.len() == 1 {
        return Ok(Some(0));
    }

    println!("Available MIDI input ports:");
    for (i, name) in ports.iter().enumerate() {
        println!("  {}: {}", i, name);
    }
    print!("Select a port (empty for none): ");
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let index: usize = line.parse().context("port number")?;
    if index >= ports.len() {
        bail!("no MIDI port {}", index);
    }
    Ok(Some(index))
}

fn run_commands(session: &Session) -> Result<()> {
    println!("{}", HELP);
    let settings: &SharedSettings = session.settings();
    for line in io::stdin().lock().lines() {
        if !session.is_running() {
            break;
        }
        let command = match parse_command(&line?) {
            Ok(command) => command,
            Err(e) => {
                println!("{}", e);
                continue;
            }
        };
        let result = match command {
            Command::Note(event) => session.send(event),
            Command::Volume(v) => settings.set_volume(v),
            Command::Detune(hz) => settings.set_detune(hz),
            Command::Tuning(t) => settings.set_tuning(t).map(|_| println!("Tuning: {}", t.label())),
            Command::Waveform(w) => settings.set_waveform(w),
            Command::Envelope(on) => settings.set_envelope_enabled(on),
            Command::StartWav(path) => session.attach_wav(&path),
            Command::StopWav => session.detach_wav().map(|attached| {
                if !attached {
                    println!("Not recording");
                }
            }),
            Command::Help => {
                println!("{}", HELP);
                Ok(())
            }
            Command::Quit => break,
        };
        if let Err(e) = result {
            println!("{}", e);
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let opts = parse_args(std::env::args().skip(1))?;
    let mut app = AppSettings::load().unwrap_or_else(|e| {
        warn!("Failed to load settings, using defaults: {}", e);
        AppSettings::default()
    });
    apply_options(&mut app, &opts);

    if let Some((input, output)) = &opts.render {
        return render_file(&app, input, output);
    }

    let mut midi = MidiInputHandler::new();
    if opts.list_ports {
        for (i, name) in midi.list_ports()?.iter().enumerate() {
            println!("{}: {}", i, name);
        }
        return Ok(());
    }

    let port = match (opts.no_midi, opts.port) {
        (true, _) => None,
        (false, Some(index)) => Some(index),
        (false, None) => {
            let ports = midi.list_ports().unwrap_or_else(|e| {
                warn!("Could not list MIDI ports: {}", e);
                Vec::new()
            });
            choose_port(&ports, app.midi_port.as_deref())?
        }
    };
    // Typed notes go through Session::send; this source just stays idle.
    let (_, idle) = ChannelSource::pair();
    let source: Box<dyn NoteSource> = match port {
        Some(index) => {
            let source = midi.connect_to_index(index)?;
            app.midi_port = midi.connected_port().map(str::to_string);
            Box::new(source)
        }
        None => Box::new(idle),
    };

    let settings = SharedSettings::new(app.synth.clone())?;
    let (output, sink) = DeviceOutput::open_default(&app.engine)?;
    info!("Playing on {} ({} channels)", output.device_name(), output.channels());

    let session = Session::start(app.engine.clone(), settings.clone(), Box::new(sink), source)?;
    if let Some(path) = &opts.wav {
        session.attach_wav(path)?;
    }
    if opts.midi.is_some() {
        session.attach_note_log();
    }

    let commands = run_commands(&session);
    let report = session.stop()?;

    // Devices are released only after both loops have exited.
    drop(output);
    midi.disconnect();

    if let Some(e) = &report.recorder_error {
        error!("WAV recording failed: {}", e);
    }
    if let (Some(path), Some(log)) = (&opts.midi, report.note_log) {
        let notes = log.save(path)?;
        println!("Saved {} notes to {}", notes.len(), path.display());
    }

    app.synth = (*settings.snapshot()).clone();
    if let Err(e) = app.save() {
        warn!("Failed to save settings: {}", e);
    }

    println!(
        "Rendered {} blocks, {} note events",
        report.blocks_rendered, report.events_applied
    );
    commands?;
    if let Some(e) = report.device_error {
        return Err(e).context("audio output failed");
    }
    Ok(())
}
