use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use converter_core::config::{AdcConfig, ControlConfig, PwmConfig};
use converter_core::control::Direction;
use converter_core::session::{ControlLoop, CycleReport, HardwareSession};
use converter_core::status::StatusFormatter;
use converter_core::telemetry::{
    TelemetryInstant, TelemetryPayload, TelemetryRecord, TelemetryRecorder,
};

use crate::plant::{Plant, SharedPlant, SimAdc, SimMux, SimTimer, Supply};

/// Simulated time advanced per control cycle.
const CYCLE_PERIOD: Duration = Duration::from_millis(1);
const PRIME_SPIN_LIMIT: u32 = 1_000;
const MAX_RUN_CYCLES: u32 = 10_000;

pub const HELP_TOPICS: &[(&str, &str)] = &[
    ("run", "run [cycles]                  - advance the plant and control loop"),
    ("status", "status                        - display converter state"),
    (
        "supply",
        "supply <pack|bus|none> <level> - hold a rail with an external source",
    ),
    ("brake", "brake <trip|release>          - drive the brake comparator"),
    ("direction", "direction <buck|boost>        - request a power-flow direction"),
    ("comms", "comms <lost|ok>               - report the host link state"),
    ("help", "help [topic]                  - show help for a command"),
];

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TranscriptProfile {
    Startup,
    Brake,
    OverTemperature,
    Reverse,
}

impl TranscriptProfile {
    pub const ALL: [TranscriptProfile; 4] = [
        TranscriptProfile::Startup,
        TranscriptProfile::Brake,
        TranscriptProfile::OverTemperature,
        TranscriptProfile::Reverse,
    ];

    pub fn log_path(self) -> &'static str {
        match self {
            TranscriptProfile::Startup => "transcripts/startup.log",
            TranscriptProfile::Brake => "transcripts/brake.log",
            TranscriptProfile::OverTemperature => "transcripts/overtemp.log",
            TranscriptProfile::Reverse => "transcripts/reverse.log",
        }
    }

    pub fn header(self) -> &'static str {
        match self {
            TranscriptProfile::Startup => "Converter emulator startup transcript",
            TranscriptProfile::Brake => "Converter emulator brake trip transcript",
            TranscriptProfile::OverTemperature => {
                "Converter emulator over-temperature transcript"
            }
            TranscriptProfile::Reverse => "Converter emulator direction reversal transcript",
        }
    }

    /// Heatsink temperature the plant starts at and cools back to.
    pub fn ambient(self) -> f32 {
        match self {
            TranscriptProfile::OverTemperature => 0.93,
            _ => 0.25,
        }
    }

    pub fn from_tag(tag: &str) -> Result<Self, String> {
        if tag.eq_ignore_ascii_case("startup") {
            Ok(Self::Startup)
        } else if tag.eq_ignore_ascii_case("brake") {
            Ok(Self::Brake)
        } else if tag.eq_ignore_ascii_case("overtemp") {
            Ok(Self::OverTemperature)
        } else if tag.eq_ignore_ascii_case("reverse") {
            Ok(Self::Reverse)
        } else {
            Err(format!("Unknown transcript profile `{tag}`"))
        }
    }
}

/// Telemetry timestamp measured in simulated time since session start.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SimInstant(Duration);

impl TelemetryInstant for SimInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        self.0.saturating_sub(earlier.0)
    }
}

pub type SimLoop = ControlLoop<SimAdc, SimMux, SimTimer>;

pub struct Session {
    control: SimLoop,
    plant: SharedPlant,
    recorder: TelemetryRecorder<SimInstant>,
    transcript: TranscriptLogger,
    elapsed: Duration,
    comms_lost: bool,
}

impl Session {
    pub fn new(profile: TranscriptProfile) -> io::Result<Self> {
        let config = ControlConfig::default();
        config
            .validate()
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err.to_string()))?;

        let pwm = PwmConfig::default();
        let plant = Plant::shared(profile.ambient());
        let hardware = HardwareSession::new(
            SimAdc::new(plant.clone()),
            SimMux::new(plant.clone()),
            SimTimer::new(plant.clone(), pwm.period),
            AdcConfig::default(),
        );
        let mut control = ControlLoop::new(hardware, config);
        let mut transcript = TranscriptLogger::new(profile)?;

        let primed = control.prime(PRIME_SPIN_LIMIT);
        transcript.append_line(
            Duration::ZERO,
            TranscriptRole::Emulator,
            if primed {
                "adc primed"
            } else {
                "adc prime timed out"
            },
        )?;

        Ok(Self {
            control,
            plant,
            recorder: TelemetryRecorder::new(),
            transcript,
            elapsed: Duration::ZERO,
            comms_lost: false,
        })
    }

    pub fn control(&self) -> &SimLoop {
        &self.control
    }

    pub fn handle_command(&mut self, line: &str) -> io::Result<Vec<String>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        self.transcript
            .append_line(self.elapsed, TranscriptRole::Host, trimmed)?;

        let mut words = trimmed.split_whitespace();
        let command = words.next().unwrap_or_default().to_ascii_lowercase();
        let argument = words.next();
        let value = words.next();

        let lines = match (command.as_str(), argument, value) {
            ("help", topic, _) => help_lines(topic),
            ("status", None, _) => self.status_lines()?,
            ("run", count, _) => match count.map_or(Ok(1), str::parse::<u32>) {
                Ok(cycles) if (1..=MAX_RUN_CYCLES).contains(&cycles) => self.run(cycles),
                _ => vec![format!("ERR cycles must be 1..={MAX_RUN_CYCLES}")],
            },
            ("supply", Some(rail), level) => self.handle_supply(rail, level),
            ("brake", Some(action), _) => self.handle_brake(action),
            ("direction", Some(direction), _) => self.handle_direction(direction),
            ("comms", Some(state), _) => self.handle_comms(state),
            _ => vec![format!("ERR unknown command `{trimmed}` (try `help`)")],
        };

        self.record_output(&lines)?;
        Ok(lines)
    }

    /// Runs `cycles` control periods, returning one line per telemetry event.
    pub fn run(&mut self, cycles: u32) -> Vec<String> {
        let mut lines = Vec::new();
        for _ in 0..cycles {
            self.plant.borrow_mut().advance();
            self.elapsed += CYCLE_PERIOD;

            let report = self.control.cycle(self.comms_lost);
            self.narrate(&report, &mut lines);
        }

        lines.push(format!(
            "OK ran {cycles} cycles state={} duty={:.3}",
            self.control.state(),
            self.control.context().duty_a
        ));
        lines
    }

    fn narrate(&mut self, report: &CycleReport, lines: &mut Vec<String>) {
        let written = self
            .recorder
            .record_cycle(report, SimInstant(self.elapsed));
        if written == 0 {
            return;
        }

        let skip = self.recorder.len().saturating_sub(written);
        for record in self.recorder.oldest_first().skip(skip) {
            lines.push(format!(
                "[cycle {}] {}",
                self.control.cycles(),
                describe_record(record)
            ));
        }
    }

    fn status_lines(&self) -> io::Result<Vec<String>> {
        let snapshot = self.control.status_snapshot();
        let mut text = String::new();
        StatusFormatter::new(&snapshot)
            .write_all(&mut text)
            .map_err(|_| io::Error::other("status formatting failed"))?;
        Ok(text.lines().map(str::to_string).collect())
    }

    fn handle_supply(&mut self, rail: &str, level: Option<&str>) -> Vec<String> {
        let supply = match rail.to_ascii_lowercase().as_str() {
            "pack" => Supply::Pack,
            "bus" => Supply::Bus,
            "none" => Supply::None,
            other => return vec![format!("ERR unknown rail `{other}`")],
        };
        let level = match level.map(str::parse::<f32>) {
            Some(Ok(level)) if (0.0..=1.0).contains(&level) => level,
            None if supply == Supply::None => 0.0,
            _ => return vec!["ERR level must be a fraction in [0, 1]".to_string()],
        };

        self.plant.borrow_mut().supply(supply, level);
        vec![format!("OK supply {rail} {level:.3}")]
    }

    fn handle_brake(&mut self, action: &str) -> Vec<String> {
        let mut plant = self.plant.borrow_mut();
        if action.eq_ignore_ascii_case("trip") {
            plant.trip_brake();
            vec!["OK brake tripped".to_string()]
        } else if action.eq_ignore_ascii_case("release") {
            plant.release_brake();
            vec!["OK brake released".to_string()]
        } else {
            vec![format!("ERR unknown brake action `{action}`")]
        }
    }

    fn handle_direction(&mut self, direction: &str) -> Vec<String> {
        let requested = if direction.eq_ignore_ascii_case("buck") {
            Direction::Buck
        } else if direction.eq_ignore_ascii_case("boost") {
            Direction::Boost
        } else {
            return vec![format!("ERR unknown direction `{direction}`")];
        };

        self.control.set_direction(requested);
        vec![format!("OK direction {requested} requested")]
    }

    fn handle_comms(&mut self, state: &str) -> Vec<String> {
        if state.eq_ignore_ascii_case("lost") {
            self.comms_lost = true;
        } else if state.eq_ignore_ascii_case("ok") {
            self.comms_lost = false;
        } else {
            return vec![format!("ERR unknown link state `{state}`")];
        }
        vec![format!("OK comms {}", if self.comms_lost { "lost" } else { "ok" })]
    }

    fn record_output(&mut self, lines: &[String]) -> io::Result<()> {
        for line in lines {
            self.transcript
                .append_line(self.elapsed, TranscriptRole::Emulator, line)?;
        }
        Ok(())
    }
}

struct TranscriptLogger {
    writer: BufWriter<std::fs::File>,
}

impl TranscriptLogger {
    fn new(profile: TranscriptProfile) -> io::Result<Self> {
        let path = Path::new(profile.log_path());
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut logger = Self {
            writer: BufWriter::new(file),
        };

        logger.write_header(profile)?;
        Ok(logger)
    }

    fn write_header(&mut self, profile: TranscriptProfile) -> io::Result<()> {
        writeln!(self.writer, "# {}", profile.header())?;
        writeln!(
            self.writer,
            "# Timestamps are simulated milliseconds, one control cycle each"
        )?;
        writeln!(self.writer)?;
        self.writer.flush()
    }

    fn append_line(
        &mut self,
        elapsed: Duration,
        role: TranscriptRole,
        line: &str,
    ) -> io::Result<()> {
        writeln!(
            self.writer,
            "[+{:>6} ms] {} {}",
            elapsed.as_millis(),
            role.prefix(),
            line
        )?;
        self.writer.flush()
    }
}

enum TranscriptRole {
    Host,
    Emulator,
}

impl TranscriptRole {
    fn prefix(&self) -> &'static str {
        match self {
            TranscriptRole::Host => "HOST>",
            TranscriptRole::Emulator => "EMU <",
        }
    }
}

fn help_lines(topic: Option<&str>) -> Vec<String> {
    match topic {
        None => HELP_TOPICS
            .iter()
            .map(|(_, usage)| (*usage).to_string())
            .collect(),
        Some(topic) => HELP_TOPICS
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(topic))
            .map_or_else(
                || vec![format!("ERR no help for `{topic}`")],
                |(_, usage)| vec![(*usage).to_string()],
            ),
    }
}

fn describe_record(record: &TelemetryRecord<SimInstant>) -> String {
    match record.details {
        TelemetryPayload::Transition(details) => {
            let dwell = details
                .dwell
                .map(|dwell| format!(" dwell={}ms", dwell.as_millis()))
                .unwrap_or_default();
            format!(
                "{} from={} duty={}.{:03}{dwell}",
                record.event,
                details.from,
                details.duty_permille / 1_000,
                details.duty_permille % 1_000
            )
        }
        TelemetryPayload::Fault(details) => format!(
            "{} brake={} over-temp={} comms-lost={} from={}",
            record.event,
            details.status.brake_latched,
            details.status.over_temperature,
            details.status.comms_lost,
            details.from
        ),
        TelemetryPayload::None => record.event.to_string(),
    }
}
