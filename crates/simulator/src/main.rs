//! Desktop simulator for the alarm engine.
//!
//! Runs the real [`AlarmService`] and [`AudioLooper`] against a simulated
//! DS3231 whose clock can run faster than real time. The RTC interrupt line
//! is emulated by polling the simulated register; pressing Enter is the stop
//! button. A small command prompt edits alarms while the clock runs.
//!
//! ```text
//! alarm-sim --start 2024-01-01T06:58:00 --speed 60 --alarm 07:00@weekdays
//! ```
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod audio;
mod rtc;

use alarm::{Alarm, AlarmId, AlarmService, AlarmTime, AudioLooper, DaysOfWeek, ServiceConfig};
use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDateTime;
use clap::Parser;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use embassy_time::Timer;
use platform::config::{APP_NAME, APP_VERSION};
use platform::VolumePercent;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use crate::audio::ConsoleAudio;
use crate::rtc::SimulatedRtc;

type Raw = CriticalSectionRawMutex;
type Service<'a> = AlarmService<'a, Raw, SimulatedRtc>;

/// How often the simulated INT line is sampled (real time).
const RTC_POLL_MS: u64 = 20;

#[derive(Parser)]
#[command(name = "alarm-sim", about = "Bedside alarm clock simulator", version)]
struct Cli {
    /// Simulated start time (YYYY-MM-DDTHH:MM:SS); defaults to local time
    #[arg(long, value_parser = parse_start)]
    start: Option<NaiveDateTime>,

    /// Simulated seconds per real second
    #[arg(long, default_value_t = 60)]
    speed: u32,

    /// Real seconds an alarm rings before it is marked missed (0 = forever)
    #[arg(long, default_value_t = 30)]
    timeout: u32,

    /// Alarm sound path
    #[arg(long, default_value = alarm::config::DEFAULT_AUDIO_PATH)]
    audio: String,

    /// Volume in percent
    #[arg(long, default_value_t = 50)]
    volume: u8,

    /// Alarm to create at start-up: HH:MM[@DAYS], DAYS being once, daily,
    /// weekdays, weekends or a hex Monday-first bit mask. Repeatable.
    #[arg(long = "alarm", value_parser = parse_alarm)]
    alarms: Vec<AlarmArg>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log: String,
}

#[derive(Clone, Copy)]
struct AlarmArg {
    time: AlarmTime,
    days: DaysOfWeek,
}

fn parse_start(s: &str) -> Result<NaiveDateTime, String> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M"))
        .map_err(|e| e.to_string())
}

fn parse_time(s: &str) -> Result<AlarmTime, String> {
    let (h, m) = s.split_once(':').ok_or("expected HH:MM")?;
    let hour = h.parse::<u8>().map_err(|e| e.to_string())?;
    let minute = m.parse::<u8>().map_err(|e| e.to_string())?;
    AlarmTime::try_new(hour, minute).map_err(|e| e.to_string())
}

fn parse_days(s: &str) -> Result<DaysOfWeek, String> {
    match s {
        "once" => Ok(DaysOfWeek::NONE),
        "daily" => Ok(DaysOfWeek::EVERY_DAY),
        "weekdays" => Ok(DaysOfWeek::WEEKDAYS),
        "weekends" => Ok(DaysOfWeek::from_flags([
            false, false, false, false, false, true, true,
        ])),
        hex => {
            let mask = u8::from_str_radix(hex.trim_start_matches("0x"), 16)
                .map_err(|e| e.to_string())?;
            DaysOfWeek::try_from_mask(mask).map_err(|e| e.to_string())
        }
    }
}

fn parse_alarm(s: &str) -> Result<AlarmArg, String> {
    let (time, days) = match s.split_once('@') {
        Some((time, days)) => (parse_time(time)?, parse_days(days)?),
        None => (parse_time(s)?, DaysOfWeek::EVERY_DAY),
    };
    Ok(AlarmArg { time, days })
}

fn parse_id(s: &str) -> Result<AlarmId> {
    let raw = u64::from_str_radix(s.trim_start_matches("0x"), 16)
        .with_context(|| format!("bad alarm id {s:?}"))?;
    Ok(AlarmId::from_raw(raw))
}

const HELP: &str = "\
commands:
  <Enter>                 stop button
  add HH:MM[@DAYS]        new enabled alarm
  rm ID                   remove alarm
  on ID | off ID          enable / disable
  time ID HH:MM           change time
  days ID DAYS            change repeat days
  ack ID                  clear missed flag
  vol PERCENT             set volume
  ls                      list alarms and schedule
  q                       quit";

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log)),
        )
        .init();

    println!("{APP_NAME} simulator v{APP_VERSION}");

    let start = cli
        .start
        .unwrap_or_else(|| chrono::Local::now().naive_local());
    let config = ServiceConfig::default()
        .with_playback_timeout_secs(cli.timeout)
        .with_audio_path(&cli.audio)
        .context("invalid audio path")?
        .with_volume(VolumePercent::try_new(cli.volume).context("invalid volume")?);

    let rtc = Mutex::<Raw, _>::new(SimulatedRtc::new(start, cli.speed));
    let looper = AudioLooper::<Raw>::new(&config);
    let service = AlarmService::new(&rtc, &looper, config);
    service.begin().await?;

    let mut rng = rand::thread_rng();
    for wanted in &cli.alarms {
        let alarm = Alarm::with_generated_id(&mut rng, wanted.time, wanted.days, true);
        service.add_alarm(alarm).await?;
    }
    service.dump_alarms().await;
    println!("simulated clock starts at {start}, x{} speed", cli.speed);
    println!("{HELP}");

    let mut output = ConsoleAudio::new();
    tokio::select! {
        () = service.run() => {}
        () = looper.run(&mut output, &service) => {}
        () = rtc_interrupt(&rtc, &service) => {}
        result = console(&service, &mut rng) => result?,
    }
    Ok(())
}

/// Emulated RTC INT line: falling edge whenever the register matches.
async fn rtc_interrupt(rtc: &Mutex<Raw, SimulatedRtc>, service: &Service<'_>) {
    let handle = service.interrupts();
    loop {
        let fired = rtc.lock().await.poll_fired();
        if fired && !handle.alarm_fired() {
            tracing::warn!("alarm interrupt dropped, queue full");
        }
        Timer::after_millis(RTC_POLL_MS).await;
    }
}

/// Reads commands from stdin until `q` or end of input.
async fn console(service: &Service<'_>, rng: &mut rand::rngs::ThreadRng) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match execute(service, rng, line.trim()).await {
            Ok(true) => return Ok(()),
            Ok(false) => {}
            Err(e) => println!("error: {e:#}"),
        }
    }
    Ok(())
}

/// Returns `Ok(true)` when the user asked to quit.
async fn execute(service: &Service<'_>, rng: &mut rand::rngs::ThreadRng, line: &str) -> Result<bool> {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        service.interrupts().stop_pressed();
        return Ok(false);
    };
    let mut arg = |name: &str| {
        words
            .next()
            .ok_or_else(|| anyhow!("missing {name}"))
            .map(str::to_owned)
    };

    match command {
        "q" | "quit" => return Ok(true),
        "help" | "?" => println!("{HELP}"),
        "ls" => service.dump_alarms().await,
        "add" => {
            let wanted = parse_alarm(&arg("HH:MM[@DAYS]")?).map_err(|e| anyhow!(e))?;
            let alarm = Alarm::with_generated_id(rng, wanted.time, wanted.days, true);
            let id = service.add_alarm(alarm).await?;
            println!("added {id}");
        }
        "rm" => service.remove_alarm(parse_id(&arg("id")?)?).await?,
        "on" => service.set_alarm_state(parse_id(&arg("id")?)?, true).await?,
        "off" => service.set_alarm_state(parse_id(&arg("id")?)?, false).await?,
        "time" => {
            let id = parse_id(&arg("id")?)?;
            let time = parse_time(&arg("HH:MM")?).map_err(|e| anyhow!(e))?;
            service.set_alarm_time(id, time).await?;
        }
        "days" => {
            let id = parse_id(&arg("id")?)?;
            let days = parse_days(&arg("days")?).map_err(|e| anyhow!(e))?;
            service.set_alarm_days_of_week(id, days).await?;
        }
        "ack" => service.clear_missed_flag(parse_id(&arg("id")?)?).await?,
        "vol" => {
            let percent: u8 = arg("percent")?.parse().context("bad volume")?;
            service.set_volume(VolumePercent::try_new(percent)?);
        }
        other => bail!("unknown command {other:?}, try help"),
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_alarm_defaults_to_daily() {
        let parsed = parse_alarm("07:30").unwrap();
        assert_eq!(parsed.time, AlarmTime::try_new(7, 30).unwrap());
        assert!(parsed.days.is_every_day());
    }

    #[test]
    fn test_parse_alarm_day_forms() {
        assert!(parse_alarm("06:00@once").unwrap().days.is_one_shot());
        assert_eq!(parse_alarm("06:00@weekdays").unwrap().days, DaysOfWeek::WEEKDAYS);
        assert_eq!(parse_alarm("06:00@0x41").unwrap().days.mask(), 0x41);
        assert!(parse_alarm("06:00@ff").is_err());
        assert!(parse_alarm("24:00").is_err());
        assert!(parse_alarm("0700").is_err());
    }

    #[test]
    fn test_parse_id_accepts_display_form() {
        let id = AlarmId::from_raw(0xdead_beef);
        assert_eq!(parse_id(&id.to_string()).unwrap(), id);
    }
}
