//! Alarm scheduling engine — many logical alarms on one RTC alarm register
//!
//! The engine multiplexes one-shot, daily and weekly alarms onto the single
//! alarm slot of a DS3231-class RTC, reacts to the RTC alarm interrupt and a
//! stop button, and drives a looping alarm sound with auto-timeout.
//!
//! # Tasks
//!
//! ```text
//!  RTC INT ─┐                        ┌──────────────┐  Start/Stop  ┌─────────────┐
//!           ├─► Command queue ─────► │ AlarmService │ ───────────► │ AudioLooper │
//!  STOP ────┘   (InterruptHandle)    │   ::run()    │ ◄─────────── │   ::run()   │
//!                                    └──────────────┘   timeout    └─────────────┘
//!                                           ▲
//!                 add / remove / set_* ─────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! # use alarm::{Alarm, AlarmId, AlarmService, AlarmTime, DaysOfWeek, ServiceError};
//! # async fn demo<R: platform::RtcClock>(
//! #     service: &AlarmService<'_, embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex, R>,
//! # ) -> Result<(), ServiceError> {
//! let time = AlarmTime::try_new(7, 30).unwrap();
//! let alarm = Alarm::new(AlarmId::from_raw(1), time, DaysOfWeek::WEEKDAYS, true);
//! let id = service.add_alarm(alarm).await?;
//! service.set_alarm_state(id, false).await?;
//! # Ok(())
//! # }
//! ```
#![cfg_attr(not(test), no_std)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![warn(missing_docs)]
#![allow(async_fn_in_trait)] // Embassy no_std: single-threaded, Send bounds not needed

pub mod alarm;
pub mod config;
pub mod days;
pub mod error;
pub mod hw_alarm;
pub mod irq;
pub mod looper;
pub mod schedule;
pub mod service;

pub use alarm::{Alarm, AlarmId, AlarmTime};
pub use config::ServiceConfig;
pub use days::DaysOfWeek;
pub use error::ServiceError;
pub use hw_alarm::HardwareAlarm;
pub use irq::{interrupt_task, Command, InterruptHandle};
pub use looper::{AudioLooper, LooperCommand, TimeoutListener};
pub use schedule::{AlarmTable, Schedule};
pub use service::AlarmService;
