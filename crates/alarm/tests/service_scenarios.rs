//! End-to-end engine scenarios against the mock RTC and audio output.
//!
//! Time is driven by hand: a test moves the mock clock, lets the register
//! match (`MockRtc::tick`), raises the interrupt through the service's
//! handle and drains the command queue with `process_pending`.

use alarm::config::MAX_ALARMS;
use alarm::{
    Alarm, AlarmId, AlarmService, AlarmTime, AudioLooper, DaysOfWeek, ServiceConfig, ServiceError,
};
use chrono::{NaiveDate, NaiveDateTime, Weekday};
use embassy_futures::select::select;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use embassy_time::{Duration, Timer};
use platform::mocks::{MockAudioOutput, MockRtc};
use platform::{AlarmMatch, AlarmTrigger, AudioOutput};

type Raw = CriticalSectionRawMutex;

/// 2024-01-01 is a Monday.
fn monday(h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(h, m, 0)
        .unwrap()
}

fn tuesday(h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 2)
        .unwrap()
        .and_hms_opt(h, m, 0)
        .unwrap()
}

fn at(h: u8, m: u8) -> AlarmTime {
    AlarmTime::try_new(h, m).unwrap()
}

fn alarm(id: u64, time: AlarmTime, days: DaysOfWeek) -> Alarm {
    Alarm::new(AlarmId::from_raw(id), time, days, true)
}

fn config() -> ServiceConfig {
    ServiceConfig::default().with_poll_interval(Duration::from_millis(1))
}

/// Move the clock to `now` and deliver the RTC interrupt if the register
/// matches. Returns whether it fired.
async fn fire_at(
    rtc: &Mutex<Raw, MockRtc>,
    service: &AlarmService<'_, Raw, MockRtc>,
    now: NaiveDateTime,
) -> bool {
    let fired = {
        let mut rtc = rtc.lock().await;
        rtc.set_now(now);
        rtc.tick()
    };
    if fired {
        assert!(service.interrupts().alarm_fired());
        service.process_pending().await;
    }
    fired
}

#[tokio::test]
async fn daily_alarm_fires_and_moves_to_next_day() {
    let rtc = Mutex::<Raw, _>::new(MockRtc::new(monday(7, 0)));
    let looper = AudioLooper::<Raw>::new(&config());
    let service = AlarmService::new(&rtc, &looper, config());
    service.begin().await.unwrap();

    let id = service
        .add_alarm(alarm(1, at(8, 0), DaysOfWeek::EVERY_DAY))
        .await
        .unwrap();
    assert_eq!(
        rtc.lock().await.programmed(),
        Some((AlarmTrigger::daily(8, 0), AlarmMatch::HourMinute))
    );

    assert!(fire_at(&rtc, &service, monday(8, 0)).await);

    assert_eq!(service.running_alarm().await, Some(id));
    assert!(!rtc.lock().await.fired_flag(), "fired flag must be cleared");
    let schedule = service.schedule().await;
    assert_eq!(schedule.len(), 1);
    assert_eq!(schedule.first().unwrap().next_firing(&monday(8, 0)), tuesday(8, 0));
    assert!(service.alarm(id).await.unwrap().enabled);
}

#[tokio::test]
async fn same_minute_collision_rings_one_and_misses_other() {
    let rtc = Mutex::<Raw, _>::new(MockRtc::new(monday(7, 0)));
    let looper = AudioLooper::<Raw>::new(&config());
    let service = AlarmService::new(&rtc, &looper, config());

    let daily = service
        .add_alarm(alarm(1, at(8, 0), DaysOfWeek::EVERY_DAY))
        .await
        .unwrap();
    let once = service
        .add_alarm(alarm(2, at(8, 0), DaysOfWeek::NONE))
        .await
        .unwrap();
    service.clear_missed_flag(daily).await.unwrap();
    service.clear_missed_flag(once).await.unwrap();

    assert!(fire_at(&rtc, &service, monday(8, 0)).await);

    // Later insertion at an equal time goes first
    assert_eq!(service.running_alarm().await, Some(once));
    let once_after = service.alarm(once).await.unwrap();
    assert!(!once_after.enabled, "one-shot disables itself after firing");

    let daily_after = service.alarm(daily).await.unwrap();
    assert!(daily_after.missed);
    assert!(daily_after.enabled);
    let next: Vec<_> = service
        .schedule()
        .await
        .iter()
        .filter(|e| e.parent() == daily)
        .map(|e| e.next_firing(&monday(8, 0)))
        .collect();
    assert_eq!(next, vec![tuesday(8, 0)]);
    assert_eq!(
        rtc.lock().await.programmed(),
        Some((AlarmTrigger::daily(8, 0), AlarmMatch::HourMinute))
    );
}

#[tokio::test]
async fn colliding_one_shot_is_missed_and_disabled() {
    let rtc = Mutex::<Raw, _>::new(MockRtc::new(monday(7, 0)));
    let looper = AudioLooper::<Raw>::new(&config());
    let service = AlarmService::new(&rtc, &looper, config());

    let once = service
        .add_alarm(alarm(2, at(8, 0), DaysOfWeek::NONE))
        .await
        .unwrap();
    let daily = service
        .add_alarm(alarm(1, at(8, 0), DaysOfWeek::EVERY_DAY))
        .await
        .unwrap();
    service.clear_missed_flag(once).await.unwrap();
    service.clear_missed_flag(daily).await.unwrap();

    assert!(fire_at(&rtc, &service, monday(8, 0)).await);

    assert_eq!(service.running_alarm().await, Some(daily));
    let once_after = service.alarm(once).await.unwrap();
    assert!(once_after.missed);
    assert!(!once_after.enabled);
    assert!(!service.alarm(daily).await.unwrap().missed);
}

#[tokio::test]
async fn operations_on_removed_alarm_report_not_found() {
    let rtc = Mutex::<Raw, _>::new(MockRtc::new(monday(7, 0)));
    let looper = AudioLooper::<Raw>::new(&config());
    let service = AlarmService::new(&rtc, &looper, config());

    let id = service
        .add_alarm(alarm(7, at(9, 30), DaysOfWeek::WEEKDAYS))
        .await
        .unwrap();
    service.remove_alarm(id).await.unwrap();

    assert_eq!(
        service.set_alarm_state(id, true).await,
        Err(ServiceError::NotFound(id))
    );
    assert_eq!(
        service.set_alarm_time(id, at(6, 0)).await,
        Err(ServiceError::NotFound(id))
    );
    assert_eq!(
        service.set_alarm_days_of_week(id, DaysOfWeek::EVERY_DAY).await,
        Err(ServiceError::NotFound(id))
    );
    assert_eq!(service.clear_missed_flag(id).await, Err(ServiceError::NotFound(id)));
    assert_eq!(service.remove_alarm(id).await, Err(ServiceError::NotFound(id)));
    assert!(service.schedule().await.is_empty());
    assert_eq!(rtc.lock().await.programmed(), None);
}

#[tokio::test]
async fn unattended_alarm_times_out_as_missed() {
    let config = config().with_playback_timeout_secs(1);
    let rtc = Mutex::<Raw, _>::new(MockRtc::new(monday(7, 0)));
    let looper = AudioLooper::<Raw>::new(&config);
    let service = AlarmService::new(&rtc, &looper, config);
    let mut output = MockAudioOutput::with_track_length(100);

    let id = service
        .add_alarm(alarm(1, at(8, 0), DaysOfWeek::EVERY_DAY))
        .await
        .unwrap();
    service.clear_missed_flag(id).await.unwrap();
    assert!(fire_at(&rtc, &service, monday(8, 0)).await);
    assert!(service.is_alarm_running().await);

    select(looper.run(&mut output, &service), Timer::after_millis(1500)).await;

    assert!(!output.is_running());
    assert_eq!(output.stop_count(), 1);
    assert!(output.connect_count() >= 1);
    assert_eq!(service.running_alarm().await, None);
    assert!(service.alarm(id).await.unwrap().missed);
}

#[tokio::test]
async fn stop_button_silences_without_acknowledging() {
    let rtc = Mutex::<Raw, _>::new(MockRtc::new(monday(7, 0)));
    let looper = AudioLooper::<Raw>::new(&config());
    let service = AlarmService::new(&rtc, &looper, config());
    let mut output = MockAudioOutput::with_track_length(100);

    let id = service
        .add_alarm(alarm(1, at(8, 0), DaysOfWeek::EVERY_DAY))
        .await
        .unwrap();
    assert!(fire_at(&rtc, &service, monday(8, 0)).await);

    let press = async {
        Timer::after_millis(30).await;
        assert!(service.interrupts().stop_pressed());
        service.process_pending().await;
        Timer::after_millis(30).await;
    };
    select(looper.run(&mut output, &service), press).await;

    assert_eq!(output.stop_count(), 1);
    assert!(!output.is_running());
    assert_eq!(service.running_alarm().await, None);
    assert!(service.alarm(id).await.unwrap().missed, "stop leaves missed alone");
    service.clear_missed_flag(id).await.unwrap();
    assert!(!service.alarm(id).await.unwrap().missed);
}

#[tokio::test]
async fn stop_without_ringing_alarm_is_ignored() {
    let rtc = Mutex::<Raw, _>::new(MockRtc::new(monday(7, 0)));
    let looper = AudioLooper::<Raw>::new(&config());
    let service = AlarmService::new(&rtc, &looper, config());

    let id = service
        .add_alarm(alarm(1, at(8, 0), DaysOfWeek::EVERY_DAY))
        .await
        .unwrap();
    assert!(service.interrupts().stop_pressed());
    assert_eq!(service.process_pending().await, 1);
    assert!(service.alarm(id).await.unwrap().missed, "missed untouched");
}

#[tokio::test]
async fn alarm_during_ringing_is_skipped_but_rescheduled() {
    let rtc = Mutex::<Raw, _>::new(MockRtc::new(monday(7, 0)));
    let looper = AudioLooper::<Raw>::new(&config());
    let service = AlarmService::new(&rtc, &looper, config());

    let first = service
        .add_alarm(alarm(1, at(8, 0), DaysOfWeek::EVERY_DAY))
        .await
        .unwrap();
    let second = service
        .add_alarm(alarm(2, at(8, 5), DaysOfWeek::EVERY_DAY))
        .await
        .unwrap();
    service.clear_missed_flag(second).await.unwrap();

    assert!(fire_at(&rtc, &service, monday(8, 0)).await);
    assert_eq!(
        rtc.lock().await.programmed(),
        Some((AlarmTrigger::daily(8, 5), AlarmMatch::HourMinute))
    );
    assert!(fire_at(&rtc, &service, monday(8, 5)).await);

    assert_eq!(service.running_alarm().await, Some(first));
    assert!(!service.alarm(second).await.unwrap().missed);
    let order: Vec<_> = service.schedule().await.iter().map(|e| e.parent()).collect();
    assert_eq!(order, vec![first, second]);
    assert_eq!(
        rtc.lock().await.programmed(),
        Some((AlarmTrigger::daily(8, 0), AlarmMatch::HourMinute))
    );
}

#[tokio::test]
async fn fire_without_enabled_alarm_is_harmless() {
    let rtc = Mutex::<Raw, _>::new(MockRtc::new(monday(7, 0)));
    let looper = AudioLooper::<Raw>::new(&config());
    let service = AlarmService::new(&rtc, &looper, config());

    let id = service
        .add_alarm(Alarm::new(AlarmId::from_raw(3), at(8, 0), DaysOfWeek::EVERY_DAY, false))
        .await
        .unwrap();
    assert_eq!(rtc.lock().await.programmed(), None);

    assert!(service.interrupts().alarm_fired());
    assert_eq!(service.process_pending().await, 1);
    assert_eq!(service.running_alarm().await, None);
    assert_eq!(service.schedule().await.len(), 1);
    assert!(service.alarm(id).await.is_some());
}

#[tokio::test]
async fn weekly_alarm_programs_day_match() {
    let rtc = Mutex::<Raw, _>::new(MockRtc::new(monday(9, 0)));
    let looper = AudioLooper::<Raw>::new(&config());
    let service = AlarmService::new(&rtc, &looper, config());

    let mut days = DaysOfWeek::NONE;
    days.set(Weekday::Mon, true);
    days.set(Weekday::Wed, true);
    let id = service.add_alarm(alarm(1, at(8, 0), days)).await.unwrap();

    let schedule = service.schedule().await;
    assert_eq!(schedule.len(), 2);
    assert_eq!(schedule.first().unwrap().weekday(), Some(Weekday::Wed));
    assert_eq!(
        rtc.lock().await.programmed(),
        Some((AlarmTrigger::weekly(Weekday::Wed, 8, 0), AlarmMatch::DayHourMinute))
    );

    // Monday 10:00 is still ahead today
    service.set_alarm_time(id, at(10, 0)).await.unwrap();
    let first = *service.schedule().await.first().unwrap();
    assert_eq!(first.weekday(), Some(Weekday::Mon));
    assert_eq!(first.time(), at(10, 0));
}

#[tokio::test]
async fn entry_count_follows_days() {
    let rtc = Mutex::<Raw, _>::new(MockRtc::new(monday(7, 0)));
    let looper = AudioLooper::<Raw>::new(&config());
    let service = AlarmService::new(&rtc, &looper, config());

    for mask in 0u8..=0x7F {
        let days = DaysOfWeek::try_from_mask(mask).unwrap();
        let id = service.add_alarm(alarm(1, at(6, 15), days)).await.unwrap();
        let expected = if mask == 0 || mask == 0x7F {
            1
        } else {
            mask.count_ones() as usize
        };
        assert_eq!(service.schedule().await.len(), expected, "mask {mask:#04x}");
        assert_eq!(service.alarm(id).await.unwrap().days.mask(), mask);
        service.remove_alarm(id).await.unwrap();
    }
}

#[tokio::test]
async fn set_days_regenerates_entries() {
    let rtc = Mutex::<Raw, _>::new(MockRtc::new(monday(7, 0)));
    let looper = AudioLooper::<Raw>::new(&config());
    let service = AlarmService::new(&rtc, &looper, config());

    let id = service
        .add_alarm(alarm(1, at(6, 0), DaysOfWeek::EVERY_DAY))
        .await
        .unwrap();
    service
        .set_alarm_days_of_week(id, DaysOfWeek::WEEKDAYS)
        .await
        .unwrap();
    assert_eq!(service.schedule().await.len(), 5);
    service
        .set_alarm_days_of_week(id, DaysOfWeek::NONE)
        .await
        .unwrap();
    let schedule = service.schedule().await;
    assert_eq!(schedule.len(), 1);
    assert_eq!(schedule.first().unwrap().weekday(), None);
}

#[tokio::test]
async fn adding_same_id_replaces_alarm() {
    let rtc = Mutex::<Raw, _>::new(MockRtc::new(monday(7, 0)));
    let looper = AudioLooper::<Raw>::new(&config());
    let service = AlarmService::new(&rtc, &looper, config());

    service
        .add_alarm(alarm(1, at(6, 0), DaysOfWeek::WEEKDAYS))
        .await
        .unwrap();
    service
        .add_alarm(alarm(1, at(9, 0), DaysOfWeek::EVERY_DAY))
        .await
        .unwrap();

    assert_eq!(service.alarms().await.len(), 1);
    let schedule = service.schedule().await;
    assert_eq!(schedule.len(), 1);
    assert_eq!(schedule.first().unwrap().time(), at(9, 0));
}

#[tokio::test]
async fn full_table_rejects_new_alarm() {
    let rtc = Mutex::<Raw, _>::new(MockRtc::new(monday(7, 0)));
    let looper = AudioLooper::<Raw>::new(&config());
    let service = AlarmService::new(&rtc, &looper, config());

    for id in 0..MAX_ALARMS as u64 {
        service
            .add_alarm(alarm(id, at(5, 0), DaysOfWeek::EVERY_DAY))
            .await
            .unwrap();
    }
    let overflow = alarm(1000, at(5, 0), DaysOfWeek::EVERY_DAY);
    assert_eq!(
        service.add_alarm(overflow).await,
        Err(ServiceError::CapacityExceeded)
    );
    assert!(service.alarm(overflow.id()).await.is_none());
    assert_eq!(service.schedule().await.len(), MAX_ALARMS);
}

#[tokio::test]
async fn clock_failure_leaves_state_untouched() {
    let rtc = Mutex::<Raw, _>::new(MockRtc::new(monday(7, 0)));
    let looper = AudioLooper::<Raw>::new(&config());
    let service = AlarmService::new(&rtc, &looper, config());

    let id = service
        .add_alarm(alarm(1, at(6, 0), DaysOfWeek::EVERY_DAY))
        .await
        .unwrap();

    rtc.lock().await.fail_next();
    let new = alarm(2, at(6, 30), DaysOfWeek::EVERY_DAY);
    assert_eq!(service.add_alarm(new).await, Err(ServiceError::Clock));
    assert!(service.alarm(new.id()).await.is_none());

    rtc.lock().await.fail_next();
    assert_eq!(
        service.set_alarm_time(id, at(7, 30)).await,
        Err(ServiceError::Clock)
    );
    assert_eq!(service.alarm(id).await.unwrap().time, at(6, 0));
    assert_eq!(service.schedule().await.len(), 1);
}

#[tokio::test]
async fn set_volume_reaches_looper() {
    let rtc = Mutex::<Raw, _>::new(MockRtc::new(monday(7, 0)));
    let looper = AudioLooper::<Raw>::new(&config());
    let service = AlarmService::new(&rtc, &looper, config());

    service.set_volume(platform::VolumePercent::new(100));
    assert_eq!(looper.volume(), platform::VolumePercent::DEVICE_MAX_STEPS);
    service.set_volume(platform::VolumePercent::new(0));
    assert_eq!(looper.volume(), 0);
}
