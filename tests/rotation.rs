use {
    chrono::{DateTime, TimeDelta, TimeZone as _, Utc},
    rotatelog::{is_closed, Clock, RotateLog, RotateLogBuilder},
    std::{
        collections::HashSet,
        fs,
        io::Write,
        path::Path,
        sync::Arc,
        thread,
        time::{Duration, Instant},
    },
};

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Real elapsed time, replayed from a chosen starting instant.
struct ShiftedClock {
    base: DateTime<Utc>,
    start: Instant,
}

impl ShiftedClock {
    fn starting_at(base: DateTime<Utc>) -> Arc<Self> {
        Arc::new(ShiftedClock {
            base,
            start: Instant::now(),
        })
    }
}

impl Clock for ShiftedClock {
    fn now(&self) -> DateTime<Utc> {
        self.base + TimeDelta::from_std(self.start.elapsed()).unwrap()
    }
}

/// Like [`ShiftedClock`], but leaps forward by `jump` once `after` has
/// elapsed, as a machine waking from suspension would see it.
struct JumpingClock {
    base: DateTime<Utc>,
    jump: TimeDelta,
    after: Duration,
    start: Instant,
}

impl Clock for JumpingClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = self.start.elapsed();
        let now = self.base + TimeDelta::from_std(elapsed).unwrap();
        if elapsed >= self.after {
            now + self.jump
        } else {
            now
        }
    }
}

fn just_before_midnight(millis: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap() - TimeDelta::milliseconds(millis)
}

fn template(dir: &Path) -> String {
    format!("{}/app_%d_%d_%d.log", dir.display())
}

fn wait_for(log: &RotateLog, what: &str, done: impl Fn(&RotateLog) -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !done(log) {
        assert!(Instant::now() < deadline, "timed out waiting for {what}: {:?}", log.stats());
        thread::sleep(Duration::from_millis(10));
    }
}

fn wait_for_rotations(log: &RotateLog, count: u64) {
    wait_for(log, "rotation", |log| log.stats().rotations >= count);
}

#[test]
fn scheduled_rotation_crosses_midnight() {
    let dir = tempfile::tempdir().unwrap();
    let link = dir.path().join("app.log");
    let log = RotateLogBuilder::new(template(dir.path()))
        .period(DAY)
        .link(&link)
        .clock(ShiftedClock::starting_at(just_before_midnight(300)))
        .build()
        .unwrap();

    let day1 = dir.path().join("app_2024_1_1.log");
    let day2 = dir.path().join("app_2024_1_2.log");
    assert_eq!(log.current_path(), Some(day1.clone()));
    writeln!(&log, "before midnight").unwrap();
    assert_eq!(fs::read_to_string(&link).unwrap(), "before midnight\n");

    wait_for_rotations(&log, 2);
    writeln!(&log, "after midnight").unwrap();

    assert_eq!(log.current_path(), Some(day2.clone()));
    assert_eq!(fs::read_to_string(&day1).unwrap(), "before midnight\n");
    assert_eq!(fs::read_to_string(&day2).unwrap(), "after midnight\n");
    assert_eq!(fs::read_to_string(&link).unwrap(), "after midnight\n");
    assert_eq!(log.stats().failed_rotations, 0);
    assert_eq!(log.stats().failed_links, 0);

    log.close().unwrap();
}

#[test]
fn suspension_across_several_boundaries_rotates_once() {
    let dir = tempfile::tempdir().unwrap();
    // the first boundary is 500ms away, but the clock leaps three and a half
    // days before the scheduler wakes for it
    let log = RotateLogBuilder::new(template(dir.path()))
        .period(DAY)
        .clock(Arc::new(JumpingClock {
            base: just_before_midnight(500),
            jump: TimeDelta::hours(84),
            after: Duration::from_millis(50),
            start: Instant::now(),
        }))
        .build()
        .unwrap();
    assert_eq!(log.current_path(), Some(dir.path().join("app_2024_1_1.log")));

    wait_for_rotations(&log, 2);
    // the next boundary is half a day away, nothing else may happen
    thread::sleep(Duration::from_millis(300));

    assert_eq!(log.stats().rotations, 2);
    assert_eq!(log.stats().failed_rotations, 0);
    assert_eq!(log.current_path(), Some(dir.path().join("app_2024_1_5.log")));
    for skipped in ["app_2024_1_2.log", "app_2024_1_3.log", "app_2024_1_4.log"] {
        assert!(!dir.path().join(skipped).exists(), "{skipped}");
    }
}

#[test]
fn scheduler_keeps_running_after_failed_rotation() {
    let dir = tempfile::tempdir().unwrap();
    let day1 = dir.path().join("app_2024_1_1.log");
    let day2 = dir.path().join("app_2024_1_2.log");
    // tomorrow's file cannot be opened while a directory sits at its path
    fs::create_dir(&day2).unwrap();

    let log = RotateLogBuilder::new(template(dir.path()))
        .period(Duration::from_millis(100))
        .clock(ShiftedClock::starting_at(just_before_midnight(150)))
        .build()
        .unwrap();
    assert_eq!(log.current_path(), Some(day1.clone()));

    wait_for(&log, "a failed rotation", |log| log.stats().failed_rotations >= 1);
    writeln!(&log, "kept on day one").unwrap();
    assert_eq!(log.current_path(), Some(day1.clone()));

    fs::remove_dir(&day2).unwrap();
    wait_for(&log, "recovery", |log| log.current_path().as_deref() == Some(day2.as_path()));
    writeln!(&log, "day two").unwrap();

    assert_eq!(fs::read_to_string(&day1).unwrap(), "kept on day one\n");
    assert_eq!(fs::read_to_string(&day2).unwrap(), "day two\n");
    log.close().unwrap();
}

#[test]
fn zero_period_never_rotates() {
    let dir = tempfile::tempdir().unwrap();
    let log = RotateLogBuilder::new(template(dir.path()))
        .period(Duration::ZERO)
        .clock(ShiftedClock::starting_at(just_before_midnight(50)))
        .build()
        .unwrap();

    thread::sleep(Duration::from_millis(300));
    writeln!(&log, "still day one").unwrap();

    assert_eq!(log.stats().rotations, 1);
    let day1 = dir.path().join("app_2024_1_1.log");
    assert_eq!(log.current_path(), Some(day1.clone()));
    assert_eq!(fs::read_to_string(&day1).unwrap(), "still day one\n");
    assert!(!dir.path().join("app_2024_1_2.log").exists());
}

#[test]
fn concurrent_writes_are_never_interleaved() {
    const THREADS: usize = 8;
    const LINES: usize = 250;

    let dir = tempfile::tempdir().unwrap();
    // a short period keeps the scheduler swapping handles under the writers
    let log = Arc::new(
        RotateLogBuilder::new(template(dir.path()))
            .period(Duration::from_millis(5))
            .link(dir.path().join("app.log"))
            .build()
            .unwrap(),
    );

    let writers: Vec<_> = (0..THREADS)
        .map(|t| {
            let log = Arc::clone(&log);
            thread::spawn(move || {
                for i in 0..LINES {
                    let line = format!("thread-{t:02} line-{i:04} {}\n", "x".repeat(64));
                    (&*log).write_all(line.as_bytes()).unwrap();
                    if i % 25 == 0 {
                        thread::sleep(Duration::from_millis(1));
                    }
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }
    wait_for_rotations(&log, 2);
    log.close().unwrap();

    let mut seen = HashSet::new();
    for entry in fs::read_dir(dir.path()).unwrap() {
        let path = entry.unwrap().path();
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        if !name.starts_with("app_") {
            continue;
        }
        for line in fs::read_to_string(&path).unwrap().lines() {
            let mut parts = line.split(' ');
            let (thread, index, payload) = (parts.next(), parts.next(), parts.next());
            assert!(thread.is_some_and(|t| t.starts_with("thread-")), "{line}");
            assert!(index.is_some_and(|i| i.starts_with("line-")), "{line}");
            assert_eq!(payload.map(str::len), Some(64), "{line}");
            assert!(seen.insert(line.to_string()), "duplicated: {line}");
        }
    }
    assert_eq!(seen.len(), THREADS * LINES);
}

#[test]
fn writes_after_close_fail_without_io() {
    let dir = tempfile::tempdir().unwrap();
    let log = RotateLogBuilder::new(template(dir.path())).build().unwrap();
    let path = log.current_path().unwrap();
    writeln!(&log, "kept").unwrap();
    log.close().unwrap();

    assert!(log.is_closed());
    assert_eq!(log.current_path(), None);
    let err = (&log).write(b"dropped\n").unwrap_err();
    assert!(is_closed(&err), "{err}");
    let err = (&log).flush().unwrap_err();
    assert!(is_closed(&err), "{err}");
    assert_eq!(fs::read_to_string(path).unwrap(), "kept\n");
}

#[test]
fn close_interrupts_the_scheduler_wait() {
    let dir = tempfile::tempdir().unwrap();
    // the next boundary is a full day away
    let log = RotateLogBuilder::new(template(dir.path())).period(DAY).build().unwrap();

    let started = Instant::now();
    log.close().unwrap();
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn repeated_and_concurrent_close_never_blocks() {
    let dir = tempfile::tempdir().unwrap();
    let log = Arc::new(RotateLogBuilder::new(template(dir.path())).period(DAY).build().unwrap());

    let closers: Vec<_> = (0..4)
        .map(|_| {
            let log = Arc::clone(&log);
            thread::spawn(move || log.close())
        })
        .collect();
    for closer in closers {
        closer.join().unwrap().unwrap();
    }
    log.close().unwrap();
    log.close().unwrap();
    assert!(log.is_closed());
}

#[test]
fn tracing_appender_writes_through() {
    let dir = tempfile::tempdir().unwrap();
    let log = RotateLogBuilder::new(template(dir.path()))
        .period(Duration::ZERO)
        .build()
        .unwrap();
    let path = log.current_path().unwrap();

    let (non_blocking, guard) = tracing_appender::non_blocking(log);
    let subscriber = tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_ansi(false)
        .finish();
    tracing::subscriber::with_default(subscriber, || {
        tracing::info!("through the appender");
    });
    drop(guard);

    let content = fs::read_to_string(path).unwrap();
    assert!(content.contains("through the appender"), "{content}");
}
