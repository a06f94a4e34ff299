use ping_service::schedule::{ScheduleAssignment, WindowScheduler};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::{sleep, Instant};

fn scheduler(machine_id: u32, total_machines: u32) -> WindowScheduler {
    WindowScheduler::new(ScheduleAssignment::new(machine_id, total_machines).unwrap())
}

#[tokio::test(start_paused = true)]
async fn second_of_two_machines_fires_half_a_second_in() {
    let origin = Instant::now();
    let fired_at = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&fired_at);

    let handle = scheduler(2, 2).start(move || {
        let sink = Arc::clone(&sink);
        async move {
            sink.lock().unwrap().push(origin.elapsed().as_millis() as u64);
        }
    });

    sleep(Duration::from_millis(2_600)).await;
    handle.shutdown().await;

    assert_eq!(*fired_at.lock().unwrap(), vec![500, 1_500, 2_500]);
}

#[tokio::test(start_paused = true)]
async fn stop_is_idempotent_and_halts_ticks() {
    let handle = scheduler(1, 1).start(|| async {});

    sleep(Duration::from_millis(1_500)).await;
    assert_eq!(handle.ticks(), 2);

    handle.stop();
    handle.stop();
    assert!(handle.is_stopped());

    sleep(Duration::from_secs(3)).await;
    assert_eq!(handle.ticks(), 2);
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn dropping_the_handle_stops_the_loop() {
    let count = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&count);

    let handle = scheduler(1, 1).start(move || {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    });

    sleep(Duration::from_millis(10)).await;
    assert_eq!(count.load(Ordering::SeqCst), 1);

    drop(handle);
    sleep(Duration::from_secs(3)).await;
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn shutdown_waits_for_the_running_tick() {
    let finished = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&finished);

    let handle = scheduler(1, 1).start(move || {
        let flag = Arc::clone(&flag);
        async move {
            sleep(Duration::from_millis(300)).await;
            flag.store(true, Ordering::SeqCst);
        }
    });

    sleep(Duration::from_millis(100)).await;
    handle.shutdown().await;

    assert!(finished.load(Ordering::SeqCst));
}

#[test]
fn offsets_are_distinct_and_inside_the_second() {
    for total in 1..=20 {
        let offsets: Vec<u64> = (1..=total)
            .map(|id| ScheduleAssignment::new(id, total).unwrap().start_offset_ms())
            .collect();

        assert_eq!(offsets[0], 0);
        assert!(offsets.windows(2).all(|w| w[0] < w[1]), "total={total}");
        assert!(offsets.iter().all(|&o| o < 1_000), "total={total}");
    }
}
