//! Writer-death poisoning across threads.

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use triptych_object::{ObjectConfig, SharedObject, WaitOptions};
use triptych_primitives::BusThreadId;

fn local_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap()
}

#[test]
fn queued_writer_fails_fast_and_readers_keep_the_last_publish() {
    let object = SharedObject::create("death", ObjectConfig { byte_length: 4 }).unwrap();
    object.set_wait_options(WaitOptions {
        poll_interval: Duration::from_millis(1),
    });

    // Seed one good publish.
    local_runtime().block_on(async {
        object
            .request_write(|w| {
                w.bytes_mut().copy_from_slice(&77i32.to_le_bytes());
                Ok::<_, std::io::Error>(())
            })
            .await
            .unwrap();
    });

    // Writer A acquires the lock and then "dies" mid-callback: it reports its
    // owner id and parks forever without releasing.
    let (owner_tx, owner_rx) = mpsc::channel::<i32>();
    let _zombie = {
        let descriptor = object.descriptor();
        thread::spawn(move || {
            let object = SharedObject::from_descriptor(descriptor);
            local_runtime().block_on(async move {
                let _guard = object.begin_write().await.unwrap();
                owner_tx.send(object.owner().get()).unwrap();
                // Simulated crash: never publishes, never returns.
                std::future::pending::<()>().await;
            })
        })
    };
    let owner = BusThreadId::from_raw(owner_rx.recv().unwrap()).unwrap();

    // Writer B queues behind the zombie.
    let queued = {
        let descriptor = object.descriptor();
        thread::spawn(move || {
            let object = SharedObject::from_descriptor(descriptor);
            local_runtime().block_on(async move {
                object
                    .request_write(|w| {
                        w.bytes_mut().copy_from_slice(&88i32.to_le_bytes());
                        Ok::<_, std::io::Error>(())
                    })
                    .await
            })
        })
    };
    thread::sleep(Duration::from_millis(50));

    // The runtime notices the owner thread died.
    object.mark_writer_thread_died(owner);

    let err = queued.join().unwrap().unwrap_err();
    assert!(err.is_poisoned());

    // Poisoning is sticky.
    for _ in 0..3 {
        let err = local_runtime()
            .block_on(object.begin_write())
            .unwrap_err();
        assert!(err.is_poisoned());
    }

    // Readers still see the publish from before the death.
    let snapshot = object.read_latest().unwrap();
    assert_eq!(snapshot.seq(), 1);
    assert_eq!(snapshot.bytes(), 77i32.to_le_bytes());
}

#[test]
fn marking_death_twice_is_idempotent() {
    let object = SharedObject::create("death-twice", ObjectConfig { byte_length: 4 }).unwrap();

    let (owner_tx, owner_rx) = mpsc::channel::<i32>();
    let _zombie = {
        let descriptor = object.descriptor();
        thread::spawn(move || {
            let object = SharedObject::from_descriptor(descriptor);
            local_runtime().block_on(async move {
                let _guard = object.begin_write().await.unwrap();
                owner_tx.send(object.owner().get()).unwrap();
                std::future::pending::<()>().await;
            })
        })
    };
    let owner = BusThreadId::from_raw(owner_rx.recv().unwrap()).unwrap();

    object.mark_writer_thread_died(owner);
    assert!(object.is_poisoned());
    // Second report: owner is already cleared, the flag stays set.
    object.mark_writer_thread_died(owner);
    assert!(object.is_poisoned());
    assert!(object.owner().is_none());
    assert_eq!(object.control().depth(), 0);
}
