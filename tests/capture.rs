mod support;

use std::sync::Arc;
use std::time::Duration;

use support::{Config, FakeDriver, KERNEL_4_14};
use v4l2_mmap::buffer::{State, Type};
use v4l2_mmap::device::{Readiness, Waker};
use v4l2_mmap::format::FourCC;
use v4l2_mmap::io::{Pool, StreamState};
use v4l2_mmap::v4l2::layout::HeaderVersion;
use v4l2_mmap::v4l2::vidioc::Request;
use v4l2_mmap::{capability, Error, Options, Session, Stream};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn capture_one_frame() {
    init();
    let (mut session, fake) = FakeDriver::session(Config::capture());
    session.require(capability::Flags::VIDEO_CAPTURE).unwrap();

    let fmt = session
        .negotiate(Type::VideoCapture, 800, 600, "YUYV")
        .unwrap();
    assert_eq!(fmt.width(), 800);
    assert_eq!(fmt.height(), 600);
    assert_eq!(fmt.fourcc(), FourCC::new(b"YUYV"));
    assert_eq!(fmt.plane_sizes(), vec![800 * 2 * 600]);

    let mut pool = session.allocate_and_map(Type::VideoCapture, 4).unwrap();
    assert_eq!(pool.len(), 4);
    assert_eq!(pool.region_count(), 4);
    assert_eq!(fake.mapped(), 4);

    session.start(&mut pool).unwrap();
    assert_eq!(pool.state(), StreamState::Streaming);
    assert_eq!(pool.in_flight(), 4);

    let done = pool.dequeue().unwrap();
    let length = pool.descriptor(done.index).unwrap().planes[0].length;
    assert!(done.bytes_used[0] <= length);
    let data = pool.data(done.index, 0).unwrap();
    assert!(!data.is_empty());
    assert_eq!(data.len(), done.bytes_used[0] as usize);

    pool.enqueue(done.index).unwrap();
    session.stop(&mut pool).unwrap();
    assert!(!fake.is_streaming(Type::VideoCapture));
    pool.unmap_all().unwrap();
    assert_eq!(fake.mapped(), 0);

    drop(pool);
    assert_eq!(fake.buffers(Type::VideoCapture), 0);
    session.close().unwrap();
}

#[test]
fn unknown_format_leaves_device_untouched() {
    let (mut session, fake) = FakeDriver::session(Config::capture());
    let before = fake.requests();

    match session.negotiate(Type::VideoCapture, 800, 600, "ZZZZ") {
        Err(Error::UnknownFormat(name)) => assert_eq!(name, "ZZZZ"),
        other => panic!("expected UnknownFormat, got {:?}", other.map(|f| f.fourcc())),
    }
    assert_eq!(fake.requests(), before);
}

#[test]
fn driver_may_grant_fewer_buffers() {
    let (mut session, fake) = FakeDriver::session(Config {
        max_buffers: 2,
        ..Config::capture()
    });
    session
        .negotiate(Type::VideoCapture, 640, 480, "YUYV")
        .unwrap();

    let pool = session.allocate_and_map(Type::VideoCapture, 4).unwrap();
    assert_eq!(pool.len(), 2);
    assert!(pool.descriptor(2).is_none());
    assert_eq!(fake.count(Request::VIDIOC_QUERYBUF), 2);

    let log = fake.map_log();
    assert_eq!(log.len(), 2);
    for (offset, _) in log {
        assert!((offset >> 16) & 0xff < 2);
    }
}

#[test]
fn zero_buffers_is_out_of_resources() {
    let (mut session, fake) = FakeDriver::session(Config {
        max_buffers: 0,
        ..Config::capture()
    });

    assert!(matches!(
        session.allocate_and_map(Type::VideoCapture, 0),
        Err(Error::OutOfResources { requested: 0 })
    ));
    assert_eq!(fake.count(Request::VIDIOC_REQBUFS), 0);

    assert!(matches!(
        session.allocate_and_map(Type::VideoCapture, 4),
        Err(Error::OutOfResources { requested: 4 })
    ));
    // the claim is released again
    let fmt = session.format(Type::VideoCapture).unwrap();
    session.set_format(Type::VideoCapture, &fmt).unwrap();
}

#[test]
fn dequeue_with_nothing_queued_never_returns_a_buffer() {
    let (mut session, fake) = FakeDriver::session(Config::capture());
    let mut pool = session.allocate_and_map(Type::VideoCapture, 2).unwrap();
    pool.set_timeout(Some(Duration::from_millis(10)));

    let err = pool.dequeue().unwrap_err();
    assert!(matches!(err, Error::Timeout));
    assert!(err.is_retryable());
    assert_eq!(fake.count(Request::VIDIOC_DQBUF), 0);

    let (mut session, fake) = FakeDriver::session(Config {
        nonblocking: true,
        ..Config::capture()
    });
    let mut pool = session.allocate_and_map(Type::VideoCapture, 2).unwrap();
    assert!(matches!(pool.dequeue(), Err(Error::WouldBlock)));
    assert_eq!(fake.count(Request::VIDIOC_DQBUF), 0);
}

#[test]
fn nonblocking_dequeue_reports_would_block_once_drained() {
    let (mut session, _fake) = FakeDriver::session(Config {
        nonblocking: true,
        ..Config::capture()
    });
    let mut pool = session.allocate_and_map(Type::VideoCapture, 2).unwrap();
    pool.enqueue(0).unwrap();
    pool.stream_on().unwrap();

    assert_eq!(pool.dequeue().unwrap().index, 0);
    assert!(matches!(pool.dequeue(), Err(Error::WouldBlock)));
}

#[test]
fn enqueue_twice_is_a_violation() {
    let (mut session, fake) = FakeDriver::session(Config::capture());
    let mut pool = session.allocate_and_map(Type::VideoCapture, 2).unwrap();

    pool.enqueue(0).unwrap();
    assert!(matches!(pool.enqueue(0), Err(Error::ProtocolViolation(_))));
    assert!(matches!(pool.enqueue(7), Err(Error::ProtocolViolation(_))));
    assert_eq!(fake.count(Request::VIDIOC_QBUF), 1);
    assert_eq!(pool.buffer_state(0), Some(State::Queued));
    assert_eq!(pool.buffer_state(1), Some(State::Queried));
}

#[test]
fn dequeue_returns_buffers_in_queue_order() {
    let (mut session, _fake) = FakeDriver::session(Config::capture());
    let mut pool = session.allocate_and_map(Type::VideoCapture, 3).unwrap();
    pool.enqueue(2).unwrap();
    pool.enqueue(0).unwrap();
    pool.stream_on().unwrap();

    let first = pool.dequeue().unwrap();
    let second = pool.dequeue().unwrap();
    assert_eq!((first.index, second.index), (2, 0));
    assert_eq!(second.meta.seq, first.meta.seq + 1);
    assert_eq!(pool.buffer_state(1), Some(State::Queried));
    assert!(pool.data(1, 0).is_none());
}

#[test]
fn stream_on_needs_queued_buffers() {
    let (mut session, fake) = FakeDriver::session(Config::capture());
    let mut pool = session.allocate_and_map(Type::VideoCapture, 2).unwrap();

    assert!(matches!(pool.stream_on(), Err(Error::ProtocolViolation(_))));
    assert_eq!(pool.state(), StreamState::Idle);
    assert_eq!(fake.count(Request::VIDIOC_STREAMON), 0);

    pool.enqueue(0).unwrap();
    pool.start().unwrap();
    assert!(matches!(pool.stream_on(), Err(Error::ProtocolViolation(_))));
}

#[test]
fn stream_off_twice_is_a_noop() {
    let (mut session, fake) = FakeDriver::session(Config::capture());
    let mut pool = session.allocate_and_map(Type::VideoCapture, 2).unwrap();

    pool.stream_off().unwrap();
    assert_eq!(fake.count(Request::VIDIOC_STREAMOFF), 0);

    session.start(&mut pool).unwrap();
    pool.stop().unwrap();
    pool.stop().unwrap();
    assert_eq!(fake.count(Request::VIDIOC_STREAMOFF), 1);
    assert_eq!(pool.in_flight(), 0);
    assert_eq!(pool.buffer_state(0), Some(State::Queried));
}

#[test]
fn remapping_maps_the_same_ranges() {
    let (mut session, fake) = FakeDriver::session(Config::capture());
    let mut pool = session.allocate_and_map(Type::VideoCapture, 3).unwrap();

    let ranges = |pool: &v4l2_mmap::Pool<FakeDriver>| {
        (0..pool.len() as u32)
            .map(|i| {
                let region = pool.region(i, 0).unwrap();
                (region.offset(), region.address(), region.len())
            })
            .collect::<Vec<_>>()
    };
    let first = ranges(&pool);

    pool.unmap_all().unwrap();
    assert!(matches!(pool.unmap_all(), Err(Error::ProtocolViolation(_))));
    assert_eq!(pool.region_count(), 0);
    pool.map_all().unwrap();
    assert!(matches!(pool.map_all(), Err(Error::ProtocolViolation(_))));

    assert_eq!(ranges(&pool), first);
    let log = fake.map_log();
    assert_eq!(log[..3], log[3..]);
}

#[test]
fn queued_buffers_expose_no_data() {
    let (mut session, fake) = FakeDriver::session(Config::capture());
    let mut pool = session.allocate_and_map(Type::VideoCapture, 2).unwrap();
    fake.set_fill(Some(16));
    session.start(&mut pool).unwrap();

    for i in 0..2u32 {
        assert_eq!(pool.buffer_state(i), Some(State::Queued));
        assert!(pool.data(i, 0).is_none());
        assert!(pool.data_mut(i, 0).is_none());
        let region = pool.region(i, 0).unwrap();
        assert!(region.len() > 16);
    }

    let done = pool.dequeue().unwrap();
    assert_eq!(pool.data(done.index, 0).unwrap().len(), 16);
    let other = 1 - done.index;
    assert!(pool.data(other, 0).is_none());
}

#[test]
fn unmapping_while_streaming_is_refused() {
    let (mut session, _fake) = FakeDriver::session(Config::capture());
    let mut pool = session.allocate_and_map(Type::VideoCapture, 2).unwrap();
    session.start(&mut pool).unwrap();

    assert!(matches!(pool.unmap_all(), Err(Error::ProtocolViolation(_))));
    assert!(pool.is_mapped());
}

#[test]
fn capture_keeps_the_ring_circulating() {
    init();
    let (mut session, fake) = FakeDriver::session(Config::capture());
    session
        .negotiate(Type::VideoCapture, 320, 240, "YUYV")
        .unwrap();
    let mut pool = session.allocate_and_map(Type::VideoCapture, 4).unwrap();

    for expected in 0..10u32 {
        let (frame, meta) = pool.capture().unwrap();
        assert_eq!(frame.len(), 320 * 2 * 240);
        assert_eq!(meta.seq, expected);
        assert_eq!(frame[0], expected as u8);
        assert_eq!(frame[1], (expected + 1) as u8);
        assert_eq!(pool.in_flight(), 3);
    }
    assert_eq!(fake.count(Request::VIDIOC_STREAMON), 1);
    assert_eq!(fake.count(Request::VIDIOC_DQBUF), 10);
}

#[test]
fn failed_requeue_keeps_the_buffer_in_the_ring() {
    init();
    let (mut session, fake) = FakeDriver::session(Config::capture());
    let mut pool = session.allocate_and_map(Type::VideoCapture, 2).unwrap();

    let (_, meta) = pool.capture().unwrap();
    assert_eq!(meta.seq, 0);

    fake.fail_qbufs(1);
    assert!(matches!(
        pool.capture(),
        Err(Error::IoctlFailed {
            request: Request::VIDIOC_QBUF,
            errno: libc::EIO,
        })
    ));
    assert_eq!(pool.buffer_state(0), Some(State::Dequeued));

    for _ in 0..2 {
        pool.capture().unwrap();
        let dequeued = (0..2u32)
            .filter(|&i| pool.buffer_state(i) == Some(State::Dequeued))
            .count();
        assert!(dequeued <= 1);
        assert_eq!(pool.in_flight(), 1);
    }
}

#[test]
fn failed_mapping_unmaps_what_was_mapped() {
    init();
    let (session, fake) = FakeDriver::session(Config {
        fail_map_after: Some(2),
        ..Config::capture()
    });
    let mut pool = Pool::allocate(
        Arc::clone(session.driver()),
        *session.layout(),
        Type::VideoCapture,
        1,
        4,
    )
    .unwrap();

    match pool.map_all() {
        Err(Error::MapFailed { index, plane, .. }) => {
            assert_eq!(index, 2);
            assert_eq!(plane, 0);
        }
        other => panic!("expected MapFailed, got {:?}", other),
    }
    assert_eq!(fake.mapped(), 0);
    assert_eq!(pool.region_count(), 0);
    assert!(!pool.is_mapped());
}

#[test]
fn capture_needs_mapped_buffers() {
    let (mut session, _fake) = FakeDriver::session(Config::capture());
    let mut pool = session.allocate_and_map(Type::VideoCapture, 2).unwrap();
    pool.unmap_all().unwrap();

    assert!(matches!(pool.capture(), Err(Error::ProtocolViolation(_))));
}

#[test]
fn oversized_bytes_used_is_clamped() {
    let (mut session, fake) = FakeDriver::session(Config::capture());
    session
        .negotiate(Type::VideoCapture, 64, 8, "YUYV")
        .unwrap();
    let mut pool = session.allocate_and_map(Type::VideoCapture, 2).unwrap();
    fake.set_fill(Some(1 << 20));

    session.start(&mut pool).unwrap();
    let done = pool.dequeue().unwrap();
    assert_eq!(done.bytes_used, vec![64 * 2 * 8]);
    assert_eq!(pool.data(done.index, 0).unwrap().len(), 64 * 2 * 8);
}

#[test]
fn short_frames_expose_only_the_valid_prefix() {
    let (mut session, fake) = FakeDriver::session(Config::capture());
    let mut pool = session.allocate_and_map(Type::VideoCapture, 2).unwrap();
    fake.set_fill(Some(100));

    let (frame, _) = pool.capture().unwrap();
    assert_eq!(frame.len(), 100);
}

#[test]
fn waker_interrupts_a_wait() {
    let (mut session, _fake) = FakeDriver::session(Config::capture());
    let mut pool = session.allocate_and_map(Type::VideoCapture, 2).unwrap();
    let waker = Arc::new(Waker::new().unwrap());
    pool.set_waker(Some(Arc::clone(&waker)));
    pool.set_timeout(Some(Duration::from_millis(10)));

    assert!(matches!(pool.wait(), Err(Error::Timeout)));

    waker.wake().unwrap();
    assert_eq!(pool.wait().unwrap(), Readiness::Woken);
    waker.reset().unwrap();

    session.start(&mut pool).unwrap();
    assert_eq!(
        pool.wait().unwrap(),
        Readiness::Ready {
            readable: true,
            writable: false
        }
    );
}

#[test]
fn dropping_the_pool_releases_everything() {
    let (mut session, fake) = FakeDriver::session(Config::capture());
    let mut pool = session.allocate_and_map(Type::VideoCapture, 4).unwrap();
    session.start(&mut pool).unwrap();
    pool.dequeue().unwrap();

    drop(pool);
    assert!(!fake.is_streaming(Type::VideoCapture));
    assert_eq!(fake.mapped(), 0);
    assert_eq!(fake.buffers(Type::VideoCapture), 0);

    let requests = fake.requests();
    let position = |r: Request| requests.iter().rposition(|x| *x == r).unwrap();
    assert!(position(Request::VIDIOC_STREAMOFF) < position(Request::VIDIOC_REQBUFS));
}

#[test]
fn pools_are_exclusive_per_queue() {
    let (mut session, _fake) = FakeDriver::session(Config::capture());
    let pool = session.allocate_and_map(Type::VideoCapture, 2).unwrap();

    assert!(matches!(
        session.allocate_and_map(Type::VideoCapture, 2),
        Err(Error::ProtocolViolation(_))
    ));

    let fmt = session.format(Type::VideoCapture).unwrap();
    assert!(matches!(
        session.set_format(Type::VideoCapture, &fmt),
        Err(Error::ProtocolViolation(_))
    ));
    assert!(matches!(
        session.negotiate(Type::VideoCapture, 320, 240, "YUYV"),
        Err(Error::FormatNegotiationFailed { .. })
    ));

    drop(pool);
    session.set_format(Type::VideoCapture, &fmt).unwrap();
    session.allocate_and_map(Type::VideoCapture, 2).unwrap();
}

#[test]
fn close_requires_pools_to_be_gone() {
    let (mut session, fake) = FakeDriver::session(Config::capture());
    let pool = session.allocate_and_map(Type::VideoCapture, 2).unwrap();

    assert!(matches!(session.close(), Err(Error::ProtocolViolation(_))));
    // the pool keeps the device alive and still tears down cleanly
    drop(pool);
    assert_eq!(fake.mapped(), 0);
}

#[test]
fn missing_capability_is_fatal() {
    let (mut session, fake) = FakeDriver::session(Config {
        caps: capability::Flags::VIDEO_OUTPUT | capability::Flags::STREAMING,
        ..Config::capture()
    });

    match session.negotiate(Type::VideoCapture, 640, 480, "YUYV") {
        Err(Error::CapabilityMissing { required }) => {
            assert_eq!(required, capability::Flags::VIDEO_CAPTURE)
        }
        other => panic!("expected CapabilityMissing, got {:?}", other.map(|f| f.fourcc())),
    }
    assert_eq!(fake.count(Request::VIDIOC_S_FMT), 0);

    let (mut session, _fake) = FakeDriver::session(Config {
        caps: capability::Flags::VIDEO_CAPTURE,
        ..Config::capture()
    });
    assert!(matches!(
        session.allocate_and_map(Type::VideoCapture, 2),
        Err(Error::CapabilityMissing { .. })
    ));
}

#[test]
fn driver_adjusts_the_requested_format() {
    let (mut session, _fake) = FakeDriver::session(Config::capture());
    let fmt = session
        .negotiate(Type::VideoCapture, 801, 4000, "YUV 4:2:2")
        .unwrap();
    assert_eq!(fmt.width(), 800);
    assert_eq!(fmt.height(), 1080);
    assert_eq!(session.format(Type::VideoCapture).unwrap(), fmt);

    let pool = session.allocate_and_map(Type::VideoCapture, 1).unwrap();
    assert_eq!(pool.descriptor(0).unwrap().planes[0].length, 800 * 2 * 1080);
}

#[test]
fn old_kernels_use_their_own_layout() {
    let fake = FakeDriver::new(Config {
        version: KERNEL_4_14,
        ..Config::capture()
    });
    let mut session = Session::with_driver(fake.clone(), Options::default()).unwrap();
    assert_eq!(session.layout().key.headers, HeaderVersion::Linux4_14);
    assert_eq!(session.layout().buffer.request_fd, None);

    let mut pool = session.allocate_and_map(Type::VideoCapture, 2).unwrap();
    let (frame, meta) = pool.capture().unwrap();
    assert!(!frame.is_empty());
    assert_eq!(meta.seq, 0);
}

#[test]
fn session_timeout_applies_to_new_pools() {
    let fake = FakeDriver::new(Config::capture());
    let options = Options {
        timeout: Some(Duration::from_millis(5)),
        ..Options::default()
    };
    let mut session = Session::with_driver(fake, options).unwrap();
    let mut pool = session.allocate_and_map(Type::VideoCapture, 2).unwrap();

    assert!(matches!(pool.dequeue(), Err(Error::Timeout)));
}
