use std::time::Instant;

use v4l2_mmap::buffer::Type;
use v4l2_mmap::Session;

fn main() -> v4l2_mmap::Result<()> {
    env_logger::init();

    let path = "/dev/video0";
    println!("Using device: {}\n", path);

    // Capture 4 frames by default
    let count = 4;

    // Allocate 4 buffers by default
    let buffer_count = 4;

    let mut session = Session::open(path)?;
    let format = session.negotiate(Type::VideoCapture, 640, 480, "YUYV")?;
    let params = session.params(Type::VideoCapture)?;
    println!("Active format:\n{}", format);
    println!("Active parameters:\n{}", params);

    let mut pool = session.allocate_and_map(Type::VideoCapture, buffer_count)?;
    println!("Granted {} buffers\n", pool.len());

    // warmup
    pool.capture()?;

    let start = Instant::now();
    let mut megabytes_ps: f64 = 0.0;
    for i in 0..count {
        let t0 = Instant::now();
        let (buf, meta) = pool.capture()?;
        let duration_us = t0.elapsed().as_micros().max(1);

        let cur = buf.len() as f64 / 1_048_576.0 * 1_000_000.0 / duration_us as f64;
        if i == 0 {
            megabytes_ps = cur;
        } else {
            // ignore the first measurement
            let prev = megabytes_ps * (i as f64 / (i + 1) as f64);
            let now = cur * (1.0 / (i + 1) as f64);
            megabytes_ps = prev + now;
        }

        println!("Buffer");
        println!("  sequence  : {}", meta.seq);
        println!("  timestamp : {}", meta.timestamp);
        println!("  flags     : {}", meta.flags);
        println!("  length    : {}", buf.len());
    }

    println!();
    println!("FPS: {}", count as f64 / start.elapsed().as_secs_f64());
    println!("MB/s: {}", megabytes_ps);

    session.stop(&mut pool)?;
    drop(pool);
    session.close()
}
