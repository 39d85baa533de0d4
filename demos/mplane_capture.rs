use v4l2_mmap::buffer::Type;
use v4l2_mmap::Session;

fn main() -> v4l2_mmap::Result<()> {
    env_logger::init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| String::from("/dev/video0"));
    println!("Using device: {}\n", path);

    let mut session = Session::open(&path)?;
    let format = session.negotiate(Type::VideoCaptureMplane, 1280, 720, "NM12")?;
    println!("Active format:\n{}", format);

    let mut pool = session.allocate_and_map(Type::VideoCaptureMplane, 4)?;
    println!(
        "Granted {} buffers with {} planes each\n",
        pool.len(),
        pool.plane_count()
    );

    session.start(&mut pool)?;
    for _ in 0..8 {
        let done = pool.dequeue()?;
        println!("Buffer {}", done.index);
        println!("  sequence  : {}", done.meta.seq);
        println!("  timestamp : {}", done.meta.timestamp);
        for (plane, used) in done.bytes_used.iter().enumerate() {
            println!("  plane {}   : {} bytes", plane, used);
        }
        pool.enqueue(done.index)?;
    }
    session.stop(&mut pool)?;

    Ok(())
}
