use v4l2_mmap::Session;

fn main() -> v4l2_mmap::Result<()> {
    env_logger::init();

    let path = "/dev/video0";
    println!("Using device: {}\n", path);

    let session = Session::open(path)?;
    let controls = session.query_controls()?;

    for control in controls {
        println!("{}", control);
    }

    Ok(())
}
