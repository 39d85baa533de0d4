use v4l2_mmap::device;
use v4l2_mmap::Session;

fn main() {
    env_logger::init();

    for dev in device::list() {
        println!(
            "{}: {}",
            dev.path().display(),
            dev.name().unwrap_or_else(|| String::from("<unnamed>"))
        );

        match Session::open(dev.path()) {
            Ok(session) => println!("{}", session.caps()),
            Err(e) => println!("{}", e),
        }
    }
}
