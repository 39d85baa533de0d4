use v4l2_mmap::buffer::Type;
use v4l2_mmap::format::catalog;
use v4l2_mmap::Session;

fn main() -> v4l2_mmap::Result<()> {
    env_logger::init();

    let path = "/dev/video0";
    println!("Using device: {}\n", path);

    let session = Session::open(path)?;
    let typ = if session.require_queue(Type::VideoCaptureMplane).is_ok() {
        Type::VideoCaptureMplane
    } else {
        Type::VideoCapture
    };

    let format = session.format(typ)?;
    println!("Active format:\n{}", format);

    let params = session.params(typ)?;
    println!("Active parameters:\n{}", params);

    println!("Available formats:");
    for desc in session.enum_formats(typ)? {
        let known = match catalog::lookup(desc.fourcc) {
            Some(entry) => entry.name,
            None => "not in catalog",
        };
        println!("  {} ({}) [{}]", desc.fourcc, desc.description, known);
    }

    Ok(())
}
