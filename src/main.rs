fn main() {
    if let Err(err) = bainoculars_lib::run() {
        eprintln!("bainoculars: {err:?}");
        std::process::exit(1);
    }
}
