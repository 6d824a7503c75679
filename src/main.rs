fn main() {
    if let Err(e) = autoprocessor_lib::run() {
        eprintln!("autoprocessor: {e}");
        std::process::exit(1);
    }
}
