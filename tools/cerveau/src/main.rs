fn main() {
    match cerveau::run() {
        Ok(code) => std::process::exit(code),
        Err(error) => {
            eprintln!("cerveau: {error}");
            std::process::exit(1);
        }
    }
}
