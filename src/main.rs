//! cachelock binary entry point.

fn main() {
    let code = match cachelock::cli::run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {:#}", err);
            1
        }
    };
    // `exit` runs the atexit sweep for any lock still registered.
    std::process::exit(code);
}
