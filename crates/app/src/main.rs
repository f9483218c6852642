use std::process;

mod headless;
mod logging;

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let parsed = match headless::parse_args(&args) {
        Ok(parsed) => parsed,
        Err(err) => {
            eprintln!("{err}");
            process::exit(2);
        }
    };
    logging::setup_tracing(parsed.log_level);

    tracing::info!("Conduit starting");

    match headless::run(&parsed) {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(err) => {
            eprintln!("headless error: {err}");
            process::exit(1);
        }
    }
}
